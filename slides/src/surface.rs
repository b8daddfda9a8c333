//! Screen automation surface
//!
//! The engine decides when and under which policy screen calls happen; the
//! calls themselves (image search, pointer, keyboard, overlays) belong to an
//! external automation library behind [`ScreenSurface`].

use crate::errors::AutomationError;
use crate::target::TargetDescriptor;
use crate::types::{ClickKind, InputEvent, Overlay, OverlayHandle, ScreenRegion, SignalKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The automation capabilities the engine calls into.
///
/// Every method is a blocking call on the invoking thread and is never retried
/// by the implementation; the engine runs them on blocking-safe threads and
/// owns retry and timeout policy. Implementations must tolerate concurrent
/// image searches and serialize physical pointer and keyboard effects.
pub trait ScreenSurface: Send + Sync {
    /// Bounds of the given monitor.
    fn screen_region(&self, screen_id: u32) -> Result<ScreenRegion, AutomationError>;

    /// Single probe for `target` inside `within`. Never waits.
    fn find_target(
        &self,
        target: &TargetDescriptor,
        within: &ScreenRegion,
    ) -> Result<Option<ScreenRegion>, AutomationError>;

    fn click(&self, region: &ScreenRegion, kind: ClickKind) -> Result<(), AutomationError>;

    fn type_text(&self, text: &str) -> Result<(), AutomationError>;

    /// Launch an external application (a browser for URLs).
    fn launch(&self, path: &str) -> Result<(), AutomationError>;

    /// Draw a highlight box that disappears on its own after `duration`.
    fn draw_highlight(&self, region: &ScreenRegion, duration: Duration)
        -> Result<(), AutomationError>;

    /// Start rendering a label overlay; it stays up until the handle is closed.
    fn show_overlay(
        &self,
        region: &ScreenRegion,
        overlay: &Overlay,
    ) -> Result<OverlayHandle, AutomationError>;

    /// Most recent click or hover inside `region` since the last poll, if any.
    fn poll_input(&self, region: &ScreenRegion) -> Result<Option<InputEvent>, AutomationError>;
}

/// A surface that rehearses a script without touching the desktop.
///
/// Every target is "found" at the full screen, pointer and keyboard calls are
/// only logged, overlays idle on a render thread until closed, and input
/// polling reports a synthetic click once `signal_after` has passed.
pub struct DryRunSurface {
    width: u32,
    height: u32,
    signal_after: Duration,
    started: Mutex<Option<Instant>>,
    calls: Mutex<Vec<String>>,
}

impl DryRunSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            signal_after: Duration::from_millis(500),
            started: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_signal_after(mut self, signal_after: Duration) -> Self {
        self.signal_after = signal_after;
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        info!("[dry-run] {}", call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Default for DryRunSurface {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl ScreenSurface for DryRunSurface {
    fn screen_region(&self, screen_id: u32) -> Result<ScreenRegion, AutomationError> {
        Ok(ScreenRegion::new(screen_id, 0, 0, self.width, self.height))
    }

    fn find_target(
        &self,
        target: &TargetDescriptor,
        within: &ScreenRegion,
    ) -> Result<Option<ScreenRegion>, AutomationError> {
        self.record(format!("find {} in {}", target.name(), within));
        Ok(Some(*within))
    }

    fn click(&self, region: &ScreenRegion, kind: ClickKind) -> Result<(), AutomationError> {
        let (x, y) = region.center();
        self.record(format!("{kind:?} click at ({x}, {y})"));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.record(format!("type {text:?}"));
        Ok(())
    }

    fn launch(&self, path: &str) -> Result<(), AutomationError> {
        if path.trim().is_empty() {
            return Err(AutomationError::InvalidArgument(
                "nothing to launch".to_string(),
            ));
        }
        self.record(format!("launch {path}"));
        Ok(())
    }

    fn draw_highlight(
        &self,
        region: &ScreenRegion,
        duration: Duration,
    ) -> Result<(), AutomationError> {
        self.record(format!("highlight {} for {}ms", region, duration.as_millis()));
        Ok(())
    }

    fn show_overlay(
        &self,
        region: &ScreenRegion,
        overlay: &Overlay,
    ) -> Result<OverlayHandle, AutomationError> {
        self.record(format!("label {:?} at {}", overlay.text, region));

        let should_close = Arc::new(AtomicBool::new(false));
        let render_flag = should_close.clone();
        let text = overlay.text.clone();
        let handle = thread::Builder::new()
            .name("dry-run-overlay".to_string())
            .spawn(move || {
                while !render_flag.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(20));
                }
                debug!("[dry-run] label {:?} closed", text);
            })
            .map_err(|e| AutomationError::PlatformError(format!("overlay thread: {e}")))?;

        Ok(OverlayHandle::new(should_close, Some(handle)))
    }

    fn poll_input(&self, region: &ScreenRegion) -> Result<Option<InputEvent>, AutomationError> {
        let mut started = self
            .started
            .lock()
            .map_err(|e| AutomationError::Internal(format!("poisoned lock: {e}")))?;
        let since = *started.get_or_insert_with(Instant::now);
        if since.elapsed() < self.signal_after {
            return Ok(None);
        }
        *started = None;

        let (x, y) = region.center();
        self.record(format!("synthetic click at ({x}, {y})"));
        Ok(Some(InputEvent {
            kind: SignalKind::Click,
            x,
            y,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FontStyle;

    #[test]
    fn test_dry_run_finds_every_target() {
        let surface = DryRunSurface::default();
        let screen = surface.screen_region(0).unwrap();
        let target = TargetDescriptor::new("button.png", 0.7, Duration::from_secs(1));
        assert_eq!(surface.find_target(&target, &screen).unwrap(), Some(screen));
        assert_eq!(surface.calls().len(), 1);
    }

    #[test]
    fn test_dry_run_overlay_closes() {
        let surface = DryRunSurface::default();
        let overlay = Overlay {
            text: "hello".to_string(),
            font: FontStyle::default(),
            position: Default::default(),
        };
        let handle = surface
            .show_overlay(&ScreenRegion::full_screen(0), &overlay)
            .unwrap();
        assert!(!handle.is_closed());
        handle.close();
    }

    #[test]
    fn test_dry_run_signal_after_delay() {
        let surface = DryRunSurface::default().with_signal_after(Duration::from_millis(30));
        let region = ScreenRegion::new(0, 0, 0, 100, 100);
        assert_eq!(surface.poll_input(&region).unwrap(), None);
        thread::sleep(Duration::from_millis(40));
        let event = surface.poll_input(&region).unwrap().unwrap();
        assert_eq!(event.kind, SignalKind::Click);
        assert_eq!((event.x, event.y), (50, 50));
    }
}
