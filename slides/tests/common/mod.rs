#![allow(dead_code)]

use slides::{
    AutomationError, ClickKind, InputEvent, Overlay, OverlayHandle, RunConfig, ScreenRegion,
    ScreenSurface, TargetDescriptor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_test_writer()
        .try_init();
}

/// Surface whose targets are either always on screen or never.
pub struct FakeScreen {
    screen: ScreenRegion,
    visible: Mutex<HashMap<String, ScreenRegion>>,
    probes: AtomicUsize,
    clicks: Mutex<Vec<ClickKind>>,
    typed: Mutex<Vec<String>>,
    open_overlays: Arc<AtomicUsize>,
    broken_screen: bool,
}

impl FakeScreen {
    pub fn new() -> Self {
        Self {
            screen: ScreenRegion::new(0, 0, 0, 1280, 720),
            visible: Mutex::new(HashMap::new()),
            probes: AtomicUsize::new(0),
            clicks: Mutex::new(Vec::new()),
            typed: Mutex::new(Vec::new()),
            open_overlays: Arc::new(AtomicUsize::new(0)),
            broken_screen: false,
        }
    }

    /// A surface that cannot report its screen bounds.
    pub fn broken() -> Self {
        Self {
            broken_screen: true,
            ..Self::new()
        }
    }

    pub fn show(self, image: &str, region: ScreenRegion) -> Self {
        self.visible
            .lock()
            .unwrap()
            .insert(image.to_string(), region);
        self
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> Vec<ClickKind> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.typed.lock().unwrap().clone()
    }

    pub fn open_overlays(&self) -> usize {
        self.open_overlays.load(Ordering::SeqCst)
    }
}

impl ScreenSurface for FakeScreen {
    fn screen_region(&self, screen_id: u32) -> Result<ScreenRegion, AutomationError> {
        if self.broken_screen {
            return Err(AutomationError::PlatformError(format!(
                "no monitor {screen_id}"
            )));
        }
        Ok(self.screen)
    }

    fn find_target(
        &self,
        target: &TargetDescriptor,
        _within: &ScreenRegion,
    ) -> Result<Option<ScreenRegion>, AutomationError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.visible.lock().unwrap().get(&target.name()).copied())
    }

    fn click(&self, _region: &ScreenRegion, kind: ClickKind) -> Result<(), AutomationError> {
        self.clicks.lock().unwrap().push(kind);
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn launch(&self, _path: &str) -> Result<(), AutomationError> {
        Ok(())
    }

    fn draw_highlight(
        &self,
        _region: &ScreenRegion,
        _duration: Duration,
    ) -> Result<(), AutomationError> {
        Ok(())
    }

    fn show_overlay(
        &self,
        _region: &ScreenRegion,
        _overlay: &Overlay,
    ) -> Result<OverlayHandle, AutomationError> {
        self.open_overlays.fetch_add(1, Ordering::SeqCst);
        let should_close = Arc::new(AtomicBool::new(false));
        let flag = should_close.clone();
        let open = self.open_overlays.clone();
        let handle = thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(5));
            }
            open.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(OverlayHandle::new(should_close, Some(handle)))
    }

    fn poll_input(&self, _region: &ScreenRegion) -> Result<Option<InputEvent>, AutomationError> {
        Ok(None)
    }
}

pub fn fast_config() -> RunConfig {
    RunConfig::default()
        .with_poll_interval(Duration::from_millis(50))
        .with_target_highlight(false)
}
