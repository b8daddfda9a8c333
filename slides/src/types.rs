//! Common value types shared by the engine and screen surfaces

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// A rectangle on a given screen, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub screen_id: u32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRegion {
    pub fn new(screen_id: u32, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            screen_id,
            x,
            y,
            width,
            height,
        }
    }

    /// Placeholder for "the whole screen"; surfaces resolve it to the real
    /// bounds of `screen_id`.
    pub fn full_screen(screen_id: u32) -> Self {
        Self::new(screen_id, 0, 0, 0, 0)
    }

    pub fn is_full_screen(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(extent(self.width / 2)),
            self.y.saturating_add(extent(self.height / 2)),
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        if self.is_full_screen() {
            return true;
        }
        x >= self.x
            && y >= self.y
            && x < self.x.saturating_add(extent(self.width))
            && y < self.y.saturating_add(extent(self.height))
    }
}

fn extent(length: u32) -> i32 {
    i32::try_from(length).unwrap_or(i32::MAX)
}

impl fmt::Display for ScreenRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full_screen() {
            write!(f, "screen {}", self.screen_id)
        } else {
            write!(
                f,
                "screen {} [{},{} {}x{}]",
                self.screen_id, self.x, self.y, self.width, self.height
            )
        }
    }
}

/// Pointer button gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    Left,
    Double,
    Right,
}

/// External input that releases a `WaitForSignal` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Click,
    Hover,
}

/// An input event observed on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: SignalKind,
    pub x: i32,
    pub y: i32,
}

/// Position options for label overlays relative to their region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextPosition {
    Top,
    Right,
    Bottom,
    Left,
    #[default]
    Inside,
}

/// Font styling options for label overlays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontStyle {
    pub size: u32,
    pub bold: bool,
    pub color: u32, // BGR format
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            size: 15,
            bold: false,
            color: 0x000000, // Black
        }
    }
}

/// What a label overlay shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    pub text: String,
    #[serde(default)]
    pub font: FontStyle,
    #[serde(default)]
    pub position: TextPosition,
}

/// Handle for a live overlay with cleanup.
///
/// Surfaces render overlays on their own thread and poll `should_close`.
/// Dropping the handle closes the overlay.
pub struct OverlayHandle {
    should_close: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OverlayHandle {
    pub fn new(should_close: Arc<AtomicBool>, handle: Option<thread::JoinHandle<()>>) -> Self {
        Self {
            should_close,
            handle,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.should_close.load(Ordering::Relaxed)
    }

    /// Manually close the overlay
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.should_close.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OverlayHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for OverlayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_center_and_contains() {
        let region = ScreenRegion::new(0, 100, 50, 40, 20);
        assert_eq!(region.center(), (120, 60));
        assert!(region.contains(100, 50));
        assert!(!region.contains(140, 50));
        assert!(ScreenRegion::full_screen(1).contains(-5, 9000));
    }

    #[test]
    fn test_huge_region_does_not_wrap() {
        let region = ScreenRegion::new(0, 10, 10, u32::MAX, u32::MAX);
        assert_eq!(region.center(), (i32::MAX, i32::MAX));
        assert!(region.contains(10, 10));
        assert!(region.contains(i32::MAX - 1, i32::MAX - 1));
        assert!(!region.contains(9, 10));
    }

    #[test]
    fn test_overlay_handle_close_sets_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let handle = OverlayHandle::new(flag.clone(), None);
        assert!(!handle.is_closed());
        handle.close();
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_overlay_handle_drop_joins_render_thread() {
        let flag = Arc::new(AtomicBool::new(false));
        let thread_flag = flag.clone();
        let render = thread::spawn(move || {
            while !thread_flag.load(Ordering::Relaxed) {
                thread::sleep(std::time::Duration::from_millis(5));
            }
        });
        drop(OverlayHandle::new(flag.clone(), Some(render)));
        assert!(flag.load(Ordering::Relaxed));
    }
}
