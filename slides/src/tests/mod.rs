mod cancellation_tests;

use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::errors::AutomationError;
use crate::surface::ScreenSurface;
use crate::target::TargetDescriptor;
use crate::types::{ClickKind, InputEvent, Overlay, OverlayHandle, ScreenRegion};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

/// When a target image is visible, relative to the mock's creation.
#[derive(Debug, Clone, Copy)]
pub enum Appearance {
    Always(ScreenRegion),
    After(Duration, ScreenRegion),
    Until(Duration, ScreenRegion),
}

/// Scriptable surface that records what the engine asked of it.
pub struct MockSurface {
    screen: ScreenRegion,
    created: Instant,
    targets: Mutex<HashMap<String, Appearance>>,
    probes: AtomicUsize,
    clicks: Mutex<Vec<(ScreenRegion, ClickKind)>>,
    typed: Mutex<Vec<String>>,
    launched: Mutex<Vec<String>>,
    highlights: AtomicUsize,
    overlays_shown: AtomicUsize,
    open_overlays: Arc<AtomicUsize>,
    fail_clicks: AtomicBool,
    inputs: Mutex<VecDeque<InputEvent>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self {
            screen: ScreenRegion::new(0, 0, 0, 800, 600),
            created: Instant::now(),
            targets: Mutex::new(HashMap::new()),
            probes: AtomicUsize::new(0),
            clicks: Mutex::new(Vec::new()),
            typed: Mutex::new(Vec::new()),
            launched: Mutex::new(Vec::new()),
            highlights: AtomicUsize::new(0),
            overlays_shown: AtomicUsize::new(0),
            open_overlays: Arc::new(AtomicUsize::new(0)),
            fail_clicks: AtomicBool::new(false),
            inputs: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_target(self, image: &str, appearance: Appearance) -> Self {
        self.targets
            .lock()
            .unwrap()
            .insert(image.to_string(), appearance);
        self
    }

    pub fn with_failing_clicks(self) -> Self {
        self.fail_clicks.store(true, Ordering::SeqCst);
        self
    }

    pub fn push_input(&self, event: InputEvent) {
        self.inputs.lock().unwrap().push_back(event);
    }

    pub fn screen(&self) -> ScreenRegion {
        self.screen
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> Vec<(ScreenRegion, ClickKind)> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn typed(&self) -> Vec<String> {
        self.typed.lock().unwrap().clone()
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    pub fn highlights(&self) -> usize {
        self.highlights.load(Ordering::SeqCst)
    }

    pub fn overlays_shown(&self) -> usize {
        self.overlays_shown.load(Ordering::SeqCst)
    }

    pub fn open_overlays(&self) -> usize {
        self.open_overlays.load(Ordering::SeqCst)
    }
}

impl ScreenSurface for MockSurface {
    fn screen_region(&self, _screen_id: u32) -> Result<ScreenRegion, AutomationError> {
        Ok(self.screen)
    }

    fn find_target(
        &self,
        target: &TargetDescriptor,
        _within: &ScreenRegion,
    ) -> Result<Option<ScreenRegion>, AutomationError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let appearance = self.targets.lock().unwrap().get(&target.name()).copied();
        let now = self.created.elapsed();
        Ok(match appearance {
            Some(Appearance::Always(region)) => Some(region),
            Some(Appearance::After(delay, region)) if now >= delay => Some(region),
            Some(Appearance::Until(delay, region)) if now < delay => Some(region),
            _ => None,
        })
    }

    fn click(&self, region: &ScreenRegion, kind: ClickKind) -> Result<(), AutomationError> {
        if self.fail_clicks.load(Ordering::SeqCst) {
            return Err(AutomationError::PlatformError("pointer unavailable".to_string()));
        }
        self.clicks.lock().unwrap().push((*region, kind));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn launch(&self, path: &str) -> Result<(), AutomationError> {
        self.launched.lock().unwrap().push(path.to_string());
        Ok(())
    }

    fn draw_highlight(
        &self,
        _region: &ScreenRegion,
        _duration: Duration,
    ) -> Result<(), AutomationError> {
        self.highlights.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn show_overlay(
        &self,
        _region: &ScreenRegion,
        _overlay: &Overlay,
    ) -> Result<OverlayHandle, AutomationError> {
        self.overlays_shown.fetch_add(1, Ordering::SeqCst);
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
        Ok(self.inputs.lock().unwrap().pop_front())
    }
}

/// Fast-polling config for tests.
pub fn test_config() -> RunConfig {
    RunConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_retry_interval(Duration::from_millis(50))
}

pub fn context(surface: &Arc<MockSurface>) -> ExecutionContext {
    ExecutionContext::new(surface.clone(), test_config(), surface.screen())
}
