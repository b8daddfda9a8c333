//! Running slides
//!
//! The [`Runner`] owns the pieces of a run: the surface, the configuration
//! and the keyword registry. It interprets and executes slides one after the
//! other and turns the outcome into a [`RunReport`] instead of an error.

use crate::action::{Action, ActionState};
use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::errors::{ActionError, ErrorKind};
use crate::interpreter::{Interpretation, Interpreter};
use crate::keywords::KeywordRegistry;
use crate::model::Slide;
use crate::surface::ScreenSurface;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Why a run or slide did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub kind: ErrorKind,
    /// Order index of the element the failing action was built from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<u32>,
    /// Name of the deepest failing action
    pub action: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlideReport {
    pub number: usize,
    pub state: ActionState,
    pub elapsed_ms: u64,
    /// Number of interpreted elements
    pub children: usize,
    /// Elements that were skipped, one message each
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: ActionState,
    pub slides: Vec<SlideReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == ActionState::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.state == ActionState::Failed
    }
}

/// Stops a run from another task, e.g. a Ctrl-C handler.
#[derive(Debug, Clone)]
pub struct RunHandle {
    cancellation: CancellationToken,
}

impl RunHandle {
    /// Idempotent.
    pub fn stop(&self) {
        if !self.cancellation.is_cancelled() {
            info!("Stopping run");
        }
        self.cancellation.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

pub struct Runner {
    surface: Arc<dyn ScreenSurface>,
    config: RunConfig,
    registry: Arc<KeywordRegistry>,
    cancellation: CancellationToken,
}

impl Runner {
    pub fn new(surface: Arc<dyn ScreenSurface>, config: RunConfig) -> Self {
        Self {
            surface,
            config,
            registry: KeywordRegistry::standard(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<KeywordRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle {
            cancellation: self.cancellation.clone(),
        }
    }

    /// Run `slides` in order, stopping after the first one that fails or is
    /// cancelled.
    #[instrument(skip(self, slides), fields(slides = slides.len()))]
    pub async fn run(&self, slides: &[Slide]) -> RunReport {
        let started = Instant::now();
        let ctx = match self.context().await {
            Ok(ctx) => ctx,
            Err(failure) => {
                error!("Could not start run: {}", failure.message);
                return RunReport {
                    state: ActionState::Failed,
                    slides: Vec::new(),
                    failure: Some(failure),
                };
            }
        };
        let interpreter = Interpreter::new(self.registry.clone(), self.config.clone());

        let mut reports = Vec::with_capacity(slides.len());
        for slide in slides {
            let report = execute_slide(&interpreter, &ctx, slide).await;
            let state = report.state;
            reports.push(report);
            if state != ActionState::Succeeded {
                break;
            }
        }

        let state = reports
            .last()
            .map(|report| report.state)
            .unwrap_or(ActionState::Succeeded);
        let failure = reports.iter().find_map(|report| report.failure.clone());
        info!(
            %state,
            slides = reports.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run finished"
        );

        RunReport {
            state,
            slides: reports,
            failure,
        }
    }

    /// Run a single slide in a run of its own.
    pub async fn run_slide(&self, slide: &Slide) -> SlideReport {
        let report = self.run(std::slice::from_ref(slide)).await;
        let failure = report.failure.clone();
        report.slides.into_iter().next().unwrap_or(SlideReport {
            number: slide.number,
            state: report.state,
            elapsed_ms: 0,
            children: 0,
            errors: Vec::new(),
            failure,
        })
    }

    async fn context(&self) -> Result<ExecutionContext, RunFailure> {
        let surface = self.surface.clone();
        let screen_id = self.config.screen_id;
        let region = tokio::task::spawn_blocking(move || surface.screen_region(screen_id))
            .await
            .map_err(|e| e.to_string())
            .and_then(|region| region.map_err(|e| e.to_string()))
            .map_err(|message| RunFailure {
                kind: ErrorKind::ActionExecution,
                element: None,
                action: format!("screen {screen_id}"),
                message,
            })?;

        Ok(
            ExecutionContext::new(self.surface.clone(), self.config.clone(), region)
                .with_cancellation(self.cancellation.child_token()),
        )
    }
}

async fn execute_slide(
    interpreter: &Interpreter,
    ctx: &ExecutionContext,
    slide: &Slide,
) -> SlideReport {
    let started = Instant::now();
    let Interpretation { root, errors } = interpreter.interpret(slide);
    info!(
        slide = slide.number,
        children = root.children().len(),
        skipped = errors.len(),
        "Running slide"
    );

    let result = root.execute(ctx).await;

    let state = root.state();
    let failure = match (&result, state) {
        (Err(e), ActionState::Failed) => Some(failure_of(&root, e)),
        _ => None,
    };
    match &failure {
        Some(failure) => warn!(
            slide = slide.number,
            element = ?failure.element,
            "Slide failed in {}: {}",
            failure.action,
            failure.message
        ),
        None => info!(slide = slide.number, %state, "Slide finished"),
    }

    SlideReport {
        number: slide.number,
        state,
        elapsed_ms: started.elapsed().as_millis() as u64,
        children: root.children().len(),
        errors: errors.iter().map(|e| e.to_string()).collect(),
        failure,
    }
}

fn failure_of(root: &Action, error: &ActionError) -> RunFailure {
    let origin = root.failure_origin().unwrap_or(root);
    let cause = origin.error().unwrap_or_else(|| error.clone());
    RunFailure {
        kind: cause.kind(),
        element: root.failure_element(),
        action: origin.name().to_string(),
        message: cause.root_cause().to_string(),
    }
}
