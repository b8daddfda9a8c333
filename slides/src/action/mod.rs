//! Action tree
//!
//! An [`Action`] is one node of the tree the interpreter builds from a slide:
//! either a leaf that calls into the screen surface, or a composite that
//! owns child actions. Every action runs at most once and moves through
//! [`ActionState`] monotonically: `Pending -> Running -> {Succeeded, Failed,
//! Cancelled}`.
//!
//! # Cancellation
//!
//! [`Action::stop`] is cooperative and idempotent. It may be called from any
//! task, cascades to children, and is observed at the next suspension point
//! (target polling, retry intervals, delays, signal waits, overlay lifetimes).
//! The run-wide token in the [`ExecutionContext`] is observed the same way.

mod composite;
mod leaf;

pub use composite::{ParallelAction, RetryAction, RetryPolicy, TargetAction};
pub use leaf::LabelSpec;

use crate::context::ExecutionContext;
use crate::errors::ActionError;
use crate::target::TargetDescriptor;
use crate::types::{ClickKind, SignalKind};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of an action instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Succeeded | ActionState::Failed | ActionState::Cancelled
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionState::Pending => "pending",
            ActionState::Running => "running",
            ActionState::Succeeded => "succeeded",
            ActionState::Failed => "failed",
            ActionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The closed set of action behaviours.
pub enum ActionKind {
    LeftClick,
    RightClick,
    DoubleClick,
    Type { text: String },
    Delay { duration: Duration },
    Exist { target: Arc<TargetDescriptor> },
    NotExist { target: Arc<TargetDescriptor> },
    Browser { url: String },
    Label(LabelSpec),
    WaitForSignal {
        signal: SignalKind,
        timeout: Option<Duration>,
    },
    Target(TargetAction),
    Retry(RetryAction),
    Parallel(ParallelAction),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::LeftClick => "left_click",
            ActionKind::RightClick => "right_click",
            ActionKind::DoubleClick => "double_click",
            ActionKind::Type { .. } => "type",
            ActionKind::Delay { .. } => "delay",
            ActionKind::Exist { .. } => "exist",
            ActionKind::NotExist { .. } => "not_exist",
            ActionKind::Browser { .. } => "browser",
            ActionKind::Label(_) => "label",
            ActionKind::WaitForSignal { .. } => "wait_for_signal",
            ActionKind::Target(_) => "target",
            ActionKind::Retry(_) => "retry",
            ActionKind::Parallel(_) => "parallel",
        }
    }

    pub fn click_kind(&self) -> Option<ClickKind> {
        match self {
            ActionKind::LeftClick => Some(ClickKind::Left),
            ActionKind::RightClick => Some(ClickKind::Right),
            ActionKind::DoubleClick => Some(ClickKind::Double),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            ActionKind::Target(_) | ActionKind::Retry(_) | ActionKind::Parallel(_)
        )
    }

    /// A fresh, never-run copy. Descriptors stay shared.
    fn fork(&self) -> ActionKind {
        match self {
            ActionKind::LeftClick => ActionKind::LeftClick,
            ActionKind::RightClick => ActionKind::RightClick,
            ActionKind::DoubleClick => ActionKind::DoubleClick,
            ActionKind::Type { text } => ActionKind::Type { text: text.clone() },
            ActionKind::Delay { duration } => ActionKind::Delay {
                duration: *duration,
            },
            ActionKind::Exist { target } => ActionKind::Exist {
                target: target.clone(),
            },
            ActionKind::NotExist { target } => ActionKind::NotExist {
                target: target.clone(),
            },
            ActionKind::Browser { url } => ActionKind::Browser { url: url.clone() },
            ActionKind::Label(spec) => ActionKind::Label(spec.clone()),
            ActionKind::WaitForSignal { signal, timeout } => ActionKind::WaitForSignal {
                signal: *signal,
                timeout: *timeout,
            },
            ActionKind::Target(target) => ActionKind::Target(target.fork()),
            ActionKind::Retry(retry) => ActionKind::Retry(retry.fork()),
            ActionKind::Parallel(parallel) => ActionKind::Parallel(parallel.fork()),
        }
    }
}

/// Structure of an action tree, without runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionShape {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ActionShape>,
}

struct Lifecycle {
    state: ActionState,
    started: Option<Instant>,
    elapsed: Option<Duration>,
    error: Option<ActionError>,
}

/// One node of an action tree.
pub struct Action {
    id: Uuid,
    name: String,
    element: Option<u32>,
    kind: ActionKind,
    lifecycle: Mutex<Lifecycle>,
    stop: CancellationToken,
}

impl Action {
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            element: None,
            kind,
            lifecycle: Mutex::new(Lifecycle {
                state: ActionState::Pending,
                started: None,
                elapsed: None,
                error: None,
            }),
            stop: CancellationToken::new(),
        }
    }

    pub fn left_click() -> Self {
        Self::new("left click", ActionKind::LeftClick)
    }

    pub fn right_click() -> Self {
        Self::new("right click", ActionKind::RightClick)
    }

    pub fn double_click() -> Self {
        Self::new("double click", ActionKind::DoubleClick)
    }

    pub fn type_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(format!("type {text:?}"), ActionKind::Type { text })
    }

    pub fn delay(duration: Duration) -> Self {
        Self::new(
            format!("delay {}ms", duration.as_millis()),
            ActionKind::Delay { duration },
        )
    }

    pub fn exist(target: Arc<TargetDescriptor>) -> Self {
        Self::new(
            format!("exist {}", target.name()),
            ActionKind::Exist { target },
        )
    }

    pub fn not_exist(target: Arc<TargetDescriptor>) -> Self {
        Self::new(
            format!("not exist {}", target.name()),
            ActionKind::NotExist { target },
        )
    }

    pub fn browser(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(format!("browser {url}"), ActionKind::Browser { url })
    }

    pub fn label(spec: LabelSpec) -> Self {
        Self::new(
            format!("label {:?}", spec.overlay.text),
            ActionKind::Label(spec),
        )
    }

    pub fn wait_for_signal(signal: SignalKind, timeout: Option<Duration>) -> Self {
        Self::new(
            format!("wait for {signal:?}").to_lowercase(),
            ActionKind::WaitForSignal { signal, timeout },
        )
    }

    pub fn target(target: Arc<TargetDescriptor>, delegate: Action) -> Self {
        Self::new(
            format!("target {}", target.name()),
            ActionKind::Target(TargetAction::new(target, delegate)),
        )
    }

    pub fn retry(policy: RetryPolicy, child: Action) -> Self {
        Self::new(
            format!("retry {}", child.name),
            ActionKind::Retry(RetryAction::new(policy, child)),
        )
    }

    pub fn parallel(name: impl Into<String>, children: Vec<Action>) -> Self {
        Self::new(name, ActionKind::Parallel(ParallelAction::new(children)))
    }

    /// Root of a slide's tree. Live tasks left by its children (unlimited
    /// labels) are torn down before it reports a terminal state.
    pub fn slide(name: impl Into<String>, children: Vec<Action>) -> Self {
        Self::new(name, ActionKind::Parallel(ParallelAction::slide(children)))
    }

    /// Attribute this action to the slide element it was built from.
    pub fn with_element(mut self, order: u32) -> Self {
        self.element = Some(order);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> Option<u32> {
        self.element
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn state(&self) -> ActionState {
        self.lifecycle().state
    }

    /// How long the action ran, once terminal.
    pub fn elapsed(&self) -> Option<Duration> {
        self.lifecycle().elapsed
    }

    /// The failure recorded when the action ended `Failed` or `Cancelled`.
    pub fn error(&self) -> Option<ActionError> {
        self.lifecycle().error.clone()
    }

    /// Direct children, in index order.
    pub fn children(&self) -> Vec<Arc<Action>> {
        match &self.kind {
            ActionKind::Target(target) => vec![target.delegate().clone()],
            ActionKind::Retry(retry) => retry.current().into_iter().collect(),
            ActionKind::Parallel(parallel) => parallel.children().to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn shape(&self) -> ActionShape {
        let children = match &self.kind {
            ActionKind::Target(target) => vec![target.delegate().shape()],
            ActionKind::Retry(retry) => vec![retry.child().shape()],
            ActionKind::Parallel(parallel) => {
                parallel.children().iter().map(|c| c.shape()).collect()
            }
            _ => Vec::new(),
        };
        ActionShape {
            kind: self.kind.name(),
            element: self.element,
            children,
        }
    }

    /// A fresh copy of this subtree in the `Pending` state.
    pub fn fork(&self) -> Action {
        Action {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            element: self.element,
            kind: self.kind.fork(),
            lifecycle: Mutex::new(Lifecycle {
                state: ActionState::Pending,
                started: None,
                elapsed: None,
                error: None,
            }),
            stop: CancellationToken::new(),
        }
    }

    /// The deepest failed action in this subtree, following the failing path.
    pub fn failure_origin(&self) -> Option<&Action> {
        if self.state() != ActionState::Failed {
            return None;
        }
        let deeper = match &self.kind {
            ActionKind::Target(target) => target.delegate().failure_origin(),
            ActionKind::Parallel(parallel) => match self.error() {
                Some(ActionError::Parallel { index, .. }) => parallel
                    .children()
                    .get(index)
                    .and_then(|child| child.failure_origin()),
                _ => None,
            },
            // Retry attempts are short-lived copies; the retry itself is the origin.
            _ => None,
        };
        Some(deeper.unwrap_or(self))
    }

    /// Nearest element attribution along the failing path.
    pub fn failure_element(&self) -> Option<u32> {
        if self.state() != ActionState::Failed {
            return None;
        }
        let deeper = match &self.kind {
            ActionKind::Target(target) => target.delegate().failure_element(),
            ActionKind::Parallel(parallel) => match self.error() {
                Some(ActionError::Parallel { index, .. }) => parallel
                    .children()
                    .get(index)
                    .and_then(|child| child.failure_element()),
                _ => None,
            },
            _ => None,
        };
        deeper.or(self.element)
    }

    /// Request cooperative cancellation of this action and its children.
    ///
    /// Idempotent; a no-op once the action is terminal.
    pub fn stop(&self) {
        if self.state().is_terminal() {
            return;
        }
        if !self.stop.is_cancelled() {
            debug!(action = %self.name, id = %self.id, "Stop requested");
        }
        self.stop.cancel();
        match &self.kind {
            ActionKind::Target(target) => target.delegate().stop(),
            ActionKind::Retry(retry) => {
                if let Some(attempt) = retry.current() {
                    attempt.stop();
                }
            }
            ActionKind::Parallel(parallel) => {
                for child in parallel.children() {
                    child.stop();
                }
            }
            _ => {}
        }
    }

    pub fn is_stop_requested(&self, ctx: &ExecutionContext) -> bool {
        self.stop.is_cancelled() || ctx.is_cancelled()
    }

    /// Resolves once this action or the whole run is asked to stop.
    pub(crate) async fn stopped(&self, ctx: &ExecutionContext) {
        tokio::select! {
            _ = self.stop.cancelled() => {}
            _ = ctx.cancelled() => {}
        }
    }

    pub(crate) fn cancelled_error(&self) -> ActionError {
        ActionError::Cancelled(self.name.clone())
    }

    /// Run the action to a terminal state.
    ///
    /// Resolves only once the action is terminal; composites wait for all of
    /// their children first. An action instance can be executed once.
    pub fn execute<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            self.begin()?;
            debug!(action = %self.name, kind = self.kind.name(), element = ?self.element, "Action started");

            let result = if self.is_stop_requested(ctx) {
                Err(self.cancelled_error())
            } else {
                self.run(ctx).await
            };

            self.finish(&result);
            result
        })
    }

    async fn run(&self, ctx: &ExecutionContext) -> Result<(), ActionError> {
        match &self.kind {
            ActionKind::LeftClick | ActionKind::RightClick | ActionKind::DoubleClick => {
                let kind = self.kind.click_kind().unwrap_or(ClickKind::Left);
                leaf::click(self, ctx, kind).await
            }
            ActionKind::Type { text } => leaf::type_text(self, ctx, text).await,
            ActionKind::Delay { duration } => leaf::delay(self, ctx, *duration).await,
            ActionKind::Exist { target } => leaf::exist(self, ctx, target, true).await,
            ActionKind::NotExist { target } => leaf::exist(self, ctx, target, false).await,
            ActionKind::Browser { url } => leaf::browser(self, ctx, url).await,
            ActionKind::Label(spec) => leaf::label(self, ctx, spec).await,
            ActionKind::WaitForSignal { signal, timeout } => {
                leaf::wait_for_signal(self, ctx, *signal, *timeout).await
            }
            ActionKind::Target(target) => target.run(self, ctx).await,
            ActionKind::Retry(retry) => retry.run(self, ctx).await,
            ActionKind::Parallel(parallel) => parallel.run(self, ctx).await,
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        // A panic while holding this lock cannot leave the lifecycle half-updated.
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> Result<(), ActionError> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != ActionState::Pending {
            return Err(ActionError::InvalidState(format!(
                "{} is {}, cannot start again",
                self.name, lifecycle.state
            )));
        }
        lifecycle.state = ActionState::Running;
        lifecycle.started = Some(Instant::now());
        Ok(())
    }

    fn finish(&self, result: &Result<(), ActionError>) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != ActionState::Running {
            return;
        }
        let state = match result {
            Ok(()) => ActionState::Succeeded,
            Err(e) if e.is_cancelled() => ActionState::Cancelled,
            Err(_) => ActionState::Failed,
        };
        lifecycle.state = state;
        lifecycle.elapsed = lifecycle.started.map(|started| started.elapsed());
        lifecycle.error = result.as_ref().err().cloned();
        drop(lifecycle);

        match result {
            Ok(()) => debug!(action = %self.name, "Action succeeded"),
            Err(e) if e.is_cancelled() => debug!(action = %self.name, "Action cancelled"),
            Err(e) => warn!(action = %self.name, element = ?self.element, "Action failed: {}", e),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .field("element", &self.element)
            .field("state", &self.state())
            .finish()
    }
}
