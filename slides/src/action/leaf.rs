//! Leaf behaviours: each ends in one or a few surface calls.

use super::Action;
use crate::context::ExecutionContext;
use crate::errors::{ActionError, AutomationError};
use crate::target::TargetDescriptor;
use crate::types::{ClickKind, Overlay, SignalKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// A label overlay and how long it stays up.
///
/// Without a duration the label succeeds as soon as it is on screen and
/// stays up until the run tears down its live tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    pub overlay: Overlay,
    pub duration: Option<Duration>,
}

fn execution_error(action: &Action, source: AutomationError) -> ActionError {
    ActionError::Execution {
        action: action.name().to_string(),
        source,
    }
}

pub(super) async fn click(
    action: &Action,
    ctx: &ExecutionContext,
    kind: ClickKind,
) -> Result<(), ActionError> {
    let region = ctx.region();
    debug!(action = %action.name(), %region, "Clicking");
    ctx.blocking(move |surface| surface.click(&region, kind))
        .await
        .map_err(|e| execution_error(action, e))
}

/// Inside a found target the target is clicked first so it has focus.
pub(super) async fn type_text(
    action: &Action,
    ctx: &ExecutionContext,
    text: &str,
) -> Result<(), ActionError> {
    let region = ctx.region();
    let focus = ctx.is_target_scope();
    let text = text.to_string();
    ctx.blocking(move |surface| {
        if focus {
            surface.click(&region, ClickKind::Left)?;
        }
        surface.type_text(&text)
    })
    .await
    .map_err(|e| execution_error(action, e))
}

pub(super) async fn delay(
    action: &Action,
    ctx: &ExecutionContext,
    duration: Duration,
) -> Result<(), ActionError> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = action.stopped(ctx) => Err(action.cancelled_error()),
    }
}

/// One probe, no waiting. Retrying is left to an enclosing retry action.
pub(super) async fn exist(
    action: &Action,
    ctx: &ExecutionContext,
    target: &Arc<TargetDescriptor>,
    expected: bool,
) -> Result<(), ActionError> {
    let region = ctx.region();
    let probe = target.clone();
    let found = tokio::select! {
        found = ctx.blocking(move |surface| surface.find_target(&probe, &region)) => {
            found.map_err(|e| execution_error(action, e))?
        }
        _ = action.stopped(ctx) => return Err(action.cancelled_error()),
    };

    match (found.is_some(), expected) {
        (true, true) | (false, false) => Ok(()),
        (false, true) => Err(ActionError::TargetNotFound {
            image: target.name(),
            waited: Duration::ZERO,
        }),
        (true, false) => Err(ActionError::UnexpectedTarget {
            image: target.name(),
        }),
    }
}

pub(super) async fn browser(
    action: &Action,
    ctx: &ExecutionContext,
    url: &str,
) -> Result<(), ActionError> {
    let url = url.to_string();
    info!(action = %action.name(), "Launching {}", url);
    ctx.blocking(move |surface| surface.launch(&url))
        .await
        .map_err(|e| execution_error(action, e))
}

pub(super) async fn label(
    action: &Action,
    ctx: &ExecutionContext,
    spec: &LabelSpec,
) -> Result<(), ActionError> {
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), AutomationError>>();
    let surface = ctx.surface();
    let region = ctx.region();
    let overlay = spec.overlay.clone();
    let lifetime = spec.duration;

    let mut task = ctx
        .tasks()
        .spawn(action.name().to_string(), move |token| async move {
            let shown =
                tokio::task::spawn_blocking(move || surface.show_overlay(&region, &overlay))
                    .await
                    .map_err(|e| AutomationError::Internal(format!("Task join error: {e}")))
                    .and_then(|shown| shown);
            let handle = match shown {
                Ok(handle) => handle,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            match lifetime {
                Some(lifetime) => {
                    tokio::select! {
                        _ = tokio::time::sleep(lifetime) => {}
                        _ = token.cancelled() => {}
                    }
                }
                None => token.cancelled().await,
            }

            // Closing joins the render thread.
            let _ = tokio::task::spawn_blocking(move || handle.close()).await;
        })
        .await;

    match ready_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            task.join().await;
            return Err(execution_error(action, e));
        }
        Err(_) => {
            task.join().await;
            return Err(ActionError::Join(format!(
                "{} ended before its overlay was shown",
                action.name()
            )));
        }
    }
    debug!(action = %action.name(), task = %task.id(), "Label on screen");

    if lifetime.is_none() {
        return Ok(());
    }

    tokio::select! {
        joined = task.join_handle() => {
            joined.map_err(|e| ActionError::Join(e.to_string()))
        }
        _ = action.stopped(ctx) => {
            task.cancel();
            task.join().await;
            Err(action.cancelled_error())
        }
    }
}

/// Unbounded unless `timeout` is set, but always released by a stop.
pub(super) async fn wait_for_signal(
    action: &Action,
    ctx: &ExecutionContext,
    signal: SignalKind,
    timeout: Option<Duration>,
) -> Result<(), ActionError> {
    let region = ctx.region();
    let started = Instant::now();
    let interval = ctx.config().poll_interval;

    loop {
        let event = tokio::select! {
            event = ctx.blocking(move |surface| surface.poll_input(&region)) => {
                event.map_err(|e| execution_error(action, e))?
            }
            _ = action.stopped(ctx) => return Err(action.cancelled_error()),
        };

        if let Some(event) = event {
            let accepted = match signal {
                SignalKind::Click => event.kind == SignalKind::Click,
                SignalKind::Hover => true,
            };
            if accepted && region.contains(event.x, event.y) {
                debug!(action = %action.name(), ?event, "Signal received");
                return Ok(());
            }
        }

        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                return Err(execution_error(
                    action,
                    AutomationError::Timeout(format!("no {signal:?} within {timeout:?}")),
                ));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = action.stopped(ctx) => return Err(action.cancelled_error()),
        }
    }
}
