//! Composite behaviours: target polling, retry budgets and parallel fan-out.

use super::Action;
use crate::context::ExecutionContext;
use crate::errors::ActionError;
use crate::target::TargetDescriptor;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Waits for a target to appear, then runs its delegate inside it.
pub struct TargetAction {
    target: Arc<TargetDescriptor>,
    delegate: Arc<Action>,
}

impl TargetAction {
    pub fn new(target: Arc<TargetDescriptor>, delegate: Action) -> Self {
        Self {
            target,
            delegate: Arc::new(delegate),
        }
    }

    pub fn target(&self) -> &Arc<TargetDescriptor> {
        &self.target
    }

    pub fn delegate(&self) -> &Arc<Action> {
        &self.delegate
    }

    pub(super) fn fork(&self) -> Self {
        Self {
            target: self.target.clone(),
            delegate: Arc::new(self.delegate.fork()),
        }
    }

    pub(super) async fn run(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<(), ActionError> {
        let started = Instant::now();
        let deadline = started + self.target.max_wait;
        let interval = ctx.config().poll_interval;
        let scope = ctx.region();
        let mut probes = 0u32;

        let found = loop {
            let target = self.target.clone();
            probes += 1;
            let found = tokio::select! {
                found = ctx.blocking(move |surface| surface.find_target(&target, &scope)) => {
                    found.map_err(|e| ActionError::Execution {
                        action: action.name().to_string(),
                        source: e,
                    })?
                }
                _ = action.stopped(ctx) => return Err(action.cancelled_error()),
            };

            if let Some(region) = found {
                break region;
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(target = %self.target, probes, "Target never appeared");
                return Err(ActionError::TargetNotFound {
                    image: self.target.name(),
                    waited: now.duration_since(started),
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(interval.min(deadline - now)) => {}
                _ = action.stopped(ctx) => return Err(action.cancelled_error()),
            }
        };

        info!(
            target = %self.target.name(),
            %found,
            probes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Target found"
        );

        if ctx.config().highlight_targets {
            let canvas = ctx.config().canvas_duration;
            if let Err(e) = ctx
                .blocking(move |surface| surface.draw_highlight(&found, canvas))
                .await
            {
                warn!("Could not highlight {}: {}", self.target.name(), e);
            }
        }

        if action.is_stop_requested(ctx) {
            return Err(action.cancelled_error());
        }
        self.delegate.execute(&ctx.with_target(found)).await
    }
}

/// Time budget and pacing of a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub budget: Duration,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(budget: Duration, interval: Duration) -> Self {
        Self { budget, interval }
    }
}

/// Re-runs a fresh copy of its child until it succeeds or the budget is spent.
pub struct RetryAction {
    policy: RetryPolicy,
    child: Arc<Action>,
    current: Mutex<Option<Arc<Action>>>,
}

impl RetryAction {
    pub fn new(policy: RetryPolicy, child: Action) -> Self {
        Self {
            policy,
            child: Arc::new(child),
            current: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// The template every attempt is copied from.
    pub fn child(&self) -> &Arc<Action> {
        &self.child
    }

    /// The attempt currently (or last) running.
    pub fn current(&self) -> Option<Arc<Action>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(super) fn fork(&self) -> Self {
        Self::new(self.policy, self.child.fork())
    }

    pub(super) async fn run(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<(), ActionError> {
        let started = Instant::now();
        let mut attempts = 0u32;

        let last = loop {
            if action.is_stop_requested(ctx) {
                return Err(action.cancelled_error());
            }

            let attempt = Arc::new(self.child.fork());
            *self
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(attempt.clone());
            // A stop that landed before the attempt was published.
            if action.is_stop_requested(ctx) {
                attempt.stop();
            }

            attempts += 1;
            let error = match attempt.execute(ctx).await {
                Ok(()) => {
                    debug!(action = %action.name(), attempts, "Retry succeeded");
                    return Ok(());
                }
                Err(e) if e.is_cancelled() => return Err(action.cancelled_error()),
                Err(e) => e,
            };

            debug!(action = %action.name(), attempt = attempts, "Attempt failed: {}", error);
            if started.elapsed() >= self.policy.budget {
                break error;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval) => {}
                _ = action.stopped(ctx) => return Err(action.cancelled_error()),
            }

            if started.elapsed() >= self.policy.budget {
                break error;
            }
        };

        warn!(
            action = %action.name(),
            attempts,
            budget_ms = self.policy.budget.as_millis() as u64,
            "Retry budget exhausted"
        );
        Err(ActionError::RetryExhausted {
            attempts,
            last: Box::new(last),
        })
    }
}

/// Runs every child at once and joins them all.
pub struct ParallelAction {
    children: Vec<Arc<Action>>,
    teardown: bool,
}

impl ParallelAction {
    pub fn new(children: Vec<Action>) -> Self {
        Self {
            children: children.into_iter().map(Arc::new).collect(),
            teardown: false,
        }
    }

    /// A slide root: once every child is terminal, the context's live tasks
    /// are drained before the action itself becomes terminal.
    pub fn slide(children: Vec<Action>) -> Self {
        Self {
            teardown: true,
            ..Self::new(children)
        }
    }

    pub fn tears_down(&self) -> bool {
        self.teardown
    }

    pub fn children(&self) -> &[Arc<Action>] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(super) fn fork(&self) -> Self {
        Self {
            children: self.children.iter().map(|c| Arc::new(c.fork())).collect(),
            teardown: self.teardown,
        }
    }

    /// The first failing child (by index) decides the error; once any child
    /// fails the remaining ones are stopped, and the result is only decided
    /// after every child is terminal.
    pub(super) async fn run(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<(), ActionError> {
        let result = self.join_children(action, ctx).await;
        if self.teardown {
            ctx.shutdown().await;
        }
        result
    }

    async fn join_children(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<(), ActionError> {
        let mut pending: FuturesUnordered<_> = self
            .children
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let child = child.clone();
                let child_ctx = ctx.clone();
                let handle = tokio::spawn(async move { child.execute(&child_ctx).await });
                async move {
                    let result = handle
                        .await
                        .unwrap_or_else(|e| Err(ActionError::Join(e.to_string())));
                    (index, result)
                }
            })
            .collect();

        let mut results: Vec<Option<Result<(), ActionError>>> =
            (0..self.children.len()).map(|_| None).collect();
        let mut stopping = false;

        while let Some((index, result)) = pending.next().await {
            if let Err(e) = &result {
                if !e.is_cancelled() && !stopping {
                    stopping = true;
                    warn!(
                        action = %action.name(),
                        child = index,
                        "Child failed, stopping siblings: {}",
                        e
                    );
                    for (sibling_index, sibling) in self.children.iter().enumerate() {
                        if sibling_index != index {
                            sibling.stop();
                        }
                    }
                }
            }
            results[index] = Some(result);
        }

        let mut cancelled = false;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Err(e)) if e.is_cancelled() => cancelled = true,
                Some(Err(e)) => {
                    return Err(ActionError::Parallel {
                        index,
                        source: Box::new(e),
                    })
                }
                _ => {}
            }
        }

        if cancelled {
            return Err(action.cancelled_error());
        }
        Ok(())
    }
}
