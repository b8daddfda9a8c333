//! Per-run execution state shared by every action of a run

use crate::config::RunConfig;
use crate::errors::AutomationError;
use crate::surface::ScreenSurface;
use crate::types::ScreenRegion;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// State shared by all actions of one run.
///
/// Cloning is cheap: the surface, config, live-task registry and run-wide
/// cancellation token are shared. Only the active region is per clone, so a
/// target-wrapped action can hand its delegate a narrower scope.
#[derive(Clone)]
pub struct ExecutionContext {
    surface: Arc<dyn ScreenSurface>,
    config: Arc<RunConfig>,
    region: ScreenRegion,
    target_scope: bool,
    tasks: TaskRegistry,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(surface: Arc<dyn ScreenSurface>, config: RunConfig, region: ScreenRegion) -> Self {
        Self {
            surface,
            config: Arc::new(config),
            region,
            target_scope: false,
            tasks: TaskRegistry::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use an externally owned run token, e.g. one a [`RunHandle`](crate::RunHandle) can cancel.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// A context scoped to a found target.
    pub fn with_target(&self, region: ScreenRegion) -> Self {
        Self {
            region,
            target_scope: true,
            ..self.clone()
        }
    }

    pub fn surface(&self) -> Arc<dyn ScreenSurface> {
        self.surface.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The region actions currently operate on.
    pub fn region(&self) -> ScreenRegion {
        self.region
    }

    /// Whether [`region`](Self::region) is a resolved target rather than the whole screen.
    pub fn is_target_scope(&self) -> bool {
        self.target_scope
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel the whole run.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// Run a blocking surface call on a blocking-safe thread.
    pub async fn blocking<T, F>(&self, call: F) -> Result<T, AutomationError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ScreenSurface) -> Result<T, AutomationError> + Send + 'static,
    {
        let surface = self.surface.clone();
        task::spawn_blocking(move || call(surface.as_ref()))
            .await
            .map_err(|e| AutomationError::Internal(format!("Task join error: {e}")))?
    }

    /// Tear down every live background task and wait for them to finish.
    pub async fn shutdown(&self) {
        let grace = self.config.max_wait.max(Duration::from_secs(5));
        let abandoned = self.tasks.shutdown(grace).await;
        if abandoned > 0 {
            warn!(abandoned, "Live tasks did not stop within {:?}", grace);
        }
    }
}

/// Handle to a task registered in a [`TaskRegistry`].
pub struct LiveTaskHandle {
    id: Uuid,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl LiveTaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the task to stop; it tears itself down cooperatively.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to finish. Its registry entry is gone once this returns.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            warn!(task = %self.id, "Live task ended abnormally: {}", e);
        }
    }

    pub(crate) fn join_handle(&mut self) -> &mut JoinHandle<()> {
        &mut self.join
    }
}

struct LiveTask {
    name: String,
    token: CancellationToken,
}

/// The set of background tasks (overlays, watchers) alive in a run.
///
/// Registration and removal go through one lock, so overlays started and
/// stopped by concurrent actions never race on the set.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    live: Arc<Mutex<HashMap<Uuid, LiveTask>>>,
    changed: Arc<Notify>,
}

impl TaskRegistry {
    /// Spawn `task` and register it until it completes.
    ///
    /// The task receives its own cancellation token and must return promptly
    /// once it is cancelled.
    pub async fn spawn<F, Fut>(&self, name: impl Into<String>, task: F) -> LiveTaskHandle
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let future = task(token.clone());

        let mut live = self.live.lock().await;
        let registry = self.clone();
        let join = tokio::spawn(async move {
            future.await;
            registry.remove(id).await;
        });
        debug!(task = %id, name = %name, "Live task registered");
        live.insert(
            id,
            LiveTask {
                name,
                token: token.clone(),
            },
        );

        LiveTaskHandle { id, token, join }
    }

    async fn remove(&self, id: Uuid) {
        let removed = self.live.lock().await.remove(&id);
        if let Some(task) = removed {
            debug!(task = %id, name = %task.name, "Live task removed");
        }
        self.changed.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.live.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.live.lock().await.is_empty()
    }

    pub async fn names(&self) -> Vec<String> {
        self.live
            .lock()
            .await
            .values()
            .map(|task| task.name.clone())
            .collect()
    }

    /// Cancel every live task and wait up to `grace` for the set to drain.
    /// Returns how many tasks were still registered when the grace ran out.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let drain = async {
            loop {
                let notified = self.changed.notified();
                {
                    let live = self.live.lock().await;
                    if live.is_empty() {
                        return;
                    }
                    for task in live.values() {
                        task.token.cancel();
                    }
                }
                notified.await;
            }
        };

        match tokio::time::timeout(grace, drain).await {
            Ok(()) => 0,
            Err(_) => self.len().await,
        }
    }
}
