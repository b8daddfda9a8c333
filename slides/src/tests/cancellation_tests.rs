use super::{context, Appearance, MockSurface};
use crate::action::{Action, ActionState, LabelSpec, RetryPolicy};
use crate::errors::ActionError;
use crate::target::TargetDescriptor;
use crate::types::{Overlay, ScreenRegion, SignalKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

fn spawn_execute(
    action: &Arc<Action>,
    ctx: &crate::context::ExecutionContext,
) -> JoinHandle<Result<(), ActionError>> {
    let action = action.clone();
    let ctx = ctx.clone();
    tokio::spawn(async move { action.execute(&ctx).await })
}

fn overlay(text: &str) -> Overlay {
    Overlay {
        text: text.to_string(),
        font: Default::default(),
        position: Default::default(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_interrupts_delay() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);
    let action = Arc::new(Action::delay(Duration::from_secs(10)));

    let started = Instant::now();
    let running = spawn_execute(&action, &ctx);
    tokio::time::sleep(Duration::from_millis(50)).await;
    action.stop();

    let err = running.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(action.state(), ActionState::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_stop_before_execute() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);
    let action = Action::left_click();

    action.stop();
    let err = action.execute(&ctx).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(action.state(), ActionState::Cancelled);
    assert!(surface.clicks().is_empty());
}

#[tokio::test]
async fn test_stop_after_completion_is_noop() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);
    let action = Action::delay(Duration::from_millis(10));

    action.execute(&ctx).await.unwrap();
    action.stop();
    action.stop();
    assert_eq!(action.state(), ActionState::Succeeded);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_twice_matches_stop_once() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);

    let once = Arc::new(Action::delay(Duration::from_secs(10)));
    let twice = Arc::new(Action::delay(Duration::from_secs(10)));
    let first = spawn_execute(&once, &ctx);
    let second = spawn_execute(&twice, &ctx);
    tokio::time::sleep(Duration::from_millis(30)).await;

    once.stop();
    twice.stop();
    twice.stop();
    let _ = first.await.unwrap();
    let _ = second.await.unwrap();
    assert_eq!(once.state(), twice.state());
    assert_eq!(twice.state(), ActionState::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parallel_stop_cascades() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);
    let action = Arc::new(Action::parallel(
        "busy",
        vec![
            Action::delay(Duration::from_secs(10)),
            Action::label(LabelSpec {
                overlay: overlay("Working"),
                duration: Some(Duration::from_secs(10)),
            }),
            Action::wait_for_signal(SignalKind::Click, None),
        ],
    ));

    let running = spawn_execute(&action, &ctx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    action.stop();
    let err = running.await.unwrap().unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(action.state(), ActionState::Cancelled);
    for child in action.children() {
        assert_eq!(child.state(), ActionState::Cancelled, "{}", child.name());
    }
    assert!(ctx.tasks().is_empty().await);
    assert_eq!(surface.open_overlays(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_aborts_retry_mid_attempt() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);
    let target = Arc::new(TargetDescriptor::new(
        "missing.png",
        0.7,
        Duration::from_secs(10),
    ));
    let action = Arc::new(Action::retry(
        RetryPolicy::new(Duration::from_secs(30), Duration::from_millis(50)),
        Action::target(target, Action::left_click()),
    ));

    let started = Instant::now();
    let running = spawn_execute(&action, &ctx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    action.stop();
    let err = running.await.unwrap().unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(action.state(), ActionState::Cancelled);
    let attempt = action.children().pop().unwrap();
    assert_eq!(attempt.state(), ActionState::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_while_polling_skips_delegate() {
    let surface = Arc::new(MockSurface::new().with_target(
        "late.png",
        Appearance::After(Duration::from_secs(60), ScreenRegion::new(0, 0, 0, 10, 10)),
    ));
    let ctx = context(&surface);
    let target = Arc::new(TargetDescriptor::new("late.png", 0.7, Duration::from_secs(30)));
    let action = Arc::new(Action::target(target, Action::left_click()));

    let running = spawn_execute(&action, &ctx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    action.stop();
    let err = running.await.unwrap().unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(action.state(), ActionState::Cancelled);
    assert!(surface.clicks().is_empty());
    // The delegate was stopped before it ever started.
    assert_ne!(action.children()[0].state(), ActionState::Succeeded);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_token_releases_unbounded_signal_wait() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);
    let action = Arc::new(Action::wait_for_signal(SignalKind::Hover, None));

    let running = spawn_execute(&action, &ctx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(action.state(), ActionState::Running);

    ctx.cancel();
    let err = running.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(action.state(), ActionState::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stopped_label_leaves_no_live_task() {
    let surface = Arc::new(MockSurface::new());
    let ctx = context(&surface);
    let action = Arc::new(Action::label(LabelSpec {
        overlay: overlay("Hold on"),
        duration: Some(Duration::from_secs(5)),
    }));

    let running = spawn_execute(&action, &ctx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.tasks().len().await, 1);

    action.stop();
    let err = running.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(ctx.tasks().is_empty().await);
    assert_eq!(surface.open_overlays(), 0);
    assert!(action.elapsed().unwrap() < Duration::from_secs(5));
}
