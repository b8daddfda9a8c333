//! Slide-driven screen automation
//!
//! A script is a deck of slides. Each slide is one automation step whose
//! elements carry keywords (`click`, `type`, `label`, ...) and optionally a
//! screenshot of the on-screen target they act on. The [`Interpreter`] turns
//! a slide into a tree of [`Action`]s, and the [`Runner`] executes those
//! trees against a [`ScreenSurface`] with target polling, retries, parallel
//! fan-out and cooperative cancellation.

pub mod action;
pub mod config;
pub mod context;
pub mod duration;
pub mod errors;
pub mod interpreter;
pub mod keywords;
pub mod model;
pub mod reader;
pub mod runner;
pub mod surface;
pub mod target;
#[cfg(test)]
mod tests;
pub mod types;

pub use action::{Action, ActionKind, ActionShape, ActionState, LabelSpec, RetryPolicy};
pub use config::RunConfig;
pub use context::{ExecutionContext, TaskRegistry};
pub use errors::{ActionError, AutomationError, ErrorKind, InterpretationError, ReadError};
pub use interpreter::{Interpretation, Interpreter};
pub use keywords::{KeywordRegistry, KeywordRequest};
pub use model::{KeywordBinding, Slide, SlideElement};
pub use reader::{JsonSlideReader, SlideReader};
pub use runner::{RunFailure, RunHandle, RunReport, Runner, SlideReport};
pub use surface::{DryRunSurface, ScreenSurface};
pub use target::TargetDescriptor;
pub use types::{ClickKind, InputEvent, Overlay, OverlayHandle, ScreenRegion, SignalKind};
