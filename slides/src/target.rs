use crate::config::RunConfig;
use crate::model::SlideElement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// What to look for on screen and how long to look.
///
/// Built once per element and shared (behind an `Arc`) by the target-wrapped
/// action and any presence checks derived from the same element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub image: PathBuf,
    pub min_score: f64,
    pub max_wait: Duration,
}

impl TargetDescriptor {
    pub fn new(image: impl Into<PathBuf>, min_score: f64, max_wait: Duration) -> Self {
        Self {
            image: image.into(),
            min_score: min_score.clamp(0.0, 1.0),
            max_wait,
        }
    }

    /// Descriptor for an element's image, with unset values taken from `config`.
    pub fn for_element(element: &SlideElement, config: &RunConfig) -> Option<Self> {
        let image = element.image.clone()?;
        Some(Self::new(
            image,
            element.min_score.unwrap_or(config.min_score),
            element.wait.unwrap_or(config.max_wait),
        ))
    }

    pub fn name(&self) -> String {
        self.image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.image.display().to_string())
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (score>={:.2}, wait {}ms)",
            self.name(),
            self.min_score,
            self.max_wait.as_millis()
        )
    }
}
