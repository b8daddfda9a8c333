//! Slide interpretation
//!
//! Turns a [`Slide`] into an action tree. Every element becomes one child of
//! a root parallel action; elements that cannot be interpreted are reported
//! and left out without failing the rest of the slide.

use crate::action::Action;
use crate::config::RunConfig;
use crate::errors::InterpretationError;
use crate::keywords::{KeywordRegistry, KeywordRequest};
use crate::model::{KeywordBinding, Slide, SlideElement};
use crate::target::TargetDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Result of interpreting one slide.
#[derive(Debug)]
pub struct Interpretation {
    /// Root parallel action, one child per interpreted element
    pub root: Arc<Action>,
    /// One entry per skipped element
    pub errors: Vec<InterpretationError>,
}

impl Interpretation {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Interpreter {
    registry: Arc<KeywordRegistry>,
    config: RunConfig,
}

impl Interpreter {
    pub fn new(registry: Arc<KeywordRegistry>, config: RunConfig) -> Self {
        Self { registry, config }
    }

    /// An interpreter over the standard keyword set.
    pub fn standard(config: RunConfig) -> Self {
        Self::new(KeywordRegistry::standard(), config)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[instrument(skip(self, slide), fields(slide = slide.number, elements = slide.elements.len()))]
    pub fn interpret(&self, slide: &Slide) -> Interpretation {
        let mut children = Vec::new();
        let mut errors = Vec::new();

        // An order index shared by several elements fixes no position, so
        // every element claiming it is skipped.
        let mut claims: HashMap<u32, usize> = HashMap::new();
        for element in &slide.elements {
            *claims.entry(element.order).or_default() += 1;
        }

        for element in slide.ordered_elements() {
            if claims.get(&element.order).copied().unwrap_or(0) > 1 {
                let e = InterpretationError::DuplicateOrder {
                    element: element.order,
                };
                warn!("Skipping element {}: {}", element.describe(), e);
                errors.push(e);
                continue;
            }
            match self.interpret_element(element) {
                Ok(action) => {
                    debug!(element = %element.describe(), action = %action.name(), "Element interpreted");
                    children.push(action.with_element(element.order));
                }
                Err(e) => {
                    warn!("Skipping element {}: {}", element.describe(), e);
                    errors.push(e);
                }
            }
        }

        Interpretation {
            root: Arc::new(Action::slide(format!("slide {}", slide.number), children)),
            errors,
        }
    }

    /// Build the action for one element.
    pub fn interpret_element(&self, element: &SlideElement) -> Result<Action, InterpretationError> {
        let implicit;
        let bindings: &[KeywordBinding] = if element.keywords.is_empty() {
            if element.display_text().is_none() {
                return Err(InterpretationError::EmptyElement {
                    element: element.order,
                });
            }
            implicit = [KeywordBinding::new("label")];
            &implicit
        } else {
            &element.keywords
        };

        let target = TargetDescriptor::for_element(element, &self.config).map(Arc::new);
        let mut delegates = Vec::with_capacity(bindings.len());
        let mut wraps = false;

        for binding in bindings {
            let keyword = self.registry.lookup(&binding.keyword).ok_or_else(|| {
                InterpretationError::UnknownKeyword {
                    element: element.order,
                    keyword: binding.keyword.clone(),
                }
            })?;
            let request = KeywordRequest {
                element,
                binding,
                target: target.as_ref(),
                config: &self.config,
            };
            delegates.push(keyword.build(&request)?);
            wraps |= keyword.target.wraps();
        }

        let delegate = if delegates.len() == 1 {
            delegates.remove(0)
        } else {
            Action::parallel(format!("element {}", element.order), delegates)
        };

        Ok(match target {
            Some(target) if wraps => Action::target(target, delegate),
            _ => delegate,
        })
    }
}
