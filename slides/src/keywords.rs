//! Keyword registry
//!
//! Maps the keywords written on slide elements to action builders. Lookup is
//! a case-insensitive exact match with no fuzzy matching and no trimming;
//! bindings arrive already split and trimmed. The standard
//! registry is built once and never changes afterwards.

use crate::action::{Action, LabelSpec, RetryPolicy};
use crate::config::RunConfig;
use crate::duration::parse_duration;
use crate::errors::InterpretationError;
use crate::model::{KeywordBinding, SlideElement};
use crate::target::TargetDescriptor;
use crate::types::{FontStyle, Overlay, SignalKind, TextPosition};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Whether a keyword takes an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    /// Falls back to the element text when the binding has no argument
    Optional,
    Required,
}

/// How a keyword uses the element's target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetUse {
    Ignored,
    /// Probes the descriptor itself (presence checks)
    Probe,
    /// Runs inside the target when the element has one
    Optional,
    /// Must run inside a found target
    Required,
}

impl TargetUse {
    pub fn wraps(&self) -> bool {
        matches!(self, TargetUse::Optional | TargetUse::Required)
    }
}

/// Everything a builder sees about the element it is building for.
pub struct KeywordRequest<'a> {
    pub element: &'a SlideElement,
    pub binding: &'a KeywordBinding,
    pub target: Option<&'a Arc<TargetDescriptor>>,
    pub config: &'a RunConfig,
}

impl KeywordRequest<'_> {
    /// The argument written on the binding itself.
    pub fn explicit_argument(&self) -> Option<&str> {
        self.binding
            .argument
            .as_deref()
            .map(str::trim)
            .filter(|argument| !argument.is_empty())
    }

    /// The binding's argument, or the element text when there is none.
    pub fn argument(&self) -> Option<&str> {
        self.explicit_argument()
            .or_else(|| self.element.display_text())
    }

    fn required_argument(&self, keyword: &Keyword) -> Result<&str, InterpretationError> {
        self.argument()
            .ok_or_else(|| InterpretationError::MissingArgument {
                element: self.element.order,
                keyword: keyword.name.to_string(),
            })
    }

    fn required_target(
        &self,
        keyword: &Keyword,
    ) -> Result<&Arc<TargetDescriptor>, InterpretationError> {
        self.target.ok_or_else(|| InterpretationError::MissingTarget {
            element: self.element.order,
            keyword: keyword.name.to_string(),
        })
    }

    fn presence_policy(&self, target: &TargetDescriptor) -> RetryPolicy {
        RetryPolicy::new(target.max_wait, self.config.retry_interval)
    }
}

type BuildFn = fn(&Keyword, &KeywordRequest<'_>) -> Result<Action, InterpretationError>;

/// A registered keyword.
pub struct Keyword {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub arity: Arity,
    pub target: TargetUse,
    build: BuildFn,
}

impl Keyword {
    pub const fn new(
        name: &'static str,
        aliases: &'static [&'static str],
        arity: Arity,
        target: TargetUse,
        build: BuildFn,
    ) -> Self {
        Self {
            name,
            aliases,
            arity,
            target,
            build,
        }
    }

    /// Build the delegate action for one binding. Target wrapping is the
    /// interpreter's job.
    pub fn build(&self, request: &KeywordRequest<'_>) -> Result<Action, InterpretationError> {
        match (self.arity, request.explicit_argument()) {
            (Arity::None, Some(argument)) => {
                return Err(InterpretationError::InvalidArgument {
                    element: request.element.order,
                    keyword: self.name.to_string(),
                    reason: format!("takes no argument, got '{argument}'"),
                })
            }
            (Arity::Required, None) => {
                return Err(InterpretationError::MissingArgument {
                    element: request.element.order,
                    keyword: self.name.to_string(),
                })
            }
            _ => {}
        }
        if self.target == TargetUse::Required && request.target.is_none() {
            return Err(InterpretationError::MissingTarget {
                element: request.element.order,
                keyword: self.name.to_string(),
            });
        }
        (self.build)(self, request)
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyword")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("arity", &self.arity)
            .field("target", &self.target)
            .finish()
    }
}

/// Read-only table from keyword text to [`Keyword`].
#[derive(Debug)]
pub struct KeywordRegistry {
    keywords: Vec<Keyword>,
    index: HashMap<String, usize>,
}

static STANDARD: Lazy<Arc<KeywordRegistry>> =
    Lazy::new(|| Arc::new(KeywordRegistry::new(standard_keywords())));

impl KeywordRegistry {
    /// Build a registry. Later keywords never shadow earlier names.
    pub fn new(keywords: Vec<Keyword>) -> Self {
        let mut index = HashMap::new();
        for (position, keyword) in keywords.iter().enumerate() {
            for name in std::iter::once(&keyword.name).chain(keyword.aliases.iter()) {
                index.entry(name.to_lowercase()).or_insert(position);
            }
        }
        Self { keywords, index }
    }

    /// The built-in keyword set.
    pub fn standard() -> Arc<KeywordRegistry> {
        STANDARD.clone()
    }

    pub fn lookup(&self, keyword: &str) -> Option<&Keyword> {
        self.index
            .get(&keyword.to_lowercase())
            .map(|&position| &self.keywords[position])
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter()
    }
}

fn standard_keywords() -> Vec<Keyword> {
    vec![
        Keyword::new(
            "click",
            &["leftclick", "left-click"],
            Arity::None,
            TargetUse::Required,
            |_, _| Ok(Action::left_click()),
        ),
        Keyword::new(
            "doubleclick",
            &["double-click"],
            Arity::None,
            TargetUse::Required,
            |_, _| Ok(Action::double_click()),
        ),
        Keyword::new(
            "rightclick",
            &["right-click"],
            Arity::None,
            TargetUse::Required,
            |_, _| Ok(Action::right_click()),
        ),
        Keyword::new(
            "type",
            &["input"],
            Arity::Optional,
            TargetUse::Optional,
            |keyword, request| Ok(Action::type_text(request.required_argument(keyword)?)),
        ),
        Keyword::new(
            "delay",
            &["sleep"],
            Arity::Required,
            TargetUse::Ignored,
            build_delay,
        ),
        Keyword::new("wait", &[], Arity::Optional, TargetUse::Probe, build_wait),
        Keyword::new(
            "exist",
            &["exists", "find"],
            Arity::None,
            TargetUse::Probe,
            |keyword, request| {
                let target = request.required_target(keyword)?;
                Ok(Action::retry(
                    request.presence_policy(target),
                    Action::exist(target.clone()),
                ))
            },
        ),
        Keyword::new(
            "notexist",
            &["not-exist", "vanish"],
            Arity::None,
            TargetUse::Probe,
            |keyword, request| {
                let target = request.required_target(keyword)?;
                Ok(Action::retry(
                    request.presence_policy(target),
                    Action::not_exist(target.clone()),
                ))
            },
        ),
        Keyword::new(
            "browser",
            &["open", "url"],
            Arity::Optional,
            TargetUse::Ignored,
            |keyword, request| Ok(Action::browser(request.required_argument(keyword)?)),
        ),
        Keyword::new(
            "label",
            &["show"],
            Arity::Optional,
            TargetUse::Optional,
            build_label,
        ),
        Keyword::new(
            "pause",
            &["hover"],
            Arity::None,
            TargetUse::Ignored,
            |_, request| {
                Ok(Action::wait_for_signal(
                    SignalKind::Hover,
                    request.element.wait,
                ))
            },
        ),
        Keyword::new(
            "waitclick",
            &["wait-click"],
            Arity::None,
            TargetUse::Ignored,
            |_, request| {
                Ok(Action::wait_for_signal(
                    SignalKind::Click,
                    request.element.wait,
                ))
            },
        ),
    ]
}

fn build_delay(keyword: &Keyword, request: &KeywordRequest<'_>) -> Result<Action, InterpretationError> {
    let text = request.explicit_argument().unwrap_or_default();
    let duration = parse_duration(text).map_err(|e| InterpretationError::InvalidArgument {
        element: request.element.order,
        keyword: keyword.name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Action::delay(duration))
}

/// `wait 2s` sleeps; a bare `wait` on an element with an image waits for it.
fn build_wait(keyword: &Keyword, request: &KeywordRequest<'_>) -> Result<Action, InterpretationError> {
    if request.explicit_argument().is_some() {
        return build_delay(keyword, request);
    }
    match request.target {
        Some(target) => Ok(Action::retry(
            request.presence_policy(target),
            Action::exist(target.clone()),
        )),
        None => Err(InterpretationError::MissingArgument {
            element: request.element.order,
            keyword: keyword.name.to_string(),
        }),
    }
}

fn build_label(keyword: &Keyword, request: &KeywordRequest<'_>) -> Result<Action, InterpretationError> {
    let text = request.required_argument(keyword)?;
    let font = FontStyle {
        size: request
            .element
            .font_size
            .unwrap_or(FontStyle::default().size),
        ..FontStyle::default()
    };
    Ok(Action::label(LabelSpec {
        overlay: Overlay {
            text: text.to_string(),
            font,
            position: TextPosition::Inside,
        },
        duration: request.element.duration,
    }))
}
