//! Slide model
//!
//! The engine consumes slides that an external reader has already parsed.
//! One slide is one automation step; its elements are the shapes on it.

use crate::duration::parse_duration;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shape bounds as laid out on the slide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A keyword written on an element, with its optional argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordBinding {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

impl KeywordBinding {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            argument: None,
        }
    }

    pub fn with_argument(keyword: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            argument: Some(argument.into()),
        }
    }

    /// Split "type hello world" into keyword `type` and argument `hello world`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.split_once(char::is_whitespace) {
            Some((keyword, rest)) if !rest.trim().is_empty() => {
                Self::with_argument(keyword, rest.trim())
            }
            Some((keyword, _)) => Self::new(keyword),
            None => Self::new(text),
        }
    }
}

impl<'de> Deserialize<'de> for KeywordBinding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Full {
                keyword: String,
                #[serde(default)]
                argument: Option<String>,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => KeywordBinding::parse(&text),
            Raw::Full { keyword, argument } => KeywordBinding { keyword, argument },
        })
    }
}

impl fmt::Display for KeywordBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(argument) => write!(f, "{} {}", self.keyword, argument),
            None => f.write_str(&self.keyword),
        }
    }
}

/// One shape on a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideElement {
    /// Position of the element within its slide; unique per slide.
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<KeywordBinding>,
    /// Screenshot of the visual target this element points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    /// Maximum time to wait for the target; falls back to the run default
    #[serde(
        default,
        deserialize_with = "optional_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub wait: Option<Duration>,
    /// How long a label stays on screen
    #[serde(
        default,
        deserialize_with = "optional_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

impl SlideElement {
    pub fn new(order: u32) -> Self {
        Self {
            order,
            geometry: None,
            text: None,
            keywords: Vec::new(),
            image: None,
            min_score: None,
            wait: None,
            duration: None,
            font_size: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a keyword written as on the slide, e.g. `"type hello"`.
    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keywords.push(KeywordBinding::parse(keyword));
        self
    }

    pub fn with_binding(mut self, binding: KeywordBinding) -> Self {
        self.keywords.push(binding);
        self
    }

    pub fn with_image(mut self, image: impl Into<PathBuf>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = Some(font_size);
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Text with surrounding whitespace removed, if any is left.
    pub fn display_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Short identity used in logs and reports, e.g. `#2 "Submit"`.
    pub fn describe(&self) -> String {
        match self.display_text() {
            Some(text) => format!("#{} {:?}", self.order, text),
            None => format!("#{}", self.order),
        }
    }
}

/// An ordered collection of elements forming one automation step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based position in the deck
    #[serde(default)]
    pub number: usize,
    #[serde(default)]
    pub elements: Vec<SlideElement>,
}

impl Slide {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            elements: Vec::new(),
        }
    }

    /// Append an element, assigning it the next free order index.
    pub fn push(&mut self, element: SlideElement) -> &mut Self {
        let order = self
            .elements
            .iter()
            .map(|e| e.order + 1)
            .max()
            .unwrap_or(0);
        self.elements.push(SlideElement { order, ..element });
        self
    }

    pub fn with_element(mut self, element: SlideElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Elements sorted by their order index, not by declaration order.
    pub fn ordered_elements(&self) -> Vec<&SlideElement> {
        let mut elements: Vec<&SlideElement> = self.elements.iter().collect();
        elements.sort_by_key(|e| e.order);
        elements
    }

    /// Make relative image paths relative to `base` instead of the working directory.
    pub fn resolve_images(&mut self, base: &Path) {
        for element in &mut self.elements {
            if let Some(image) = element.image.as_mut() {
                if image.is_relative() {
                    *image = base.join(&*image);
                }
            }
        }
    }
}

fn optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Millis(ms)) => Ok(Some(Duration::from_millis(ms))),
        Some(Raw::Text(text)) => parse_duration(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
