//! Slide document readers

use crate::errors::ReadError;
use crate::model::Slide;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Produces the slides of a script document, in deck order.
pub trait SlideReader: Send + Sync {
    fn supports(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> Result<Vec<Slide>, ReadError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Deck { slides: Vec<Slide> },
    Bare(Vec<Slide>),
}

/// Reads `{"slides": [...]}` or a bare array of slides from a `.json` file.
///
/// Slides are numbered from 1 in document order and relative image paths are
/// resolved against the document's directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSlideReader;

impl JsonSlideReader {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str, origin: &Path) -> Result<Vec<Slide>, ReadError> {
        let document: Document =
            serde_json::from_str(text).map_err(|source| ReadError::Decode {
                path: origin.display().to_string(),
                source,
            })?;
        let mut slides = match document {
            Document::Deck { slides } | Document::Bare(slides) => slides,
        };

        let base = origin.parent().unwrap_or_else(|| Path::new(""));
        for (index, slide) in slides.iter_mut().enumerate() {
            slide.number = index + 1;
            slide.resolve_images(base);
        }
        Ok(slides)
    }
}

impl SlideReader for JsonSlideReader {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    fn read(&self, path: &Path) -> Result<Vec<Slide>, ReadError> {
        if !self.supports(path) {
            return Err(ReadError::Unsupported(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ReadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let slides = self.parse(&text, path)?;
        info!(path = %path.display(), slides = slides.len(), "Script loaded");
        Ok(slides)
    }
}
