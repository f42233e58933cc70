//! Output filename templates with a `[name]` placeholder.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

const NAME: &str = "[name]";

/// A relative output path such as `static/js/[name].bundle.js`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilenamePattern(String);

impl FilenamePattern {
    /// Accepts relative `/`-separated patterns containing `[name]`.
    ///
    /// The error is a short reason, meant to follow the config field name.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        if !pattern.contains(NAME) {
            return Err(format!("`{pattern}` must contain `{NAME}`"));
        }
        let escapes = Path::new(pattern)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || pattern.contains('\\') {
            return Err(format!("`{pattern}` must be a relative `/`-separated path"));
        }
        Ok(Self(pattern.to_owned()))
    }

    /// Output path relative to the output root.
    pub fn render(&self, name: &str) -> PathBuf {
        PathBuf::from(self.0.replace(NAME, name))
    }
}
