//! Renderers turn an [`ExecutedDocument`] into artifact bytes.
//!
//! Rendering is pure: no I/O, and the same document always yields the same
//! bytes.

mod html;
mod notebook;
mod script;

pub use html::HtmlRenderer;
pub use notebook::NotebookRenderer;
pub use script::ScriptRenderer;

use crate::error::RenderingError;
use crate::executed::ExecutedDocument;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Jupyter notebook (nbformat 4.5) with outputs.
    #[default]
    Notebook,
    /// Standalone static HTML page.
    Html,
    /// Plain Python script.
    Script,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notebook => "notebook",
            Self::Html => "html",
            Self::Script => "script",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Notebook => "ipynb",
            Self::Html => "html",
            Self::Script => "py",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ipynb" => Some(Self::Notebook),
            "html" | "htm" => Some(Self::Html),
            "py" => Some(Self::Script),
            _ => None,
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = RenderingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notebook" | "ipynb" => Ok(Self::Notebook),
            "html" => Ok(Self::Html),
            "script" | "py" | "python" => Ok(Self::Script),
            other => Err(RenderingError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Produces artifact bytes for one format.
pub trait Renderer: Send + Sync {
    fn format(&self) -> TargetFormat;

    fn render(&self, document: &ExecutedDocument) -> Result<Vec<u8>, RenderingError>;
}

/// Built-in renderer for a format.
pub fn renderer_for(format: TargetFormat) -> Box<dyn Renderer> {
    match format {
        TargetFormat::Notebook => Box::new(NotebookRenderer),
        TargetFormat::Html => Box::new(HtmlRenderer),
        TargetFormat::Script => Box::new(ScriptRenderer),
    }
}

/// Split text into notebook-style source lines, keeping line endings.
pub(crate) fn source_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_format_parsing() {
        assert_eq!("HTML".parse::<TargetFormat>().unwrap(), TargetFormat::Html);
        assert_eq!("ipynb".parse::<TargetFormat>().unwrap(), TargetFormat::Notebook);
        assert!(matches!(
            "pdf".parse::<TargetFormat>(),
            Err(RenderingError::UnsupportedFormat(f)) if f == "pdf"
        ));
        assert_eq!(TargetFormat::from_extension("py"), Some(TargetFormat::Script));
    }

    #[test]
    fn test_renderer_for_matches_format() {
        for format in [TargetFormat::Notebook, TargetFormat::Html, TargetFormat::Script] {
            assert_eq!(renderer_for(format).format(), format);
        }
    }

    #[test]
    fn test_source_lines() {
        assert_eq!(source_lines("a\nb"), vec!["a\n", "b"]);
        assert!(source_lines("").is_empty());
    }
}
