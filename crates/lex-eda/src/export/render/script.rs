//! Python script renderer using the percent cell format (`# %%`), which
//! Jupytext, VS Code and Spyder read back as cells. Outputs are dropped.

use super::{Renderer, TargetFormat};
use crate::cell::CellKind;
use crate::error::RenderingError;
use crate::executed::ExecutedDocument;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptRenderer;

impl Renderer for ScriptRenderer {
    fn format(&self) -> TargetFormat {
        TargetFormat::Script
    }

    fn render(&self, document: &ExecutedDocument) -> Result<Vec<u8>, RenderingError> {
        let mut out = String::new();
        for (i, executed) in document.cells.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let content = executed.cell.content().trim_end();
            match executed.cell.kind() {
                CellKind::Markdown => {
                    out.push_str("# %% [markdown]\n");
                    for line in content.lines() {
                        if line.is_empty() {
                            out.push_str("#\n");
                        } else {
                            out.push_str("# ");
                            out.push_str(line);
                            out.push('\n');
                        }
                    }
                }
                CellKind::Code => {
                    out.push_str("# %%\n");
                    out.push_str(content);
                    out.push('\n');
                }
            }
        }
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::executed::{CellOutput, CellResult};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percent_format() {
        let mut doc = ExecutedDocument::new("EDA", true);
        let ok = || CellResult::Success(CellOutput::empty());
        doc.push("report", Cell::markdown("# EDA\n\nIntro"), ok());
        doc.push("report", Cell::code("import pandas as pd\n"), ok());
        doc.push(
            "Overview",
            Cell::code("overview(df)"),
            CellResult::Success(CellOutput {
                stdout: "ignored".to_string(),
                ..CellOutput::default()
            }),
        );

        let script = String::from_utf8(ScriptRenderer.render(&doc).unwrap()).unwrap();
        assert_eq!(
            script,
            "# %% [markdown]\n# # EDA\n#\n# Intro\n\n# %%\nimport pandas as pd\n\n# %%\noverview(df)\n"
        );
    }
}
