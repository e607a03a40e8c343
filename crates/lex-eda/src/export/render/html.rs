//! Standalone HTML renderer.
//!
//! Markdown cells are converted with pulldown-cmark, code cells are shown as
//! escaped `<pre><code>` blocks followed by their outputs. Figures are inlined
//! as `data:` URIs so the page has no external assets.

use super::{Renderer, TargetFormat};
use crate::cell::CellKind;
use crate::error::RenderingError;
use crate::executed::{CellOutput, CellResult, ExecutedCell, ExecutedDocument, Figure};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use pulldown_cmark::{Event, Options, Parser, html};

const STYLE: &str = r#"body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; max-width: 960px; margin: 2em auto; padding: 0 1em; color: #222; }
pre { background: #f6f8fa; padding: 0.8em; overflow-x: auto; border-radius: 4px; }
.cell-code pre { border-left: 3px solid #4a90d9; }
.output pre { background: #fff; border: 1px solid #eee; }
.error pre { background: #fdecea; border-left: 3px solid #d93025; }
img { max-width: 100%; }
table { border-collapse: collapse; }
td, th { border: 1px solid #ddd; padding: 6px; }"#;

/// Writes a single self-contained HTML page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn format(&self) -> TargetFormat {
        TargetFormat::Html
    }

    fn render(&self, document: &ExecutedDocument) -> Result<Vec<u8>, RenderingError> {
        let mut body = String::new();
        for (index, executed) in document.cells.iter().enumerate() {
            render_cell(&mut body, index, executed)?;
        }

        let page = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n{}</body>\n</html>\n",
            escape(&document.title),
            STYLE,
            body
        );
        Ok(page.into_bytes())
    }
}

fn render_cell(out: &mut String, index: usize, executed: &ExecutedCell) -> Result<(), RenderingError> {
    match executed.cell.kind() {
        CellKind::Markdown => {
            out.push_str(&format!("<div class=\"cell cell-markdown\" id=\"cell-{}\">\n", index));
            out.push_str(&markdown_to_html(executed.cell.content()));
            out.push_str("</div>\n");
        }
        CellKind::Code => {
            out.push_str(&format!(
                "<div class=\"cell cell-code\" id=\"cell-{}\" data-section=\"{}\">\n",
                index,
                escape(&executed.section)
            ));
            out.push_str(&format!(
                "<pre><code class=\"language-python\">{}</code></pre>\n",
                escape(executed.cell.content())
            ));
            match &executed.result {
                CellResult::Success(output) => render_output(out, output)?,
                CellResult::Failure(error) => {
                    let detail = if error.traceback.is_empty() {
                        format!("{}: {}", error.ename, error.evalue)
                    } else {
                        error.traceback.concat()
                    };
                    out.push_str(&format!(
                        "<div class=\"error\"><pre>{}</pre></div>\n",
                        escape(detail.trim_end())
                    ));
                }
            }
            out.push_str("</div>\n");
        }
    }
    Ok(())
}

fn render_output(out: &mut String, output: &CellOutput) -> Result<(), RenderingError> {
    if output.is_empty() {
        return Ok(());
    }
    out.push_str("<div class=\"output\">\n");
    if !output.stdout.is_empty() {
        out.push_str(&format!("<pre>{}</pre>\n", escape(output.stdout.trim_end())));
    }
    for figure in &output.figures {
        out.push_str(&figure_tag(figure)?);
        out.push('\n');
    }
    if let Some(display) = &output.display {
        out.push_str(&format!("<pre>{}</pre>\n", escape(display)));
    }
    out.push_str("</div>\n");
    Ok(())
}

fn figure_tag(figure: &Figure) -> Result<String, RenderingError> {
    STANDARD.decode(figure.data.as_bytes()).map_err(|e| {
        RenderingError::Failed(format!("figure is not valid base64: {}", e))
    })?;
    Ok(format!(
        "<img src=\"data:{};base64,{}\" alt=\"figure\">",
        escape(&figure.mime_type),
        figure.data
    ))
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    // Raw HTML in cells is shown as text, never passed through.
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::error::CellExecutionError;

    fn render(document: &ExecutedDocument) -> String {
        String::from_utf8(HtmlRenderer.render(document).unwrap()).unwrap()
    }

    #[test]
    fn test_markdown_and_code() {
        let mut doc = ExecutedDocument::new("EDA <Titanic>", true);
        doc.push("report", Cell::markdown("# EDA\n\n**bold**"), CellResult::Success(CellOutput::empty()));
        doc.push(
            "Overview",
            Cell::code("df[df['age'] > 3]"),
            CellResult::Success(CellOutput {
                display: Some("<DataFrame>".to_string()),
                ..CellOutput::default()
            }),
        );

        let html = render(&doc);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>EDA &lt;Titanic&gt;</title>"));
        assert!(html.contains("<h1>EDA</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("df[df[&#39;age&#39;] &gt; 3]"));
        assert!(html.contains("<pre>&lt;DataFrame&gt;</pre>"));
    }

    #[test]
    fn test_raw_html_in_markdown_is_escaped() {
        let mut doc = ExecutedDocument::new("EDA", true);
        doc.push(
            "Univariate Analysis",
            Cell::markdown("### <img src=x onerror=alert(1)>\n\n<script>alert(2)</script>"),
            CellResult::Success(CellOutput::empty()),
        );

        let html = render(&doc);
        assert!(!html.contains("<img src=x"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
    }

    #[test]
    fn test_figures_are_inlined() {
        let data = STANDARD.encode(b"\x89PNG fake");
        let mut doc = ExecutedDocument::new("EDA", true);
        doc.push(
            "Univariate Analysis",
            Cell::code("histogram(df['age'])"),
            CellResult::Success(CellOutput {
                figures: vec![Figure::png(data.clone())],
                ..CellOutput::default()
            }),
        );

        let html = render(&doc);
        assert!(html.contains(&format!("src=\"data:image/png;base64,{}\"", data)));
    }

    #[test]
    fn test_invalid_figure_fails() {
        let mut doc = ExecutedDocument::new("EDA", true);
        doc.push(
            "Overview",
            Cell::code("plt.show()"),
            CellResult::Success(CellOutput {
                figures: vec![Figure::png("not base64!")],
                ..CellOutput::default()
            }),
        );
        assert!(matches!(
            HtmlRenderer.render(&doc),
            Err(RenderingError::Failed(_))
        ));
    }

    #[test]
    fn test_error_block() {
        let mut doc = ExecutedDocument::new("EDA", true);
        doc.push(
            "Correlation",
            Cell::code("plot_correlations(df)"),
            CellResult::Failure(CellExecutionError {
                cell_index: 0,
                section: "Correlation".to_string(),
                ename: "ValueError".to_string(),
                evalue: "empty".to_string(),
                traceback: vec![],
            }),
        );

        let html = render(&doc);
        assert!(html.contains("<div class=\"error\"><pre>ValueError: empty</pre></div>"));
        assert!(html.contains("data-section=\"Correlation\""));
    }
}
