//! Jupyter notebook (nbformat 4.5) renderer.

use super::{Renderer, TargetFormat, source_lines};
use crate::cell::CellKind;
use crate::error::RenderingError;
use crate::executed::{CellResult, ExecutedCell, ExecutedDocument};
use serde_json::{Value, json};

/// Writes an `.ipynb` document, outputs included.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotebookRenderer;

impl Renderer for NotebookRenderer {
    fn format(&self) -> TargetFormat {
        TargetFormat::Notebook
    }

    fn render(&self, document: &ExecutedDocument) -> Result<Vec<u8>, RenderingError> {
        let mut execution_count = 0u64;
        let cells: Vec<Value> = document
            .cells
            .iter()
            .enumerate()
            .map(|(index, executed)| match executed.cell.kind() {
                CellKind::Markdown => markdown_cell(index, executed),
                CellKind::Code => {
                    let count = if document.executed {
                        execution_count += 1;
                        json!(execution_count)
                    } else {
                        Value::Null
                    };
                    code_cell(index, executed, count)
                }
            })
            .collect();

        let notebook = json!({
            "cells": cells,
            "metadata": {
                "kernelspec": {
                    "display_name": "Python 3",
                    "language": "python",
                    "name": "python3"
                },
                "language_info": {
                    "name": "python"
                },
                "title": document.title,
            },
            "nbformat": 4,
            "nbformat_minor": 5
        });

        let mut bytes = serde_json::to_vec_pretty(&notebook)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn markdown_cell(index: usize, executed: &ExecutedCell) -> Value {
    json!({
        "cell_type": "markdown",
        "id": cell_id(index),
        "metadata": {},
        "source": source_lines(executed.cell.content()),
    })
}

fn code_cell(index: usize, executed: &ExecutedCell, execution_count: Value) -> Value {
    json!({
        "cell_type": "code",
        "execution_count": execution_count.clone(),
        "id": cell_id(index),
        "metadata": { "section": executed.section },
        "outputs": outputs(&executed.result, execution_count),
        "source": source_lines(executed.cell.content()),
    })
}

fn cell_id(index: usize) -> String {
    format!("cell-{}", index)
}

fn outputs(result: &CellResult, execution_count: Value) -> Vec<Value> {
    match result {
        CellResult::Success(output) => {
            let mut outputs = Vec::new();
            if !output.stdout.is_empty() {
                outputs.push(json!({
                    "name": "stdout",
                    "output_type": "stream",
                    "text": source_lines(&output.stdout),
                }));
            }
            for figure in &output.figures {
                outputs.push(json!({
                    "data": { (figure.mime_type.as_str()): figure.data },
                    "metadata": {},
                    "output_type": "display_data",
                }));
            }
            if let Some(display) = &output.display {
                outputs.push(json!({
                    "data": { "text/plain": source_lines(display) },
                    "execution_count": execution_count,
                    "metadata": {},
                    "output_type": "execute_result",
                }));
            }
            outputs
        }
        CellResult::Failure(error) => {
            let traceback = if error.traceback.is_empty() {
                vec![format!("{}: {}", error.ename, error.evalue)]
            } else {
                error.traceback.clone()
            };
            vec![json!({
                "ename": error.ename,
                "evalue": error.evalue,
                "output_type": "error",
                "traceback": traceback,
            })]
        }
    }
}
