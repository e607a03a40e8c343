//! Execution engine backed by a persistent `python3` subprocess.
//!
//! The driver script is embedded at compile time and passed to the
//! interpreter with `-c`. Requests and responses are exchanged as one JSON
//! object per line over the child's stdin/stdout:
//!
//! ```text
//! -> {"index": 3, "code": "df.describe()"}
//! <- {"status": "ok", "stdout": "", "display": "...", "figures": []}
//! <- {"status": "error", "ename": "KeyError", "evalue": "'age'", "traceback": [...]}
//! ```

use super::engine::{CellFailure, ExecutionEngine, ExecutionSession};
use crate::cell::Cell;
use crate::error::ExportError;
use crate::executed::{CellOutput, Figure};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// Source of the cell driver run inside the interpreter.
pub const DRIVER_SOURCE: &str = include_str!("driver.py");

/// Runs cells in a `python3` process that lives for one export.
#[derive(Debug, Clone)]
pub struct PythonEngine {
    interpreter: PathBuf,
    working_dir: Option<PathBuf>,
}

impl Default for PythonEngine {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            working_dir: None,
        }
    }
}

impl PythonEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific interpreter, e.g. one from a virtual environment.
    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter = path.into();
        self
    }

    /// Directory the interpreter runs in; relative paths in load code
    /// resolve against it.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl ExecutionEngine for PythonEngine {
    fn name(&self) -> &'static str {
        "python"
    }

    fn open_session(&self) -> Result<Box<dyn ExecutionSession>, ExportError> {
        let mut command = Command::new(&self.interpreter);
        command
            .arg("-u")
            .arg("-c")
            .arg(DRIVER_SOURCE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            ExportError::Session(format!(
                "failed to start {}: {}",
                self.interpreter.display(),
                e
            ))
        })?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExportError::Session(
                "interpreter pipes unavailable".to_string(),
            ));
        };

        info!(interpreter = %self.interpreter.display(), pid = child.id(), "Started Python session");
        Ok(Box::new(PythonSession {
            child: Some(child),
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        }))
    }
}

struct PythonSession {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DriverResponse {
    Ok {
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        display: Option<String>,
        #[serde(default)]
        figures: Vec<Figure>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl PythonSession {
    fn exchange(&mut self, index: usize, code: &str) -> Result<DriverResponse, String> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| "session already closed".to_string())?;
        let request = serde_json::json!({ "index": index, "code": code });
        writeln!(stdin, "{}", request).map_err(|e| format!("write to interpreter: {}", e))?;
        stdin
            .flush()
            .map_err(|e| format!("flush to interpreter: {}", e))?;

        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .map_err(|e| format!("read from interpreter: {}", e))?;
        if read == 0 {
            return Err("interpreter exited".to_string());
        }
        serde_json::from_str(&line).map_err(|e| format!("malformed driver response: {}", e))
    }
}

impl ExecutionSession for PythonSession {
    fn run_cell(&mut self, index: usize, cell: &Cell) -> Result<CellOutput, CellFailure> {
        debug!(index, "Sending cell to interpreter");
        match self.exchange(index, cell.content()) {
            Ok(DriverResponse::Ok {
                stdout,
                display,
                figures,
            }) => Ok(CellOutput {
                stdout,
                display,
                figures,
            }),
            Ok(DriverResponse::Error {
                ename,
                evalue,
                traceback,
            }) => Err(CellFailure::Raised {
                ename,
                evalue,
                traceback,
            }),
            Err(message) => {
                warn!(index, "{}", message);
                Err(CellFailure::Session(message))
            }
        }
    }

    fn close(&mut self) {
        // Dropping stdin sends EOF so the driver loop ends on its own.
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
            debug!("Python session closed");
        }
    }
}

impl Drop for PythonSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_is_embedded() {
        assert!(DRIVER_SOURCE.contains("def main():"));
        assert!(DRIVER_SOURCE.contains("\"status\": \"error\""));
    }

    #[test]
    fn test_driver_response_parsing() {
        let ok: DriverResponse = serde_json::from_str(
            r#"{"status": "ok", "stdout": "1\n", "display": null, "figures": [{"mime_type": "image/png", "data": "AA=="}]}"#,
        )
        .unwrap();
        assert!(matches!(ok, DriverResponse::Ok { ref figures, .. } if figures.len() == 1));

        let err: DriverResponse = serde_json::from_str(
            r#"{"status": "error", "stdout": "", "ename": "KeyError", "evalue": "'x'", "traceback": []}"#,
        )
        .unwrap();
        assert!(matches!(err, DriverResponse::Error { ref ename, .. } if ename == "KeyError"));
    }

    #[test]
    fn test_missing_interpreter_is_session_error() {
        let engine = PythonEngine::new().interpreter("/nonexistent/python-lex-eda");
        let err = engine.open_session().err().unwrap();
        assert_eq!(err.error_code(), "SESSION_ERROR");
    }
}
