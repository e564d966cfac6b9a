//! External-command decision engine.
//!
//! The reasoning backend is whatever command the user configures. Each
//! decision spawns the command once, feeds the JSON [`EngineContext`] to its
//! stdin, and reads exactly one JSON decision object from its stdout.

use std::process::Stdio;
use std::time::Duration;

use quill_core::{Decision, DecisionEngine, EngineContext, EngineError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Decision engine backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandEngine {
    /// Create an engine from a program-plus-arguments command line.
    ///
    /// # Errors
    /// Returns error if the command is empty.
    pub fn new(command: Vec<String>, timeout: Duration) -> anyhow::Result<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("engine command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

impl DecisionEngine for CommandEngine {
    async fn decide(&self, ctx: &EngineContext<'_>) -> Result<Decision, EngineError> {
        let payload =
            serde_json::to_vec(ctx).map_err(|e| EngineError::Backend(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Engine diagnostics flow straight to the operator's terminal.
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Backend(format!("failed to spawn '{}': {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Backend("engine stdin unavailable".into()))?;
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| EngineError::Backend(format!("failed to write context: {e}")))?;
        // Close stdin so the engine sees EOF and knows the context is complete.
        drop(stdin);

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                EngineError::Backend(format!(
                    "engine timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| EngineError::Backend(e.to_string()))?;

        if !output.status.success() {
            return Err(EngineError::Backend(format!(
                "engine exited with {}",
                output.status
            )));
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::Malformed(format!("engine output is not JSON: {e}")))?;
        debug!(op = ?value.get("op"), "engine replied");
        Decision::from_json(&value)
    }
}
