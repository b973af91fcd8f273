//! A [`TextGenerator`] backed by an external command.
//!
//! The prompt is written to the child's stdin and the reply is read from
//! its stdout, which fits most LLM command-line clients.

use std::io;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::TextGenerator;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must not leave the child running.
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start proposer command: {}", self.command_line()))?;

        // Feed stdin from its own task so a child that writes before it has
        // read everything cannot fill the stdout pipe and stall both sides.
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.to_owned();
            tokio::spawn(async move {
                match stdin.write_all(prompt.as_bytes()).await {
                    // The child may exit without reading its input.
                    Err(err) if err.kind() != io::ErrorKind::BrokenPipe => Err(err),
                    _ => Ok(()),
                }
            })
        });

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("failed to wait on proposer command: {}", self.command_line()))?;

        if let Some(writer) = writer {
            writer
                .await
                .context("proposer stdin writer panicked")?
                .context("failed to write prompt to proposer stdin")?;
        }

        debug!(
            command = %self.command_line(),
            status = %output.status,
            stdout_len = output.stdout.len(),
            "proposer command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "proposer command {} exited with {}: {}",
                self.command_line(),
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
