use std::io::BufRead;

use async_trait::async_trait;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt, Stdout},
    sync::{mpsc, Mutex},
};

use acb_core::{errors::Error, ports::InputPrompt, Result};

/// Login prompts on the terminal.
///
/// Lines are read by a plain thread rather than `tokio::io::stdin`, so a
/// pending read never holds up runtime shutdown on Ctrl+C.
pub struct TerminalPrompt<W = Stdout> {
    lines: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    out: Mutex<W>,
}

impl TerminalPrompt<Stdout> {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(None),
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for TerminalPrompt<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> TerminalPrompt<W> {
    pub fn with_lines(lines: mpsc::UnboundedReceiver<String>, out: W) -> Self {
        Self {
            lines: Mutex::new(Some(lines)),
            out: Mutex::new(out),
        }
    }

    pub fn into_output(self) -> W {
        self.out.into_inner()
    }
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        // The sender was dropped with the closure, so reads report a closed input.
        tracing::error!(error = %e, "cannot start stdin reader");
    }
    rx
}

#[async_trait]
impl<W> InputPrompt for TerminalPrompt<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn text(&self, prompt: &str) -> Result<String> {
        {
            let mut out = self.out.lock().await;
            out.write_all(prompt.as_bytes()).await?;
            out.flush().await?;
        }

        let mut lines = self.lines.lock().await;
        let rx = lines.get_or_insert_with(spawn_stdin_reader);
        rx.recv()
            .await
            .ok_or_else(|| Error::Input("stdin closed".to_string()))
    }
}
