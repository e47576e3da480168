//! Line input.
//!
//! The session waits for input and inbound events at the same time, so
//! [`InputSource::read_line`] must be cancel-safe: dropping the future before
//! it resolves loses nothing, and the next call picks up the same pending line.

use std::sync::mpsc as std_mpsc;
use std::thread;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// One outcome of prompting the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A line, without its trailing newline.
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or closed stdin.
    Eof,
}

/// Source of input lines.
#[async_trait::async_trait]
pub trait InputSource: Send {
    /// Shows `prompt` (unless a previous prompt is still pending) and waits for
    /// the next line.
    async fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;
}

/// Interactive terminal input backed by `rustyline`.
///
/// The editor blocks, so it lives on its own thread and is driven by prompt
/// requests; lines come back over a channel whose receive side is
/// cancel-safe.
pub struct ConsoleInput {
    prompts: std_mpsc::Sender<String>,
    lines: mpsc::UnboundedReceiver<Result<InputEvent>>,
    pending: bool,
}

impl ConsoleInput {
    /// Starts the editor thread.
    pub fn spawn() -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        let (prompts, prompt_rx) = std_mpsc::channel::<String>();
        let (line_tx, lines) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("revolt-cli-input".to_string())
            .spawn(move || {
                while let Ok(prompt) = prompt_rx.recv() {
                    let event = match editor.readline(&prompt) {
                        Ok(line) => {
                            if !line.trim().is_empty() {
                                let _ = editor.add_history_entry(line.as_str());
                            }
                            Ok(InputEvent::Line(line))
                        }
                        Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
                        Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
                        Err(err) => Err(Error::from(err)),
                    };
                    if line_tx.send(event).is_err() {
                        break;
                    }
                }
            })
            .map_err(|err| Error::io("failed to start the input thread", err))?;
        Ok(Self {
            prompts,
            lines,
            pending: false,
        })
    }
}

#[async_trait::async_trait]
impl InputSource for ConsoleInput {
    async fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        if !self.pending {
            self.prompts
                .send(prompt.to_string())
                .map_err(|_| Error::terminal("input thread stopped"))?;
            self.pending = true;
        }
        let event = self
            .lines
            .recv()
            .await
            .ok_or_else(|| Error::terminal("input thread stopped"))?;
        self.pending = false;
        event
    }
}
