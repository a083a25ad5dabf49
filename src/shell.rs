//! Interactive query shell.
//!
//! Lines come from a [`LineSource`]: a rustyline editor when stdin is a
//! terminal, or plain buffered lines when input is piped.

use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;

use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{PortalError, Result};
use crate::query::{QueryRequest, Scope};
use crate::render::{render_output, OutputFormat};
use crate::workflow::{RunOutcome, Workflow};

const SHELL_HELP: &str = "Enter one SQL query per line.
  :scope <All|NBCU>  - Change the dataset scope
  :help              - Show this help message
  :quit, :exit       - Leave the shell";

/// Supplies shell input one line at a time.
#[async_trait]
pub trait LineSource: Send {
    /// Returns the next line, or `None` when the user is done.
    async fn next_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Lines from a non-interactive reader. Prompts are not shown.
pub struct PipedLines<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> PipedLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for PipedLines<R> {
    async fn next_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .map_err(|e| PortalError::internal(format!("Failed to read input: {e}")))
    }
}

type EditorReply = std::result::Result<Option<String>, String>;

/// Line editor with persistent history.
///
/// rustyline blocks on the terminal, so the editor lives on its own thread.
/// Each prompt is sent to that thread and the line comes back over a channel.
pub struct LineEditor {
    prompts: std_mpsc::Sender<String>,
    replies: mpsc::Receiver<EditorReply>,
}

impl LineEditor {
    /// Starts the editor thread.
    pub fn spawn() -> Result<Self> {
        let (prompt_tx, prompt_rx) = std_mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel(1);

        std::thread::Builder::new()
            .name("cleanroom-readline".to_string())
            .spawn(move || edit_lines(prompt_rx, reply_tx))
            .map_err(|e| PortalError::internal(format!("Failed to start line editor: {e}")))?;

        Ok(Self {
            prompts: prompt_tx,
            replies: reply_rx,
        })
    }
}

#[async_trait]
impl LineSource for LineEditor {
    async fn next_line(&mut self, prompt: &str) -> Result<Option<String>> {
        // A closed editor thread may still have a reply queued.
        let _ = self.prompts.send(prompt.to_string());
        match self.replies.recv().await {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => Err(PortalError::internal(format!("Failed to read input: {e}"))),
            None => Ok(None),
        }
    }
}

/// Where shell history is kept, if the platform has a data directory.
pub fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("cleanroom-portal").join("history.txt"))
}

fn open_editor(history: Option<&PathBuf>) -> std::result::Result<DefaultEditor, ReadlineError> {
    let config = rustyline::Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut editor = DefaultEditor::with_config(config)?;

    if let Some(path) = history.filter(|path| path.exists()) {
        if let Err(e) = editor.load_history(path) {
            warn!("Failed to load shell history: {e}");
        }
    }
    Ok(editor)
}

fn edit_lines(prompts: std_mpsc::Receiver<String>, replies: mpsc::Sender<EditorReply>) {
    let history = history_path().filter(|path| {
        path.parent()
            .map_or(true, |dir| std::fs::create_dir_all(dir).is_ok())
    });
    let mut editor = match open_editor(history.as_ref()) {
        Ok(editor) => editor,
        Err(e) => {
            let _ = replies.blocking_send(Err(e.to_string()));
            return;
        }
    };

    while let Ok(prompt) = prompts.recv() {
        let reply = match editor.readline(&prompt) {
            Ok(line) => {
                if let Some(path) = &history {
                    if let Err(e) = editor.save_history(path) {
                        warn!("Failed to save shell history: {e}");
                    }
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(None),
            Err(e) => Err(e.to_string()),
        };
        if replies.blocking_send(reply).is_err() {
            break;
        }
    }
    debug!("Line editor closed");
}

/// Counts of what a shell session did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShellSummary {
    pub runs: usize,
    pub failures: usize,
}

/// Runs queries read from `input` until it ends or the user types `:quit`.
///
/// Failed runs are reported and the session continues.
pub async fn run_shell(
    workflow: &mut Workflow,
    initial_scope: Scope,
    input: &mut dyn LineSource,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<ShellSummary> {
    let mut scope = initial_scope;
    let mut summary = ShellSummary::default();

    loop {
        let prompt = format!("cleanroom[{scope}]> ");
        let Some(line) = input.next_line(&prompt).await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            ":quit" | ":exit" => break,
            ":help" => {
                eprintln!("{SHELL_HELP}");
                continue;
            }
            _ => {}
        }

        if let Some(arg) = line.strip_prefix(":scope") {
            match arg.parse::<Scope>() {
                Ok(next) => {
                    scope = next;
                    eprintln!("Scope set to {scope}");
                }
                Err(e) => eprintln!("{e}"),
            }
            continue;
        }

        summary.runs += 1;
        match workflow.run_query(&QueryRequest::new(line, scope)).await {
            RunOutcome::Done(output) => {
                out.write_all(render_output(&output, format)?.as_bytes())
                    .and_then(|_| out.flush())
                    .map_err(|e| PortalError::internal(format!("Failed to write output: {e}")))?;
            }
            RunOutcome::Failed(_) => summary.failures += 1,
        }
    }

    Ok(summary)
}
