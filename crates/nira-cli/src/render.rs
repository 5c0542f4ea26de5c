//! Line-mode rendering of session events

use std::future::Future;
use std::io::{self, Write};

use nira_engine::Role;
use nira_session::{Generation, SessionEvent, SessionState};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::transcript_log::TranscriptLog;

const BAR_WIDTH: usize = 24;
const THINKING: &str = "Thinking…";

/// Draws progress, streaming text and failures, and mirrors the
/// transcript into the log.
pub struct Renderer<W: Write> {
    out: W,
    log: Option<TranscriptLog>,
    /// Text of the current turn already written to `out`
    shown: String,
    streaming: Option<Generation>,
    thinking: bool,
    progress_open: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, log: Option<TranscriptLog>) -> Self {
        Self {
            out,
            log,
            shown: String::new(),
            streaming: None,
            thinking: false,
            progress_open: false,
        }
    }

    /// Run `operation`, rendering events as they arrive.
    ///
    /// Events already queued when the operation returns are rendered
    /// before its output is handed back.
    pub async fn drive<F: Future>(
        &mut self,
        events: &mut broadcast::Receiver<SessionEvent>,
        operation: F,
    ) -> F::Output {
        tokio::pin!(operation);
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(event) => self.render_logged(&event),
                    Err(RecvError::Lagged(n)) => tracing::warn!("Renderer skipped {} events", n),
                    Err(RecvError::Closed) => return operation.await,
                },
                output = &mut operation => {
                    self.drain(events);
                    return output;
                }
            }
        }
    }

    /// Render every event already queued
    pub fn drain(&mut self, events: &mut broadcast::Receiver<SessionEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.render_logged(&event),
                Err(TryRecvError::Lagged(n)) => tracing::warn!("Renderer skipped {} events", n),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    fn render_logged(&mut self, event: &SessionEvent) {
        if let Err(e) = self.render(event) {
            tracing::warn!("Failed to render event: {}", e);
        }
        if let Err(e) = self.log(event) {
            tracing::warn!("Failed to write transcript log: {}", e);
            self.log = None;
        }
    }

    pub fn render(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::Progress { percent, message } => {
                write!(self.out, "\r\x1b[K{} {:>3}% {}", bar(*percent), percent, message)?;
                self.progress_open = true;
            }
            // The load reports several 100% stages; the line ends with the load
            SessionEvent::StateChanged { state } => {
                if matches!(state, SessionState::Ready | SessionState::Error) {
                    self.close_progress()?;
                }
            }
            SessionEvent::TranscriptReset { .. } => {
                self.end_turn()?;
            }
            SessionEvent::TranscriptAppended { message } => match message.role {
                Role::User => {
                    self.end_turn()?;
                    write!(self.out, "{}", THINKING)?;
                    self.thinking = true;
                }
                Role::Assistant => {
                    self.clear_thinking()?;
                    if let Some(rest) = message.content.strip_prefix(self.shown.as_str()) {
                        write!(self.out, "{}", rest)?;
                    }
                    writeln!(self.out)?;
                    self.reset_turn();
                }
                Role::System => {}
            },
            SessionEvent::StreamingUpdate { generation, text } => {
                if self.streaming != Some(*generation) {
                    self.end_turn()?;
                    self.streaming = Some(*generation);
                }
                self.clear_thinking()?;
                if let Some(rest) = text.strip_prefix(self.shown.as_str()) {
                    write!(self.out, "{}", rest)?;
                    self.shown = text.clone();
                }
            }
            SessionEvent::TurnFailed { notice, .. } => {
                self.clear_thinking()?;
                if !self.shown.is_empty() {
                    writeln!(self.out)?;
                }
                writeln!(self.out, "{}", notice)?;
                self.reset_turn();
            }
            SessionEvent::UsageUpdated { .. } => {}
            SessionEvent::Error { message, .. } => {
                self.close_progress()?;
                writeln!(self.out, "Error: {}", message)?;
            }
        }
        self.out.flush()
    }

    fn log(&mut self, event: &SessionEvent) -> io::Result<()> {
        let Some(log) = self.log.as_mut() else {
            return Ok(());
        };
        match event {
            SessionEvent::TranscriptAppended { message } => log.log_message(message),
            SessionEvent::TranscriptReset { system_prompt } => log.log_reset(system_prompt),
            SessionEvent::UsageUpdated { tally } if tally.turns > 0 => log.log_usage(tally),
            _ => Ok(()),
        }
    }

    fn close_progress(&mut self) -> io::Result<()> {
        if self.progress_open {
            writeln!(self.out)?;
            self.progress_open = false;
        }
        Ok(())
    }

    fn clear_thinking(&mut self) -> io::Result<()> {
        if self.thinking {
            write!(self.out, "\r\x1b[K")?;
            self.thinking = false;
        }
        Ok(())
    }

    /// Close a turn that ended without a final message (reset or superseded)
    fn end_turn(&mut self) -> io::Result<()> {
        self.clear_thinking()?;
        if !self.shown.is_empty() {
            writeln!(self.out, " […]")?;
        }
        self.reset_turn();
        Ok(())
    }

    fn reset_turn(&mut self) {
        self.shown.clear();
        self.streaming = None;
        self.thinking = false;
    }
}

fn bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}
