//! Append-only JSONL log of a chat session

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nira_engine::ChatMessage;
use nira_session::UsageTally;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Log entry types for JSONL format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    /// Session metadata, always the first line
    Metadata {
        id: String,
        created_at: i64,
        model: String,
    },
    /// The conversation started over
    Reset { system_prompt: String, timestamp: i64 },
    /// A message appended to the transcript
    Message { message: ChatMessage, timestamp: i64 },
    /// The running token tally after a turn
    Usage {
        prompt_tokens: u64,
        completion_tokens: u64,
        timestamp: i64,
    },
}

/// Writer for one session's transcript log
pub struct TranscriptLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TranscriptLog {
    /// Get the transcripts directory
    pub fn transcripts_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nira")
            .join("transcripts")
    }

    /// Create the log for a session in the default directory
    pub fn create(session_id: Uuid, model: &str) -> std::io::Result<Self> {
        Self::create_in(&Self::transcripts_dir(), session_id, model)
    }

    pub fn create_in(dir: &Path, session_id: Uuid, model: &str) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", session_id));
        let file = File::create(&path)?;

        let mut log = Self {
            path,
            writer: BufWriter::new(file),
        };
        log.append(&LogEntry::Metadata {
            id: session_id.to_string(),
            created_at: now(),
            model: model.to_string(),
        })?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_message(&mut self, message: &ChatMessage) -> std::io::Result<()> {
        self.append(&LogEntry::Message {
            message: message.clone(),
            timestamp: now(),
        })
    }

    pub fn log_reset(&mut self, system_prompt: &str) -> std::io::Result<()> {
        self.append(&LogEntry::Reset {
            system_prompt: system_prompt.to_string(),
            timestamp: now(),
        })
    }

    pub fn log_usage(&mut self, tally: &UsageTally) -> std::io::Result<()> {
        self.append(&LogEntry::Usage {
            prompt_tokens: tally.prompt_tokens,
            completion_tokens: tally.completion_tokens,
            timestamp: now(),
        })
    }

    fn append(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        writeln!(self.writer, "{}", serde_json::to_string(entry)?)?;
        self.writer.flush()
    }

    /// Read every entry of a log file, skipping lines that don't parse
    #[cfg(test)]
    pub fn read_entries(path: &Path) -> std::io::Result<Vec<LogEntry>> {
        use std::io::{BufRead, BufReader};

        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::debug!("Skipping bad log line in {}: {}", path.display(), e),
            }
        }
        Ok(entries)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_records_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let mut log = TranscriptLog::create_in(dir.path(), id, "smollm2:360m").unwrap();

        log.log_reset("be brief").unwrap();
        log.log_message(&ChatMessage::user("hi")).unwrap();
        log.log_message(&ChatMessage::assistant("hello")).unwrap();

        let mut tally = UsageTally::default();
        tally.add(&nira_engine::Usage::new(4, 1));
        log.log_usage(&tally).unwrap();

        assert_eq!(log.path(), dir.path().join(format!("{}.jsonl", id)));
        let entries = TranscriptLog::read_entries(log.path()).unwrap();
        assert_eq!(entries.len(), 5);
        assert!(matches!(
            &entries[0],
            LogEntry::Metadata { id: logged, model, .. } if *logged == id.to_string() && model == "smollm2:360m"
        ));
        assert!(matches!(&entries[1], LogEntry::Reset { system_prompt, .. } if system_prompt == "be brief"));
        assert!(matches!(&entries[3], LogEntry::Message { message, .. } if *message == ChatMessage::assistant("hello")));
        assert!(matches!(
            entries[4],
            LogEntry::Usage {
                prompt_tokens: 4,
                completion_tokens: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_read_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(
            &path,
            "{\"type\":\"reset\",\"system_prompt\":\"x\",\"timestamp\":1}\nnot json\n\n",
        )
        .unwrap();
        assert_eq!(TranscriptLog::read_entries(&path).unwrap().len(), 1);
    }
}
