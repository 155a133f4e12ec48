use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::LOG_BUFFER_SIZE;

/// One diagnostic event shown in the UI's activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Parser,
    Replay,
    Hub,
    Backend,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

pub struct LogState {
    buffer: Arc<RwLock<VecDeque<LogEntry>>>,
    sender: broadcast::Sender<LogEntry>,
}

impl LogState {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(LOG_BUFFER_SIZE))),
            sender,
        }
    }

    pub async fn push(&self, entry: LogEntry) {
        let mut buf = self.buffer.write().await;
        if buf.len() >= LOG_BUFFER_SIZE {
            buf.pop_front();
        }
        buf.push_back(entry.clone());
        drop(buf);

        let _ = self.sender.send(entry);
    }

    pub async fn history(&self) -> Vec<LogEntry> {
        self.buffer.read().await.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    pub async fn emit(&self, source: LogSource, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            source,
            level,
            message: message.into(),
        };
        self.push(entry).await;
    }
}

impl Default for LogState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_and_history() {
        let logs = LogState::new();
        logs.emit(LogSource::Parser, LogLevel::Info, "parsed 10 lines")
            .await;
        let history = logs.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "parsed 10 lines");
        assert_eq!(history[0].source, LogSource::Parser);
    }

    #[tokio::test]
    async fn test_buffer_evicts_oldest() {
        let logs = LogState::new();
        for i in 0..(LOG_BUFFER_SIZE + 10) {
            logs.emit(LogSource::Backend, LogLevel::Debug, format!("entry {i}"))
                .await;
        }
        let history = logs.history().await;
        assert_eq!(history.len(), LOG_BUFFER_SIZE);
        assert_eq!(history[0].message, "entry 10");
    }

    #[tokio::test]
    async fn test_subscribe_receives_entries() {
        let logs = LogState::new();
        let mut rx = logs.subscribe();
        logs.emit(LogSource::Replay, LogLevel::Warn, "retrying findElement")
            .await;
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.message, "retrying findElement");
    }
}
