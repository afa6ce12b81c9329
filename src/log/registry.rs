//! Registry of open topic logs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::errors::{LogError, LogResult};
use super::topic_log::{FileTopicLog, LogConfig};
use super::{LogRegistry, TopicLog};

/// Opens file-backed topic logs under one data directory.
///
/// Creation happens under the registry lock, so concurrent first calls for
/// the same topic share one handle.
pub struct FileLogRegistry {
    data_dir: PathBuf,
    config: LogConfig,
    logs: Mutex<HashMap<String, Arc<FileTopicLog>>>,
}

impl FileLogRegistry {
    /// Create a registry rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, config: LogConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the concrete log for `topic`, opening it on first access.
    pub fn open(&self, topic: &str) -> LogResult<Arc<FileTopicLog>> {
        let mut logs = self
            .logs
            .lock()
            .map_err(|_| LogError::poisoned().with_topic(topic))?;

        if let Some(log) = logs.get(topic) {
            return Ok(Arc::clone(log));
        }

        let log = Arc::new(FileTopicLog::open(&self.data_dir, topic, self.config)?);
        logs.insert(topic.to_string(), Arc::clone(&log));
        Ok(log)
    }

    /// Names of the topics opened so far, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = match self.logs.lock() {
            Ok(logs) => logs.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        topics.sort();
        topics
    }

    /// Syncs every open log.
    ///
    /// Stops at the first failure.
    pub fn flush_all(&self) -> LogResult<()> {
        let logs: Vec<Arc<FileTopicLog>> = self
            .logs
            .lock()
            .map_err(|_| LogError::poisoned())?
            .values()
            .cloned()
            .collect();

        for log in logs {
            log.flush()?;
        }
        Ok(())
    }
}

impl LogRegistry for FileLogRegistry {
    fn get(&self, topic: &str) -> LogResult<Arc<dyn TopicLog>> {
        let log: Arc<dyn TopicLog> = self.open(topic)?;
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_get_returns_same_handle() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileLogRegistry::new(temp_dir.path(), LogConfig::default());

        let a = registry.open("orders").unwrap();
        let b = registry.open("orders").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_topics_get_distinct_logs() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileLogRegistry::new(temp_dir.path(), LogConfig::default());

        let a = registry.open("orders").unwrap();
        let b = registry.open("payments").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.topics(), vec!["orders".to_string(), "payments".to_string()]);
    }

    #[test]
    fn test_concurrent_first_access_yields_one_handle() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(FileLogRegistry::new(temp_dir.path(), LogConfig::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.open("shared").unwrap())
            })
            .collect();

        let logs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for log in &logs[1..] {
            assert!(Arc::ptr_eq(&logs[0], log));
        }
    }

    #[test]
    fn test_trait_get_writes_through() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileLogRegistry::new(temp_dir.path(), LogConfig::default());

        registry.get("orders").unwrap().append(b"x").unwrap();
        assert_eq!(registry.open("orders").unwrap().read_all().unwrap(), vec![b"x".to_vec()]);
    }

    #[test]
    fn test_flush_all() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileLogRegistry::new(temp_dir.path(), LogConfig::default());

        let log = registry.open("a").unwrap();
        log.append(b"1").unwrap();
        registry.flush_all().unwrap();
        assert!(log.flushed());
    }
}
