//! Hands audit events and log entries to pluggable backends.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::event::AuditEvent;
use crate::filter::{AuditFilter, DateRange};
use crate::log_entry::{LogEntry, LogFilter, LogLevel};
use crate::stats::{calculate_statistics, AuditStatistics, StatisticsPeriod};

/// Storage for audit events and log entries.
pub trait AuditBackend: Send + Sync + Debug {
    /// Stores an audit event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be stored.
    fn record_event(&self, event: &AuditEvent) -> Result<(), LoggerError>;

    /// Stores a log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be stored.
    fn record_log(&self, entry: &LogEntry) -> Result<(), LoggerError>;

    /// Flushes anything buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&self) -> Result<(), LoggerError>;

    /// Backend name, for diagnostics.
    fn name(&self) -> &'static str;
}

/// Errors that can occur while logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Serialization error
    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Every configured backend rejected the record
    #[error("All {count} backends failed to record")]
    AllBackendsFailed {
        /// Number of backends that failed.
        count: usize,
    },
}

/// Fans audit events and log entries out to its backends.
///
/// Events are sanitized before they reach a backend unless the logger is
/// built with `sanitize(false)`. A failure in one backend is logged and does
/// not stop delivery to the others.
#[derive(Debug)]
pub struct AuditLogger {
    backends: Vec<Arc<dyn AuditBackend>>,
    enabled: bool,
    min_level: LogLevel,
    sanitize: bool,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Creates an enabled logger with no backends.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the logger.
    #[must_use]
    pub fn builder() -> AuditLoggerBuilder {
        AuditLoggerBuilder::new()
    }

    /// Adds a backend.
    pub fn add_backend(&mut self, backend: Arc<dyn AuditBackend>) {
        self.backends.push(backend);
    }

    /// Enables or disables the logger.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Sets the lowest log level that is forwarded.
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Records an audit event on every backend.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::AllBackendsFailed`] if backends are configured
    /// and none of them accepted the event.
    pub fn log_event(&self, event: &AuditEvent) -> Result<(), LoggerError> {
        if !self.enabled {
            debug!("Audit logging disabled, skipping event");
            return Ok(());
        }

        let sanitized;
        let event = if self.sanitize {
            sanitized = event.sanitized();
            &sanitized
        } else {
            event
        };

        self.deliver(|backend| backend.record_event(event))
    }

    /// Records a log entry on every backend if it meets the minimum level.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::AllBackendsFailed`] if backends are configured
    /// and none of them accepted the entry.
    pub fn log(&self, entry: &LogEntry) -> Result<(), LoggerError> {
        if !self.enabled {
            debug!("Audit logging disabled, skipping log entry");
            return Ok(());
        }

        if entry.level() < self.min_level {
            debug!(
                "Log level {} below threshold {}, skipping",
                entry.level(),
                self.min_level
            );
            return Ok(());
        }

        let sanitized;
        let entry = if self.sanitize {
            sanitized = entry.sanitized();
            &sanitized
        } else {
            entry
        };

        self.deliver(|backend| backend.record_log(entry))
    }

    fn deliver<F>(&self, mut record: F) -> Result<(), LoggerError>
    where
        F: FnMut(&dyn AuditBackend) -> Result<(), LoggerError>,
    {
        let mut failed = 0;
        for backend in &self.backends {
            if let Err(e) = record(backend.as_ref()) {
                error!("Failed to record to backend {}: {}", backend.name(), e);
                failed += 1;
            }
        }

        if failed > 0 && failed == self.backends.len() {
            return Err(LoggerError::AllBackendsFailed { count: failed });
        }
        Ok(())
    }

    /// Flushes all backends.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure.
    pub fn flush(&self) -> Result<(), LoggerError> {
        for backend in &self.backends {
            backend.flush()?;
        }
        Ok(())
    }

    /// Returns the number of configured backends.
    #[must_use]
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }
}

/// Builder for [`AuditLogger`].
#[derive(Debug)]
pub struct AuditLoggerBuilder {
    backends: Vec<Arc<dyn AuditBackend>>,
    enabled: bool,
    min_level: LogLevel,
    sanitize: bool,
}

impl Default for AuditLoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLoggerBuilder {
    /// Creates a builder: enabled, minimum level `info`, sanitizing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            enabled: true,
            min_level: LogLevel::Info,
            sanitize: true,
        }
    }

    /// Adds a backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn AuditBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Enables or disables the logger.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the lowest log level that is forwarded.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets whether records are sanitized before delivery.
    #[must_use]
    pub const fn sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Builds the logger.
    #[must_use]
    pub fn build(self) -> AuditLogger {
        AuditLogger {
            backends: self.backends,
            enabled: self.enabled,
            min_level: self.min_level,
            sanitize: self.sanitize,
        }
    }
}

/// Backend that writes records as JSON through `tracing`.
#[derive(Debug, Default)]
pub struct TracingBackend;

impl TracingBackend {
    /// Creates a new tracing backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AuditBackend for TracingBackend {
    fn record_event(&self, event: &AuditEvent) -> Result<(), LoggerError> {
        let json = serde_json::to_string(event)?;
        info!(
            audit_event = %json,
            trace_id = %event.trace_id(),
            operation = %event.operation(),
            "Audit event"
        );
        Ok(())
    }

    fn record_log(&self, entry: &LogEntry) -> Result<(), LoggerError> {
        let metadata = entry
            .metadata()
            .map(serde_json::to_string)
            .transpose()?
            .unwrap_or_default();
        let message = entry.message();

        match entry.level() {
            LogLevel::Debug => debug!(%metadata, "{message}"),
            LogLevel::Info => info!(%metadata, "{message}"),
            LogLevel::Warn => warn!(%metadata, "{message}"),
            LogLevel::Error | LogLevel::Fatal => {
                error!(severity = %entry.level(), %metadata, "{message}");
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), LoggerError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Backend that keeps records in memory and answers queries over them.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    events: Mutex<Vec<AuditEvent>>,
    logs: Mutex<Vec<LogEntry>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored event, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns every stored log entry, oldest first.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().clone()
    }

    /// Returns the stored events that match `filter`.
    #[must_use]
    pub fn query_events(&self, filter: &AuditFilter) -> Vec<AuditEvent> {
        let events = self.events.lock();
        filter.apply(events.iter()).cloned().collect()
    }

    /// Returns the stored log entries that match `filter`.
    #[must_use]
    pub fn query_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.logs
            .lock()
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    /// Computes statistics over the stored events that fall inside `period`.
    #[must_use]
    pub fn statistics(&self, period: StatisticsPeriod) -> AuditStatistics {
        let window = DateRange::between(period.start, period.end);
        let events = self.events.lock();
        calculate_statistics(
            events.iter().filter(|e| window.contains(e.timestamp())),
            period,
        )
    }

    /// Removes all stored records.
    pub fn clear(&self) {
        self.events.lock().clear();
        self.logs.lock().clear();
    }
}

impl AuditBackend for InMemoryBackend {
    fn record_event(&self, event: &AuditEvent) -> Result<(), LoggerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn record_log(&self, entry: &LogEntry) -> Result<(), LoggerError> {
        self.logs.lock().push(entry.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), LoggerError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::event::{EventOptions, Operation};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use ticketry_core::REDACTION_MARKER;

    #[derive(Debug)]
    struct FailingBackend;

    impl AuditBackend for FailingBackend {
        fn record_event(&self, _event: &AuditEvent) -> Result<(), LoggerError> {
            Err(LoggerError::Backend("disk full".into()))
        }

        fn record_log(&self, _entry: &LogEntry) -> Result<(), LoggerError> {
            Err(LoggerError::Backend("disk full".into()))
        }

        fn flush(&self) -> Result<(), LoggerError> {
            Err(LoggerError::Backend("disk full".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn created(entity_id: &str) -> AuditEvent {
        AuditEvent::create(
            Actor::human("u1"),
            "ticket",
            entity_id,
            json!({ "title": "X", "api_key": "k-123" }),
            "cli",
            EventOptions::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_logger_with_in_memory_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let logger = AuditLogger::builder()
            .with_backend(backend.clone())
            .build();

        logger.log_event(&created("T-1")).unwrap();

        let events = backend.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity_id(), "T-1");
    }

    #[test]
    fn test_events_are_sanitized_by_default() {
        let backend = Arc::new(InMemoryBackend::new());
        let logger = AuditLogger::builder()
            .with_backend(backend.clone())
            .build();

        logger.log_event(&created("T-1")).unwrap();
        let stored = &backend.events()[0];
        assert_eq!(stored.after().unwrap()["api_key"], json!(REDACTION_MARKER));
    }

    #[test]
    fn test_sanitizing_can_be_disabled() {
        let backend = Arc::new(InMemoryBackend::new());
        let logger = AuditLogger::builder()
            .with_backend(backend.clone())
            .sanitize(false)
            .build();

        logger.log_event(&created("T-1")).unwrap();
        assert_eq!(backend.events()[0].after().unwrap()["api_key"], json!("k-123"));
    }

    #[test]
    fn test_logger_disabled() {
        let backend = Arc::new(InMemoryBackend::new());
        let logger = AuditLogger::builder()
            .with_backend(backend.clone())
            .enabled(false)
            .build();

        logger.log_event(&created("T-1")).unwrap();
        logger.log(&LogEntry::error("boom")).unwrap();

        assert!(backend.events().is_empty());
        assert!(backend.logs().is_empty());
    }

    #[test]
    fn test_log_level_filtering() {
        let backend = Arc::new(InMemoryBackend::new());
        let logger = AuditLogger::builder()
            .with_backend(backend.clone())
            .min_level(LogLevel::Warn)
            .build();

        logger.log(&LogEntry::info("cache warm")).unwrap();
        logger.log(&LogEntry::warn("cache cold")).unwrap();
        logger.log(&LogEntry::fatal("cache gone")).unwrap();

        let logs = backend.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message(), "cache cold");
    }

    #[test]
    fn test_multiple_backends() {
        let backend1 = Arc::new(InMemoryBackend::new());
        let backend2 = Arc::new(InMemoryBackend::new());

        let logger = AuditLogger::builder()
            .with_backend(backend1.clone())
            .with_backend(backend2.clone())
            .build();

        logger.log_event(&created("T-1")).unwrap();

        assert_eq!(backend1.events().len(), 1);
        assert_eq!(backend2.events().len(), 1);
        assert_eq!(logger.backend_count(), 2);
    }

    #[test]
    fn test_one_failing_backend_does_not_block_others() {
        let backend = Arc::new(InMemoryBackend::new());
        let logger = AuditLogger::builder()
            .with_backend(Arc::new(FailingBackend))
            .with_backend(backend.clone())
            .build();

        logger.log_event(&created("T-1")).unwrap();
        assert_eq!(backend.events().len(), 1);
    }

    #[test]
    fn test_all_backends_failing_is_an_error() {
        let logger = AuditLogger::builder()
            .with_backend(Arc::new(FailingBackend))
            .with_backend(Arc::new(FailingBackend))
            .build();

        let err = logger.log_event(&created("T-1")).unwrap_err();
        assert!(matches!(err, LoggerError::AllBackendsFailed { count: 2 }));
        assert!(logger.flush().is_err());
    }

    #[test]
    fn test_no_backends_is_not_an_error() {
        let logger = AuditLogger::new();
        assert_eq!(logger.backend_count(), 0);
        logger.log_event(&created("T-1")).unwrap();
        logger.log(&LogEntry::error("nowhere to go")).unwrap();
    }

    #[test]
    fn test_tracing_backend() {
        let backend = TracingBackend::new();
        backend.record_event(&created("T-1")).unwrap();
        backend
            .record_log(&LogEntry::warn("slow").with_metadata("ms", 1200))
            .unwrap();
        backend.record_log(&LogEntry::fatal("down")).unwrap();
        backend.flush().unwrap();
        assert_eq!(backend.name(), "tracing");
    }

    #[test]
    fn test_in_memory_queries_and_statistics() {
        let backend = InMemoryBackend::new();
        let jan = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let mar = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();

        for (id, at) in [("T-1", jan), ("T-2", jan), ("T-3", mar)] {
            let event = AuditEvent::builder(Operation::Read)
                .actor(Actor::system("indexer"))
                .entity("ticket", id)
                .source("sync")
                .state(json!({ "title": id }))
                .options(EventOptions::new().timestamp(at))
                .build()
                .unwrap();
            backend.record_event(&event).unwrap();
        }
        backend.record_log(&LogEntry::info("indexed")).unwrap();

        let found = backend.query_events(&AuditFilter::new().entity_id("T-2"));
        assert_eq!(found.len(), 1);
        assert_eq!(backend.query_logs(&LogFilter::new().message_contains("INDEX")).len(), 1);

        let period = StatisticsPeriod::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap(),
        );
        let stats = backend.statistics(period);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.operation_count(Operation::Read), 2);

        backend.clear();
        assert!(backend.events().is_empty());
        assert!(backend.logs().is_empty());
    }
}
