use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Stage whose timing marks one finished request.
pub const REQUEST_STAGE: &str = "request";

/// Cross-cutting logger for pipeline orchestration events.
///
/// Shared by every in-flight request, so all methods take `&self`.
pub trait PipelineLogger: Send + Sync {
    /// Record how long a named pipeline stage took for one request.
    fn timing(&self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per request, skips).
    fn metric(&self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&self, message: &str);

    /// Emit an end-of-process summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&self, _stage: &str, _duration_ms: f64) {}
    fn metric(&self, _name: &str, _value: f64) {}
    fn info(&self, _message: &str) {}
}

/// Running count/total/max for one series.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: usize,
    pub total: f64,
    pub max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = if self.count == 1 { value } else { self.max.max(value) };
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

#[derive(Default)]
struct Series {
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
}

/// Server-oriented logger: stage timings go to `log` at debug level and are
/// folded into aggregates reported by [`summary`](PipelineLogger::summary).
///
/// Only aggregates are kept, so memory stays flat for a long-running process.
pub struct LogPipelineLogger {
    series: Mutex<Series>,
    start_time: Instant,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self {
            series: Mutex::new(Series::default()),
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        let series = self.lock();
        if series.timings.is_empty() && series.metrics.is_empty() {
            return None;
        }

        let uptime_s = self.start_time.elapsed().as_secs_f64();
        let requests = series
            .timings
            .get(REQUEST_STAGE)
            .map_or(0, |agg| agg.count);
        let mut lines = vec![format!(
            "Pipeline summary ({requests} requests, {uptime_s:.1}s uptime):"
        )];

        let mut stages: Vec<_> = series.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  max {:7.1}ms  total {:7.0}ms",
                agg.mean(),
                agg.max,
                agg.total
            ));
        }

        let mut metrics: Vec<_> = series.metrics.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in metrics {
            lines.push(format!(
                "  {name}: avg {:.1}  max {:.0}  total {:.0}",
                agg.mean(),
                agg.max,
                agg.total
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timing_for(&self, stage: &str) -> Option<Aggregate> {
        self.lock().timings.get(stage).copied()
    }

    pub fn metric_for(&self, name: &str) -> Option<Aggregate> {
        self.lock().metrics.get(name).copied()
    }

    fn lock(&self) -> MutexGuard<'_, Series> {
        self.series.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn timing(&self, stage: &str, duration_ms: f64) {
        log::debug!("{stage}: {duration_ms:.1}ms");
        self.lock()
            .timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&self, name: &str, value: f64) {
        self.lock()
            .metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let logger = NullPipelineLogger;
        logger.timing("decode", 5.0);
        logger.metric("faces", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_aggregates() {
        let logger = LogPipelineLogger::new();
        logger.timing("analyze", 10.0);
        logger.timing("analyze", 30.0);
        logger.timing("analyze", 20.0);

        let agg = logger.timing_for("analyze").unwrap();
        assert_eq!(agg.count, 3);
        assert_relative_eq!(agg.total, 60.0);
        assert_relative_eq!(agg.max, 30.0);
        assert_relative_eq!(agg.mean(), 20.0);
        assert!(logger.timing_for("upload").is_none());
    }

    #[test]
    fn test_metric_aggregates() {
        let logger = LogPipelineLogger::new();
        logger.metric("faces", 3.0);
        logger.metric("faces", 4.0);

        let agg = logger.metric_for("faces").unwrap();
        assert_eq!(agg.count, 2);
        assert_relative_eq!(agg.mean(), 3.5);
    }

    #[test]
    fn test_max_tracks_negative_first_value() {
        let mut agg = Aggregate::default();
        agg.record(-2.0);
        assert_relative_eq!(agg.max, -2.0);
        agg.record(-5.0);
        assert_relative_eq!(agg.max, -2.0);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let logger = LogPipelineLogger::new();
        logger.timing(REQUEST_STAGE, 50.0);
        logger.timing(REQUEST_STAGE, 70.0);
        logger.timing("decode", 5.0);
        logger.metric("skipped_detections", 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Pipeline summary (2 requests"));
        assert!(summary.contains("decode"));
        assert!(summary.contains("skipped_detections: avg 1.0"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogPipelineLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_concurrent_recording() {
        let logger = Arc::new(LogPipelineLogger::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let logger = Arc::clone(&logger);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        logger.timing("crop", 1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(logger.timing_for("crop").unwrap().count, 400);
    }
}
