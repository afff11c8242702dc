use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for session-level events, kept separate from the `log` facade
/// so callers decide how progress and statistics are surfaced.
pub trait PipelineLogger: Send {
    /// `total` is 0 when the source is live.
    fn progress(&mut self, current: usize, total: usize);

    /// Duration of one stage (`read`, `detect`, `stabilize`, `write`) for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Per-frame sample, e.g. `detected` = 1.0 or 0.0.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-session report. Default: nothing.
    fn summary(&self) {}
}

/// Discards everything. Used by tests and embedders with their own reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Sample accumulator; keeps running totals only, so a live session of any
/// length uses constant memory.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tally {
    pub count: usize,
    pub sum: f64,
}

impl Tally {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Logs throttled progress through `log::info!` and prints per-stage
/// timing and metric rates at the end.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Tally>,
    metrics: BTreeMap<String, Tally>,
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    pub fn timing_for(&self, stage: &str) -> Option<Tally> {
        self.timings.get(stage).copied()
    }

    /// `None` until something has been recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({} frames, {elapsed_s:.1}s):",
            self.frames_seen
        )];

        for (stage, t) in &self.timings {
            lines.push(format!(
                "  {stage:10}: avg {:6.2}ms  total {:8.0}ms",
                t.mean(),
                t.sum
            ));
        }
        for (name, m) in &self.metrics {
            lines.push(format!(
                "  {name:10}: {:.0}/{} ({:.1}%)",
                m.sum,
                m.count,
                m.mean() * 100.0
            ));
        }
        if self.frames_seen > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  throughput: {:.1} fps",
                self.frames_seen as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processing: {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_string()).or_default().add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 0);
        logger.timing("detect", 5.0);
        logger.metric("detected", 1.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_accumulates() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("write", 5.0);

        let detect = logger.timing_for("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.mean(), 25.0);
        assert_eq!(logger.timing_for("write").unwrap().count, 1);
        assert!(logger.timing_for("read").is_none());
    }

    #[test]
    fn test_metric_rate_in_summary() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(4, 4);
        for v in [1.0, 1.0, 0.0, 1.0] {
            logger.metric("detected", v);
        }

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (4 frames"));
        assert!(summary.contains("detected"));
        assert!(summary.contains("3/4 (75.0%)"));
    }

    #[test]
    fn test_summary_lists_stages() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(2, 0);
        logger.timing("stabilize", 1.0);
        logger.timing("detect", 9.0);

        let summary = logger.summary_string().unwrap();
        let detect = summary.find("detect").unwrap();
        let stabilize = summary.find("stabilize").unwrap();
        assert!(detect < stabilize);
    }

    #[test]
    fn test_empty_summary_is_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frames_for_live_source() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=25 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames_seen, 25);
    }

    #[test]
    fn test_tally_mean_of_empty_is_zero() {
        assert_eq!(Tally::default().mean(), 0.0);
    }
}
