use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Wall-clock timings per named stage, safe to share across mask workers.
pub struct Profiler {
    inner: Mutex<Timings>,
}

#[derive(Default)]
struct Timings {
    entries: Vec<(String, Duration)>,
    errors: usize,
}

impl Profiler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Timings::default()),
        }
    }

    pub fn record(&self, stage: impl Into<String>, elapsed: Duration) {
        if let Ok(mut timings) = self.inner.lock() {
            timings.entries.push((stage.into(), elapsed));
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut timings) = self.inner.lock() {
            timings.errors += 1;
        }
    }

    /// Runs `work` and records how long it took under `stage`.
    pub fn time<T>(&self, stage: &str, work: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = work();
        self.record(stage, started.elapsed());
        out
    }

    pub fn snapshot(&self) -> Vec<(String, Duration)> {
        if let Ok(timings) = self.inner.lock() {
            timings.entries.clone()
        } else {
            Vec::new()
        }
    }

    pub fn error_count(&self) -> usize {
        self.inner.lock().map(|timings| timings.errors).unwrap_or(0)
    }

    pub fn total(&self) -> Duration {
        self.snapshot().iter().map(|(_, elapsed)| *elapsed).sum()
    }

    /// Machine-readable form of the timings, for logs and reports.
    pub fn to_json(&self) -> Value {
        let stages: Vec<Value> = self
            .snapshot()
            .iter()
            .map(|(stage, elapsed)| json!({ "stage": stage, "seconds": elapsed.as_secs_f64() }))
            .collect();
        json!({
            "stages": stages,
            "total_seconds": self.total().as_secs_f64(),
            "errors": self.error_count(),
        })
    }

    /// One line per stage, in recording order, then the total.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .snapshot()
            .iter()
            .map(|(stage, elapsed)| format!("{:<40} {:>10.3}s", stage, elapsed.as_secs_f64()))
            .collect();
        lines.push(format!("{:<40} {:>10.3}s", "total", self.total().as_secs_f64()));
        lines.join("\n")
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}
