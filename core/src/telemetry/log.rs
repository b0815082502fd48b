use log::{debug, info, warn};

/// Prefixes pipeline messages with the stage that emitted them.
#[derive(Debug, Clone)]
pub struct StageLogger {
    stage: &'static str,
}

impl StageLogger {
    pub fn new(stage: &'static str) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.stage, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.stage, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.stage, message);
    }
}

impl Default for StageLogger {
    fn default() -> Self {
        Self::new("pipeline")
    }
}
