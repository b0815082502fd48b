use super::continuity::{fix_time_reversions, DEFAULT_WINDOW_LEN};
use super::interpolation::{interpolate_sv, InterpolationMethod};
use super::regrid::regrid_dataset;
use crate::prelude::{ProcessingResult, ProcessingStage};
use crate::telemetry::StageLogger;
use crate::volume::AcousticVolume;

/// Gap filling along ping_time.
pub struct InterpolationStage {
    method: InterpolationMethod,
    with_edge_fill: bool,
    logger: StageLogger,
}

impl InterpolationStage {
    pub fn new(method: InterpolationMethod, with_edge_fill: bool) -> Self {
        Self {
            method,
            with_edge_fill,
            logger: StageLogger::new("interpolation"),
        }
    }
}

impl ProcessingStage for InterpolationStage {
    fn name(&self) -> &'static str {
        self.logger.stage()
    }

    fn execute(&self, input: &AcousticVolume) -> ProcessingResult<AcousticVolume> {
        self.logger.record(&format!(
            "interpolating Sv ({:?}, edge fill {})",
            self.method, self.with_edge_fill
        ));
        interpolate_sv(input, self.method, self.with_edge_fill)
    }
}

/// Common range axis across channels.
pub struct RegridStage {
    logger: StageLogger,
}

impl RegridStage {
    pub fn new() -> Self {
        Self {
            logger: StageLogger::new("regrid"),
        }
    }
}

impl Default for RegridStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for RegridStage {
    fn name(&self) -> &'static str {
        self.logger.stage()
    }

    fn execute(&self, input: &AcousticVolume) -> ProcessingResult<AcousticVolume> {
        regrid_dataset(input)
    }
}

pub struct TimeContinuityStage {
    win_len: usize,
    logger: StageLogger,
}

impl TimeContinuityStage {
    pub fn new(win_len: usize) -> Self {
        Self {
            win_len,
            logger: StageLogger::new("time_continuity"),
        }
    }
}

impl Default for TimeContinuityStage {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LEN)
    }
}

impl ProcessingStage for TimeContinuityStage {
    fn name(&self) -> &'static str {
        self.logger.stage()
    }

    fn execute(&self, input: &AcousticVolume) -> ProcessingResult<AcousticVolume> {
        self.logger.detail("checking ping_time ordering");
        fix_time_reversions(input, self.win_len)
    }
}
