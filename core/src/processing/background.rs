//! Background-noise removal (De Robertis & Higginbottom, 2007) with the
//! range window derived from the sampling interval when not given.

use crate::math::StatsHelper;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::telemetry::StageLogger;
use crate::toolkit::DetectionKernels;
use crate::volume::{AcousticVolume, Variable, ECHO_RANGE};
use ndarray::{s, Axis};
use serde::{Deserialize, Serialize};

pub const SV_CORRECTED: &str = "Sv_corrected";
pub const SV_NOISE: &str = "Sv_noise";

/// Vertical extent, in metres, of the default noise-estimation window.
pub const DEFAULT_WINDOW_M: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundNoiseParams {
    pub ping_num: usize,
    pub range_sample_num: Option<usize>,
    pub noise_max: Option<f64>,
    #[serde(rename = "SNR_threshold", alias = "snr_threshold")]
    pub snr_threshold: f64,
}

impl Default for BackgroundNoiseParams {
    fn default() -> Self {
        Self {
            ping_num: 40,
            range_sample_num: None,
            noise_max: None,
            snr_threshold: 3.0,
        }
    }
}

/// Parameters with the range window settled, as handed to the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBackgroundNoise {
    pub ping_num: usize,
    pub range_sample_num: usize,
    pub noise_max: Option<f64>,
    pub snr_threshold: f64,
}

impl BackgroundNoiseParams {
    pub fn resolve(&self, volume: &AcousticVolume) -> ProcessingResult<ResolvedBackgroundNoise> {
        let range_sample_num = match self.range_sample_num {
            Some(value) => value,
            None => default_range_sample_num(volume)?,
        };
        if self.ping_num == 0 || range_sample_num == 0 {
            return Err(ProcessingError::config(
                "background noise window must span at least one ping and one sample",
            ));
        }
        Ok(ResolvedBackgroundNoise {
            ping_num: self.ping_num,
            range_sample_num,
            noise_max: self.noise_max,
            snr_threshold: self.snr_threshold,
        })
    }
}

/// Number of range samples covering [`DEFAULT_WINDOW_M`] on each channel's
/// first ping; the smallest across channels wins.
pub fn default_range_sample_num(volume: &AcousticVolume) -> ProcessingResult<usize> {
    let echo_range = volume.grid(ECHO_RANGE)?;
    if volume.ping_time().is_empty() {
        return Err(ProcessingError::integrity("volume has no pings"));
    }
    let mut smallest: Option<usize> = None;
    for (index, channel) in echo_range.axis_iter(Axis(0)).enumerate() {
        let first_ping = channel.slice(s![0, ..]).to_vec();
        let spacing = StatsHelper::nanmean(StatsHelper::diff(&first_ping))
            .filter(|spacing| *spacing > 0.0)
            .ok_or_else(|| {
                ProcessingError::integrity(format!(
                    "channel {} has no usable echo_range spacing",
                    volume.channels()[index]
                ))
            })?;
        let samples = ((DEFAULT_WINDOW_M / spacing) as usize).max(1);
        smallest = Some(smallest.map_or(samples, |current| current.min(samples)));
    }
    smallest.ok_or_else(|| ProcessingError::integrity("volume has no channels"))
}

/// Adds `Sv_corrected` and `Sv_noise` computed from the current `Sv`.
pub fn apply_remove_background_noise(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    params: &BackgroundNoiseParams,
) -> ProcessingResult<AcousticVolume> {
    let logger = StageLogger::new("background_noise");
    let resolved = params.resolve(volume)?;
    logger.detail(&format!(
        "ping_num={} range_sample_num={} noise_max={:?} SNR_threshold={}",
        resolved.ping_num, resolved.range_sample_num, resolved.noise_max, resolved.snr_threshold
    ));

    let estimate = kernels.remove_background_noise(volume, &resolved)?;
    let mut out = volume.clone();
    out.insert_variable(SV_CORRECTED, Variable::grid(estimate.sv_corrected))?;
    out.insert_variable(SV_NOISE, Variable::grid(estimate.sv_noise))?;
    Ok(out)
}
