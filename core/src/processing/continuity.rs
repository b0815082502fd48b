//! Detection and repair of ping_time reversals in freshly decoded data.

use crate::math::StatsHelper;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::telemetry::StageLogger;
use crate::volume::AcousticVolume;
use chrono::{DateTime, Duration, Utc};

/// Pings before a reversal whose median interval predicts the next ping.
pub const DEFAULT_WINDOW_LEN: usize = 100;

/// Smallest interval a repaired step may take, so time stays strictly
/// increasing.
const MIN_STEP_NANOS: i64 = 1;

pub fn check_reversed_time(volume: &AcousticVolume) -> bool {
    first_reversal(volume.ping_time()).is_some()
}

/// Index of the first ping that is earlier than its predecessor.
fn first_reversal(times: &[DateTime<Utc>]) -> Option<usize> {
    times
        .windows(2)
        .position(|pair| pair[1] < pair[0])
        .map(|step| step + 1)
}

/// Shifts every ping from each reversal onwards so the reversed step becomes
/// the median interval of the `win_len` steps before it. A reversal with no
/// usable steps before it takes the median of the steps after it instead.
/// Repeats until time runs forward.
pub fn coerce_increasing_time(
    volume: &AcousticVolume,
    win_len: usize,
) -> ProcessingResult<AcousticVolume> {
    if win_len == 0 {
        return Err(ProcessingError::config("time window must hold at least one step"));
    }
    let logger = StageLogger::new("time_continuity");
    let mut times = volume.ping_time().to_vec();
    let mut repaired = 0usize;

    while let Some(idx) = first_reversal(&times) {
        let before = &times[idx.saturating_sub(win_len + 1)..idx];
        let after = &times[idx..(idx + win_len + 1).min(times.len())];
        let step = median_step(before)
            .or_else(|| median_step(after))
            .unwrap_or(MIN_STEP_NANOS);
        let shift = times[idx - 1] - times[idx] + Duration::nanoseconds(step);
        for time in &mut times[idx..] {
            *time += shift;
        }
        repaired += 1;
    }

    if repaired > 0 {
        logger.warn(&format!("repaired {} ping_time reversal(s)", repaired));
    }
    let mut out = volume.clone();
    out.set_ping_time(times)?;
    Ok(out)
}

/// Repairs reversals when there are any, otherwise hands back a copy.
pub fn fix_time_reversions(volume: &AcousticVolume, win_len: usize) -> ProcessingResult<AcousticVolume> {
    if check_reversed_time(volume) {
        coerce_increasing_time(volume, win_len)
    } else {
        Ok(volume.clone())
    }
}

/// Median positive interval of `times` in nanoseconds, if there is one.
fn median_step(times: &[DateTime<Utc>]) -> Option<i64> {
    let steps: Vec<f64> = times
        .windows(2)
        .map(|pair| nanos(pair[1] - pair[0]))
        .filter(|step| step.is_finite() && *step > 0.0)
        .collect();
    StatsHelper::median(steps).map(|median| (median.round() as i64).max(MIN_STEP_NANOS))
}

fn nanos(step: Duration) -> f64 {
    step.num_nanoseconds()
        .map(|value| value as f64)
        .unwrap_or(f64::NAN)
}
