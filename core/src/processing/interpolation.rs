use crate::prelude::{ProcessingError, ProcessingResult};
use crate::telemetry::StageLogger;
use crate::volume::{AcousticVolume, SV};
use ndarray::{Array, ArrayBase, ArrayView1, Axis, Data, Dimension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// `10^(db/10)`, keeping missing samples missing.
pub fn db_to_linear<S, D>(db: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    db.mapv(db_to_linear_value)
}

/// `10·log10(linear)`, keeping missing samples missing.
pub fn linear_to_db<S, D>(linear: &ArrayBase<S, D>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    linear.mapv(linear_to_db_value)
}

pub fn db_to_linear_value(db: f64) -> f64 {
    if db.is_nan() {
        f64::NAN
    } else {
        10f64.powf(db / 10.0)
    }
}

pub fn linear_to_db_value(linear: f64) -> f64 {
    if linear.is_nan() {
        f64::NAN
    } else {
        10.0 * linear.log10()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Nearest,
}

impl FromStr for InterpolationMethod {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "linear" => Ok(InterpolationMethod::Linear),
            "nearest" => Ok(InterpolationMethod::Nearest),
            other => Err(ProcessingError::config(format!(
                "unsupported interpolation method '{}'",
                other
            ))),
        }
    }
}

/// Fills interior gaps of `values` sampled at `x`. Leading and trailing
/// gaps stay missing.
fn fill_interior(values: &mut [f64], x: &[f64], method: InterpolationMethod) {
    let valid: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    for pair in valid.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        for i in lo + 1..hi {
            values[i] = match method {
                InterpolationMethod::Linear => {
                    let span = x[hi] - x[lo];
                    if span == 0.0 {
                        values[lo]
                    } else {
                        values[lo] + (values[hi] - values[lo]) * (x[i] - x[lo]) / span
                    }
                }
                // ties go to the earlier sample
                InterpolationMethod::Nearest => {
                    if x[i] - x[lo] <= x[hi] - x[i] {
                        values[lo]
                    } else {
                        values[hi]
                    }
                }
            };
        }
    }
}

/// Forward fill, then backward fill.
fn fill_edges(values: &mut [f64]) {
    let mut last = f64::NAN;
    for value in values.iter_mut() {
        if value.is_nan() {
            *value = last;
        } else {
            last = *value;
        }
    }
    let mut next = f64::NAN;
    for value in values.iter_mut().rev() {
        if value.is_nan() {
            *value = next;
        } else {
            next = *value;
        }
    }
}

/// Fills missing `Sv` samples along ping_time, channel by channel, in the
/// linear domain. Overwrites `Sv`; copy it aside first to keep the original.
pub fn interpolate_sv(
    volume: &AcousticVolume,
    method: InterpolationMethod,
    with_edge_fill: bool,
) -> ProcessingResult<AcousticVolume> {
    let logger = StageLogger::new("interpolation");
    let x: Vec<f64> = volume
        .ping_time()
        .iter()
        .map(|time| time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9)
        .collect();

    let mut linear = db_to_linear(&volume.sv()?);
    let before = linear.iter().filter(|value| value.is_nan()).count();
    for mut channel in linear.axis_iter_mut(Axis(0)) {
        for mut column in channel.axis_iter_mut(Axis(1)) {
            let mut values = column.to_vec();
            fill_interior(&mut values, &x, method);
            if with_edge_fill {
                fill_edges(&mut values);
            }
            column.assign(&ArrayView1::from(values.as_slice()));
        }
    }
    let after = linear.iter().filter(|value| value.is_nan()).count();
    logger.detail(&format!("filled {} of {} missing samples", before - after, before));

    let mut out = volume.clone();
    out.replace_grid(SV, linear_to_db(&linear))?;
    Ok(out)
}
