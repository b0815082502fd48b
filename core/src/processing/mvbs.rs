//! Mean volume backscattering strength: Sv averaged in the linear domain
//! over ping × range bins, either counted in samples or measured in metres
//! and seconds.

use super::interpolation::{db_to_linear, linear_to_db_value};
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::telemetry::StageLogger;
use crate::volume::{AcousticVolume, AttrValue, Variable, DEPTH, ECHO_RANGE};
use chrono::{DateTime, Duration, Utc};
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INDEX_BIN: usize = 100;
pub const DEFAULT_RANGE_BIN_M: f64 = 20.0;
pub const DEFAULT_PING_TIME_BIN_S: f64 = 20.0;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MvbsMethod {
    IndexBinning,
    #[default]
    PhysicalUnits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeVar {
    #[default]
    EchoRange,
    Depth,
}

impl RangeVar {
    pub fn variable_name(&self) -> &'static str {
        match self {
            RangeVar::EchoRange => ECHO_RANGE,
            RangeVar::Depth => DEPTH,
        }
    }
}

/// Binning request as it appears in configuration. Only the fields of the
/// chosen method may be set; the rest fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MvbsOptions {
    pub method: MvbsMethod,
    pub range_sample_num: Option<usize>,
    pub ping_num: Option<usize>,
    pub range_var: Option<RangeVar>,
    pub range_bin_m: Option<f64>,
    pub ping_time_bin_s: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MvbsBinning {
    Index {
        range_sample_num: usize,
        ping_num: usize,
    },
    Physical {
        range_var: RangeVar,
        range_bin_m: f64,
        ping_time_bin: Duration,
    },
}

impl MvbsOptions {
    pub fn binning(&self) -> ProcessingResult<MvbsBinning> {
        match self.method {
            MvbsMethod::IndexBinning => {
                if self.range_var.is_some() || self.range_bin_m.is_some() || self.ping_time_bin_s.is_some() {
                    return Err(ProcessingError::config(
                        "index_binning takes only range_sample_num and ping_num",
                    ));
                }
                let range_sample_num = self.range_sample_num.unwrap_or(DEFAULT_INDEX_BIN);
                let ping_num = self.ping_num.unwrap_or(DEFAULT_INDEX_BIN);
                if range_sample_num == 0 || ping_num == 0 {
                    return Err(ProcessingError::config("MVBS bins must hold at least one sample"));
                }
                Ok(MvbsBinning::Index {
                    range_sample_num,
                    ping_num,
                })
            }
            MvbsMethod::PhysicalUnits => {
                if self.range_sample_num.is_some() || self.ping_num.is_some() {
                    return Err(ProcessingError::config(
                        "physical_units takes only range_var, range_bin_m and ping_time_bin_s",
                    ));
                }
                let range_bin_m = self.range_bin_m.unwrap_or(DEFAULT_RANGE_BIN_M);
                let seconds = self.ping_time_bin_s.unwrap_or(DEFAULT_PING_TIME_BIN_S);
                if !(range_bin_m.is_finite() && range_bin_m > 0.0) {
                    return Err(ProcessingError::config(format!("bad range bin {} m", range_bin_m)));
                }
                let nanos = (seconds * 1e9).round();
                if !(nanos.is_finite() && nanos >= 1.0 && nanos <= i64::MAX as f64) {
                    return Err(ProcessingError::config(format!("bad ping time bin {} s", seconds)));
                }
                Ok(MvbsBinning::Physical {
                    range_var: self.range_var.unwrap_or_default(),
                    range_bin_m,
                    ping_time_bin: Duration::nanoseconds(nanos as i64),
                })
            }
        }
    }
}

/// Running linear-domain sums per output cell.
struct BinAccumulator {
    sum: Array3<f64>,
    count: Array3<usize>,
}

impl BinAccumulator {
    fn new(shape: (usize, usize, usize)) -> Self {
        Self {
            sum: Array3::zeros(shape),
            count: Array3::zeros(shape),
        }
    }

    fn add(&mut self, cell: (usize, usize, usize), linear: f64) {
        if linear.is_finite() {
            self.sum[cell] += linear;
            self.count[cell] += 1;
        }
    }

    fn into_db(self) -> Array3<f64> {
        let mut out = self.sum;
        ndarray::Zip::from(&mut out).and(&self.count).for_each(|value, &count| {
            *value = if count == 0 {
                f64::NAN
            } else {
                linear_to_db_value(*value / count as f64)
            };
        });
        out
    }
}

fn total_nanos(time: &DateTime<Utc>) -> i128 {
    time.timestamp() as i128 * NANOS_PER_SECOND + time.timestamp_subsec_nanos() as i128
}

fn bin_index(offset: Duration, width: Duration) -> usize {
    let offset = offset.num_nanoseconds().unwrap_or(i64::MAX);
    let width = width.num_nanoseconds().unwrap_or(i64::MAX).max(1);
    (offset / width).max(0) as usize
}

fn index_bins(
    linear: ArrayView3<'_, f64>,
    ping_time: &[DateTime<Utc>],
    range_sample_num: usize,
    ping_num: usize,
) -> (Array3<f64>, Vec<DateTime<Utc>>) {
    let (n_channel, n_ping, n_range) = linear.dim();
    let ping_bins = (n_ping + ping_num - 1) / ping_num;
    let range_bins = (n_range + range_sample_num - 1) / range_sample_num;
    let mut acc = BinAccumulator::new((n_channel, ping_bins, range_bins));
    for ((c, p, r), &value) in linear.indexed_iter() {
        acc.add((c, p / ping_num, r / range_sample_num), value);
    }
    let times = ping_time.iter().step_by(ping_num).copied().collect();
    (acc.into_db(), times)
}

fn physical_bins(
    linear: ArrayView3<'_, f64>,
    range: ArrayView3<'_, f64>,
    ping_time: &[DateTime<Utc>],
    range_bin_m: f64,
    ping_time_bin: Duration,
) -> ProcessingResult<(Array3<f64>, Vec<DateTime<Utc>>)> {
    let (n_channel, _, _) = linear.dim();
    let first = ping_time
        .iter()
        .min()
        .ok_or_else(|| ProcessingError::integrity("volume has no pings"))?;
    let width = ping_time_bin.num_nanoseconds().unwrap_or(i64::MAX).max(1) as i128;
    // bins are aligned to whole multiples of the bin width since the epoch
    let into_bin = total_nanos(first).rem_euclid(width);
    let origin = *first - Duration::nanoseconds(into_bin as i64);

    let ping_bin: Vec<usize> = ping_time
        .iter()
        .map(|time| bin_index(*time - origin, ping_time_bin))
        .collect();
    let ping_bins = ping_bin.iter().max().map_or(0, |last| last + 1);

    let deepest = range
        .iter()
        .filter(|value| value.is_finite() && **value >= 0.0)
        .fold(f64::NAN, |acc, value| acc.max(*value));
    if deepest.is_nan() {
        return Err(ProcessingError::integrity("no usable range values to bin"));
    }
    let range_bins = (deepest / range_bin_m).floor() as usize + 1;

    let mut acc = BinAccumulator::new((n_channel, ping_bins, range_bins));
    for ((c, p, r), &value) in linear.indexed_iter() {
        let metres = range[[c, p, r]];
        if !(metres.is_finite() && metres >= 0.0) {
            continue;
        }
        let range_bin = ((metres / range_bin_m).floor() as usize).min(range_bins - 1);
        acc.add((c, ping_bin[p], range_bin), value);
    }
    let times = (0..ping_bins)
        .map(|bin| origin + ping_time_bin * bin as i32)
        .collect();
    Ok((acc.into_db(), times))
}

/// Bins `Sv` according to `options` and returns a new volume on the binned
/// grid. Physical binning also carries the range variable, holding the
/// lower edge of each range bin. Global attributes are kept.
pub fn compute_mvbs(volume: &AcousticVolume, options: &MvbsOptions) -> ProcessingResult<AcousticVolume> {
    let logger = StageLogger::new("mvbs");
    let binning = options.binning()?;
    let linear = db_to_linear(&volume.sv()?);

    let (sv, times, range_edges) = match &binning {
        MvbsBinning::Index {
            range_sample_num,
            ping_num,
        } => {
            let (sv, times) = index_bins(linear.view(), volume.ping_time(), *range_sample_num, *ping_num);
            (sv, times, None)
        }
        MvbsBinning::Physical {
            range_var,
            range_bin_m,
            ping_time_bin,
        } => {
            let range = volume.grid(range_var.variable_name())?;
            let (sv, times) =
                physical_bins(linear.view(), range, volume.ping_time(), *range_bin_m, *ping_time_bin)?;
            let edges = Array3::from_shape_fn(sv.dim(), |(_, _, bin)| bin as f64 * range_bin_m);
            (sv, times, Some((range_var.variable_name(), edges)))
        }
    };

    logger.detail(&format!("{:?} -> {:?}", volume.grid_shape(), sv.dim()));
    let mut out = AcousticVolume::new(
        volume.channels().to_vec(),
        volume.frequency_nominal().to_vec(),
        times,
        sv,
        volume.source_filename(),
    )?;
    *out.attrs_mut() = volume.attrs().clone();
    let method = match binning {
        MvbsBinning::Index { .. } => "index_binning",
        MvbsBinning::Physical { .. } => "physical_units",
    };
    out.attrs_mut()
        .insert("mvbs_method".to_string(), AttrValue::from(method));
    if let Some((name, edges)) = range_edges {
        out.insert_variable(name, Variable::grid(edges))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VolumeBuilder;

    fn db(linear: f64) -> f64 {
        10.0 * linear.log10()
    }

    #[test]
    fn index_bins_average_in_the_linear_domain() {
        let mut sv = Array3::from_elem((1, 5, 4), -70.0);
        sv[[0, 0, 0]] = -60.0;
        sv[[0, 4, 3]] = f64::NAN;
        let volume = VolumeBuilder::new(1, 5, 4).sv(sv).build();
        let options = MvbsOptions {
            method: MvbsMethod::IndexBinning,
            range_sample_num: Some(2),
            ping_num: Some(2),
            ..Default::default()
        };
        let mvbs = compute_mvbs(&volume, &options).unwrap();
        assert_eq!(mvbs.grid_shape(), (1, 3, 2));

        let out = mvbs.sv().unwrap();
        let expected = db((1e-6 + 3.0 * 1e-7) / 4.0);
        assert!((out[[0, 0, 0]] - expected).abs() < 1e-9);
        assert!((out[[0, 1, 1]] + 70.0).abs() < 1e-9);
        // the last ping bin holds a single ping; its missing sample is skipped
        assert!((out[[0, 2, 1]] + 70.0).abs() < 1e-9);

        let times = VolumeBuilder::ping_times(5);
        assert_eq!(mvbs.ping_time(), &[times[0], times[2], times[4]]);
        assert!(!mvbs.contains(ECHO_RANGE));
    }

    #[test]
    fn physical_bins_follow_metres_and_seconds() {
        let volume = VolumeBuilder::new(1, 6, 8)
            .sv(Array3::from_elem((1, 6, 8), -70.0))
            .with_echo_range(1.0)
            .build();
        let options = MvbsOptions {
            range_bin_m: Some(4.0),
            ping_time_bin_s: Some(2.0),
            ..Default::default()
        };
        let mvbs = compute_mvbs(&volume, &options).unwrap();
        // pings at :45..:50 fall in the 2 s bins starting :44, :46, :48 and :50
        assert_eq!(mvbs.grid_shape(), (1, 4, 2));
        let origin = VolumeBuilder::ping_times(1)[0] - Duration::seconds(1);
        assert_eq!(mvbs.ping_time()[0], origin);
        assert_eq!(mvbs.ping_time()[3], origin + Duration::seconds(6));
        assert!(mvbs.sv().unwrap().iter().all(|value| (value + 70.0).abs() < 1e-9));

        let edges = mvbs.grid(ECHO_RANGE).unwrap();
        assert_eq!(edges[[0, 0, 0]], 0.0);
        assert_eq!(edges[[0, 0, 1]], 4.0);
        assert_eq!(mvbs.source_filename(), volume.source_filename());
    }

    #[test]
    fn depth_binning_needs_a_depth_variable() {
        let volume = VolumeBuilder::new(1, 4, 4).with_echo_range(1.0).build();
        let options = MvbsOptions {
            range_var: Some(RangeVar::Depth),
            ..Default::default()
        };
        assert!(matches!(
            compute_mvbs(&volume, &options),
            Err(ProcessingError::MissingVariable(_))
        ));
    }

    #[test]
    fn mixed_parameter_sets_are_rejected() {
        let index_with_metres = MvbsOptions {
            method: MvbsMethod::IndexBinning,
            range_bin_m: Some(10.0),
            ..Default::default()
        };
        assert!(matches!(
            index_with_metres.binning(),
            Err(ProcessingError::Configuration(_))
        ));

        let physical_with_pings = MvbsOptions {
            ping_num: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            physical_with_pings.binning(),
            Err(ProcessingError::Configuration(_))
        ));
    }

    #[test]
    fn unset_fields_take_the_method_defaults() {
        let index = MvbsOptions {
            method: MvbsMethod::IndexBinning,
            ..Default::default()
        };
        assert_eq!(
            index.binning().unwrap(),
            MvbsBinning::Index {
                range_sample_num: 100,
                ping_num: 100
            }
        );
        assert_eq!(
            MvbsOptions::default().binning().unwrap(),
            MvbsBinning::Physical {
                range_var: RangeVar::EchoRange,
                range_bin_m: 20.0,
                ping_time_bin: Duration::seconds(20),
            }
        );
    }
}
