//! Reference detection and integration kernels, used when no acoustic
//! toolkit is linked. They follow the published algorithms in outline and
//! are tuned for the synthetic survey rather than for real data.
//!
//! Every noise kernel returns `true` where the sample is kept.

use hydrocore::masks::freqdiff::FreqDiffExpression;
use hydrocore::masks::params::{
    AttenuationMethod, AttenuationParameters, ImpulseMethod, ImpulseParameters, SeabedMethod,
    SeabedSettings, ShoalMethod, ShoalParameters, TransientMethod, TransientParameters,
};
use hydrocore::math::StatsHelper;
use hydrocore::processing::background::ResolvedBackgroundNoise;
use hydrocore::processing::interpolation::{db_to_linear_value, linear_to_db_value};
use hydrocore::toolkit::{
    BackgroundNoiseEstimate, DetectionKernels, NascDataset, NascKernel, NascValue,
};
use hydrocore::volume::{AcousticVolume, ChannelView, ECHO_RANGE};
use hydrocore::{ProcessingError, ProcessingResult};
use log::debug;
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, Axis};

/// Nautical-area scattering coefficient scale, 4π·1852².
const NASC_SCALE: f64 = 4.0 * std::f64::consts::PI * 1852.0 * 1852.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceKernels;

/// Mean of the finite samples, averaged in the linear domain, back in dB.
fn mean_db<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    StatsHelper::nanmean(values.into_iter().map(|value| db_to_linear_value(*value)))
        .map(linear_to_db_value)
        .unwrap_or(f64::NAN)
}

/// First sample whose range reaches `metres`; the sample index stands in
/// for range when the channel carries none.
fn first_sample_at(echo_range: Option<ArrayView1<'_, f64>>, n_range: usize, metres: f64) -> usize {
    match echo_range {
        Some(range) => range
            .iter()
            .position(|value| *value >= metres)
            .unwrap_or(n_range),
        None => (metres.max(0.0) as usize).min(n_range),
    }
}

fn ping_range<'a>(channel: &ChannelView<'a>, ping: usize) -> Option<ArrayView1<'a, f64>> {
    channel.echo_range.map(|range| range.index_axis_move(Axis(0), ping))
}

/// Reference level for `ping` from its neighbours within `half_width` pings.
fn neighbour_levels(levels: &[f64], ping: usize, half_width: usize) -> Vec<f64> {
    let lo = ping.saturating_sub(half_width);
    let hi = (ping + half_width + 1).min(levels.len());
    (lo..hi)
        .filter(|&other| other != ping)
        .map(|other| levels[other])
        .filter(|level| level.is_finite())
        .collect()
}

/// Whole pings are kept or dropped.
fn ping_mask(shape: (usize, usize), keep_ping: &[bool]) -> Array2<bool> {
    Array2::from_shape_fn(shape, |(p, _)| keep_ping[p])
}

/// Fills runs of `false` no longer than `max_gap` that sit between two
/// `true` cells.
fn close_gaps(mut line: ndarray::ArrayViewMut1<'_, bool>, max_gap: usize) {
    if max_gap == 0 {
        return;
    }
    let mut last_true: Option<usize> = None;
    for index in 0..line.len() {
        if !line[index] {
            continue;
        }
        if let Some(previous) = last_true {
            let gap = index - previous - 1;
            if gap > 0 && gap <= max_gap {
                for fill in previous + 1..index {
                    line[fill] = true;
                }
            }
        }
        last_true = Some(index);
    }
}

/// Clears runs of `true` shorter than `min_len`.
fn drop_short_runs(mut line: ndarray::ArrayViewMut1<'_, bool>, min_len: usize) {
    if min_len <= 1 {
        return;
    }
    let mut start: Option<usize> = None;
    for index in 0..=line.len() {
        let on = index < line.len() && line[index];
        match (on, start) {
            (true, None) => start = Some(index),
            (false, Some(from)) => {
                if index - from < min_len {
                    for clear in from..index {
                        line[clear] = false;
                    }
                }
                start = None;
            }
            _ => {}
        }
    }
}

impl DetectionKernels for ReferenceKernels {
    /// Flags pings whose mean level below `excludeabove` stands more than
    /// `thr` dB over the surrounding `n` pings.
    fn transient(
        &self,
        channel: ChannelView<'_>,
        method: TransientMethod,
        parameters: &TransientParameters,
    ) -> ProcessingResult<Array2<bool>> {
        let (n_ping, n_range) = channel.sv.dim();
        let levels: Vec<f64> = (0..n_ping)
            .map(|p| {
                let start = first_sample_at(ping_range(&channel, p), n_range, parameters.excludeabove);
                mean_db(channel.sv.slice(s![p, start..]).iter())
            })
            .collect();

        let keep: Vec<bool> = (0..n_ping)
            .map(|p| {
                let around = neighbour_levels(&levels, p, parameters.n as usize);
                let reference = match method {
                    TransientMethod::Ryan => StatsHelper::median(around),
                    TransientMethod::Fielding => StatsHelper::nanmean(around),
                };
                match reference {
                    Some(reference) if levels[p].is_finite() => levels[p] - reference <= parameters.thr,
                    _ => true,
                }
            })
            .collect();
        Ok(ping_mask((n_ping, n_range), &keep))
    }

    /// Compares each sample with the same sample `n` pings either side,
    /// after a vertical running mean over `m` samples.
    fn impulse(
        &self,
        channel: ChannelView<'_>,
        method: ImpulseMethod,
        parameters: &ImpulseParameters,
    ) -> ProcessingResult<Array2<bool>> {
        let (n_ping, n_range) = channel.sv.dim();
        let half = (parameters.m as usize) / 2;
        let smoothed = Array2::from_shape_fn((n_ping, n_range), |(p, r)| {
            let lo = r.saturating_sub(half);
            let hi = (r + half + 1).min(n_range);
            mean_db(channel.sv.slice(s![p, lo..hi]).iter())
        });

        let lag = (parameters.n as usize).max(1);
        let lags: Vec<usize> = match method {
            ImpulseMethod::RyanIterable => (1..=lag).collect(),
            ImpulseMethod::Ryan | ImpulseMethod::Wang => vec![lag],
        };

        let mut keep = Array2::from_elem((n_ping, n_range), true);
        for ((p, r), cell) in keep.indexed_iter_mut() {
            let value = smoothed[[p, r]];
            if !value.is_finite() {
                continue;
            }
            let spikes = lags.iter().any(|&lag| {
                let before = p.checked_sub(lag).map(|q| smoothed[[q, r]]);
                let after = (p + lag < n_ping).then(|| smoothed[[p + lag, r]]);
                let above = |other: Option<f64>| other.map(|other| value - other > parameters.thr);
                match (above(before), above(after)) {
                    (Some(a), Some(b)) => a && b,
                    (Some(edge), None) | (None, Some(edge)) => edge,
                    (None, None) => false,
                }
            });
            *cell = !spikes;
        }
        Ok(keep)
    }

    /// Flags pings whose level between `r0` and `r1` falls more than `thr`
    /// dB below the surrounding `n` pings.
    fn attenuation(
        &self,
        channel: ChannelView<'_>,
        method: AttenuationMethod,
        parameters: &AttenuationParameters,
    ) -> ProcessingResult<Array2<bool>> {
        let (n_ping, n_range) = channel.sv.dim();
        let (Some(r0), Some(r1)) = (parameters.r0, parameters.r1) else {
            return Err(ProcessingError::config(format!(
                "{} attenuation needs both r0 and r1",
                method.as_str()
            )));
        };
        let levels: Vec<f64> = (0..n_ping)
            .map(|p| {
                let range = ping_range(&channel, p);
                let lo = first_sample_at(range, n_range, r0);
                let hi = first_sample_at(range, n_range, r1).max(lo);
                mean_db(channel.sv.slice(s![p, lo..hi]).iter())
            })
            .collect();

        let keep: Vec<bool> = (0..n_ping)
            .map(|p| {
                let around = neighbour_levels(&levels, p, parameters.n as usize);
                match StatsHelper::median(around) {
                    Some(reference) if levels[p].is_finite() => levels[p] - reference >= parameters.thr,
                    _ => true,
                }
            })
            .collect();
        Ok(ping_mask((n_ping, n_range), &keep))
    }

    /// Keeps the water column above the seabed between `r0` and `r1`; the
    /// seabed and everything below it is dropped. A bottom pick is the first
    /// sample over `thr`; an echo pick must also stay over `tSv` to the end
    /// of the window, which rules out aggregations in mid-water.
    fn seabed(
        &self,
        channel: ChannelView<'_>,
        method: SeabedMethod,
        settings: &SeabedSettings,
    ) -> ProcessingResult<Array2<bool>> {
        let (n_ping, n_range) = channel.sv.dim();
        let (r0, r1, threshold, offset, sustained) = match settings {
            SeabedSettings::Bottom(parameters) => {
                (parameters.r0, parameters.r1, parameters.thr, parameters.roff, false)
            }
            SeabedSettings::Echo(parameters) => (parameters.r0, parameters.r1, parameters.t_sv, 0.0, true),
        };
        debug!("{} seabed on {}", method.as_str(), channel.name);

        let mut keep = Array2::from_elem((n_ping, n_range), true);
        for p in 0..n_ping {
            let range = ping_range(&channel, p);
            let lo = first_sample_at(range, n_range, r0);
            let hi = first_sample_at(range, n_range, r1).max(lo);
            let row = channel.sv.row(p);
            let strong = |r: usize| row[r] > threshold;
            let Some(hit) = (lo..hi).find(|&r| strong(r) && (!sustained || (r..hi).all(strong))) else {
                continue;
            };
            let cut = match range {
                Some(range) => first_sample_at(Some(range), n_range, range[hit] - offset).min(hit),
                None => hit,
            };
            keep.slice_mut(s![p, cut..]).fill(false);
        }
        Ok(keep)
    }

    /// Thresholds at `thr`, closes gaps up to `maxvgap` samples and
    /// `maxhgap` pings, then drops runs shorter than `minvlen`/`minhlen`.
    fn shoal(
        &self,
        channel: ChannelView<'_>,
        method: ShoalMethod,
        parameters: &ShoalParameters,
    ) -> ProcessingResult<Array2<bool>> {
        debug!("{} shoal detection on {}", method.as_str(), channel.name);
        let mut found = channel.sv.mapv(|value| value > parameters.thr);
        for row in found.axis_iter_mut(Axis(0)) {
            close_gaps(row, parameters.maxvgap as usize);
        }
        for column in found.axis_iter_mut(Axis(1)) {
            close_gaps(column, parameters.maxhgap as usize);
        }
        for row in found.axis_iter_mut(Axis(0)) {
            drop_short_runs(row, parameters.minvlen as usize);
        }
        for column in found.axis_iter_mut(Axis(1)) {
            drop_short_runs(column, parameters.minhlen as usize);
        }
        Ok(found)
    }

    fn frequency_difference(
        &self,
        volume: &AcousticVolume,
        expression: &FreqDiffExpression,
    ) -> ProcessingResult<Array2<bool>> {
        let sv = volume.sv()?;
        let a = sv.index_axis(Axis(0), volume.channel_index(&expression.chan_a)?);
        let b = sv.index_axis(Axis(0), volume.channel_index(&expression.chan_b)?);
        Ok(Array2::from_shape_fn(a.dim(), |(p, r)| {
            expression.holds(a[[p, r]], b[[p, r]])
        }))
    }

    /// Block-wise noise floor: for each run of `ping_num` pings the quietest
    /// `range_sample_num`-sample block sets the floor. Samples whose
    /// corrected level sits less than the SNR threshold above the floor are
    /// dropped.
    fn remove_background_noise(
        &self,
        volume: &AcousticVolume,
        parameters: &ResolvedBackgroundNoise,
    ) -> ProcessingResult<BackgroundNoiseEstimate> {
        let sv = volume.sv()?;
        let (n_channel, n_ping, n_range) = sv.dim();
        let mut noise = Array3::from_elem((n_channel, n_ping, n_range), f64::NAN);

        for c in 0..n_channel {
            for ping_start in (0..n_ping).step_by(parameters.ping_num) {
                let ping_end = (ping_start + parameters.ping_num).min(n_ping);
                let floor = (0..n_range)
                    .step_by(parameters.range_sample_num)
                    .map(|range_start| {
                        let range_end = (range_start + parameters.range_sample_num).min(n_range);
                        mean_db(sv.slice(s![c, ping_start..ping_end, range_start..range_end]).iter())
                    })
                    .filter(|level| level.is_finite())
                    .fold(f64::NAN, f64::min);
                let floor = match parameters.noise_max {
                    Some(cap) => floor.min(cap),
                    None => floor,
                };
                noise.slice_mut(s![c, ping_start..ping_end, ..]).fill(floor);
            }
        }

        let mut corrected = sv.to_owned();
        ndarray::Zip::from(&mut corrected).and(&noise).for_each(|value, &floor| {
            if !value.is_finite() || !floor.is_finite() {
                return;
            }
            let signal = db_to_linear_value(*value) - db_to_linear_value(floor);
            let level = if signal > 0.0 {
                linear_to_db_value(signal)
            } else {
                f64::NAN
            };
            *value = if level - floor >= parameters.snr_threshold {
                level
            } else {
                f64::NAN
            };
        });

        Ok(BackgroundNoiseEstimate {
            sv_corrected: corrected,
            sv_noise: noise,
        })
    }
}

/// Vertical sample spacing per ping, from echo_range.
fn sample_thickness(range: ArrayView1<'_, f64>) -> f64 {
    StatsHelper::nanmean(StatsHelper::diff(&range.to_vec())).unwrap_or(f64::NAN)
}

fn channel_nasc(sv: ArrayView2<'_, f64>, echo_range: ArrayView2<'_, f64>, range_bin_m: f64) -> f64 {
    let per_ping = sv.outer_iter().zip(echo_range.outer_iter()).filter_map(|(ping, range)| {
        let thickness = sample_thickness(range);
        if !thickness.is_finite() {
            return None;
        }
        let mut seen = false;
        let mut area = 0.0;
        for (value, depth) in ping.iter().zip(range.iter()) {
            if value.is_finite() && *depth <= range_bin_m {
                seen = true;
                area += db_to_linear_value(*value) * thickness;
            }
        }
        seen.then_some(area)
    });
    StatsHelper::nanmean(per_ping)
        .map(|area| NASC_SCALE * area)
        .unwrap_or(f64::NAN)
}

impl NascKernel for ReferenceKernels {
    /// One bin per channel: the mean over pings of the area backscattering
    /// coefficient down to `range_bin_m`, scaled to NASC.
    fn compute_nasc(
        &self,
        volume: &AcousticVolume,
        range_bin_m: f64,
        dist_bin_nmi: f64,
    ) -> ProcessingResult<NascDataset> {
        if !(dist_bin_nmi >= 0.0) || !(range_bin_m > 0.0) {
            return Err(ProcessingError::config(format!(
                "NASC bins must be positive, got {} m by {} nmi",
                range_bin_m, dist_bin_nmi
            )));
        }
        let sv = volume.sv()?;
        let echo_range = volume.grid(ECHO_RANGE)?;
        let values = volume
            .channels()
            .iter()
            .zip(volume.frequency_nominal())
            .enumerate()
            .map(|(index, (channel, frequency))| NascValue {
                channel: channel.clone(),
                frequency_nominal: *frequency,
                nasc: channel_nasc(
                    sv.index_axis(Axis(0), index),
                    echo_range.index_axis(Axis(0), index),
                    range_bin_m,
                ),
            })
            .collect();
        Ok(NascDataset { values })
    }
}
