//! Regridding of every range-dependent variable onto the depth axis of the
//! channel that reaches the shallowest usable depth.

use super::interpolation::{db_to_linear_value, linear_to_db_value};
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::telemetry::StageLogger;
use crate::volume::{AcousticVolume, Dim, VarData, Variable, ECHO_RANGE, GRID_DIMS, SV};
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, Ix2, Ix3};

/// Index of the largest non-missing value, first on ties.
fn nanargmax(values: ArrayView1<'_, f64>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, value)| !value.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (index, &value)| match best {
            Some((_, current)) if current >= value => best,
            _ => Some((index, value)),
        })
        .map(|(index, _)| index)
}

/// Returns the channel whose deepest valid sample index, over all pings, is
/// the smallest, together with that index.
pub fn find_lowest_resolution_channel(volume: &AcousticVolume) -> ProcessingResult<(usize, usize)> {
    let echo_range = volume.grid(ECHO_RANGE)?;
    let mut deepest_index = volume.range_sample().len();
    let mut lowest = None;
    for (index, channel) in echo_range.axis_iter(Axis(0)).enumerate() {
        let reach = channel
            .axis_iter(Axis(0))
            .filter_map(nanargmax)
            .max();
        if let Some(reach) = reach {
            if reach < deepest_index {
                deepest_index = reach;
                lowest = Some(index);
            }
        }
    }
    lowest
        .map(|channel| (channel, deepest_index))
        .ok_or_else(|| ProcessingError::integrity("echo_range holds no valid samples"))
}

/// Nearest-neighbour lookup of `values` at `targets`; targets outside the
/// span of the source depths get `None`.
struct NearestLookup {
    order: Vec<usize>,
    depths: Vec<f64>,
}

impl NearestLookup {
    fn new(source_depths: ArrayView1<'_, f64>) -> Self {
        let mut pairs: Vec<(usize, f64)> = source_depths
            .iter()
            .enumerate()
            .filter(|(_, depth)| depth.is_finite())
            .map(|(index, depth)| (index, *depth))
            .collect();
        pairs.sort_by(|a, b| a.1.total_cmp(&b.1));
        Self {
            order: pairs.iter().map(|(index, _)| *index).collect(),
            depths: pairs.iter().map(|(_, depth)| *depth).collect(),
        }
    }

    fn source_index(&self, target: f64) -> Option<usize> {
        let (first, last) = (*self.depths.first()?, *self.depths.last()?);
        if !target.is_finite() || target < first || target > last {
            return None;
        }
        let upper = self.depths.partition_point(|depth| *depth < target);
        if upper == 0 {
            return Some(self.order[0]);
        }
        let lower = upper - 1;
        let pick = if upper >= self.depths.len()
            || target - self.depths[lower] <= self.depths[upper] - target
        {
            lower
        } else {
            upper
        };
        Some(self.order[pick])
    }
}

fn resample_profile<T: Copy>(
    values: ArrayView1<'_, T>,
    lookup: &NearestLookup,
    targets: &[f64],
    missing: T,
) -> Array1<T> {
    targets
        .iter()
        .map(|target| {
            lookup
                .source_index(*target)
                .and_then(|index| values.get(index).copied())
                .unwrap_or(missing)
        })
        .collect()
}

struct Grid<'a> {
    old_depths: ArrayView2<'a, f64>,
    lowest_channel: usize,
    new_depths: Vec<f64>,
}

impl Grid<'_> {
    fn lookups(&self) -> Vec<NearestLookup> {
        self.old_depths
            .axis_iter(Axis(0))
            .map(NearestLookup::new)
            .collect()
    }

    fn resample_float(&self, name: &str, variable: &Variable, data: &ndarray::ArrayD<f64>) -> ProcessingResult<VarData> {
        let is_sv = name == SV;
        let to_domain = |value: f64| if is_sv { db_to_linear_value(value) } else { value };
        let from_domain = |value: f64| if is_sv { linear_to_db_value(value) } else { value };
        let n_new = self.new_depths.len();
        let lookups = self.lookups();

        if variable.dims == GRID_DIMS {
            let grid = data
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|err| ProcessingError::integrity(err.to_string()))?;
            let (n_channel, n_ping, _) = grid.dim();
            let mut out = Array3::from_elem((n_channel, n_ping, n_new), f64::NAN);
            for channel in 0..n_channel {
                for ping in 0..n_ping {
                    let profile = grid.slice(s![channel, ping, ..]).mapv(to_domain);
                    let resampled =
                        resample_profile(profile.view(), &lookups[channel], &self.new_depths, f64::NAN);
                    out.slice_mut(s![channel, ping, ..])
                        .assign(&resampled.mapv(from_domain));
                }
            }
            Ok(VarData::Float(out.into_dyn()))
        } else {
            let plane = data
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|err| ProcessingError::integrity(err.to_string()))?;
            let lookup = &lookups[self.lowest_channel];
            let mut out = Array2::from_elem((plane.nrows(), n_new), f64::NAN);
            for (ping, profile) in plane.axis_iter(Axis(0)).enumerate() {
                let resampled =
                    resample_profile(profile.mapv(to_domain).view(), lookup, &self.new_depths, f64::NAN);
                out.row_mut(ping).assign(&resampled.mapv(from_domain));
            }
            Ok(VarData::Float(out.into_dyn()))
        }
    }

    fn resample_bool(&self, variable: &Variable, data: &ndarray::ArrayD<bool>) -> ProcessingResult<VarData> {
        let n_new = self.new_depths.len();
        let lookups = self.lookups();
        if variable.dims == GRID_DIMS {
            let grid = data
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|err| ProcessingError::integrity(err.to_string()))?;
            let (n_channel, n_ping, _) = grid.dim();
            let mut out = Array3::from_elem((n_channel, n_ping, n_new), false);
            for channel in 0..n_channel {
                for ping in 0..n_ping {
                    let resampled = resample_profile(
                        grid.slice(s![channel, ping, ..]),
                        &lookups[channel],
                        &self.new_depths,
                        false,
                    );
                    out.slice_mut(s![channel, ping, ..]).assign(&resampled);
                }
            }
            Ok(VarData::Bool(out.into_dyn()))
        } else {
            let plane = data
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|err| ProcessingError::integrity(err.to_string()))?;
            let lookup = &lookups[self.lowest_channel];
            let mut out = Array2::from_elem((plane.nrows(), n_new), false);
            for (ping, profile) in plane.axis_iter(Axis(0)).enumerate() {
                out.row_mut(ping)
                    .assign(&resample_profile(profile, lookup, &self.new_depths, false));
            }
            Ok(VarData::Bool(out.into_dyn()))
        }
    }
}

/// Resamples every variable indexed by range_sample onto the lowest
/// resolution channel's depth bins. Everything else, global attributes
/// included, is carried over untouched.
pub fn regrid_dataset(volume: &AcousticVolume) -> ProcessingResult<AcousticVolume> {
    let logger = StageLogger::new("regrid");
    let (lowest_channel, max_depth_index) = find_lowest_resolution_channel(volume)?;
    let echo_range = volume.grid(ECHO_RANGE)?;

    let lowest = echo_range.index_axis(Axis(0), lowest_channel);
    let per_ping_reach: Vec<Option<usize>> = lowest.axis_iter(Axis(0)).map(nanargmax).collect();
    // first ping reaching the deepest valid sample of the lowest channel
    let reference_ping = per_ping_reach
        .iter()
        .position(|reach| *reach == Some(max_depth_index))
        .ok_or_else(|| ProcessingError::integrity("no ping reaches the regrid depth"))?;

    let grid = Grid {
        old_depths: echo_range.slice_move(s![.., reference_ping, ..]),
        lowest_channel,
        new_depths: lowest
            .slice(s![reference_ping, ..=max_depth_index])
            .to_vec(),
    };
    logger.record(&format!(
        "regridding onto channel {} ({} range samples)",
        volume.channels()[lowest_channel],
        max_depth_index + 1
    ));

    let mut out = volume.empty_like_with_range((0..=max_depth_index).collect());
    for (name, variable) in volume.variables() {
        if !variable.is_indexed_by(Dim::RangeSample) {
            out.insert_unchecked(name.clone(), variable.clone());
            continue;
        }
        let supported =
            variable.dims == GRID_DIMS || variable.dims == [Dim::PingTime, Dim::RangeSample];
        if !supported {
            return Err(ProcessingError::integrity(format!(
                "cannot regrid '{}' laid out as {:?}",
                name, variable.dims
            )));
        }
        let data = match &variable.data {
            VarData::Float(data) => grid.resample_float(name, variable, data)?,
            VarData::Bool(data) => grid.resample_bool(variable, data)?,
        };
        out.insert_variable(
            name.clone(),
            Variable {
                dims: variable.dims.clone(),
                data,
                attrs: variable.attrs.clone(),
            },
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{AttrValue, LATITUDE};
    use crate::testing::VolumeBuilder;

    /// Two channels: ch0 sampled every 0.5 m over 8 samples, ch1 every 1 m
    /// but only 4 valid samples deep.
    fn mixed_resolution() -> AcousticVolume {
        let mut echo_range = Array3::from_elem((2, 3, 8), f64::NAN);
        for p in 0..3 {
            for r in 0..8 {
                echo_range[[0, p, r]] = r as f64 * 0.5;
            }
            for r in 0..4 {
                echo_range[[1, p, r]] = r as f64;
            }
        }
        let sv = Array3::from_shape_fn((2, 3, 8), |(c, _, r)| -50.0 - r as f64 - 10.0 * c as f64);
        let mut volume = VolumeBuilder::new(2, 3, 8)
            .sv(sv)
            .with_variable(ECHO_RANGE, Variable::grid(echo_range))
            .with_track((-54.0, -36.0), (0.001, 0.0))
            .build();
        volume
            .attrs_mut()
            .insert("title".into(), AttrValue::from("survey"));
        volume
    }

    #[test]
    fn lowest_resolution_channel_is_the_shallowest() {
        let volume = mixed_resolution();
        // ch0 reaches index 7, ch1 index 3
        assert_eq!(find_lowest_resolution_channel(&volume).unwrap(), (1, 3));
    }

    #[test]
    fn regrid_shrinks_range_axis_and_resamples_by_nearest_depth() {
        let volume = mixed_resolution();
        let out = regrid_dataset(&volume).unwrap();
        assert_eq!(out.range_sample(), &[0, 1, 2, 3]);
        let sv = out.sv().unwrap();
        assert_eq!(sv.dim(), (2, 3, 4));
        // ch0 depth 2 m was sample 4
        assert!((sv[[0, 0, 2]] - -54.0).abs() < 1e-9);
        // ch1 keeps its own samples
        assert!((sv[[1, 0, 3]] - -63.0).abs() < 1e-9);
        let range = out.grid(ECHO_RANGE).unwrap();
        assert_eq!(range[[0, 1, 3]], 3.0);
    }

    #[test]
    fn regrid_keeps_attributes_and_per_ping_variables() {
        let volume = mixed_resolution();
        let out = regrid_dataset(&volume).unwrap();
        assert_eq!(out.attrs(), volume.attrs());
        assert_eq!(out.variable(LATITUDE).unwrap(), volume.variable(LATITUDE).unwrap());
        assert_eq!(out.ping_time(), volume.ping_time());
    }

    #[test]
    fn masks_are_resampled_as_booleans() {
        let mut keep = Array3::from_elem((2, 3, 8), true);
        keep[[0, 0, 4]] = false;
        let volume = mixed_resolution()
            .with_variable("mask_seabed", Variable::grid_mask(keep))
            .unwrap();
        let out = regrid_dataset(&volume).unwrap();
        let mask = out.grid_mask("mask_seabed").unwrap();
        assert!(!mask[[0, 0, 2]]);
        assert!(mask[[0, 0, 1]]);
    }

    #[test]
    fn regrid_without_echo_range_fails() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        assert!(regrid_dataset(&volume).is_err());
    }
}
