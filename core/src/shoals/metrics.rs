//! Per-shoal, per-channel geometry and acoustic metrics.

use super::labeling::{split_shoal_mask_with, LabelOptions, ShoalMask, MASK_SHOAL};
use crate::math::{GeoHelper, StatsHelper};
use crate::prelude::ProcessingResult;
use crate::toolkit::NascDataset;
use crate::volume::AcousticVolume;
use chrono::{DateTime, Utc};
use log::debug;
use ndarray::{Array2, Axis, Zip};
use serde::Serialize;

/// Ping-axis scale of bounding boxes and centroids, kept for compatibility
/// with the legacy echogram display coordinates. Range offsets are unscaled.
pub const PING_AXIS_SCALE: usize = 2;

/// One row of the shoal table. Every field but `filename` is empty on the
/// placeholder row emitted for files without shoals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoalRecord {
    pub label: Option<u32>,
    pub frequency: Option<f64>,
    pub filename: String,
    pub area: Option<usize>,
    #[serde(rename = "bbox.0")]
    pub bbox_0: Option<usize>,
    #[serde(rename = "bbox.1")]
    pub bbox_1: Option<usize>,
    #[serde(rename = "bbox.2")]
    pub bbox_2: Option<usize>,
    #[serde(rename = "bbox.3")]
    pub bbox_3: Option<usize>,
    #[serde(rename = "centroid.0")]
    pub centroid_0: Option<f64>,
    #[serde(rename = "centroid.1")]
    pub centroid_1: Option<f64>,
    #[serde(rename = "Sv_mean")]
    pub sv_mean: Option<f64>,
    pub npings: Option<usize>,
    pub nsamples: Option<usize>,
    pub corrected_length: Option<f64>,
    pub mean_range: Option<f64>,
    pub start_range: Option<usize>,
    pub end_range: Option<usize>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_lat: Option<f64>,
    pub end_lat: Option<f64>,
    pub start_lon: Option<f64>,
    pub end_lon: Option<f64>,
    pub nasc: Option<f64>,
}

impl ShoalRecord {
    pub fn placeholder(filename: impl Into<String>) -> Self {
        Self {
            label: None,
            frequency: None,
            filename: filename.into(),
            area: None,
            bbox_0: None,
            bbox_1: None,
            bbox_2: None,
            bbox_3: None,
            centroid_0: None,
            centroid_1: None,
            sv_mean: None,
            npings: None,
            nsamples: None,
            corrected_length: None,
            mean_range: None,
            start_range: None,
            end_range: None,
            start_time: None,
            end_time: None,
            start_lat: None,
            end_lat: None,
            start_lon: None,
            end_lon: None,
            nasc: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.label.is_none()
    }
}

fn first_last(flags: &[bool]) -> Option<(usize, usize)> {
    let first = flags.iter().position(|&flag| flag)?;
    let last = flags.iter().rposition(|&flag| flag)?;
    Some((first, last))
}

/// Metrics for one shoal on one channel; `None` when the shoal does not
/// touch the channel.
pub fn process_single_shoal_channel(
    volume: &AcousticVolume,
    shoal: &ShoalMask,
    channel: usize,
    nasc: Option<&NascDataset>,
) -> ProcessingResult<Option<ShoalRecord>> {
    let region = shoal.data.index_axis(Axis(0), channel);
    let area = region.iter().filter(|&&cell| cell).count();
    if area == 0 {
        return Ok(None);
    }

    let sv = volume.sv()?;
    let sv = sv.index_axis(Axis(0), channel);
    let mut masked = Array2::from_elem(sv.dim(), f64::NAN);
    Zip::from(&mut masked)
        .and(&sv)
        .and(&region)
        .for_each(|out, &value, &inside| {
            if inside {
                *out = value;
            }
        });
    let present = masked.mapv(|value| !value.is_nan());
    let ping_hit: Vec<bool> = present
        .axis_iter(Axis(0))
        .map(|row| row.iter().any(|&flag| flag))
        .collect();
    let range_hit: Vec<bool> = present
        .axis_iter(Axis(1))
        .map(|column| column.iter().any(|&flag| flag))
        .collect();

    let name = &volume.channels()[channel];
    let mut record = ShoalRecord::placeholder(volume.source_stem());
    record.label = Some(shoal.label);
    record.frequency = Some(volume.frequency_nominal()[channel]);
    record.area = Some(area);
    record.sv_mean = StatsHelper::nanmean(masked.iter().copied());
    record.nasc = nasc.and_then(|dataset| dataset.for_channel(name));

    let extents = first_last(&ping_hit).zip(first_last(&range_hit));
    if let Some(((start_ping, end_ping), (start_range, end_range))) = extents {
        let range_sample = volume.range_sample();
        record.bbox_0 = Some(start_range);
        record.bbox_1 = Some(start_ping * PING_AXIS_SCALE);
        record.bbox_2 = Some(end_range);
        record.bbox_3 = Some(end_ping * PING_AXIS_SCALE);
        record.centroid_0 = Some((start_range + end_range) as f64 / 2.0);
        record.centroid_1 = Some(((start_ping + end_ping) * PING_AXIS_SCALE) as f64 / 2.0);
        record.npings = Some(ping_hit.iter().filter(|&&hit| hit).count());
        record.nsamples = Some(range_hit.iter().filter(|&&hit| hit).count());
        record.mean_range = StatsHelper::nanmean(
            range_hit
                .iter()
                .zip(range_sample)
                .filter(|(hit, _)| **hit)
                .map(|(_, sample)| *sample as f64),
        );
        record.start_range = Some(range_sample[start_range]);
        record.end_range = Some(range_sample[end_range]);
        record.start_time = Some(volume.ping_time()[start_ping]);
        record.end_time = Some(volume.ping_time()[end_ping]);

        if let Ok((lat, lon)) = volume.track() {
            let (start_lat, end_lat) = (lat[start_ping], lat[end_ping]);
            let (start_lon, end_lon) = (lon[start_ping], lon[end_ping]);
            record.start_lat = Some(start_lat);
            record.end_lat = Some(end_lat);
            record.start_lon = Some(start_lon);
            record.end_lon = Some(end_lon);
            let length = GeoHelper::haversine_m(start_lat, start_lon, end_lat, end_lon);
            record.corrected_length = length.is_finite().then_some(length);
        }
    } else {
        debug!(
            "shoal {} covers only missing samples on {}",
            shoal.label, name
        );
    }
    Ok(Some(record))
}

/// Records for every channel the shoal touches.
pub fn process_single_shoal(
    volume: &AcousticVolume,
    shoal: &ShoalMask,
    nasc: Option<&NascDataset>,
) -> ProcessingResult<Vec<ShoalRecord>> {
    let mut records = Vec::new();
    for channel in 0..volume.channels().len() {
        if let Some(record) = process_single_shoal_channel(volume, shoal, channel, nasc)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Flattened records for every (shoal, channel) pair with a non-zero area.
/// A volume whose shoal mask is empty yields a single placeholder row.
pub fn process_shoals(
    volume: &AcousticVolume,
    nasc: Option<&NascDataset>,
) -> ProcessingResult<Vec<ShoalRecord>> {
    process_shoals_with(volume, nasc, LabelOptions::default())
}

pub fn process_shoals_with(
    volume: &AcousticVolume,
    nasc: Option<&NascDataset>,
    options: LabelOptions,
) -> ProcessingResult<Vec<ShoalRecord>> {
    let mask = volume.grid_mask(MASK_SHOAL)?;
    if !mask.iter().any(|&cell| cell) {
        return Ok(vec![ShoalRecord::placeholder(volume.source_stem())]);
    }
    let mut records = Vec::new();
    for shoal in split_shoal_mask_with(volume, options)? {
        records.extend(process_single_shoal(volume, &shoal, nasc)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::NascValue;
    use crate::testing::VolumeBuilder;
    use ndarray::{s, Array3};

    fn single_block_volume() -> AcousticVolume {
        let mut keep = Array3::from_elem((2, 20, 12), false);
        keep.slice_mut(s![0, 10..13, 5..8]).fill(true);
        VolumeBuilder::new(2, 20, 12)
            .with_track((-54.0, -36.0), (0.001, 0.002))
            .with_mask(MASK_SHOAL, keep)
            .build()
    }

    #[test]
    fn single_block_scenario() {
        let volume = single_block_volume();
        let records = process_shoals(&volume, None).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.area, Some(9));
        assert_eq!(record.npings, Some(3));
        assert_eq!(record.nsamples, Some(3));
        assert_eq!(record.label, Some(1));
        assert_eq!(record.frequency, Some(38_000.0));
        assert_eq!(record.filename, "JR161-D20230509-T100645");

        let (lat, lon) = volume.track().unwrap();
        let expected = GeoHelper::haversine_m(lat[10], lon[10], lat[12], lon[12]);
        assert!((record.corrected_length.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn bounding_box_scales_the_ping_axis() {
        let volume = single_block_volume();
        let record = &process_shoals(&volume, None).unwrap()[0];
        assert_eq!(record.bbox_0, Some(5));
        assert_eq!(record.bbox_2, Some(7));
        assert_eq!(record.bbox_1, Some(10 * PING_AXIS_SCALE));
        assert_eq!(record.bbox_3, Some(12 * PING_AXIS_SCALE));
        assert_eq!(record.centroid_0, Some(6.0));
        assert_eq!(record.centroid_1, Some(22.0));
        assert_eq!(record.mean_range, Some(6.0));
        assert_eq!(record.start_time, Some(volume.ping_time()[10]));
        assert_eq!(record.end_time, Some(volume.ping_time()[12]));
    }

    #[test]
    fn zero_area_channels_are_dropped() {
        let mut keep = Array3::from_elem((2, 4, 4), false);
        keep[[0, 1, 1]] = true;
        let volume = VolumeBuilder::new(2, 4, 4).with_mask(MASK_SHOAL, keep).build();
        let records = process_shoals(&volume, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].frequency, Some(38_000.0));
    }

    #[test]
    fn empty_mask_yields_one_placeholder_row() {
        let volume = VolumeBuilder::new(2, 4, 4)
            .with_mask(MASK_SHOAL, Array3::from_elem((2, 4, 4), false))
            .build();
        let records = process_shoals(&volume, None).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_placeholder());
        assert_eq!(records[0].filename, "JR161-D20230509-T100645");
        assert_eq!(records[0].area, None);
    }

    #[test]
    fn nasc_is_looked_up_per_channel() {
        let volume = single_block_volume();
        let nasc = NascDataset {
            values: vec![NascValue {
                channel: "ch0".into(),
                frequency_nominal: 38_000.0,
                nasc: 412.5,
            }],
        };
        let records = process_shoals(&volume, Some(&nasc)).unwrap();
        assert_eq!(records[0].nasc, Some(412.5));
    }

    #[test]
    fn shoal_over_missing_samples_has_no_extent() {
        let mut sv = Array3::from_elem((1, 4, 4), -60.0);
        sv[[0, 2, 2]] = f64::NAN;
        let mut keep = Array3::from_elem((1, 4, 4), false);
        keep[[0, 2, 2]] = true;
        let volume = VolumeBuilder::new(1, 4, 4)
            .sv(sv)
            .with_mask(MASK_SHOAL, keep)
            .build();
        let records = process_shoals(&volume, None).unwrap();
        assert_eq!(records[0].area, Some(1));
        assert_eq!(records[0].npings, None);
        assert_eq!(records[0].sv_mean, None);
    }
}
