//! Whole-file NASC: one depth × distance bin per channel, optionally over a
//! masked copy of the volume, flattened into a single report row.

use crate::masks::apply::{apply_mask, ApplyParams};
use crate::math::{GeoHelper, StatsHelper};
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::telemetry::StageLogger;
use crate::toolkit::{NascDataset, NascKernel};
use crate::volume::{AcousticVolume, VarData, DEPTH};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct NascSummary {
    pub dataset: NascDataset,
    pub max_depth_m: f64,
    pub max_distance_nmi: f64,
}

/// Sizes a single bin from the deepest depth sample and the along-track
/// distance covered, then integrates.
pub fn compute_per_dataset_nasc(
    kernel: &dyn NascKernel,
    volume: &AcousticVolume,
) -> ProcessingResult<NascSummary> {
    let (lat, lon) = volume.track()?;
    let lat = lat.to_vec();
    let lon = lon.to_vec();
    let max_distance_nmi = GeoHelper::meters_to_nmi(GeoHelper::track_length_m(&lat, &lon));
    let max_depth_m = StatsHelper::nanmax(volume.grid(DEPTH)?.iter().copied()).ok_or_else(|| {
        ProcessingError::integrity("depth holds no finite samples, cannot size the NASC bin")
    })?;

    let dataset = kernel.compute_nasc(volume, max_depth_m, max_distance_nmi)?;
    Ok(NascSummary {
        dataset,
        max_depth_m,
        max_distance_nmi,
    })
}

/// Applies each named mask (inverted when its flag is set) to `Sv`, in map
/// order, and returns the reduced volume.
pub fn mask_for_nasc(
    volume: &AcousticVolume,
    masks: &BTreeMap<String, bool>,
) -> ProcessingResult<AcousticVolume> {
    let params = ApplyParams::default();
    let mut current = volume.clone();
    for (name, invert) in masks {
        if !current.contains(name) {
            return Err(ProcessingError::MissingVariable(format!(
                "mask {} does not exist in the dataset",
                name
            )));
        }
        if *invert {
            let mut variable = current.variable(name)?.clone();
            variable.data = match variable.data {
                VarData::Bool(data) => VarData::Bool(data.mapv(|keep| !keep)),
                VarData::Float(_) => {
                    return Err(ProcessingError::integrity(format!(
                        "{} is not boolean and cannot be inverted",
                        name
                    )))
                }
            };
            current.insert_variable(name.as_str(), variable)?;
        }
        current = apply_mask(&current, name, &params)?;
    }
    Ok(current)
}

/// NASC over the volume reduced by `masks`.
pub fn mask_nasc(
    kernel: &dyn NascKernel,
    volume: &AcousticVolume,
    masks: &BTreeMap<String, bool>,
) -> ProcessingResult<NascSummary> {
    compute_per_dataset_nasc(kernel, &mask_for_nasc(volume, masks)?)
}

/// One extra set of NASC columns computed over a masked copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NascVariant {
    /// Mask name to invert flag.
    pub masks: BTreeMap<String, bool>,
    pub abbreviated: bool,
    pub root_name: Option<String>,
}

impl Default for NascVariant {
    fn default() -> Self {
        let mut masks = BTreeMap::new();
        masks.insert("mask_shoal".to_string(), false);
        Self {
            masks,
            abbreviated: true,
            root_name: Some("fish_NASC".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NascField {
    Text(String),
    Int(usize),
    Float(f64),
    Time(DateTime<Utc>),
}

impl fmt::Display for NascField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NascField::Text(value) => write!(f, "{}", value),
            NascField::Int(value) => write!(f, "{}", value),
            NascField::Float(value) if value.is_nan() => Ok(()),
            NascField::Float(value) => write!(f, "{}", value),
            NascField::Time(value) => write!(f, "{}", value.to_rfc3339_opts(SecondsFormat::Micros, true)),
        }
    }
}

/// Ordered column → value map. Re-inserting a column overwrites it in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NascRow {
    columns: Vec<(String, NascField)>,
}

impl NascRow {
    pub fn insert(&mut self, column: impl Into<String>, value: NascField) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn update(&mut self, other: NascRow) {
        for (column, value) in other.columns {
            self.insert(column, value);
        }
    }

    pub fn get(&self, column: &str) -> Option<&NascField> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            NascField::Float(value) => Some(*value),
            NascField::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &NascField> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Column suffix for a nominal frequency, always with one decimal place for
/// whole numbers (`38000.0`).
pub fn frequency_label(frequency: f64) -> String {
    if frequency.fract() == 0.0 {
        format!("{:.1}", frequency)
    } else {
        frequency.to_string()
    }
}

/// NASC columns for `volume`. The full form leads with file, track, time and
/// bin metadata and adds sample counts per frequency.
pub fn base_nasc_data(
    kernel: &dyn NascKernel,
    volume: &AcousticVolume,
    abbreviated: bool,
    root_name: Option<&str>,
) -> ProcessingResult<NascRow> {
    let summary = compute_per_dataset_nasc(kernel, volume)?;
    let mut row = NascRow::default();

    if !abbreviated {
        let (lat, lon) = volume.track()?;
        let times = volume.ping_time();
        let extent = |values: Vec<f64>| {
            (
                StatsHelper::nanmin(values.iter().copied()).unwrap_or(f64::NAN),
                StatsHelper::nanmax(values.iter().copied()).unwrap_or(f64::NAN),
            )
        };
        let (lat_min, lat_max) = extent(lat.to_vec());
        let (lon_min, lon_max) = extent(lon.to_vec());
        row.insert("filename", NascField::Text(volume.source_stem()));
        row.insert("start_lat", NascField::Float(lat_min));
        row.insert("end_lat", NascField::Float(lat_max));
        row.insert("start_lon", NascField::Float(lon_min));
        row.insert("end_lon", NascField::Float(lon_max));
        if let (Some(first), Some(last)) = (times.first(), times.last()) {
            row.insert("start_time", NascField::Time(*first));
            row.insert("end_time", NascField::Time(*last));
        }
        row.insert("start_ping", NascField::Int(0));
        row.insert("end_ping", NascField::Int(times.len()));
        row.insert("NASC_st_range", NascField::Float(0.0));
        row.insert("NASC_en_range", NascField::Float(summary.max_depth_m));
        row.insert("maximum_distance", NascField::Float(summary.max_distance_nmi));
    }

    let nasc_name = root_name.unwrap_or("NASC");
    for value in &summary.dataset.values {
        row.insert(
            format!("{}_{}", nasc_name, frequency_label(value.frequency_nominal)),
            NascField::Float(value.nasc),
        );
    }
    if !abbreviated {
        let observed = volume.ping_time().len() * volume.range_sample().len();
        for value in &summary.dataset.values {
            row.insert(
                format!("Observed_samples_{}", frequency_label(value.frequency_nominal)),
                NascField::Int(observed),
            );
        }
        for value in &summary.dataset.values {
            let index = volume.channel_index(&value.channel)?;
            let valid = volume
                .valid_samples(index)?
                .iter()
                .filter(|&&valid| valid)
                .count();
            row.insert(
                format!("Valid_samples_{}", frequency_label(value.frequency_nominal)),
                NascField::Int(valid),
            );
        }
    }
    Ok(row)
}

pub fn mask_nasc_data(
    kernel: &dyn NascKernel,
    volume: &AcousticVolume,
    variant: &NascVariant,
) -> ProcessingResult<NascRow> {
    let masked = mask_for_nasc(volume, &variant.masks)?;
    base_nasc_data(kernel, &masked, variant.abbreviated, variant.root_name.as_deref())
}

/// The full row followed by the columns of every variant.
pub fn full_nasc_data(
    kernel: &dyn NascKernel,
    volume: &AcousticVolume,
    variants: &[NascVariant],
) -> ProcessingResult<NascRow> {
    let logger = StageLogger::new("nasc");
    let mut row = base_nasc_data(kernel, volume, false, None)?;
    for variant in variants {
        let extra = mask_nasc_data(kernel, volume, variant)?;
        logger.detail(&format!(
            "variant {} added {} column(s)",
            variant.root_name.as_deref().unwrap_or("NASC"),
            extra.len()
        ));
        row.update(extra);
    }
    Ok(row)
}
