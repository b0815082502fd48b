//! Shoal detection, connected-component extraction and per-shoal metrics.

pub mod detection;
pub mod labeling;
pub mod metrics;

pub use detection::attach_shoal_mask_to_ds;
pub use labeling::{
    channel_areas, label_components, split_shoal_mask, split_shoal_mask_with, Connectivity,
    LabelOptions, LabelScope, ShoalMask, MASK_SHOAL,
};
pub use metrics::{
    process_shoals, process_shoals_with, process_single_shoal, process_single_shoal_channel,
    ShoalRecord, PING_AXIS_SCALE,
};

use crate::masks::params::{ShoalMethod, ShoalParameters};
use crate::prelude::ProcessingResult;
use crate::toolkit::{DetectionKernels, NascDataset};
use crate::volume::AcousticVolume;

/// Detects shoals, attaches `mask_shoal` and returns the volume alongside
/// its shoal table.
pub fn get_shoals_list(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    method: ShoalMethod,
    parameters: &ShoalParameters,
    nasc: Option<&NascDataset>,
) -> ProcessingResult<(AcousticVolume, Vec<ShoalRecord>)> {
    let with_mask = attach_shoal_mask_to_ds(kernels, volume, method, parameters)?;
    let records = process_shoals(&with_mask, nasc)?;
    Ok((with_mask, records))
}
