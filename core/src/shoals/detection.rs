use super::labeling::MASK_SHOAL;
use crate::masks::attach::attach_mask_to_dataset;
use crate::masks::params::{ShoalMethod, ShoalParameters};
use crate::masks::registry::{create_mask, MaskRequest};
use crate::prelude::ProcessingResult;
use crate::telemetry::StageLogger;
use crate::toolkit::DetectionKernels;
use crate::volume::AcousticVolume;

/// Runs the shoal kernel and attaches its output as `mask_shoal`, replacing
/// any earlier shoal mask.
pub fn attach_shoal_mask_to_ds(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    method: ShoalMethod,
    parameters: &ShoalParameters,
) -> ProcessingResult<AcousticVolume> {
    let logger = StageLogger::new("shoals");
    let request = MaskRequest::Shoal {
        method,
        parameters: parameters.clone(),
    };
    let mask = create_mask(kernels, volume, &request)?;
    logger.detail(&format!(
        "{} marks {} of {} cells",
        MASK_SHOAL,
        mask.count_true(),
        volume.size()
    ));
    attach_mask_to_dataset(volume, mask)
}
