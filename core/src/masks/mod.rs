//! Mask registry, creation, attachment and application.

pub mod apply;
pub mod attach;
pub mod create;
pub mod freqdiff;
pub mod params;
pub mod registry;

pub use apply::{
    apply_mask, apply_mask_organisms_in_order, apply_selected_noise_masks_and_or_noise_removal,
    ApplyParams, NoiseProcess, ProcessRequest,
};
pub use attach::{attach_mask_to_dataset, attach_masks_to_dataset};
pub use create::{create_masks, CreationOptions, MaskCreationFailure, MaskCreationReport};
pub use freqdiff::{
    find_mask_freq_diff, identify_organisms, Comparison, FreqDiffCriterion, FreqDiffExpression,
    FreqDiffOptions, OrganismClass,
};
pub use registry::{create_mask, create_mask_by_name, MaskKind, MaskRequest, NoiseRequest};
