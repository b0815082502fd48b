pub mod background;
pub mod continuity;
pub mod interpolation;
pub mod mvbs;
pub mod regrid;
pub mod stages;

pub use background::{apply_remove_background_noise, BackgroundNoiseParams};
pub use continuity::{check_reversed_time, coerce_increasing_time, fix_time_reversions};
pub use interpolation::{db_to_linear, interpolate_sv, linear_to_db, InterpolationMethod};
pub use mvbs::{compute_mvbs, MvbsMethod, MvbsOptions, RangeVar};
pub use regrid::{find_lowest_resolution_channel, regrid_dataset};
pub use stages::{InterpolationStage, RegridStage, TimeContinuityStage};
