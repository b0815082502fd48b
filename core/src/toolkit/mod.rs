//! Seams to the external acoustic-processing toolkit.
//!
//! Decoding, calibration, the noise/seabed/shoal detection algorithms and the
//! NASC integrator are not implemented here; the pipeline talks to them
//! through these traits.

pub mod backend;
pub mod detection;

pub use backend::{
    CalibrationOptions, ChannelCalibration, DepthOptions, EncodeMode, LocationOptions, SonarBackend,
    SplitBeamOptions, WaveformMode,
};
pub use detection::{BackgroundNoiseEstimate, DetectionKernels, NascDataset, NascKernel, NascValue};
