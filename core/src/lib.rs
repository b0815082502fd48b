//! Post-calibration core of the hydroacoustic survey pipeline.
//!
//! A calibrated echosounder volume flows through noise-mask creation and
//! fixed-order application, interpolation and regridding, shoal extraction
//! and NASC aggregation. Decoding, calibration physics and the detection
//! kernels stay behind the traits in [`toolkit`].

pub mod calibrate;
pub mod config;
pub mod enrich;
pub mod io;
pub mod masks;
pub mod math;
pub mod nasc;
pub mod prelude;
pub mod processing;
pub mod shoals;
pub mod telemetry;
pub mod toolkit;
pub mod volume;

#[cfg(test)]
mod testing;

pub use config::DenoiseConfig;
pub use prelude::{ProcessingError, ProcessingResult, ProcessingStage};
pub use volume::{AcousticVolume, Mask};
