use crate::io::integrity::SonarModel;
use crate::prelude::ProcessingResult;
use crate::volume::AcousticVolume;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaveformMode {
    #[default]
    Cw,
    Bb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeMode {
    #[default]
    Power,
    Complex,
}

impl EncodeMode {
    /// Wideband transceivers record complex samples; the rest record power.
    pub fn for_model(model: SonarModel) -> Self {
        match model {
            SonarModel::Ek80 => EncodeMode::Complex,
            _ => EncodeMode::Power,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationOptions {
    pub waveform_mode: WaveformMode,
    pub encode_mode: EncodeMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthOptions {
    pub depth_offset: f64,
    pub tilt: f64,
    pub downward: bool,
}

impl Default for DepthOptions {
    fn default() -> Self {
        Self {
            depth_offset: 0.0,
            tilt: 0.0,
            downward: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationOptions {
    pub nmea_sentence: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitBeamOptions {
    pub waveform_mode: WaveformMode,
    pub encode_mode: EncodeMode,
    pub pulse_compression: bool,
}

/// Vendor calibration values of one transceiver channel, as recorded in the
/// raw file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCalibration {
    pub channel: String,
    pub frequency_nominal: f64,
    /// Seconds.
    pub pulse_length: f64,
    /// dB.
    pub gain_correction: f64,
    /// dB.
    pub sa_correction: f64,
}

/// Decoder, calibration and enrichment entry points of the sonar toolkit.
pub trait SonarBackend {
    type Handle;

    fn open_raw(&self, path: &Path, sonar_model: SonarModel) -> ProcessingResult<Self::Handle>;
    fn open_converted(&self, path: &Path) -> ProcessingResult<Self::Handle>;

    /// One entry per channel of the opened file.
    fn calibration(&self, handle: &Self::Handle) -> ProcessingResult<Vec<ChannelCalibration>>;

    fn compute_sv(
        &self,
        handle: &Self::Handle,
        options: &CalibrationOptions,
    ) -> ProcessingResult<AcousticVolume>;
    fn compute_ts(
        &self,
        handle: &Self::Handle,
        options: &CalibrationOptions,
    ) -> ProcessingResult<AcousticVolume>;

    fn add_depth(
        &self,
        volume: &AcousticVolume,
        options: &DepthOptions,
    ) -> ProcessingResult<AcousticVolume>;
    fn add_location(
        &self,
        volume: &AcousticVolume,
        handle: &Self::Handle,
        options: &LocationOptions,
    ) -> ProcessingResult<AcousticVolume>;
    fn add_splitbeam_angle(
        &self,
        volume: &AcousticVolume,
        handle: &Self::Handle,
        options: &SplitBeamOptions,
    ) -> ProcessingResult<AcousticVolume>;
}
