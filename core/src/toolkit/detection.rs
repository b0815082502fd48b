use crate::masks::freqdiff::FreqDiffExpression;
use crate::masks::params::{
    AttenuationMethod, AttenuationParameters, ImpulseMethod, ImpulseParameters, SeabedMethod,
    SeabedSettings, ShoalMethod, ShoalParameters, TransientMethod, TransientParameters,
};
use crate::processing::background::ResolvedBackgroundNoise;
use crate::prelude::ProcessingResult;
use crate::volume::{AcousticVolume, ChannelView};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Detection primitives. Per-channel methods return one boolean array over
/// ping_time × range_sample; the mask factory stacks them along `channel`.
pub trait DetectionKernels: Send + Sync {
    fn transient(
        &self,
        channel: ChannelView<'_>,
        method: TransientMethod,
        parameters: &TransientParameters,
    ) -> ProcessingResult<Array2<bool>>;

    fn impulse(
        &self,
        channel: ChannelView<'_>,
        method: ImpulseMethod,
        parameters: &ImpulseParameters,
    ) -> ProcessingResult<Array2<bool>>;

    fn attenuation(
        &self,
        channel: ChannelView<'_>,
        method: AttenuationMethod,
        parameters: &AttenuationParameters,
    ) -> ProcessingResult<Array2<bool>>;

    fn seabed(
        &self,
        channel: ChannelView<'_>,
        method: SeabedMethod,
        settings: &SeabedSettings,
    ) -> ProcessingResult<Array2<bool>>;

    fn shoal(
        &self,
        channel: ChannelView<'_>,
        method: ShoalMethod,
        parameters: &ShoalParameters,
    ) -> ProcessingResult<Array2<bool>>;

    /// Evaluates one `Sv[A] - Sv[B] op threshold` expression over the volume.
    fn frequency_difference(
        &self,
        volume: &AcousticVolume,
        expression: &FreqDiffExpression,
    ) -> ProcessingResult<Array2<bool>>;

    fn remove_background_noise(
        &self,
        volume: &AcousticVolume,
        parameters: &ResolvedBackgroundNoise,
    ) -> ProcessingResult<BackgroundNoiseEstimate>;
}

/// Output of background-noise removal.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundNoiseEstimate {
    pub sv_corrected: Array3<f64>,
    pub sv_noise: Array3<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NascValue {
    pub channel: String,
    pub frequency_nominal: f64,
    pub nasc: f64,
}

/// One NASC value per channel for a single depth × distance bin.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NascDataset {
    pub values: Vec<NascValue>,
}

impl NascDataset {
    pub fn for_channel(&self, channel: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|value| value.channel == channel)
            .map(|value| value.nasc)
    }
}

pub trait NascKernel: Send + Sync {
    /// Integrates Sv into bins of `range_bin_m` metres by `dist_bin_nmi`
    /// nautical miles.
    fn compute_nasc(
        &self,
        volume: &AcousticVolume,
        range_bin_m: f64,
        dist_bin_nmi: f64,
    ) -> ProcessingResult<NascDataset>;
}
