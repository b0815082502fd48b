//! Mask kinds, typed creation requests, and the factory that dispatches a
//! request to its detection kernel and stamps provenance on the result.

use super::freqdiff::{find_mask_freq_diff, OrganismClass};
use super::params::{
    formatted_parameters, AttenuationMethod, AttenuationParameters, FalseSeabedParameters,
    ImpulseMethod, ImpulseParameters, SeabedMethod, SeabedParameters, SeabedSettings, ShoalMethod,
    ShoalParameters, TransientMethod, TransientParameters,
};
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::toolkit::DetectionKernels;
use crate::volume::{AcousticVolume, ChannelView, Mask, MaskMetadata};
use log::debug;
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    Transient,
    Impulse,
    Attenuation,
    Seabed,
    FalseSeabed,
    Shoal,
    Krill,
    GasBearingOrganisms,
    FluidLikeOrganisms,
}

impl MaskKind {
    pub const ALL: [MaskKind; 9] = [
        MaskKind::Transient,
        MaskKind::Impulse,
        MaskKind::Attenuation,
        MaskKind::Seabed,
        MaskKind::FalseSeabed,
        MaskKind::Shoal,
        MaskKind::Krill,
        MaskKind::GasBearingOrganisms,
        MaskKind::FluidLikeOrganisms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaskKind::Transient => "transient",
            MaskKind::Impulse => "impulse",
            MaskKind::Attenuation => "attenuation",
            MaskKind::Seabed => "seabed",
            MaskKind::FalseSeabed => "false_seabed",
            MaskKind::Shoal => "shoal",
            MaskKind::Krill => "krill",
            MaskKind::GasBearingOrganisms => "gas_bearing_organisms",
            MaskKind::FluidLikeOrganisms => "fluid_like_organisms",
        }
    }

    pub fn variable_name(&self) -> String {
        format!("mask_{}", self.as_str())
    }
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaskKind {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MaskKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ProcessingError::config(format!("unrecognized mask kind '{}'", value)))
    }
}

/// A request to build one noise mask.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseRequest {
    Transient {
        method: TransientMethod,
        parameters: TransientParameters,
    },
    Impulse {
        method: ImpulseMethod,
        parameters: ImpulseParameters,
    },
    Attenuation {
        method: AttenuationMethod,
        parameters: AttenuationParameters,
    },
    Seabed {
        method: SeabedMethod,
        parameters: SeabedParameters,
    },
    FalseSeabed {
        method: SeabedMethod,
        parameters: FalseSeabedParameters,
    },
}

impl NoiseRequest {
    pub fn kind(&self) -> MaskKind {
        match self {
            NoiseRequest::Transient { .. } => MaskKind::Transient,
            NoiseRequest::Impulse { .. } => MaskKind::Impulse,
            NoiseRequest::Attenuation { .. } => MaskKind::Attenuation,
            NoiseRequest::Seabed { .. } => MaskKind::Seabed,
            NoiseRequest::FalseSeabed { .. } => MaskKind::FalseSeabed,
        }
    }

    fn metadata(&self) -> ProcessingResult<MaskMetadata> {
        let (method, parameters) = match self {
            NoiseRequest::Transient { method, parameters } => {
                (method.as_str(), formatted_parameters(parameters)?)
            }
            NoiseRequest::Impulse { method, parameters } => {
                (method.as_str(), formatted_parameters(parameters)?)
            }
            NoiseRequest::Attenuation { method, parameters } => {
                (method.as_str(), formatted_parameters(parameters)?)
            }
            NoiseRequest::Seabed { method, parameters } => {
                (method.as_str(), formatted_parameters(parameters)?)
            }
            NoiseRequest::FalseSeabed { method, parameters } => {
                (method.as_str(), formatted_parameters(parameters)?)
            }
        };
        Ok(MaskMetadata::new(self.kind().as_str())
            .with_method(method)
            .with_parameters(parameters))
    }

    fn detect(
        &self,
        kernels: &dyn DetectionKernels,
        channel: ChannelView<'_>,
    ) -> ProcessingResult<Array2<bool>> {
        match self {
            NoiseRequest::Transient { method, parameters } => {
                kernels.transient(channel, *method, parameters)
            }
            NoiseRequest::Impulse { method, parameters } => {
                kernels.impulse(channel, *method, parameters)
            }
            NoiseRequest::Attenuation { method, parameters } => {
                kernels.attenuation(channel, *method, parameters)
            }
            NoiseRequest::Seabed { method, parameters } => {
                kernels.seabed(channel, *method, &SeabedSettings::Bottom(parameters.clone()))
            }
            NoiseRequest::FalseSeabed { method, parameters } => {
                kernels.seabed(channel, *method, &SeabedSettings::Echo(parameters.clone()))
            }
        }
    }
}

/// Any mask the registry can build.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskRequest {
    Noise(NoiseRequest),
    Shoal {
        method: ShoalMethod,
        parameters: ShoalParameters,
    },
    Organism {
        class: OrganismClass,
        chan38: String,
        chan120: String,
    },
}

impl MaskRequest {
    pub fn kind(&self) -> MaskKind {
        match self {
            MaskRequest::Noise(request) => request.kind(),
            MaskRequest::Shoal { .. } => MaskKind::Shoal,
            MaskRequest::Organism { class, .. } => class.kind(),
        }
    }
}

impl From<NoiseRequest> for MaskRequest {
    fn from(request: NoiseRequest) -> Self {
        MaskRequest::Noise(request)
    }
}

/// Runs a per-channel kernel over every channel and stacks the results.
fn stack_channels<F>(volume: &AcousticVolume, mut detect: F) -> ProcessingResult<Array3<bool>>
where
    F: FnMut(ChannelView<'_>) -> ProcessingResult<Array2<bool>>,
{
    let (n_channel, n_ping, n_range) = volume.grid_shape();
    let mut stacked = Array3::from_elem((n_channel, n_ping, n_range), false);
    for index in 0..n_channel {
        let view = volume.channel_view(index)?;
        let name = view.name.to_string();
        let layer = detect(view)?;
        if layer.dim() != (n_ping, n_range) {
            return Err(ProcessingError::Kernel(format!(
                "kernel returned shape {:?} for channel {}, expected {:?}",
                layer.dim(),
                name,
                (n_ping, n_range)
            )));
        }
        stacked.index_axis_mut(Axis(0), index).assign(&layer);
    }
    Ok(stacked)
}

/// Builds a mask for `request`. The source volume is only read.
pub fn create_mask(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    request: &MaskRequest,
) -> ProcessingResult<Mask> {
    debug!("creating {} mask", request.kind());
    match request {
        MaskRequest::Noise(noise) => {
            let data = stack_channels(volume, |channel| noise.detect(kernels, channel))?;
            Ok(Mask::multichannel(data, noise.metadata()?))
        }
        MaskRequest::Shoal { method, parameters } => {
            let data = stack_channels(volume, |channel| {
                kernels.shoal(channel, *method, parameters)
            })?;
            let metadata = MaskMetadata::new(MaskKind::Shoal.as_str())
                .with_method(method.as_str())
                .with_parameters(formatted_parameters(parameters)?);
            Ok(Mask::multichannel(data, metadata))
        }
        MaskRequest::Organism {
            class,
            chan38,
            chan120,
        } => {
            let (chan_a, chan_b, criterion) = class.rule(chan38, chan120);
            find_mask_freq_diff(
                kernels,
                volume,
                chan_a,
                chan_b,
                &criterion,
                class.kind().as_str(),
            )
        }
    }
}

/// Builds a mask for a kind given by name, rejecting unknown names before
/// any kernel runs.
pub fn create_mask_by_name(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    kind: &str,
    presets: &dyn Fn(MaskKind) -> ProcessingResult<MaskRequest>,
) -> ProcessingResult<Mask> {
    let kind: MaskKind = kind.parse()?;
    let request = presets(kind)?;
    create_mask(kernels, volume, &request)
}
