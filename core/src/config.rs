//! Pipeline configuration. Every section deserializes with `#[serde(default)]`
//! so a YAML file only needs the keys it changes; the defaults are the
//! standard survey presets.

use crate::masks::apply::{ApplyParams, NoiseProcess, ProcessRequest};
use crate::masks::freqdiff::OrganismClass;
use crate::masks::params::{
    AttenuationMethod, AttenuationParameters, FalseSeabedParameters, ImpulseMethod,
    ImpulseParameters, SeabedMethod, SeabedParameters, ShoalMethod, ShoalParameters,
    TransientMethod, TransientParameters,
};
use crate::masks::registry::{MaskKind, MaskRequest, NoiseRequest};
use crate::nasc::NascVariant;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::processing::background::BackgroundNoiseParams;
use crate::volume::AcousticVolume;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig<M, P> {
    pub enabled: bool,
    pub method: M,
    pub parameters: P,
}

impl<M: Default, P: Default> Default for MaskConfig<M, P> {
    fn default() -> Self {
        Self {
            enabled: true,
            method: M::default(),
            parameters: P::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundNoiseConfig {
    pub enabled: bool,
    pub parameters: BackgroundNoiseParams,
}

impl Default for BackgroundNoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parameters: BackgroundNoiseParams::default(),
        }
    }
}

/// Frequency-differencing classes to tag. Channels default to the ones whose
/// nominal frequency is 38 kHz and 120 kHz.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganismConfig {
    pub enabled: bool,
    pub chan38: Option<String>,
    pub chan120: Option<String>,
    pub classes: Vec<OrganismClass>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NascConfig {
    pub enabled: bool,
    pub variants: Vec<NascVariant>,
}

impl Default for NascConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            variants: vec![NascVariant::default()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    pub transient: MaskConfig<TransientMethod, TransientParameters>,
    pub impulse: MaskConfig<ImpulseMethod, ImpulseParameters>,
    pub attenuation: MaskConfig<AttenuationMethod, AttenuationParameters>,
    pub seabed: MaskConfig<SeabedMethod, SeabedParameters>,
    pub false_seabed: MaskConfig<SeabedMethod, FalseSeabedParameters>,
    pub remove_background_noise: BackgroundNoiseConfig,
    pub shoals: MaskConfig<ShoalMethod, ShoalParameters>,
    pub organisms: OrganismConfig,
    pub nasc: NascConfig,
    pub apply: ApplyParams,
    pub profile: bool,
    pub export_csv: bool,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            transient: MaskConfig::default(),
            impulse: MaskConfig::default(),
            attenuation: MaskConfig::default(),
            seabed: MaskConfig {
                enabled: true,
                method: SeabedMethod::Ariza,
                parameters: SeabedParameters::default(),
            },
            false_seabed: MaskConfig {
                enabled: true,
                method: SeabedMethod::Blackwell,
                parameters: FalseSeabedParameters::default(),
            },
            remove_background_noise: BackgroundNoiseConfig::default(),
            shoals: MaskConfig::default(),
            organisms: OrganismConfig::default(),
            nasc: NascConfig::default(),
            apply: ApplyParams::default(),
            profile: false,
            export_csv: false,
        }
    }
}

impl DenoiseConfig {
    /// Creation requests for every enabled noise mask, in declaration order.
    pub fn enabled_noise_requests(&self) -> Vec<NoiseRequest> {
        let mut requests = Vec::new();
        if self.transient.enabled {
            requests.push(NoiseRequest::Transient {
                method: self.transient.method,
                parameters: self.transient.parameters.clone(),
            });
        }
        if self.impulse.enabled {
            requests.push(NoiseRequest::Impulse {
                method: self.impulse.method,
                parameters: self.impulse.parameters.clone(),
            });
        }
        if self.attenuation.enabled {
            requests.push(NoiseRequest::Attenuation {
                method: self.attenuation.method,
                parameters: self.attenuation.parameters.clone(),
            });
        }
        if self.seabed.enabled {
            requests.push(NoiseRequest::Seabed {
                method: self.seabed.method,
                parameters: self.seabed.parameters.clone(),
            });
        }
        if self.false_seabed.enabled {
            requests.push(NoiseRequest::FalseSeabed {
                method: self.false_seabed.method,
                parameters: self.false_seabed.parameters.clone(),
            });
        }
        requests
    }

    /// Application requests for the noise pipeline: one per enabled mask
    /// kind plus background-noise removal when enabled.
    pub fn noise_process_requests(&self) -> Vec<(String, ProcessRequest)> {
        let mut requests: Vec<(String, ProcessRequest)> = self
            .enabled_noise_requests()
            .iter()
            .map(|request| {
                (
                    request.kind().variable_name(),
                    ProcessRequest::Mask(self.apply.clone()),
                )
            })
            .collect();
        if self.remove_background_noise.enabled {
            requests.push((
                NoiseProcess::RemoveBackgroundNoise.as_str().to_string(),
                ProcessRequest::BackgroundNoise(self.remove_background_noise.parameters.clone()),
            ));
        }
        requests
    }

    pub fn shoal_request(&self) -> MaskRequest {
        MaskRequest::Shoal {
            method: self.shoals.method,
            parameters: self.shoals.parameters.clone(),
        }
    }

    /// Channel names for frequency differencing: the configured ones, or
    /// the channels whose nominal frequency is 38 kHz and 120 kHz.
    pub fn organism_channels(&self, volume: &AcousticVolume) -> ProcessingResult<(String, String)> {
        let pick = |configured: &Option<String>, frequency: f64| -> ProcessingResult<String> {
            if let Some(name) = configured {
                volume.channel_index(name)?;
                return Ok(name.clone());
            }
            volume
                .channels()
                .iter()
                .zip(volume.frequency_nominal())
                .find(|(_, nominal)| (**nominal - frequency).abs() < 0.5)
                .map(|(name, _)| name.clone())
                .ok_or_else(|| {
                    ProcessingError::config(format!("no {} Hz channel for frequency differencing", frequency))
                })
        };
        Ok((
            pick(&self.organisms.chan38, 38_000.0)?,
            pick(&self.organisms.chan120, 120_000.0)?,
        ))
    }

    /// One request per configured organism class; empty when disabled.
    pub fn organism_requests(&self, volume: &AcousticVolume) -> ProcessingResult<Vec<MaskRequest>> {
        if !self.organisms.enabled || self.organisms.classes.is_empty() {
            return Ok(Vec::new());
        }
        let (chan38, chan120) = self.organism_channels(volume)?;
        Ok(self
            .organisms
            .classes
            .iter()
            .map(|class| MaskRequest::Organism {
                class: *class,
                chan38: chan38.clone(),
                chan120: chan120.clone(),
            })
            .collect())
    }

    /// The configured request for `kind`, enabled or not.
    pub fn preset(&self, kind: MaskKind) -> ProcessingResult<MaskRequest> {
        if kind == MaskKind::Shoal {
            return Ok(self.shoal_request());
        }
        if let Some(request) = self.noise_preset(kind) {
            return Ok(MaskRequest::Noise(request));
        }
        let chan38 = self.organisms.chan38.clone();
        let chan120 = self.organisms.chan120.clone();
        match (chan38, chan120) {
            (Some(chan38), Some(chan120)) => {
                let class = match kind {
                    MaskKind::Krill => OrganismClass::Krill,
                    MaskKind::GasBearingOrganisms => OrganismClass::GasBearingOrganisms,
                    _ => OrganismClass::FluidLikeOrganisms,
                };
                Ok(MaskRequest::Organism {
                    class,
                    chan38,
                    chan120,
                })
            }
            _ => Err(ProcessingError::config(format!(
                "{} needs organisms.chan38 and organisms.chan120",
                kind
            ))),
        }
    }

    fn noise_preset(&self, kind: MaskKind) -> Option<NoiseRequest> {
        let request = match kind {
            MaskKind::Transient => NoiseRequest::Transient {
                method: self.transient.method,
                parameters: self.transient.parameters.clone(),
            },
            MaskKind::Impulse => NoiseRequest::Impulse {
                method: self.impulse.method,
                parameters: self.impulse.parameters.clone(),
            },
            MaskKind::Attenuation => NoiseRequest::Attenuation {
                method: self.attenuation.method,
                parameters: self.attenuation.parameters.clone(),
            },
            MaskKind::Seabed => NoiseRequest::Seabed {
                method: self.seabed.method,
                parameters: self.seabed.parameters.clone(),
            },
            MaskKind::FalseSeabed => NoiseRequest::FalseSeabed {
                method: self.false_seabed.method,
                parameters: self.false_seabed.parameters.clone(),
            },
            _ => return None,
        };
        Some(request)
    }
}
