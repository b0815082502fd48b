//! Mask application and the two ordering policies: a fixed cleaning order
//! for noise (Haris et al., 2021) and caller order for organism masks.

use super::registry::MaskKind;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::processing::background::{apply_remove_background_noise, BackgroundNoiseParams};
use crate::telemetry::StageLogger;
use crate::toolkit::DetectionKernels;
use crate::volume::{AcousticVolume, Dim, VarData, Variable, GRID_DIMS, SV};
use ndarray::{ArrayView2, ArrayView3, Axis, Ix2, Ix3, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyParams {
    pub var_name: String,
    pub fill_value: f64,
}

impl Default for ApplyParams {
    fn default() -> Self {
        Self {
            var_name: SV.to_string(),
            fill_value: f64::NAN,
        }
    }
}

/// Replaces every `var_name` sample where the mask is false with
/// `fill_value`. Channel-less masks are broadcast over channels.
pub fn apply_mask(
    volume: &AcousticVolume,
    mask_name: &str,
    params: &ApplyParams,
) -> ProcessingResult<AcousticVolume> {
    let mask = volume.variable(mask_name)?;
    let target = volume.grid(&params.var_name)?;
    let mut data = target.to_owned();

    match expand_mask(mask, target, mask_name)? {
        MaskLayout::Grid(keep) => {
            Zip::from(&mut data).and(&keep).for_each(|value, &keep| {
                if !keep {
                    *value = params.fill_value;
                }
            });
        }
        MaskLayout::Planar(keep) => {
            for mut channel in data.axis_iter_mut(Axis(0)) {
                Zip::from(&mut channel).and(&keep).for_each(|value, &keep| {
                    if !keep {
                        *value = params.fill_value;
                    }
                });
            }
        }
    }

    let mut out = volume.clone();
    out.replace_grid(&params.var_name, data)?;
    Ok(out)
}

enum MaskLayout<'a> {
    Grid(ArrayView3<'a, bool>),
    Planar(ArrayView2<'a, bool>),
}

/// A present mask that cannot be applied is an integrity error, never a
/// silent no-op.
fn expand_mask<'a>(
    mask: &'a Variable,
    target: ArrayView3<'_, f64>,
    mask_name: &str,
) -> ProcessingResult<MaskLayout<'a>> {
    let data = match &mask.data {
        VarData::Bool(data) => data,
        VarData::Float(_) => {
            return Err(ProcessingError::integrity(format!(
                "'{}' is not a boolean mask",
                mask_name
            )))
        }
    };
    let (_, n_ping, n_range) = target.dim();
    let malformed = || {
        ProcessingError::integrity(format!(
            "mask '{}' with dims {:?} and shape {:?} does not fit target shape {:?}",
            mask_name,
            mask.dims,
            data.shape(),
            target.shape()
        ))
    };
    if mask.dims == GRID_DIMS {
        let view = data.view().into_dimensionality::<Ix3>().map_err(|_| malformed())?;
        if view.shape() != target.shape() {
            return Err(malformed());
        }
        Ok(MaskLayout::Grid(view))
    } else if mask.dims == [Dim::PingTime, Dim::RangeSample] {
        let view = data.view().into_dimensionality::<Ix2>().map_err(|_| malformed())?;
        if view.dim() != (n_ping, n_range) {
            return Err(malformed());
        }
        Ok(MaskLayout::Planar(view))
    } else {
        Err(malformed())
    }
}

/// Noise-cleaning steps in the order they are always applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoiseProcess {
    Impulse,
    Attenuation,
    Transient,
    RemoveBackgroundNoise,
    FalseSeabed,
    Seabed,
}

impl NoiseProcess {
    pub const ORDER: [NoiseProcess; 6] = [
        NoiseProcess::Impulse,
        NoiseProcess::Attenuation,
        NoiseProcess::Transient,
        NoiseProcess::RemoveBackgroundNoise,
        NoiseProcess::FalseSeabed,
        NoiseProcess::Seabed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseProcess::Impulse => "mask_impulse",
            NoiseProcess::Attenuation => "mask_attenuation",
            NoiseProcess::Transient => "mask_transient",
            NoiseProcess::RemoveBackgroundNoise => "remove_background_noise",
            NoiseProcess::FalseSeabed => "mask_false_seabed",
            NoiseProcess::Seabed => "mask_seabed",
        }
    }
}

impl fmt::Display for NoiseProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoiseProcess {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        NoiseProcess::ORDER
            .iter()
            .copied()
            .find(|process| process.as_str() == value)
            .ok_or_else(|| {
                ProcessingError::config(format!(
                    "unexpected mask/process '{}', expected one of {:?}",
                    value,
                    NoiseProcess::ORDER.map(|process| process.as_str())
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessRequest {
    Mask(ApplyParams),
    BackgroundNoise(BackgroundNoiseParams),
}

impl From<ApplyParams> for ProcessRequest {
    fn from(params: ApplyParams) -> Self {
        ProcessRequest::Mask(params)
    }
}

impl From<BackgroundNoiseParams> for ProcessRequest {
    fn from(params: BackgroundNoiseParams) -> Self {
        ProcessRequest::BackgroundNoise(params)
    }
}

/// Applies the requested noise masks and background-noise removal in the
/// fixed cleaning order, whatever order they were requested in.
///
/// Every name is validated before the volume is touched. A requested mask
/// that was never attached is skipped; one that is attached but malformed
/// fails the run.
pub fn apply_selected_noise_masks_and_or_noise_removal(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    requests: &[(String, ProcessRequest)],
) -> ProcessingResult<AcousticVolume> {
    let logger = StageLogger::new("noise_masks");
    let mut selected: Vec<(NoiseProcess, &ProcessRequest)> = Vec::with_capacity(requests.len());
    for (name, request) in requests {
        let process: NoiseProcess = name.parse()?;
        let fits = matches!(
            (process, request),
            (NoiseProcess::RemoveBackgroundNoise, ProcessRequest::BackgroundNoise(_))
        ) || (process != NoiseProcess::RemoveBackgroundNoise
            && matches!(request, ProcessRequest::Mask(_)));
        if !fits {
            return Err(ProcessingError::config(format!(
                "'{}' was given parameters for a different kind of process",
                name
            )));
        }
        selected.push((process, request));
    }

    let mut current = volume.clone();
    for process in NoiseProcess::ORDER {
        let Some((_, request)) = selected.iter().rev().find(|(candidate, _)| *candidate == process)
        else {
            continue;
        };
        current = match request {
            ProcessRequest::BackgroundNoise(params) => {
                logger.record("removing background noise");
                apply_remove_background_noise(kernels, &current, params)?
            }
            ProcessRequest::Mask(params) => {
                if !current.contains(process.as_str()) {
                    logger.warn(&format!("'{}' is not a key in the volume", process));
                    continue;
                }
                logger.record(&format!("applying {} to {}", process, params.var_name));
                apply_mask(&current, process.as_str(), params)?
            }
        };
    }
    Ok(current)
}

const ORGANISM_KINDS: [MaskKind; 4] = [
    MaskKind::Krill,
    MaskKind::GasBearingOrganisms,
    MaskKind::FluidLikeOrganisms,
    MaskKind::Shoal,
];

/// Applies organism and shoal masks in the order given.
pub fn apply_mask_organisms_in_order(
    volume: &AcousticVolume,
    requests: &[(String, ApplyParams)],
) -> ProcessingResult<AcousticVolume> {
    for (name, _) in requests {
        let recognized = ORGANISM_KINDS
            .iter()
            .any(|kind| kind.variable_name() == *name);
        if !recognized {
            return Err(ProcessingError::config(format!(
                "unrecognized mask name '{}'",
                name
            )));
        }
    }

    let mut current = volume.clone();
    for (name, params) in requests {
        current = apply_mask(&current, name, params)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedKernels, VolumeBuilder};
    use crate::volume::{Mask, MaskMetadata};
    use ndarray::{Array2, Array3};

    fn with_mask(volume: &AcousticVolume, kind: &str, keep: Array3<bool>) -> AcousticVolume {
        let mask = Mask::multichannel(keep, MaskMetadata::new(kind));
        volume
            .with_variable(mask.variable_name(), mask.into_variable())
            .unwrap()
    }

    fn fill(value: f64) -> ProcessRequest {
        ProcessRequest::Mask(ApplyParams {
            fill_value: value,
            ..Default::default()
        })
    }

    #[test]
    fn all_true_mask_is_a_no_op() {
        let volume = VolumeBuilder::new(2, 3, 4).build();
        let volume = with_mask(&volume, "impulse", Array3::from_elem((2, 3, 4), true));
        let out = apply_mask(&volume, "mask_impulse", &ApplyParams::default()).unwrap();
        assert_eq!(out.sv().unwrap(), volume.sv().unwrap());
    }

    #[test]
    fn all_false_mask_blanks_every_sample() {
        let volume = VolumeBuilder::new(2, 3, 4).build();
        let volume = with_mask(&volume, "impulse", Array3::from_elem((2, 3, 4), false));
        let out = apply_mask(&volume, "mask_impulse", &ApplyParams::default()).unwrap();
        assert!(out.sv().unwrap().iter().all(|value| value.is_nan()));
    }

    #[test]
    fn planar_masks_broadcast_over_channels() {
        let volume = VolumeBuilder::new(2, 2, 2).build();
        let mut keep = Array2::from_elem((2, 2), true);
        keep[[1, 0]] = false;
        let mask = Mask::planar(keep, MaskMetadata::new("krill"));
        let volume = volume
            .with_variable(mask.variable_name(), mask.into_variable())
            .unwrap();
        let out = apply_mask(&volume, "mask_krill", &ApplyParams::default()).unwrap();
        let sv = out.sv().unwrap();
        assert!(sv[[0, 1, 0]].is_nan());
        assert!(sv[[1, 1, 0]].is_nan());
        assert_eq!(sv.iter().filter(|value| value.is_nan()).count(), 2);
    }

    #[test]
    fn float_variable_is_not_a_valid_mask() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        let volume = volume
            .with_variable("mask_seabed", Variable::grid(Array3::zeros((1, 2, 2))))
            .unwrap();
        assert!(matches!(
            apply_mask(&volume, "mask_seabed", &ApplyParams::default()),
            Err(ProcessingError::DataIntegrity(_))
        ));
    }

    #[test]
    fn noise_masks_run_in_fixed_order_regardless_of_request_order() {
        let volume = VolumeBuilder::new(1, 1, 1).build();
        let volume = with_mask(&volume, "impulse", Array3::from_elem((1, 1, 1), false));
        let volume = with_mask(&volume, "seabed", Array3::from_elem((1, 1, 1), false));

        // seabed listed first, but impulse must still run first
        let requests = vec![
            ("mask_seabed".to_string(), fill(-999.0)),
            ("mask_impulse".to_string(), fill(-111.0)),
        ];
        let kernels = ScriptedKernels::default();
        let ordered =
            apply_selected_noise_masks_and_or_noise_removal(&kernels, &volume, &requests).unwrap();
        assert_eq!(ordered.sv().unwrap()[[0, 0, 0]], -999.0);

        let seabed_first = apply_mask(
            &volume,
            "mask_seabed",
            &ApplyParams {
                fill_value: -999.0,
                ..Default::default()
            },
        )
        .unwrap();
        let manual = apply_mask(
            &seabed_first,
            "mask_impulse",
            &ApplyParams {
                fill_value: -111.0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_ne!(ordered.sv().unwrap(), manual.sv().unwrap());
    }

    #[test]
    fn unknown_process_fails_before_touching_the_volume() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        let volume = with_mask(&volume, "impulse", Array3::from_elem((1, 2, 2), false));
        let snapshot = volume.clone();
        let requests = vec![
            ("mask_impulse".to_string(), fill(f64::NAN)),
            ("mask_seabed_echo".to_string(), fill(f64::NAN)),
        ];
        let kernels = ScriptedKernels::default();
        let err = apply_selected_noise_masks_and_or_noise_removal(&kernels, &volume, &requests)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Configuration(_)));
        assert_eq!(volume, snapshot);
    }

    #[test]
    fn missing_masks_are_skipped() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        let requests = vec![("mask_transient".to_string(), fill(f64::NAN))];
        let kernels = ScriptedKernels::default();
        let out =
            apply_selected_noise_masks_and_or_noise_removal(&kernels, &volume, &requests).unwrap();
        assert_eq!(out.sv().unwrap(), volume.sv().unwrap());
    }

    #[test]
    fn background_noise_runs_between_transient_and_false_seabed() {
        let volume = VolumeBuilder::new(1, 3, 4).with_echo_range(1.0).build();
        let requests = vec![(
            "remove_background_noise".to_string(),
            ProcessRequest::BackgroundNoise(BackgroundNoiseParams::default()),
        )];
        let kernels = ScriptedKernels::default();
        let out =
            apply_selected_noise_masks_and_or_noise_removal(&kernels, &volume, &requests).unwrap();
        assert!(out.contains("Sv_corrected"));
    }

    #[test]
    fn mismatched_request_kind_is_rejected() {
        let volume = VolumeBuilder::new(1, 2, 2).build();
        let requests = vec![("remove_background_noise".to_string(), fill(f64::NAN))];
        let kernels = ScriptedKernels::default();
        assert!(apply_selected_noise_masks_and_or_noise_removal(&kernels, &volume, &requests)
            .is_err());
    }

    #[test]
    fn organism_masks_follow_caller_order() {
        let volume = VolumeBuilder::new(1, 1, 1).build();
        let volume = with_mask(&volume, "krill", Array3::from_elem((1, 1, 1), false));
        let volume = with_mask(&volume, "shoal", Array3::from_elem((1, 1, 1), false));
        let params = |fill_value| ApplyParams {
            fill_value,
            ..Default::default()
        };
        let krill_last = apply_mask_organisms_in_order(
            &volume,
            &[
                ("mask_shoal".to_string(), params(1.0)),
                ("mask_krill".to_string(), params(2.0)),
            ],
        )
        .unwrap();
        assert_eq!(krill_last.sv().unwrap()[[0, 0, 0]], 2.0);

        let err = apply_mask_organisms_in_order(&volume, &[("mask_fish".to_string(), params(1.0))])
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Configuration(_)));
    }
}
