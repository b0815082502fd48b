use crate::telemetry::StageLogger;
use crate::toolkit::{DepthOptions, LocationOptions, SonarBackend, SplitBeamOptions};
use crate::volume::AcousticVolume;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichOptions {
    pub depth: DepthOptions,
    pub location: LocationOptions,
    pub splitbeam: SplitBeamOptions,
}

/// Adds depth, location and split-beam angles in that order. A failing step
/// is skipped with a warning; the warnings come back with the volume.
pub fn enrich_sv_dataset<B: SonarBackend>(
    backend: &B,
    volume: &AcousticVolume,
    handle: &B::Handle,
    options: &EnrichOptions,
) -> (AcousticVolume, Vec<String>) {
    let logger = StageLogger::new("enrich");
    let mut warnings = Vec::new();
    let mut current = volume.clone();

    match backend.add_depth(&current, &options.depth) {
        Ok(next) => current = next,
        Err(err) => warnings.push(format!("failed to add depth: {}", err)),
    }
    match backend.add_location(&current, handle, &options.location) {
        Ok(next) => current = next,
        Err(err) => warnings.push(format!("failed to add location: {}", err)),
    }
    match backend.add_splitbeam_angle(&current, handle, &options.splitbeam) {
        Ok(next) => current = next,
        Err(err) => warnings.push(format!("failed to add split-beam angle: {}", err)),
    }

    for warning in &warnings {
        logger.warn(warning);
    }
    (current, warnings)
}
