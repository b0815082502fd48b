//! Opening survey files and calibrating them into Sv/TS volumes through a
//! [`SonarBackend`], with the emptiness checks the pipeline relies on.

use crate::io::integrity::{file_integrity_checking, FileIntegrity, SonarModel};
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::telemetry::StageLogger;
use crate::toolkit::{CalibrationOptions, EncodeMode, SonarBackend, WaveformMode};
use crate::volume::AcousticVolume;
use std::path::Path;

fn ensure_not_empty(volume: AcousticVolume, what: &str) -> ProcessingResult<AcousticVolume> {
    if volume.size() == 0 {
        return Err(ProcessingError::integrity(format!("computed {} is empty", what)));
    }
    Ok(volume)
}

pub fn compute_sv<B: SonarBackend>(
    backend: &B,
    handle: &B::Handle,
    options: &CalibrationOptions,
) -> ProcessingResult<AcousticVolume> {
    ensure_not_empty(backend.compute_sv(handle, options)?, "Sv")
}

pub fn compute_ts<B: SonarBackend>(
    backend: &B,
    handle: &B::Handle,
    options: &CalibrationOptions,
) -> ProcessingResult<AcousticVolume> {
    ensure_not_empty(backend.compute_ts(handle, options)?, "TS")
}

/// Complex recordings are calibrated from their CW power samples.
pub fn compute_sv_with_encode_mode<B: SonarBackend>(
    backend: &B,
    handle: &B::Handle,
    encode_mode: EncodeMode,
) -> ProcessingResult<AcousticVolume> {
    let options = match encode_mode {
        EncodeMode::Power => CalibrationOptions::default(),
        EncodeMode::Complex => CalibrationOptions {
            waveform_mode: WaveformMode::Cw,
            encode_mode: EncodeMode::Power,
        },
    };
    compute_sv(backend, handle, &options)
}

/// Result of [`read_file`]: either an opened file or the integrity report
/// that stopped it.
#[derive(Debug)]
pub enum ReadOutcome<H> {
    Opened {
        handle: H,
        integrity: FileIntegrity,
        encode_mode: EncodeMode,
    },
    Rejected(FileIntegrity),
}

/// Checks the file name, then opens raw files with the decoder and
/// `.nc`/`.zarr` files as already-converted data.
pub fn read_file<B: SonarBackend>(
    backend: &B,
    path: &Path,
    sonar_model: SonarModel,
    use_swap: bool,
) -> ProcessingResult<ReadOutcome<B::Handle>> {
    let logger = StageLogger::new("read");
    let integrity = file_integrity_checking(path, Some(sonar_model), use_swap)?;
    if !integrity.file_integrity {
        logger.warn(&format!("{} is not usable", path.display()));
        return Ok(ReadOutcome::Rejected(integrity));
    }

    let handle = if integrity.use_swap.is_some() {
        backend.open_raw(path, sonar_model)?
    } else {
        backend.open_converted(path)?
    };
    logger.detail(&format!("opened {} as {}", path.display(), sonar_model));
    Ok(ReadOutcome::Opened {
        handle,
        integrity,
        encode_mode: EncodeMode::for_model(sonar_model),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, VolumeBuilder};

    #[test]
    fn empty_sv_is_rejected() {
        let backend = ScriptedBackend::default();
        let empty = VolumeBuilder::new(1, 0, 0).build();
        let err = compute_sv(&backend, &empty, &CalibrationOptions::default()).unwrap_err();
        assert!(matches!(err, ProcessingError::DataIntegrity(_)));
        assert!(compute_ts(&backend, &empty, &CalibrationOptions::default()).is_err());
    }

    #[test]
    fn non_empty_sv_passes_through() {
        let backend = ScriptedBackend::default();
        let volume = VolumeBuilder::new(1, 2, 3).build();
        let sv = compute_sv_with_encode_mode(&backend, &volume, EncodeMode::Complex).unwrap();
        assert_eq!(sv.grid_shape(), (1, 2, 3));
    }

    #[test]
    fn unusable_file_names_are_rejected_without_opening() {
        let backend = ScriptedBackend::default();
        let outcome = read_file(&backend, Path::new("/data/nodate.raw"), SonarModel::Ek60, false)
            .unwrap();
        assert!(matches!(outcome, ReadOutcome::Rejected(ref report) if !report.file_integrity));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn raw_files_are_decoded_with_the_model_encode_mode() {
        let backend = ScriptedBackend::default();
        let outcome = read_file(
            &backend,
            Path::new("/data/JR161-D20230509-T100645.raw"),
            SonarModel::Ek80,
            false,
        )
        .unwrap();
        match outcome {
            ReadOutcome::Opened { encode_mode, .. } => assert_eq!(encode_mode, EncodeMode::Complex),
            ReadOutcome::Rejected(_) => panic!("file should open"),
        }
        assert_eq!(backend.calls(), vec!["open_raw".to_string()]);
    }
}
