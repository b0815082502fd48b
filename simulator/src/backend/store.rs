//! Self-describing YAML snapshots standing in for NetCDF and Zarr. A `.nc`
//! target is a single file; a `.zarr` target is a directory holding
//! `volume.yaml`, so both keep the on-disk shape the pipeline expects.

use hydrocore::io::processed::{StoreFormat, VolumeStore};
use hydrocore::{AcousticVolume, ProcessingError, ProcessingResult};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

const ZARR_ENTRY: &str = "volume.yaml";

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotStore;

fn encoding_error(err: serde_yaml::Error) -> ProcessingError {
    ProcessingError::Io(io::Error::new(io::ErrorKind::InvalidData, err))
}

fn entry_path(path: &Path, format: StoreFormat) -> PathBuf {
    match format {
        StoreFormat::Nc => path.to_path_buf(),
        StoreFormat::Zarr => path.join(ZARR_ENTRY),
    }
}

impl VolumeStore for SnapshotStore {
    fn load(&self, path: &Path, format: StoreFormat) -> ProcessingResult<AcousticVolume> {
        let reader = BufReader::new(File::open(entry_path(path, format))?);
        serde_yaml::from_reader(reader).map_err(encoding_error)
    }

    fn save(&self, volume: &AcousticVolume, path: &Path, format: StoreFormat) -> ProcessingResult<()> {
        if format == StoreFormat::Zarr {
            fs::create_dir_all(path)?;
        }
        let writer = BufWriter::new(File::create(entry_path(path, format))?);
        serde_yaml::to_writer(writer, volume).map_err(encoding_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{generate_survey, SurveyProfile};
    use hydrocore::io::processed::{read_processed, write_processed, WriteOptions};

    fn small_survey() -> AcousticVolume {
        let profile = SurveyProfile {
            pings: 6,
            samples: 8,
            seabed_sample: 6,
            shoals: Vec::new(),
            ..Default::default()
        };
        generate_survey(&profile, Path::new("JR161-D20230509-T100645.raw"))
            .unwrap()
            .volume
    }

    #[test]
    fn zarr_snapshot_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let volume = small_survey();
        let options = WriteOptions {
            format: StoreFormat::Zarr,
            ..Default::default()
        };
        let written = write_processed(&SnapshotStore, &volume, dir.path(), &options)
            .unwrap()
            .unwrap();
        assert!(written.is_dir());
        assert!(written.join(ZARR_ENTRY).is_file());

        let loaded = read_processed(&SnapshotStore, &written).unwrap();
        assert_eq!(loaded, volume);
    }

    #[test]
    fn missing_values_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut volume = small_survey();
        let mut sv = volume.sv().unwrap().to_owned();
        sv[[0, 0, 0]] = f64::NAN;
        volume
            .insert_variable("Sv", hydrocore::volume::Variable::grid(sv))
            .unwrap();
        let written = write_processed(&SnapshotStore, &volume, dir.path(), &WriteOptions::default())
            .unwrap()
            .unwrap();
        let loaded = read_processed(&SnapshotStore, &written).unwrap();
        assert!(loaded.sv().unwrap()[[0, 0, 0]].is_nan());
        assert_eq!(loaded.grid_shape(), volume.grid_shape());
    }

    #[test]
    fn garbage_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.nc");
        fs::write(&path, b"- not: [a volume").unwrap();
        assert!(matches!(
            read_processed(&SnapshotStore, &path),
            Err(ProcessingError::Io(_))
        ));
    }
}
