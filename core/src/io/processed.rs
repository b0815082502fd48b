//! Reading and writing calibrated volumes. Encoding is delegated to a
//! [`VolumeStore`]; this layer owns format validation, directories, default
//! names and overwrite policy.

use crate::prelude::{ProcessingError, ProcessingResult};
use crate::volume::AcousticVolume;
use log::info;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    #[default]
    Nc,
    Zarr,
}

impl StoreFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            StoreFormat::Nc => "nc",
            StoreFormat::Zarr => "zarr",
        }
    }

    pub fn from_path(path: &Path) -> ProcessingResult<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        extension.parse()
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for StoreFormat {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim_start_matches('.') {
            "nc" => Ok(StoreFormat::Nc),
            "zarr" => Ok(StoreFormat::Zarr),
            other => Err(ProcessingError::config(format!(
                "unsupported file format '{}', expected nc or zarr",
                other
            ))),
        }
    }
}

/// Encoder/decoder for one on-disk layout.
pub trait VolumeStore {
    fn load(&self, path: &Path, format: StoreFormat) -> ProcessingResult<AcousticVolume>;
    fn save(&self, volume: &AcousticVolume, path: &Path, format: StoreFormat) -> ProcessingResult<()>;
}

pub fn read_processed(store: &dyn VolumeStore, path: &Path) -> ProcessingResult<AcousticVolume> {
    if !path.exists() {
        return Err(ProcessingError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("file does not exist: {}", path.display()),
        )));
    }
    let format = StoreFormat::from_path(path)?;
    store.load(path, format)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Defaults to the stem of the volume's source file.
    pub file_name: Option<String>,
    pub format: StoreFormat,
    pub overwrite: bool,
}

/// Target path for `volume` under `dir`. A name with an extension must use a
/// supported one; a bare name gets `options.format`'s.
pub fn processed_path(volume: &AcousticVolume, dir: &Path, options: &WriteOptions) -> ProcessingResult<PathBuf> {
    let name = match options.file_name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(volume.source_stem()),
    };
    let file_name = match Path::new(name.as_ref()).extension() {
        Some(_) => {
            StoreFormat::from_path(Path::new(name.as_ref()))?;
            name.into_owned()
        }
        None => format!("{}.{}", name, options.format),
    };
    Ok(dir.join(file_name))
}

/// Writes `volume` into `dir`, creating it as needed. Returns the written
/// path, or `None` when the target exists and `overwrite` is off.
pub fn write_processed(
    store: &dyn VolumeStore,
    volume: &AcousticVolume,
    dir: &Path,
    options: &WriteOptions,
) -> ProcessingResult<Option<PathBuf>> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ProcessingError::config(format!(
                "path exists but is not a directory: {}",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir)?;
    }

    let path = processed_path(volume, dir, options)?;
    if path.exists() && !options.overwrite {
        info!("keeping existing {}", path.display());
        return Ok(None);
    }
    let format = StoreFormat::from_path(&path)?;
    store.save(volume, &path, format)?;
    Ok(Some(path))
}

/// A volume already in memory or one still on disk.
#[derive(Debug, Clone)]
pub enum VolumeSource {
    InMemory(AcousticVolume),
    Path(PathBuf),
}

impl VolumeSource {
    /// Loads from disk at most once; in-memory volumes are handed back.
    pub fn resolve(self, store: &dyn VolumeStore) -> ProcessingResult<AcousticVolume> {
        match self {
            VolumeSource::InMemory(volume) => Ok(volume),
            VolumeSource::Path(path) => read_processed(store, &path),
        }
    }
}

impl From<AcousticVolume> for VolumeSource {
    fn from(volume: AcousticVolume) -> Self {
        VolumeSource::InMemory(volume)
    }
}

impl From<PathBuf> for VolumeSource {
    fn from(path: PathBuf) -> Self {
        VolumeSource::Path(path)
    }
}
