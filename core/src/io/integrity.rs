//! Pre-flight checks on survey files, driven by the file name alone.

use crate::prelude::{ProcessingError, ProcessingResult};
use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["raw", "nc", "zarr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SonarModel {
    Ek60,
    Es70,
    Ek80,
    Ea640,
    Azfp,
    Ad2cp,
}

impl SonarModel {
    pub const ALL: [SonarModel; 6] = [
        SonarModel::Ek60,
        SonarModel::Es70,
        SonarModel::Ek80,
        SonarModel::Ea640,
        SonarModel::Azfp,
        SonarModel::Ad2cp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SonarModel::Ek60 => "EK60",
            SonarModel::Es70 => "ES70",
            SonarModel::Ek80 => "EK80",
            SonarModel::Ea640 => "EA640",
            SonarModel::Azfp => "AZFP",
            SonarModel::Ad2cp => "AD2CP",
        }
    }
}

impl fmt::Display for SonarModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SonarModel {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let upper = value.trim().to_ascii_uppercase();
        SonarModel::ALL
            .into_iter()
            .find(|model| model.as_str() == upper)
            .ok_or_else(|| ProcessingError::config(format!("unsupported sonar model '{}'", value)))
    }
}

/// Outcome of [`file_integrity_checking`]. An unparseable timestamp is
/// reported through `file_integrity`, not as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIntegrity {
    pub file_path: PathBuf,
    pub campaign_id: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub file_integrity: bool,
    pub sonar_model: Option<SonarModel>,
    /// Only set for `.raw` files.
    pub use_swap: Option<bool>,
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// First run of `len` ASCII digits directly after `marker`.
fn digits_after(name: &str, marker: char, len: usize) -> Option<&str> {
    name.match_indices(marker).find_map(|(at, _)| {
        let start = at + marker.len_utf8();
        let candidate = name.get(start..start + len)?;
        candidate
            .bytes()
            .all(|byte| byte.is_ascii_digit())
            .then_some(candidate)
    })
}

/// Start time encoded as `D%Y%m%d` and `T%H%M%S` tokens in a file name.
pub fn parse_filename_timestamp(name: &str) -> Option<NaiveDateTime> {
    let date = digits_after(name, 'D', 8)?;
    let time = digits_after(name, 'T', 6)?;
    let field = |text: &str, range: std::ops::Range<usize>| text.get(range)?.parse::<u32>().ok();
    let year = date.get(0..4)?.parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, field(date, 4..6)?, field(date, 6..8)?)?.and_hms_opt(
        field(time, 0..2)?,
        field(time, 2..4)?,
        field(time, 4..6)?,
    )
}

/// Campaign id, start time and format support for one survey file, e.g.
/// `JR161-D20230509-T100645.raw` gives campaign `JR161` and
/// 2023-05-09 10:06:45.
pub fn file_integrity_checking(
    path: &Path,
    sonar_model: Option<SonarModel>,
    use_swap: bool,
) -> ProcessingResult<FileIntegrity> {
    let extension = extension_of(path).unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ProcessingError::config(format!(
            "file type not supported for {}",
            path.display()
        )));
    }
    let file_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let campaign_id = file_name.split('-').next().map(str::to_string);
    let date = parse_filename_timestamp(&file_name);
    if date.is_none() {
        warn!("no D%Y%m%d-T%H%M%S timestamp in {}", file_name);
    }

    Ok(FileIntegrity {
        file_path,
        campaign_id,
        date,
        file_integrity: date.is_some(),
        sonar_model,
        use_swap: (extension == "raw").then_some(use_swap),
    })
}

/// Files with `extension` directly under `dir`, sorted by name.
pub fn file_finder(dir: &Path, extension: &str) -> ProcessingResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ProcessingError::config(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_zarr_store = wanted == "zarr" && path.is_dir();
        if (path.is_file() || is_zarr_store) && extension_of(&path).as_deref() == Some(wanted.as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
