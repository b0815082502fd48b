use crate::generator::profile::SurveyProfile;
use anyhow::{anyhow, Context};
use hydrocore::enrich::EnrichOptions;
use hydrocore::io::integrity::SonarModel;
use hydrocore::io::processed::{StoreFormat, WriteOptions};
use hydrocore::masks::CreationOptions;
use hydrocore::processing::continuity::DEFAULT_WINDOW_LEN;
use hydrocore::processing::{InterpolationMethod, MvbsOptions};
use hydrocore::shoals::LabelOptions;
use hydrocore::DenoiseConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreationSettings {
    /// Defaults to the available parallelism.
    pub max_workers: Option<usize>,
    pub timeout_secs: Option<f64>,
}

impl Default for CreationSettings {
    fn default() -> Self {
        Self {
            max_workers: None,
            timeout_secs: Some(300.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationSettings {
    pub enabled: bool,
    pub method: InterpolationMethod,
    pub with_edge_fill: bool,
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            method: InterpolationMethod::Linear,
            with_edge_fill: false,
        }
    }
}

/// Everything one batch run needs. Loaded once, layered with the command
/// line, then only read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub raw_path: Option<PathBuf>,
    pub sonar_model: SonarModel,
    pub output_folder: PathBuf,
    pub use_swap: bool,
    pub time_window: usize,
    #[serde(flatten)]
    pub denoise: DenoiseConfig,
    pub creation: CreationSettings,
    pub interpolation: InterpolationSettings,
    pub regrid: bool,
    /// Also save a binned MVBS volume when set.
    pub mvbs: Option<MvbsOptions>,
    pub labeling: LabelOptions,
    pub enrich: EnrichOptions,
    pub store_format: StoreFormat,
    pub overwrite: bool,
    pub survey: SurveyProfile,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            raw_path: None,
            sonar_model: SonarModel::Ek60,
            output_folder: PathBuf::from("output"),
            use_swap: false,
            time_window: DEFAULT_WINDOW_LEN,
            denoise: DenoiseConfig::default(),
            creation: CreationSettings::default(),
            interpolation: InterpolationSettings::default(),
            regrid: false,
            mvbs: None,
            labeling: LabelOptions::default(),
            enrich: EnrichOptions::default(),
            store_format: StoreFormat::Zarr,
            overwrite: true,
            survey: SurveyProfile::default(),
        }
    }
}

/// Command-line values that take precedence over the YAML file.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub raw_path: Option<PathBuf>,
    pub sonar_model: Option<SonarModel>,
    pub output_folder: Option<PathBuf>,
    pub export_csv: bool,
    pub profile: bool,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// The YAML file (or the defaults) with `overrides` on top. Flags only
    /// ever switch features on.
    pub fn resolve(file: Option<&Path>, overrides: CliOverrides) -> anyhow::Result<Self> {
        let base = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(overrides);
        config.raw_path()?;
        Ok(config)
    }

    fn with_overrides(self, overrides: CliOverrides) -> Self {
        let denoise = DenoiseConfig {
            export_csv: self.denoise.export_csv || overrides.export_csv,
            profile: self.denoise.profile || overrides.profile,
            ..self.denoise
        };
        Self {
            raw_path: overrides.raw_path.or(self.raw_path),
            sonar_model: overrides.sonar_model.unwrap_or(self.sonar_model),
            output_folder: overrides.output_folder.unwrap_or(self.output_folder),
            denoise,
            ..self
        }
    }

    pub fn raw_path(&self) -> anyhow::Result<&Path> {
        self.raw_path
            .as_deref()
            .ok_or_else(|| anyhow!("no raw data source given (--raw-data-source or raw_path)"))
    }

    pub fn creation_options(&self) -> CreationOptions {
        let defaults = CreationOptions::default();
        CreationOptions {
            max_workers: self.creation.max_workers.unwrap_or(defaults.max_workers),
            timeout: self
                .creation
                .timeout_secs
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            file_name: None,
            format: self.store_format,
            overwrite: self.overwrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrocore::masks::params::SeabedMethod;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"raw_path: data/JR161-D20230509-T100645.raw\n\
              sonar_model: EK80\n\
              seabed:\n  method: blackwell\n  parameters:\n    thr: -40.0\n\
              survey:\n  pings: 30\n\
              mvbs:\n  method: index_binning\n  ping_num: 10\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.sonar_model, SonarModel::Ek80);
        assert_eq!(cfg.denoise.seabed.method, SeabedMethod::Blackwell);
        assert_eq!(cfg.denoise.seabed.parameters.thr, -40.0);
        // untouched keys keep their presets
        assert_eq!(cfg.denoise.seabed.parameters.r0, 20.0);
        assert_eq!(cfg.survey.pings, 30);
        assert_eq!(cfg.survey.samples, SurveyProfile::default().samples);
        let mvbs = cfg.mvbs.unwrap();
        assert_eq!(mvbs.ping_num, Some(10));
        assert_eq!(mvbs.range_sample_num, None);
    }

    #[test]
    fn command_line_wins_over_the_file() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"raw_path: a.raw\noutput_folder: from_file\nexport_csv: true\n")
            .unwrap();
        let path = temp.into_temp_path();
        let overrides = CliOverrides {
            raw_path: Some(PathBuf::from("b.raw")),
            sonar_model: Some(SonarModel::Azfp),
            profile: true,
            ..Default::default()
        };
        let cfg = WorkflowConfig::resolve(Some(path.as_ref()), overrides).unwrap();
        assert_eq!(cfg.raw_path().unwrap(), Path::new("b.raw"));
        assert_eq!(cfg.output_folder, PathBuf::from("from_file"));
        assert_eq!(cfg.sonar_model, SonarModel::Azfp);
        assert!(cfg.denoise.export_csv);
        assert!(cfg.denoise.profile);
    }

    #[test]
    fn a_raw_path_is_required() {
        assert!(WorkflowConfig::resolve(None, CliOverrides::default()).is_err());
    }

    #[test]
    fn timeout_is_dropped_when_not_positive() {
        let cfg = WorkflowConfig {
            creation: CreationSettings {
                max_workers: Some(2),
                timeout_secs: Some(0.0),
            },
            ..Default::default()
        };
        let options = cfg.creation_options();
        assert_eq!(options.max_workers, 2);
        assert_eq!(options.timeout, None);
    }
}
