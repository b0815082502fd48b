use crate::backend::{ReferenceKernels, SnapshotStore, SyntheticBackend};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use hydrocore::calibrate::{compute_sv_with_encode_mode, read_file, ReadOutcome};
use hydrocore::enrich::enrich_sv_dataset;
use hydrocore::io::csv::{
    write_calibration_csv, write_file, write_gps_csv, write_nasc_csv, write_raw_metadata_csv,
    write_shoals_csv, write_sv_csv, CsvKind,
};
use hydrocore::io::integrity::FileIntegrity;
use hydrocore::io::processed::{write_processed, WriteOptions};
use hydrocore::masks::{
    apply_selected_noise_masks_and_or_noise_removal, attach_masks_to_dataset, create_mask,
    create_masks, MaskCreationFailure, MaskRequest,
};
use hydrocore::nasc::{base_nasc_data, compute_per_dataset_nasc, full_nasc_data, NascRow, NascSummary};
use hydrocore::prelude::ProcessingStage;
use hydrocore::processing::{compute_mvbs, InterpolationStage, RegridStage, TimeContinuityStage};
use hydrocore::shoals::{attach_shoal_mask_to_ds, process_shoals_with, ShoalRecord};
use hydrocore::telemetry::Profiler;
use hydrocore::toolkit::{ChannelCalibration, DetectionKernels, SonarBackend};
use hydrocore::volume::SV;
use hydrocore::AcousticVolume;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;

pub const SV_UNINTERPOLATED: &str = "Sv_uninterpolated";

#[derive(Debug)]
pub struct FileReport {
    pub volume: AcousticVolume,
    pub processed_path: Option<PathBuf>,
    pub mvbs_path: Option<PathBuf>,
    pub shoals: Vec<ShoalRecord>,
    pub nasc: Option<NascRow>,
    pub csv_files: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub mask_failures: Vec<MaskCreationFailure>,
}

#[derive(Debug)]
pub enum FileOutcome {
    Processed(Box<FileReport>),
    /// The file name did not pass the integrity check; nothing was read.
    Rejected(FileIntegrity),
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    backend: SyntheticBackend,
    kernels: Arc<ReferenceKernels>,
}

fn announce(step: usize, message: &str) {
    println!("[{:>2}] {}", step, message);
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        let backend = SyntheticBackend::new(config.survey.clone());
        Self {
            config,
            backend,
            kernels: Arc::new(ReferenceKernels),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Full single-file processing: read, calibrate, clean, detect, report
    /// and persist, announcing each stage as it starts.
    pub fn process_file(&self, path: &Path, profiler: &Profiler) -> anyhow::Result<FileOutcome> {
        let denoise = &self.config.denoise;
        let kernels: &ReferenceKernels = &self.kernels;
        let mut warnings = Vec::new();

        announce(1, &format!("Reading {} as {}", path.display(), self.config.sonar_model));
        let outcome = profiler
            .time("read_file", || {
                read_file(&self.backend, path, self.config.sonar_model, self.config.use_swap)
            })
            .with_context(|| format!("reading {}", path.display()))?;
        let (handle, encode_mode) = match outcome {
            ReadOutcome::Opened {
                handle, encode_mode, ..
            } => (handle, encode_mode),
            ReadOutcome::Rejected(integrity) => return Ok(FileOutcome::Rejected(integrity)),
        };

        announce(2, &format!("Computing Sv ({:?} samples)", encode_mode));
        let sv = profiler
            .time("compute_sv", || compute_sv_with_encode_mode(&self.backend, &handle, encode_mode))
            .context("computing Sv")?;

        announce(3, "Checking ping time continuity");
        let continuity = TimeContinuityStage::new(self.config.time_window);
        let sv = profiler
            .time(continuity.name(), || continuity.execute(&sv))
            .context("repairing ping time")?;

        announce(4, "Adding depth, location and split-beam angle");
        let (volume, enrich_warnings) = profiler.time("enrich", || {
            enrich_sv_dataset(&self.backend, &sv, &handle, &self.config.enrich)
        });
        for warning in &enrich_warnings {
            println!("     warning: {}", warning);
        }
        warnings.extend(enrich_warnings);

        let requests: Vec<MaskRequest> = denoise
            .enabled_noise_requests()
            .into_iter()
            .map(MaskRequest::from)
            .collect();
        announce(5, &format!("Creating {} noise mask(s)", requests.len()));
        let runtime = TokioBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating mask worker runtime")?;
        let shared: Arc<dyn DetectionKernels> = self.kernels.clone();
        let report = runtime.block_on(create_masks(
            shared,
            Arc::new(volume.clone()),
            requests,
            &self.config.creation_options(),
        ));
        for (kind, elapsed) in &report.timings {
            profiler.record(format!("mask {}", kind), *elapsed);
        }
        for failure in &report.failures {
            profiler.record_error();
            println!("     {} mask failed: {}", failure.kind, failure.reason);
            warnings.push(format!("{} mask failed: {}", failure.kind, failure.reason));
        }
        let mask_failures = report.failures.clone();
        let volume = attach_masks_to_dataset(&volume, report.into_masks()).context("attaching noise masks")?;

        announce(6, "Applying noise masks and removing background noise");
        let volume = profiler
            .time("noise_removal", || {
                apply_selected_noise_masks_and_or_noise_removal(
                    kernels,
                    &volume,
                    &denoise.noise_process_requests(),
                )
            })
            .context("applying noise masks")?;

        let organism_requests = denoise
            .organism_requests(&volume)
            .context("resolving frequency-differencing channels")?;
        let volume = if organism_requests.is_empty() {
            volume
        } else {
            announce(7, &format!("Tagging {} organism class(es)", organism_requests.len()));
            let masks = profiler
                .time("organisms", || {
                    organism_requests
                        .iter()
                        .map(|request| create_mask(kernels, &volume, request))
                        .collect::<Result<Vec<_>, _>>()
                })
                .context("frequency differencing")?;
            attach_masks_to_dataset(&volume, masks).context("attaching organism masks")?
        };

        let volume = if self.config.interpolation.enabled {
            announce(8, "Interpolating Sv along ping time");
            let original = volume.variable(SV)?.clone();
            let kept = volume
                .with_variable(SV_UNINTERPOLATED, original)
                .context("keeping uninterpolated Sv")?;
            let stage = InterpolationStage::new(
                self.config.interpolation.method,
                self.config.interpolation.with_edge_fill,
            );
            profiler
                .time(stage.name(), || stage.execute(&kept))
                .context("interpolating Sv")?
        } else {
            volume
        };

        let volume = if self.config.regrid {
            announce(9, "Regridding channels onto a common range axis");
            let stage = RegridStage::new();
            profiler
                .time(stage.name(), || stage.execute(&volume))
                .context("regridding")?
        } else {
            volume
        };

        let summary: Option<NascSummary> = if denoise.nasc.enabled {
            announce(10, "Integrating NASC over the whole file");
            match profiler.time("nasc", || compute_per_dataset_nasc(kernels, &volume)) {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn!("per-file NASC unavailable: {}", err);
                    warnings.push(format!("per-file NASC unavailable: {}", err));
                    None
                }
            }
        } else {
            None
        };

        let (volume, shoals) = if denoise.shoals.enabled {
            announce(11, "Detecting shoals");
            let with_mask = profiler
                .time("shoal_detection", || {
                    attach_shoal_mask_to_ds(
                        kernels,
                        &volume,
                        denoise.shoals.method,
                        &denoise.shoals.parameters,
                    )
                })
                .context("detecting shoals")?;
            let records = profiler
                .time("shoal_metrics", || {
                    process_shoals_with(
                        &with_mask,
                        summary.as_ref().map(|summary| &summary.dataset),
                        self.config.labeling,
                    )
                })
                .context("measuring shoals")?;
            println!("     {} shoal record(s)", records.len());
            (with_mask, records)
        } else {
            (volume, Vec::new())
        };

        let nasc = if summary.is_some() {
            announce(12, "Building the NASC report");
            let row = match full_nasc_data(kernels, &volume, &denoise.nasc.variants) {
                Ok(row) => row,
                Err(err) => {
                    println!("     masked NASC variants skipped: {}", err);
                    warnings.push(format!("masked NASC variants skipped: {}", err));
                    base_nasc_data(kernels, &volume, false, None).context("computing NASC")?
                }
            };
            Some(row)
        } else {
            None
        };

        announce(13, &format!("Saving to {}", self.config.output_folder.display()));
        let processed_path = profiler
            .time("write_processed", || {
                write_processed(
                    &SnapshotStore,
                    &volume,
                    &self.config.output_folder,
                    &self.config.write_options(),
                )
            })
            .context("writing processed volume")?;
        match &processed_path {
            Some(written) => println!("     wrote {}", written.display()),
            None => println!("     kept existing output (overwrite is off)"),
        }

        let mvbs_path = match &self.config.mvbs {
            Some(options) => {
                let mvbs = profiler
                    .time("mvbs", || compute_mvbs(&volume, options))
                    .context("computing MVBS")?;
                let write_options = WriteOptions {
                    file_name: Some(format!("{}_MVBS", volume.source_stem())),
                    ..self.config.write_options()
                };
                let written = write_processed(
                    &SnapshotStore,
                    &mvbs,
                    &self.config.output_folder,
                    &write_options,
                )
                .context("writing MVBS volume")?;
                if let Some(path) = &written {
                    println!("     wrote MVBS {:?} to {}", mvbs.grid_shape(), path.display());
                }
                written
            }
            None => None,
        };

        let csv_files = if denoise.export_csv {
            announce(14, "Exporting CSV files");
            let calibration = self
                .backend
                .calibration(&handle)
                .context("reading channel calibration")?;
            let files =
                self.export_csv(&volume, &calibration, &shoals, nasc.as_ref(), &mut warnings)?;
            for file in &files {
                println!("     wrote {}", file.display());
            }
            files
        } else {
            Vec::new()
        };

        Ok(FileOutcome::Processed(Box::new(FileReport {
            volume,
            processed_path,
            mvbs_path,
            shoals,
            nasc,
            csv_files,
            warnings,
            mask_failures,
        })))
    }

    fn export_csv(
        &self,
        volume: &AcousticVolume,
        calibration: &[ChannelCalibration],
        shoals: &[ShoalRecord],
        nasc: Option<&NascRow>,
        warnings: &mut Vec<String>,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let dir = &self.config.output_folder;
        let stem = volume.source_stem();
        let mut written = Vec::new();

        let path = CsvKind::Raw.path(dir, &stem);
        write_file(&path, |writer| write_raw_metadata_csv(writer, volume))
            .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);

        let path = CsvKind::Calibration.path(dir, &stem);
        write_file(&path, |writer| write_calibration_csv(writer, calibration))
            .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);

        let path = CsvKind::Shoals.path(dir, &stem);
        write_file(&path, |writer| write_shoals_csv(writer, shoals))
            .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);

        if let Some(row) = nasc {
            let path = CsvKind::Nasc.path(dir, &stem);
            write_file(&path, |writer| write_nasc_csv(writer, row))
                .with_context(|| format!("writing {}", path.display()))?;
            written.push(path);
        }

        let path = CsvKind::Sv.path(dir, &stem);
        write_file(&path, |writer| write_sv_csv(writer, volume))
            .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);

        if volume.track().is_ok() {
            let path = CsvKind::Gps.path(dir, &stem);
            write_file(&path, |writer| write_gps_csv(writer, volume))
                .with_context(|| format!("writing {}", path.display()))?;
            written.push(path);
        } else {
            warnings.push("no location attached, GPS export skipped".into());
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{ShoalTemplate, SurveyProfile};
    use hydrocore::masks::MaskKind;
    use std::fs;

    fn config(output: &Path) -> WorkflowConfig {
        let mut config = WorkflowConfig {
            output_folder: output.to_path_buf(),
            survey: SurveyProfile {
                pings: 60,
                samples: 60,
                seabed_sample: 50,
                impulse_rate: 0.0,
                shoals: vec![ShoalTemplate {
                    center_ping: 30,
                    center_sample: 20,
                    half_pings: 6,
                    half_samples: 4,
                    sv: -55.0,
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        config.denoise.export_csv = true;
        config
    }

    #[test]
    fn runner_processes_a_synthetic_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(config(dir.path()));
        let profiler = Profiler::new();
        let outcome = runner
            .process_file(Path::new("JR161-D20230509-T100645.raw"), &profiler)
            .unwrap();
        let FileOutcome::Processed(report) = outcome else {
            panic!("file was rejected");
        };

        assert!(report.processed_path.as_ref().unwrap().exists());
        assert!(report.volume.contains(&MaskKind::Seabed.variable_name()));
        assert!(report.volume.contains(SV_UNINTERPOLATED));
        assert!(report.shoals.iter().any(|record| !record.is_placeholder()));

        let nasc = report.nasc.as_ref().unwrap();
        assert!(nasc.float("NASC_38000.0").unwrap() > 0.0);
        assert!(nasc.get("fish_NASC_38000.0").is_some());

        assert_eq!(report.csv_files.len(), 6);
        let schools = fs::read_to_string(dir.path().join("JR161-D20230509-T100645_fish_schools.csv")).unwrap();
        assert!(schools.lines().count() > 1);
        let metadata = fs::read_to_string(dir.path().join("JR161-D20230509-T100645_metadata.csv")).unwrap();
        assert_eq!(metadata.lines().count(), 4);
        let calibration =
            fs::read_to_string(dir.path().join("JR161-D20230509-T100645_calibration.csv")).unwrap();
        let rows: Vec<&str> = calibration.lines().collect();
        assert_eq!(
            rows[0],
            "channel,frequency_nominal,pulse_length,gain_correction,sa_correction"
        );
        assert_eq!(rows.len(), 4);
        assert!(rows[1].contains(",38000,"));
        assert!(!profiler.snapshot().is_empty());
    }

    #[test]
    fn mvbs_is_saved_next_to_the_processed_volume() {
        use hydrocore::processing::{MvbsMethod, MvbsOptions};
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.denoise.export_csv = false;
        config.mvbs = Some(MvbsOptions {
            method: MvbsMethod::IndexBinning,
            range_sample_num: Some(10),
            ping_num: Some(20),
            ..Default::default()
        });
        let runner = Runner::new(config);
        let FileOutcome::Processed(report) = runner
            .process_file(Path::new("JR161-D20230509-T100645.raw"), &Profiler::new())
            .unwrap()
        else {
            panic!("file was rejected");
        };
        let path = report.mvbs_path.unwrap();
        assert!(path.ends_with("JR161-D20230509-T100645_MVBS.zarr"));
        let mvbs = hydrocore::io::processed::read_processed(&SnapshotStore, &path).unwrap();
        assert_eq!(mvbs.grid_shape(), (3, 3, 6));
    }

    #[test]
    fn undated_files_are_rejected_without_reading() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(config(dir.path()));
        let outcome = runner
            .process_file(Path::new("survey-nodate.raw"), &Profiler::new())
            .unwrap();
        assert!(matches!(outcome, FileOutcome::Rejected(report) if !report.file_integrity));
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn shoal_free_runs_fall_back_to_the_base_nasc_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.denoise.shoals.enabled = false;
        config.denoise.export_csv = false;
        let runner = Runner::new(config);
        let FileOutcome::Processed(report) = runner
            .process_file(Path::new("JR161-D20230509-T100645.raw"), &Profiler::new())
            .unwrap()
        else {
            panic!("file was rejected");
        };
        let nasc = report.nasc.unwrap();
        assert!(nasc.get("NASC_38000.0").is_some());
        assert!(nasc.get("fish_NASC_38000.0").is_none());
        assert!(report.warnings.iter().any(|warning| warning.contains("variants skipped")));
    }
}
