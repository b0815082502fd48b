//! Parallel mask creation. Each requested kind runs on a bounded pool of
//! blocking workers; a failing or timed-out kind is reported, not fatal.

use super::registry::{create_mask, MaskKind, MaskRequest};
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::toolkit::DetectionKernels;
use crate::volume::{AcousticVolume, Mask};
use log::{debug, error, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Clone, PartialEq)]
pub struct CreationOptions {
    pub max_workers: usize,
    /// Per-kind limit. A kernel that overruns it is reported as failed, but
    /// keeps its worker slot until it returns.
    pub timeout: Option<Duration>,
}

impl Default for CreationOptions {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(4),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskCreationFailure {
    pub kind: MaskKind,
    pub reason: String,
}

/// Outcome of one creation round, in completion order.
#[derive(Debug, Default)]
pub struct MaskCreationReport {
    pub masks: Vec<(MaskKind, Mask)>,
    pub failures: Vec<MaskCreationFailure>,
    pub timings: Vec<(MaskKind, Duration)>,
}

impl MaskCreationReport {
    pub fn mask(&self, kind: MaskKind) -> Option<&Mask> {
        self.masks
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, mask)| mask)
    }

    pub fn into_masks(self) -> Vec<Mask> {
        self.masks.into_iter().map(|(_, mask)| mask).collect()
    }
}

fn flatten(joined: Result<ProcessingResult<Mask>, JoinError>) -> ProcessingResult<Mask> {
    match joined {
        Ok(result) => result,
        Err(err) => Err(ProcessingError::Kernel(format!("mask worker aborted: {}", err))),
    }
}

pub async fn create_masks(
    kernels: Arc<dyn DetectionKernels>,
    volume: Arc<AcousticVolume>,
    requests: Vec<MaskRequest>,
    options: &CreationOptions,
) -> MaskCreationReport {
    let semaphore = Arc::new(Semaphore::new(options.max_workers.max(1)));
    let mut tasks = JoinSet::new();

    for request in requests {
        let kind = request.kind();
        let kernels = Arc::clone(&kernels);
        let volume = Arc::clone(&volume);
        let semaphore = Arc::clone(&semaphore);
        let timeout = options.timeout;

        tasks.spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let closed = ProcessingError::Kernel("mask worker pool closed".into());
                    return (kind, Err(closed), Duration::ZERO);
                }
            };
            let started = Instant::now();
            let work = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                create_mask(kernels.as_ref(), &volume, &request)
            });
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(joined) => flatten(joined),
                    Err(_) => Err(ProcessingError::Timeout(limit)),
                },
                None => flatten(work.await),
            };
            (kind, outcome, started.elapsed())
        });
    }

    let mut report = MaskCreationReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((kind, Ok(mask), elapsed)) => {
                debug!("{} mask created in {:.3}s", kind, elapsed.as_secs_f64());
                report.timings.push((kind, elapsed));
                report.masks.push((kind, mask));
            }
            Ok((kind, Err(err), elapsed)) => {
                warn!("{} mask generated an exception: {}", kind, err);
                report.timings.push((kind, elapsed));
                report.failures.push(MaskCreationFailure {
                    kind,
                    reason: err.to_string(),
                });
            }
            Err(err) => error!("mask creation task failed to join: {}", err),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::params::{ImpulseParameters, TransientParameters};
    use crate::masks::registry::NoiseRequest;
    use crate::testing::{ScriptedKernels, VolumeBuilder};
    use crate::config::DenoiseConfig;

    fn noise_requests() -> Vec<MaskRequest> {
        DenoiseConfig::default()
            .enabled_noise_requests()
            .into_iter()
            .map(MaskRequest::from)
            .collect()
    }

    #[tokio::test]
    async fn every_enabled_kind_produces_a_mask() {
        let volume = Arc::new(VolumeBuilder::new(2, 4, 5).build());
        let kernels: Arc<dyn DetectionKernels> = Arc::new(ScriptedKernels::default());
        let report = create_masks(kernels, volume, noise_requests(), &CreationOptions::default()).await;
        assert!(report.failures.is_empty());
        assert_eq!(report.masks.len(), 5);
        let seabed = report.mask(MaskKind::FalseSeabed).unwrap();
        assert_eq!(seabed.mask_type(), "false_seabed");
        assert_eq!(report.timings.len(), 5);
    }

    #[tokio::test]
    async fn one_failing_kind_does_not_sink_the_rest() {
        let volume = Arc::new(VolumeBuilder::new(1, 3, 3).build());
        let kernels: Arc<dyn DetectionKernels> =
            Arc::new(ScriptedKernels::default().failing(MaskKind::Attenuation));
        let options = CreationOptions {
            max_workers: 2,
            timeout: None,
        };
        let report = create_masks(kernels, volume, noise_requests(), &options).await;
        assert_eq!(report.masks.len(), 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, MaskKind::Attenuation);
        assert!(report.failures[0].reason.contains("exploded"));
        assert!(report.mask(MaskKind::Attenuation).is_none());
    }

    #[tokio::test]
    async fn overrunning_kernel_is_reported_as_timeout() {
        let volume = Arc::new(VolumeBuilder::new(1, 2, 2).build());
        let kernels: Arc<dyn DetectionKernels> = Arc::new(
            ScriptedKernels::default().delayed(MaskKind::Transient, Duration::from_millis(400)),
        );
        let requests = vec![
            MaskRequest::Noise(NoiseRequest::Transient {
                method: Default::default(),
                parameters: TransientParameters::default(),
            }),
            MaskRequest::Noise(NoiseRequest::Impulse {
                method: Default::default(),
                parameters: ImpulseParameters::default(),
            }),
        ];
        let options = CreationOptions {
            max_workers: 2,
            timeout: Some(Duration::from_millis(50)),
        };
        let report = create_masks(kernels, volume, requests, &options).await;
        assert_eq!(report.masks.len(), 1);
        assert_eq!(report.masks[0].0, MaskKind::Impulse);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn empty_request_list_yields_empty_report() {
        let volume = Arc::new(VolumeBuilder::new(1, 2, 2).build());
        let kernels: Arc<dyn DetectionKernels> = Arc::new(ScriptedKernels::default());
        let report = create_masks(kernels, volume, Vec::new(), &CreationOptions::default()).await;
        assert!(report.masks.is_empty());
        assert!(report.failures.is_empty());
    }
}
