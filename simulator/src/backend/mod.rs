//! Offline stand-ins for the acoustic toolkit: a decoder that synthesises
//! surveys, reference detection kernels and a snapshot volume store.

pub mod kernels;
pub mod store;

pub use kernels::ReferenceKernels;
pub use store::SnapshotStore;

use crate::generator::profile::{generate_survey, SurveyProfile, SyntheticSurvey, Track};
use hydrocore::io::integrity::SonarModel;
use hydrocore::io::processed::read_processed;
use hydrocore::toolkit::{
    CalibrationOptions, ChannelCalibration, DepthOptions, LocationOptions, SonarBackend,
    SplitBeamOptions,
};
use hydrocore::volume::{Variable, DEPTH, ECHO_RANGE, LATITUDE, LONGITUDE};
use hydrocore::{AcousticVolume, ProcessingError, ProcessingResult};
use log::{debug, info};
use ndarray::{Array1, Array3};
use std::path::Path;

pub const ANGLE_ALONGSHIP: &str = "angle_alongship";
pub const ANGLE_ATHWARTSHIP: &str = "angle_athwartship";

const PULSE_LENGTH_S: f64 = 1.024e-3;
const SA_CORRECTION_DB: f64 = -0.7;

/// Nominal transceiver gain, a little higher for the higher channels.
fn nominal_gain(frequency: f64) -> f64 {
    25.0 + (frequency / 38_000.0).log10()
}

/// Treats every raw path as a request for a synthetic survey shaped by
/// `profile`; converted files are read back through [`SnapshotStore`].
#[derive(Debug, Clone, Default)]
pub struct SyntheticBackend {
    profile: SurveyProfile,
}

impl SyntheticBackend {
    pub fn new(profile: SurveyProfile) -> Self {
        Self { profile }
    }
}

impl SonarBackend for SyntheticBackend {
    type Handle = SyntheticSurvey;

    fn open_raw(&self, path: &Path, sonar_model: SonarModel) -> ProcessingResult<SyntheticSurvey> {
        info!("synthesising {} survey for {}", sonar_model, path.display());
        generate_survey(&self.profile, path)
            .map_err(|err| ProcessingError::Kernel(format!("synthetic decode failed: {:#}", err)))
    }

    fn open_converted(&self, path: &Path) -> ProcessingResult<SyntheticSurvey> {
        let volume = read_processed(&SnapshotStore, path)?;
        let track = match volume.track() {
            Ok((lat, lon)) => Track {
                latitude: lat.to_owned(),
                longitude: lon.to_owned(),
            },
            Err(_) => {
                debug!("{} carries no track", path.display());
                let pings = volume.ping_time().len();
                Track {
                    latitude: Array1::from_elem(pings, f64::NAN),
                    longitude: Array1::from_elem(pings, f64::NAN),
                }
            }
        };
        Ok(SyntheticSurvey { volume, track })
    }

    fn calibration(&self, handle: &SyntheticSurvey) -> ProcessingResult<Vec<ChannelCalibration>> {
        let volume = &handle.volume;
        Ok(volume
            .channels()
            .iter()
            .zip(volume.frequency_nominal())
            .map(|(channel, &frequency)| ChannelCalibration {
                channel: channel.clone(),
                frequency_nominal: frequency,
                pulse_length: PULSE_LENGTH_S,
                gain_correction: nominal_gain(frequency),
                sa_correction: SA_CORRECTION_DB,
            })
            .collect())
    }

    fn compute_sv(
        &self,
        handle: &SyntheticSurvey,
        _options: &CalibrationOptions,
    ) -> ProcessingResult<AcousticVolume> {
        Ok(handle.volume.clone())
    }

    /// Point-target strength of a synthetic survey is its Sv plus the
    /// spherical spreading difference.
    fn compute_ts(
        &self,
        handle: &SyntheticSurvey,
        _options: &CalibrationOptions,
    ) -> ProcessingResult<AcousticVolume> {
        let echo_range = handle.volume.grid(ECHO_RANGE)?;
        let sv = handle.volume.sv()?;
        let mut ts = sv.to_owned();
        ndarray::Zip::from(&mut ts).and(&echo_range).for_each(|value, &range| {
            *value += if range > 0.0 { 20.0 * range.log10() } else { 0.0 };
        });
        handle.volume.with_variable("TS", Variable::grid(ts))
    }

    /// `depth = offset ± echo_range·cos(tilt)`, negative when the
    /// transducer faces up.
    fn add_depth(
        &self,
        volume: &AcousticVolume,
        options: &DepthOptions,
    ) -> ProcessingResult<AcousticVolume> {
        let echo_range = volume.grid(ECHO_RANGE)?;
        let direction = if options.downward { 1.0 } else { -1.0 };
        let cosine = options.tilt.to_radians().cos();
        let depth: Array3<f64> =
            echo_range.mapv(|range| options.depth_offset + direction * range * cosine);
        volume.with_variable(DEPTH, Variable::grid(depth))
    }

    fn add_location(
        &self,
        volume: &AcousticVolume,
        handle: &SyntheticSurvey,
        options: &LocationOptions,
    ) -> ProcessingResult<AcousticVolume> {
        if let Some(sentence) = &options.nmea_sentence {
            debug!("synthetic track ignores the {} sentence filter", sentence);
        }
        let mut next = volume.clone();
        next.insert_variable(LATITUDE, Variable::per_ping(handle.track.latitude.clone()))?;
        next.insert_variable(LONGITUDE, Variable::per_ping(handle.track.longitude.clone()))?;
        Ok(next)
    }

    /// The synthetic transducer is not split-beam; both angles are zero.
    fn add_splitbeam_angle(
        &self,
        volume: &AcousticVolume,
        _handle: &SyntheticSurvey,
        _options: &SplitBeamOptions,
    ) -> ProcessingResult<AcousticVolume> {
        let zeros = Array3::zeros(volume.grid_shape());
        let mut next = volume.clone();
        next.insert_variable(ANGLE_ALONGSHIP, Variable::grid(zeros.clone()))?;
        next.insert_variable(ANGLE_ATHWARTSHIP, Variable::grid(zeros))?;
        Ok(next)
    }
}
