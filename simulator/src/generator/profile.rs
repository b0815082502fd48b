use anyhow::{ensure, Context};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hydrocore::io::integrity::parse_filename_timestamp;
use hydrocore::volume::{AcousticVolume, Variable, ECHO_RANGE};
use ndarray::{Array1, Array3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One synthetic aggregation, an ellipse in ping × sample space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoalTemplate {
    pub center_ping: usize,
    pub center_sample: usize,
    pub half_pings: usize,
    pub half_samples: usize,
    pub sv: f64,
}

/// Configuration for generating a synthetic survey file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyProfile {
    pub channels: Vec<f64>,
    pub pings: usize,
    pub samples: usize,
    pub sample_spacing_m: f64,
    pub ping_interval_s: f64,
    pub background_sv: f64,
    pub noise_db: f64,
    pub seabed_sample: usize,
    pub seabed_sv: f64,
    pub impulse_rate: f64,
    pub shoals: Vec<ShoalTemplate>,
    pub start_lat: f64,
    pub start_lon: f64,
    pub speed_knots: f64,
    pub heading_deg: f64,
    pub seed: u64,
}

impl Default for SurveyProfile {
    fn default() -> Self {
        Self {
            channels: vec![38_000.0, 120_000.0, 200_000.0],
            pings: 240,
            samples: 160,
            sample_spacing_m: 0.5,
            ping_interval_s: 1.0,
            background_sv: -95.0,
            noise_db: 2.0,
            seabed_sample: 140,
            seabed_sv: -25.0,
            impulse_rate: 0.002,
            shoals: vec![
                ShoalTemplate {
                    center_ping: 60,
                    center_sample: 50,
                    half_pings: 12,
                    half_samples: 6,
                    sv: -55.0,
                },
                ShoalTemplate {
                    center_ping: 170,
                    center_sample: 90,
                    half_pings: 20,
                    half_samples: 8,
                    sv: -60.0,
                },
            ],
            start_lat: -54.25,
            start_lon: -36.5,
            speed_knots: 10.0,
            heading_deg: 45.0,
            seed: 0,
        }
    }
}

/// Ping-by-ping positions on a constant heading.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub latitude: Array1<f64>,
    pub longitude: Array1<f64>,
}

/// Decoded stand-in for one raw file.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSurvey {
    pub volume: AcousticVolume,
    pub track: Track,
}

fn start_time(path: &Path) -> DateTime<Utc> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_filename_timestamp(&name)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_default()
}

/// Per-frequency offset so the channels differ the way fish and krill do.
fn frequency_offset(frequency: f64) -> f64 {
    (frequency / 38_000.0).log10() * 3.0
}

fn build_track(profile: &SurveyProfile) -> Track {
    let step_nmi = profile.speed_knots * profile.ping_interval_s / 3600.0;
    let heading = profile.heading_deg.to_radians();
    let lat_step = step_nmi / 60.0 * heading.cos();
    let lon_step = step_nmi / 60.0 * heading.sin() / profile.start_lat.to_radians().cos();
    Track {
        latitude: Array1::from_shape_fn(profile.pings, |p| profile.start_lat + lat_step * p as f64),
        longitude: Array1::from_shape_fn(profile.pings, |p| profile.start_lon + lon_step * p as f64),
    }
}

pub fn generate_survey(profile: &SurveyProfile, path: &Path) -> anyhow::Result<SyntheticSurvey> {
    ensure!(!profile.channels.is_empty(), "survey needs at least one channel");
    ensure!(
        profile.pings > 0 && profile.samples > 0,
        "survey needs at least one ping and one sample"
    );
    let mut rng = StdRng::seed_from_u64(profile.seed);
    let n_channel = profile.channels.len();
    let shape = (n_channel, profile.pings, profile.samples);

    let mut sv = Array3::from_elem(shape, profile.background_sv);
    for ((c, p, r), value) in sv.indexed_iter_mut() {
        let spread = profile.noise_db.abs();
        let jitter = rng.gen_range(-spread..=spread);
        *value += jitter;
        for shoal in &profile.shoals {
            let dp = (p as f64 - shoal.center_ping as f64) / shoal.half_pings.max(1) as f64;
            let dr = (r as f64 - shoal.center_sample as f64) / shoal.half_samples.max(1) as f64;
            if dp * dp + dr * dr <= 1.0 {
                *value = shoal.sv + frequency_offset(profile.channels[c]) + jitter;
            }
        }
        if r >= profile.seabed_sample {
            let below = (r - profile.seabed_sample) as f64;
            *value = profile.seabed_sv - 1.5 * below + jitter;
        }
    }

    // spikes from other acoustic instruments, one ping at a time
    for p in 0..profile.pings {
        if rng.gen_bool(profile.impulse_rate.clamp(0.0, 1.0)) {
            let channel = rng.gen_range(0..n_channel);
            for r in 0..profile.seabed_sample.min(profile.samples) {
                sv[[channel, p, r]] += 30.0;
            }
        }
    }

    let interval_ms = (profile.ping_interval_s * 1000.0).round() as i64;
    let first = start_time(path);
    let ping_time = (0..profile.pings)
        .map(|p| first + Duration::milliseconds(interval_ms * p as i64))
        .collect();
    let names = profile
        .channels
        .iter()
        .map(|frequency| format!("GPT {:>3} kHz", (frequency / 1000.0).round() as i64))
        .collect();

    let mut volume = AcousticVolume::new(
        names,
        profile.channels.clone(),
        ping_time,
        sv,
        path.to_string_lossy().into_owned(),
    )
    .context("assembling synthetic volume")?;
    let echo_range = Array3::from_shape_fn(shape, |(_, _, r)| r as f64 * profile.sample_spacing_m);
    volume
        .insert_variable(ECHO_RANGE, Variable::grid(echo_range))
        .context("attaching echo_range")?;

    Ok(SyntheticSurvey {
        volume,
        track: build_track(profile),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survey_has_the_requested_shape_and_clock() {
        let profile = SurveyProfile {
            pings: 20,
            samples: 30,
            seabed_sample: 25,
            shoals: Vec::new(),
            ..Default::default()
        };
        let survey = generate_survey(&profile, Path::new("JR161-D20230509-T100645.raw")).unwrap();
        assert_eq!(survey.volume.grid_shape(), (3, 20, 30));
        assert_eq!(
            survey.volume.ping_time()[0],
            Utc.with_ymd_and_hms(2023, 5, 9, 10, 6, 45).unwrap()
        );
        assert_eq!(survey.track.latitude.len(), 20);
        assert!(survey.volume.contains(ECHO_RANGE));
    }

    #[test]
    fn same_seed_gives_the_same_survey() {
        let profile = SurveyProfile {
            pings: 16,
            samples: 16,
            seabed_sample: 12,
            ..Default::default()
        };
        let path = Path::new("a.raw");
        let first = generate_survey(&profile, path).unwrap();
        let second = generate_survey(&profile, path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn shoals_stand_out_from_the_background() {
        let profile = SurveyProfile::default();
        let survey = generate_survey(&profile, Path::new("s.raw")).unwrap();
        let sv = survey.volume.sv().unwrap();
        let shoal = &profile.shoals[0];
        assert!(sv[[0, shoal.center_ping, shoal.center_sample]] > -65.0);
    }

    #[test]
    fn empty_channel_list_is_rejected() {
        let profile = SurveyProfile {
            channels: Vec::new(),
            ..Default::default()
        };
        assert!(generate_survey(&profile, Path::new("x.raw")).is_err());
    }
}
