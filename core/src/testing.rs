//! Synthetic volumes and a scripted toolkit for unit tests.

use crate::masks::freqdiff::FreqDiffExpression;
use crate::masks::params::{
    AttenuationMethod, AttenuationParameters, ImpulseMethod, ImpulseParameters, SeabedMethod,
    SeabedSettings, ShoalMethod, ShoalParameters, TransientMethod, TransientParameters,
};
use crate::masks::registry::MaskKind;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::processing::background::ResolvedBackgroundNoise;
use crate::io::integrity::SonarModel;
use crate::toolkit::{
    BackgroundNoiseEstimate, CalibrationOptions, ChannelCalibration, DepthOptions, DetectionKernels, LocationOptions,
    NascDataset, NascKernel, NascValue, SonarBackend, SplitBeamOptions,
};
use crate::volume::{AcousticVolume, ChannelView, Variable, DEPTH, ECHO_RANGE, LATITUDE, LONGITUDE};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use ndarray::{Array1, Array2, Array3, Axis};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_FREQUENCIES: [f64; 5] = [38_000.0, 120_000.0, 200_000.0, 70_000.0, 18_000.0];

pub struct VolumeBuilder {
    channels: Vec<String>,
    frequencies: Vec<f64>,
    ping_time: Vec<DateTime<Utc>>,
    sv: Array3<f64>,
    source: String,
    extra: Vec<(String, Variable)>,
}

impl VolumeBuilder {
    /// One ping per second from 2023-05-09 10:06:45 UTC.
    pub fn ping_times(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2023, 5, 9, 10, 6, 45).unwrap();
        (0..n)
            .map(|i| start + ChronoDuration::seconds(i as i64))
            .collect()
    }

    pub fn new(n_channel: usize, n_ping: usize, n_range: usize) -> Self {
        let channels = (0..n_channel).map(|i| format!("ch{}", i)).collect();
        let frequencies = (0..n_channel)
            .map(|i| {
                DEFAULT_FREQUENCIES
                    .get(i)
                    .copied()
                    .unwrap_or(10_000.0 * (i + 1) as f64)
            })
            .collect();
        let sv = Array3::from_shape_fn((n_channel, n_ping, n_range), |(c, p, r)| {
            -60.0 - 0.5 * r as f64 - c as f64 + 0.1 * (p % 3) as f64
        });
        Self {
            channels,
            frequencies,
            ping_time: Self::ping_times(n_ping),
            sv,
            source: "JR161-D20230509-T100645.raw".into(),
            extra: Vec::new(),
        }
    }

    pub fn channels(mut self, names: &[&str], frequencies: &[f64]) -> Self {
        self.channels = names.iter().map(|name| name.to_string()).collect();
        self.frequencies = frequencies.to_vec();
        self
    }

    pub fn sv(mut self, sv: Array3<f64>) -> Self {
        self.sv = sv;
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.into();
        self
    }

    pub fn ping_time(mut self, ping_time: Vec<DateTime<Utc>>) -> Self {
        self.ping_time = ping_time;
        self
    }

    /// Uniform `echo_range` of `step` metres per sample on every channel.
    pub fn with_echo_range(self, step: f64) -> Self {
        let range = self.uniform_profile(step);
        self.with_variable(ECHO_RANGE, Variable::grid(range))
    }

    /// Uniform `depth` of `step` metres per sample on every channel.
    pub fn with_depth(self, step: f64) -> Self {
        let depth = self.uniform_profile(step);
        self.with_variable(DEPTH, Variable::grid(depth))
    }

    /// Per-ping positions moving linearly from `start` by `step` degrees.
    pub fn with_track(self, start: (f64, f64), step: (f64, f64)) -> Self {
        let n_ping = self.ping_time.len();
        let lat = Array1::from_shape_fn(n_ping, |p| start.0 + step.0 * p as f64);
        let lon = Array1::from_shape_fn(n_ping, |p| start.1 + step.1 * p as f64);
        self.with_variable(LATITUDE, Variable::per_ping(lat))
            .with_variable(LONGITUDE, Variable::per_ping(lon))
    }

    pub fn with_mask(self, name: &str, keep: Array3<bool>) -> Self {
        self.with_variable(name, Variable::grid_mask(keep))
    }

    pub fn with_variable(mut self, name: &str, variable: Variable) -> Self {
        self.extra.push((name.to_string(), variable));
        self
    }

    fn uniform_profile(&self, step: f64) -> Array3<f64> {
        let (c, p, r) = self.sv.dim();
        Array3::from_shape_fn((c, p, r), |(_, _, r)| r as f64 * step)
    }

    pub fn build(self) -> AcousticVolume {
        let mut volume = AcousticVolume::new(
            self.channels,
            self.frequencies,
            self.ping_time,
            self.sv,
            self.source,
        )
        .expect("builder produced an inconsistent volume");
        for (name, variable) in self.extra {
            volume
                .insert_variable(name, variable)
                .expect("builder variable does not fit the volume");
        }
        volume
    }
}

/// Toolkit double: canned per-kind layers, injected failures and delays, a
/// call log, and a real evaluation of frequency-difference expressions.
#[derive(Default)]
pub struct ScriptedKernels {
    layers: HashMap<MaskKind, Array2<bool>>,
    failures: HashSet<MaskKind>,
    delays: HashMap<MaskKind, Duration>,
    nasc: HashMap<String, f64>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedKernels {
    pub fn with_layer(mut self, kind: MaskKind, layer: Array2<bool>) -> Self {
        self.layers.insert(kind, layer);
        self
    }

    pub fn failing(mut self, kind: MaskKind) -> Self {
        self.failures.insert(kind);
        self
    }

    pub fn delayed(mut self, kind: MaskKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn with_nasc(mut self, channel: &str, value: f64) -> Self {
        self.nasc.insert(channel.to_string(), value);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn run(&self, kind: MaskKind, label: &str, channel: &ChannelView<'_>) -> ProcessingResult<Array2<bool>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(label.to_string());
        }
        if let Some(delay) = self.delays.get(&kind) {
            std::thread::sleep(*delay);
        }
        if self.failures.contains(&kind) {
            return Err(ProcessingError::Kernel(format!("{} kernel exploded", kind)));
        }
        Ok(self
            .layers
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Array2::from_elem(channel.sv.dim(), true)))
    }
}

impl DetectionKernels for ScriptedKernels {
    fn transient(
        &self,
        channel: ChannelView<'_>,
        _method: TransientMethod,
        _parameters: &TransientParameters,
    ) -> ProcessingResult<Array2<bool>> {
        self.run(MaskKind::Transient, "transient", &channel)
    }

    fn impulse(
        &self,
        channel: ChannelView<'_>,
        _method: ImpulseMethod,
        _parameters: &ImpulseParameters,
    ) -> ProcessingResult<Array2<bool>> {
        self.run(MaskKind::Impulse, "impulse", &channel)
    }

    fn attenuation(
        &self,
        channel: ChannelView<'_>,
        _method: AttenuationMethod,
        _parameters: &AttenuationParameters,
    ) -> ProcessingResult<Array2<bool>> {
        self.run(MaskKind::Attenuation, "attenuation", &channel)
    }

    fn seabed(
        &self,
        channel: ChannelView<'_>,
        _method: SeabedMethod,
        settings: &SeabedSettings,
    ) -> ProcessingResult<Array2<bool>> {
        let kind = match settings {
            SeabedSettings::Bottom(_) => MaskKind::Seabed,
            SeabedSettings::Echo(_) => MaskKind::FalseSeabed,
        };
        self.run(kind, "seabed", &channel)
    }

    fn shoal(
        &self,
        channel: ChannelView<'_>,
        _method: ShoalMethod,
        parameters: &ShoalParameters,
    ) -> ProcessingResult<Array2<bool>> {
        if self.layers.contains_key(&MaskKind::Shoal) || self.failures.contains(&MaskKind::Shoal) {
            return self.run(MaskKind::Shoal, "shoal", &channel);
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push("shoal".into());
        }
        Ok(channel.sv.mapv(|value| value > parameters.thr))
    }

    fn frequency_difference(
        &self,
        volume: &AcousticVolume,
        expression: &FreqDiffExpression,
    ) -> ProcessingResult<Array2<bool>> {
        let sv = volume.sv()?;
        let a = sv.index_axis(Axis(0), volume.channel_index(&expression.chan_a)?);
        let b = sv.index_axis(Axis(0), volume.channel_index(&expression.chan_b)?);
        Ok(Array2::from_shape_fn(a.dim(), |(p, r)| {
            expression.holds(a[[p, r]], b[[p, r]])
        }))
    }

    fn remove_background_noise(
        &self,
        volume: &AcousticVolume,
        _parameters: &ResolvedBackgroundNoise,
    ) -> ProcessingResult<BackgroundNoiseEstimate> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push("remove_background_noise".into());
        }
        let sv = volume.sv()?.to_owned();
        let noise = Array3::from_elem(sv.dim(), -150.0);
        Ok(BackgroundNoiseEstimate {
            sv_corrected: sv,
            sv_noise: noise,
        })
    }
}

impl NascKernel for ScriptedKernels {
    /// Canned value per channel when scripted, otherwise the count of valid
    /// samples, which makes masking visible in the result.
    fn compute_nasc(
        &self,
        volume: &AcousticVolume,
        _range_bin_m: f64,
        _dist_bin_nmi: f64,
    ) -> ProcessingResult<NascDataset> {
        let sv = volume.sv()?;
        let values = volume
            .channels()
            .iter()
            .zip(volume.frequency_nominal())
            .enumerate()
            .map(|(index, (channel, frequency))| NascValue {
                channel: channel.clone(),
                frequency_nominal: *frequency,
                nasc: self.nasc.get(channel).copied().unwrap_or_else(|| {
                    sv.index_axis(Axis(0), index)
                        .iter()
                        .filter(|value| !value.is_nan())
                        .count() as f64
                }),
            })
            .collect();
        Ok(NascDataset { values })
    }
}

/// Decoder double whose handle is the volume itself. Enrichment steps add
/// simple variables and can be made to fail by name.
#[derive(Default)]
pub struct ScriptedBackend {
    failures: HashSet<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn failing(mut self, step: &'static str) -> Self {
        self.failures.insert(step);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn enter(&self, step: &'static str) -> ProcessingResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(step.to_string());
        }
        if self.failures.contains(step) {
            return Err(ProcessingError::Kernel(format!("{} failed", step)));
        }
        Ok(())
    }
}

impl SonarBackend for ScriptedBackend {
    type Handle = AcousticVolume;

    fn open_raw(&self, path: &Path, _sonar_model: SonarModel) -> ProcessingResult<AcousticVolume> {
        self.enter("open_raw")?;
        Ok(VolumeBuilder::new(2, 4, 3)
            .source(&path.to_string_lossy())
            .build())
    }

    fn open_converted(&self, path: &Path) -> ProcessingResult<AcousticVolume> {
        self.enter("open_converted")?;
        Ok(VolumeBuilder::new(2, 4, 3)
            .source(&path.to_string_lossy())
            .build())
    }

    fn calibration(&self, handle: &AcousticVolume) -> ProcessingResult<Vec<ChannelCalibration>> {
        self.enter("calibration")?;
        Ok(handle
            .channels()
            .iter()
            .zip(handle.frequency_nominal())
            .map(|(channel, &frequency)| ChannelCalibration {
                channel: channel.clone(),
                frequency_nominal: frequency,
                pulse_length: 1.024e-3,
                gain_correction: 26.0,
                sa_correction: -0.7,
            })
            .collect())
    }

    fn compute_sv(
        &self,
        handle: &AcousticVolume,
        _options: &CalibrationOptions,
    ) -> ProcessingResult<AcousticVolume> {
        Ok(handle.clone())
    }

    fn compute_ts(
        &self,
        handle: &AcousticVolume,
        _options: &CalibrationOptions,
    ) -> ProcessingResult<AcousticVolume> {
        Ok(handle.clone())
    }

    fn add_depth(
        &self,
        volume: &AcousticVolume,
        _options: &DepthOptions,
    ) -> ProcessingResult<AcousticVolume> {
        self.enter("add_depth")?;
        let (c, p, r) = volume.grid_shape();
        let depth = Array3::from_shape_fn((c, p, r), |(_, _, r)| r as f64 * 0.5);
        volume.with_variable(DEPTH, Variable::grid(depth))
    }

    fn add_location(
        &self,
        volume: &AcousticVolume,
        _handle: &AcousticVolume,
        _options: &LocationOptions,
    ) -> ProcessingResult<AcousticVolume> {
        self.enter("add_location")?;
        let n_ping = volume.ping_time().len();
        let lat = Array1::from_shape_fn(n_ping, |p| -54.0 + 0.001 * p as f64);
        let lon = Array1::from_shape_fn(n_ping, |p| -36.0 + 0.001 * p as f64);
        volume
            .with_variable(LATITUDE, Variable::per_ping(lat))?
            .with_variable(LONGITUDE, Variable::per_ping(lon))
    }

    fn add_splitbeam_angle(
        &self,
        volume: &AcousticVolume,
        _handle: &AcousticVolume,
        _options: &SplitBeamOptions,
    ) -> ProcessingResult<AcousticVolume> {
        self.enter("add_splitbeam_angle")?;
        let angle = Array3::zeros(volume.grid_shape());
        volume.with_variable("angle_alongship", Variable::grid(angle))
    }
}
