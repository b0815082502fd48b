//! In-memory acoustic volume: a channel × ping_time × range_sample grid of
//! named variables plus the coordinates and global attributes that travel
//! with it between pipeline stages.

pub mod mask;

pub use mask::{Mask, MaskMetadata};

use crate::prelude::{ProcessingError, ProcessingResult};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView1, ArrayView2, ArrayView3, Axis, Ix1, Ix3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the primary backscatter variable.
pub const SV: &str = "Sv";
pub const ECHO_RANGE: &str = "echo_range";
pub const DEPTH: &str = "depth";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

pub type Attrs = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        AttrValue::List(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dim {
    Channel,
    PingTime,
    RangeSample,
}

/// Canonical layout of gridded variables.
pub const GRID_DIMS: [Dim; 3] = [Dim::Channel, Dim::PingTime, Dim::RangeSample];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarData {
    Float(ArrayD<f64>),
    Bool(ArrayD<bool>),
}

impl VarData {
    pub fn shape(&self) -> &[usize] {
        match self {
            VarData::Float(data) => data.shape(),
            VarData::Bool(data) => data.shape(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub dims: Vec<Dim>,
    pub data: VarData,
    #[serde(default)]
    pub attrs: Attrs,
}

impl Variable {
    pub fn grid(data: Array3<f64>) -> Self {
        Self {
            dims: GRID_DIMS.to_vec(),
            data: VarData::Float(data.into_dyn()),
            attrs: Attrs::new(),
        }
    }

    pub fn grid_mask(data: Array3<bool>) -> Self {
        Self {
            dims: GRID_DIMS.to_vec(),
            data: VarData::Bool(data.into_dyn()),
            attrs: Attrs::new(),
        }
    }

    pub fn per_ping(data: Array1<f64>) -> Self {
        Self {
            dims: vec![Dim::PingTime],
            data: VarData::Float(data.into_dyn()),
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn is_indexed_by(&self, dim: Dim) -> bool {
        self.dims.contains(&dim)
    }

    pub fn as_grid(&self) -> ProcessingResult<ArrayView3<'_, f64>> {
        match &self.data {
            VarData::Float(data) if self.dims == GRID_DIMS => data
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|err| ProcessingError::integrity(err.to_string())),
            _ => Err(ProcessingError::integrity(format!(
                "expected a float grid over {:?}, found {:?}",
                GRID_DIMS, self.dims
            ))),
        }
    }

    pub fn as_grid_mask(&self) -> ProcessingResult<ArrayView3<'_, bool>> {
        match &self.data {
            VarData::Bool(data) if self.dims == GRID_DIMS => data
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|err| ProcessingError::integrity(err.to_string())),
            _ => Err(ProcessingError::integrity(format!(
                "expected a boolean grid over {:?}, found {:?}",
                GRID_DIMS, self.dims
            ))),
        }
    }

    pub fn as_per_ping(&self) -> ProcessingResult<ArrayView1<'_, f64>> {
        match &self.data {
            VarData::Float(data) if self.dims == [Dim::PingTime] => data
                .view()
                .into_dimensionality::<Ix1>()
                .map_err(|err| ProcessingError::integrity(err.to_string())),
            _ => Err(ProcessingError::integrity(format!(
                "expected a per-ping float series, found {:?}",
                self.dims
            ))),
        }
    }
}

/// Borrowed view of one channel, handed to per-channel detection kernels.
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    pub index: usize,
    pub name: &'a str,
    pub frequency_nominal: f64,
    pub ping_time: &'a [DateTime<Utc>],
    pub sv: ArrayView2<'a, f64>,
    pub echo_range: Option<ArrayView2<'a, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticVolume {
    channel: Vec<String>,
    frequency_nominal: Vec<f64>,
    ping_time: Vec<DateTime<Utc>>,
    range_sample: Vec<usize>,
    variables: BTreeMap<String, Variable>,
    attrs: Attrs,
    source_filename: String,
}

impl AcousticVolume {
    pub fn new(
        channel: Vec<String>,
        frequency_nominal: Vec<f64>,
        ping_time: Vec<DateTime<Utc>>,
        sv: Array3<f64>,
        source_filename: impl Into<String>,
    ) -> ProcessingResult<Self> {
        if channel.len() != frequency_nominal.len() {
            return Err(ProcessingError::CoordinateMismatch(format!(
                "{} channels but {} nominal frequencies",
                channel.len(),
                frequency_nominal.len()
            )));
        }
        let (n_channel, n_ping, n_range) = sv.dim();
        if n_channel != channel.len() || n_ping != ping_time.len() {
            return Err(ProcessingError::CoordinateMismatch(format!(
                "Sv shape {:?} does not match {} channels × {} pings",
                sv.dim(),
                channel.len(),
                ping_time.len()
            )));
        }

        let mut variables = BTreeMap::new();
        variables.insert(SV.to_string(), Variable::grid(sv));
        Ok(Self {
            channel,
            frequency_nominal,
            ping_time,
            range_sample: (0..n_range).collect(),
            variables,
            attrs: Attrs::new(),
            source_filename: source_filename.into(),
        })
    }

    pub fn channels(&self) -> &[String] {
        &self.channel
    }

    pub fn frequency_nominal(&self) -> &[f64] {
        &self.frequency_nominal
    }

    pub fn ping_time(&self) -> &[DateTime<Utc>] {
        &self.ping_time
    }

    pub fn range_sample(&self) -> &[usize] {
        &self.range_sample
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    /// File stem of the source recording, used to name every export.
    pub fn source_stem(&self) -> String {
        Path::new(&self.source_filename)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_filename.clone())
    }

    pub fn dim_len(&self, dim: Dim) -> usize {
        match dim {
            Dim::Channel => self.channel.len(),
            Dim::PingTime => self.ping_time.len(),
            Dim::RangeSample => self.range_sample.len(),
        }
    }

    pub fn grid_shape(&self) -> (usize, usize, usize) {
        (
            self.channel.len(),
            self.ping_time.len(),
            self.range_sample.len(),
        )
    }

    /// Total number of cells in the primary grid.
    pub fn size(&self) -> usize {
        let (c, p, r) = self.grid_shape();
        c * p * r
    }

    pub fn channel_index(&self, name: &str) -> ProcessingResult<usize> {
        self.channel
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| ProcessingError::config(format!("unknown channel '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable(&self, name: &str) -> ProcessingResult<&Variable> {
        self.variables
            .get(name)
            .ok_or_else(|| ProcessingError::MissingVariable(name.to_string()))
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables.iter()
    }

    pub fn grid(&self, name: &str) -> ProcessingResult<ArrayView3<'_, f64>> {
        self.variable(name)?.as_grid()
    }

    pub fn grid_mask(&self, name: &str) -> ProcessingResult<ArrayView3<'_, bool>> {
        self.variable(name)?.as_grid_mask()
    }

    pub fn sv(&self) -> ProcessingResult<ArrayView3<'_, f64>> {
        self.grid(SV)
    }

    pub fn per_ping(&self, name: &str) -> ProcessingResult<ArrayView1<'_, f64>> {
        self.variable(name)?.as_per_ping()
    }

    pub fn channel_view(&self, index: usize) -> ProcessingResult<ChannelView<'_>> {
        let name = self.channel.get(index).ok_or_else(|| {
            ProcessingError::config(format!("channel index {} out of range", index))
        })?;
        let echo_range = match self.variables.get(ECHO_RANGE) {
            Some(variable) => Some(variable.as_grid()?.index_axis_move(Axis(0), index)),
            None => None,
        };
        Ok(ChannelView {
            index,
            name,
            frequency_nominal: self.frequency_nominal[index],
            ping_time: &self.ping_time,
            sv: self.sv()?.index_axis_move(Axis(0), index),
            echo_range,
        })
    }

    fn expected_shape(&self, dims: &[Dim]) -> Vec<usize> {
        dims.iter().map(|dim| self.dim_len(*dim)).collect()
    }

    /// Inserts or replaces a variable after checking it lines up with the
    /// volume's coordinates.
    pub fn insert_variable(
        &mut self,
        name: impl Into<String>,
        variable: Variable,
    ) -> ProcessingResult<()> {
        let name = name.into();
        let expected = self.expected_shape(&variable.dims);
        if variable.data.shape() != expected.as_slice() {
            return Err(ProcessingError::CoordinateMismatch(format!(
                "variable '{}' has shape {:?}, volume expects {:?} for {:?}",
                name,
                variable.data.shape(),
                expected,
                variable.dims
            )));
        }
        self.variables.insert(name, variable);
        Ok(())
    }

    /// Copy-on-write variant of [`insert_variable`](Self::insert_variable).
    pub fn with_variable(
        &self,
        name: impl Into<String>,
        variable: Variable,
    ) -> ProcessingResult<Self> {
        let mut next = self.clone();
        next.insert_variable(name, variable)?;
        Ok(next)
    }

    pub(crate) fn replace_grid(&mut self, name: &str, data: Array3<f64>) -> ProcessingResult<()> {
        let attrs = self
            .variables
            .get(name)
            .map(|variable| variable.attrs.clone())
            .unwrap_or_default();
        self.insert_variable(name, Variable::grid(data).with_attrs(attrs))
    }

    pub(crate) fn set_ping_time(&mut self, ping_time: Vec<DateTime<Utc>>) -> ProcessingResult<()> {
        if ping_time.len() != self.ping_time.len() {
            return Err(ProcessingError::CoordinateMismatch(format!(
                "{} ping times supplied for {} pings",
                ping_time.len(),
                self.ping_time.len()
            )));
        }
        self.ping_time = ping_time;
        Ok(())
    }

    /// Builds a volume sharing this one's channels, pings and attributes but
    /// with a new range axis and no variables.
    pub(crate) fn empty_like_with_range(&self, range_sample: Vec<usize>) -> Self {
        Self {
            channel: self.channel.clone(),
            frequency_nominal: self.frequency_nominal.clone(),
            ping_time: self.ping_time.clone(),
            range_sample,
            variables: BTreeMap::new(),
            attrs: self.attrs.clone(),
            source_filename: self.source_filename.clone(),
        }
    }

    pub(crate) fn insert_unchecked(&mut self, name: String, variable: Variable) {
        self.variables.insert(name, variable);
    }

    /// Latitude/longitude pairs, one per ping, when location was attached.
    pub fn track(&self) -> ProcessingResult<(ArrayView1<'_, f64>, ArrayView1<'_, f64>)> {
        Ok((self.per_ping(LATITUDE)?, self.per_ping(LONGITUDE)?))
    }

    /// Boolean map of valid (non-missing) Sv samples for one channel.
    pub fn valid_samples(&self, channel: usize) -> ProcessingResult<Array2<bool>> {
        Ok(self
            .sv()?
            .index_axis(Axis(0), channel)
            .mapv(|value| !value.is_nan()))
    }
}
