//! Typed detection methods and parameter presets for each mask kind.
//!
//! The `Default` impls are the standard survey presets; they are plain values
//! handed to the pipeline explicitly, never consulted through global state.

use crate::prelude::{ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientMethod {
    #[default]
    Ryan,
    Fielding,
}

impl TransientMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientMethod::Ryan => "ryan",
            TransientMethod::Fielding => "fielding",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpulseMethod {
    #[default]
    Ryan,
    RyanIterable,
    Wang,
}

impl ImpulseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpulseMethod::Ryan => "ryan",
            ImpulseMethod::RyanIterable => "ryan_iterable",
            ImpulseMethod::Wang => "wang",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttenuationMethod {
    #[default]
    Ryan,
    Ariza,
}

impl AttenuationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttenuationMethod::Ryan => "ryan",
            AttenuationMethod::Ariza => "ariza",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeabedMethod {
    #[default]
    Ariza,
    Experimental,
    Blackwell,
    BlackwellMod,
}

impl SeabedMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeabedMethod::Ariza => "ariza",
            SeabedMethod::Experimental => "experimental",
            SeabedMethod::Blackwell => "blackwell",
            SeabedMethod::BlackwellMod => "blackwell_mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoalMethod {
    #[default]
    Will,
    Echoview,
}

impl ShoalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShoalMethod::Will => "will",
            ShoalMethod::Echoview => "echoview",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientParameters {
    pub m: u32,
    pub n: u32,
    pub thr: f64,
    pub excludeabove: f64,
    pub operation: String,
}

impl Default for TransientParameters {
    fn default() -> Self {
        Self {
            m: 5,
            n: 20,
            thr: 20.0,
            excludeabove: 250.0,
            operation: "percentile15".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttenuationParameters {
    pub r0: Option<f64>,
    pub r1: Option<f64>,
    pub n: u32,
    pub m: Option<u32>,
    pub thr: f64,
    pub start: u32,
    pub offset: f64,
}

impl Default for AttenuationParameters {
    fn default() -> Self {
        Self {
            r0: Some(180.0),
            r1: Some(280.0),
            n: 30,
            m: None,
            thr: -6.0,
            start: 0,
            offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseParameters {
    pub thr: f64,
    pub m: u32,
    pub n: u32,
}

impl Default for ImpulseParameters {
    fn default() -> Self {
        Self {
            thr: 10.0,
            m: 5,
            n: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeabedParameters {
    pub r0: f64,
    pub r1: f64,
    pub roff: f64,
    pub thr: f64,
    pub ec: u32,
    pub ek: [u32; 2],
    pub dc: u32,
    pub dk: [u32; 2],
}

impl Default for SeabedParameters {
    fn default() -> Self {
        Self {
            r0: 20.0,
            r1: 1000.0,
            roff: 0.0,
            thr: -38.0,
            ec: 1,
            ek: [3, 3],
            dc: 10,
            dk: [3, 7],
        }
    }
}

/// Split-beam seabed echo parameters used for false-seabed detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FalseSeabedParameters {
    pub theta: Option<f64>,
    pub phi: Option<f64>,
    pub r0: f64,
    pub r1: f64,
    #[serde(rename = "tSv")]
    pub t_sv: f64,
    pub ttheta: f64,
    pub tphi: f64,
    pub wtheta: u32,
    pub wphi: u32,
}

impl Default for FalseSeabedParameters {
    fn default() -> Self {
        Self {
            theta: None,
            phi: None,
            r0: 10.0,
            r1: 1000.0,
            t_sv: -75.0,
            ttheta: 702.0,
            tphi: 282.0,
            wtheta: 28,
            wphi: 52,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoalParameters {
    pub thr: f64,
    pub maxvgap: u32,
    pub maxhgap: u32,
    pub minvlen: u32,
    pub minhlen: u32,
}

impl Default for ShoalParameters {
    fn default() -> Self {
        Self {
            thr: -70.0,
            maxvgap: 5,
            maxhgap: 5,
            minvlen: 0,
            minhlen: 0,
        }
    }
}

/// Seabed detection settings, one variant per kind that routes to the
/// seabed kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum SeabedSettings {
    Bottom(SeabedParameters),
    Echo(FalseSeabedParameters),
}

/// Renders a parameter struct as the `key=value` strings stored in mask
/// provenance, in field declaration order.
pub fn formatted_parameters<P: Serialize>(parameters: &P) -> ProcessingResult<Vec<String>> {
    let value = serde_json::to_value(parameters)
        .map_err(|err| ProcessingError::config(format!("unserializable parameters: {}", err)))?;
    match value {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, render_value(&value)))
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(ProcessingError::config(format!(
            "parameters must be a record, found {}",
            other
        ))),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
