//! Frequency-differencing (dB-differencing) rules for organism classes.

use super::attach::attach_mask_to_dataset;
use super::registry::MaskKind;
use crate::prelude::{ProcessingError, ProcessingResult};
use crate::toolkit::DetectionKernels;
use crate::volume::{AcousticVolume, Mask, MaskMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const FREQ_DIFF_METHOD: &str = "frequency_differencing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Eq => "==",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
        }
    }
}

impl FromStr for Comparison {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            ">" => Ok(Comparison::Gt),
            ">=" => Ok(Comparison::Ge),
            "<" => Ok(Comparison::Lt),
            "<=" => Ok(Comparison::Le),
            "==" => Ok(Comparison::Eq),
            other => Err(ProcessingError::config(format!(
                "unsupported comparison operator '{}'",
                other
            ))),
        }
    }
}

/// `Sv[chan_a] - Sv[chan_b] {operator} {threshold_db} dB`
#[derive(Debug, Clone, PartialEq)]
pub struct FreqDiffExpression {
    pub chan_a: String,
    pub chan_b: String,
    pub operator: Comparison,
    pub threshold_db: f64,
}

impl FreqDiffExpression {
    /// Missing samples on either channel never satisfy the expression.
    pub fn holds(&self, sv_a: f64, sv_b: f64) -> bool {
        if sv_a.is_nan() || sv_b.is_nan() {
            return false;
        }
        self.operator.holds(sv_a - sv_b, self.threshold_db)
    }
}

impl fmt::Display for FreqDiffExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" - \"{}\" {} {}dB",
            self.chan_a,
            self.chan_b,
            self.operator.symbol(),
            self.threshold_db
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FreqDiffCriterion {
    Single {
        operator: Comparison,
        value: f64,
    },
    Interval {
        start: (Comparison, f64),
        end: (Comparison, f64),
    },
}

/// Loosely specified criterion as it arrives from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreqDiffOptions {
    pub single_operator: Option<String>,
    pub single_value: Option<f64>,
    pub interval_start_operator: Option<String>,
    pub interval_start_value: Option<f64>,
    pub interval_end_operator: Option<String>,
    pub interval_end_value: Option<f64>,
}

impl FreqDiffCriterion {
    /// Exactly one of the single or interval forms must be fully given.
    pub fn from_options(options: &FreqDiffOptions) -> ProcessingResult<Self> {
        let single_given = options.single_operator.is_some() || options.single_value.is_some();
        let interval_given = options.interval_start_operator.is_some()
            || options.interval_start_value.is_some()
            || options.interval_end_operator.is_some()
            || options.interval_end_value.is_some();

        match (single_given, interval_given) {
            (true, false) => match (&options.single_operator, options.single_value) {
                (Some(operator), Some(value)) => Ok(FreqDiffCriterion::Single {
                    operator: operator.parse()?,
                    value,
                }),
                _ => Err(invalid_combination()),
            },
            (false, true) => match (
                &options.interval_start_operator,
                options.interval_start_value,
                &options.interval_end_operator,
                options.interval_end_value,
            ) {
                (Some(start_op), Some(start), Some(end_op), Some(end)) => {
                    Ok(FreqDiffCriterion::Interval {
                        start: (start_op.parse()?, start),
                        end: (end_op.parse()?, end),
                    })
                }
                _ => Err(invalid_combination()),
            },
            _ => Err(invalid_combination()),
        }
    }

    pub fn expressions(&self, chan_a: &str, chan_b: &str) -> Vec<FreqDiffExpression> {
        let build = |operator: Comparison, threshold_db: f64| FreqDiffExpression {
            chan_a: chan_a.to_string(),
            chan_b: chan_b.to_string(),
            operator,
            threshold_db,
        };
        match *self {
            FreqDiffCriterion::Single { operator, value } => vec![build(operator, value)],
            FreqDiffCriterion::Interval { start, end } => {
                vec![build(start.0, start.1), build(end.0, end.1)]
            }
        }
    }
}

fn invalid_combination() -> ProcessingError {
    ProcessingError::config("invalid combination of frequency-differencing parameters")
}

/// Evaluates the criterion between two channels; interval criteria are the
/// AND of both bounds.
pub fn find_mask_freq_diff(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    chan_a: &str,
    chan_b: &str,
    criterion: &FreqDiffCriterion,
    mask_type: &str,
) -> ProcessingResult<Mask> {
    volume.channel_index(chan_a)?;
    volume.channel_index(chan_b)?;

    let expressions = criterion.expressions(chan_a, chan_b);
    let metadata = MaskMetadata::new(mask_type)
        .with_method(FREQ_DIFF_METHOD)
        .with_parameters(expressions.iter().map(|expr| expr.to_string()).collect());

    let mut combined: Option<Mask> = None;
    for expression in &expressions {
        let data = kernels.frequency_difference(volume, expression)?;
        let expected = (volume.ping_time().len(), volume.range_sample().len());
        if data.dim() != expected {
            return Err(ProcessingError::Kernel(format!(
                "frequency difference for {} returned shape {:?}, expected {:?}",
                expression,
                data.dim(),
                expected
            )));
        }
        let mask = Mask::planar(data, metadata.clone());
        combined = Some(match combined {
            Some(previous) => previous.and(&mask)?,
            None => mask,
        });
    }
    combined.ok_or_else(invalid_combination)
}

/// Organism classes with fixed differencing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganismClass {
    Krill,
    GasBearingOrganisms,
    FluidLikeOrganisms,
}

impl OrganismClass {
    pub fn kind(&self) -> MaskKind {
        match self {
            OrganismClass::Krill => MaskKind::Krill,
            OrganismClass::GasBearingOrganisms => MaskKind::GasBearingOrganisms,
            OrganismClass::FluidLikeOrganisms => MaskKind::FluidLikeOrganisms,
        }
    }

    /// Channel order and criterion for the class.
    ///
    /// Krill: 120 kHz − 38 kHz within [2, 16] dB. Gas-bearing: 38 kHz −
    /// 120 kHz above 1 dB. Fluid-like: 120 kHz − 38 kHz above 2 dB.
    pub fn rule<'a>(
        &self,
        chan38: &'a str,
        chan120: &'a str,
    ) -> (&'a str, &'a str, FreqDiffCriterion) {
        match self {
            OrganismClass::Krill => (
                chan120,
                chan38,
                FreqDiffCriterion::Interval {
                    start: (Comparison::Ge, 2.0),
                    end: (Comparison::Le, 16.0),
                },
            ),
            OrganismClass::GasBearingOrganisms => (
                chan38,
                chan120,
                FreqDiffCriterion::Single {
                    operator: Comparison::Gt,
                    value: 1.0,
                },
            ),
            OrganismClass::FluidLikeOrganisms => (
                chan120,
                chan38,
                FreqDiffCriterion::Single {
                    operator: Comparison::Gt,
                    value: 2.0,
                },
            ),
        }
    }
}

pub fn identify_organisms(
    kernels: &dyn DetectionKernels,
    volume: &AcousticVolume,
    class: OrganismClass,
    chan38: &str,
    chan120: &str,
) -> ProcessingResult<AcousticVolume> {
    let (chan_a, chan_b, criterion) = class.rule(chan38, chan120);
    let mask = find_mask_freq_diff(
        kernels,
        volume,
        chan_a,
        chan_b,
        &criterion,
        class.kind().as_str(),
    )?;
    attach_mask_to_dataset(volume, mask)
}
