use super::{AttrValue, Attrs, Dim, VarData, Variable, GRID_DIMS};
use crate::prelude::{ProcessingError, ProcessingResult};
use ndarray::{Array2, Array3, ArrayD};
use serde::{Deserialize, Serialize};

pub const MASK_TYPE_ATTR: &str = "mask_type";
pub const METHOD_ATTR: &str = "method";
pub const PARAMETERS_ATTR: &str = "parameters";

/// Provenance stamped onto every mask by the factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskMetadata {
    pub mask_type: String,
    pub method: Option<String>,
    pub parameters: Vec<String>,
}

impl MaskMetadata {
    pub fn new(mask_type: impl Into<String>) -> Self {
        Self {
            mask_type: mask_type.into(),
            method: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn to_attrs(&self) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert(MASK_TYPE_ATTR.into(), AttrValue::from(self.mask_type.as_str()));
        if let Some(method) = &self.method {
            attrs.insert(METHOD_ATTR.into(), AttrValue::from(method.as_str()));
        }
        attrs.insert(
            PARAMETERS_ATTR.into(),
            AttrValue::List(self.parameters.clone()),
        );
        attrs
    }
}

/// Boolean volume plus provenance. `true` marks samples to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    dims: Vec<Dim>,
    data: ArrayD<bool>,
    metadata: MaskMetadata,
}

impl Mask {
    /// Mask over channel × ping_time × range_sample.
    pub fn multichannel(data: Array3<bool>, metadata: MaskMetadata) -> Self {
        Self {
            dims: GRID_DIMS.to_vec(),
            data: data.into_dyn(),
            metadata,
        }
    }

    /// Channel-less ping_time × range_sample mask, broadcast over channels
    /// when applied.
    pub fn planar(data: Array2<bool>, metadata: MaskMetadata) -> Self {
        Self {
            dims: vec![Dim::PingTime, Dim::RangeSample],
            data: data.into_dyn(),
            metadata,
        }
    }

    pub fn mask_type(&self) -> &str {
        &self.metadata.mask_type
    }

    pub fn metadata(&self) -> &MaskMetadata {
        &self.metadata
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<bool> {
        &self.data
    }

    /// Name under which the mask is attached to a volume.
    pub fn variable_name(&self) -> String {
        format!("mask_{}", self.metadata.mask_type)
    }

    pub fn count_true(&self) -> usize {
        self.data.iter().filter(|&&value| value).count()
    }

    /// Element-wise AND of two masks with identical layout.
    pub fn and(&self, other: &Mask) -> ProcessingResult<Mask> {
        if self.dims != other.dims || self.data.shape() != other.data.shape() {
            return Err(ProcessingError::CoordinateMismatch(format!(
                "cannot combine masks shaped {:?} and {:?}",
                self.data.shape(),
                other.data.shape()
            )));
        }
        let mut data = self.data.clone();
        data.zip_mut_with(&other.data, |lhs, &rhs| *lhs = *lhs && rhs);
        Ok(Mask {
            dims: self.dims.clone(),
            data,
            metadata: self.metadata.clone(),
        })
    }

    pub fn into_variable(self) -> Variable {
        let attrs = self.metadata.to_attrs();
        Variable {
            dims: self.dims,
            data: VarData::Bool(self.data),
            attrs,
        }
    }
}
