//! Parameter search space definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::SpaceError;

/// A concrete scalar value assigned to a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    // Int is tried before Float so that JSON integers stay integers.
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParameterValue {
    /// Numeric view of the value; `None` for booleans and text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Describes the values a parameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    /// Discrete enumerated values, expanded in the order given.
    Choice { values: Vec<ParameterValue> },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
}

impl Domain {
    /// Number of grid points on this axis.
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Choice { values } => Some(values.len()),
            Self::IntRange { low, high } if low <= high => {
                usize::try_from(i128::from(*high) - i128::from(*low) + 1).ok()
            }
            Self::IntRange { .. } => Some(0),
        }
    }

    /// Every grid point on this axis, in ascending/declared order.
    pub fn values(&self) -> Vec<ParameterValue> {
        match self {
            Self::Choice { values } => values.clone(),
            Self::IntRange { low, high } => (*low..=*high).map(ParameterValue::Int).collect(),
        }
    }
}

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name as the training procedure sees it (e.g. "--regularization").
    pub name: String,
    pub domain: Domain,
}

/// The full search space: parameters in declaration order.
///
/// Declaration order fixes the grid enumeration order, so two spaces with the
/// same parameters declared differently produce differently indexed trials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub parameters: Vec<ParameterDef>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_choice<V>(mut self, name: impl Into<String>, values: Vec<V>) -> Self
    where
        V: Into<ParameterValue>,
    {
        self.parameters.push(ParameterDef {
            name: name.into(),
            domain: Domain::Choice {
                values: values.into_iter().map(Into::into).collect(),
            },
        });
        self
    }

    pub fn add_int_range(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            domain: Domain::IntRange { low, high },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Check names and domains.
    pub fn validate(&self) -> Result<(), SpaceError> {
        let mut seen = HashSet::new();
        for param in &self.parameters {
            if param.name.is_empty() {
                return Err(SpaceError::EmptyName);
            }
            if !seen.insert(param.name.as_str()) {
                return Err(SpaceError::DuplicateName {
                    name: param.name.clone(),
                });
            }
            match &param.domain {
                Domain::Choice { values } if values.is_empty() => {
                    return Err(SpaceError::EmptyDomain {
                        name: param.name.clone(),
                    });
                }
                Domain::IntRange { low, high } if low > high => {
                    return Err(SpaceError::InvalidRange {
                        name: param.name.clone(),
                        low: *low,
                        high: *high,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Total number of grid points. An empty space has exactly one (the
    /// empty assignment).
    pub fn grid_size(&self) -> Result<usize, SpaceError> {
        self.validate()?;
        let mut total: usize = 1;
        for param in &self.parameters {
            let dim = param.domain.size().ok_or(SpaceError::GridOverflow)?;
            total = total.checked_mul(dim).ok_or(SpaceError::GridOverflow)?;
        }
        Ok(total)
    }
}
