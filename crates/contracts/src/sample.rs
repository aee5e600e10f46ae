//! Sample - Sample Source output
//!
//! One decoded reading for a channel group.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar value carried by a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view used by the round-robin store (text has none)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Real(v) => Some(*v),
            Scalar::Text(_) => None,
        }
    }

    /// Parse a free-form token: integer first, then real, else text
    pub fn parse_token(token: &str) -> Self {
        if let Ok(v) = token.parse::<i64>() {
            Scalar::Int(v)
        } else if let Ok(v) = token.parse::<f64>() {
            Scalar::Real(v)
        } else {
            Scalar::Text(token.to_string())
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Real(v) => write!(f, "{v}"),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

/// Decoded sample
///
/// `name` is the channel-group nickname; `values` is the ordered row of
/// item values for that group. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Sample {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Single-reading sample
    pub fn scalar(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(name, vec![value.into()])
    }
}
