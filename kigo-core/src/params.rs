//! Parameter tuples.
//!
//! Job parameters are an ordered tuple of primitive values, stored in the
//! `param_blob` column as opaque bytes. Producers and workers must use the
//! same codec; `decode_params(encode_params(xs)) == xs` holds for every
//! supported tuple.

use serde::{Deserialize, Serialize};

use crate::types::Bytes;

/// One element of a job's parameter tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

/// Encode a parameter tuple into the opaque `param_blob` representation.
pub fn encode_params(params: &[Value]) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(params)
}

/// Decode a `param_blob` back into a parameter tuple.
pub fn decode_params(blob: &[u8]) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::from_slice(blob)
}
