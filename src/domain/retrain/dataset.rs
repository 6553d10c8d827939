//! Raw and formatted dataset representations

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single typed cell read from the relational store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A store type with no numeric or text decoding, kept by type name
    Unsupported(String),
}

impl RawValue {
    /// Numeric view of the value; booleans map to 0/1, text and null have none
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Int(v) => Some(*v as f32),
            Self::Float(v) => Some(*v as f32),
            Self::Null | Self::Text(_) | Self::Unsupported(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "'{}'", v),
            Self::Unsupported(type_name) => write!(f, "<{}>", type_name),
        }
    }
}

/// Rows extracted from the store, column-major header plus row values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawRecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_capacity(columns: Vec<String>, rows: usize) -> Self {
        Self {
            columns,
            rows: Vec::with_capacity(rows),
        }
    }

    /// Append a row; its width must match the column header
    pub fn push_row(&mut self, row: Vec<RawValue>) -> Result<(), String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "row has {} values but the record set has {} columns",
                row.len(),
                self.columns.len()
            ));
        }

        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A training example: feature vector plus regression label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub features: Vec<f32>,
    pub label: f32,
}

impl Example {
    pub fn new(features: Vec<f32>, label: f32) -> Self {
        Self { features, label }
    }
}

/// Normalized, tensor-ready dataset produced by formatting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedDataset {
    feature_names: Vec<String>,
    examples: Vec<Example>,
}

impl FormattedDataset {
    pub fn new(feature_names: Vec<String>, examples: Vec<Example>) -> Self {
        Self {
            feature_names,
            examples,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of features per example
    pub fn feature_width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}
