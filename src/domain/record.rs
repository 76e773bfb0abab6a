// ==========================================
// Product Feed Import - record model
// ==========================================
// RawRecord:        source field name -> raw string (Source Reader output)
// NormalizedRecord: target field -> typed value (Mapping Engine output)
// ==========================================

use crate::domain::target_schema::TargetField;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One flat source item. Keys are kept sorted so previews are stable.
pub type RawRecord = BTreeMap<String, String>;

// ==========================================
// FieldValue
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Price(Decimal),
    Integer(i64),
    List(Vec<String>),
    Flag(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_price(&self) -> Option<Decimal> {
        match self {
            FieldValue::Price(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Price(d) => write!(f, "{d}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::List(l) => f.write_str(&l.join("|")),
            FieldValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

// ==========================================
// NormalizedRecord
// ==========================================
// Ordered map so equal inputs always produce equal records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    pub fields: BTreeMap<TargetField, FieldValue>,
}

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: TargetField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn set(&mut self, field: TargetField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn remove(&mut self, field: TargetField) -> Option<FieldValue> {
        self.fields.remove(&field)
    }

    pub fn contains(&self, field: TargetField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn text(&self, field: TargetField) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn price(&self, field: TargetField) -> Option<Decimal> {
        self.get(field).and_then(FieldValue::as_price)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Required target fields with no value in this record.
    pub fn missing_required(&self) -> Vec<TargetField> {
        TargetField::required_fields()
            .filter(|f| !self.contains(*f))
            .collect()
    }
}

// ==========================================
// FieldError - per-record, per-field problem
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldErrorKind {
    MissingRequired,
    InvalidPrice { value: String },
    InvalidInteger { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub target_field: TargetField,
    pub source_field: String,
    #[serde(flatten)]
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::MissingRequired => write!(
                f,
                "{}: required value missing (source field '{}')",
                self.target_field, self.source_field
            ),
            FieldErrorKind::InvalidPrice { value } => {
                write!(f, "{}: cannot parse price '{}'", self.target_field, value)
            }
            FieldErrorKind::InvalidInteger { value } => {
                write!(f, "{}: cannot parse integer '{}'", self.target_field, value)
            }
        }
    }
}

// ==========================================
// RecordError - a source item that could not be read at all
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record {index}: expected {expected} columns, found {found}")]
    ColumnCountMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("record {index}: {message}")]
    Malformed { index: usize, message: String },
}
