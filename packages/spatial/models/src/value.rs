//! Scalar attribute values and column type inference.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Double,
    /// Free text.
    Text,
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Missing value. Renders as an empty CSV cell.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Double(f64),
    /// Text value.
    Text(String),
}

impl FieldValue {
    /// Parses a raw cell according to the column's inferred type.
    ///
    /// Blank cells become [`FieldValue::Null`]. Cells that do not parse as
    /// the column type fall back to text so no data is silently dropped.
    #[must_use]
    pub fn parse(raw: &str, field_type: FieldType) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::Null;
        }

        match field_type {
            FieldType::Integer => raw
                .parse::<i64>()
                .map_or_else(|_| Self::Text(raw.to_string()), Self::Integer),
            FieldType::Double => raw
                .parse::<f64>()
                .map_or_else(|_| Self::Text(raw.to_string()), Self::Double),
            FieldType::Text => Self::Text(raw.to_string()),
        }
    }

    /// Numeric view of the value, if it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Null | Self::Text(_) => None,
        }
    }

    /// Returns `true` for [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Total order used for grouping and joining.
    ///
    /// Nulls sort first, then numbers (integers and doubles compared by
    /// value), then text.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Null, Self::Null) => Ordering::Equal,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Integer(_) | Self::Double(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Double)
    }
}

/// [`FieldValue`] wrapper with a total order, usable as a map key.
#[derive(Debug, Clone)]
pub struct GroupKey(pub FieldValue);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Infers the narrowest column type that fits every non-blank cell.
///
/// All-blank columns are typed as text.
pub fn infer_field_type<'a>(cells: impl IntoIterator<Item = &'a str>) -> FieldType {
    let mut field_type = FieldType::Integer;
    let mut saw_value = false;

    for cell in cells {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        saw_value = true;

        if field_type == FieldType::Integer && cell.parse::<i64>().is_err() {
            field_type = FieldType::Double;
        }
        if field_type == FieldType::Double && cell.parse::<f64>().is_err() {
            return FieldType::Text;
        }
    }

    if saw_value {
        field_type
    } else {
        FieldType::Text
    }
}
