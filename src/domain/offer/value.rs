use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use thiserror::Error;

/// Scalars are kept at the precision the cluster manager uses for its own accounting.
const SCALAR_PRECISION: f64 = 1000.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("Cannot compare quantities of different types: {left} vs {right}")]
    TypeMismatch { left: ValueType, right: ValueType },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Scalar,
    Ranges,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar => write!(f, "SCALAR"),
            ValueType::Ranges => write!(f, "RANGES"),
        }
    }
}

/// Closed integer interval `[begin, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

impl Range {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin: begin.min(end), end: begin.max(end) }
    }

    pub fn single(value: u64) -> Self {
        Self { begin: value, end: value }
    }

    pub fn contains(&self, value: u64) -> bool {
        self.begin <= value && value <= self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// A typed quantity of one resource.
///
/// `Ranges` are always canonical: sorted, disjoint and with adjacent intervals merged, so two values
/// describing the same set compare equal regardless of how they were written down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawValue", into = "RawValue")]
pub enum Value {
    Scalar(f64),
    Ranges(Vec<Range>),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawValue {
    Scalar(f64),
    Ranges(Vec<Range>),
}

impl From<RawValue> for Value {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Scalar(scalar) => Value::scalar(scalar),
            RawValue::Ranges(ranges) => Value::ranges(ranges),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Scalar(scalar) => RawValue::Scalar(scalar),
            Value::Ranges(ranges) => RawValue::Ranges(ranges),
        }
    }
}

impl Value {
    pub fn scalar(value: f64) -> Self {
        Value::Scalar(round_scalar(value))
    }

    pub fn ranges(ranges: impl IntoIterator<Item = Range>) -> Self {
        Value::Ranges(canonicalize(ranges.into_iter().collect()))
    }

    /// A single port (or any single integer) as a one-element range set.
    pub fn single_range(value: u64) -> Self {
        Value::Ranges(vec![Range::single(value)])
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Scalar(_) => ValueType::Scalar,
            Value::Ranges(_) => ValueType::Ranges,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Scalar(scalar) => *scalar <= 0.0,
            Value::Ranges(ranges) => ranges.is_empty(),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(scalar) => Some(*scalar),
            Value::Ranges(_) => None,
        }
    }

    pub fn as_ranges(&self) -> Option<&[Range]> {
        match self {
            Value::Scalar(_) => None,
            Value::Ranges(ranges) => Some(ranges),
        }
    }

    /// First integer of the first range, the way single-port values are read.
    pub fn first_port(&self) -> Option<u64> {
        self.as_ranges().and_then(|ranges| ranges.first()).map(|range| range.begin)
    }

    pub fn contains_port(&self, port: u64) -> bool {
        self.as_ranges().is_some_and(|ranges| ranges.iter().any(|range| range.contains(port)))
    }

    /// Every integer covered by a range value, in ascending order.
    pub fn ports(&self) -> Vec<u64> {
        match self {
            Value::Scalar(_) => Vec::new(),
            Value::Ranges(ranges) => ranges.iter().flat_map(|range| range.begin..=range.end).collect(),
        }
    }

    /// Orders two quantities of the same type.
    ///
    /// Range sets are `Equal` when they cover the same integers, `Less` when the left set is contained
    /// in the right one and `Greater` otherwise.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ValueError> {
        match (self, other) {
            (Value::Scalar(left), Value::Scalar(right)) => {
                let difference = round_scalar(left - right);
                Ok(if difference == 0.0 {
                    Ordering::Equal
                } else if difference < 0.0 {
                    Ordering::Less
                } else {
                    Ordering::Greater
                })
            }
            (Value::Ranges(left), Value::Ranges(right)) => {
                if left == right {
                    Ok(Ordering::Equal)
                } else if subtract_ranges(left, right).is_empty() {
                    Ok(Ordering::Less)
                } else {
                    Ok(Ordering::Greater)
                }
            }
            _ => Err(ValueError::TypeMismatch { left: self.value_type(), right: other.value_type() }),
        }
    }

    /// `desired - available <= 0`, the single gate every pool consume goes through. Quantities of
    /// different types never satisfy each other.
    pub fn is_satisfied_by(&self, available: &Value) -> bool {
        self.value_type() == available.value_type() && (self - available).is_zero()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.compare(other), Ok(Ordering::Equal))
    }
}

impl Add for &Value {
    type Output = Value;

    fn add(self, other: &Value) -> Value {
        match (self, other) {
            (Value::Scalar(left), Value::Scalar(right)) => Value::scalar(left + right),
            (Value::Ranges(left), Value::Ranges(right)) => Value::ranges(left.iter().chain(right.iter()).copied()),
            _ => panic!("Cannot add {} to {}: quantity types differ", other.value_type(), self.value_type()),
        }
    }
}

impl Sub for &Value {
    type Output = Value;

    fn sub(self, other: &Value) -> Value {
        match (self, other) {
            (Value::Scalar(left), Value::Scalar(right)) => Value::scalar((left - right).max(0.0)),
            (Value::Ranges(left), Value::Ranges(right)) => Value::Ranges(subtract_ranges(left, right)),
            _ => panic!("Cannot subtract {} from {}: quantity types differ", other.value_type(), self.value_type()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(scalar) => write!(f, "scalar: {}", scalar),
            Value::Ranges(ranges) => {
                let ranges: Vec<String> = ranges.iter().map(|range| range.to_string()).collect();
                write!(f, "ranges: [{}]", ranges.join(","))
            }
        }
    }
}

fn round_scalar(value: f64) -> f64 {
    (value * SCALAR_PRECISION).round() / SCALAR_PRECISION
}

/// Sorts and merges overlapping or adjacent intervals.
fn canonicalize(mut ranges: Vec<Range>) -> Vec<Range> {
    ranges.sort();
    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());

    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.begin <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Set difference of two canonical range lists.
fn subtract_ranges(left: &[Range], right: &[Range]) -> Vec<Range> {
    let mut result = Vec::new();

    for range in left {
        let mut pieces = vec![*range];
        for cut in right {
            pieces = pieces
                .into_iter()
                .flat_map(|piece| {
                    let mut remaining = Vec::with_capacity(2);
                    if cut.end < piece.begin || cut.begin > piece.end {
                        remaining.push(piece);
                        return remaining;
                    }
                    if cut.begin > piece.begin {
                        remaining.push(Range::new(piece.begin, cut.begin - 1));
                    }
                    if cut.end < piece.end {
                        remaining.push(Range::new(cut.end + 1, piece.end));
                    }
                    remaining
                })
                .collect();
        }
        result.extend(pieces);
    }
    canonicalize(result)
}
