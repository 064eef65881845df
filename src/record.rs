//! Trial data record.
//!
//! The record is an insertion-ordered store of scalar values keyed by
//! structured [`FieldKey`]s. Response rounds and advisor blocks live under
//! their own key variants so they cannot collide; the flat column names used
//! in exported rows are only produced by [`DataRecord::to_table`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Field Names
// ============================================================================

/// Wall time at which the trial began.
pub const TIMESTAMP_START: &str = "timestampStart";
/// Stimulus onset.
pub const TIME_STIM_ON: &str = "timeStimOn";
/// Stimulus offset.
pub const TIME_STIM_OFF: &str = "timeStimOff";
/// First response requested.
pub const TIME_RESPONSE_OPEN: &str = "timeResponseOpen";
/// First response resolved (or timed out).
pub const TIME_RESPONSE_CLOSE: &str = "timeResponseClose";
/// Feedback callback started.
pub const TIME_FEEDBACK_ON: &str = "timeFeedbackOn";
/// Feedback callback resolved.
pub const TIME_FEEDBACK_OFF: &str = "timeFeedbackOff";
/// Trial end.
pub const TIME_END: &str = "timeEnd";
/// Final response requested.
pub const TIME_RESPONSE_OPEN_FINAL: &str = "timeResponseOpenFinal";
/// Final response resolved (or timed out).
pub const TIME_RESPONSE_CLOSE_FINAL: &str = "timeResponseCloseFinal";
/// Evaluated correct answer.
pub const CORRECT_ANSWER: &str = "correctAnswer";
/// Stimulus content echo.
pub const STIMULUS: &str = "stimulus";
/// Trial number within the session.
pub const NUMBER: &str = "number";
/// Attention-check flag (0 or 1).
pub const IS_ATTENTION_CHECK: &str = "isAttentionCheck";

// ============================================================================
// Scalars
// ============================================================================

/// A single recorded value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
}

impl Scalar {
    /// Returns `true` for [`Scalar::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer value, if this is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Shifts a numeric value so it is relative to `origin`.
    ///
    /// Non-numeric values are returned unchanged.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn relative_to(&self, origin: i64) -> Self {
        match self {
            Self::Int(v) => Self::Int(v.saturating_sub(origin)),
            Self::Float(v) => Self::Float(v - origin as f64),
            other => other.clone(),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(Self::Null, Self::Int)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Flat, ordered mapping of column name to value.
pub type Row = IndexMap<String, Scalar>;

// ============================================================================
// Keys
// ============================================================================

/// Which response round a response field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseRound {
    /// Initial response
    First,
    /// Response given after advice
    Final,
}

impl ResponseRound {
    /// Suffix appended to exported column names of this round.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::First => "",
            Self::Final => "Final",
        }
    }
}

/// Structured record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Field owned by the trial itself (timestamps, configuration echoes)
    Trial(String),
    /// Field reported by the response collector
    Response {
        /// Round the response was given in
        round: ResponseRound,
        /// Field name as reported by the collector
        name: String,
    },
    /// Index marker opening an advisor block
    AdvisorMarker(usize),
    /// Field reported by an advisor (table or advice)
    Advisor {
        /// Position in the advisor list
        index: usize,
        /// Field name as reported by the advisor
        name: String,
    },
}

impl FieldKey {
    /// Trial-level key.
    pub fn trial(name: impl Into<String>) -> Self {
        Self::Trial(name.into())
    }

    /// Response key for `round`.
    pub fn response(round: ResponseRound, name: impl Into<String>) -> Self {
        Self::Response {
            round,
            name: name.into(),
        }
    }

    /// Advisor field key.
    pub fn advisor(index: usize, name: impl Into<String>) -> Self {
        Self::Advisor {
            index,
            name: name.into(),
        }
    }

    /// Flat column name used in exported rows.
    #[must_use]
    pub fn column_name(&self) -> String {
        match self {
            Self::Trial(name) => name.clone(),
            Self::Response { round, name } => {
                format!("response{}{}", capitalize(name), round.suffix())
            }
            Self::AdvisorMarker(index) => format!("advisor{index}"),
            Self::Advisor { index, name } => format!("advisor{index}{name}"),
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.column_name())
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Returns `true` if a collector field holds a timestamp.
#[must_use]
pub fn is_time_field(name: &str) -> bool {
    name.contains("time")
}

// ============================================================================
// Record
// ============================================================================

/// Per-trial accumulating record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRecord {
    fields: IndexMap<FieldKey, Scalar>,
}

impl DataRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds trial fields with a null value, keeping any value already set.
    pub fn seed<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.fields
                .entry(FieldKey::trial(name))
                .or_insert(Scalar::Null);
        }
    }

    /// Sets a value. Existing keys keep their position.
    pub fn set(&mut self, key: FieldKey, value: impl Into<Scalar>) {
        self.fields.insert(key, value.into());
    }

    /// Sets a trial-level field.
    pub fn set_trial(&mut self, name: &str, value: impl Into<Scalar>) {
        self.set(FieldKey::trial(name), value);
    }

    /// Records the trial start timestamp.
    ///
    /// Returns `false` without changing anything if the start was already set.
    pub fn set_start(&mut self, timestamp: i64) -> bool {
        if self.timestamp_start().is_some() {
            return false;
        }
        self.set_trial(TIMESTAMP_START, timestamp);
        true
    }

    /// The recorded start timestamp, if any.
    #[must_use]
    pub fn timestamp_start(&self) -> Option<i64> {
        self.get(&FieldKey::trial(TIMESTAMP_START))
            .and_then(Scalar::as_i64)
    }

    /// Looks up a value by structured key.
    #[must_use]
    pub fn get(&self, key: &FieldKey) -> Option<&Scalar> {
        self.fields.get(key)
    }

    /// Looks up a value by exported column name.
    #[must_use]
    pub fn get_column(&self, column: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .rev()
            .find(|(key, _)| key.column_name() == column)
            .map(|(_, value)| value)
    }

    /// Merges collector output for a response round.
    ///
    /// Numeric values of fields whose name contains `time` are stored relative
    /// to `origin`.
    pub fn merge_response(&mut self, round: ResponseRound, response: &Row, origin: i64) {
        for (name, value) in response {
            let value = if is_time_field(name) {
                value.relative_to(origin)
            } else {
                value.clone()
            };
            self.set(FieldKey::response(round, name.as_str()), value);
        }
    }

    /// Merges an advisor's fields under its index.
    pub fn merge_advisor(&mut self, index: usize, fields: &Row) {
        for (name, value) in fields {
            self.set(FieldKey::advisor(index, name.as_str()), value.clone());
        }
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &Scalar)> {
        self.fields.iter()
    }

    /// Number of stored fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Exported column names in insertion order.
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = Vec::with_capacity(self.fields.len());
        for key in self.fields.keys() {
            let column = key.column_name();
            if !headers.contains(&column) {
                headers.push(column);
            }
        }
        headers
    }

    /// Flattens the record into a row.
    ///
    /// With `columns = None` every recorded column is exported in insertion
    /// order. Requested columns that were never recorded are exported as null.
    #[must_use]
    pub fn to_table<C: AsRef<str>>(&self, columns: Option<&[C]>) -> Row {
        let flat: Row = self
            .fields
            .iter()
            .map(|(key, value)| (key.column_name(), value.clone()))
            .collect();

        match columns {
            None => flat,
            Some(columns) => columns
                .iter()
                .map(|column| {
                    let column = column.as_ref();
                    let value = flat.get(column).cloned().unwrap_or_default();
                    (column.to_owned(), value)
                })
                .collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
