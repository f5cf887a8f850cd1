//! MARC bibliographic record structures.
//!
//! This module provides the core record types:
//! - [`Record`] — leader plus an insertion-ordered field list
//! - [`Field`] — a variable field, either control (tags below "010") or data
//! - [`Subfield`] — coded data elements within a data field
//!
//! Field order is semantically meaningful: the serialized directory and
//! variable-field block follow the order in which fields were appended, so
//! records are built in final output order.
//!
//! # Examples
//!
//! ```
//! use sierra_export::{DataField, Field, Record};
//!
//! let mut record = Record::new();
//! record.append_field(Field::control("001", "12345").unwrap());
//!
//! let mut title = DataField::new("245", '1', '0').unwrap();
//! title.add_subfield('a', "Test title");
//! record.append_field(title.into());
//!
//! assert_eq!(record.fields().len(), 2);
//! ```

use crate::error::{ExportError, Result};
use crate::leader::Leader;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The first data-field tag; everything below it is a control field.
const FIRST_DATA_TAG: &str = "010";

/// A subfield within a data field.
///
/// Values are trimmed of leading and trailing whitespace at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character).
    pub code: char,
    /// Subfield value.
    pub value: String,
}

impl Subfield {
    /// Create a subfield, trimming the value.
    pub fn new(code: char, value: &str) -> Self {
        Subfield {
            code,
            value: value.trim().to_string(),
        }
    }
}

/// A control field (tags "001"-"009"): raw content, no indicators, no
/// subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlField {
    /// Field tag (3 digits, below "010").
    pub tag: String,
    /// Raw field content.
    pub data: String,
}

impl ControlField {
    /// Create a control field.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidField`] if the tag is not a 3-character
    /// numeric string below "010".
    pub fn new(tag: &str, data: &str) -> Result<Self> {
        validate_tag(tag)?;
        if !is_control_tag(tag) {
            return Err(ExportError::InvalidField(format!(
                "tag '{tag}' is not a control field tag"
            )));
        }
        Ok(ControlField {
            tag: tag.to_string(),
            data: data.to_string(),
        })
    }
}

/// A data field (tags "010"-"999"): two indicators and an ordered sequence
/// of subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    /// Field tag (3 digits, "010" or above).
    pub tag: String,
    /// First indicator.
    pub indicator1: char,
    /// Second indicator.
    pub indicator2: char,
    /// Subfields, in output order.
    pub subfields: SmallVec<[Subfield; 4]>,
}

impl DataField {
    /// Create a data field with the given indicators.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidField`] if the tag is not a 3-character
    /// numeric string of "010" or above.
    pub fn new(tag: &str, indicator1: char, indicator2: char) -> Result<Self> {
        validate_tag(tag)?;
        if is_control_tag(tag) {
            return Err(ExportError::InvalidField(format!(
                "tag '{tag}' is below '{FIRST_DATA_TAG}' and must be a control field"
            )));
        }
        Ok(DataField {
            tag: tag.to_string(),
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        })
    }

    /// Append a subfield, trimming its value.
    pub fn add_subfield(&mut self, code: char, value: &str) {
        self.subfields.push(Subfield::new(code, value));
    }

    /// Get the first subfield value with a given code.
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }
}

/// A variable field: either a control field or a data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    /// Control field (tag below "010").
    Control(ControlField),
    /// Data field (tag "010" or above).
    Data(DataField),
}

impl Field {
    /// Create a control field.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidField`] for a malformed or non-control
    /// tag.
    pub fn control(tag: &str, data: &str) -> Result<Self> {
        Ok(Field::Control(ControlField::new(tag, data)?))
    }

    /// Create an empty data field.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidField`] for a malformed or control-range
    /// tag.
    pub fn data(tag: &str, indicator1: char, indicator2: char) -> Result<Self> {
        Ok(Field::Data(DataField::new(tag, indicator1, indicator2)?))
    }

    /// The field's tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Field::Control(cf) => &cf.tag,
            Field::Data(df) => &df.tag,
        }
    }

    /// The data field, if this is one.
    #[must_use]
    pub fn as_data(&self) -> Option<&DataField> {
        match self {
            Field::Data(df) => Some(df),
            Field::Control(_) => None,
        }
    }

    /// The control field, if this is one.
    #[must_use]
    pub fn as_control(&self) -> Option<&ControlField> {
        match self {
            Field::Control(cf) => Some(cf),
            Field::Data(_) => None,
        }
    }
}

impl From<ControlField> for Field {
    fn from(cf: ControlField) -> Self {
        Field::Control(cf)
    }
}

impl From<DataField> for Field {
    fn from(df: DataField) -> Self {
        Field::Data(df)
    }
}

/// A MARC bibliographic record: one leader and an insertion-ordered field
/// list.
///
/// A record is constructed fresh per identifier, fully populated in one
/// pass, serialized, and discarded. It is not shared across threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    leader: Leader,
    fields: Vec<Field>,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// Create an empty record with the default leader.
    #[must_use]
    pub fn new() -> Self {
        Record {
            leader: Leader::default(),
            fields: Vec::new(),
        }
    }

    /// Create an empty record with the given leader.
    #[must_use]
    pub fn with_leader(leader: Leader) -> Self {
        Record {
            leader,
            fields: Vec::new(),
        }
    }

    /// Replace the record's leader.
    pub fn set_leader(&mut self, leader: Leader) {
        self.leader = leader;
    }

    /// Replace the record's leader from a raw 24-character string.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidLeader`] if the string is not exactly
    /// 24 characters.
    pub fn set_leader_str(&mut self, s: &str) -> Result<()> {
        self.leader = Leader::parse(s)?;
        Ok(())
    }

    /// The record's leader.
    #[must_use]
    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    /// Append a field in final output order.
    pub fn append_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// All fields, in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Iterate over fields with a given tag, in insertion order.
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.tag() == tag)
    }
}

/// Check that a tag is a 3-character ASCII-digit string.
fn validate_tag(tag: &str) -> Result<()> {
    if tag.len() == 3 && tag.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ExportError::InvalidField(format!(
            "tag '{tag}' is not a 3-character numeric tag"
        )))
    }
}

/// Whether a (validated) tag is in the control field range.
fn is_control_tag(tag: &str) -> bool {
    tag < FIRST_DATA_TAG
}
