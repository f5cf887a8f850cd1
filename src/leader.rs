//! MARC record leader construction.
//!
//! The MARC leader is a 24-byte fixed-length field at the start of every
//! record. Eight of its positions carry cataloging codes copied from the
//! source system; the rest are either structural constants or computed from
//! the serialized byte layout.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits, computed at serialization)
//! - Position 5: Record status
//! - Position 6: Record type
//! - Position 7: Bibliographic level
//! - Position 8: Type of control
//! - Position 9: Character coding scheme
//! - Positions 10-11: Indicator count and subfield code count (always "22")
//! - Positions 12-16: Base address of data (5 digits, computed at serialization)
//! - Position 17: Encoding level
//! - Position 18: Descriptive cataloging form
//! - Position 19: Multipart resource record level
//! - Positions 20-23: Entry map (always "4500")

use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};

/// Length of the leader in bytes.
pub const LEADER_LEN: usize = 24;

/// Maximum value representable in a 5-digit length/address slot.
pub const MAX_RECORD_LEN: usize = 99_999;

const INDICATOR_COUNT: u8 = b'2';
const SUBFIELD_CODE_COUNT: u8 = b'2';
const ENTRY_MAP: &[u8; 4] = b"4500";

/// The source-supplied positions of a MARC leader.
///
/// Record length and base address of data are deliberately absent: they are
/// a function of the serialized byte layout and are filled in by
/// [`as_bytes`](Leader::as_bytes). Every code defaults to a single space,
/// matching how missing source metadata is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record status (position 5).
    pub record_status: char,
    /// Type of record (position 6).
    pub record_type: char,
    /// Bibliographic level (position 7).
    pub bib_level: char,
    /// Type of control (position 8).
    pub control_type: char,
    /// Character coding scheme (position 9).
    pub char_encoding: char,
    /// Encoding level (position 17).
    pub encoding_level: char,
    /// Descriptive cataloging form (position 18).
    pub cataloging_form: char,
    /// Multipart resource record level (position 19).
    pub multipart_level: char,
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            record_status: ' ',
            record_type: ' ',
            bib_level: ' ',
            control_type: ' ',
            char_encoding: ' ',
            encoding_level: ' ',
            cataloging_form: ' ',
            multipart_level: ' ',
        }
    }
}

impl Leader {
    /// Parse a leader from a raw 24-character string.
    ///
    /// The computed positions (0-4, 12-16) and the structural constants are
    /// accepted verbatim and discarded; only the eight code positions are
    /// retained. Serialization always re-derives the rest.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidLeader`] if the string is not exactly
    /// 24 characters long.
    pub fn parse(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != LEADER_LEN {
            return Err(ExportError::InvalidLeader(format!(
                "Leader must be exactly {LEADER_LEN} characters, got {}",
                chars.len()
            )));
        }

        Ok(Leader {
            record_status: chars[5],
            record_type: chars[6],
            bib_level: chars[7],
            control_type: chars[8],
            char_encoding: chars[9],
            encoding_level: chars[17],
            cataloging_form: chars[18],
            multipart_level: chars[19],
        })
    }

    /// Serialize the leader to its 24-byte wire form.
    ///
    /// `record_length` and `base_address` are supplied by the serializer
    /// once the directory and variable-field block have been laid out.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::RecordTooLarge`] if either computed value
    /// exceeds its 5-digit slot, and [`ExportError::InvalidLeader`] if any
    /// code position is not a single-byte ASCII character.
    pub fn as_bytes(&self, record_length: usize, base_address: usize) -> Result<[u8; LEADER_LEN]> {
        if record_length > MAX_RECORD_LEN {
            return Err(ExportError::RecordTooLarge(format!(
                "record length {record_length} exceeds {MAX_RECORD_LEN}"
            )));
        }
        if base_address > MAX_RECORD_LEN {
            return Err(ExportError::RecordTooLarge(format!(
                "base address {base_address} exceeds {MAX_RECORD_LEN}"
            )));
        }

        let mut bytes = [0u8; LEADER_LEN];
        bytes[0..5].copy_from_slice(format!("{record_length:05}").as_bytes());
        bytes[5] = code_byte(self.record_status, 5)?;
        bytes[6] = code_byte(self.record_type, 6)?;
        bytes[7] = code_byte(self.bib_level, 7)?;
        bytes[8] = code_byte(self.control_type, 8)?;
        bytes[9] = code_byte(self.char_encoding, 9)?;
        bytes[10] = INDICATOR_COUNT;
        bytes[11] = SUBFIELD_CODE_COUNT;
        bytes[12..17].copy_from_slice(format!("{base_address:05}").as_bytes());
        bytes[17] = code_byte(self.encoding_level, 17)?;
        bytes[18] = code_byte(self.cataloging_form, 18)?;
        bytes[19] = code_byte(self.multipart_level, 19)?;
        bytes[20..24].copy_from_slice(ENTRY_MAP);

        Ok(bytes)
    }
}

/// Render a single leader code position as its wire byte.
fn code_byte(c: char, position: usize) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ExportError::InvalidLeader(format!(
            "non-ASCII code {c:?} at position {position}"
        )))
    }
}
