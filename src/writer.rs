//! Writing MARC records to ISO 2709 binary format.
//!
//! This module provides [`encode_record`] for serializing a [`Record`] to
//! its exact ISO 2709 byte sequence, and [`MarcWriter`] for appending
//! serialized records to any destination implementing [`std::io::Write`].
//!
//! Every record is written with a single `write_all` and flushed, so an
//! aborted run leaves only whole, parseable records on disk.
//!
//! # Examples
//!
//! ```
//! use sierra_export::{DataField, MarcWriter, Record};
//!
//! # fn main() -> sierra_export::Result<()> {
//! let mut record = Record::new();
//! let mut field = DataField::new("245", '1', '0')?;
//! field.add_subfield('a', "Title");
//! record.append_field(field.into());
//!
//! let mut buffer = Vec::new();
//! let mut writer = MarcWriter::new(&mut buffer);
//! writer.write_record(&record)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ExportError, Result};
use crate::leader::LEADER_LEN;
use crate::record::{Field, Record};
use std::io::Write;

const FIELD_TERMINATOR: u8 = 0x1E;
const SUBFIELD_DELIMITER: u8 = 0x1F;
const RECORD_TERMINATOR: u8 = 0x1D;

/// Width of one directory entry: 3-character tag, 4-digit length, 5-digit
/// starting position.
const DIRECTORY_ENTRY_LEN: usize = 12;

/// Maximum field body length representable in a 4-digit directory slot.
const MAX_FIELD_LEN: usize = 9_999;

/// Maximum starting position representable in a 5-digit directory slot.
const MAX_FIELD_POSITION: usize = 99_999;

/// Serialize a fully populated record to its ISO 2709 byte sequence.
///
/// Field bodies and directory entries are emitted in record field order.
/// The leader's record length and base address of data are computed from
/// the final layout.
///
/// # Errors
///
/// - [`ExportError::InvalidRecord`] if an indicator or subfield code is not
///   a single-byte ASCII character.
/// - [`ExportError::RecordTooLarge`] if a field body, field position,
///   record length, or base address overflows its fixed-width decimal slot.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut directory = Vec::with_capacity(record.fields().len() * DIRECTORY_ENTRY_LEN + 1);
    let mut data_area = Vec::new();

    for field in record.fields() {
        let start = data_area.len();

        match field {
            Field::Control(cf) => {
                data_area.extend_from_slice(cf.data.as_bytes());
                data_area.push(FIELD_TERMINATOR);
            }
            Field::Data(df) => {
                data_area.push(ascii_byte(df.indicator1, "indicator", &df.tag)?);
                data_area.push(ascii_byte(df.indicator2, "indicator", &df.tag)?);
                for subfield in &df.subfields {
                    data_area.push(SUBFIELD_DELIMITER);
                    data_area.push(ascii_byte(subfield.code, "subfield code", &df.tag)?);
                    data_area.extend_from_slice(subfield.value.as_bytes());
                }
                data_area.push(FIELD_TERMINATOR);
            }
        }

        let field_len = data_area.len() - start;
        if field_len > MAX_FIELD_LEN {
            return Err(ExportError::RecordTooLarge(format!(
                "field '{}' body is {field_len} bytes, exceeds {MAX_FIELD_LEN}",
                field.tag()
            )));
        }
        if start > MAX_FIELD_POSITION {
            return Err(ExportError::RecordTooLarge(format!(
                "field '{}' starts at {start}, exceeds {MAX_FIELD_POSITION}",
                field.tag()
            )));
        }

        directory.extend_from_slice(field.tag().as_bytes());
        directory.extend_from_slice(format!("{field_len:04}").as_bytes());
        directory.extend_from_slice(format!("{start:05}").as_bytes());
    }

    directory.push(FIELD_TERMINATOR);
    data_area.push(RECORD_TERMINATOR);

    let base_address = LEADER_LEN + directory.len();
    let record_length = base_address + data_area.len();
    let leader_bytes = record.leader().as_bytes(record_length, base_address)?;

    let mut out = Vec::with_capacity(record_length);
    out.extend_from_slice(&leader_bytes);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&data_area);
    Ok(out)
}

/// Render an indicator or subfield code as its single wire byte.
fn ascii_byte(c: char, what: &str, tag: &str) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ExportError::InvalidRecord(format!(
            "non-ASCII {what} {c:?} in field '{tag}'"
        )))
    }
}

/// Writer for ISO 2709 binary MARC output.
///
/// Serializes [`Record`] instances one at a time to any destination
/// implementing [`std::io::Write`]. The output is a plain concatenation of
/// records; no separator exists beyond each record's own terminator.
#[derive(Debug)]
pub struct MarcWriter<W: Write> {
    writer: W,
    records_written: usize,
    finished: bool,
}

impl<W: Write> MarcWriter<W> {
    /// Create a new MARC writer.
    pub fn new(writer: W) -> Self {
        MarcWriter {
            writer,
            records_written: 0,
            finished: false,
        }
    }

    /// Serialize a record, append it to the destination, and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the record fails structural validation, overflows
    /// the format's fixed-width slots, or the underlying write fails.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.finished {
            return Err(ExportError::InvalidRecord(
                "cannot write to a finished writer".to_string(),
            ));
        }

        let bytes = encode_record(record)?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the destination and mark the writer as finished.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the underlying writer fails.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataField;

    fn title_record() -> Record {
        let mut record = Record::new();
        let mut field = DataField::new("245", '1', '0').unwrap();
        field.add_subfield('a', "Test title");
        record.append_field(field.into());
        record
    }

    #[test]
    fn test_encode_simple_record_layout() {
        let bytes = encode_record(&title_record()).unwrap();

        // leader(24) + directory(12+1) + body(2 ind + 1 delim + 1 code + 10
        // data + 1 term) + record terminator = 53
        assert_eq!(bytes.len(), 53);
        assert_eq!(&bytes[0..5], b"00053");
        assert_eq!(&bytes[12..17], b"00037");
        assert_eq!(&bytes[24..27], b"245");
        assert_eq!(&bytes[27..31], b"0015");
        assert_eq!(&bytes[31..36], b"00000");
        assert_eq!(bytes[36], FIELD_TERMINATOR);
        assert_eq!(bytes[37], b'1');
        assert_eq!(bytes[38], b'0');
        assert_eq!(bytes[39], SUBFIELD_DELIMITER);
        assert_eq!(bytes[40], b'a');
        assert_eq!(*bytes.last().unwrap(), RECORD_TERMINATOR);
    }

    #[test]
    fn test_base_address_formula() {
        // base address = 24 + 12*N + 1 for N fields
        let mut record = Record::new();
        for tag in ["100", "245", "650"] {
            record.append_field(Field::data(tag, ' ', ' ').unwrap());
        }
        let bytes = encode_record(&record).unwrap();
        assert_eq!(&bytes[12..17], format!("{:05}", 24 + 12 * 3 + 1).as_bytes());
    }

    #[test]
    fn test_control_field_body_has_no_indicators() {
        let mut record = Record::new();
        record.append_field(Field::control("009", "raw").unwrap());
        let bytes = encode_record(&record).unwrap();

        // body follows directly after directory: raw content + terminator
        let base = 24 + 12 + 1;
        assert_eq!(&bytes[base..base + 3], b"raw");
        assert_eq!(bytes[base + 3], FIELD_TERMINATOR);
        assert_eq!(&bytes[24 + 3..24 + 7], b"0004");
    }

    #[test]
    fn test_data_field_blank_indicators_encoded() {
        let mut record = Record::new();
        record.append_field(Field::data("010", ' ', ' ').unwrap());
        let bytes = encode_record(&record).unwrap();

        let base = 24 + 12 + 1;
        assert_eq!(bytes[base], b' ');
        assert_eq!(bytes[base + 1], b' ');
        assert_eq!(bytes[base + 2], FIELD_TERMINATOR);
    }

    #[test]
    fn test_empty_record_still_terminated() {
        let bytes = encode_record(&Record::new()).unwrap();
        // leader + lone directory terminator + lone record terminator
        assert_eq!(bytes.len(), 26);
        assert_eq!(bytes[24], FIELD_TERMINATOR);
        assert_eq!(bytes[25], RECORD_TERMINATOR);
    }

    #[test]
    fn test_field_positions_accumulate() {
        let mut record = Record::new();
        record.append_field(Field::control("001", "12345").unwrap());
        let mut field = DataField::new("245", '1', '0').unwrap();
        field.add_subfield('a', "Title");
        record.append_field(field.into());

        let bytes = encode_record(&record).unwrap();
        // first entry starts at 0, second after the 6-byte 001 body
        assert_eq!(&bytes[31..36], b"00000");
        assert_eq!(&bytes[43..48], b"00006");
    }

    #[test]
    fn test_oversized_field_rejected() {
        let mut record = Record::new();
        let mut field = DataField::new("520", ' ', ' ').unwrap();
        field.add_subfield('a', &"x".repeat(10_000));
        record.append_field(field.into());

        assert!(matches!(
            encode_record(&record),
            Err(ExportError::RecordTooLarge(_))
        ));
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut record = Record::new();
        for _ in 0..12 {
            let mut field = DataField::new("520", ' ', ' ').unwrap();
            field.add_subfield('a', &"x".repeat(9_000));
            record.append_field(field.into());
        }

        assert!(matches!(
            encode_record(&record),
            Err(ExportError::RecordTooLarge(_))
        ));
    }

    #[test]
    fn test_non_ascii_indicator_rejected() {
        let mut record = Record::new();
        record.append_field(Field::data("245", 'é', ' ').unwrap());
        assert!(matches!(
            encode_record(&record),
            Err(ExportError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_multibyte_subfield_content_counted_in_bytes() {
        let mut record = Record::new();
        let mut field = DataField::new("245", '1', '0').unwrap();
        field.add_subfield('a', "Tïtle");
        record.append_field(field.into());

        let bytes = encode_record(&record).unwrap();
        // "Tïtle" is 6 bytes in UTF-8: 2 ind + delim + code + 6 + term = 11
        assert_eq!(&bytes[27..31], b"0011");
    }

    #[test]
    fn test_writer_counts_and_concatenates() {
        let record = title_record();
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        writer.write_record(&record).unwrap();
        writer.write_record(&record).unwrap();
        writer.finish().unwrap();

        assert_eq!(writer.records_written(), 2);
        assert_eq!(buffer.len(), 106);
        assert_eq!(buffer[52], RECORD_TERMINATOR);
        assert_eq!(&buffer[53..58], b"00053");
    }

    #[test]
    fn test_writer_rejects_after_finish() {
        let mut buffer = Vec::new();
        let mut writer = MarcWriter::new(&mut buffer);
        writer.finish().unwrap();
        assert!(writer.write_record(&title_record()).is_err());
    }
}
