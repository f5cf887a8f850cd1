//! Placeholder records for expunged bibliographic records.
//!
//! Deleted records no longer have field data in the source, but downstream
//! consumers still need to learn about the deletion. The placeholder carries
//! the record identifier twice (an 001 control field and the usual 907
//! identifier field) plus a 998 $f = "d" deletion marker.

use crate::check_digit::full_record_id;
use crate::error::Result;
use crate::leader::Leader;
use crate::record::{DataField, Field, Record};

/// Leader record-status code marking a deleted record.
const STATUS_DELETED: char = 'd';

/// Build the minimal placeholder record for an expunged record number.
///
/// The leader is the model default with the record status set to `'d'`, so
/// consumers always see a structurally complete leader.
///
/// # Examples
///
/// ```
/// use sierra_export::deleted::deleted_record;
///
/// let record = deleted_record("1234567").unwrap();
/// assert_eq!(record.fields().len(), 3);
/// ```
///
/// # Errors
///
/// Returns [`crate::ExportError::InvalidRecordNumber`] if the record number
/// is not a string of ASCII digits.
pub fn deleted_record(record_num: &str) -> Result<Record> {
    let mut record = Record::with_leader(Leader {
        record_status: STATUS_DELETED,
        ..Leader::default()
    });

    record.append_field(Field::control("001", &format!("deleted:{record_num}"))?);

    let mut bib_id = DataField::new("907", ' ', ' ')?;
    bib_id.add_subfield('a', &full_record_id(record_num)?);
    record.append_field(bib_id.into());

    let mut marker = DataField::new("998", ' ', ' ')?;
    marker.add_subfield('f', "d");
    record.append_field(marker.into());

    Ok(record)
}
