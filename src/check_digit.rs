//! Check digit computation for Sierra record numbers.
//!
//! Sierra identifies records by a numeric record number whose public display
//! form carries a weighted modulo-11 check digit: digits are processed
//! right-to-left with a multiplier starting at 2 and incrementing per digit,
//! the products are summed, and the sum modulo 11 becomes the check
//! character (`x` when the remainder is 10).

use crate::error::{ExportError, Result};

/// Compute the check digit for a numeric record number.
///
/// # Examples
///
/// ```
/// use sierra_export::check_digit::check_digit;
///
/// assert_eq!(check_digit("1234567").unwrap(), '2');
/// ```
///
/// # Errors
///
/// Returns [`ExportError::InvalidRecordNumber`] if the input is empty or
/// contains anything other than ASCII digits. Non-digit input is never
/// coerced.
pub fn check_digit(record_num: &str) -> Result<char> {
    if record_num.is_empty() || !record_num.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExportError::InvalidRecordNumber(record_num.to_string()));
    }

    let sum: u32 = record_num
        .bytes()
        .rev()
        .zip(2u32..)
        .map(|(digit, multiplier)| u32::from(digit - b'0') * multiplier)
        .sum();

    Ok(match sum % 11 {
        10 => 'x',
        remainder => {
            // remainder < 10, so this is always a single ASCII digit
            char::from(b'0' + u8::try_from(remainder).unwrap_or(0))
        }
    })
}

/// Build the full public identifier for a bibliographic record number:
/// the `b` record-type prefix, the raw number, and its check digit.
///
/// # Examples
///
/// ```
/// use sierra_export::check_digit::full_record_id;
///
/// assert_eq!(full_record_id("1234567").unwrap(), "b12345672");
/// ```
///
/// # Errors
///
/// Returns [`ExportError::InvalidRecordNumber`] if the record number is not
/// a string of ASCII digits.
pub fn full_record_id(record_num: &str) -> Result<String> {
    let digit = check_digit(record_num)?;
    Ok(format!("b{record_num}{digit}"))
}
