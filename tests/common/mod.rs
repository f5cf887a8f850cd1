//! Test-only ISO 2709 decoding helpers.
#![allow(dead_code)] // each test binary uses a subset of these helpers
//!
//! The library never parses MARC; these helpers exist so the integration
//! tests can verify serialized output the way a standards-compliant reader
//! would see it.

const FIELD_TERMINATOR: u8 = 0x1E;
const SUBFIELD_DELIMITER: u8 = 0x1F;
const RECORD_TERMINATOR: u8 = 0x1D;

/// A decoded variable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedField {
    Control {
        tag: String,
        data: String,
    },
    Data {
        tag: String,
        ind1: char,
        ind2: char,
        subfields: Vec<(char, String)>,
    },
}

impl DecodedField {
    pub fn tag(&self) -> &str {
        match self {
            DecodedField::Control { tag, .. } | DecodedField::Data { tag, .. } => tag,
        }
    }
}

/// A decoded MARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub leader: String,
    pub fields: Vec<DecodedField>,
}

/// Decode a single record starting at the beginning of `bytes`.
///
/// Panics on malformed input; these are tests.
pub fn decode_record(bytes: &[u8]) -> DecodedRecord {
    let leader = std::str::from_utf8(&bytes[0..24]).unwrap().to_string();
    let record_length: usize = leader[0..5].parse().unwrap();
    let base_address: usize = leader[12..17].parse().unwrap();

    assert_eq!(bytes[record_length - 1], RECORD_TERMINATOR);
    assert_eq!(bytes[base_address - 1], FIELD_TERMINATOR);

    let directory = &bytes[24..base_address - 1];
    assert_eq!(directory.len() % 12, 0);
    let data_area = &bytes[base_address..record_length - 1];

    let mut fields = Vec::new();
    for entry in directory.chunks(12) {
        let entry = std::str::from_utf8(entry).unwrap();
        let tag = &entry[0..3];
        let length: usize = entry[3..7].parse().unwrap();
        let start: usize = entry[7..12].parse().unwrap();

        let body = &data_area[start..start + length];
        assert_eq!(*body.last().unwrap(), FIELD_TERMINATOR);
        let body = &body[..body.len() - 1];

        if tag < "010" {
            fields.push(DecodedField::Control {
                tag: tag.to_string(),
                data: String::from_utf8(body.to_vec()).unwrap(),
            });
        } else {
            let ind1 = body[0] as char;
            let ind2 = body[1] as char;
            let mut subfields = Vec::new();
            for chunk in body[2..].split(|&b| b == SUBFIELD_DELIMITER) {
                if chunk.is_empty() {
                    continue;
                }
                let code = chunk[0] as char;
                let value = String::from_utf8(chunk[1..].to_vec()).unwrap();
                subfields.push((code, value));
            }
            fields.push(DecodedField::Data {
                tag: tag.to_string(),
                ind1,
                ind2,
                subfields,
            });
        }
    }

    DecodedRecord { leader, fields }
}

/// Decode a concatenation of records, the on-disk file layout.
pub fn decode_records(mut bytes: &[u8]) -> Vec<DecodedRecord> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        let record_length: usize = std::str::from_utf8(&bytes[0..5])
            .unwrap()
            .parse()
            .unwrap();
        records.push(decode_record(&bytes[..record_length]));
        bytes = &bytes[record_length..];
    }
    records
}
