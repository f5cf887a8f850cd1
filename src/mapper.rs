//! Mapping relational row sets onto MARC records.
//!
//! [`BibMapper`] turns the flat rows returned by
//! [`DataSource::fields_for`](crate::source::DataSource::fields_for) (plus
//! the auxiliary location and item row sets) into a structurally valid
//! [`Record`]:
//!
//! 1. The leader is built from the first row's metadata codes.
//! 2. A 907 field carrying the full public identifier (with check digit)
//!    and a 998 field carrying cataloging date and classification codes are
//!    appended before any source-derived field. Source rows arriving with
//!    those tags are filtered out; the synthetic fields own them.
//! 3. Source rows are dispatched by numeric tag: below 010 become control
//!    fields with verbatim content, 010 and above become data fields whose
//!    pipe-delimited content is split into subfields.
//! 4. Held locations append one extra 907 field ($b per location); item
//!    rows append one 945 field ($l) each.
//!
//! A failure to build one field is logged and that field is skipped; the
//! record as a whole is still produced.

use crate::check_digit::full_record_id;
use crate::error::Result;
use crate::leader::Leader;
use crate::record::{DataField, Field, Record};
use crate::source::{ItemRow, LeaderCodes, VarfieldRow};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tags owned by the synthetic fields; source rows carrying them are
/// dropped so raw data can never overwrite the injected values.
const RESERVED_TAGS: [&str; 2] = ["907", "998"];

/// What to do with a source row whose tag column is null or empty.
///
/// The source system emits untagged vendor fields; one revision of the
/// original exporter folded them into a synthetic 999 data field, a later
/// one dropped them. Both behaviors are available; dropping is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingTagPolicy {
    /// Drop the row with a warning.
    #[default]
    Skip,
    /// Treat the row as a 999 data field.
    Synthesize999,
}

/// Outcome of mapping one record.
#[derive(Debug, Clone)]
pub struct MappedBib {
    /// The assembled record.
    pub record: Record,
    /// Source rows that could not be turned into fields and were dropped.
    pub dropped_fields: usize,
}

/// Builds MARC records from relational row sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct BibMapper {
    policy: MissingTagPolicy,
}

impl BibMapper {
    /// Mapper with the default missing-tag policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapper with an explicit missing-tag policy.
    #[must_use]
    pub fn with_policy(policy: MissingTagPolicy) -> Self {
        BibMapper { policy }
    }

    /// Map one record's row sets onto a [`Record`].
    ///
    /// Returns `Ok(None)` when the row set is empty (the record is missing
    /// or inaccessible).
    ///
    /// # Errors
    ///
    /// Returns an error only for record-level failures (an invalid record
    /// number); per-field failures are logged, counted in
    /// [`MappedBib::dropped_fields`], and skipped.
    pub fn map(
        &self,
        record_num: &str,
        rows: &[VarfieldRow],
        locations: &[String],
        items: &[ItemRow],
    ) -> Result<Option<MappedBib>> {
        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let mut record = Record::with_leader(leader_from_codes(&first.leader));
        let mut dropped = 0usize;

        // Synthetic fields first; appended before anything source-derived.
        let mut bib_id = DataField::new("907", ' ', ' ')?;
        bib_id.add_subfield('a', &full_record_id(record_num)?);
        record.append_field(bib_id.into());

        let mut codes = DataField::new("998", ' ', ' ')?;
        codes.add_subfield('c', first.bib.cataloging_date.as_deref().unwrap_or(""));
        codes.add_subfield('d', first.bib.bcode1.as_deref().unwrap_or(""));
        codes.add_subfield('e', first.bib.bcode2.as_deref().unwrap_or(""));
        codes.add_subfield('f', first.bib.bcode3.as_deref().unwrap_or(""));
        record.append_field(codes.into());

        for row in rows {
            let tag = match row.marc_tag.as_deref().map(str::trim) {
                Some(tag) if !tag.is_empty() => tag,
                _ => match self.policy {
                    MissingTagPolicy::Synthesize999 => "999",
                    MissingTagPolicy::Skip => {
                        warn!(record_num, "dropping untagged variable field");
                        dropped += 1;
                        continue;
                    }
                },
            };

            if RESERVED_TAGS.contains(&tag) {
                continue;
            }

            match build_source_field(tag, row) {
                Ok(field) => record.append_field(field),
                Err(e) => {
                    warn!(record_num, tag, error = %e, "dropping malformed variable field");
                    dropped += 1;
                }
            }
        }

        if !locations.is_empty() {
            let mut held = DataField::new("907", ' ', ' ')?;
            for location in locations {
                held.add_subfield('b', location);
            }
            record.append_field(held.into());
        }

        for item in items {
            let mut item_field = DataField::new("945", ' ', ' ')?;
            item_field.add_subfield('l', item.location_code.as_deref().unwrap_or(""));
            record.append_field(item_field.into());
        }

        Ok(Some(MappedBib {
            record,
            dropped_fields: dropped,
        }))
    }
}

/// Dispatch one source row by numeric tag value.
fn build_source_field(tag: &str, row: &VarfieldRow) -> Result<Field> {
    let content = row.field_content.as_deref().unwrap_or("");

    if tag.parse::<u32>().is_ok_and(|n| n < 10) {
        return Field::control(tag, content);
    }

    let mut field = DataField::new(tag, indicator(row.ind1.as_deref()), indicator(row.ind2.as_deref()))?;
    for segment in content.split('|') {
        let mut chars = segment.chars();
        let Some(code) = chars.next() else {
            // empty leading character: dropped
            continue;
        };
        field.add_subfield(code, chars.as_str());
    }
    Ok(field.into())
}

/// First character of a source indicator column, defaulting to a space.
fn indicator(value: Option<&str>) -> char {
    value.and_then(|s| s.chars().next()).unwrap_or(' ')
}

/// Build a leader from source metadata codes, defaulting missing codes to
/// a single space.
fn leader_from_codes(codes: &LeaderCodes) -> Leader {
    Leader {
        record_status: code_char(codes.record_status.as_deref()),
        record_type: code_char(codes.record_type.as_deref()),
        bib_level: code_char(codes.bib_level.as_deref()),
        control_type: code_char(codes.control_type.as_deref()),
        char_encoding: code_char(codes.char_encoding.as_deref()),
        encoding_level: code_char(codes.encoding_level.as_deref()),
        cataloging_form: code_char(codes.cataloging_form.as_deref()),
        multipart_level: code_char(codes.multipart_level.as_deref()),
    }
}

fn code_char(value: Option<&str>) -> char {
    value.and_then(|s| s.chars().next()).unwrap_or(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BibCodes;
    use crate::writer::encode_record;

    fn row(tag: &str, content: &str) -> VarfieldRow {
        VarfieldRow {
            record_id: 420_907_986_000,
            marc_tag: Some(tag.to_string()),
            ind1: Some(" ".to_string()),
            ind2: Some(" ".to_string()),
            field_content: Some(content.to_string()),
            bib: BibCodes {
                bcode1: Some("m".to_string()),
                bcode2: Some("a".to_string()),
                bcode3: Some("-".to_string()),
                cataloging_date: Some("2019-04-01".to_string()),
            },
            leader: LeaderCodes {
                record_status: Some("c".to_string()),
                record_type: Some("a".to_string()),
                bib_level: Some("m".to_string()),
                char_encoding: Some(" ".to_string()),
                ..LeaderCodes::default()
            },
        }
    }

    #[test]
    fn test_empty_row_set_maps_to_none() {
        let mapper = BibMapper::new();
        assert!(mapper.map("1234567", &[], &[], &[]).unwrap().is_none());
    }

    #[test]
    fn test_synthetic_fields_come_first() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle")], &[], &[])
            .unwrap()
            .unwrap();

        let tags: Vec<&str> = mapped.record.fields().iter().map(Field::tag).collect();
        assert_eq!(tags, vec!["907", "998", "245"]);
    }

    #[test]
    fn test_907_carries_full_record_id() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle")], &[], &[])
            .unwrap()
            .unwrap();

        let field = mapped.record.fields()[0].as_data().unwrap();
        assert_eq!(field.get_subfield('a'), Some("b12345672"));
    }

    #[test]
    fn test_998_carries_codes_in_order() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle")], &[], &[])
            .unwrap()
            .unwrap();

        let field = mapped.record.fields()[1].as_data().unwrap();
        let pairs: Vec<(char, &str)> = field
            .subfields
            .iter()
            .map(|sf| (sf.code, sf.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ('c', "2019-04-01"),
                ('d', "m"),
                ('e', "a"),
                ('f', "-"),
            ]
        );
    }

    #[test]
    fn test_source_907_and_998_rows_filtered() {
        let mapper = BibMapper::new();
        let rows = vec![
            row("245", "aTitle"),
            row("907", "aOLD-ID"),
            row("998", "fstale"),
        ];
        let mapped = mapper.map("1234567", &rows, &[], &[]).unwrap().unwrap();

        assert_eq!(mapped.record.fields_by_tag("907").count(), 1);
        assert_eq!(mapped.record.fields_by_tag("998").count(), 1);
        assert_eq!(
            mapped.record.fields()[0].as_data().unwrap().get_subfield('a'),
            Some("b12345672")
        );
        assert_eq!(mapped.dropped_fields, 0);
    }

    #[test]
    fn test_pipe_splitting() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle|bSubtitle")], &[], &[])
            .unwrap()
            .unwrap();

        let field = mapped.record.fields()[2].as_data().unwrap();
        let pairs: Vec<(char, &str)> = field
            .subfields
            .iter()
            .map(|sf| (sf.code, sf.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![('a', "Title"), ('b', "Subtitle")]);
    }

    #[test]
    fn test_pipe_splitting_drops_empty_segments() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("245", "|bOnly")], &[], &[])
            .unwrap()
            .unwrap();

        let field = mapped.record.fields()[2].as_data().unwrap();
        assert_eq!(field.subfields.len(), 1);
        assert_eq!(field.subfields[0].code, 'b');
        assert_eq!(field.subfields[0].value, "Only");
    }

    #[test]
    fn test_subfield_content_trimmed() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle  |b  Sub ")], &[], &[])
            .unwrap()
            .unwrap();

        let field = mapped.record.fields()[2].as_data().unwrap();
        assert_eq!(field.get_subfield('a'), Some("Title"));
        assert_eq!(field.get_subfield('b'), Some("Sub"));
    }

    #[test]
    fn test_tag_dispatch_boundary() {
        let mapper = BibMapper::new();
        let rows = vec![row("008", "190401s2019"), row("010", "a2019000001")];
        let mapped = mapper.map("1234567", &rows, &[], &[]).unwrap().unwrap();

        assert!(mapped.record.fields()[2].as_control().is_some());
        assert!(mapped.record.fields()[3].as_data().is_some());
    }

    #[test]
    fn test_control_field_content_verbatim() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("008", "  190401s2019    xx ")], &[], &[])
            .unwrap()
            .unwrap();

        let field = mapped.record.fields()[2].as_control().unwrap();
        assert_eq!(field.data, "  190401s2019    xx ");
    }

    #[test]
    fn test_indicators_taken_from_row() {
        let mapper = BibMapper::new();
        let mut source_row = row("245", "aTitle");
        source_row.ind1 = Some("1".to_string());
        source_row.ind2 = None;
        let mapped = mapper.map("1234567", &[source_row], &[], &[]).unwrap().unwrap();

        let field = mapped.record.fields()[2].as_data().unwrap();
        assert_eq!(field.indicator1, '1');
        assert_eq!(field.indicator2, ' ');
    }

    #[test]
    fn test_missing_tag_skipped_by_default() {
        let mapper = BibMapper::new();
        let mut untagged = row("245", "aTitle");
        untagged.marc_tag = None;
        let mapped = mapper.map("1234567", &[untagged], &[], &[]).unwrap().unwrap();

        assert_eq!(mapped.record.fields().len(), 2);
        assert_eq!(mapped.dropped_fields, 1);
    }

    #[test]
    fn test_missing_tag_synthesized_when_configured() {
        let mapper = BibMapper::with_policy(MissingTagPolicy::Synthesize999);
        let mut untagged = row("245", "aLocal note");
        untagged.marc_tag = None;
        let mapped = mapper.map("1234567", &[untagged], &[], &[]).unwrap().unwrap();

        assert_eq!(mapped.record.fields().len(), 3);
        let field = mapped.record.fields()[2].as_data().unwrap();
        assert_eq!(field.tag, "999");
        assert_eq!(field.get_subfield('a'), Some("Local note"));
        assert_eq!(mapped.dropped_fields, 0);
    }

    #[test]
    fn test_malformed_tag_dropped_record_survives() {
        let mapper = BibMapper::new();
        let rows = vec![row("24a", "aBad"), row("245", "aGood")];
        let mapped = mapper.map("1234567", &rows, &[], &[]).unwrap().unwrap();

        assert_eq!(mapped.dropped_fields, 1);
        let tags: Vec<&str> = mapped.record.fields().iter().map(Field::tag).collect();
        assert_eq!(tags, vec!["907", "998", "245"]);
    }

    #[test]
    fn test_invalid_record_number_is_record_level_error() {
        let mapper = BibMapper::new();
        let result = mapper.map("not-digits", &[row("245", "aTitle")], &[], &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_locations_appended_as_second_907() {
        let mapper = BibMapper::new();
        let locations = vec!["main".to_string(), "branch ".to_string()];
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle")], &locations, &[])
            .unwrap()
            .unwrap();

        let tags: Vec<&str> = mapped.record.fields().iter().map(Field::tag).collect();
        assert_eq!(tags, vec!["907", "998", "245", "907"]);

        let held = mapped.record.fields()[3].as_data().unwrap();
        let values: Vec<&str> = held.subfields.iter().map(|sf| sf.value.as_str()).collect();
        assert!(held.subfields.iter().all(|sf| sf.code == 'b'));
        assert_eq!(values, vec!["main", "branch"]);
    }

    #[test]
    fn test_items_appended_as_945() {
        let mapper = BibMapper::new();
        let items = vec![
            ItemRow {
                location_code: Some(" stacks ".to_string()),
            },
            ItemRow {
                location_code: Some("ref".to_string()),
            },
        ];
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle")], &[], &items)
            .unwrap()
            .unwrap();

        let item_fields: Vec<&DataField> = mapped
            .record
            .fields_by_tag("945")
            .filter_map(Field::as_data)
            .collect();
        assert_eq!(item_fields.len(), 2);
        assert_eq!(item_fields[0].get_subfield('l'), Some("stacks"));
        assert_eq!(item_fields[1].get_subfield('l'), Some("ref"));
    }

    #[test]
    fn test_leader_codes_copied_and_defaulted() {
        let mapper = BibMapper::new();
        let mapped = mapper
            .map("1234567", &[row("245", "aTitle")], &[], &[])
            .unwrap()
            .unwrap();

        let leader = mapped.record.leader();
        assert_eq!(leader.record_status, 'c');
        assert_eq!(leader.record_type, 'a');
        assert_eq!(leader.bib_level, 'm');
        // absent codes default to a space
        assert_eq!(leader.control_type, ' ');
        assert_eq!(leader.encoding_level, ' ');
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let mapper = BibMapper::new();
        let rows = vec![row("008", "190401"), row("245", "aTitle|bSub")];
        let locations = vec!["main".to_string()];
        let items = vec![ItemRow {
            location_code: Some("stacks".to_string()),
        }];

        let first = mapper
            .map("1234567", &rows, &locations, &items)
            .unwrap()
            .unwrap();
        let second = mapper
            .map("1234567", &rows, &locations, &items)
            .unwrap()
            .unwrap();

        assert_eq!(first.record, second.record);
        assert_eq!(
            encode_record(&first.record).unwrap(),
            encode_record(&second.record).unwrap()
        );
    }
}
