//! The data-source contract the export pipeline depends on.
//!
//! The relational side of the system (connection setup, authentication,
//! transport) lives behind the [`DataSource`] trait: run a parametrized
//! query, get back rows as plain structs. [`crate::sierra::SierraSource`]
//! implements it against a Sierra Postgres database; [`MemorySource`] is an
//! in-memory implementation for tests and demos.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of a change set: a record identifier with its modification
/// and deletion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPointer {
    /// The public record number (digits only, no prefix or check digit).
    pub record_num: String,
    /// Last modification time, when the source reports one.
    pub last_updated: Option<DateTime<Utc>>,
    /// Whether the record has been expunged from the source.
    pub deleted: bool,
}

impl RecordPointer {
    /// Pointer to an active record.
    #[must_use]
    pub fn active(record_num: &str) -> Self {
        RecordPointer {
            record_num: record_num.to_string(),
            last_updated: None,
            deleted: false,
        }
    }

    /// Pointer to a deleted record.
    #[must_use]
    pub fn deleted(record_num: &str) -> Self {
        RecordPointer {
            record_num: record_num.to_string(),
            last_updated: None,
            deleted: true,
        }
    }
}

/// Leader metadata codes carried on every variable-field row.
///
/// Each code is `None` (or empty) when the source column is null; the
/// mapper renders those as a single space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderCodes {
    /// Record status code (leader position 5).
    pub record_status: Option<String>,
    /// Record type code (leader position 6).
    pub record_type: Option<String>,
    /// Bibliographic level code (leader position 7).
    pub bib_level: Option<String>,
    /// Control type code (leader position 8).
    pub control_type: Option<String>,
    /// Character encoding scheme code (leader position 9).
    pub char_encoding: Option<String>,
    /// Encoding level code (leader position 17).
    pub encoding_level: Option<String>,
    /// Descriptive cataloging form code (leader position 18).
    pub cataloging_form: Option<String>,
    /// Multipart resource level code (leader position 19).
    pub multipart_level: Option<String>,
}

/// Bibliographic classification codes carried on every variable-field row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibCodes {
    /// Classification code 1.
    pub bcode1: Option<String>,
    /// Classification code 2.
    pub bcode2: Option<String>,
    /// Classification code 3.
    pub bcode3: Option<String>,
    /// Cataloging date, rendered as text.
    pub cataloging_date: Option<String>,
}

/// One (leader metadata × variable field) row for a bibliographic record.
///
/// All rows for one record carry identical leader and bib code values; rows
/// arrive ordered by tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarfieldRow {
    /// The source system's internal numeric record id.
    pub record_id: i64,
    /// MARC tag; `None` for untagged vendor fields.
    pub marc_tag: Option<String>,
    /// First indicator; `None`/empty defaults to a space.
    pub ind1: Option<String>,
    /// Second indicator; `None`/empty defaults to a space.
    pub ind2: Option<String>,
    /// Pipe-delimited field content.
    pub field_content: Option<String>,
    /// Classification codes (identical across the record's rows).
    pub bib: BibCodes,
    /// Leader metadata codes (identical across the record's rows).
    pub leader: LeaderCodes,
}

/// One linked item/holdings row for a bibliographic record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    /// The item's location code.
    pub location_code: Option<String>,
}

/// Read-only query access to the bibliographic data source.
///
/// Implementations are blocking request/response: the pipeline tolerates
/// query latency serially. The pipeline owns the handle and is the only
/// component allowed to call [`rotate`](DataSource::rotate), which it does
/// at batch boundaries to bound connection lifetime.
pub trait DataSource {
    /// Change set of bibliographic records modified after `since`,
    /// newest first. Entries may include deleted records.
    fn changed_since(&mut self, since: DateTime<Utc>) -> Result<Vec<RecordPointer>>;

    /// Change set restricted to records deleted after `since`, newest first.
    fn deleted_since(&mut self, since: DateTime<Utc>) -> Result<Vec<RecordPointer>>;

    /// Every non-deleted bibliographic record.
    fn all_active(&mut self) -> Result<Vec<RecordPointer>>;

    /// All variable-field rows for one record, ordered by tag. Empty when
    /// the record is missing or inaccessible.
    fn fields_for(&mut self, record_num: &str) -> Result<Vec<VarfieldRow>>;

    /// Location codes held by one record.
    fn locations_for(&mut self, record_num: &str) -> Result<Vec<String>>;

    /// Linked item rows for one record.
    fn items_for(&mut self, record_num: &str) -> Result<Vec<ItemRow>>;

    /// Release and reacquire the underlying connection.
    ///
    /// Sources without a connection to cycle may leave this as the default
    /// no-op.
    fn rotate(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Everything the source knows about one in-memory bibliographic record.
#[derive(Debug, Clone, Default)]
struct MemoryBib {
    rows: Vec<VarfieldRow>,
    locations: Vec<String>,
    items: Vec<ItemRow>,
}

/// In-memory [`DataSource`] for tests and demos.
///
/// Records are registered with [`add_record`](MemorySource::add_record);
/// the pointer list is returned by the change-set queries filtered the same
/// way the real source filters them.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pointers: Vec<RecordPointer>,
    bibs: HashMap<String, MemoryBib>,
    rotations: usize,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record with its variable-field rows and auxiliary data.
    pub fn add_record(
        &mut self,
        pointer: RecordPointer,
        rows: Vec<VarfieldRow>,
        locations: Vec<String>,
        items: Vec<ItemRow>,
    ) {
        self.bibs.insert(
            pointer.record_num.clone(),
            MemoryBib {
                rows,
                locations,
                items,
            },
        );
        self.pointers.push(pointer);
    }

    /// Register a pointer with no backing field data (a missing record).
    pub fn add_pointer(&mut self, pointer: RecordPointer) {
        self.pointers.push(pointer);
    }

    /// Number of times [`rotate`](DataSource::rotate) has been called.
    #[must_use]
    pub fn rotations(&self) -> usize {
        self.rotations
    }

    fn sorted_newest_first(mut pointers: Vec<RecordPointer>) -> Vec<RecordPointer> {
        pointers.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        pointers
    }
}

impl DataSource for MemorySource {
    fn changed_since(&mut self, since: DateTime<Utc>) -> Result<Vec<RecordPointer>> {
        let hits = self
            .pointers
            .iter()
            .filter(|p| p.last_updated.is_some_and(|ts| ts > since))
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(hits))
    }

    fn deleted_since(&mut self, since: DateTime<Utc>) -> Result<Vec<RecordPointer>> {
        let hits = self
            .pointers
            .iter()
            .filter(|p| p.deleted && p.last_updated.is_some_and(|ts| ts > since))
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(hits))
    }

    fn all_active(&mut self) -> Result<Vec<RecordPointer>> {
        Ok(self
            .pointers
            .iter()
            .filter(|p| !p.deleted)
            .cloned()
            .collect())
    }

    fn fields_for(&mut self, record_num: &str) -> Result<Vec<VarfieldRow>> {
        Ok(self
            .bibs
            .get(record_num)
            .map(|bib| bib.rows.clone())
            .unwrap_or_default())
    }

    fn locations_for(&mut self, record_num: &str) -> Result<Vec<String>> {
        Ok(self
            .bibs
            .get(record_num)
            .map(|bib| bib.locations.clone())
            .unwrap_or_default())
    }

    fn items_for(&mut self, record_num: &str) -> Result<Vec<ItemRow>> {
        Ok(self
            .bibs
            .get(record_num)
            .map(|bib| bib.items.clone())
            .unwrap_or_default())
    }

    fn rotate(&mut self) -> Result<()> {
        self.rotations += 1;
        Ok(())
    }
}
