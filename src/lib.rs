#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Crate layout
//!
//! - [`record`] — Core MARC record structures (`Record`, `Field`,
//!   `Subfield`)
//! - [`leader`] — MARC record leader (24-byte header)
//! - [`writer`] — Serializing records to ISO 2709 binary format
//! - [`check_digit`] — Sierra record-number check digits
//! - [`mapper`] — Mapping relational row sets onto records
//! - [`deleted`] — Placeholder records for expunged records
//! - [`source`] — The data-source contract and an in-memory implementation
//! - [`sierra`] — Sierra Postgres implementation of the contract
//! - [`export`] — The chunked export pipeline
//! - [`error`] — Error types and result type
//!
//! # Quick start
//!
//! Build and serialize a record by hand:
//!
//! ```
//! use sierra_export::{DataField, Field, MarcWriter, Record};
//!
//! # fn main() -> sierra_export::Result<()> {
//! let mut record = Record::new();
//! record.append_field(Field::control("001", "12345")?);
//!
//! let mut title = DataField::new("245", '1', '0')?;
//! title.add_subfield('a', "Test title");
//! record.append_field(title.into());
//!
//! let mut buffer = Vec::new();
//! MarcWriter::new(&mut buffer).write_record(&record)?;
//! assert_eq!(&buffer[0..5], b"00071");
//! # Ok(())
//! # }
//! ```
//!
//! Run an export against an in-memory source:
//!
//! ```no_run
//! use sierra_export::{ExportOptions, Exporter, LogProgress, MemorySource};
//!
//! # fn main() -> sierra_export::Result<()> {
//! let mut source = MemorySource::new();
//! let exporter = Exporter::new(ExportOptions::default());
//! let summary = exporter.export_all_active(&mut source, &mut LogProgress)?;
//! println!("{} records written", summary.written);
//! # Ok(())
//! # }
//! ```

pub mod check_digit;
pub mod deleted;
pub mod error;
pub mod export;
pub mod leader;
pub mod mapper;
pub mod record;
pub mod sierra;
pub mod source;
pub mod writer;

pub use check_digit::{check_digit, full_record_id};
pub use deleted::deleted_record;
pub use error::{ExportError, Result};
pub use export::{
    ExportOptions, ExportSummary, Exporter, LogProgress, ProgressObserver, DEFAULT_BATCH_SIZE,
};
pub use leader::Leader;
pub use mapper::{BibMapper, MappedBib, MissingTagPolicy};
pub use record::{ControlField, DataField, Field, Record, Subfield};
pub use sierra::{PgConfig, SierraSource};
pub use source::{
    BibCodes, DataSource, ItemRow, LeaderCodes, MemorySource, RecordPointer, VarfieldRow,
};
pub use writer::{encode_record, MarcWriter};
