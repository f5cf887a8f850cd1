//! The chunked export pipeline.
//!
//! [`Exporter`] drives a full or incremental export: it obtains a change
//! set from the data source, partitions it into fixed-size batches, maps
//! each entry to a [`Record`] (through the bibliographic mapper, or the
//! deleted-record builder for expunged entries), serializes it, and appends
//! the bytes to the current output file.
//!
//! Two policies govern resource lifetime: output files are either one
//! growing file or one file per batch (`split_files`), and the data-source
//! connection is rotated at every batch boundary because the vendor
//! database terminates long-lived sessions after tens of thousands of
//! queries.
//!
//! Structural failures are recovered at record granularity: the record is
//! logged and skipped, the batch continues. Data-source and IO failures
//! abort the run. Each serialized record is flushed as it is written, so an
//! aborted run leaves valid MARC21 on disk.

use crate::deleted::deleted_record;
use crate::error::{ExportError, Result};
use crate::mapper::{BibMapper, MissingTagPolicy};
use crate::record::Record;
use crate::source::{DataSource, RecordPointer};
use crate::writer::MarcWriter;
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Receives one notification per processed change-set entry.
///
/// Progress is passed as explicit events so long exports are observable
/// without coupling the pipeline to an output medium.
pub trait ProgressObserver {
    /// Called after each entry has been handled (written or skipped).
    fn record_processed(&mut self, current: usize, total: usize, record_num: &str);
}

/// Observer that reports progress through the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn record_processed(&mut self, current: usize, total: usize, record_num: &str) {
        info!("fetching record '{record_num}' ({current} of {total})");
    }
}

/// Configuration for an export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory the output files are written into. Must exist and be
    /// writable.
    pub output_dir: PathBuf,
    /// Base name of the output files, without extension.
    pub file_stem: String,
    /// Write one file per batch (`<stem>-NNNN.mrc`) instead of a single
    /// growing `<stem>.mrc`.
    pub split_files: bool,
    /// Records per batch; also the per-file record count when splitting.
    pub batch_size: usize,
    /// What the mapper does with untagged source rows.
    pub missing_tag_policy: MissingTagPolicy,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            output_dir: PathBuf::from("."),
            file_stem: "export".to_string(),
            split_files: false,
            batch_size: DEFAULT_BATCH_SIZE,
            missing_tag_policy: MissingTagPolicy::default(),
        }
    }
}

/// Counters and file paths accumulated over one export run.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Records serialized and written, including deleted placeholders.
    pub written: usize,
    /// Entries skipped: missing row sets or unrecoverable structural
    /// errors.
    pub skipped: usize,
    /// Deleted placeholders among the written records.
    pub deleted: usize,
    /// Output files, in creation order.
    pub files: Vec<PathBuf>,
}

/// The export pipeline.
#[derive(Debug)]
pub struct Exporter {
    options: ExportOptions,
    mapper: BibMapper,
}

impl Exporter {
    /// Create a pipeline with the given options.
    #[must_use]
    pub fn new(options: ExportOptions) -> Self {
        let mapper = BibMapper::with_policy(options.missing_tag_policy);
        Exporter { options, mapper }
    }

    /// The pipeline's options.
    #[must_use]
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export every record modified after `since`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid destination, a data-source failure, or an IO
    /// failure on the output files.
    pub fn export_modified_since<S: DataSource>(
        &self,
        source: &mut S,
        since: DateTime<Utc>,
        progress: &mut dyn ProgressObserver,
    ) -> Result<ExportSummary> {
        let pointers = source.changed_since(since)?;
        info!(total = pointers.len(), %since, "exporting modified records");
        self.run(source, &pointers, progress)
    }

    /// Export a deletion placeholder for every record deleted after
    /// `since`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid destination, a data-source failure, or an IO
    /// failure on the output files.
    pub fn export_deleted_since<S: DataSource>(
        &self,
        source: &mut S,
        since: DateTime<Utc>,
        progress: &mut dyn ProgressObserver,
    ) -> Result<ExportSummary> {
        let pointers = source.deleted_since(since)?;
        info!(total = pointers.len(), %since, "exporting deleted records");
        self.run(source, &pointers, progress)
    }

    /// Export every non-deleted bibliographic record.
    ///
    /// # Errors
    ///
    /// Fails on an invalid destination, a data-source failure, or an IO
    /// failure on the output files.
    pub fn export_all_active<S: DataSource>(
        &self,
        source: &mut S,
        progress: &mut dyn ProgressObserver,
    ) -> Result<ExportSummary> {
        let pointers = source.all_active()?;
        info!(total = pointers.len(), "exporting all active records");
        self.run(source, &pointers, progress)
    }

    /// Export an already-resolved change set, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidDestination`] before any work if the
    /// output directory is unusable; aborts on data-source or IO failures.
    pub fn run<S: DataSource>(
        &self,
        source: &mut S,
        pointers: &[RecordPointer],
        progress: &mut dyn ProgressObserver,
    ) -> Result<ExportSummary> {
        validate_destination(&self.options.output_dir)?;

        let mut summary = ExportSummary::default();
        if pointers.is_empty() {
            info!("change set is empty, nothing to export");
            return Ok(summary);
        }

        let batch_size = self.options.batch_size.max(1);
        let total = pointers.len();
        let mut current = 0usize;

        if self.options.split_files {
            for (batch_index, batch) in pointers.chunks(batch_size).enumerate() {
                if batch_index > 0 {
                    debug!(batch = batch_index + 1, "rotating data source connection");
                    source.rotate()?;
                }

                let path = self.output_path(Some(batch_index));
                debug!(path = %path.display(), "opening output file");
                let mut out = MarcWriter::new(File::create(&path)?);
                summary.files.push(path);

                self.process_batch(
                    source,
                    batch,
                    &mut out,
                    &mut current,
                    total,
                    &mut summary,
                    progress,
                )?;
                out.finish()?;
            }
        } else {
            let path = self.output_path(None);
            debug!(path = %path.display(), "opening output file");
            let mut out = MarcWriter::new(File::create(&path)?);
            summary.files.push(path);

            for (batch_index, batch) in pointers.chunks(batch_size).enumerate() {
                if batch_index > 0 {
                    debug!(batch = batch_index + 1, "rotating data source connection");
                    source.rotate()?;
                }
                self.process_batch(
                    source,
                    batch,
                    &mut out,
                    &mut current,
                    total,
                    &mut summary,
                    progress,
                )?;
            }
            out.finish()?;
        }

        info!(
            written = summary.written,
            skipped = summary.skipped,
            deleted = summary.deleted,
            files = summary.files.len(),
            "export complete"
        );
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_batch<S: DataSource>(
        &self,
        source: &mut S,
        batch: &[RecordPointer],
        out: &mut MarcWriter<File>,
        current: &mut usize,
        total: usize,
        summary: &mut ExportSummary,
        progress: &mut dyn ProgressObserver,
    ) -> Result<()> {
        for pointer in batch {
            *current += 1;

            match self.build_record(source, pointer) {
                Ok(Some(record)) => match out.write_record(&record) {
                    Ok(()) => {
                        summary.written += 1;
                        if pointer.deleted {
                            summary.deleted += 1;
                        }
                    }
                    Err(e @ ExportError::Io(_)) => return Err(e),
                    Err(e) => {
                        error!(record_num = %pointer.record_num, error = %e,
                            "skipping unserializable record");
                        summary.skipped += 1;
                    }
                },
                Ok(None) => {
                    warn!(record_num = %pointer.record_num,
                        "record not found in source, skipping");
                    summary.skipped += 1;
                }
                Err(e @ (ExportError::DataSource(_) | ExportError::Io(_))) => return Err(e),
                Err(e) => {
                    error!(record_num = %pointer.record_num, error = %e,
                        "skipping malformed record");
                    summary.skipped += 1;
                }
            }

            progress.record_processed(*current, total, &pointer.record_num);
        }
        Ok(())
    }

    /// Build the record for one change-set entry.
    fn build_record<S: DataSource>(
        &self,
        source: &mut S,
        pointer: &RecordPointer,
    ) -> Result<Option<Record>> {
        if pointer.deleted {
            return deleted_record(&pointer.record_num).map(Some);
        }

        let rows = source.fields_for(&pointer.record_num)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let locations = source.locations_for(&pointer.record_num)?;
        let items = source.items_for(&pointer.record_num)?;

        Ok(self
            .mapper
            .map(&pointer.record_num, &rows, &locations, &items)?
            .map(|mapped| mapped.record))
    }

    /// Output file path for a batch; `None` names the single growing file.
    fn output_path(&self, batch_index: Option<usize>) -> PathBuf {
        let name = match batch_index {
            Some(index) => format!("{}-{:04}.mrc", self.options.file_stem, index + 1),
            None => format!("{}.mrc", self.options.file_stem),
        };
        self.options.output_dir.join(name)
    }
}

/// Check the output directory before any work begins.
fn validate_destination(dir: &Path) -> Result<()> {
    let metadata = fs::metadata(dir).map_err(|e| {
        ExportError::InvalidDestination(format!("{}: {e}", dir.display()))
    })?;
    if !metadata.is_dir() {
        return Err(ExportError::InvalidDestination(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    if metadata.permissions().readonly() {
        return Err(ExportError::InvalidDestination(format!(
            "{} is not writable",
            dir.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ExportOptions::default();
        assert_eq!(options.batch_size, 50_000);
        assert!(!options.split_files);
        assert_eq!(options.file_stem, "export");
        assert_eq!(options.missing_tag_policy, MissingTagPolicy::Skip);
    }

    #[test]
    fn test_output_path_naming() {
        let exporter = Exporter::new(ExportOptions {
            output_dir: PathBuf::from("/tmp/out"),
            ..ExportOptions::default()
        });

        assert_eq!(
            exporter.output_path(None),
            PathBuf::from("/tmp/out/export.mrc")
        );
        assert_eq!(
            exporter.output_path(Some(0)),
            PathBuf::from("/tmp/out/export-0001.mrc")
        );
        assert_eq!(
            exporter.output_path(Some(11)),
            PathBuf::from("/tmp/out/export-0012.mrc")
        );
    }

    #[test]
    fn test_validate_destination_missing_dir() {
        let result = validate_destination(Path::new("/nonexistent/sierra-out"));
        assert!(matches!(result, Err(ExportError::InvalidDestination(_))));
    }

    #[test]
    fn test_validate_destination_rejects_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = validate_destination(file.path());
        assert!(matches!(result, Err(ExportError::InvalidDestination(_))));
    }

    #[test]
    fn test_validate_destination_accepts_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_destination(dir.path()).is_ok());
    }
}
