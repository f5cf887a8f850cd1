//! Sierra ILS database access.
//!
//! [`SierraSource`] implements [`DataSource`] against the `sierra_view`
//! schema of a Sierra Postgres database. All queries are read-only and
//! parametrized; results come back as the plain row structs the mapper
//! consumes.
//!
//! The connection is owned by the export pipeline and cycled through
//! [`rotate`](DataSource::rotate) at batch boundaries: Sierra terminates
//! sessions after tens of thousands of queries, so the client is dropped
//! and re-established from the stored [`PgConfig`] rather than kept for
//! the whole run.

use crate::error::{ExportError, Result};
use crate::source::{BibCodes, DataSource, ItemRow, LeaderCodes, RecordPointer, VarfieldRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::{Client, NoTls, Row};
use std::fmt;
use tracing::debug;

const CHANGED_SINCE_SQL: &str = "
    SELECT
        record_num::text AS record_num,
        record_last_updated_gmt::timestamp AS last_updated,
        deletion_date_gmt::date AS deletion_date
    FROM
        sierra_view.record_metadata
    WHERE
        record_type_code = 'b' AND
        campus_code = '' AND
        record_last_updated_gmt > $1
    ORDER BY
        record_last_updated_gmt DESC NULLS LAST
";

const DELETED_SINCE_SQL: &str = "
    SELECT
        record_num::text AS record_num,
        record_last_updated_gmt::timestamp AS last_updated,
        deletion_date_gmt::date AS deletion_date
    FROM
        sierra_view.record_metadata
    WHERE
        record_type_code = 'b' AND
        campus_code = '' AND
        deletion_date_gmt IS NOT NULL AND
        deletion_date_gmt > $1
    ORDER BY
        deletion_date_gmt DESC
";

const ALL_ACTIVE_SQL: &str = "
    SELECT
        record_num::text AS record_num,
        record_last_updated_gmt::timestamp AS last_updated,
        deletion_date_gmt::date AS deletion_date
    FROM
        sierra_view.record_metadata
    WHERE
        record_type_code = 'b' AND
        campus_code = '' AND
        deletion_date_gmt IS NULL
    ORDER BY
        record_num
";

const FIELDS_FOR_SQL: &str = "
    SELECT
        bib_view.id,
        bib_view.bcode1,
        bib_view.bcode2,
        bib_view.bcode3,
        bib_view.cataloging_date_gmt::text AS cataloging_date,
        varfield_view.marc_tag,
        varfield_view.marc_ind1,
        varfield_view.marc_ind2,
        varfield_view.field_content,
        leader_field.record_status_code,
        leader_field.record_type_code,
        leader_field.bib_level_code,
        leader_field.control_type_code,
        leader_field.char_encoding_scheme_code,
        leader_field.encoding_level_code,
        leader_field.descriptive_cat_form_code,
        leader_field.multipart_level_code
    FROM
        sierra_view.bib_view
    INNER JOIN
        sierra_view.varfield_view ON bib_view.id = varfield_view.record_id
    INNER JOIN
        sierra_view.leader_field ON bib_view.id = leader_field.record_id
    WHERE
        bib_view.record_num::text = $1
    ORDER BY
        marc_tag
";

const LOCATIONS_FOR_SQL: &str = "
    SELECT
        bib_record_location.location_code
    FROM
        sierra_view.bib_view
    INNER JOIN
        sierra_view.bib_record_location
            ON bib_view.id = bib_record_location.bib_record_id
    WHERE
        bib_view.record_num::text = $1 AND
        bib_record_location.location_code IS NOT NULL
";

const ITEMS_FOR_SQL: &str = "
    SELECT
        item_view.location_code
    FROM
        sierra_view.bib_view
    INNER JOIN
        sierra_view.bib_record_item_record_link
            ON bib_view.id = bib_record_item_record_link.bib_record_id
    INNER JOIN
        sierra_view.item_view
            ON item_view.id = bib_record_item_record_link.item_record_id
    WHERE
        bib_view.record_num::text = $1
";

/// Connection settings for a Sierra database.
#[derive(Clone)]
pub struct PgConfig {
    /// Database host, e.g. `sierra-db.example.edu`.
    pub host: String,
    /// Database port; Sierra's default is 1032.
    pub port: u16,
    /// Database name; Sierra's default is `iii`.
    pub dbname: String,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
}

impl Default for PgConfig {
    fn default() -> Self {
        PgConfig {
            host: "localhost".to_string(),
            port: 1032,
            dbname: "iii".to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Blocking [`DataSource`] over a Sierra Postgres database.
pub struct SierraSource {
    config: PgConfig,
    client: Client,
}

impl fmt::Debug for SierraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SierraSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SierraSource {
    /// Connect to a Sierra database.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::DataSource`] if the connection cannot be
    /// established.
    pub fn connect(config: PgConfig) -> Result<Self> {
        let client = open(&config)?;
        Ok(SierraSource { config, client })
    }

    fn query(&mut self, sql: &str, params: &[&(dyn postgres::types::ToSql + Sync)]) -> Result<Vec<Row>> {
        self.client.query(sql, params).map_err(source_err)
    }

    fn pointers(&mut self, sql: &str, params: &[&(dyn postgres::types::ToSql + Sync)]) -> Result<Vec<RecordPointer>> {
        self.query(sql, params)?
            .iter()
            .map(pointer_from_row)
            .collect()
    }
}

impl DataSource for SierraSource {
    fn changed_since(&mut self, since: DateTime<Utc>) -> Result<Vec<RecordPointer>> {
        self.pointers(CHANGED_SINCE_SQL, &[&since.naive_utc()])
    }

    fn deleted_since(&mut self, since: DateTime<Utc>) -> Result<Vec<RecordPointer>> {
        self.pointers(DELETED_SINCE_SQL, &[&since.date_naive()])
    }

    fn all_active(&mut self) -> Result<Vec<RecordPointer>> {
        self.pointers(ALL_ACTIVE_SQL, &[])
    }

    fn fields_for(&mut self, record_num: &str) -> Result<Vec<VarfieldRow>> {
        self.query(FIELDS_FOR_SQL, &[&record_num])?
            .iter()
            .map(varfield_from_row)
            .collect()
    }

    fn locations_for(&mut self, record_num: &str) -> Result<Vec<String>> {
        let rows = self.query(LOCATIONS_FOR_SQL, &[&record_num])?;
        let mut locations = Vec::with_capacity(rows.len());
        for row in &rows {
            let code: String = row.try_get("location_code").map_err(source_err)?;
            locations.push(code);
        }
        Ok(locations)
    }

    fn items_for(&mut self, record_num: &str) -> Result<Vec<ItemRow>> {
        let rows = self.query(ITEMS_FOR_SQL, &[&record_num])?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(ItemRow {
                location_code: row.try_get("location_code").map_err(source_err)?,
            });
        }
        Ok(items)
    }

    fn rotate(&mut self) -> Result<()> {
        debug!(host = %self.config.host, "reacquiring database connection");
        self.client = open(&self.config)?;
        Ok(())
    }
}

fn open(config: &PgConfig) -> Result<Client> {
    let mut pg = postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .dbname(&config.dbname)
        .user(&config.user)
        .password(&config.password);
    pg.connect(NoTls).map_err(source_err)
}

fn source_err(e: postgres::Error) -> ExportError {
    ExportError::DataSource(e.to_string())
}

fn pointer_from_row(row: &Row) -> Result<RecordPointer> {
    let record_num: String = row.try_get("record_num").map_err(source_err)?;
    let last_updated: Option<NaiveDateTime> = row.try_get("last_updated").map_err(source_err)?;
    let deletion_date: Option<NaiveDate> = row.try_get("deletion_date").map_err(source_err)?;

    Ok(RecordPointer {
        record_num,
        last_updated: last_updated.map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc)),
        deleted: deletion_date.is_some(),
    })
}

fn varfield_from_row(row: &Row) -> Result<VarfieldRow> {
    Ok(VarfieldRow {
        record_id: row.try_get("id").map_err(source_err)?,
        marc_tag: row.try_get("marc_tag").map_err(source_err)?,
        ind1: row.try_get("marc_ind1").map_err(source_err)?,
        ind2: row.try_get("marc_ind2").map_err(source_err)?,
        field_content: row.try_get("field_content").map_err(source_err)?,
        bib: BibCodes {
            bcode1: row.try_get("bcode1").map_err(source_err)?,
            bcode2: row.try_get("bcode2").map_err(source_err)?,
            bcode3: row.try_get("bcode3").map_err(source_err)?,
            cataloging_date: row.try_get("cataloging_date").map_err(source_err)?,
        },
        leader: LeaderCodes {
            record_status: row.try_get("record_status_code").map_err(source_err)?,
            record_type: row.try_get("record_type_code").map_err(source_err)?,
            bib_level: row.try_get("bib_level_code").map_err(source_err)?,
            control_type: row.try_get("control_type_code").map_err(source_err)?,
            char_encoding: row.try_get("char_encoding_scheme_code").map_err(source_err)?,
            encoding_level: row.try_get("encoding_level_code").map_err(source_err)?,
            cataloging_form: row
                .try_get("descriptive_cat_form_code")
                .map_err(source_err)?,
            multipart_level: row.try_get("multipart_level_code").map_err(source_err)?,
        },
    })
}
