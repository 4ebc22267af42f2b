//! Tables holding the database copies of the payload.
//!
//! Every statement here is safe to repeat: objects are created with
//! `IF NOT EXISTS` and the tables are emptied before each run, so exactly one
//! row per table exists after the write phase.

use anyhow::{Context, Result};
use log::debug;
use postgres::Client;

pub const BYTEA_TABLE: &str = "testbytea";
pub const BYTEA_EXTERNAL_TABLE: &str = "testbytea_external";
pub const LO_TABLE: &str = "testlo";

pub const TABLES: [&str; 3] = [BYTEA_TABLE, BYTEA_EXTERNAL_TABLE, LO_TABLE];

const CREATE_STATEMENTS: [&str; 5] = [
    "CREATE EXTENSION IF NOT EXISTS lo",
    "CREATE TABLE IF NOT EXISTS testbytea ( blobfield bytea )",
    "CREATE TABLE IF NOT EXISTS testbytea_external ( blobfield bytea )",
    "CREATE TABLE IF NOT EXISTS testlo ( blobfield lo )",
    // Always out-of-line and never compressed, unlike the default EXTENDED.
    "ALTER TABLE testbytea_external ALTER COLUMN blobfield SET STORAGE EXTERNAL",
];

pub fn ensure_schema(client: &mut Client) -> Result<()> {
    for statement in CREATE_STATEMENTS {
        client
            .batch_execute(statement)
            .with_context(|| format!("schema statement failed: {statement}"))?;
    }
    Ok(())
}

/// Empty all three tables.
///
/// Large objects referenced from `testlo` are unlinked first; truncating the
/// table alone would leave them orphaned in `pg_largeobject`. References to
/// objects that no longer exist are skipped. Unlink and truncation commit
/// together.
pub fn reset(client: &mut Client) -> Result<()> {
    let mut tx = client
        .transaction()
        .context("failed to begin reset transaction")?;

    let unlinked = tx
        .execute(
            "SELECT lo_unlink(lo_ref) FROM ( \
                 SELECT DISTINCT blobfield::oid AS lo_ref FROM testlo \
                 WHERE blobfield IS NOT NULL \
             ) refs \
             WHERE lo_ref IN (SELECT oid FROM pg_largeobject_metadata)",
            &[],
        )
        .context("failed to unlink previous large objects")?;
    debug!("unlinked {unlinked} large object(s) from {LO_TABLE}");

    for table in TABLES {
        tx.batch_execute(&format!("TRUNCATE {table}"))
            .with_context(|| format!("failed to truncate {table}"))?;
    }
    tx.commit().context("failed to commit reset")?;
    Ok(())
}

pub fn row_count(client: &mut Client, table: &str) -> Result<i64> {
    let query = format!("SELECT count(*) FROM {table}");
    let count: i64 = client
        .query_one(query.as_str(), &[])
        .with_context(|| format!("failed to count rows of {table}"))?
        .get(0);
    Ok(count)
}

/// Storage mode of `blobfield` as recorded in `pg_attribute`
/// (`p` plain, `e` external, `m` main, `x` extended).
pub fn column_storage(client: &mut Client, table: &str) -> Result<char> {
    let row = client
        .query_one(
            "SELECT a.attstorage::text FROM pg_attribute a \
             JOIN pg_class c ON c.oid = a.attrelid \
             WHERE c.relname = $1 AND a.attname = 'blobfield' \
             AND pg_table_is_visible(c.oid)",
            &[&table],
        )
        .with_context(|| format!("failed to read storage mode of {table}.blobfield"))?;
    let mode: String = row.get(0);
    mode.chars()
        .next()
        .with_context(|| format!("empty storage mode for {table}.blobfield"))
}
