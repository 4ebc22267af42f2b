//! The benchmark driver: one run context owning the payload, the scratch
//! buffer, the database connection and the temporary file.
//!
//! Phases run strictly in order:
//! prepare → read file → read bytea → read bytea_external → read lo → teardown.
//! The first error skips every remaining phase; teardown still runs.

use crate::config::BenchConfig;
use crate::large_object::{self, LargeObjectReader, LargeObjectWriter};
use crate::report::{print_summary, PhaseClock, StrategyResult};
use crate::schema::{self, BYTEA_EXTERNAL_TABLE, LO_TABLE, TABLES};
use crate::strategy::Strategy;
use crate::stream::{drain, generate_payload, verify};
use anyhow::{bail, Context, Result};
use log::{debug, error, info, log_enabled, warn, Level};
use postgres::{Client, NoTls, Transaction};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;

const NOT_CONNECTED: &str = "no database connection is open";

/// How a read pass treats the bytes it pulls through the scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Count bytes only; this is what gets timed.
    Drain,
    /// Compare every byte with the payload.
    Content,
}

pub struct Bench<W: Write = io::Stdout> {
    config: BenchConfig,
    payload: Vec<u8>,
    scratch: Vec<u8>,
    clock: PhaseClock<W>,
    client: Option<Client>,
    file: Option<NamedTempFile>,
}

impl Bench<io::Stdout> {
    pub fn stdout(config: BenchConfig) -> Self {
        Self::new(config, io::stdout())
    }
}

impl<W: Write> Bench<W> {
    pub fn new(config: BenchConfig, out: W) -> Self {
        let scratch = vec![0u8; config.read_buffer_size];
        Self {
            config,
            payload: Vec::new(),
            scratch,
            clock: PhaseClock::new(out),
            client: None,
            file: None,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }

    pub fn output(&self) -> &W {
        self.clock.get_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Run every phase, then tear down regardless of the outcome.
    ///
    /// A benchmark error wins over a cleanup error; the latter is logged.
    pub fn run(&mut self) -> Result<Vec<StrategyResult>> {
        let outcome = self.prepare().and_then(|()| self.benchmark_all());

        let marked = self
            .clock
            .mark("close connection")
            .context("failed to write report");
        let cleanup = self.teardown();

        let results = match outcome {
            Ok(results) => results,
            Err(err) => {
                if let Err(cleanup_err) = cleanup {
                    error!("cleanup after failed run also failed: {cleanup_err:#}");
                }
                if let Err(finish_err) = self.clock.finish() {
                    warn!("failed to terminate report: {finish_err}");
                }
                return Err(err);
            }
        };
        marked?;
        cleanup?;

        self.clock.mark("done")?;
        self.clock.finish()?;
        print_summary(self.clock.get_mut(), &results)?;
        Ok(results)
    }

    /// Generate the payload, build the schema and store the payload in all
    /// four targets. The three table writes commit together.
    pub fn prepare(&mut self) -> Result<()> {
        self.config.validate()?;

        self.clock.mark("create content")?;
        self.create_content();

        self.clock.mark("open connection")?;
        self.open_connection()?;

        self.clock.mark("create structure")?;
        self.create_structure()?;

        self.write_file()?;
        self.write_database()?;

        if self.config.verify {
            self.verify_all()?;
        }
        Ok(())
    }

    pub fn create_content(&mut self) {
        self.payload = generate_payload(self.config.payload_size, self.config.seed);
        if self.scratch.len() != self.config.read_buffer_size {
            self.scratch = vec![0u8; self.config.read_buffer_size];
        }
        debug!("generated {} byte payload", self.payload.len());
    }

    pub fn open_connection(&mut self) -> Result<()> {
        let mut pg: postgres::Config = self
            .config
            .database_url
            .parse()
            .context("invalid database URL")?;
        if let Some(timeout) = self.config.connect_timeout {
            pg.connect_timeout(timeout);
        }

        info!(
            "connecting to database {} as {}",
            pg.get_dbname().unwrap_or("<default>"),
            pg.get_user().unwrap_or("<default>")
        );
        let client = pg.connect(NoTls).context("failed to connect to PostgreSQL")?;
        self.client = Some(client);
        Ok(())
    }

    /// Create missing schema objects and empty the tables. Runs in
    /// auto-commit mode.
    pub fn create_structure(&mut self) -> Result<()> {
        let client = self.client.as_mut().context(NOT_CONNECTED)?;
        schema::ensure_schema(client)?;
        schema::reset(client)?;
        Ok(())
    }

    pub fn write_file(&mut self) -> Result<()> {
        self.clock.mark("create file")?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("lobbench").suffix(".tmp");
        let created = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file = created.context("failed to create temporary file")?;

        file.write_all(&self.payload)
            .and_then(|()| file.flush())
            .with_context(|| format!("failed to write {}", file.path().display()))?;
        debug!("payload written to {}", file.path().display());

        // Replacing an earlier file drops (and deletes) it.
        self.file = Some(file);
        Ok(())
    }

    fn write_database(&mut self) -> Result<()> {
        let client = self.client.as_mut().context(NOT_CONNECTED)?;
        let mut tx = client.transaction().context("failed to begin transaction")?;

        for table in [Strategy::Bytea, Strategy::ByteaExternal]
            .iter()
            .filter_map(|strategy| strategy.table())
        {
            self.clock.mark(&format!("write {table}"))?;
            write_bytea(&mut tx, table, &self.payload)?;
        }

        self.clock.mark(&format!("write {LO_TABLE}"))?;
        let oid = write_lob(&mut tx, &self.payload, self.config.lo_chunk_size)?;
        debug!("payload stored as large object {oid}");

        self.clock.mark("commit")?;
        tx.commit().context("commit failed")?;

        if log_enabled!(Level::Debug) {
            for (table, rows) in self.table_rows()? {
                debug!("{table}: {rows} row(s)");
            }
            let client = self.client.as_mut().context(NOT_CONNECTED)?;
            let mode = schema::column_storage(client, BYTEA_EXTERNAL_TABLE)?;
            debug!("{BYTEA_EXTERNAL_TABLE}.blobfield storage mode '{mode}'");
        }
        Ok(())
    }

    /// Committed row count of each payload table.
    pub fn table_rows(&mut self) -> Result<Vec<(&'static str, i64)>> {
        let client = self.client.as_mut().context(NOT_CONNECTED)?;
        TABLES
            .iter()
            .map(|&table| Ok((table, schema::row_count(client, table)?)))
            .collect()
    }

    /// Read every target once and compare it with the payload.
    pub fn verify_all(&mut self) -> Result<()> {
        for strategy in Strategy::ALL {
            self.clock.mark(&format!("verify {strategy}"))?;
            self.read_once(strategy, Check::Content)
                .with_context(|| format!("{strategy} copy differs from the payload"))?;
        }
        Ok(())
    }

    pub fn benchmark_all(&mut self) -> Result<Vec<StrategyResult>> {
        Strategy::ALL
            .iter()
            .map(|&strategy| self.iterate(strategy))
            .collect()
    }

    /// Timed loop: `iterations` full reads, each through a freshly opened
    /// file handle or query.
    pub fn iterate(&mut self, strategy: Strategy) -> Result<StrategyResult> {
        self.clock.mark(&format!("read {strategy}"))?;

        let expected = self.payload.len() as u64;
        let start = Instant::now();
        for iteration in 0..self.config.iterations {
            let read = self.read_once(strategy, Check::Drain)?;
            if read != expected {
                bail!("{strategy}: iteration {iteration} read {read} bytes, expected {expected}");
            }
        }
        let result = StrategyResult {
            strategy,
            iterations: self.config.iterations,
            bytes_per_iteration: self.payload.len(),
            elapsed: start.elapsed(),
        };

        self.clock.throughput(result.mib_per_sec())?;
        debug!(
            "{strategy}: {} iterations in {:?} ({:.1} MiB/s)",
            result.iterations,
            result.elapsed,
            result.mib_per_sec()
        );
        Ok(result)
    }

    pub fn read_once(&mut self, strategy: Strategy, check: Check) -> Result<u64> {
        match strategy {
            Strategy::File => self.read_file(check),
            Strategy::LargeObject => self.read_lob(check),
            Strategy::Bytea | Strategy::ByteaExternal => {
                let table = strategy
                    .table()
                    .with_context(|| format!("{strategy} has no table"))?;
                self.read_bytea(table, check)
            }
        }
    }

    pub fn read_file(&mut self, check: Check) -> Result<u64> {
        let path = self
            .file
            .as_ref()
            .map(NamedTempFile::path)
            .context("temporary file has not been written")?;
        let mut file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        consume(&mut file, &mut self.scratch, &self.payload, check)
    }

    pub fn read_bytea(&mut self, table: &str, check: Check) -> Result<u64> {
        let client = self.client.as_mut().context(NOT_CONNECTED)?;
        let query = format!("SELECT blobfield FROM {table}");
        let row = client
            .query_one(query.as_str(), &[])
            .with_context(|| format!("failed to select from {table}"))?;
        let mut stored: &[u8] = row
            .try_get(0)
            .with_context(|| format!("{table} holds no payload"))?;
        consume(&mut stored, &mut self.scratch, &self.payload, check)
    }

    /// Large-object descriptors need a transaction; the one opened here
    /// lives for exactly one read.
    pub fn read_lob(&mut self, check: Check) -> Result<u64> {
        let client = self.client.as_mut().context(NOT_CONNECTED)?;
        let mut tx = client.transaction().context("failed to begin transaction")?;

        let query = format!("SELECT blobfield::oid FROM {LO_TABLE}");
        let oid: u32 = tx
            .query_one(query.as_str(), &[])
            .with_context(|| format!("failed to select from {LO_TABLE}"))?
            .try_get(0)
            .with_context(|| format!("{LO_TABLE} holds no large object reference"))?;

        let mut reader = LargeObjectReader::open(&mut tx, oid, self.config.lo_chunk_size)?;
        let read = consume(&mut reader, &mut self.scratch, &self.payload, check)?;
        reader.close()?;
        tx.commit().context("failed to end read transaction")?;
        Ok(read)
    }

    /// Delete the temporary file and close the connection.
    ///
    /// Both steps are always attempted; the first failure is returned.
    pub fn teardown(&mut self) -> Result<()> {
        let file_result = match self.file.take() {
            Some(file) => {
                let path = file.path().to_path_buf();
                file.close()
                    .with_context(|| format!("failed to delete {}", path.display()))
            }
            None => Ok(()),
        };
        let client_result = match self.client.take() {
            Some(client) => client
                .close()
                .context("failed to close database connection"),
            None => Ok(()),
        };
        file_result.and(client_result)
    }
}

fn consume<R: Read + ?Sized>(
    reader: &mut R,
    scratch: &mut [u8],
    payload: &[u8],
    check: Check,
) -> Result<u64> {
    match check {
        Check::Drain => Ok(drain(reader, scratch)?),
        Check::Content => {
            verify(reader, scratch, payload)?;
            Ok(payload.len() as u64)
        }
    }
}

fn write_bytea(tx: &mut Transaction<'_>, table: &str, payload: &[u8]) -> Result<()> {
    let statement = format!("INSERT INTO {table} VALUES ($1)");
    tx.execute(statement.as_str(), &[&payload])
        .with_context(|| format!("failed to insert into {table}"))?;
    Ok(())
}

fn write_lob(tx: &mut Transaction<'_>, payload: &[u8], chunk_size: usize) -> Result<u32> {
    let oid = large_object::create(tx)?;

    let mut writer = LargeObjectWriter::open(tx, oid, chunk_size)?;
    writer
        .write_all(payload)
        .with_context(|| format!("failed to write large object {oid}"))?;
    writer.close()?;

    let statement = format!("INSERT INTO {LO_TABLE} VALUES ($1::oid)");
    tx.execute(statement.as_str(), &[&oid])
        .with_context(|| format!("failed to insert into {LO_TABLE}"))?;
    Ok(oid)
}
