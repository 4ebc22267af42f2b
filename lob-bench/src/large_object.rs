//! Streaming access to PostgreSQL large objects via the server-side
//! `lo_*`/`loread`/`lowrite` functions.
//!
//! Descriptors only live inside a transaction. [`LargeObjectReader`] and
//! [`LargeObjectWriter`] borrow the transaction for their whole lifetime, so a
//! descriptor abandoned on an error path is released when that transaction
//! rolls back on drop.

use anyhow::{Context, Result};
use log::debug;
use postgres::{Statement, Transaction};
use std::io::{self, Read, Write};

/// `INV_WRITE` from `libpq-fs.h`.
pub const INV_WRITE: i32 = 0x0002_0000;
/// `INV_READ` from `libpq-fs.h`.
pub const INV_READ: i32 = 0x0004_0000;

/// Create an empty large object and return its oid.
pub fn create(tx: &mut Transaction<'_>) -> Result<u32> {
    let oid: u32 = tx
        .query_one("SELECT lo_create(0)", &[])
        .context("lo_create failed")?
        .get(0);
    debug!("created large object {oid}");
    Ok(oid)
}

fn open(tx: &mut Transaction<'_>, oid: u32, mode: i32) -> Result<i32> {
    let fd: i32 = tx
        .query_one("SELECT lo_open($1, $2)", &[&oid, &mode])
        .with_context(|| format!("lo_open failed for large object {oid}"))?
        .get(0);
    Ok(fd)
}

fn close(tx: &mut Transaction<'_>, fd: i32) -> Result<()> {
    tx.query_one("SELECT lo_close($1)", &[&fd])
        .with_context(|| format!("lo_close failed for descriptor {fd}"))?;
    Ok(())
}

fn to_io(err: postgres::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// Sequential reader over one large object.
///
/// Each refill fetches up to `chunk_size` bytes with a single `loread`; the
/// fetched chunk is then handed out through whatever buffer the caller
/// passes to [`Read::read`].
pub struct LargeObjectReader<'a, 't> {
    tx: &'a mut Transaction<'t>,
    fd: i32,
    chunk_size: i32,
    read_stmt: Statement,
    pending: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<'a, 't> LargeObjectReader<'a, 't> {
    pub fn open(tx: &'a mut Transaction<'t>, oid: u32, chunk_size: usize) -> Result<Self> {
        let chunk_size = i32::try_from(chunk_size).context("chunk size exceeds loread limit")?;
        let fd = open(tx, oid, INV_READ)?;
        let read_stmt = tx
            .prepare("SELECT loread($1, $2)")
            .context("failed to prepare loread")?;
        Ok(Self {
            tx,
            fd,
            chunk_size,
            read_stmt,
            pending: Vec::new(),
            pos: 0,
            eof: false,
        })
    }

    fn refill(&mut self) -> io::Result<()> {
        let row = self
            .tx
            .query_one(&self.read_stmt, &[&self.fd, &self.chunk_size])
            .map_err(to_io)?;
        self.pending = row.try_get(0).map_err(to_io)?;
        self.pos = 0;
        if self.pending.is_empty() {
            self.eof = true;
        }
        Ok(())
    }

    /// Release the descriptor, leaving the transaction usable.
    pub fn close(self) -> Result<()> {
        close(self.tx, self.fd)
    }
}

impl Read for LargeObjectReader<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.pending.len() {
            if self.eof {
                return Ok(0);
            }
            self.refill()?;
        }

        let available = &self.pending[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Sequential writer into one large object.
///
/// A single `write` call sends at most `chunk_size` bytes, so `write_all`
/// turns a large slice into a series of bounded `lowrite` round trips.
pub struct LargeObjectWriter<'a, 't> {
    tx: &'a mut Transaction<'t>,
    fd: i32,
    chunk_size: usize,
    write_stmt: Statement,
}

impl<'a, 't> LargeObjectWriter<'a, 't> {
    pub fn open(tx: &'a mut Transaction<'t>, oid: u32, chunk_size: usize) -> Result<Self> {
        let fd = open(tx, oid, INV_WRITE)?;
        let write_stmt = tx
            .prepare("SELECT lowrite($1, $2)")
            .context("failed to prepare lowrite")?;
        Ok(Self {
            tx,
            fd,
            chunk_size: chunk_size.max(1),
            write_stmt,
        })
    }

    pub fn close(self) -> Result<()> {
        close(self.tx, self.fd)
    }
}

impl Write for LargeObjectWriter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk = &buf[..buf.len().min(self.chunk_size)];
        let written: i32 = self
            .tx
            .query_one(&self.write_stmt, &[&self.fd, &chunk])
            .map_err(to_io)?
            .try_get(0)
            .map_err(to_io)?;
        usize::try_from(written)
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lowrite returned a negative count"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
