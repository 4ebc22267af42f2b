//! PostgreSQL Blob Storage Benchmark
//!
//! Measures read throughput of one large payload stored four ways:
//! - **file**: a plain temporary file
//! - **bytea**: an inline `bytea` column
//! - **bytea_external**: a `bytea` column with `STORAGE EXTERNAL`
//! - **lo**: a `lo` column referencing a large object
//!
//! Start a server first:
//! `docker run --rm -e POSTGRES_USER=pg -e POSTGRES_PASSWORD=pg -e POSTGRES_DB=pg -p 127.0.0.1:15432:5432 postgres`
//!
//! Run the benchmark: `cargo run --release -p lob-bench`
//! Run tests: `cargo test` (database tests: `cargo test -- --ignored`)

pub mod config;
pub mod driver;
pub mod large_object;
pub mod report;
pub mod schema;
pub mod strategy;
pub mod stream;
