//! Benchmark configuration resolved from `LOB_BENCH_*` environment variables.
//!
//! Every setting falls back to the reference configuration (300 MiB payload,
//! 4 KiB read buffer, 5 iterations, local PostgreSQL on port 15432).

use anyhow::{bail, Result};
use bench_core::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_ITERATIONS, DEFAULT_LO_CHUNK_SIZE, DEFAULT_PAYLOAD_SIZE,
    DEFAULT_READ_BUFFER_SIZE,
};
use bench_core::env_config::{parse_bool, parse_size};
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DATABASE_URL: &str = "LOB_BENCH_DATABASE_URL";
pub const ENV_PAYLOAD_SIZE: &str = "LOB_BENCH_PAYLOAD_SIZE";
pub const ENV_READ_BUFFER: &str = "LOB_BENCH_READ_BUFFER";
pub const ENV_ITERATIONS: &str = "LOB_BENCH_ITERATIONS";
pub const ENV_LO_CHUNK: &str = "LOB_BENCH_LO_CHUNK";
pub const ENV_CONNECT_TIMEOUT: &str = "LOB_BENCH_CONNECT_TIMEOUT_SECS";
pub const ENV_SEED: &str = "LOB_BENCH_SEED";
pub const ENV_VERIFY: &str = "LOB_BENCH_VERIFY";
pub const ENV_TMPDIR: &str = "LOB_BENCH_TMPDIR";
pub const ENV_LOG_LEVEL: &str = "LOB_BENCH_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "LOB_BENCH_LOG_FILE";

#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// libpq-style URL or `key=value` connection string.
    pub database_url: String,
    pub payload_size: usize,
    pub read_buffer_size: usize,
    pub iterations: u32,
    /// Bytes per `loread`/`lowrite` round trip.
    pub lo_chunk_size: usize,
    /// `None` leaves the driver default in place.
    pub connect_timeout: Option<Duration>,
    /// Fixed seed for a reproducible payload.
    pub seed: Option<u64>,
    /// Compare every target against the payload before timing starts.
    pub verify: bool,
    pub temp_dir: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            payload_size: DEFAULT_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            iterations: DEFAULT_ITERATIONS,
            lo_chunk_size: DEFAULT_LO_CHUNK_SIZE,
            connect_timeout: None,
            seed: None,
            verify: false,
            temp_dir: None,
        }
    }
}

impl BenchConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Values that fail to parse are reported and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup(ENV_DATABASE_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.database_url);

        let payload_size = resolve(&lookup, ENV_PAYLOAD_SIZE, parse_size, defaults.payload_size);
        let read_buffer_size =
            resolve(&lookup, ENV_READ_BUFFER, parse_size, defaults.read_buffer_size);
        let iterations = resolve(
            &lookup,
            ENV_ITERATIONS,
            |v| v.trim().parse::<u32>().ok(),
            defaults.iterations,
        );
        let lo_chunk_size = resolve(&lookup, ENV_LO_CHUNK, parse_size, defaults.lo_chunk_size);

        let timeout_secs = resolve(
            &lookup,
            ENV_CONNECT_TIMEOUT,
            |v| v.trim().parse::<u64>().ok(),
            0,
        );
        let connect_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let seed = lookup(ENV_SEED).and_then(|v| match v.trim().parse::<u64>() {
            Ok(seed) => Some(seed),
            Err(_) => {
                warn!("Ignoring {ENV_SEED}={v:?}: not an unsigned integer");
                None
            }
        });

        let verify = resolve(&lookup, ENV_VERIFY, parse_bool, defaults.verify);

        let temp_dir = lookup(ENV_TMPDIR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            database_url,
            payload_size,
            read_buffer_size,
            iterations,
            lo_chunk_size,
            connect_timeout,
            seed,
            verify,
            temp_dir,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.payload_size == 0 {
            bail!("payload size must be greater than zero");
        }
        if self.read_buffer_size == 0 {
            bail!("read buffer size must be greater than zero");
        }
        if self.lo_chunk_size == 0 {
            bail!("large object chunk size must be greater than zero");
        }
        if self.lo_chunk_size > i32::MAX as usize {
            bail!("large object chunk size {} exceeds the loread limit", self.lo_chunk_size);
        }
        if self.iterations == 0 {
            bail!("iteration count must be greater than zero");
        }
        Ok(())
    }
}

fn resolve<F, P, T>(lookup: &F, key: &str, parse: P, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match lookup(key) {
        None => default,
        Some(raw) => parse(&raw).unwrap_or_else(|| {
            warn!("Ignoring {key}={raw:?}: unparsable, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::constants::{KIB, MIB};
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_reference_configuration() {
        let config = BenchConfig::from_lookup(|_| None);
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.payload_size, 300 * MIB);
        assert_eq!(config.read_buffer_size, 4 * KIB);
        assert_eq!(config.iterations, 5);
        assert_eq!(config.database_url, "postgresql://pg:pg@127.0.0.1:15432/pg");
        config.validate().unwrap();
    }

    #[test]
    fn overrides_are_applied() {
        let config = BenchConfig::from_lookup(lookup_from(&[
            (ENV_DATABASE_URL, "host=db port=5432 user=bench"),
            (ENV_PAYLOAD_SIZE, "16"),
            (ENV_READ_BUFFER, "64KiB"),
            (ENV_ITERATIONS, "1"),
            (ENV_LO_CHUNK, "1MiB"),
            (ENV_CONNECT_TIMEOUT, "3"),
            (ENV_SEED, "42"),
            (ENV_VERIFY, "true"),
            (ENV_TMPDIR, "/var/tmp"),
        ]));

        assert_eq!(config.database_url, "host=db port=5432 user=bench");
        assert_eq!(config.payload_size, 16);
        assert_eq!(config.read_buffer_size, 64 * KIB);
        assert_eq!(config.iterations, 1);
        assert_eq!(config.lo_chunk_size, MIB);
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.seed, Some(42));
        assert!(config.verify);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/var/tmp")));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = BenchConfig::from_lookup(lookup_from(&[
            (ENV_PAYLOAD_SIZE, "lots"),
            (ENV_ITERATIONS, "-2"),
            (ENV_SEED, "abc"),
            (ENV_VERIFY, "perhaps"),
            (ENV_DATABASE_URL, "   "),
        ]));
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn zero_timeout_means_driver_default() {
        let config = BenchConfig::from_lookup(lookup_from(&[(ENV_CONNECT_TIMEOUT, "0")]));
        assert_eq!(config.connect_timeout, None);
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let mut config = BenchConfig::default();
        config.payload_size = 0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.read_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.iterations = 0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.lo_chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
