//! Size units and the reference benchmark configuration.

pub const KIB: usize = 1 << 10;
pub const MIB: usize = 1 << 20;
pub const GIB: usize = 1 << 30;

/// Payload written to every storage target (300 MiB).
pub const DEFAULT_PAYLOAD_SIZE: usize = 300 * MIB;
/// Scratch buffer every read drains through.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * KIB;
/// Timed read passes per strategy.
pub const DEFAULT_ITERATIONS: u32 = 5;
/// Bytes moved per `loread`/`lowrite` round trip.
pub const DEFAULT_LO_CHUNK_SIZE: usize = 64 * KIB;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://pg:pg@127.0.0.1:15432/pg";

/// Width the phase labels are padded to in the ledger.
pub const LABEL_WIDTH: usize = 25;
