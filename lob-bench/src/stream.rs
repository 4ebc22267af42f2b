//! Payload generation and the read loops every strategy shares.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io::{ErrorKind, Read};

/// Fill a buffer of `size` bytes with pseudo-random data.
///
/// With a seed the payload is reproducible across runs.
pub fn generate_payload(size: usize, seed: Option<u64>) -> Vec<u8> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut payload = vec![0u8; size];
    rng.fill_bytes(&mut payload);
    payload
}

/// Read `reader` to end-of-stream through `scratch`, returning the byte count.
///
/// The scratch contents are overwritten on every pass and never inspected.
pub fn drain<R: Read + ?Sized>(reader: &mut R, scratch: &mut [u8]) -> std::io::Result<u64> {
    let mut total = 0u64;
    loop {
        match reader.read(scratch) {
            Ok(0) => return Ok(total),
            Ok(n) => total += n as u64,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Like [`drain`], but every chunk must match `expected` at the same offset
/// and the stream must end exactly at `expected.len()`.
pub fn verify<R: Read + ?Sized>(reader: &mut R, scratch: &mut [u8], expected: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    loop {
        let n = match reader.read(scratch) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("read failed during verification"),
        };
        if n == 0 {
            break;
        }

        let end = offset + n;
        if end > expected.len() {
            bail!(
                "stream is longer than the payload: {} bytes read, expected {}",
                end,
                expected.len()
            );
        }
        if let Some(pos) = scratch[..n]
            .iter()
            .zip(&expected[offset..end])
            .position(|(a, b)| a != b)
        {
            bail!("content mismatch at byte offset {}", offset + pos);
        }
        offset = end;
    }

    if offset != expected.len() {
        bail!(
            "stream ended early: {} bytes read, expected {}",
            offset,
            expected.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Hands out at most `step` bytes per call and interrupts every other call.
    struct Choppy {
        data: Vec<u8>,
        pos: usize,
        step: usize,
        interrupt: bool,
    }

    impl Read for Choppy {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::new(ErrorKind::Interrupted, "again"));
            }
            let n = buf.len().min(self.step).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::ConnectionReset, "gone"))
        }
    }

    #[test]
    fn seeded_payload_is_reproducible() {
        let a = generate_payload(1024, Some(7));
        let b = generate_payload(1024, Some(7));
        let c = generate_payload(1024, Some(8));
        assert_eq!(a.len(), 1024);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn drain_counts_every_byte() {
        let payload = generate_payload(10_000, Some(1));
        let mut scratch = [0u8; 4096];
        let read = drain(&mut Cursor::new(&payload), &mut scratch).unwrap();
        assert_eq!(read, 10_000);
    }

    #[test]
    fn drain_survives_short_and_interrupted_reads() {
        let mut reader = Choppy {
            data: vec![3u8; 1000],
            pos: 0,
            step: 7,
            interrupt: false,
        };
        let mut scratch = [0u8; 64];
        assert_eq!(drain(&mut reader, &mut scratch).unwrap(), 1000);
    }

    #[test]
    fn drain_ignores_scratch_contents() {
        let payload = vec![0u8; 100];
        let mut scratch = [0xAAu8; 16];
        assert_eq!(drain(&mut payload.as_slice(), &mut scratch).unwrap(), 100);
    }

    #[test]
    fn drain_propagates_errors() {
        let mut scratch = [0u8; 16];
        let err = drain(&mut Broken, &mut scratch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    }

    #[test]
    fn verify_accepts_identical_stream() {
        let payload = generate_payload(5000, Some(2));
        let mut reader = Choppy {
            data: payload.clone(),
            pos: 0,
            step: 333,
            interrupt: false,
        };
        let mut scratch = [0u8; 4096];
        verify(&mut reader, &mut scratch, &payload).unwrap();
    }

    #[test]
    fn verify_reports_mismatch_offset() {
        let payload = generate_payload(64, Some(3));
        let mut stored = payload.clone();
        stored[40] ^= 0xFF;
        let mut scratch = [0u8; 16];
        let err = verify(&mut stored.as_slice(), &mut scratch, &payload).unwrap_err();
        assert!(err.to_string().contains("offset 40"), "{err}");
    }

    #[test]
    fn verify_rejects_length_mismatch() {
        let payload = vec![1u8; 32];
        let mut scratch = [0u8; 8];
        assert!(verify(&mut &payload[..31], &mut scratch, &payload).is_err());

        let longer = vec![1u8; 33];
        assert!(verify(&mut longer.as_slice(), &mut scratch, &payload).is_err());
    }
}
