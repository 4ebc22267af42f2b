//! Criterion harness for the read loop shared by every strategy: how much the
//! scratch buffer size alone costs, from memory and from a temporary file.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lob_bench::stream::{drain, generate_payload};
use std::fs::File;
use std::io::Write;
use std::time::Duration;

const PAYLOAD_SIZE: usize = 16 << 20;

fn scratch_sizes() -> Vec<(&'static str, usize)> {
    vec![("4KiB", 4 << 10), ("64KiB", 64 << 10), ("1MiB", 1 << 20)]
}

fn bench_drain_memory(c: &mut Criterion) {
    let payload = generate_payload(PAYLOAD_SIZE, Some(1));
    let mut group = c.benchmark_group("drain/memory");
    group.throughput(Throughput::Bytes(PAYLOAD_SIZE as u64));
    group.measurement_time(Duration::from_secs(10));

    for (label, size) in scratch_sizes() {
        let mut scratch = vec![0u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, _| {
            b.iter(|| {
                let read = drain(&mut payload.as_slice(), &mut scratch).expect("drain failed");
                assert_eq!(read, PAYLOAD_SIZE as u64);
            });
        });
    }
    group.finish();
}

fn bench_drain_file(c: &mut Criterion) {
    let payload = generate_payload(PAYLOAD_SIZE, Some(1));
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(&payload).expect("write temp file");
    let path = file.path().to_path_buf();

    let mut group = c.benchmark_group("drain/file");
    group.throughput(Throughput::Bytes(PAYLOAD_SIZE as u64));
    group.measurement_time(Duration::from_secs(10));

    for (label, size) in scratch_sizes() {
        let mut scratch = vec![0u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, _| {
            b.iter(|| {
                let mut handle = File::open(&path).expect("open temp file");
                let read = drain(&mut handle, &mut scratch).expect("drain failed");
                assert_eq!(read, PAYLOAD_SIZE as u64);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_drain_memory, bench_drain_file);
criterion_main!(benches);
