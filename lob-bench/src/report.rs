//! Report module: the running phase ledger and the closing comparison table.

use crate::strategy::Strategy;
use bench_core::constants::{LABEL_WIDTH, MIB};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Prints one line per phase: a padded label when the phase starts, and the
/// time it took when the next phase starts.
pub struct PhaseClock<W: Write> {
    out: W,
    last: Option<Instant>,
}

impl<W: Write> PhaseClock<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn mark(&mut self, label: &str) -> io::Result<()> {
        let now = Instant::now();
        if let Some(last) = self.last {
            writeln!(self.out, "{}", format_elapsed(now - last))?;
        }
        self.last = Some(now);
        write!(self.out, "{:<width$}", label, width = LABEL_WIDTH)?;
        self.out.flush()
    }

    pub fn throughput(&mut self, mib_per_sec: f64) -> io::Result<()> {
        write!(self.out, "{} MiB/s  ", format_throughput(mib_per_sec))?;
        self.out.flush()
    }

    /// End the line of the final label.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.last.take().is_some() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Compact millisecond-precision rendering: `0s`, `1.5s`, `2m3.004s`, `1h2s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let second_ms = total_ms % 60_000;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if second_ms == 0 && !out.is_empty() {
        return out;
    }

    let whole = second_ms / 1000;
    let frac = second_ms % 1000;
    if frac == 0 {
        out.push_str(&format!("{whole}s"));
    } else {
        let digits = format!("{frac:03}");
        out.push_str(&format!("{whole}.{}s", digits.trim_end_matches('0')));
    }
    out
}

/// `(iterations × payload_size) / elapsed`, in MiB/s.
pub fn throughput_mib_s(iterations: u32, payload_size: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return f64::INFINITY;
    }
    iterations as f64 * payload_size as f64 / secs / MIB as f64
}

/// At most one decimal, without a trailing `.0`.
pub fn format_throughput(mib_per_sec: f64) -> String {
    if mib_per_sec.is_infinite() {
        return "∞".to_string();
    }
    let text = format!("{:.1}", mib_per_sec);
    match text.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => text,
    }
}

/// Outcome of the timed loop for one strategy.
#[derive(Debug, Clone)]
pub struct StrategyResult {
    pub strategy: Strategy,
    pub iterations: u32,
    pub bytes_per_iteration: usize,
    pub elapsed: Duration,
}

impl StrategyResult {
    pub fn mib_per_sec(&self) -> f64 {
        throughput_mib_s(self.iterations, self.bytes_per_iteration, self.elapsed)
    }

    pub fn mean_iteration(&self) -> Duration {
        if self.iterations == 0 {
            return Duration::ZERO;
        }
        self.elapsed / self.iterations
    }
}

/// Print a table comparing all strategies against the fastest one.
pub fn print_summary<W: Write>(out: &mut W, results: &[StrategyResult]) -> io::Result<()> {
    if results.is_empty() {
        return Ok(());
    }

    let best = results
        .iter()
        .map(StrategyResult::mib_per_sec)
        .fold(0.0_f64, f64::max);

    writeln!(out)?;
    writeln!(out, "  {}", "=".repeat(66))?;
    writeln!(
        out,
        "  {:16} {:>12} {:>14} {:>10} {:>8}",
        "Strategy", "Total", "Per iteration", "MiB/s", "Relative"
    )?;
    writeln!(out, "  {}", "-".repeat(66))?;
    for r in results {
        let rate = r.mib_per_sec();
        let relative = if best.is_infinite() || best <= 0.0 {
            "-".to_string()
        } else {
            format!("{:.0}%", rate / best * 100.0)
        };
        writeln!(
            out,
            "  {:16} {:>12} {:>14} {:>10} {:>8}",
            r.strategy.label(),
            format_elapsed(r.elapsed),
            format_elapsed(r.mean_iteration()),
            format_throughput(rate),
            relative,
        )?;
    }
    writeln!(out, "  {}", "=".repeat(66))?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_elapsed(Duration::from_millis(42)), "0.042s");
        assert_eq!(format_elapsed(Duration::from_millis(123_004)), "2m3.004s");
        assert_eq!(format_elapsed(Duration::from_secs(120)), "2m");
        assert_eq!(format_elapsed(Duration::from_secs(3602)), "1h2s");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "1h");
        // Sub-millisecond precision is truncated.
        assert_eq!(format_elapsed(Duration::from_micros(999)), "0s");
    }

    #[test]
    fn throughput_formula() {
        let rate = throughput_mib_s(5, 300 * MIB, Duration::from_secs(3));
        assert!((rate - 500.0).abs() < 1e-9);

        let rate = throughput_mib_s(1, 16, Duration::from_millis(1));
        assert!((rate - 16.0 * 1000.0 / MIB as f64).abs() < 1e-9);

        assert!(throughput_mib_s(5, MIB, Duration::ZERO).is_infinite());
    }

    #[test]
    fn throughput_formatting() {
        assert_eq!(format_throughput(500.0), "500");
        assert_eq!(format_throughput(512.34), "512.3");
        assert_eq!(format_throughput(0.04), "0");
        assert_eq!(format_throughput(f64::INFINITY), "∞");
    }

    #[test]
    fn clock_prints_labels_and_elapsed() {
        let mut clock = PhaseClock::new(Vec::new());
        clock.mark("create content").unwrap();
        clock.mark("read file").unwrap();
        clock.throughput(1024.0).unwrap();
        clock.mark("done").unwrap();
        clock.finish().unwrap();

        let text = String::from_utf8(clock.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(&format!("{:<25}", "create content")));
        assert!(lines[0].ends_with('s'));
        assert!(lines[1].starts_with(&format!("{:<25}1024 MiB/s  ", "read file")));
        assert_eq!(lines[2], format!("{:<25}", "done"));
    }

    #[test]
    fn finish_without_marks_prints_nothing() {
        let mut clock = PhaseClock::new(Vec::new());
        clock.finish().unwrap();
        assert!(clock.get_ref().is_empty());
    }

    #[test]
    fn summary_lists_every_strategy() {
        let results: Vec<StrategyResult> = Strategy::ALL
            .iter()
            .zip([1u64, 2, 4, 10])
            .map(|(&strategy, secs)| StrategyResult {
                strategy,
                iterations: 5,
                bytes_per_iteration: MIB,
                elapsed: Duration::from_secs(secs),
            })
            .collect();

        let mut out = Vec::new();
        print_summary(&mut out, &results).unwrap();
        let text = String::from_utf8(out).unwrap();

        for strategy in Strategy::ALL {
            assert!(text.contains(strategy.label()));
        }
        assert!(text.contains("100%"));
        assert!(text.contains(" 10%"));
        assert!(text.contains("0.2s"));
    }
}
