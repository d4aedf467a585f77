//! Progress reporting: timestamped per-level lines, exact state counts,
//! table occupancy, and resident set size.

use std::fmt::Write as _;
use std::time::Instant;

use num_bigint::BigUint;

use crate::model::Domain;
use crate::reference::Ref;
use crate::tbdd::Tbdd;

/// Inserts thousands separators into a decimal rendering. There is no locale
/// machinery to lean on, so grouping is fixed at 3 with `,`.
pub fn group_thousands(n: &BigUint) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Renders a byte count with binary units, one decimal per unit step.
pub fn to_human(size: f64) -> String {
    const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
    let mut size = size;
    let mut i = 0;
    while size > 1024.0 && i + 1 < UNITS.len() {
        size /= 1024.0;
        i += 1;
    }
    format!("{:.*} {}", i, size, UNITS[i])
}

/// Resident set size of this process, if the platform exposes it.
pub fn current_rss() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Formats an assignment over the full state domain as a state vector.
/// Bits arrive in variable order, most significant bit of each component
/// first.
pub fn format_state(domain: &Domain, bits: &[u8]) -> String {
    let mut out = String::from("[");
    let mut x = 0;
    for (i, &width) in domain.statebits.iter().enumerate() {
        let mut value: u64 = 0;
        for _ in 0..width {
            value = (value << 1) | bits[x] as u64;
            x += 1;
        }
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", value);
    }
    out.push(']');
    out
}

/// Emits the per-level and summary lines of a run, each prefixed with the
/// wall-clock seconds since startup.
pub struct Reporter {
    start: Instant,
    pub report_levels: bool,
    pub report_table: bool,
}

impl Reporter {
    pub fn new(report_levels: bool, report_table: bool) -> Self {
        Self {
            start: Instant::now(),
            report_levels,
            report_table,
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// One timestamped line on stdout.
    pub fn info(&self, message: &str) {
        println!("[{:8.2}] {}", self.elapsed(), message);
    }

    pub fn memory_usage(&self) {
        if let Some(rss) = current_rss() {
            self.info(&format!("Memory usage: {}", to_human(rss as f64)));
        }
    }

    /// The end-of-level line: iteration number, then whatever was asked for.
    pub fn level_done(&self, tbdd: &Tbdd, iteration: usize, visited: Ref, variables: Ref) {
        let mut line = format!("Level {} done", iteration);
        if self.report_levels {
            let count = tbdd.satcount(visited, variables);
            let _ = write!(line, ", {} states explored", group_thousands(&count));
        }
        if self.report_table {
            let (filled, total) = tbdd.table_usage();
            let _ = write!(
                line,
                ", table: {:.1}% full ({} nodes)",
                100.0 * filled as f64 / total as f64,
                group_thousands(&BigUint::from(filled))
            );
        }
        if let Some(rss) = current_rss() {
            let _ = write!(line, ", rss={}", to_human(rss as f64));
        }
        line.push('.');
        self.info(&line);
    }

    /// Final statistics of the manager.
    pub fn stats_report(&self, tbdd: &Tbdd) {
        for line in stats_lines(tbdd) {
            self.info(&line);
        }
    }
}

/// Renders the manager statistics; shared by stdout reporting and the
/// profile dump.
pub fn stats_lines(tbdd: &Tbdd) -> Vec<String> {
    let stats = tbdd.stats();
    let lookups = stats.cache_hits + stats.cache_misses;
    let hit_rate = if lookups > 0 {
        100.0 * stats.cache_hits as f64 / lookups as f64
    } else {
        0.0
    };
    vec![
        format!(
            "Table: {} of {} nodes used ({} growths)",
            group_thousands(&BigUint::from(stats.table_filled)),
            group_thousands(&BigUint::from(stats.table_capacity)),
            stats.table_growths
        ),
        format!(
            "Cache: {} hits, {} misses, {} collisions ({:.1}% hit rate)",
            group_thousands(&BigUint::from(stats.cache_hits)),
            group_thousands(&BigUint::from(stats.cache_misses)),
            group_thousands(&BigUint::from(stats.cache_faults)),
            hit_rate
        ),
    ]
}
