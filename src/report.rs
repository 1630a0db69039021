//! Append-only report writers: a human-readable summary block and a CSV row.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::metrics::RunSummary;

pub const CSV_HEADER: &str = "Timestamp,Nodes,Workers,Avg Total (us),Min (us),Max (us),Median (us),Success %,Dropped %,Wall Time (s)";

const RULE: &str = "-----------------------------------------";

pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

pub fn summary_block(generated: &str, workers: usize, s: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str("Performance Summary Report\n");
    out.push_str(&format!("Generated: {generated}\n"));
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Nodes: {}\n", s.nodes));
    out.push_str(&format!("Workers: {workers}\n"));
    out.push_str(&format!("Average Time Per Node: {} ms\n", ms(s.avg_us)));
    out.push_str(&format!("Minimum Time Observed: {} ms\n", ms(s.min_us)));
    out.push_str(&format!("Maximum Time Observed: {} ms\n", ms(s.max_us)));
    out.push_str(&format!("Median Time Per Node: {} ms\n", ms(s.median_us)));
    out.push_str(&format!("Success Percentage: {:.2} %\n", s.success_pct));
    out.push_str(&format!("Dropped Percentage: {:.2} %\n", s.drop_pct));
    out.push_str(&format!("Run Wall Time: {:.6} s\n", s.wall_time.as_secs_f64()));
    out.push_str(RULE);
    out.push_str("\n\n");
    out
}

pub fn csv_row(generated: &str, workers: usize, s: &RunSummary) -> String {
    format!(
        "{},{},{},{},{},{},{},{:.2},{:.2},{:.6}",
        generated,
        s.nodes,
        workers,
        s.avg_us,
        s.min_us,
        s.max_us,
        s.median_us,
        s.success_pct,
        s.drop_pct,
        s.wall_time.as_secs_f64()
    )
}

fn open_append(path: &Path) -> std::io::Result<BufWriter<File>> {
    let f = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(f))
}

pub fn append_summary(path: impl AsRef<Path>, workers: usize, s: &RunSummary) -> std::io::Result<()> {
    let mut w = open_append(path.as_ref())?;
    w.write_all(summary_block(&timestamp(), workers, s).as_bytes())?;
    w.flush()
}

/// Append one row, writing the header first if the file did not exist yet.
pub fn append_csv(path: impl AsRef<Path>, workers: usize, s: &RunSummary) -> std::io::Result<()> {
    let path = path.as_ref();
    let new_file = !path.exists();
    let mut w = open_append(path)?;
    if new_file {
        writeln!(w, "{CSV_HEADER}")?;
    }
    writeln!(w, "{}", csv_row(&timestamp(), workers, s))?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn summary() -> RunSummary {
        RunSummary {
            nodes: 10,
            completed: 9,
            succeeded: 8,
            dropped: 1,
            avg_us: 23_456,
            min_us: 20_000,
            max_us: 31_500,
            median_us: 22_000,
            success_pct: 80.0,
            drop_pct: 10.0,
            wall_time: Duration::from_micros(1_234_567),
        }
    }

    #[test]
    fn summary_block_layout() {
        let text = summary_block("2024-01-02 03:04:05", 4, &summary());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Performance Summary Report");
        assert_eq!(lines[1], "Generated: 2024-01-02 03:04:05");
        assert_eq!(lines[3], "Nodes: 10");
        assert_eq!(lines[4], "Workers: 4");
        assert_eq!(lines[5], "Average Time Per Node: 23.456 ms");
        assert_eq!(lines[6], "Minimum Time Observed: 20 ms");
        assert_eq!(lines[9], "Success Percentage: 80.00 %");
        assert_eq!(lines[10], "Dropped Percentage: 10.00 %");
        assert_eq!(lines[11], "Run Wall Time: 1.234567 s");
        assert!(text.ends_with("-\n\n"));
    }

    #[test]
    fn csv_row_layout() {
        assert_eq!(
            csv_row("T", 4, &summary()),
            "T,10,4,23456,20000,31500,22000,80.00,10.00,1.234567"
        );
    }

    #[test]
    fn csv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf.csv");
        append_csv(&path, 4, &summary()).unwrap();
        append_csv(&path, 4, &summary()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",10,4,23456,20000,31500,22000,80.00,10.00,1.234567"));
    }

    #[test]
    fn summary_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final.txt");
        append_summary(&path, 2, &summary()).unwrap();
        append_summary(&path, 2, &summary()).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.matches("Performance Summary Report").count(), 2);
    }
}
