//! Inspect command implementation.

use herdb_core::{CacheStats, Config, SegmentStats, Store};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Number of segments.
    pub segment_count: u32,
    /// Largest capacity a segment may grow to.
    pub max_capacity: u32,
    /// Distinct live keys.
    pub key_count: usize,
    /// Total data log size in bytes.
    pub log_bytes: u64,
    /// Per-segment statistics.
    pub segments: Vec<SegmentReport>,
    /// Read cache statistics, if enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

/// Statistics for one segment.
#[derive(Debug, Serialize)]
pub struct SegmentReport {
    /// Segment file stem.
    pub name: String,
    /// Index counters.
    #[serde(flatten)]
    pub stats: SegmentStats,
}

/// Collects statistics for the store at `path`.
pub fn collect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = Store::open_with_config(path, Config::new().create_if_missing(false))?;
    let stats = store.stats()?;
    let result = InspectResult {
        path: path.display().to_string(),
        segment_count: store.config().segments,
        max_capacity: store.config().max_capacity,
        key_count: stats.keys(),
        log_bytes: stats.log_bytes(),
        segments: store
            .segments()
            .iter()
            .zip(stats.segments)
            .map(|(segment, stats)| SegmentReport {
                name: segment.name().to_string(),
                stats,
            })
            .collect(),
        cache: stats.cache,
    };
    store.commit()?;
    Ok(result)
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("herdb Store Inspection");
    println!("======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Layout:");
    println!("  Segments:      {}", result.segment_count);
    println!("  Max capacity:  {}", result.max_capacity);
    println!();
    println!("Data:");
    println!("  Live keys:     {}", result.key_count);
    println!("  Log size:      {}", format_size(result.log_bytes));
    println!();
    println!("Segments:");
    for segment in &result.segments {
        let s = &segment.stats;
        println!(
            "  {:<12} capacity {:>9}  overflow {:>9}  keys {:>9}  log {}",
            segment.name,
            s.capacity,
            s.current,
            s.occupied,
            format_size(s.log_bytes)
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
