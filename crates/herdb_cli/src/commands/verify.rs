//! Verify command implementation.

use herdb_core::{Config, Store, VerifyReport};
use std::path::Path;

/// Verifies every segment of the store at `path`.
pub fn check(path: &Path) -> Result<Vec<(String, VerifyReport)>, Box<dyn std::error::Error>> {
    let store = Store::open_with_config(path, Config::new().create_if_missing(false))?;
    let reports = store.verify()?;
    store.commit()?;
    Ok(reports)
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {:?}", path);
    println!();

    let reports = check(path)?;
    let mut failed = false;
    for (name, report) in &reports {
        let verdict = if report.is_ok() { "OK" } else { "FAILED" };
        println!(
            "{name}: {verdict} ({} records, {} live slots)",
            report.records, report.live
        );
        for problem in &report.problems {
            println!("  - {problem}");
        }
        failed |= !report.is_ok();
    }

    println!();
    if failed {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    } else {
        println!("✓ Store verification passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn healthy_store_passes() {
        let temp = tempdir().unwrap();
        let store = Store::open_with_config(temp.path(), Config::new().segments(3).initial_capacity(4)).unwrap();
        for i in 0..100u32 {
            store.put(format!("k{i}").as_bytes(), b"v").unwrap();
        }
        store.commit().unwrap();

        let reports = check(temp.path()).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(reports.iter().map(|(_, r)| r.live).sum::<usize>(), 100);
        run(temp.path()).unwrap();
    }
}
