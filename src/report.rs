//! Reconciliation between catalog keys and the local collection, and the
//! tab-separated exports summarizing a run.

use anyhow::{Context, Result};
use log::info;
use rustc_hash::FxHashSet;
use std::path::Path;

use crate::models::ReconciliationReport;

pub const CATALOG_EXPORT: &str = "catalog_playlist.txt";
pub const MISSING_FROM_LOCAL_EXPORT: &str = "missing_from_local.txt";
pub const MISSING_FROM_CATALOG_EXPORT: &str = "missing_from_catalog.txt";
pub const UNMATCHED_EXPORT: &str = "unmatched_tagged.txt";
pub const FAILURES_EXPORT: &str = "tagging_failures.txt";

/// One-directional set differences, each in its input's order.
pub fn reconcile<C, L>(catalog_keys: C, local_stems: L) -> ReconciliationReport
where
    C: IntoIterator,
    C::Item: AsRef<str>,
    L: IntoIterator,
    L::Item: AsRef<str>,
{
    let catalog: Vec<String> = catalog_keys
        .into_iter()
        .map(|k| k.as_ref().to_string())
        .collect();
    let local: Vec<String> = local_stems
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();

    let catalog_set: FxHashSet<&str> = catalog.iter().map(String::as_str).collect();
    let local_set: FxHashSet<&str> = local.iter().map(String::as_str).collect();

    ReconciliationReport {
        missing_from_local: catalog
            .iter()
            .filter(|k| !local_set.contains(k.as_str()))
            .cloned()
            .collect(),
        missing_from_catalog: local
            .iter()
            .filter(|s| !catalog_set.contains(s.as_str()))
            .cloned()
            .collect(),
    }
}

/// Write `rows` as `<index>\t<field>...` records, no header.
///
/// An empty list writes nothing and removes a stale export from an
/// earlier run. Returns whether a file was written.
fn write_rows<'a, I, R>(path: &Path, rows: I) -> Result<bool>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = &'a str>,
{
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale {}", path.display()))?;
        }
        return Ok(false);
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for (i, row) in rows.enumerate() {
        writer.write_field(i.to_string())?;
        for field in row {
            writer.write_field(field)?;
        }
        writer.write_record(None::<&[u8]>)?;
    }
    writer.flush()?;
    Ok(true)
}

/// Write `values` as `<index>\t<value>` rows. See [`write_rows`].
pub fn write_export(path: &Path, values: &[String]) -> Result<bool> {
    write_rows(path, values.iter().map(|v| [v.as_str()]))
}

pub fn export_catalog_keys(output_dir: &Path, keys: &[String]) -> Result<bool> {
    write_export(&output_dir.join(CATALOG_EXPORT), keys)
}

pub fn export_unmatched(output_dir: &Path, stems: &[String]) -> Result<bool> {
    write_export(&output_dir.join(UNMATCHED_EXPORT), stems)
}

/// Groups the tagging pass gave up on, as `<index>\t<stem>\t<reason>` rows.
pub fn export_failures(output_dir: &Path, failures: &[(String, String)]) -> Result<bool> {
    write_rows(
        &output_dir.join(FAILURES_EXPORT),
        failures
            .iter()
            .map(|(stem, reason)| [stem.as_str(), reason.as_str()]),
    )
}

/// Write both reconciliation lists under `output_dir`.
pub fn export_report(output_dir: &Path, report: &ReconciliationReport) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    write_export(
        &output_dir.join(MISSING_FROM_LOCAL_EXPORT),
        &report.missing_from_local,
    )?;
    write_export(
        &output_dir.join(MISSING_FROM_CATALOG_EXPORT),
        &report.missing_from_catalog,
    )?;
    info!(
        "{} catalog tracks missing locally, {} local tracks not in the catalog",
        report.missing_from_local.len(),
        report.missing_from_catalog.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reconcile_differences() {
        let report = reconcile(["A", "B", "C"], ["B", "C", "D"]);
        assert_eq!(report.missing_from_local, vec!["A"]);
        assert_eq!(report.missing_from_catalog, vec!["D"]);
    }

    #[test]
    fn test_reconcile_identical_sets() {
        let report = reconcile(["A", "B"], ["B", "A"]);
        assert!(report.missing_from_local.is_empty());
        assert!(report.missing_from_catalog.is_empty());
    }

    #[test]
    fn test_reconcile_lists_are_disjoint_and_ordered() {
        let report = reconcile(["Z", "A", "M", "Q"], ["Q", "Y", "B"]);
        assert_eq!(report.missing_from_local, vec!["Z", "A", "M"]);
        assert_eq!(report.missing_from_catalog, vec!["Y", "B"]);
        for key in &report.missing_from_local {
            assert!(!report.missing_from_catalog.contains(key));
        }
    }

    #[test]
    fn test_export_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.txt");
        let values = vec!["A - One".to_string(), "B, C - Two (Remix)".to_string()];
        assert!(write_export(&path, &values).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0\tA - One\n1\tB, C - Two (Remix)\n"
        );
    }

    #[test]
    fn test_failure_rows_carry_reason() {
        let tmp = TempDir::new().unwrap();
        let failures = vec![
            ("Nobody - Knows".to_string(), "no results".to_string()),
            ("Lo - Conf".to_string(), "refusing to overwrite".to_string()),
        ];
        assert!(export_failures(tmp.path(), &failures).unwrap());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join(FAILURES_EXPORT)).unwrap(),
            "0\tNobody - Knows\tno results\n1\tLo - Conf\trefusing to overwrite\n"
        );

        assert!(!export_failures(tmp.path(), &[]).unwrap());
        assert!(!tmp.path().join(FAILURES_EXPORT).exists());
    }

    #[test]
    fn test_empty_export_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let report = ReconciliationReport {
            missing_from_local: vec!["A - One".to_string()],
            missing_from_catalog: Vec::new(),
        };
        std::fs::write(tmp.path().join(MISSING_FROM_CATALOG_EXPORT), "0\tstale\n").unwrap();

        export_report(tmp.path(), &report).unwrap();
        assert!(tmp.path().join(MISSING_FROM_LOCAL_EXPORT).exists());
        assert!(!tmp.path().join(MISSING_FROM_CATALOG_EXPORT).exists());
    }
}
