use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::path::Path;

pub const MATCH_TABLE: &str = "match_data.csv";
pub const USER_TABLE: &str = "user_data.csv";
pub const MASTERY_TABLE: &str = "mastery.csv";
pub const CHAMPION_TABLE: &str = "champions.csv";
pub const SUMMONER_TABLE: &str = "names.csv";
pub const MASTERY_ERROR_LOG: &str = "mastery_errors.log";

/// A table row with a dedup key. Collectors only ever fetch keys that
/// are absent from the prior table, and merges drop rows whose key was
/// already seen.
pub trait Keyed {
    type Key: Eq + Hash;

    fn key(&self) -> Self::Key;
}

/// Read a whole CSV table. A missing file is an empty table.
pub fn load_rows<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open table {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.with_context(|| format!("Malformed row in {}", path.display()))?);
    }

    Ok(rows)
}

pub fn key_set<R: Keyed>(rows: &[R]) -> HashSet<R::Key> {
    rows.iter().map(Keyed::key).collect()
}

/// Union prior and fresh rows. First-seen wins: a key already present in
/// the prior table keeps its original row, and duplicate keys inside a
/// batch keep their first occurrence.
pub fn merge_rows<R: Keyed>(prior: Vec<R>, fresh: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(prior.len() + fresh.len());

    for row in prior.into_iter().chain(fresh) {
        if seen.insert(row.key()) {
            merged.push(row);
        }
    }

    merged
}

/// Rewrite a table in full. The new contents land in a sibling temp file
/// first and replace the target via rename, so a failure mid-write
/// leaves the previous table intact.
pub fn write_rows<R: Serialize>(path: &Path, rows: &[R]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("csv.tmp");

    let mut writer = csv::Writer::from_path(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace table {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::MasteryRow;

    fn row(summoner: &str, champion: i64, points: i64) -> MasteryRow {
        MasteryRow {
            summoner_id: summoner.to_string(),
            champion_id: champion,
            mastery_points: points,
        }
    }

    #[test]
    fn missing_table_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<MasteryRow> = load_rows(&dir.path().join("mastery.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mastery.csv");

        write_rows(&path, &[row("a", 1, 100), row("b", 2, 200)]).unwrap();
        let loaded: Vec<MasteryRow> = load_rows(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].summoner_id, "a");
        assert_eq!(loaded[1].mastery_points, 200);
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mastery.csv");

        write_rows(&path, &[row("a", 1, 100)]).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn merge_first_seen_wins() {
        let prior = vec![row("a", 1, 100)];
        let fresh = vec![row("a", 1, 999), row("b", 2, 200)];

        let merged = merge_rows(prior, fresh);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].mastery_points, 100);
        assert_eq!(merged[1].summoner_id, "b");
    }

    #[test]
    fn merge_never_drops_unique_keys() {
        let prior = vec![row("a", 1, 1), row("a", 2, 2)];
        let fresh = vec![row("b", 1, 3), row("b", 2, 4)];

        let merged = merge_rows(prior, fresh);
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn replayed_merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mastery.csv");
        let batch = vec![row("a", 1, 100), row("b", 2, 200)];

        write_rows(&path, &merge_rows(Vec::new(), batch.clone())).unwrap();
        let first: Vec<MasteryRow> = load_rows(&path).unwrap();

        write_rows(&path, &merge_rows(first.clone(), batch)).unwrap();
        let second: Vec<MasteryRow> = load_rows(&path).unwrap();

        assert_eq!(first.len(), second.len());
    }
}
