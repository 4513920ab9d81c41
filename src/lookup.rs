use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::rows::{ChampionRow, MatchRow, SummonerRow};
use crate::store;

/// Regenerate the champion id/name lookup from the bundled Data Dragon
/// document. Parsing stops at the first malformed entry; whatever was
/// extracted up to that point is still written.
pub fn generate_champions_table(input: &Path, data_dir: &Path) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("Failed to read champion document {}", input.display()))?;
    let doc: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Champion document {} is not JSON", input.display()))?;

    let entries = doc
        .get("data")
        .and_then(Value::as_object)
        .context("Champion document has no data object")?;

    let mut rows = Vec::new();
    for (key, entry) in entries {
        let parsed = entry
            .get("key")
            .and_then(Value::as_str)
            .and_then(|id| id.parse::<i64>().ok())
            .zip(entry.get("id").and_then(Value::as_str));

        match parsed {
            Some((id, name)) => rows.push(ChampionRow {
                id,
                name: name.to_string(),
            }),
            None => {
                eprintln!("[champions-table] malformed entry {:?}, stopping", key);
                break;
            }
        }
    }

    store::write_rows(&data_dir.join(store::CHAMPION_TABLE), &rows)?;
    eprintln!("[champions-table] wrote {} champions", rows.len());

    Ok(())
}

/// Regenerate the single-column summoner lookup from the distinct ids
/// across the match table's five role columns.
pub fn generate_summoners_table(data_dir: &Path) -> Result<()> {
    let matches: Vec<MatchRow> = store::load_rows(&data_dir.join(store::MATCH_TABLE))?;

    let mut ids: BTreeSet<String> = BTreeSet::new();
    for row in &matches {
        for id in row.role_ids() {
            ids.insert(id.to_string());
        }
    }

    let rows: Vec<SummonerRow> = ids
        .into_iter()
        .map(|summoner_id| SummonerRow { summoner_id })
        .collect();

    store::write_rows(&data_dir.join(store::SUMMONER_TABLE), &rows)?;
    eprintln!("[summoners-table] wrote {} summoners", rows.len());

    Ok(())
}
