use anyhow::{Context, Result, bail};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use crate::riot_api::RiotClient;
use crate::rows::{MasteryRow, MatchRow};
use crate::store;

#[derive(Debug, Clone)]
pub struct MasteryCollectorArgs {
    pub data_dir: PathBuf,
    pub batch_limit: usize,
}

/// Fetch mastery points for every (summoner, champion) pair observed in
/// the match table and not yet collected. Bounded per run; failing
/// pairs land in the error log and the batch keeps going.
pub fn run(args: &MasteryCollectorArgs, client: &RiotClient) -> Result<()> {
    let matches: Vec<MatchRow> = store::load_rows(&args.data_dir.join(store::MATCH_TABLE))?;
    if matches.is_empty() {
        bail!(
            "No match table in {}; run collect-matches first",
            args.data_dir.display()
        );
    }

    let table = args.data_dir.join(store::MASTERY_TABLE);
    let prior: Vec<MasteryRow> = store::load_rows(&table)?;
    let known = store::key_set(&prior);

    let pending = missing_pairs(&matches, &known);
    let total = pending.len();
    let batch: Vec<(String, i64)> = pending.into_iter().take(args.batch_limit).collect();
    eprintln!(
        "[collect-mastery] {} missing pairs, fetching {} this run",
        total,
        batch.len()
    );

    let log_path = args.data_dir.join(store::MASTERY_ERROR_LOG);
    let mut error_log = File::create(&log_path)
        .with_context(|| format!("Failed to create error log {}", log_path.display()))?;
    writeln!(error_log, "# run {}", chrono::Utc::now().to_rfc3339())?;
    let mut failed = 0usize;

    let mut fresh = Vec::new();
    for (account_id, champion_id) in batch {
        match fetch_pair(client, &account_id, champion_id) {
            Ok(row) => fresh.push(row),
            Err(err) => {
                failed += 1;
                writeln!(error_log, "{},{},{:#}", account_id, champion_id, err)?;
            }
        }
    }

    let added = fresh.len();
    let merged = store::merge_rows(prior, fresh);
    store::write_rows(&table, &merged)?;

    eprintln!(
        "[collect-mastery] wrote {} new rows ({} failed, see {}), table now holds {}",
        added,
        failed,
        log_path.display(),
        merged.len()
    );

    Ok(())
}

/// (summoner, champion) pairs occupying role slots in the match table,
/// minus pairs already collected. Computed before any request goes out.
fn missing_pairs(
    matches: &[MatchRow],
    known: &HashSet<(String, i64)>,
) -> BTreeSet<(String, i64)> {
    let mut pending = BTreeSet::new();
    for row in matches {
        for (id, champion) in row.role_pairs() {
            let pair = (id.to_string(), champion);
            if !known.contains(&pair) {
                pending.insert(pair);
            }
        }
    }
    pending
}

fn fetch_pair(client: &RiotClient, account_id: &str, champion_id: i64) -> Result<MasteryRow> {
    let summoner = client
        .get_summoner_by_account(account_id)
        .context("summoner lookup failed")?;
    let mastery_points = client
        .get_mastery_points(&summoner.id, champion_id)
        .context("mastery fetch failed")?;

    Ok(MasteryRow {
        summoner_id: account_id.to_string(),
        champion_id,
        mastery_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pairs_subtracts_known_before_fetching() {
        let matches = vec![
            MatchRow::sample(1, ["a", "b", "c", "d", "e"], [1, 2, 3, 4, 5]),
            MatchRow::sample(2, ["a", "b", "c", "d", "e"], [9, 2, 3, 4, 5]),
        ];
        let known: HashSet<(String, i64)> =
            [("a".to_string(), 1), ("c".to_string(), 3)].into_iter().collect();

        let pending = missing_pairs(&matches, &known);

        // ("a", 1) and ("c", 3) are already collected; ("a", 9) is new.
        assert!(!pending.contains(&("a".to_string(), 1)));
        assert!(!pending.contains(&("c".to_string(), 3)));
        assert!(pending.contains(&("a".to_string(), 9)));
        assert_eq!(pending.len(), 4);
    }

    #[test]
    fn duplicate_pairs_collapse() {
        let matches = vec![
            MatchRow::sample(1, ["a", "b", "c", "d", "e"], [1, 2, 3, 4, 5]),
            MatchRow::sample(2, ["a", "b", "c", "d", "e"], [1, 2, 3, 4, 5]),
        ];

        let pending = missing_pairs(&matches, &HashSet::new());
        assert_eq!(pending.len(), 5);
    }
}
