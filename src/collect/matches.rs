use anyhow::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::riot_api::{QUEUE_RANKED_SOLO, RiotClient};
use crate::rows::{MatchRow, Side};
use crate::store;

#[derive(Debug, Clone)]
pub struct MatchCollectorArgs {
    pub data_dir: PathBuf,
    pub per_account: usize,
}

/// Walk the grandmaster ladder, gather each account's most recent
/// ranked match ids, and flatten every match not yet in the table.
pub fn run(args: &MatchCollectorArgs, client: &RiotClient) -> Result<()> {
    let table = args.data_dir.join(store::MATCH_TABLE);
    let prior: Vec<MatchRow> = store::load_rows(&table)?;
    let known = store::key_set(&prior);

    let ladder = client.get_grandmaster_league()?;
    eprintln!(
        "[collect-matches] {} ladder entries, {} matches already collected",
        ladder.entries.len(),
        prior.len()
    );

    let mut candidates: BTreeSet<i64> = BTreeSet::new();
    for entry in &ladder.entries {
        let summoner = match client.get_summoner_by_id(&entry.summoner_id) {
            Ok(summoner) => summoner,
            Err(err) => {
                eprintln!(
                    "[collect-matches] Failed to resolve summoner {}: {:#}",
                    entry.summoner_id, err
                );
                continue;
            }
        };

        let references = match client.get_ranked_match_references(&summoner.account_id) {
            Ok(references) => references,
            Err(err) => {
                eprintln!(
                    "[collect-matches] Failed to list matches for {}: {:#}",
                    summoner.account_id, err
                );
                continue;
            }
        };

        for reference in references
            .iter()
            .filter(|r| r.queue == QUEUE_RANKED_SOLO)
            .take(args.per_account)
        {
            if !known.contains(&reference.game_id) {
                candidates.insert(reference.game_id);
            }
        }
    }

    eprintln!("[collect-matches] {} new candidate matches", candidates.len());

    let mut rng = rand::rng();
    let mut fresh = Vec::new();

    for game_id in candidates {
        let detail = match client.get_match(game_id) {
            Ok(detail) => detail,
            Err(err) => {
                eprintln!("[collect-matches] Failed to fetch match {}: {:#}", game_id, err);
                continue;
            }
        };

        match MatchRow::from_match(&detail, Side::random(&mut rng)) {
            Ok(row) => fresh.push(row),
            Err(err) => eprintln!("[collect-matches] Skipping match {}: {:#}", game_id, err),
        }
    }

    let added = fresh.len();
    let merged = store::merge_rows(prior, fresh);
    store::write_rows(&table, &merged)?;

    eprintln!(
        "[collect-matches] wrote {} new rows, table now holds {}",
        added,
        merged.len()
    );

    Ok(())
}
