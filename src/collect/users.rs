use anyhow::{Context, Result, bail};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use crate::riot_api::{MatchDetail, RiotClient};
use crate::rows::{MatchRow, Role, RoleTally, UserRoleStatsRow, classify_role};
use crate::store;

#[derive(Debug, Clone)]
pub struct UserCollectorArgs {
    pub data_dir: PathBuf,
    pub games: usize,
}

/// For every summoner in the match table without a user row yet, tally
/// wins and losses per role over their recent ranked history. One bad
/// summoner never aborts the batch.
pub fn run(args: &UserCollectorArgs, client: &RiotClient) -> Result<()> {
    let matches: Vec<MatchRow> = store::load_rows(&args.data_dir.join(store::MATCH_TABLE))?;
    if matches.is_empty() {
        bail!(
            "No match table in {}; run collect-matches first",
            args.data_dir.display()
        );
    }

    let table = args.data_dir.join(store::USER_TABLE);
    let prior: Vec<UserRoleStatsRow> = store::load_rows(&table)?;
    let known = store::key_set(&prior);

    let pending = missing_ids(&matches, &known);
    eprintln!("[collect-users] {} summoners to fetch", pending.len());

    let mut fresh = Vec::new();
    for account_id in &pending {
        match collect_role_stats(client, account_id, args.games) {
            Ok(row) => fresh.push(row),
            Err(err) => {
                eprintln!("[collect-users] Skipping summoner {}: {:#}", account_id, err)
            }
        }
    }

    let added = fresh.len();
    let merged = store::merge_rows(prior, fresh);
    store::write_rows(&table, &merged)?;

    eprintln!(
        "[collect-users] wrote {} new rows, table now holds {}",
        added,
        merged.len()
    );

    Ok(())
}

/// Summoner ids occupying any role slot in the match table, minus those
/// already collected. Computed before any request goes out.
fn missing_ids(matches: &[MatchRow], known: &HashSet<String>) -> BTreeSet<String> {
    let mut pending = BTreeSet::new();
    for row in matches {
        for id in row.role_ids() {
            if !known.contains(id) {
                pending.insert(id.to_string());
            }
        }
    }
    pending
}

fn collect_role_stats(
    client: &RiotClient,
    account_id: &str,
    games: usize,
) -> Result<UserRoleStatsRow> {
    let references = client
        .get_ranked_match_references(account_id)
        .context("matchlist fetch failed")?;

    let mut tally = RoleTally::default();
    for reference in references.iter().take(games) {
        let detail = match client.get_match(reference.game_id) {
            Ok(detail) => detail,
            Err(err) => {
                eprintln!(
                    "[collect-users] Failed to fetch match {}: {:#}",
                    reference.game_id, err
                );
                continue;
            }
        };

        // Matches where the summoner's slot cannot be classified do not
        // count toward any bucket.
        if let Some((role, won)) = role_and_result(&detail, account_id) {
            tally.add(role, won);
        }
    }

    Ok(tally.into_row(account_id.to_string()))
}

fn role_and_result(detail: &MatchDetail, account_id: &str) -> Option<(Role, bool)> {
    let identity = detail
        .participant_identities
        .iter()
        .find(|identity| identity.player.account_id == account_id)?;
    let participant = detail
        .participants
        .iter()
        .find(|p| p.participant_id == identity.participant_id)?;
    let role = classify_role(&participant.timeline.lane, &participant.timeline.role)?;

    Some((role, participant.stats.win))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riot_api::{
        Participant, ParticipantIdentity, ParticipantStats, ParticipantTimeline, PlayerIdentity,
    };
    use std::collections::HashMap;

    fn one_player_match(account_id: &str, lane: &str, role: &str, won: bool) -> MatchDetail {
        MatchDetail {
            game_id: 1,
            participant_identities: vec![ParticipantIdentity {
                participant_id: 7,
                player: PlayerIdentity {
                    account_id: account_id.to_string(),
                },
            }],
            participants: vec![Participant {
                participant_id: 7,
                team_id: 100,
                champion_id: 1,
                stats: ParticipantStats {
                    vision_score: 0,
                    win: won,
                },
                timeline: ParticipantTimeline {
                    lane: lane.to_string(),
                    role: role.to_string(),
                    cs_diff_per_min_deltas: HashMap::new(),
                    xp_diff_per_min_deltas: HashMap::new(),
                },
            }],
            teams: Vec::new(),
        }
    }

    #[test]
    fn locates_player_and_classifies_role() {
        let detail = one_player_match("acc-7", "BOTTOM", "DUO_SUPPORT", true);
        assert_eq!(role_and_result(&detail, "acc-7"), Some((Role::Sup, true)));
    }

    #[test]
    fn unknown_player_yields_nothing() {
        let detail = one_player_match("acc-7", "TOP", "SOLO", true);
        assert_eq!(role_and_result(&detail, "acc-8"), None);
    }

    #[test]
    fn unclassifiable_slot_yields_nothing() {
        let detail = one_player_match("acc-7", "BOTTOM", "DUO", false);
        assert_eq!(role_and_result(&detail, "acc-7"), None);
    }

    #[test]
    fn missing_ids_skips_known_summoners() {
        let matches = vec![
            MatchRow::sample(1, ["a", "b", "c", "d", "e"], [1, 2, 3, 4, 5]),
            MatchRow::sample(2, ["a", "f", "c", "d", "e"], [1, 2, 3, 4, 5]),
        ];
        let known: HashSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();

        let pending = missing_ids(&matches, &known);
        let expected: BTreeSet<String> =
            ["b", "d", "e", "f"].iter().map(|s| s.to_string()).collect();
        assert_eq!(pending, expected);
    }
}
