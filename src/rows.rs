use anyhow::{Context, Result, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::riot_api::{MatchDetail, Participant};
use crate::store::Keyed;

const WINDOW_EARLY: &str = "0-10";
const WINDOW_MID: &str = "10-20";

/// The five role slots a clean ranked team maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Adc,
    Sup,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Top, Role::Jungle, Role::Mid, Role::Adc, Role::Sup];

    pub fn index(self) -> usize {
        match self {
            Role::Top => 0,
            Role::Jungle => 1,
            Role::Mid => 2,
            Role::Adc => 3,
            Role::Sup => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Top => "top",
            Role::Jungle => "jun",
            Role::Mid => "mid",
            Role::Adc => "adc",
            Role::Sup => "sup",
        }
    }
}

/// Map a participant's v4 timeline lane/role onto a role slot. Bottom
/// lane needs the duo role to split carry from support; anything else
/// is unclassifiable and the match is skipped upstream.
pub fn classify_role(lane: &str, role: &str) -> Option<Role> {
    match lane.to_ascii_uppercase().as_str() {
        "TOP" => Some(Role::Top),
        "JUNGLE" => Some(Role::Jungle),
        "MIDDLE" | "MID" => Some(Role::Mid),
        "BOTTOM" | "BOT" => match role.to_ascii_uppercase().as_str() {
            "DUO_CARRY" => Some(Role::Adc),
            "DUO_SUPPORT" => Some(Role::Sup),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    /// Uniform 50/50 draw, independent per match. This is what keeps the
    /// training set free of a systematic blue/red bias.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Side {
        if rng.random::<bool>() {
            Side::Blue
        } else {
            Side::Red
        }
    }

    pub fn team_id(self) -> i64 {
        match self {
            Side::Blue => 100,
            Side::Red => 200,
        }
    }
}

struct RoleSlot {
    account_id: String,
    champion_id: i64,
    vision_score: i64,
    cs_diff_10: f64,
    cs_diff_20: f64,
    xp_diff_10: f64,
    xp_diff_20: f64,
}

/// One row of the match table: one randomly chosen side of one match,
/// flattened into per-role columns plus team objectives and the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRow {
    pub match_id: i64,
    pub side: Side,

    pub top_id: String,
    pub top_champ: i64,
    pub top_vs: i64,
    pub top_cs_diff_10: f64,
    pub top_cs_diff_20: f64,
    pub top_xp_diff_10: f64,
    pub top_xp_diff_20: f64,

    pub jun_id: String,
    pub jun_champ: i64,
    pub jun_vs: i64,
    pub jun_cs_diff_10: f64,
    pub jun_cs_diff_20: f64,
    pub jun_xp_diff_10: f64,
    pub jun_xp_diff_20: f64,

    pub mid_id: String,
    pub mid_champ: i64,
    pub mid_vs: i64,
    pub mid_cs_diff_10: f64,
    pub mid_cs_diff_20: f64,
    pub mid_xp_diff_10: f64,
    pub mid_xp_diff_20: f64,

    pub adc_id: String,
    pub adc_champ: i64,
    pub adc_vs: i64,
    pub adc_cs_diff_10: f64,
    pub adc_cs_diff_20: f64,
    pub adc_xp_diff_10: f64,
    pub adc_xp_diff_20: f64,

    pub sup_id: String,
    pub sup_champ: i64,
    pub sup_vs: i64,
    pub sup_cs_diff_10: f64,
    pub sup_cs_diff_20: f64,
    pub sup_xp_diff_10: f64,
    pub sup_xp_diff_20: f64,

    pub first_blood: u8,
    pub first_brick: u8,
    pub first_herald: u8,
    pub first_dragon: u8,
    pub first_baron: u8,
    pub first_inhib: u8,

    pub num_dragons: i64,
    pub num_barons: i64,
    pub num_towers: i64,
    pub num_inhibs: i64,

    pub result: u8,
}

impl MatchRow {
    /// Flatten the chosen side of a match. Fails if the team does not
    /// map cleanly onto exactly one participant per role slot.
    pub fn from_match(detail: &MatchDetail, side: Side) -> Result<MatchRow> {
        let team = detail
            .teams
            .iter()
            .find(|t| t.team_id == side.team_id())
            .with_context(|| format!("match {} has no team {}", detail.game_id, side.team_id()))?;

        let mut slots: [Option<RoleSlot>; 5] = [None, None, None, None, None];

        for participant in detail
            .participants
            .iter()
            .filter(|p| p.team_id == side.team_id())
        {
            let role = classify_role(&participant.timeline.lane, &participant.timeline.role)
                .with_context(|| {
                    format!(
                        "match {}: unclassifiable lane/role {}/{}",
                        detail.game_id, participant.timeline.lane, participant.timeline.role
                    )
                })?;

            let slot = RoleSlot {
                account_id: account_for(detail, participant)?,
                champion_id: participant.champion_id,
                vision_score: participant.stats.vision_score,
                cs_diff_10: participant.timeline.cs_diff(WINDOW_EARLY),
                cs_diff_20: participant.timeline.cs_diff(WINDOW_MID),
                xp_diff_10: participant.timeline.xp_diff(WINDOW_EARLY),
                xp_diff_20: participant.timeline.xp_diff(WINDOW_MID),
            };

            if slots[role.index()].replace(slot).is_some() {
                bail!(
                    "match {}: more than one {} on team {}",
                    detail.game_id,
                    role.label(),
                    side.team_id()
                );
            }
        }

        for (slot, role) in slots.iter().zip(Role::ALL) {
            if slot.is_none() {
                bail!("match {}: no {} assigned", detail.game_id, role.label());
            }
        }

        let [top, jun, mid, adc, sup] = slots.map(|slot| slot.expect("all slots checked"));

        Ok(MatchRow {
            match_id: detail.game_id,
            side,

            top_id: top.account_id,
            top_champ: top.champion_id,
            top_vs: top.vision_score,
            top_cs_diff_10: top.cs_diff_10,
            top_cs_diff_20: top.cs_diff_20,
            top_xp_diff_10: top.xp_diff_10,
            top_xp_diff_20: top.xp_diff_20,

            jun_id: jun.account_id,
            jun_champ: jun.champion_id,
            jun_vs: jun.vision_score,
            jun_cs_diff_10: jun.cs_diff_10,
            jun_cs_diff_20: jun.cs_diff_20,
            jun_xp_diff_10: jun.xp_diff_10,
            jun_xp_diff_20: jun.xp_diff_20,

            mid_id: mid.account_id,
            mid_champ: mid.champion_id,
            mid_vs: mid.vision_score,
            mid_cs_diff_10: mid.cs_diff_10,
            mid_cs_diff_20: mid.cs_diff_20,
            mid_xp_diff_10: mid.xp_diff_10,
            mid_xp_diff_20: mid.xp_diff_20,

            adc_id: adc.account_id,
            adc_champ: adc.champion_id,
            adc_vs: adc.vision_score,
            adc_cs_diff_10: adc.cs_diff_10,
            adc_cs_diff_20: adc.cs_diff_20,
            adc_xp_diff_10: adc.xp_diff_10,
            adc_xp_diff_20: adc.xp_diff_20,

            sup_id: sup.account_id,
            sup_champ: sup.champion_id,
            sup_vs: sup.vision_score,
            sup_cs_diff_10: sup.cs_diff_10,
            sup_cs_diff_20: sup.cs_diff_20,
            sup_xp_diff_10: sup.xp_diff_10,
            sup_xp_diff_20: sup.xp_diff_20,

            first_blood: team.first_blood as u8,
            first_brick: team.first_tower as u8,
            first_herald: team.first_rift_herald as u8,
            first_dragon: team.first_dragon as u8,
            first_baron: team.first_baron as u8,
            first_inhib: team.first_inhibitor as u8,

            num_dragons: team.dragon_kills,
            num_barons: team.baron_kills,
            num_towers: team.tower_kills,
            num_inhibs: team.inhibitor_kills,

            result: team.won() as u8,
        })
    }

    pub fn role_ids(&self) -> [&str; 5] {
        [
            &self.top_id,
            &self.jun_id,
            &self.mid_id,
            &self.adc_id,
            &self.sup_id,
        ]
    }

    pub fn role_pairs(&self) -> [(&str, i64); 5] {
        [
            (&self.top_id, self.top_champ),
            (&self.jun_id, self.jun_champ),
            (&self.mid_id, self.mid_champ),
            (&self.adc_id, self.adc_champ),
            (&self.sup_id, self.sup_champ),
        ]
    }
}

fn account_for(detail: &MatchDetail, participant: &Participant) -> Result<String> {
    detail
        .participant_identities
        .iter()
        .find(|identity| identity.participant_id == participant.participant_id)
        .map(|identity| identity.player.account_id.clone())
        .with_context(|| {
            format!(
                "match {}: participant {} has no identity entry",
                detail.game_id, participant.participant_id
            )
        })
}

impl Keyed for MatchRow {
    type Key = i64;

    fn key(&self) -> i64 {
        self.match_id
    }
}

#[cfg(test)]
impl MatchRow {
    pub(crate) fn sample(match_id: i64, ids: [&str; 5], champs: [i64; 5]) -> MatchRow {
        MatchRow {
            match_id,
            side: Side::Blue,
            top_id: ids[0].to_string(),
            top_champ: champs[0],
            top_vs: 0,
            top_cs_diff_10: 0.0,
            top_cs_diff_20: 0.0,
            top_xp_diff_10: 0.0,
            top_xp_diff_20: 0.0,
            jun_id: ids[1].to_string(),
            jun_champ: champs[1],
            jun_vs: 0,
            jun_cs_diff_10: 0.0,
            jun_cs_diff_20: 0.0,
            jun_xp_diff_10: 0.0,
            jun_xp_diff_20: 0.0,
            mid_id: ids[2].to_string(),
            mid_champ: champs[2],
            mid_vs: 0,
            mid_cs_diff_10: 0.0,
            mid_cs_diff_20: 0.0,
            mid_xp_diff_10: 0.0,
            mid_xp_diff_20: 0.0,
            adc_id: ids[3].to_string(),
            adc_champ: champs[3],
            adc_vs: 0,
            adc_cs_diff_10: 0.0,
            adc_cs_diff_20: 0.0,
            adc_xp_diff_10: 0.0,
            adc_xp_diff_20: 0.0,
            sup_id: ids[4].to_string(),
            sup_champ: champs[4],
            sup_vs: 0,
            sup_cs_diff_10: 0.0,
            sup_cs_diff_20: 0.0,
            sup_xp_diff_10: 0.0,
            sup_xp_diff_20: 0.0,
            first_blood: 0,
            first_brick: 0,
            first_herald: 0,
            first_dragon: 0,
            first_baron: 0,
            first_inhib: 0,
            num_dragons: 0,
            num_barons: 0,
            num_towers: 0,
            num_inhibs: 0,
            result: 1,
        }
    }
}

/// One row of the user table: per-role win/loss counters over a
/// summoner's recent ranked history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleStatsRow {
    pub id: String,
    pub top_wins: u32,
    pub jun_wins: u32,
    pub mid_wins: u32,
    pub adc_wins: u32,
    pub sup_wins: u32,
    pub top_losses: u32,
    pub jun_losses: u32,
    pub mid_losses: u32,
    pub adc_losses: u32,
    pub sup_losses: u32,
}

impl Keyed for UserRoleStatsRow {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Accumulates one summoner's win/loss counts per role.
#[derive(Debug, Default)]
pub struct RoleTally {
    wins: [u32; 5],
    losses: [u32; 5],
}

impl RoleTally {
    pub fn add(&mut self, role: Role, won: bool) {
        if won {
            self.wins[role.index()] += 1;
        } else {
            self.losses[role.index()] += 1;
        }
    }

    pub fn into_row(self, account_id: String) -> UserRoleStatsRow {
        UserRoleStatsRow {
            id: account_id,
            top_wins: self.wins[0],
            jun_wins: self.wins[1],
            mid_wins: self.wins[2],
            adc_wins: self.wins[3],
            sup_wins: self.wins[4],
            top_losses: self.losses[0],
            jun_losses: self.losses[1],
            mid_losses: self.losses[2],
            adc_losses: self.losses[3],
            sup_losses: self.losses[4],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryRow {
    pub summoner_id: String,
    pub champion_id: i64,
    pub mastery_points: i64,
}

impl Keyed for MasteryRow {
    type Key = (String, i64);

    fn key(&self) -> (String, i64) {
        (self.summoner_id.clone(), self.champion_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChampionRow {
    pub id: i64,
    pub name: String,
}

impl Keyed for ChampionRow {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummonerRow {
    pub summoner_id: String,
}

impl Keyed for SummonerRow {
    type Key = String;

    fn key(&self) -> String {
        self.summoner_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riot_api::{
        ParticipantIdentity, ParticipantStats, ParticipantTimeline, PlayerIdentity, TeamStats,
    };
    use std::collections::HashMap;

    fn participant(id: i64, team: i64, champ: i64, lane: &str, role: &str) -> Participant {
        Participant {
            participant_id: id,
            team_id: team,
            champion_id: champ,
            stats: ParticipantStats {
                vision_score: 10 + id,
                win: team == 100,
            },
            timeline: ParticipantTimeline {
                lane: lane.to_string(),
                role: role.to_string(),
                cs_diff_per_min_deltas: HashMap::from([
                    ("0-10".to_string(), 0.5),
                    ("10-20".to_string(), -0.1),
                ]),
                xp_diff_per_min_deltas: HashMap::from([
                    ("0-10".to_string(), 8.0),
                    ("10-20".to_string(), 2.0),
                ]),
            },
        }
    }

    fn team(team_id: i64, win: bool) -> TeamStats {
        TeamStats {
            team_id,
            win: if win { "Win" } else { "Fail" }.to_string(),
            first_blood: win,
            first_tower: false,
            first_rift_herald: true,
            first_dragon: win,
            first_baron: false,
            first_inhibitor: false,
            dragon_kills: 3,
            baron_kills: 1,
            tower_kills: 9,
            inhibitor_kills: 2,
        }
    }

    fn full_match() -> MatchDetail {
        let lanes = [
            ("TOP", "SOLO"),
            ("JUNGLE", "NONE"),
            ("MIDDLE", "SOLO"),
            ("BOTTOM", "DUO_CARRY"),
            ("BOTTOM", "DUO_SUPPORT"),
        ];

        let mut participants = Vec::new();
        let mut identities = Vec::new();
        for team_id in [100, 200] {
            for (slot, (lane, role)) in lanes.iter().enumerate() {
                let id = (team_id / 100) * 10 + slot as i64;
                participants.push(participant(id, team_id, 100 + id, lane, role));
                identities.push(ParticipantIdentity {
                    participant_id: id,
                    player: PlayerIdentity {
                        account_id: format!("acc-{}", id),
                    },
                });
            }
        }

        MatchDetail {
            game_id: 4242,
            participant_identities: identities,
            participants,
            teams: vec![team(100, true), team(200, false)],
        }
    }

    #[test]
    fn classify_covers_all_slots() {
        assert_eq!(classify_role("TOP", "SOLO"), Some(Role::Top));
        assert_eq!(classify_role("JUNGLE", "NONE"), Some(Role::Jungle));
        assert_eq!(classify_role("MIDDLE", "SOLO"), Some(Role::Mid));
        assert_eq!(classify_role("BOTTOM", "DUO_CARRY"), Some(Role::Adc));
        assert_eq!(classify_role("BOTTOM", "DUO_SUPPORT"), Some(Role::Sup));
    }

    #[test]
    fn classify_rejects_ambiguous_bottom() {
        assert_eq!(classify_role("BOTTOM", "DUO"), None);
        assert_eq!(classify_role("BOTTOM", "NONE"), None);
        assert_eq!(classify_role("NONE", "DUO_SUPPORT"), None);
    }

    #[test]
    fn flatten_assigns_every_role_once() {
        let detail = full_match();
        let row = MatchRow::from_match(&detail, Side::Blue).unwrap();

        assert_eq!(row.match_id, 4242);
        assert_eq!(row.side, Side::Blue);
        assert_eq!(row.top_id, "acc-10");
        assert_eq!(row.sup_id, "acc-14");
        assert_eq!(row.jun_champ, 111);
        assert_eq!(row.top_cs_diff_10, 0.5);
        assert_eq!(row.sup_xp_diff_20, 2.0);
        assert_eq!(row.result, 1);
        assert_eq!(row.first_blood, 1);
        assert_eq!(row.first_brick, 0);
        assert_eq!(row.num_dragons, 3);
    }

    #[test]
    fn flatten_red_side_reads_losing_team() {
        let detail = full_match();
        let row = MatchRow::from_match(&detail, Side::Red).unwrap();

        assert_eq!(row.side, Side::Red);
        assert_eq!(row.top_id, "acc-20");
        assert_eq!(row.result, 0);
        assert_eq!(row.first_blood, 0);
    }

    #[test]
    fn flatten_rejects_duplicate_role() {
        let mut detail = full_match();
        // Two blue-side tops, no jungler.
        detail.participants[1].timeline.lane = "TOP".to_string();
        detail.participants[1].timeline.role = "SOLO".to_string();

        let err = MatchRow::from_match(&detail, Side::Blue).unwrap_err();
        assert!(err.to_string().contains("more than one top"));
    }

    #[test]
    fn flatten_rejects_unclassifiable_participant() {
        let mut detail = full_match();
        detail.participants[0].timeline.lane = "NONE".to_string();

        assert!(MatchRow::from_match(&detail, Side::Blue).is_err());
    }

    #[test]
    fn side_draw_is_roughly_fair() {
        let mut rng = rand::rng();
        let blue = (0..10_000)
            .filter(|_| Side::random(&mut rng) == Side::Blue)
            .count();

        assert!((4_000..=6_000).contains(&blue), "blue drawn {} times", blue);
    }

    #[test]
    fn tally_buckets_by_role() {
        let mut tally = RoleTally::default();
        tally.add(Role::Top, true);
        tally.add(Role::Top, false);
        tally.add(Role::Sup, true);

        let row = tally.into_row("acc-1".to_string());
        assert_eq!(row.top_wins, 1);
        assert_eq!(row.top_losses, 1);
        assert_eq!(row.sup_wins, 1);
        assert_eq!(row.sup_losses, 0);
        assert_eq!(row.mid_wins, 0);
    }
}
