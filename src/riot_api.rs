use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::{Mutex, OnceLock};
use std::thread::sleep;
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://na1.api.riotgames.com";
pub const QUEUE_RANKED_SOLO: u32 = 420;
const DEFAULT_MAX_REQS_PER_2MIN: usize = 80;
const DEFAULT_MAX_REQS_PER_SEC: usize = 20;

/// Start of season 9 ranked play (2019-01-23T00:00:00Z), in epoch millis.
/// Matchlist queries never reach past this boundary.
pub const SEASON_START_MS: i64 = 1_548_201_600_000;

static GLOBAL_THROTTLE: OnceLock<Mutex<Throttle>> = OnceLock::new();

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueList {
    pub entries: Vec<LeagueEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    pub summoner_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    pub id: String,
    pub account_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchList {
    pub matches: Vec<MatchReference>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReference {
    pub game_id: i64,
    pub queue: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub game_id: i64,
    pub participant_identities: Vec<ParticipantIdentity>,
    pub participants: Vec<Participant>,
    pub teams: Vec<TeamStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    pub participant_id: i64,
    pub player: PlayerIdentity,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerIdentity {
    pub account_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub participant_id: i64,
    pub team_id: i64,
    pub champion_id: i64,
    pub stats: ParticipantStats,
    pub timeline: ParticipantTimeline,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    #[serde(default)]
    pub vision_score: i64,
    pub win: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantTimeline {
    pub lane: String,
    pub role: String,
    #[serde(default)]
    pub cs_diff_per_min_deltas: HashMap<String, f64>,
    #[serde(default)]
    pub xp_diff_per_min_deltas: HashMap<String, f64>,
}

impl ParticipantTimeline {
    pub fn cs_diff(&self, window: &str) -> f64 {
        self.cs_diff_per_min_deltas
            .get(window)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn xp_diff(&self, window: &str) -> f64 {
        self.xp_diff_per_min_deltas
            .get(window)
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStats {
    pub team_id: i64,
    pub win: String,
    pub first_blood: bool,
    pub first_tower: bool,
    pub first_rift_herald: bool,
    pub first_dragon: bool,
    pub first_baron: bool,
    pub first_inhibitor: bool,
    pub dragon_kills: i64,
    pub baron_kills: i64,
    pub tower_kills: i64,
    pub inhibitor_kills: i64,
}

impl TeamStats {
    pub fn won(&self) -> bool {
        self.win == "Win"
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChampionMastery {
    champion_points: i64,
}

fn build_headers() -> Result<HeaderMap> {
    let api_key = env::var("RIOT_API_KEY").context("RIOT_API_KEY is not set")?;

    let mut headers = HeaderMap::new();
    headers.insert("X-Riot-Token", HeaderValue::from_str(&api_key)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(headers)
}

pub struct RiotClient {
    client: Client,
    headers: HeaderMap,
}

impl RiotClient {
    pub fn new() -> Result<Self> {
        global_throttle();

        Ok(Self {
            client: Client::new(),
            headers: build_headers()?,
        })
    }

    pub fn new_with_max(max_reqs_per_2min: usize) -> Result<Self> {
        {
            let mut guard = global_throttle()
                .lock()
                .expect("throttle mutex poisoned while setting cap");
            guard.set_cap_per_2min(max_reqs_per_2min);
        }

        Ok(Self {
            client: Client::new(),
            headers: build_headers()?,
        })
    }

    /// The grandmaster ladder for ranked solo queue.
    pub fn get_grandmaster_league(&self) -> Result<LeagueList> {
        let url = format!(
            "{}/lol/league/v4/grandmasterleagues/by-queue/RANKED_SOLO_5x5",
            BASE_URL
        );

        self.get_json(&url)
    }

    pub fn get_summoner_by_id(&self, summoner_id: &str) -> Result<Summoner> {
        let url = format!("{}/lol/summoner/v4/summoners/{}", BASE_URL, summoner_id);

        self.get_json(&url)
    }

    pub fn get_summoner_by_account(&self, account_id: &str) -> Result<Summoner> {
        let url = format!(
            "{}/lol/summoner/v4/summoners/by-account/{}",
            BASE_URL, account_id
        );

        self.get_json(&url)
    }

    /// Ranked solo queue match references for an account, newest first,
    /// bounded below by the season start.
    pub fn get_ranked_match_references(&self, account_id: &str) -> Result<Vec<MatchReference>> {
        let url = format!(
            "{}/lol/match/v4/matchlists/by-account/{}?queue={}&beginTime={}",
            BASE_URL, account_id, QUEUE_RANKED_SOLO, SEASON_START_MS
        );

        let list: MatchList = self.get_json(&url)?;
        Ok(list.matches)
    }

    pub fn get_match(&self, game_id: i64) -> Result<MatchDetail> {
        let url = format!("{}/lol/match/v4/matches/{}", BASE_URL, game_id);

        self.get_json(&url)
    }

    pub fn get_mastery_points(&self, summoner_id: &str, champion_id: i64) -> Result<i64> {
        let url = format!(
            "{}/lol/champion-mastery/v4/champion-masteries/by-summoner/{}/by-champion/{}",
            BASE_URL, summoner_id, champion_id
        );

        let mastery: ChampionMastery = self.get_json(&url)?;
        Ok(mastery.champion_points)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.request_with_retry(url)?;
        response
            .json()
            .with_context(|| format!("Failed to decode response from {}", url))
    }

    fn request_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response> {
        const MAX_ATTEMPTS: usize = 2;
        let mut attempt = 0;

        loop {
            attempt += 1;

            wait_global_throttle();

            let response = self.client.get(url).headers(self.headers.clone()).send()?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_ATTEMPTS {
                    return Err(anyhow!("Too many requests for URL {}", url));
                }

                sleep(parse_retry_after(&response).unwrap_or(Duration::from_secs(10)));
                continue;
            }

            if !response.status().is_success() {
                return Err(anyhow!(
                    "Request to {} failed with status {}",
                    url,
                    response.status()
                ));
            }

            return Ok(response);
        }
    }
}

/// Sliding-window request budget. A request blocks until every window
/// has room, then stamps itself into each one.
pub struct Throttle {
    windows: Vec<WindowBudget>,
}

struct WindowBudget {
    span: Duration,
    cap: usize,
    sent: VecDeque<Instant>,
}

impl WindowBudget {
    fn new(span: Duration, cap: usize) -> Self {
        Self {
            span,
            cap,
            sent: VecDeque::new(),
        }
    }

    fn delay(&mut self, now: Instant) -> Option<Duration> {
        while let Some(front) = self.sent.front() {
            if now.duration_since(*front) > self.span {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if self.sent.len() < self.cap {
            return None;
        }

        self.sent
            .front()
            .map(|oldest| self.span.saturating_sub(now.duration_since(*oldest)))
    }
}

impl Throttle {
    pub fn new(cap_per_2min: usize, cap_per_sec: usize) -> Self {
        Self {
            windows: vec![
                WindowBudget::new(Duration::from_secs(1), cap_per_sec),
                WindowBudget::new(Duration::from_secs(120), cap_per_2min),
            ],
        }
    }

    pub fn set_cap_per_2min(&mut self, cap: usize) {
        if let Some(window) = self
            .windows
            .iter_mut()
            .find(|w| w.span == Duration::from_secs(120))
        {
            window.cap = cap;
        }
    }

    pub fn acquire(&mut self) {
        loop {
            let now = Instant::now();
            let wait = self.windows.iter_mut().filter_map(|w| w.delay(now)).max();

            match wait {
                Some(duration) => sleep(duration),
                None => {
                    let stamp = Instant::now();
                    for window in &mut self.windows {
                        window.sent.push_back(stamp);
                    }
                    return;
                }
            }
        }
    }
}

fn global_throttle() -> &'static Mutex<Throttle> {
    GLOBAL_THROTTLE.get_or_init(|| {
        Mutex::new(Throttle::new(
            DEFAULT_MAX_REQS_PER_2MIN,
            DEFAULT_MAX_REQS_PER_SEC,
        ))
    })
}

fn wait_global_throttle() {
    let mut guard = global_throttle()
        .lock()
        .expect("throttle mutex poisoned while waiting");
    guard.acquire();
}

fn parse_retry_after(response: &reqwest::blocking::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}
