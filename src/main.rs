use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod collect;
mod lookup;
mod model;
mod riot_api;
mod rows;
mod server;
mod store;

use collect::mastery::MasteryCollectorArgs;
use collect::matches::MatchCollectorArgs;
use collect::users::UserCollectorArgs;
use riot_api::RiotClient;

#[derive(Parser, Debug)]
#[command(
    name = "riftcast",
    about = "LoL match outcome prediction and training-data collection",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect grandmaster ranked matches into the match table
    CollectMatches {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Recent ranked matches considered per ladder account
        #[arg(long, default_value_t = 5)]
        per_account: usize,

        #[arg(long, default_value_t = 80)]
        max_req_per_2min: usize,
    },

    /// Collect per-role win/loss stats for summoners in the match table
    CollectUsers {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Recent ranked matches tallied per summoner
        #[arg(long, default_value_t = 10)]
        games: usize,

        #[arg(long, default_value_t = 80)]
        max_req_per_2min: usize,
    },

    /// Collect champion mastery points for pairs in the match table
    CollectMastery {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Pairs fetched per run
        #[arg(long, default_value_t = 1000)]
        batch_limit: usize,

        #[arg(long, default_value_t = 80)]
        max_req_per_2min: usize,
    },

    /// Regenerate the champion id/name lookup from Data Dragon metadata
    ChampionsTable {
        #[arg(long, default_value = "data/championFull.json")]
        input: PathBuf,

        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// Regenerate the summoner id lookup from the match table
    SummonersTable {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// Serve the prediction form
    Serve {
        #[arg(long, default_value = "rfc_model.json")]
        model: PathBuf,

        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::CollectMatches {
            data_dir,
            per_account,
            max_req_per_2min,
        } => {
            let client = RiotClient::new_with_max(max_req_per_2min)?;
            collect::matches::run(
                &MatchCollectorArgs {
                    data_dir,
                    per_account,
                },
                &client,
            )
        }

        Command::CollectUsers {
            data_dir,
            games,
            max_req_per_2min,
        } => {
            let client = RiotClient::new_with_max(max_req_per_2min)?;
            collect::users::run(&UserCollectorArgs { data_dir, games }, &client)
        }

        Command::CollectMastery {
            data_dir,
            batch_limit,
            max_req_per_2min,
        } => {
            let client = RiotClient::new_with_max(max_req_per_2min)?;
            collect::mastery::run(
                &MasteryCollectorArgs {
                    data_dir,
                    batch_limit,
                },
                &client,
            )
        }

        Command::ChampionsTable { input, data_dir } => {
            lookup::generate_champions_table(&input, &data_dir)
        }

        Command::SummonersTable { data_dir } => lookup::generate_summoners_table(&data_dir),

        Command::Serve { model, port } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .init();

            let classifier = model::WinClassifier::load(&model)?;
            tokio::runtime::Runtime::new()?.block_on(server::serve(classifier, port))
        }
    }
}
