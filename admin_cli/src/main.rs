use std::{collections::HashSet, path::{Path, PathBuf}};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use openpath_data_management::{
    analysis::{
        durations::aggregate_durations,
        segment_crossing::{MatchOrder, SegmentQuery},
    },
    DataManager,
};
use openpath_lib::{
    location_ping::LocationPing,
    permissions::Permissions,
    survey::SurveyResponse,
    time_range::{TimeRange, TimezoneMode},
    token::{TokenFormat, TokenRequest},
    trip::ConfirmedTrip,
    user::UserEntry,
    zone::{Zone, ZoneShape},
};
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "OpenPathAdmin")]
#[command(about = "A CLI to manage the dashboard database and run analyses", long_about = None)]
struct Cli {
    /// Database file, defaults to data/openpath.db under the project root
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate enrollment tokens for a program
    GenerateTokens {
        program: String,
        #[arg(long, default_value_t = 10)]
        length: usize,
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// urlsafe, hex or base64
        #[arg(long, default_value = "urlsafe")]
        format: TokenFormat,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Print every stored token
    ListTokens,
    /// Import a JSON array of users
    ImportUsers { file: PathBuf },
    /// Import a JSON array of confirmed trips
    ImportTrips { file: PathBuf },
    /// Import a JSON array of recreated locations
    ImportPings { file: PathBuf },
    /// Import a JSON array of survey responses
    ImportSurveys { file: PathBuf },
    /// Print the overview numbers
    Summary,
    /// Median travel time between two zones. Zone files hold a GeoJSON
    /// polygon or {"center": [lon, lat], "radius": metres}
    SegmentTime {
        start_zone: PathBuf,
        end_zone: PathBuf,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        min_users: usize,
        /// Represent each section by its earliest ping in a zone instead of the closest
        #[arg(long)]
        earliest: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    let database_path = match cli.db {
        Some(path) => path,
        None => DataManager::default_database_path()?,
    };
    let data_manager = DataManager::start(&database_path).await?;

    match cli.command {
        Commands::GenerateTokens { program, length, count, format, prefix } => {
            let permissions = Permissions { token_prefix: prefix, ..Permissions::default() };
            let request = TokenRequest { program, length, count, format };
            for token in data_manager.generate_tokens(&permissions, &request).await? {
                println!("{}", token.token);
            }
        },
        Commands::ListTokens => {
            for token in data_manager.query_tokens().await? {
                println!("{}\t{}", token.created_at.format("%Y-%m-%d %H:%M"), token.token);
            }
        },
        Commands::ImportUsers { file } => {
            let users: Vec<UserEntry> = read_json_array(&file)?;
            data_manager.insert_users(&users).await?;
            println!("Imported {} users", users.len());
        },
        Commands::ImportTrips { file } => {
            let trips: Vec<ConfirmedTrip> = read_json_array(&file)?;
            data_manager.insert_trips(&trips).await?;
            println!("Imported {} trips", trips.len());
        },
        Commands::ImportPings { file } => {
            let pings: Vec<LocationPing> = read_json_array(&file)?;
            data_manager.insert_locations(&pings).await?;
            println!("Imported {} locations", pings.len());
        },
        Commands::ImportSurveys { file } => {
            let responses: Vec<SurveyResponse> = read_json_array(&file)?;
            data_manager.insert_survey_responses(&responses).await?;
            println!("Imported {} survey responses", responses.len());
        },
        Commands::Summary => {
            let stats = data_manager.summary_stats(&TimeRange::unbounded(), Utc::now().date_naive()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        },
        Commands::SegmentTime { start_zone, end_zone, start_date, end_date, min_users, earliest } => {
            let query = SegmentQuery {
                start_zone: read_zone(&start_zone)?,
                end_zone: read_zone(&end_zone)?,
                range: TimeRange::from_dates(start_date, end_date, TimezoneMode::Utc)?,
                excluded_user_ids: HashSet::new(),
                min_distinct_users: min_users,
                match_order: if earliest { MatchOrder::Earliest } else { MatchOrder::Closest },
            };

            let crossings = data_manager.query_segments_crossing_endpoints(&query).await?;
            match aggregate_durations(&crossings) {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => println!("No data available for the selected zones and dates"),
            }
        },
    }

    Ok(())
}

fn read_json_array<T: DeserializeOwned>(file: &Path) -> anyhow::Result<Vec<T>> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {file:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {file:?}"))
}

fn read_zone(file: &Path) -> anyhow::Result<Zone> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {file:?}"))?;
    let shape: ZoneShape = serde_json::from_str(&text).with_context(|| format!("Failed to parse zone {file:?}"))?;
    Ok(Zone::try_from(shape)?)
}
