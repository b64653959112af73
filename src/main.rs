use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use slotpoll::config::{Config, ConfigOverrides};
use slotpoll::output::chart::render_chart;
use slotpoll::output::csv::{ballots_to_csv, histogram_to_csv, results_to_csv, window_to_csv};
use slotpoll::output::json::render_json;
use slotpoll::output::table::{render_ballots_table, render_results_table};
use slotpoll::server::run_server;
use slotpoll::store::{BallotLog, VoteTable, TIME_FORMAT};
use slotpoll::tally::Tally;
use slotpoll::validate::{named_player, parse_time, validate_slot};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "slotpoll",
    about = "Scheduling poll for picking a shared time slot"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long = "votes-file")]
    votes_file: Option<String>,
    #[arg(long = "ballots-file")]
    ballots_file: Option<String>,
    #[arg(long = "span-hours")]
    span_hours: Option<u32>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Cast a vote for an hour-aligned slot.
    Vote {
        #[arg(long)]
        date: NaiveDate,
        /// Time of day, HH:MM.
        #[arg(long)]
        time: String,
        #[arg(long)]
        player: Option<String>,
    },
    /// Show the vote table and the current best window.
    Results,
    /// Show only the most-voted contiguous window.
    Window,
    /// Per-hour frequency chart of the span-expanded tally.
    Chart {
        #[arg(long, default_value_t = 40)]
        width: usize,
    },
    /// Show the append-only ballot log.
    Ballots,
    /// Run the poll page and JSON API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        votes_file: cli.votes_file.clone(),
        ballots_file: cli.ballots_file.clone(),
        span_hours: cli.span_hours,
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let host = host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let votes_path = config.resolved_votes_path();
    match &cli.command {
        Commands::Vote { date, time, player } => {
            let time = parse_time(time)?;
            let slot = date.and_time(time);
            validate_slot(slot, config.parsed_deadline()?)?;

            let mut table = VoteTable::load(&votes_path)?;
            let votes = table.upsert(slot);
            if let Some(player) = player.as_deref().and_then(named_player) {
                BallotLog::record(&config.resolved_ballots_path(), player)?;
            }
            table.save(&votes_path)?;

            println!(
                "Recorded vote for {} ({votes} total).",
                slot.format(TIME_FORMAT)
            );
            print_results(&table, &config, cli.output)?;
        }
        Commands::Results => {
            let table = VoteTable::load(&votes_path)?;
            print_results(&table, &config, cli.output)?;
        }
        Commands::Window => {
            let table = VoteTable::load(&votes_path)?;
            let tally = Tally::from_table(&table, config.poll.span_hours);
            match tally.best_window(config.poll.span_hours) {
                Some(window) => match cli.output {
                    OutputFormat::Table => println!(
                        "The most common time window is from {} to {}.",
                        window.start.format(TIME_FORMAT),
                        window.end.format(TIME_FORMAT)
                    ),
                    OutputFormat::Json => println!("{}", render_json(&window)?),
                    OutputFormat::Csv => print!("{}", window_to_csv(&window)?),
                },
                None => println!("No common time window determined yet."),
            }
        }
        Commands::Chart { width } => {
            let table = VoteTable::load(&votes_path)?;
            let tally = Tally::from_table(&table, config.poll.span_hours);
            let buckets = tally.buckets();
            match cli.output {
                OutputFormat::Table => print!("{}", render_chart(&buckets, *width)),
                OutputFormat::Json => println!("{}", render_json(&buckets)?),
                OutputFormat::Csv => print!("{}", histogram_to_csv(&buckets)?),
            }
        }
        Commands::Ballots => {
            let log = BallotLog::load(&config.resolved_ballots_path())?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_ballots_table(log.entries())),
                OutputFormat::Json => println!("{}", render_json(&log.entries())?),
                OutputFormat::Csv => print!("{}", ballots_to_csv(log.entries())?),
            }
        }
        Commands::Config { .. } => {}
        Commands::Serve { .. } => unreachable!("serve command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_results(table: &VoteTable, config: &Config, format: OutputFormat) -> Result<()> {
    let rows = table.sorted_rows();
    let tally = Tally::from_table(table, config.poll.span_hours);
    let best = tally.best_window(config.poll.span_hours);
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No votes recorded yet.");
                return Ok(());
            }
            println!("{}", render_results_table(&rows, best.as_ref()));
            if let Some(window) = best {
                println!(
                    "The most common time window is from {} to {}.",
                    window.start.format(TIME_FORMAT),
                    window.end.format(TIME_FORMAT)
                );
            }
        }
        OutputFormat::Json => println!("{}", render_json(&rows)?),
        OutputFormat::Csv => print!("{}", results_to_csv(&rows)?),
    }
    Ok(())
}
