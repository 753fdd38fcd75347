use std::path::PathBuf;

use anyhow::Context;
use aztro_bot::conversation::{parse_date, parse_time};
use aztro_bot::telegram::TelegramBot;
use aztro_bot::{AstrologyError, BirthInfo, BotConfig, Location, PredictionTopic, Services, ZodiacSign};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "aztro-bot", version, about = "Natal chart horoscope bot for Telegram")]
struct Cli {
    /// TOML configuration file (defaults to ./aztro_bot.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the Telegram bot (default)
    Serve,
    /// Compute one chart offline and print it
    Chart(ChartArgs),
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("where").required(true).args(["place", "lat"])))]
struct ChartArgs {
    /// Birth date, DD.MM.YYYY
    #[arg(long)]
    date: String,

    /// Local birth time, HH:MM
    #[arg(long)]
    time: String,

    /// Place name, geocoded through Nominatim
    #[arg(long)]
    place: Option<String>,

    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Topic request, e.g. "совместимость"
    #[arg(long)]
    topic: Option<String>,

    /// Print the chart as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("aztro-bot error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = BotConfig::load_with_dotenv(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Chart(args) => chart(&config, args).await,
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("AZTRO_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

async fn serve(config: BotConfig) -> anyhow::Result<()> {
    let token = config.require_token()?.to_string();
    let services = Services::from_config(&config).context("failed to set up lookup services")?;
    let bot = TelegramBot::new(&config, &token, services).context("failed to create Telegram client")?;
    bot.run().await?;
    info!("bot stopped");
    Ok(())
}

async fn chart(config: &BotConfig, args: ChartArgs) -> anyhow::Result<()> {
    let date = parse_date(&args.date)
        .ok_or_else(|| AstrologyError::InvalidInput(format!("date {:?} is not DD.MM.YYYY", args.date)))?;
    let time = parse_time(&args.time)
        .ok_or_else(|| AstrologyError::InvalidInput(format!("time {:?} is not HH:MM", args.time)))?;

    let services = Services::from_config(config).context("failed to set up lookup services")?;

    let (place, location) = match (args.place, args.lat, args.lon) {
        (Some(place), _, _) => {
            let location = services
                .locate(&place)
                .await
                .with_context(|| format!("place {place:?} not found"))?;
            (place, location)
        }
        (None, Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                anyhow::bail!("coordinates out of range: {lat}, {lon}");
            }
            (format!("{lat}, {lon}"), Location::new(lat, lon))
        }
        _ => anyhow::bail!("either --place or --lat/--lon is required"),
    };

    let birth_info = BirthInfo {
        date,
        time,
        place,
        location,
    };
    let chart = services.chart(&birth_info).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&chart)?);
    } else {
        println!("place:   {} ({:.4}, {:.4})", birth_info.place, location.latitude, location.longitude);
        println!("instant: {} (JD {:.5})", chart.instant.to_rfc3339(), chart.julian_day);
        println!();
        for (body, longitude) in &chart.planets {
            println!("{:<8} {:>7.2}°  {}", body.to_string(), longitude, ZodiacSign::from_longitude(*longitude));
        }
        println!();
        if chart.aspects.is_empty() {
            println!("no major aspects");
        }
        for aspect in &chart.aspects {
            println!(
                "{} {} {} (orb {:.2}°)",
                aspect.planet1, aspect.aspect, aspect.planet2, aspect.orb
            );
        }
    }

    if let Some(request) = args.topic {
        let topic = PredictionTopic::classify(&request);
        println!();
        println!("{}", chart.interpret(topic));
    }
    Ok(())
}
