use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geoplay::input::load_file;
use geoplay::overlay::LoggingOverlay;
use geoplay::settings::positive_seconds;
use geoplay::{EventEmitting, EventType, OverlayRegistry, OverlayType, Player, Settings, Surface, TickTimer};

#[derive(Parser, Debug)]
#[command(version, about = "Replay a CSV or JSON track file, logging every overlay update")]
struct Cli {
    /// Rows to replay (CSV with a header, or a JSON array)
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Step through the data instead of playing it on a timer
    #[arg(long)]
    discrete: bool,

    /// Seconds of data time per step or tick (overrides the settings file)
    #[arg(long, value_name = "SECONDS", value_parser = parse_step)]
    step: Option<f64>,
}

fn parse_step(raw: &str) -> Result<f64, String> {
    let seconds = raw.parse::<f64>().map_err(|err| err.to_string())?;
    positive_seconds(seconds).map_err(|err| err.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();
    let mut settings = Settings::load();
    if let Some(step) = args.step {
        settings.tick_increment = step;
    }

    let path = args.path.to_str().context("File path is not valid UTF-8")?;
    let loaded = load_file(path)?;
    info!(path, rows = loaded.rows.len(), "loaded");

    let mut registry = OverlayRegistry::new();
    registry
        .register(OverlayType::Marker, LoggingOverlay::factory)
        .register(OverlayType::Bubble, LoggingOverlay::factory)
        .register(OverlayType::Heatmap, LoggingOverlay::factory);

    let surface = Surface::new("console");
    let mut player = if args.discrete {
        Player::discrete(surface, registry, &settings)
    } else {
        Player::continuous(surface, registry, &settings)
    };

    let finished = Rc::new(Cell::new(false));
    let flag = finished.clone();
    player.add_event_listener(EventType::EndOfData, move |_| {
        flag.set(true);
        Ok(())
    });

    let summary = player.ingest(loaded.spec, &loaded.rows)?;
    info!(entities = summary.entities, "ready");

    let step = settings.tick_increment;
    let start = player.current_time();
    if start.advance(step) <= start {
        bail!("A step of {step}s is too small to move time past {start}");
    }

    if args.discrete {
        player.stop_time().context("No samples to play")?;
        while !finished.get() {
            player.set_current_time(player.current_time().advance(step));
        }
    } else {
        player.play()?;
        let mut timer = TickTimer::from_settings(&settings);
        timer.run_until(&mut player, |_| finished.get()).await;
    }

    player.clean_up();
    Ok(())
}
