// SPDX-License-Identifier: MPL-2.0

//! Weather Dashboard - command-line front end
//!
//! Drives the dashboard core from the terminal: shows the widgets, places and
//! removes them, edits settings, refreshes, imports and exports, and hosts
//! the SunCatch minigame.
//!
//! State is saved to `~/.local/share/weather-dashboard/weatherDashboard.json`
//! after every change. Logs go to stderr; set `RUST_LOG` to change the level.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use weather_dashboard::config::API_KEY_ENV;
use weather_dashboard::error::Result;
use weather_dashboard::game::{
    format_clock, CardKind, ClickResult, GameStatus, SunCatchGame, GRID_SIZE, REVEAL_INTERVAL_MS, WIN_SCORE,
};
use weather_dashboard::widget::sync::join_refreshes;
use weather_dashboard::widget::model::weather_title;
use weather_dashboard::widget::transfer::read_import_file;
use weather_dashboard::widget::{
    DashboardSnapshot, JsonFileStore, OpenWeatherMapSource, SettingsUpdate, Units, WidgetRecord,
};
use weather_dashboard::{Config, Dashboard, DashboardEvent, Error};

/// Weather widget dashboard
#[derive(Parser, Debug)]
#[command(name = "weather-dashboard")]
#[command(about = "Weather widgets with persistent layout", long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for saved dashboard state
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the dashboard, fetching weather for widgets without data
    Show,
    /// Refresh one widget, or all of them
    Refresh { id: Option<String> },
    /// Place an available widget on the dashboard
    Add { id: String },
    /// Return a widget to the available pool
    Remove { id: String },
    /// Swap the positions of two widgets
    Swap { first: String, second: String },
    /// Change a widget's title, city or units
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        units: Option<Units>,
    },
    /// Create a new widget in the available pool
    Create {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        units: Option<Units>,
    },
    /// Export the configuration to a dated JSON file
    Export {
        /// Target directory (defaults to the current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Replace the configuration with an exported file
    Import {
        file: PathBuf,
        /// Confirm that the current configuration will be replaced
        #[arg(long)]
        yes: bool,
    },
    /// Play SunCatch: catch 100 points of sunshine in 30 seconds
    Play,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let command = args.command.unwrap_or(Command::Show);
    if matches!(command, Command::Play) {
        return play().await;
    }

    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path);
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    if config.api_key.is_empty() {
        log::warn!(
            "No API key configured; set {} or api_key in {:?}",
            API_KEY_ENV,
            config_path
        );
    }

    let storage = JsonFileStore::new(config.data_dir(), config.storage_key.clone());
    log::debug!("Dashboard state file: {:?}", storage.path());
    let dashboard = Dashboard::new(Box::new(storage), OpenWeatherMapSource::from_config(&config)?);
    let mut events = dashboard.subscribe();

    let result = execute(&dashboard, command).await;
    dashboard.shutdown();
    report_persistence_failures(&mut events);
    result
}

async fn execute(dashboard: &Dashboard<OpenWeatherMapSource>, command: Command) -> Result<()> {
    match command {
        Command::Show | Command::Play => {
            join_refreshes(dashboard.start()).await;
        }
        Command::Refresh { id } => {
            dashboard.initialize();
            let handles = match id {
                Some(id) => {
                    require_placed(&dashboard.snapshot(), &id)?;
                    vec![dashboard.refresh(&id)]
                }
                None => dashboard.refresh_all(),
            };
            join_refreshes(handles).await;
        }
        Command::Add { id } => {
            dashboard.initialize();
            let handle = dashboard
                .add_widget(&id)
                .ok_or_else(|| Error::UnknownWidget(id.clone()))?;
            handle.await?;
        }
        Command::Remove { id } => {
            dashboard.initialize();
            if !dashboard.remove_widget(&id) {
                return Err(Error::UnknownWidget(id));
            }
        }
        Command::Swap { first, second } => {
            dashboard.initialize();
            let snapshot = dashboard.snapshot();
            require_placed(&snapshot, &first)?;
            require_placed(&snapshot, &second)?;
            dashboard.swap_positions(&first, &second);
        }
        Command::Edit {
            id,
            title,
            city,
            units,
        } => {
            dashboard.initialize();
            let snapshot = dashboard.snapshot();
            let (current_title, current) = snapshot
                .placed
                .iter()
                .find(|w| w.id == id)
                .map(|w| (&w.title, &w.settings))
                .or_else(|| {
                    snapshot
                        .available
                        .iter()
                        .find(|w| w.id == id)
                        .map(|w| (&w.title, &w.settings))
                })
                .ok_or_else(|| Error::UnknownWidget(id.clone()))?;

            let update = SettingsUpdate::new(
                title.unwrap_or_else(|| current_title.clone()),
                city.unwrap_or_else(|| current.city.clone()),
                units.unwrap_or(current.units),
            );
            if let Some(handle) = dashboard.update_settings(&id, update)? {
                handle.await?;
            }
        }
        Command::Create { title, city, units } => {
            dashboard.initialize();
            let settings = (title.is_some() || city.is_some() || units.is_some()).then(|| {
                let city = city.unwrap_or_else(|| String::from("Moscow"));
                SettingsUpdate::new(
                    title.unwrap_or_else(|| weather_title(&city)),
                    city,
                    units.unwrap_or_default(),
                )
            });
            let id = dashboard.create_widget(settings)?;
            println!("Created widget {id} in the available pool");
        }
        Command::Export { dir } => {
            dashboard.initialize();
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let path = dashboard.export_to_dir(&dir)?;
            println!("Exported configuration to {}", path.display());
            return Ok(());
        }
        Command::Import { file, yes } => {
            if !yes {
                println!("Importing replaces the current configuration. Re-run with --yes to continue.");
                return Ok(());
            }
            dashboard.initialize();
            let document = read_import_file(&file)?;
            join_refreshes(dashboard.import_state(document)).await;
            println!("Configuration imported");
        }
    }

    print_dashboard(&dashboard.snapshot());
    Ok(())
}

fn require_placed(snapshot: &DashboardSnapshot, id: &str) -> Result<()> {
    if snapshot.placed.iter().any(|w| w.id == id) {
        Ok(())
    } else {
        Err(Error::UnknownWidget(id.to_string()))
    }
}

fn report_persistence_failures(events: &mut broadcast::Receiver<DashboardEvent>) {
    use broadcast::error::TryRecvError;

    loop {
        match events.try_recv() {
            Ok(DashboardEvent::PersistenceFailed { message }) => {
                eprintln!("Warning: {message}. Your changes may not survive a restart.");
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn print_dashboard(snapshot: &DashboardSnapshot) {
    println!("Dashboard");
    let placed = snapshot.placed_in_order();
    if placed.is_empty() {
        println!("  (empty - add a widget from the pool)");
    }
    for widget in placed {
        print_widget(widget);
    }

    println!();
    println!("Available widgets");
    for widget in &snapshot.available {
        println!(
            "  - {} [{}] {}, {}",
            widget.title,
            widget.id,
            widget.settings.city,
            widget.settings.units.temperature_symbol()
        );
    }
}

fn print_widget(widget: &WidgetRecord) {
    let units = widget.settings.units;
    println!("  {}. {} [{}]", widget.position + 1, widget.title, widget.id);

    if widget.is_loading {
        println!("     loading...");
    } else if let Some(error) = &widget.error {
        println!("     ! {error} (run `refresh {}` to retry)", widget.id);
    } else if let Some(data) = &widget.data {
        println!(
            "     {:.0}{}  {}  (feels like {:.0}{})",
            data.temperature,
            units.temperature_symbol(),
            data.description,
            data.feels_like,
            units.temperature_symbol()
        );
        println!(
            "     humidity {}%  wind {} {}  pressure {} hPa",
            data.humidity,
            data.wind_speed,
            units.speed_unit(),
            data.pressure
        );
    } else {
        println!("     no data");
    }
}

// ============================================================================
// SunCatch
// ============================================================================

async fn play() -> Result<()> {
    let mut game = SunCatchGame::new();
    let mut rng = rand::thread_rng();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut clock = tokio::time::interval(Duration::from_secs(1));
    let mut reveal = tokio::time::interval(Duration::from_millis(REVEAL_INTERVAL_MS));
    // Both intervals fire immediately; swallow that so the first second counts
    clock.tick().await;
    reveal.tick().await;

    println!("SunCatch: type the number of a sun card and press Enter.");
    println!("Sun +10, cloud -5. Reach {WIN_SCORE} before the clock runs out.");
    game.start();

    while game.is_playing() {
        tokio::select! {
            _ = clock.tick() => game.tick(),
            _ = reveal.tick() => {
                game.reveal_next(&mut rng);
                print_board(&game);
            }
            line = lines.next_line() => {
                let Some(text) = line? else { break };
                match text.trim().parse::<usize>() {
                    Ok(n) if (1..=GRID_SIZE).contains(&n) => match game.click(n - 1) {
                        ClickResult::CaughtSun => println!("Sunny! +10"),
                        ClickResult::CaughtCloud => println!("Cloudy... -5"),
                        ClickResult::Ignored => println!("Missed"),
                    },
                    _ => println!("Enter a number from 1 to {GRID_SIZE}"),
                }
            }
        }
    }

    match game.status() {
        GameStatus::Won => println!(
            "You win! {WIN_SCORE} points in {}",
            format_clock(game.elapsed())
        ),
        GameStatus::TimeUp => println!(
            "Time's up! {} points in {}",
            game.score(),
            format_clock(game.elapsed())
        ),
        GameStatus::Idle | GameStatus::Playing => println!("Game abandoned"),
    }
    Ok(())
}

fn print_board(game: &SunCatchGame) {
    let card = game.current_card();
    let cells: Vec<String> = (0..GRID_SIZE)
        .map(|i| match card {
            Some(c) if c.index == i => match c.kind {
                CardKind::Sun => String::from(" ☀ "),
                CardKind::Cloud => String::from(" ☁ "),
            },
            _ => format!("[{}]", i + 1),
        })
        .collect();

    println!(
        "{} {} {}   score {:>3}  {:>3.0}%  {}",
        cells[0],
        cells[1],
        cells[2],
        game.score(),
        game.progress() * 100.0,
        format_clock(game.time_left())
    );
    println!("{} {} {}", cells[3], cells[4], cells[5]);
    println!("{} {} {}", cells[6], cells[7], cells[8]);
}
