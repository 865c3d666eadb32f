//! Terminal dashboard
//!
//! Connects to an ELM327 adapter (or falls back to mock data), shows the six
//! sensors of a category and refreshes them once per interval.
//!
//! Usage: cargo run -p obdash-cli -- [OPTIONS]

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use obdash_core::{
    CategoryTable, Config, ConnectionManager, Connector, Dashboard, IntervalScheduler, MockGenerator,
    QueryResult, StatusColor, SLOT_COUNT,
};
use obdash_elm327_lib::Elm327Connector;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Port value that tries every candidate
const AUTO_PORT: &str = "auto";

const COLUMNS: usize = 3;
const CARD_WIDTH: usize = 26;

#[derive(Parser, Debug)]
#[command(name = "obdash")]
#[command(about = "OBD2 sensor dashboard")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Adapter port: serial device, host:port, or "auto"
    #[arg(short, long)]
    port: Option<String>,

    /// Category to show
    #[arg(long)]
    category: Option<String>,

    /// Number of refreshes before exiting (0 = run forever)
    #[arg(short, long, default_value = "0")]
    ticks: u64,

    /// Seed for mock data (0 = random)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the available categories and exit
    #[arg(long)]
    list_categories: bool,

    /// Do not connect to an adapter, always show mock data
    #[arg(long)]
    mock: bool,
}

/// Logger with everything enabled unless `RUST_LOG` says otherwise
fn logger_builder(rust_log: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Trace);
    if let Some(filters) = rust_log {
        builder.parse_filters(filters);
    }
    builder
}

/// Level to narrow to, or `None` when `RUST_LOG` is in charge
fn max_level_override(rust_log: Option<&str>, configured: LevelFilter) -> Option<LevelFilter> {
    rust_log.is_none().then_some(configured)
}

/// Returns the `RUST_LOG` value, if any
fn init_logging() -> Option<String> {
    let rust_log = std::env::var("RUST_LOG").ok();
    logger_builder(rust_log.as_deref()).init();
    // Narrowed again once the config is loaded
    if let Some(level) = max_level_override(rust_log.as_deref(), LevelFilter::Info) {
        log::set_max_level(level);
    }
    rust_log
}

/// Apply command line overrides on top of the file config
fn resolve_config(args: &Args) -> Config {
    let mut config = args
        .config
        .as_deref()
        .map_or_else(Config::default, Config::load_or_default);

    if let Some(port) = &args.port {
        config.adapter.port = (port != AUTO_PORT).then(|| port.clone());
    }
    if let Some(category) = &args.category {
        config.default_category.clone_from(category);
    }
    if let Some(seed) = args.seed {
        config.mock_seed = seed;
    }
    config.validate();
    config
}

fn print_categories(table: &CategoryTable) {
    for name in table.names() {
        let config = table.select(name);
        println!("{name:<10} {}", config.names().join(", "));
    }
}

/// ANSI color closest to the status color
fn ansi_color(color: StatusColor) -> &'static str {
    match (color.r > 0.5, color.g > 0.5) {
        (true, true) => "\x1b[33m",
        (false, true) => "\x1b[32m",
        _ => "\x1b[31m",
    }
}

fn render<C: Connector>(dashboard: &Dashboard<C>, results: &[QueryResult; SLOT_COUNT]) {
    let mut out = std::io::stdout().lock();
    let names = dashboard.names();

    let _ = writeln!(
        out,
        "[{}] {}{}\x1b[0m",
        dashboard.category(),
        ansi_color(dashboard.status_color()),
        dashboard.status_text()
    );
    for row in results.chunks(COLUMNS) {
        let cards: Vec<String> = row
            .iter()
            .map(|result| {
                let card = format!("{}: {}", names[result.slot_index], result.display_text);
                format!("{card:<CARD_WIDTH$}")
            })
            .collect();
        let _ = writeln!(out, "  {}", cards.join(" | "));
    }
    let _ = out.flush();
}

fn run<C: Connector>(mut dashboard: Dashboard<C>, config: &Config, ticks: u64) {
    let mut scheduler = IntervalScheduler::new(config.refresh_interval(), Instant::now());
    let mut refreshed = 0;

    dashboard.on_enter();
    while ticks == 0 || refreshed < ticks {
        if !scheduler.poll(Instant::now()) {
            std::thread::sleep(scheduler.time_until_next(Instant::now()));
            continue;
        }

        if let Some(results) = dashboard.on_tick() {
            render(&dashboard, &results);
        }
        refreshed += 1;
    }
    dashboard.on_leave();
    dashboard.manager_mut().close();
}

fn main() -> Result<()> {
    let rust_log = init_logging();

    let args = Args::parse();
    let config = resolve_config(&args);

    if let Some(level) = max_level_override(rust_log.as_deref(), config.log_level.as_level_filter()) {
        log::set_max_level(level);
    }

    let table = CategoryTable::builtin();
    if args.list_categories {
        print_categories(&table);
        return Ok(());
    }

    let connector = Elm327Connector::new(config.adapter.baud_rate, config.adapter_timeout());
    let mut manager = ConnectionManager::new(
        connector,
        config.adapter.port.clone(),
        MockGenerator::new(config.mock_seed),
    );

    if args.mock {
        info!("Mock mode, not connecting to an adapter");
    } else {
        manager.connect();
    }

    let dashboard = Dashboard::new(manager, table, &config.default_category);
    run(dashboard, &config, args.ticks);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("obdash").chain(args.iter().copied()))
    }

    #[test]
    fn test_auto_port() {
        let config = resolve_config(&parse(&["--port", "auto"]));
        assert_eq!(config.adapter.port, None);

        let config = resolve_config(&parse(&["--port", "127.0.0.1:35000"]));
        assert_eq!(config.adapter.port.as_deref(), Some("127.0.0.1:35000"));
    }

    #[test]
    fn test_overrides() {
        let config = resolve_config(&parse(&["--category", "fuel", "--seed", "9"]));
        assert_eq!(config.default_category, "fuel");
        assert_eq!(config.mock_seed, 9);
        assert_eq!(config.adapter.port.as_deref(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_rust_log_wins_over_config() {
        assert_eq!(logger_builder(Some("debug")).build().filter(), LevelFilter::Debug);
        assert_eq!(max_level_override(Some("debug"), LevelFilter::Info), None);

        assert_eq!(logger_builder(None).build().filter(), LevelFilter::Trace);
        assert_eq!(max_level_override(None, LevelFilter::Warn), Some(LevelFilter::Warn));
    }

    #[test]
    fn test_ansi_color() {
        use obdash_core::ConnectionState;

        assert_eq!(ansi_color(ConnectionState::Connected.color()), "\x1b[32m");
        assert_eq!(ansi_color(ConnectionState::CarConnected.color()), "\x1b[33m");
        assert_eq!(ansi_color(ConnectionState::Error.color()), "\x1b[31m");
    }

    #[test]
    fn test_mock_dashboard_runs_ticks() {
        let config = Config {
            refresh_interval_ms: 100,
            ..Config::default()
        };
        let manager = ConnectionManager::new(Elm327Connector::default(), None, MockGenerator::new(1));
        let dashboard = Dashboard::new(manager, CategoryTable::builtin(), "home");
        run(dashboard, &config, 2);
    }
}
