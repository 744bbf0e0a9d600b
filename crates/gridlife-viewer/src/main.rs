//! GridLife Viewer - console front-end for the engine
//!
//! Implements the view contract on a terminal: each generation is printed as
//! a text grid (or a one-line summary for large maps) and acknowledged
//! immediately. The engine is driven for a fixed number of generations, then
//! stopped.
//!
//! Usage:
//!   cargo run -p gridlife-viewer -- [options]
//!     --width N         map width (default 32)
//!     --height N        map height (default 16)
//!     --generations N   stop after N rendered generations (default 20)
//!     --tick MS         minimum milliseconds between frames (default 200,
//!                       or whatever the config file says)
//!     --config PATH     JSON file overriding the engine configuration
//!     --quiet           print summaries only, never the grid

use std::env;
use std::fs;
use std::process::exit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gridlife_core::prelude::*;
use log::{debug, info};

/// Maps wider or taller than this are summarized instead of drawn.
const MAX_DRAWN_EDGE: usize = 64;

/// Console default; the engine's own default tick is tuned for a windowed
/// front-end and feels sluggish in a terminal.
const DEFAULT_TICK_MS: u64 = 200;

struct ConsoleView {
    width: usize,
    height: usize,
    quiet: bool,
    rendered: Arc<AtomicU64>,
}

impl GameView for ConsoleView {
    fn map_dimension(&self) -> Option<(usize, usize)> {
        Some((self.width, self.height))
    }

    fn draw_cells(&self, frame: &RenderFrame, done: RenderAck) {
        println!(
            "generation {:>5} | {:>6} alive | computed in {:?}",
            frame.generation, frame.alive_cells, frame.computation_time
        );
        let drawable =
            frame.cells.width() <= MAX_DRAWN_EDGE && frame.cells.height() <= MAX_DRAWN_EDGE;
        if !self.quiet && drawable {
            for row in frame.cells.rows() {
                let line: String = row.iter().map(|&alive| if alive { 'O' } else { '.' }).collect();
                println!("  {line}");
            }
        }
        self.rendered.fetch_add(1, Ordering::SeqCst);
        done.done();
    }

    fn update_progress(&self, progress: Progress) {
        match progress {
            Progress::Fraction(fraction) => debug!("progress: {:.0}%", fraction * 100.0),
            Progress::Indeterminate(label) => debug!("progress: {label}"),
        }
    }

    fn set_started(&self) {
        info!("simulation started");
    }

    fn set_stopped(&self) {
        info!("simulation stopped");
    }

    fn show_alert(&self, header: &str, message: &str) {
        eprintln!("[{header}] {message}");
    }
}

struct Options {
    width: usize,
    height: usize,
    generations: u64,
    tick_ms: Option<u64>,
    config_path: Option<String>,
    quiet: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            width: 32,
            height: 16,
            generations: 20,
            tick_ms: None,
            config_path: None,
            quiet: false,
        }
    }
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = env::args().skip(1);
    while let Some(flag) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| format!("{name} needs a value"))
        };
        match flag.as_str() {
            "--width" => {
                options.width = value("--width")?
                    .parse()
                    .map_err(|_| "--width expects a number".to_string())?
            }
            "--height" => {
                options.height = value("--height")?
                    .parse()
                    .map_err(|_| "--height expects a number".to_string())?
            }
            "--generations" => {
                options.generations = value("--generations")?
                    .parse()
                    .map_err(|_| "--generations expects a number".to_string())?
            }
            "--tick" => {
                options.tick_ms = Some(
                    value("--tick")?
                        .parse()
                        .map_err(|_| "--tick expects milliseconds".to_string())?,
                )
            }
            "--config" => options.config_path = Some(value("--config")?),
            "--quiet" => options.quiet = true,
            other => return Err(format!("unknown option: {other}")),
        }
    }
    Ok(options)
}

fn load_config(options: &Options) -> Result<SimConfig, String> {
    let mut config = match &options.config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|error| format!("cannot read {path}: {error}"))?;
            serde_json::from_str(&raw)
                .map_err(|error| format!("cannot parse {path}: {error}"))?
        }
        None => SimConfig {
            min_tick_ms: DEFAULT_TICK_MS,
            ..SimConfig::default()
        },
    };
    if let Some(tick_ms) = options.tick_ms {
        config.min_tick_ms = tick_ms;
    }
    Ok(config)
}

fn main() {
    env_logger::init();

    let options = match parse_options() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}");
            exit(2);
        }
    };
    let config = match load_config(&options) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            exit(2);
        }
    };

    let rendered = Arc::new(AtomicU64::new(0));
    let view = ConsoleView {
        width: options.width,
        height: options.height,
        quiet: options.quiet,
        rendered: Arc::clone(&rendered),
    };

    let mut engine = match GameEngine::new(view, config) {
        Ok(engine) => engine,
        Err(error) => {
            eprintln!("error: {error}");
            exit(1);
        }
    };
    if let Err(error) = engine.start() {
        eprintln!("error: {error}");
        exit(1);
    }

    // the initial seeded frame counts toward the requested total
    while rendered.load(Ordering::SeqCst) < options.generations {
        if !engine.is_running() {
            // the engine stopped itself after a pipeline error
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    engine.stop();
}
