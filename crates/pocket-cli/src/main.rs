use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pocket_core::{
    PocketConfig, ProviderError, RefreshOutcome, SampleLog, SampleProvider, Screen,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const SEC: i64 = 1_000_000;

#[derive(Parser)]
#[command(name = "pocket", about = "Heart rate and guided breathing on one screen")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive real-time screen driven from stdin
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Heart-rate reading available to refreshes (repeatable)
        #[arg(long = "sample")]
        samples: Vec<f64>,
    },
    /// Deterministic virtual-time run printed as a timeline
    Simulate {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 30)]
        seconds: u64,
        /// Rate shown when the screen appears
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        #[arg(long = "sample")]
        samples: Vec<f64>,
        /// Seconds at which to force a refresh
        #[arg(long = "refresh-at")]
        refresh_at: Vec<f64>,
        /// Seconds at which to begin the breathing exercise
        #[arg(long = "breathe-at")]
        breathe_at: Vec<f64>,
        /// Seconds at which to tap the breathing prompt
        #[arg(long = "tap-at")]
        tap_at: Vec<f64>,
    },
    /// Print or write the effective configuration
    Config {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Action {
    Refresh,
    Breathe,
    Tap,
    Frame,
}

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = "pocket_core=info".parse() {
        filter = filter.add_directive(d);
    }
    if let Ok(d) = "pocket=info".parse() {
        filter = filter.add_directive(d);
    }

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(path: Option<&PathBuf>) -> Result<PocketConfig, Box<dyn std::error::Error>> {
    Ok(PocketConfig::load_layered(None, path.map(|p| p.as_path()))?)
}

/// Readings given on the command line, stamped at `at_us` so they always
/// fall inside the refresh window ending then.
fn sample_log(samples: &[f64], at_us: i64) -> SampleLog {
    let mut log = SampleLog::default();
    for bpm in samples {
        log.record(at_us, *bpm);
    }
    log
}

fn refresh_from_samples(screen: &mut Screen, samples: &[f64]) -> RefreshOutcome {
    let mut log = sample_log(samples, screen.now_us());
    screen.refresh_with(&mut log)
}

fn secs_to_us(s: f64) -> i64 {
    (s.max(0.0) * SEC as f64).round() as i64
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Run { config, samples } => {
            let config = load_config(config.as_ref())?;
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            rt.block_on(run_interactive(config, samples))?;
        }
        Commands::Simulate {
            config,
            seconds,
            bpm,
            samples,
            refresh_at,
            breathe_at,
            tap_at,
        } => {
            let config = load_config(config.as_ref())?;
            let mut events: Vec<(i64, Action)> = Vec::new();
            events.extend(refresh_at.iter().map(|s| (secs_to_us(*s), Action::Refresh)));
            events.extend(breathe_at.iter().map(|s| (secs_to_us(*s), Action::Breathe)));
            events.extend(tap_at.iter().map(|s| (secs_to_us(*s), Action::Tap)));
            events.extend((0..=seconds).map(|s| (s as i64 * SEC, Action::Frame)));
            events.sort();
            simulate(&config, bpm, &samples, &events);
        }
        Commands::Config { out } => {
            let config = PocketConfig::load_layered(None, None)?;
            match out {
                Some(path) => {
                    config.save_to_file(&path)?;
                    println!("Wrote config to {}", path.display());
                }
                None => print!("{}", config.to_toml_string()?),
            }
        }
    }
    Ok(())
}

fn simulate(config: &PocketConfig, bpm: u32, samples: &[f64], events: &[(i64, Action)]) {
    let mut screen = Screen::new(config);
    screen.monitor_mut().set_rate(bpm);
    screen.appear();

    let mut last_frame = String::new();
    for (at_us, action) in events {
        screen.run_until(*at_us);
        match action {
            Action::Refresh => {
                let outcome = refresh_from_samples(&mut screen, samples);
                info!("refresh: {:?}", outcome);
            }
            Action::Breathe => {
                if screen.begin_breathing().is_none() {
                    info!("breathing not offered at {} bpm", screen.monitor().rate());
                }
            }
            Action::Tap => {
                screen.tap_breathing();
            }
            Action::Frame => {}
        }
        let frame = screen.view().to_string();
        if frame != last_frame {
            println!("[{:>7.1}s] {}", *at_us as f64 / SEC as f64, frame);
            last_frame = frame;
        }
    }
    screen.teardown();
}

fn elapsed_us(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_micros()).unwrap_or(i64::MAX)
}

async fn run_interactive(
    config: PocketConfig,
    samples: Vec<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let mut screen = Screen::new(&config);
    screen.appear();

    let (tx, mut rx) = mpsc::channel::<Result<Option<f64>, ProviderError>>(4);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut refresh_in_flight = false;
    let mut last_frame = String::new();

    println!("commands: r refresh, b breathe, t tap, d toggle description, q quit");
    render(&screen, &mut last_frame);

    loop {
        let wake_at = screen
            .next_deadline()
            .map(|us| started + Duration::from_micros(us.max(0) as u64))
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            _ = tokio::time::sleep_until(wake_at) => {
                screen.run_until(elapsed_us(started));
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                screen.run_until(elapsed_us(started));
                match line.trim() {
                    "r" => {
                        if refresh_in_flight {
                            info!("refresh already in flight");
                        } else {
                            let req = screen.begin_refresh();
                            let mut provider = sample_log(&samples, req.window_end_us);
                            let tx = tx.clone();
                            tokio::task::spawn_blocking(move || {
                                let result = provider.query_average(req.window_end_us, req.window_us);
                                let _ = tx.blocking_send(result);
                            });
                            refresh_in_flight = true;
                        }
                    }
                    "b" => {
                        if screen.begin_breathing().is_none() {
                            info!("breathing not offered at {} bpm", screen.monitor().rate());
                        }
                    }
                    "t" => {
                        screen.tap_breathing();
                    }
                    "d" => screen.toggle_description(),
                    "q" | "quit" => break,
                    "" => {}
                    other => warn!("unknown command {:?} (r, b, t, d, q)", other),
                }
            }
            Some(result) = rx.recv() => {
                screen.run_until(elapsed_us(started));
                let outcome = screen.complete_refresh(result);
                refresh_in_flight = false;
                info!("refresh: {:?}", outcome);
            }
        }
        render(&screen, &mut last_frame);
    }

    screen.teardown();
    Ok(())
}

fn render(screen: &Screen, last_frame: &mut String) {
    let frame = screen.view().to_string();
    if frame != *last_frame {
        println!("{}", frame);
        *last_frame = frame;
    }
}
