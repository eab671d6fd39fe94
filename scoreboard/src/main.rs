use clap::{Parser, Subcommand};
use log::*;
#[cfg(debug_assertions)]
use log4rs::append::console::ConsoleAppender;
use log4rs::{
    append::{
        console::Target,
        rolling_file::{
            RollingFileAppender,
            policy::compound::{
                CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
            },
        },
    },
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};
use scoreboard_common::clock::SystemTimeSource;
use std::path::PathBuf;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

mod app;
mod clock_engine;
mod controller;
mod store;

mod config;
use config::{Config, Mode};

use app::ScoreboardApp;
use controller::Command;
use store::{MemoryStore, RemoteStore, SharedStore, StoreServer};

const APP_NAME: &str = "scoreboard";
const COMMON_LOGGER: &str = "scoreboard_common";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    mode: Option<ModeArg>,

    #[clap(long, short, action(clap::ArgAction::Count))]
    /// Increase the log verbosity
    verbose: u8,

    #[clap(long)]
    /// Host of the store hub, overrides the config file
    host: Option<String>,

    #[clap(long, short)]
    /// Port of the store hub, overrides the config file
    port: Option<u16>,

    #[clap(long)]
    /// Directory within which log files will be placed, default is platform dependent
    log_location: Option<PathBuf>,

    #[clap(long, default_value = "5000000")]
    /// Max size in bytes that a log file is allowed to reach before being rolled over
    log_max_file_size: u64,

    #[clap(long, default_value = "3")]
    /// Number of archived logs to keep
    num_old_logs: u32,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    /// Run the store hub that every client connects to
    Serve,
    /// Show the board, updating as the game changes
    Display,
    /// Read commands from stdin and apply them to the game
    Control,
    /// Control a game kept in this process, without a store hub
    Local,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Serve => Mode::Serve,
            ModeArg::Display => Mode::Display,
            ModeArg::Control => Mode::Control,
            ModeArg::Local => Mode::Local,
        }
    }
}

fn init_logging(args: &Cli, log_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let log_base_path = match args.log_location {
        Some(ref path) => path.clone(),
        None => {
            let mut path = directories::BaseDirs::new()
                .ok_or("Could not find a directory to store logs")?
                .data_local_dir()
                .to_path_buf();
            path.push("scoreboard-logs");
            path
        }
    };
    let mut log_path = log_base_path.clone();
    let mut archived_log_path = log_base_path;
    log_path.push(format!("{log_name}-log.txt"));
    archived_log_path.push(format!("{log_name}-log-{{}}.txt.gz"));

    #[cfg(debug_assertions)]
    eprintln!("Log path: {}", log_path.display());

    // Only log to the console in debug mode
    #[cfg(debug_assertions)]
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{d} {h({l:5})} {M}] {m}{n}")))
        .build();

    // Setup the file log roller
    let roller = FixedWindowRoller::builder().build(
        archived_log_path
            .as_os_str()
            .to_str()
            .ok_or("The log path is not valid UTF-8")?,
        args.num_old_logs,
    )?;
    let file_policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(args.log_max_file_size)),
        Box::new(roller),
    );
    let file_appender = RollingFileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new("[{d} {l:5} {M}] {m}{n}")))
        .build(log_path, Box::new(file_policy))?;

    // Setup the logging from all locations to use `LevelFilter::Error`
    let root = Root::builder().appender("file_appender");
    #[cfg(debug_assertions)]
    let root = root.appender("console");
    let root = root.build(LevelFilter::Error);

    // Setup the top level logging config
    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("file_appender", Box::new(file_appender)));

    #[cfg(debug_assertions)]
    let log_config = log_config.appender(Appender::builder().build("console", Box::new(console)));

    let log_config = log_config
        .logger(Logger::builder().build(APP_NAME, log_level))
        .logger(Logger::builder().build(COMMON_LOGGER, log_level))
        .build(root)?;

    log4rs::init_config(log_config)?;
    log_panics::init();
    Ok(())
}

fn load_config() -> Config {
    match confy::get_configuration_file_path(APP_NAME, None) {
        Ok(path) => info!("Reading config file from {path:?}"),
        Err(e) => warn!("Could not determine the config file path: {e}"),
    }

    match confy::load(APP_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = Config::default();
            if let Err(e) = confy::store(APP_NAME, None, &config) {
                error!("Failed to write the default config file: {e}");
            }
            config
        }
    }
}

/// Forwards each parsed line of stdin. Closing stdin closes the channel.
async fn read_commands(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read from stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Rejected command {line:?}: {e}");
                eprintln!("{e}");
            }
        }
    }
}

async fn run(mode: Mode, config: Config) {
    let Config { store, .. } = config.clone();
    match mode {
        Mode::Serve => {
            info!("Starting the store hub on port {}", store.port);
            StoreServer::new(store.port).wait().await;
        }
        Mode::Display => {
            info!("Starting the display for {}:{}", store.host, store.port);
            let remote = RemoteStore::connect(store.host, store.port);
            let app = ScoreboardApp::new(config, remote, SystemTimeSource);
            app.run(None, |board| {
                // Clear the terminal and redraw from the top
                println!("\x1b[2J\x1b[H{board}");
            })
            .await;
        }
        Mode::Control => {
            info!("Starting the controller for {}:{}", store.host, store.port);
            let remote = RemoteStore::connect(store.host, store.port);
            control(config, remote).await;
        }
        Mode::Local => {
            info!("Starting a local controller");
            control(config, MemoryStore::new()).await;
        }
    }
}

async fn control<S: SharedStore>(config: Config, store: S) {
    let app = ScoreboardApp::new(config, store, SystemTimeSource);
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(read_commands(tx));
    app.run(Some(rx), |board| println!("{board}\n")).await;
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let log_name = match args.mode {
        Some(mode) => Mode::from(mode).to_string().to_lowercase(),
        None => APP_NAME.to_string(),
    };
    init_logging(&args, &log_name)?;

    let mut config = load_config();
    let mode = args.mode.map(Mode::from).unwrap_or(config.mode);
    info!("Starting {APP_NAME} in {mode} mode");

    if let Some(ref host) = args.host {
        config.store.host = host.clone();
    }
    if let Some(port) = args.port {
        config.store.port = port;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(mode, config));

    Ok(())
}
