use std::process::ExitCode;

use clap::Parser;

use clip_column::clipboard;
use clip_column::config::{Cli, Config};
use clip_column::error::AppError;
use clip_column::shutdown;
use clip_column::watcher::{Outcome, Watcher};

fn main() -> ExitCode {
    // Parse CLI arguments and load configuration
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref());
    // Only write default config if no custom path was specified
    if cli.config.is_none() {
        Config::write_default_if_missing(&Config::config_path());
    }
    config.apply_cli(&cli);

    init_logging(&config);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config) {
    let level = config.log_level();
    if let Some(path) = config.log_file() {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_max_level(level)
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .init();
                return;
            }
            Err(e) => eprintln!("cannot open log file {}: {e}, logging to stderr", path.display()),
        }
    }
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, config: &Config) -> Result<(), AppError> {
    let backend = config.watcher.backend.resolve();
    let (access, notifier) = clipboard::open_backend(backend, config.poll_interval());
    let options = config.transform_options();

    if cli.once {
        let mut watcher = Watcher::new(access, options);
        let outcome = watcher.run_once();
        report(&outcome);
        if !matches!(outcome, Outcome::Transformed { .. }) {
            println!("clipboard left as is ({})", describe(&outcome));
        }
        return Ok(());
    }

    let mut watcher = Watcher::new(access, options).with_observer(report);
    shutdown::install(watcher.shutdown_handle())?;

    println!("clipboard watcher started ({backend} backend), press Ctrl+C to exit...");
    watcher.start(notifier)?;
    println!("exiting after {} conversion(s)", watcher.writes());
    Ok(())
}

/// One console line per conversion or dropped change.
fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Transformed { cells } => println!("converted {cells} value(s) to one per line"),
        Outcome::Dropped(reason) => println!("clipboard change dropped: {reason}"),
        _ => {}
    }
}

fn describe(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Transformed { .. } => "converted",
        Outcome::Empty => "empty",
        Outcome::SelfWrite | Outcome::Duplicate => "already processed",
        Outcome::AlreadyColumnar => "no tab-delimited data",
        Outcome::Unchanged => "nothing to change",
        Outcome::Unsupported => "not text",
        Outcome::Dropped(_) => "clipboard unavailable",
    }
}
