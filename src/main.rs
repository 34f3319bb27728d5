use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use directories::ProjectDirs;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;
use tracing::{error, info};

mod controller;
mod domain;
mod filter;
mod inputter;
mod locator;
mod logging;
mod matcher;
mod model;
mod places;
mod position;
mod store;
mod table;
mod timing;
mod ui;
mod watcher;

use controller::Controller;
use domain::{LFConfig, LFError};
use model::{Model, Status};
use position::Size;
use store::{JsonFileStore, MemoryStore, PreferenceStore};
use ui::TableUI;

/// Table viewer that filters rows by the places in their location column.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// csv, parquet or arrow files to show
    files: Vec<String>,

    /// Directory to watch for table files appearing or disappearing
    #[arg(long, value_name = "DIR")]
    watch: Option<String>,

    /// Where the place list and filter state are kept
    #[arg(long, value_name = "FILE")]
    store: Option<String>,

    /// Keep preferences in memory only
    #[arg(long, conflicts_with = "store")]
    ephemeral: bool,

    /// csv files have no header line; their first row becomes the header
    #[arg(long)]
    no_header: bool,

    /// Hide the title bar
    #[arg(long)]
    no_title_bar: bool,

    /// Log file, defaults to locfilter.log in the temp directory
    #[arg(long, value_name = "FILE")]
    log: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = run(args);

    // Restore even when the loop failed, the shell is unusable otherwise.
    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();

    match result {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(raw: &str) -> Result<PathBuf, LFError> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| LFError::LoadingFailed(format!("cannot expand {raw}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn default_store_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "locfilter").map(|dirs| dirs.config_dir().join("preferences.json"))
}

fn build_config(args: &Args) -> Result<LFConfig, LFError> {
    Ok(LFConfig {
        has_header: !args.no_header,
        show_title_bar: !args.no_title_bar,
        watch_dir: args.watch.as_deref().map(expand_path).transpose()?,
        store_path: match &args.store {
            Some(raw) => Some(expand_path(raw)?),
            None if args.ephemeral => None,
            None => default_store_path(),
        },
        ..Default::default()
    })
}

fn build_store(cfg: &LFConfig) -> Box<dyn PreferenceStore> {
    match &cfg.store_path {
        Some(path) => {
            let store = JsonFileStore::new(path.clone());
            info!("Preferences in {}", store.path().display());
            Box::new(store)
        }
        None => {
            info!("Preferences kept in memory");
            Box::new(MemoryStore::default())
        }
    }
}

fn run(args: Args) -> Result<(), LFError> {
    let log_path = match &args.log {
        Some(raw) => expand_path(raw)?,
        None => logging::default_log_path(),
    };
    logging::init(&log_path)?;
    info!("Starting locfilter!");

    let cfg = build_config(&args)?;
    let files = args
        .files
        .iter()
        .map(|f| expand_path(f))
        .collect::<Result<Vec<_>, _>>()?;

    let mut terminal = ratatui::init();
    execute!(stdout(), EnableMouseCapture)?;
    let area = terminal.size()?;

    let now = Instant::now();
    let mut model = Model::init(&cfg, build_store(&cfg), area.width, area.height, now);
    model.load_tables(files, now);
    if let Some(dir) = cfg.watch_dir.clone() {
        model.watch(dir, now)?;
    }

    let mut ui = TableUI::new();
    let mut controller = Controller::new(&cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message);
        };

        let area = terminal.size()?;
        model.tick(Instant::now(), Size::new(area.width as i32, area.height as i32));
    }

    info!("Bye!");
    Ok(())
}
