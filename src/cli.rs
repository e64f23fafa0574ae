//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::builtin_engine::BuiltinEngine;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::layout_renderer::LayoutRenderer;
use crate::adapters::svg_chart::render_svg;
use crate::domain::catalog;
use crate::domain::category::Category;
use crate::domain::config::ChartConfig;
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use crate::domain::lifecycle::{BackgroundEvent, ChartSession};
use crate::domain::ohlcv::BaseSeries;
use crate::domain::store::ParameterStore;
use crate::ports::archive_port::SeriesArchivePort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "chartdesk", about = "Indicator configuration and chart activation")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store schema and seed the builtin indicators
    Init {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List configured indicator instances by menu
    List {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
    /// Show the parameters of one instance
    Show {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        key: String,
    },
    /// Change one parameter of an instance
    Set {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        value: String,
    },
    /// Copy an instance under the next free id
    Duplicate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        key: String,
    },
    /// Activate indicators over a symbol and write an SVG chart
    Render {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        symbol: String,
        #[arg(short, long, value_delimiter = ',')]
        keys: Vec<String>,
        /// CSV trading record to mark on the chart
        #[arg(short, long)]
        trades: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "1900-01-01")]
        start: NaiveDate,
        #[arg(long, default_value = "9999-12-31")]
        end: NaiveDate,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Init { config } => run_init(&config),
        Command::List { config, category } => run_list(&config, category),
        Command::Show { config, key } => run_show(&config, &key),
        Command::Set {
            config,
            key,
            name,
            value,
        } => run_set(&config, &key, &name, &value),
        Command::Duplicate { config, key } => run_duplicate(&config, &key),
        Command::Render {
            config,
            symbol,
            keys,
            trades,
            output,
            start,
            end,
        } => run_render(
            &config,
            &RenderRequest {
                symbol,
                keys,
                trades,
                output,
                start,
                end,
            },
        ),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<ChartConfig, ChartError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    ChartConfig::from_port(&adapter)
}

/// Persistent collaborators behind one config file.
struct Backend {
    store: ParameterStore,
    data: Arc<dyn DataPort + Send + Sync>,
    archive: Option<Arc<dyn SeriesArchivePort>>,
}

#[cfg(feature = "sqlite")]
fn open_backend(config: &ChartConfig) -> Result<Backend, ChartError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let sqlite = SqliteAdapter::from_config(config)?;
    sqlite.initialize_schema()?;
    let store = ParameterStore::open(Box::new(sqlite.clone()))?;
    let data: Arc<dyn DataPort + Send + Sync> = match &config.csv_dir {
        Some(dir) => Arc::new(CsvAdapter::new(dir.clone())),
        None => Arc::new(sqlite.clone()),
    };
    Ok(Backend {
        store,
        data,
        archive: Some(Arc::new(sqlite)),
    })
}

#[cfg(not(feature = "sqlite"))]
fn open_backend(_config: &ChartConfig) -> Result<Backend, ChartError> {
    Err(ChartError::ConfigInvalid {
        section: "store".into(),
        key: "path".into(),
        reason: "built without the sqlite feature".into(),
    })
}

fn parse_key(raw: &str) -> Result<IndicatorKey, ChartError> {
    raw.parse()
}

fn run_init(config_path: &Path) -> Result<(), ChartError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let mut backend = open_backend(&config)?;
    let created = catalog::seed(&mut backend.store)?;
    if created.is_empty() {
        eprintln!("Store already seeded");
    } else {
        for key in &created {
            eprintln!("  created {key}");
        }
        eprintln!("Seeded {} indicator instances", created.len());
    }
    Ok(())
}

fn open_session(config: ChartConfig, store: ParameterStore, base: BaseSeries) -> ChartSession<LayoutRenderer> {
    ChartSession::new(
        config,
        store,
        base,
        Box::new(BuiltinEngine),
        LayoutRenderer::new(),
    )
}

fn parse_category(raw: &str) -> Result<Category, String> {
    Category::from_attribute(Some(raw)).ok_or_else(|| format!("unknown category {raw:?}"))
}

fn run_list(config_path: &Path, filter: Option<Category>) -> Result<(), ChartError> {
    let config = load_config(config_path)?;
    let backend = open_backend(&config)?;
    let empty = BaseSeries::new("", Vec::new())?;
    let session = open_session(config, backend.store, empty);

    for group in session.menu() {
        if filter.is_some_and(|c| c != group.category) {
            continue;
        }
        println!("{}", group.title);
        for entry in &group.entries {
            match &entry.error {
                Some(error) => println!("  {}  [invalid: {error}]", entry.label),
                None => println!("  {}", entry.label),
            }
        }
    }
    Ok(())
}

fn run_show(config_path: &Path, raw_key: &str) -> Result<(), ChartError> {
    let key = parse_key(raw_key)?;
    let config = load_config(config_path)?;
    let backend = open_backend(&config)?;
    let store = &backend.store;

    let params = store.get_parameters_for(&key)?;
    let description = store.get_description(key.indicator_type())?;
    let category = store.get_category(&key)?;
    println!("{key}: {description}");
    println!("  category: {category}");
    for param in params {
        println!(
            "  {} ({}) = {}",
            param.name,
            param.parameter_type.tag(),
            param.raw
        );
    }
    Ok(())
}

fn run_set(config_path: &Path, raw_key: &str, name: &str, value: &str) -> Result<(), ChartError> {
    let key = parse_key(raw_key)?;
    let config = load_config(config_path)?;
    let mut backend = open_backend(&config)?;
    backend.store.set_parameter(&key, name, value)?;
    eprintln!("{key}.{name} = {value}");
    Ok(())
}

fn run_duplicate(config_path: &Path, raw_key: &str) -> Result<(), ChartError> {
    let key = parse_key(raw_key)?;
    let config = load_config(config_path)?;
    let mut backend = open_backend(&config)?;
    let new_key = backend.store.duplicate(&key)?;
    println!("{new_key}");
    Ok(())
}

#[derive(Debug)]
struct RenderRequest {
    symbol: String,
    keys: Vec<String>,
    trades: Option<PathBuf>,
    output: Option<PathBuf>,
    start: NaiveDate,
    end: NaiveDate,
}

fn run_render(config_path: &Path, request: &RenderRequest) -> Result<(), ChartError> {
    let keys = request
        .keys
        .iter()
        .map(|raw| parse_key(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let config = load_config(config_path)?;
    let backend = open_backend(&config)?;
    let empty = BaseSeries::new(request.symbol.clone(), Vec::new())?;
    let mut session = open_session(config, backend.store, empty);
    if let Some(archive) = backend.archive {
        session = session.with_archive(archive);
    }

    eprintln!("Loading {} bars", request.symbol);
    session.request_base_series(backend.data, &request.symbol, request.start, request.end);
    session.wait_background();
    for event in session.poll_background() {
        match event {
            BackgroundEvent::BaseSeriesFailed { error, .. } => return Err(error),
            BackgroundEvent::TaskFailed { task, reason } => {
                return Err(ChartError::Data {
                    reason: format!("{task} failed: {reason}"),
                });
            }
            _ => {}
        }
    }
    eprintln!("  {} bars", session.registry().base_series().len());

    let report = session.load_many(&keys);
    for (key, error) in &report.failed {
        eprintln!("warning: {key} not shown ({error})");
    }

    if let Some(path) = &request.trades {
        let record = CsvAdapter::load_trading_record(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trades".to_string());
        eprintln!("  {} trades from {}", record.trades().len(), path.display());
        session.add_trading_record(&name, record);
    }

    let svg = {
        let synchronizer = session.synchronizer();
        render_svg(synchronizer.renderer().layout(), session.registry().base_series())
    };

    session.wait_background();
    for event in session.poll_background() {
        match event {
            BackgroundEvent::ArchiveFailed { identifier, error } => {
                eprintln!("warning: archiving {identifier} failed ({error})");
            }
            BackgroundEvent::TaskFailed { task, reason } => {
                eprintln!("warning: {task} failed ({reason})");
            }
            _ => {}
        }
    }

    match &request.output {
        Some(path) => {
            fs::write(path, svg)?;
            eprintln!("Chart written to: {}", path.display());
        }
        None => print!("{svg}"),
    }
    if !report.is_complete() {
        eprintln!("{} of {} indicators failed", report.failed.len(), keys.len());
    }
    Ok(())
}
