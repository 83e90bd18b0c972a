use std::{io::Write as _, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, load_settings_from, Settings, ENV_PREFIX},
    transport::{HttpInstructionTransport, HttpSearchBackend},
    Catalog, QueryOrchestrator, SearchEvent, SortField, SortOrder, SortState, StreamingStatus,
};
use serde_json::{Map, Value};
use shared::{domain::FacetKey, protocol::SearchMode};
use storage::Storage;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse and search the program catalog")]
struct Cli {
    /// Settings file; defaults to ./browse.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Catalog JSON file, overriding the configured path.
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List selectable values for every facet.
    Facets,
    /// Search the catalog and print one page of results.
    Query {
        #[arg(default_value = "")]
        text: String,
        #[arg(long, default_value = "keyword")]
        mode: SearchMode,
        /// Facet selection as KEY=VALUE, repeatable.
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Sort as FIELD or FIELD:asc|desc.
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
        /// Print the page as JSON records.
        #[arg(long)]
        json: bool,
    },
    /// Show or clear recent searches.
    History {
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => load_settings_from(path, ENV_PREFIX),
        None => load_settings(),
    }
    .context("failed to load settings")?;
    debug!(?settings, "browse: settings loaded");

    let storage = Arc::new(Storage::new(&settings.history_database_url()).await?);

    if let Command::History { clear } = &cli.command {
        return history(&storage, *clear).await;
    }

    let catalog_path = cli
        .catalog
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.catalog_path));
    let catalog = Catalog::load(&catalog_path).await?;
    let orchestrator = build_orchestrator(catalog, &settings, storage)?;

    match cli.command {
        Command::Facets => {
            for (key, values) in orchestrator.facet_options().iter() {
                println!("{key}:");
                for value in values {
                    println!("  {value}");
                }
            }
        }
        Command::Query {
            text,
            mode,
            filters,
            sort,
            page,
            page_size,
            json,
        } => {
            if !filters.is_empty() {
                orchestrator.apply_selection(&selection_from_args(&filters)?).await;
            }
            if let Some(sort) = sort {
                orchestrator.set_sort(parse_sort(&sort)?).await;
            }
            run_query(&orchestrator, &text, mode).await?;
            if let Some(page_size) = page_size {
                orchestrator.set_page_size(page_size).await?;
            }
            orchestrator.set_page(page).await;
            print_page(&orchestrator, json).await?;
        }
        Command::History { .. } => {}
    }

    Ok(())
}

fn build_orchestrator(
    catalog: Catalog,
    settings: &Settings,
    storage: Arc<Storage>,
) -> Result<Arc<QueryOrchestrator>> {
    let backend = HttpSearchBackend::new(
        &settings.server_url,
        settings.search_top_k,
        settings.request_timeout(),
    )?;
    let transport = HttpInstructionTransport::new(&settings.server_url, settings.request_timeout())?;
    Ok(QueryOrchestrator::new_with_dependencies(
        catalog,
        settings.page_size,
        Arc::new(backend),
        Arc::new(transport),
        storage,
    ))
}

async fn run_query(orchestrator: &Arc<QueryOrchestrator>, text: &str, mode: SearchMode) -> Result<()> {
    let mut events = orchestrator.subscribe_events();
    orchestrator.submit_search(text, mode).await?;
    if mode != SearchMode::Llm || text.trim().is_empty() {
        return Ok(());
    }

    // Reasoning goes to stderr; stdout carries the results.
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while let Ok(event) = events.recv().await {
            match event {
                SearchEvent::ThoughtsUpdated { thoughts, .. } => {
                    if let Some(delta) = thoughts.get(printed..) {
                        eprint!("{delta}");
                        let _ = std::io::stderr().flush();
                        printed = thoughts.len();
                    }
                }
                SearchEvent::StreamStatusChanged { status, .. }
                    if status != StreamingStatus::Thinking =>
                {
                    break;
                }
                _ => {}
            }
        }
        if printed > 0 {
            eprintln!();
        }
    });
    orchestrator.wait_for_stream().await;
    let _ = printer.await;

    let snapshot = orchestrator.snapshot().await;
    if let Some(err) = snapshot.last_error {
        return Err(anyhow!("AI search failed: {err}"));
    }
    info!(filters = %serde_json::to_string(&snapshot.filters)?, "browse: applied AI filters");
    Ok(())
}

async fn print_page(orchestrator: &QueryOrchestrator, json: bool) -> Result<()> {
    let page = orchestrator.current_page().await;
    if json {
        let records: Vec<_> = page.items.iter().map(|record| &**record).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let snapshot = orchestrator.snapshot().await;
    println!(
        "mode={} status={:?} results={} page={}/{}",
        snapshot.mode,
        snapshot.status,
        page.total,
        page.page,
        page.page_count.max(1)
    );
    if let Some(weights) = &snapshot.weights {
        let weights: Vec<String> = weights.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("weights: {}", weights.join(" "));
    }
    for record in &page.items {
        let fee = record
            .international_total_fee
            .map(|fee| format!("{}-{}", fee.lower(), fee.upper()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>6}  {}  |  {}  |  {}  |  {}",
            record.id.0, record.program_name, record.university, record.discipline, fee
        );
    }
    Ok(())
}

async fn history(storage: &Storage, clear: bool) -> Result<()> {
    if clear {
        let removed = storage.clear_search_history().await?;
        println!("cleared {removed} searches");
        return Ok(());
    }
    for entry in storage
        .list_search_history(storage::DEFAULT_HISTORY_CAP)
        .await?
    {
        println!("{}  {}", entry.recorded_at.format("%Y-%m-%d %H:%M"), entry.query);
    }
    Ok(())
}

fn selection_from_args(filters: &[String]) -> Result<Value> {
    let mut selection = Map::new();
    for filter in filters {
        let (key, value) = filter
            .split_once('=')
            .ok_or_else(|| anyhow!("filter '{filter}' must be KEY=VALUE"))?;
        let key = FacetKey::from_wire(key).ok_or_else(|| anyhow!("unknown facet '{key}'"))?;
        let values = selection
            .entry(key.as_str())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = values {
            values.push(Value::String(value.trim().to_string()));
        }
    }
    Ok(Value::Object(selection))
}

fn parse_sort(raw: &str) -> Result<SortState> {
    let (field, order) = raw.split_once(':').unwrap_or((raw, "asc"));
    let field: SortField = field.parse().map_err(|err: String| anyhow!(err))?;
    let order: SortOrder = order.parse().map_err(|err: String| anyhow!(err))?;
    Ok(SortState::new(field, order))
}
