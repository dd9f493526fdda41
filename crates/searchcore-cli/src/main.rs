mod app;
mod http;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use searchcore_core::{
    FileEventKind, ProjectId, Scope, SearchCoreError, SearchFilters, SearchRequest, Settings,
};
use searchcore_index::FileEvent;
use searchcore_vector::analyze;
use serde::Serialize;
use tokio::sync::mpsc;

use app::AppState;

#[derive(Parser)]
#[command(name = "searchcore")]
#[command(about = "Workspace semantic search core - CLI demo binary", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty, table)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Path to the settings file; defaults and SEARCHCORE_ env vars still apply.
    #[arg(long, global = true, env = "SEARCHCORE_SETTINGS", default_value = "searchcore.toml")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Workspace document operations
    #[command(subcommand)]
    Workspace(WorkspaceCommands),

    /// Indexing operations
    #[command(subcommand)]
    Index(IndexCommands),

    /// Semantic search operations
    #[command(subcommand)]
    Search(SearchCommands),

    /// Query analysis
    #[command(subcommand)]
    Query(QueryCommands),

    /// Query cache operations
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Metrics export
    Metrics,

    /// Run the metrics/health HTTP facade until interrupted
    Serve,
}

#[derive(Subcommand)]
enum WorkspaceCommands {
    /// Load and validate the workspace document at `--settings`'s `workspace_path`
    Load,
    /// Re-read and re-validate the workspace document
    Reload,
    /// Describe the whole workspace, or one project
    Get {
        project_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum IndexCommands {
    /// Index a single file
    File {
        project_id: String,
        path: PathBuf,
    },
    /// Index a directory
    Directory {
        project_id: String,
        path: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Run a full semantic search and print the merged, ranked results
    Semantic(SearchArgs),
    /// Run a semantic search, printing results as they are produced
    Streaming(SearchArgs),
}

#[derive(clap::Args)]
struct SearchArgs {
    query: String,

    #[arg(short, long, value_enum, default_value = "workspace")]
    scope: ScopeArg,

    #[arg(short, long)]
    project_id: Option<String>,

    #[arg(long)]
    include_dependencies: bool,

    #[arg(short, long, default_value = "10")]
    limit: usize,

    #[arg(long, value_delimiter = ',')]
    file_types: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    directories: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    #[arg(long)]
    min_score: Option<f32>,
}

#[derive(Clone, ValueEnum)]
enum ScopeArg {
    Project,
    Dependencies,
    Workspace,
    Related,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Project => Scope::Project,
            ScopeArg::Dependencies => Scope::Dependencies,
            ScopeArg::Workspace => Scope::Workspace,
            ScopeArg::Related => Scope::Related,
        }
    }
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Classify a query's intent, entities, and expansion (§4.5)
    Classify { query: String },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Invalidate one changed file
    InvalidateFile { path: String },
    /// Invalidate every fingerprint whose accessed files match a glob
    InvalidatePattern { pattern: String },
    /// Invalidate every fingerprint tagged with a project
    InvalidateProject { project_id: String },
    /// Wipe the whole cache (workspace reload)
    InvalidateAll,
}

#[derive(Serialize)]
struct WorkspaceInfo {
    version: String,
    name: String,
    project_count: usize,
    project_ids: Vec<String>,
}

#[derive(Serialize)]
struct ProjectInfo {
    id: String,
    name: String,
    path: String,
    languages: Vec<String>,
    dependencies: Vec<String>,
    enabled: bool,
    priority: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.settings).context("loading settings")?;

    match execute_command(&cli, settings).await {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SearchCoreError>() {
        Some(e) if is_validation_error(e) => 2,
        Some(_) => 1,
        None => 1,
    }
}

fn is_validation_error(err: &SearchCoreError) -> bool {
    matches!(
        err.kind(),
        "invalid_workspace_version"
            | "duplicate_project_id"
            | "invalid_project_id"
            | "empty_path"
            | "path_not_found"
            | "cyclic_dependency"
            | "unknown_dependency"
            | "self_dependency"
            | "unknown_relationship_endpoint"
            | "self_relationship"
            | "unknown_relationship_kind"
            | "dimension_mismatch"
            | "invalid_scope"
            | "missing_project_id"
            | "invalid_filter"
            | "query_too_long"
            | "query_empty"
    )
}

async fn execute_command(cli: &Cli, settings: Settings) -> Result<serde_json::Value> {
    match &cli.command {
        Commands::Workspace(cmd) => execute_workspace_command(cmd, settings).await,
        Commands::Index(cmd) => execute_index_command(cmd, settings).await,
        Commands::Search(cmd) => execute_search_command(cmd, settings).await,
        Commands::Query(cmd) => execute_query_command(cmd).await,
        Commands::Cache(cmd) => execute_cache_command(cmd, settings).await,
        Commands::Metrics => execute_metrics_command(settings).await,
        Commands::Serve => execute_serve_command(settings).await,
    }
}

async fn execute_workspace_command(cmd: &WorkspaceCommands, settings: Settings) -> Result<serde_json::Value> {
    match cmd {
        WorkspaceCommands::Load | WorkspaceCommands::Reload => {
            let state = AppState::build(settings).await?;
            let snapshot = state.workspace.current();
            Ok(serde_json::to_value(WorkspaceInfo {
                version: snapshot.version.clone(),
                name: snapshot.name.clone(),
                project_count: snapshot.projects.len(),
                project_ids: snapshot.project_ids().into_iter().map(|id| id.to_string()).collect(),
            })?)
        }
        WorkspaceCommands::Get { project_id } => {
            let state = AppState::build(settings).await?;
            let snapshot = state.workspace.current();
            match project_id {
                Some(id) => {
                    let project = snapshot
                        .project(&ProjectId::new(id.clone()))
                        .ok_or_else(|| anyhow::anyhow!("project not found: {id}"))?;
                    Ok(serde_json::to_value(ProjectInfo {
                        id: project.id.to_string(),
                        name: project.name.clone(),
                        path: project.path.display().to_string(),
                        languages: project.languages.iter().cloned().collect(),
                        dependencies: project.dependencies.iter().map(|d| d.to_string()).collect(),
                        enabled: project.indexing_policy.enabled,
                        priority: project.indexing_policy.priority.to_string(),
                    })?)
                }
                None => Ok(serde_json::to_value(WorkspaceInfo {
                    version: snapshot.version.clone(),
                    name: snapshot.name.clone(),
                    project_count: snapshot.projects.len(),
                    project_ids: snapshot.project_ids().into_iter().map(|id| id.to_string()).collect(),
                })?),
            }
        }
    }
}

async fn execute_index_command(cmd: &IndexCommands, settings: Settings) -> Result<serde_json::Value> {
    let state = AppState::build(settings).await?;
    match cmd {
        IndexCommands::File { project_id, path } => {
            let outcome = state
                .indexer
                .process(FileEvent {
                    project_id: ProjectId::new(project_id.clone()),
                    path: path.clone(),
                    kind: FileEventKind::Modified,
                })
                .await;
            Ok(serde_json::json!({
                "project_id": outcome.project_id.to_string(),
                "path": outcome.path,
                "chunks_total": outcome.chunks_total,
                "chunks_embedded": outcome.chunks_embedded,
                "chunks_failed": outcome.chunks_failed,
                "errors": outcome.errors,
            }))
        }
        IndexCommands::Directory { project_id, path, recursive } => {
            let mut outcomes = Vec::new();
            let mut stack = vec![path.clone()];
            while let Some(dir) = stack.pop() {
                let mut entries = tokio::fs::read_dir(&dir).await.context("reading directory")?;
                while let Some(entry) = entries.next_entry().await.context("reading directory entry")? {
                    let entry_path = entry.path();
                    let file_type = entry.file_type().await.context("stat'ing directory entry")?;
                    if file_type.is_dir() {
                        if *recursive {
                            stack.push(entry_path);
                        }
                        continue;
                    }
                    let outcome = state
                        .indexer
                        .process(FileEvent {
                            project_id: ProjectId::new(project_id.clone()),
                            path: entry_path,
                            kind: FileEventKind::Modified,
                        })
                        .await;
                    outcomes.push(serde_json::json!({
                        "path": outcome.path,
                        "chunks_total": outcome.chunks_total,
                        "chunks_embedded": outcome.chunks_embedded,
                        "chunks_failed": outcome.chunks_failed,
                        "errors": outcome.errors,
                    }));
                }
            }
            Ok(serde_json::json!({ "project_id": project_id, "files": outcomes }))
        }
    }
}

fn build_request(args: &SearchArgs) -> SearchRequest {
    SearchRequest {
        query: args.query.clone(),
        scope: args.scope.clone().into(),
        project_id: args.project_id.clone().map(ProjectId::new),
        include_dependencies: args.include_dependencies,
        limit: args.limit,
        filters: SearchFilters {
            file_types: args.file_types.iter().cloned().collect(),
            directories: args.directories.iter().cloned().collect(),
            exclude_patterns: args.exclude.clone(),
            min_score: args.min_score,
            authors: HashSet::new(),
            date_from: None,
            date_to: None,
        },
        similarity_threshold: None,
        recent_files: Vec::new(),
    }
}

async fn execute_search_command(cmd: &SearchCommands, settings: Settings) -> Result<serde_json::Value> {
    let state = AppState::build(settings).await?;
    match cmd {
        SearchCommands::Semantic(args) => {
            let request = build_request(args);
            let snapshot = state.workspace.current();
            let (results, metrics) = state.orchestrator.search(&snapshot, &request).await?;
            Ok(serde_json::json!({ "results": results, "metrics": metrics }))
        }
        SearchCommands::Streaming(args) => {
            let request = build_request(args);
            let snapshot = state.workspace.current();
            let (sender, mut receiver) = mpsc::channel(32);
            let orchestrator = state.orchestrator.clone();
            let snapshot_for_task = snapshot.clone();
            let request_for_task = request.clone();
            let task = tokio::spawn(async move {
                orchestrator
                    .search_streaming(&snapshot_for_task, &request_for_task, sender)
                    .await
            });
            let mut results = Vec::new();
            while let Some(result) = receiver.recv().await {
                println!("{}", serde_json::to_string(&result)?);
                results.push(result);
            }
            let metrics = task.await.context("streaming search task panicked")??;
            Ok(serde_json::json!({ "streamed": results.len(), "metrics": metrics }))
        }
    }
}

async fn execute_query_command(cmd: &QueryCommands) -> Result<serde_json::Value> {
    match cmd {
        QueryCommands::Classify { query } => {
            let parsed = analyze(query, &HashSet::new(), &HashSet::new());
            Ok(serde_json::to_value(parsed)?)
        }
    }
}

async fn execute_cache_command(cmd: &CacheCommands, settings: Settings) -> Result<serde_json::Value> {
    let state = AppState::build(settings).await?;
    match cmd {
        CacheCommands::InvalidateFile { path } => {
            state.invalidator.on_file_changed(path.clone()).await;
            Ok(serde_json::json!({ "invalidated": "file", "path": path }))
        }
        CacheCommands::InvalidatePattern { pattern } => {
            state.invalidator.invalidate_pattern(pattern).await;
            Ok(serde_json::json!({ "invalidated": "pattern", "pattern": pattern }))
        }
        CacheCommands::InvalidateProject { project_id } => {
            state.invalidator.invalidate_project(&ProjectId::new(project_id.clone())).await;
            Ok(serde_json::json!({ "invalidated": "project", "project_id": project_id }))
        }
        CacheCommands::InvalidateAll => {
            state.invalidator.invalidate_all().await;
            Ok(serde_json::json!({ "invalidated": "all" }))
        }
    }
}

async fn execute_metrics_command(settings: Settings) -> Result<serde_json::Value> {
    let state = AppState::build(settings).await?;
    println!("{}", state.metrics.export());
    Ok(serde_json::json!({ "exported": true }))
}

async fn execute_serve_command(settings: Settings) -> Result<serde_json::Value> {
    let bind_addr = settings.metrics_bind_addr.clone();
    let state = Arc::new(AppState::build(settings).await?);
    let _watcher = state.spawn_watch_pipeline()?;
    http::serve(state, &bind_addr).await?;
    Ok(serde_json::json!({ "served": true }))
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Pretty => print_pretty(value)?,
        OutputFormat::Table => print_table(value)?,
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => println!("{}: {}", key_colored, s.green()),
                    serde_json::Value::Number(n) => println!("{}: {}", key_colored, n.to_string().yellow()),
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{}: {}", key_colored, val_colored);
                    }
                    _ => println!("{}: {}", key_colored, val),
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("\n{}{}:", "Item ".cyan(), (i + 1).to_string().yellow());
                print_pretty(item)?;
            }
        }
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn print_table(value: &serde_json::Value) -> Result<()> {
    // Full tabular rendering would need a per-command column schema; fall
    // back to the pretty printer until one is worth building.
    print_pretty(value)
}
