// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod notification;
pub mod orchestrator;
pub mod output;
pub mod schema;
pub mod types;
pub mod watch;

use std::path::Path;

use anyhow::Result;
use tokio::sync::watch as shutdown;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, RawConfigFile, SchemaConfig};
use crate::env::{LOCK_VAR, SUB_VAR};
use crate::errors::RewatchError;
use crate::notification::notifier;
use crate::orchestrator::MultiSchemaOrchestrator;
use crate::output::{ConsoleOutput, Label};
use crate::schema::SchemaRunner;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and schema selection
/// - one in-process schema runner, or the multi-schema orchestrator
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    if let Some(Command::Version) = args.command {
        print_version();
        return Ok(());
    }

    ensure_not_nested()?;

    let output = ConsoleOutput::shared();
    let notifier = notifier(!args.no_notify);

    let (schemas, selected) = match &args.command {
        Some(Command::Run(run_args)) => {
            let raw = RawConfigFile {
                schema: vec![run_args.to_schema()?],
            };
            (ConfigFile::try_from(raw)?, vec![1])
        }
        _ => {
            let cfg = config::load(&args.path)?;
            let selected = select_schemas(&cfg, &args.schema)?;
            (cfg, selected)
        }
    };

    if args.dry_run {
        print_dry_run(&schemas, &selected);
        return Ok(());
    }

    let shutdown = spawn_shutdown_listener();

    if let [number] = selected.as_slice() {
        let schema = schemas
            .schema(*number)
            .cloned()
            .ok_or_else(|| RewatchError::Config(format!("schema {number} does not exist")))?;
        info!(schema = number, label = schema.display_label(), "running single schema");

        SchemaRunner::new(schema, output, notifier).run(shutdown).await?;
        return Ok(());
    }

    let orchestrator = MultiSchemaOrchestrator::new(child_base_args(&args)?, output.clone())?;
    output.push(
        &Label::system(),
        &format!("starting {} schemas", selected.len()),
    );
    orchestrator.run(&selected, shutdown).await?;
    Ok(())
}

/// Refuse to start from inside a step spawned by another instance, unless
/// we are one of the orchestrator's own children.
fn ensure_not_nested() -> std::result::Result<(), RewatchError> {
    let locked = std::env::var_os(LOCK_VAR).is_some();
    let sub = std::env::var_os(SUB_VAR).is_some();
    if locked && !sub {
        return Err(RewatchError::Config(format!(
            "rewatch is already running in this environment ({LOCK_VAR} is set)"
        )));
    }
    Ok(())
}

/// 1-based schema numbers to run: the `--schema` selection, or all.
pub fn select_schemas(cfg: &ConfigFile, requested: &[usize]) -> std::result::Result<Vec<usize>, RewatchError> {
    if requested.is_empty() {
        return Ok((1..=cfg.schemas.len()).collect());
    }

    let mut selected = Vec::with_capacity(requested.len());
    for &number in requested {
        if number == 0 || number > cfg.schemas.len() {
            return Err(RewatchError::Config(format!(
                "schema {number} does not exist (config has {})",
                cfg.schemas.len()
            )));
        }
        if !selected.contains(&number) {
            selected.push(number);
        }
    }
    Ok(selected)
}

/// Arguments that every orchestrator child receives before `--schema N`.
fn child_base_args(args: &CliArgs) -> Result<Vec<String>> {
    let path = std::path::absolute(&args.path)?;
    let mut base = vec![path.to_string_lossy().into_owned()];
    if args.no_notify {
        base.push("--no-notify".to_string());
    }
    if let Some(level) = args.log_level {
        base.push("--log-level".to_string());
        base.push(level.as_str().to_string());
    }
    Ok(base)
}

/// A receiver that flips to `true` on Ctrl-C (or SIGTERM on unix).
fn spawn_shutdown_listener() -> shutdown::Receiver<bool> {
    let (tx, rx) = shutdown::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = tx.send(true);
        // Keep the sender alive so receivers never see a closed channel.
        std::future::pending::<()>().await;
    });
    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
        }
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
    }
}

fn print_version() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("  os:   {}", std::env::consts::OS);
    println!("  arch: {}", std::env::consts::ARCH);
    println!("  pid:  {}", std::process::id());
}

/// Simple dry-run output: print the selected schemas and their steps.
fn print_dry_run(cfg: &ConfigFile, selected: &[usize]) {
    println!("rewatch dry-run");
    println!();

    for &number in selected {
        let Some(schema) = cfg.schema(number) else {
            continue;
        };
        print_schema(number, schema);
    }

    debug!("dry-run complete (no execution)");
}

fn print_schema(number: usize, schema: &SchemaConfig) {
    let label = match schema.display_label() {
        "" => "(unnamed)",
        label => label,
    };
    println!("schema {number}: {label}");
    if let Some(dir) = &schema.workdir {
        println!("    workdir: {}", display_path(dir));
    }
    println!(
        "    watch: {} (recursive: {})",
        display_path(&schema.watcher.path),
        schema.watcher.recursive
    );
    if !schema.watcher.extensions.is_empty() {
        println!("    extensions: {:?}", schema.watcher.extensions);
    }
    if !schema.watcher.excluded_paths.is_empty() {
        println!("    excluded: {:?}", schema.watcher.excluded_paths);
    }
    println!(
        "    debounce: {}ms, restart: {:?}, kill timeout: {}ms",
        schema.debounce_ms, schema.restart, schema.kill_timeout_ms
    );
    if let Some(build) = &schema.commands.build {
        println!("    build: {}", build.display());
    }
    for run in &schema.commands.run {
        match &run.label {
            Some(label) => println!("    run [{label}]: {}", run.display()),
            None => println!("    run: {}", run.display()),
        }
    }
    if !schema.commands.clean.is_empty() {
        println!("    clean: {:?}", schema.commands.clean);
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
