//! CLI tool to run a .side script against a warm session pool.
//!
//! Usage:
//!   cargo run -p gridrunner-cli -- <path_to_side_file> [suite_or_test_name]
//!
//! This tool:
//! 1. Loads gridrunner's configuration (file + env overlay)
//! 2. Saves the given .side file into a throwaway script store
//! 3. Warms up one session against the configured grid
//! 4. Runs the project's first suite (or the named suite/test) and prints the report

use std::collections::HashMap;
use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use gridrunner_config::GridrunnerConfig;
use gridrunner_executor::{Dispatcher, DispatcherSettings, ExecutionRequest};
use gridrunner_locks::LockRepository;
use gridrunner_pool::{FantocciniFactory, SessionPool};
use gridrunner_templates::Renderer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gridrunner=info".parse()?))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <path_to_side_file> [suite_or_test_name]", args[0]);
        std::process::exit(1);
    }
    let side_path = &args[1];
    let selection = args.get(2).cloned();

    let config = GridrunnerConfig::load(Some(std::path::Path::new("gridrunner.json")))
        .context("loading gridrunner configuration")?;

    println!("gridrunner CLI");
    println!("  grid:   {}", config.grid_url);
    println!("  script: {side_path}");
    println!();

    let text = fs::read_to_string(side_path).context("reading .side file")?;
    let store = gridrunner_core::ScriptStore::new(&config.script_dir);
    store.save("cli-run", &text).context("saving script")?;

    let renderer = Renderer::new(&config.js_dir);
    let locks = LockRepository::new(&config.lock_dir);
    let factory = Arc::new(FantocciniFactory::new(config.grid_url.clone()));
    let pool = SessionPool::new(factory, std::time::Duration::from_secs(config.pool_init_timeout_s));

    let started = pool.warm_up(1).await.context("warming up session pool")?;
    if started == 0 {
        anyhow::bail!("could not start a session against {}", config.grid_url);
    }

    let settings = DispatcherSettings {
        run_lock_ttl: std::time::Duration::from_secs(config.default_lock_ttl_s),
        stream_lock_ttl: std::time::Duration::from_secs(config.stream_lock_ttl_s),
        implicit_wait: std::time::Duration::from_secs(config.implicit_wait_s),
        ..DispatcherSettings::default()
    };
    let dispatcher = Dispatcher::new(store, renderer, locks, pool, settings);

    let mut req = ExecutionRequest {
        script_id: "cli-run".to_string(),
        suite: None,
        test: None,
        params: HashMap::new(),
    };
    match &selection {
        Some(name) => req.suite = Some(name.clone()),
        None => {}
    }

    let report = dispatcher.execute_any(req).await.context("running script")?;

    println!("session:  {}", report.session_id);
    println!("commands:");
    for outcome in &report.outcomes {
        let mark = if outcome.ok { "ok " } else { "FAIL" };
        println!("  [{mark}] {} ({:?})", outcome.command_id, outcome.duration);
        if let Some(err) = &outcome.error {
            println!("        {err}");
        }
    }
    println!();
    println!("page source: {} bytes", report.page_source.len());

    Ok(())
}
