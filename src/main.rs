// RpaDeck — Workflow editor and session client for a remote browser-automation backend
// License: Apache-2.0

use clap::{Parser, Subcommand};
use rpadeck::backend::factory::create_backend;
use rpadeck::backend::AutomationBackend;
use rpadeck::config::Config;
use rpadeck::dispatch::StepDispatcher;
use rpadeck::metrics::Metrics;
use rpadeck::monitor::{MonitorIntervals, SessionMonitor};
use rpadeck::shell::{self, Shell};
use rpadeck::workbench::Workbench;
use rpadeck::workflow::{available_templates, find_template, parser, WorkflowStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOGO: &str = "🦀";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "rpadeck",
    about = "RpaDeck — build and run browser workflows on a remote automation backend",
    version
)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive workflow editor (default)
    Shell,
    /// List stored workflows
    Workflows,
    /// List built-in and on-disk templates
    Templates,
    /// Import a template (name or file path) into the store
    Import {
        /// Template id, name, or path to a YAML/JSON file
        template: String,
        /// Placeholder value, e.g. --var base_url=https://example.com
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },
    /// Run a stored workflow and print its results
    Run {
        /// Workflow id
        workflow: String,
    },
    /// Watch the remote browser session
    Monitor {
        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Reset the remote browser
    Reset,
    /// Probe the backend once and show configuration
    Status,
    /// Show version information
    Version,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    rpadeck::logger::init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let cfg = Config::load_or_default(&config_path);

    let outcome = match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => shell_cmd(cfg).await,
        Commands::Workflows => workflows_cmd(&cfg).await,
        Commands::Templates => templates_cmd(&cfg),
        Commands::Import { template, vars } => import_cmd(&cfg, &template, &vars).await,
        Commands::Run { workflow } => run_cmd(&cfg, &workflow).await,
        Commands::Monitor { seconds } => monitor_cmd(&cfg, seconds).await,
        Commands::Reset => reset_cmd(&cfg).await,
        Commands::Status => status_cmd(&cfg, &config_path).await,
        Commands::Version => {
            version_cmd();
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("{} Error: {:#}", LOGO, e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Shell command
// ---------------------------------------------------------------------------

async fn shell_cmd(cfg: Config) -> anyhow::Result<()> {
    let backend = connect(&cfg)?;
    let store_path = cfg.workflows_path()?;
    let store = WorkflowStore::load(&store_path).await?;
    let metrics = Metrics::new();

    let monitor = Arc::new(SessionMonitor::new(
        backend.clone(),
        MonitorIntervals::from(&cfg.monitor),
        metrics.clone(),
    ));
    let _monitor_handle = monitor.start();

    let workbench = Workbench::new(store, StepDispatcher::new(backend, metrics.clone()));
    let mut shell = Shell::new(
        workbench,
        monitor,
        metrics,
        store_path.clone(),
        cfg.templates_dir()?,
    );
    shell.run().await?;

    shell.workbench().store.save(&store_path).await?;
    println!("Goodbye! 👋");
    Ok(())
}

// ---------------------------------------------------------------------------
// Store commands
// ---------------------------------------------------------------------------

async fn workflows_cmd(cfg: &Config) -> anyhow::Result<()> {
    let store = WorkflowStore::load(&cfg.workflows_path()?).await?;
    println!(
        "{}",
        shell::format_workflow_list(store.workflows(), store.current_id())
    );
    Ok(())
}

fn templates_cmd(cfg: &Config) -> anyhow::Result<()> {
    let templates = available_templates(&cfg.templates_dir()?, &HashMap::new())?;
    for tpl in &templates {
        println!("  {:<32} {} ({} steps)", tpl.id, tpl.name, tpl.steps.len());
        if !tpl.description.is_empty() {
            println!("  {:<32} {}", "", tpl.description);
        }
    }
    Ok(())
}

async fn import_cmd(cfg: &Config, template: &str, vars: &[String]) -> anyhow::Result<()> {
    let vars = shell::parse_vars(vars.iter().map(String::as_str)).map_err(anyhow::Error::msg)?;

    let path = Path::new(template);
    let tpl = if path.is_file() {
        parser::parse_template(path, &vars)?
    } else {
        let templates = available_templates(&cfg.templates_dir()?, &vars)?;
        find_template(&templates, template)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no template '{}' (see `rpadeck templates`)", template))?
    };

    let store_path = cfg.workflows_path()?;
    let mut store = WorkflowStore::load(&store_path).await?;
    let wf = store.import_template(&tpl);
    store.save(&store_path).await?;

    println!("{} Imported '{}' as {}", LOGO, wf.name, wf.id);
    for step in &wf.steps {
        let missing = step.missing_fields();
        if !missing.is_empty() {
            println!("  step {} needs {}", step.order, missing.join(", "));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Backend commands
// ---------------------------------------------------------------------------

async fn run_cmd(cfg: &Config, workflow_id: &str) -> anyhow::Result<()> {
    let backend = connect(cfg)?;
    let store = WorkflowStore::load(&cfg.workflows_path()?).await?;
    let wf = store
        .get(workflow_id)
        .ok_or_else(|| anyhow::anyhow!("no workflow '{}'", workflow_id))?;

    let metrics = Metrics::new();
    let dispatcher = StepDispatcher::new(backend, metrics.clone());

    println!("{} Running '{}' ({} steps)...", LOGO, wf.name, wf.steps.len());
    let results = dispatcher.run_workflow(&wf.steps).await?;
    println!("{}\n", shell::format_results(&results));
    println!("{}", metrics.format_report().await);
    Ok(())
}

async fn monitor_cmd(cfg: &Config, seconds: Option<u64>) -> anyhow::Result<()> {
    let backend = connect(cfg)?;
    let metrics = Metrics::new();
    let monitor = Arc::new(SessionMonitor::new(
        backend,
        MonitorIntervals::from(&cfg.monitor),
        metrics.clone(),
    ));
    let mut rx = monitor.subscribe();
    let handle = monitor.start();

    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(std::time::Duration::from_secs(s)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    println!("{} Watching {} (Ctrl+C to stop)", LOGO, cfg.backend.base_url);
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                println!(
                    "[{}] {}  page={}  screenshot={}",
                    chrono::Local::now().format("%H:%M:%S"),
                    state.mode(),
                    state.url.as_deref().unwrap_or("-"),
                    state.screenshot.as_ref().map(|s| s.len()).unwrap_or(0),
                );
            }
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop();
    println!("\n{}", metrics.format_report().await);
    Ok(())
}

async fn reset_cmd(cfg: &Config) -> anyhow::Result<()> {
    let backend = connect(cfg)?;
    let monitor = SessionMonitor::new(backend, MonitorIntervals::from(&cfg.monitor), Metrics::new());
    monitor.reset().await?;
    println!("{} Remote browser reset", LOGO);
    Ok(())
}

async fn status_cmd(cfg: &Config, config_path: &Path) -> anyhow::Result<()> {
    println!("{} RpaDeck Status\n", LOGO);

    if config_path.exists() {
        println!("  Config:    ✅ {}", config_path.display());
    } else {
        println!("  Config:    ⏭️  defaults (no {})", config_path.display());
    }

    match cfg.workflows_path() {
        Ok(p) if p.exists() => {
            let count = WorkflowStore::load(&p)
                .await
                .map(|s| s.workflows().len())
                .unwrap_or(0);
            println!("  Workflows: ✅ {} in {}", count, p.display());
        }
        Ok(p) => println!("  Workflows: ⏭️  none yet ({})", p.display()),
        Err(_) => println!("  Workflows: ❌ Could not resolve path"),
    }

    println!("  Backend:   {}", cfg.backend.base_url);
    let backend = connect(cfg)?;
    let metrics = Metrics::new();
    let monitor = SessionMonitor::new(backend, MonitorIntervals::from(&cfg.monitor), metrics);
    monitor.probe_health().await;
    monitor.probe_stream().await;

    let state = monitor.snapshot();
    if state.connected {
        println!("  Health:    ✅ reachable");
    } else {
        println!("  Health:    ❌ unreachable");
    }
    match &state.stream_url {
        Some(url) => println!("  Stream:    ✅ {}", url),
        None => println!("  Stream:    ⏭️  not offered (screenshot polling)"),
    }
    println!("  Mode:      {}", state.mode());
    Ok(())
}

fn version_cmd() {
    println!("{} RpaDeck v{}", LOGO, rpadeck::VERSION);
    println!("  Built with Rust 🦀");
    println!("  Remote browser workflow client");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_config_path(path: Option<&str>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => Config::default_path().unwrap_or_else(|_| PathBuf::from("config.json")),
    }
}

fn connect(cfg: &Config) -> anyhow::Result<Arc<dyn AutomationBackend>> {
    cfg.validate()?;
    create_backend(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_path_is_used() {
        let tmp = tempfile::tempdir().unwrap();
        let explicit = tmp.path().join("team.json");
        std::fs::write(&explicit, r#"{"backend": {"base_url": "http://team.local:5000"}}"#)
            .unwrap();

        let resolved = resolve_config_path(explicit.to_str());
        assert_eq!(resolved, explicit);
        let cfg = Config::load_or_default(&resolved);
        if std::env::var("RPADECK_BACKEND_URL").is_err() {
            assert_eq!(cfg.backend.base_url, "http://team.local:5000");
        }
        assert_eq!(cfg.monitor.health_interval_ms, 5_000);
    }

    #[test]
    fn test_default_config_path() {
        let resolved = resolve_config_path(None);
        assert!(resolved.ends_with("config.json"));
    }
}
