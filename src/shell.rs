// RpaDeck — Interactive workflow editor shell
// License: Apache-2.0

use crate::metrics::Metrics;
use crate::monitor::SessionMonitor;
use crate::workbench::Workbench;
use crate::workflow::{
    available_templates, find_template, ExecutionResult, StepPatch, StepType, Workflow,
    WorkflowPatch,
};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

const PROMPT: &str = "rpadeck> ";

const HELP: &str = "\
Commands:
  list                   List workflows
  new <name>             Create a workflow and open it
  open <id|n>            Open a workflow by id or list position
  rename <name>          Rename the open workflow
  describe <text>        Set the open workflow's description
  delete                 Delete the open workflow
  steps                  Show the open workflow's steps
  add <type>             Append a step (navigate, click, type, wait, screenshot)
  set <n> key=value      Set a step field (url, xpath, text, duration, title, description)
  rm <n>                 Remove step n
  mv <from> <to>         Move step from one position to another
  run [n]                Run step n, or the whole workflow
  results                Show execution results
  templates              List templates
  import <name> [k=v..]  Import a template with placeholder values
  session                Show the remote browser session
  reset                  Reset the remote browser
  metrics                Show run and probe metrics
  save                   Save workflows
  help                   Show this help
  exit                   Quit";

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    List,
    New(String),
    Open(String),
    Rename(String),
    Describe(String),
    Delete,
    Steps,
    Add(StepType),
    Set {
        position: usize,
        key: String,
        value: String,
    },
    Remove(usize),
    Move {
        from: usize,
        to: usize,
    },
    Run(Option<usize>),
    Results,
    Templates,
    Import {
        name: String,
        vars: HashMap<String, String>,
    },
    Session,
    Reset,
    Metrics,
    Save,
    Help,
    Exit,
}

impl ShellCommand {
    /// Commands after which the store is written back to disk.
    pub fn mutates_store(&self) -> bool {
        matches!(
            self,
            ShellCommand::New(_)
                | ShellCommand::Open(_)
                | ShellCommand::Rename(_)
                | ShellCommand::Describe(_)
                | ShellCommand::Delete
                | ShellCommand::Add(_)
                | ShellCommand::Set { .. }
                | ShellCommand::Remove(_)
                | ShellCommand::Move { .. }
                | ShellCommand::Import { .. }
        )
    }
}

fn position(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("expected a step position (1, 2, ...), got '{}'", arg)),
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(rest)
    }
}

/// Parse `key=value` pairs separated by whitespace.
pub fn parse_vars<'a>(
    pairs: impl IntoIterator<Item = &'a str>,
) -> Result<HashMap<String, String>, String> {
    pairs
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => Err(format!("expected key=value, got '{}'", pair)),
        })
        .collect()
}

pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => ShellCommand::List,
        "new" => ShellCommand::New(required(rest, "new <name>")?.to_string()),
        "open" => ShellCommand::Open(required(rest, "open <id|n>")?.to_string()),
        "rename" => ShellCommand::Rename(required(rest, "rename <name>")?.to_string()),
        "describe" => ShellCommand::Describe(rest.to_string()),
        "delete" => ShellCommand::Delete,
        "steps" => ShellCommand::Steps,
        "add" => ShellCommand::Add(required(rest, "add <type>")?.parse()?),
        "set" => {
            let usage = "set <n> key=value";
            let (n, assignment) = required(rest, usage)?
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("usage: {}", usage))?;
            let (key, value) = assignment
                .trim()
                .split_once('=')
                .ok_or_else(|| format!("usage: {}", usage))?;
            ShellCommand::Set {
                position: position(n)?,
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }
        }
        "rm" => ShellCommand::Remove(position(required(rest, "rm <n>")?)?),
        "mv" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            match args.as_slice() {
                [from, to] => ShellCommand::Move {
                    from: position(from)?,
                    to: position(to)?,
                },
                _ => return Err("usage: mv <from> <to>".into()),
            }
        }
        "run" => ShellCommand::Run(if rest.is_empty() {
            None
        } else {
            Some(position(rest)?)
        }),
        "results" => ShellCommand::Results,
        "templates" => ShellCommand::Templates,
        "import" => {
            let mut args = rest.split_whitespace();
            let name = args
                .next()
                .ok_or_else(|| "usage: import <name> [key=value ...]".to_string())?;
            ShellCommand::Import {
                name: name.to_string(),
                vars: parse_vars(args)?,
            }
        }
        "session" | "status" => ShellCommand::Session,
        "reset" => ShellCommand::Reset,
        "metrics" => ShellCommand::Metrics,
        "save" => ShellCommand::Save,
        "help" | "?" => ShellCommand::Help,
        "exit" | "quit" => ShellCommand::Exit,
        other => return Err(format!("unknown command '{}' (try help)", other)),
    };
    Ok(cmd)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

pub fn format_workflow_list(workflows: &[Workflow], current: Option<&str>) -> String {
    if workflows.is_empty() {
        return "No workflows yet. Create one with `new <name>` or `import <template>`.".into();
    }
    let mut out = String::new();
    for (i, wf) in workflows.iter().enumerate() {
        let marker = if Some(wf.id.as_str()) == current { "*" } else { " " };
        let _ = writeln!(
            out,
            "{} {:>2}. {} ({} steps)  [{}]",
            marker,
            i + 1,
            wf.name,
            wf.steps.len(),
            wf.id
        );
    }
    out.trim_end().to_string()
}

pub fn format_steps(workflow: &Workflow) -> String {
    let mut out = format!("{}\n", workflow.name);
    if !workflow.description.is_empty() {
        let _ = writeln!(out, "  {}", workflow.description);
    }
    if workflow.steps.is_empty() {
        out.push_str("  (no steps)");
        return out;
    }
    for step in &workflow.steps {
        let _ = write!(out, "  {:>2}. [{}] {}", step.order, step.kind, step.title);
        let config = serde_json::to_string(&step.config).unwrap_or_default();
        if config != "{}" {
            let _ = write!(out, "  {}", config);
        }
        let missing = step.missing_fields();
        if !missing.is_empty() {
            let _ = write!(out, "  (missing: {})", missing.join(", "));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

pub fn format_results(results: &[ExecutionResult]) -> String {
    if results.is_empty() {
        return "No results.".into();
    }
    let mut out = String::new();
    for r in results {
        let mark = if r.succeeded() { "ok  " } else { "FAIL" };
        let _ = writeln!(out, "{} {}  {}  {}", mark, r.step_id, r.timestamp, r.result);
    }
    out.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

pub struct Shell {
    workbench: Workbench,
    monitor: Arc<SessionMonitor>,
    metrics: Metrics,
    store_path: PathBuf,
    templates_dir: PathBuf,
}

impl Shell {
    pub fn new(
        workbench: Workbench,
        monitor: Arc<SessionMonitor>,
        metrics: Metrics,
        store_path: PathBuf,
        templates_dir: PathBuf,
    ) -> Self {
        Self {
            workbench,
            monitor,
            metrics,
            store_path,
            templates_dir,
        }
    }

    pub fn workbench(&self) -> &Workbench {
        &self.workbench
    }

    fn open_workflow(&self) -> anyhow::Result<&Workflow> {
        self.workbench
            .store
            .current_workflow()
            .ok_or_else(|| anyhow::anyhow!("no workflow is open (use `open` or `new`)"))
    }

    fn step_id_at(&self, position: usize) -> anyhow::Result<(String, String)> {
        let wf = self.open_workflow()?;
        let step = wf
            .step_at(position)
            .ok_or_else(|| anyhow::anyhow!("no step {} (workflow has {})", position, wf.steps.len()))?;
        Ok((wf.id.clone(), step.id.clone()))
    }

    /// Execute one command. Returns the text to print, or `None` to quit.
    pub async fn execute(&mut self, cmd: ShellCommand) -> anyhow::Result<Option<String>> {
        let store = &mut self.workbench.store;
        let out = match cmd {
            ShellCommand::List => format_workflow_list(store.workflows(), store.current_id()),
            ShellCommand::New(name) => {
                let wf = store.create_workflow(name, "");
                store.load_workflow(&wf.id);
                format!("Created and opened '{}' [{}]", wf.name, wf.id)
            }
            ShellCommand::Open(target) => {
                let id = match target.parse::<usize>() {
                    Ok(n) => store
                        .workflows()
                        .get(n.wrapping_sub(1))
                        .map(|w| w.id.clone())
                        .unwrap_or(target),
                    Err(_) => target,
                };
                match store.load_workflow(&id) {
                    Some(wf) => format_steps(wf),
                    None => anyhow::bail!("no workflow '{}'", id),
                }
            }
            ShellCommand::Rename(name) => {
                let id = self.open_workflow()?.id.clone();
                self.workbench.store.update_workflow(
                    &id,
                    WorkflowPatch {
                        name: Some(name.clone()),
                        ..Default::default()
                    },
                )?;
                format!("Renamed to '{}'", name)
            }
            ShellCommand::Describe(text) => {
                let id = self.open_workflow()?.id.clone();
                self.workbench.store.update_workflow(
                    &id,
                    WorkflowPatch {
                        description: Some(text),
                        ..Default::default()
                    },
                )?;
                "Description updated".into()
            }
            ShellCommand::Delete => {
                let id = self.open_workflow()?.id.clone();
                let removed = self.workbench.store.delete_workflow(&id)?;
                format!("Deleted '{}'", removed.name)
            }
            ShellCommand::Steps => format_steps(self.open_workflow()?),
            ShellCommand::Add(kind) => {
                let step = self.workbench.add_step_of_kind(kind)?;
                let required = kind.required_fields();
                if required.is_empty() {
                    format!("Added step {} [{}]", step.order, kind)
                } else {
                    format!(
                        "Added step {} [{}]; set {} next",
                        step.order,
                        kind,
                        required.join(", ")
                    )
                }
            }
            ShellCommand::Set {
                position,
                key,
                value,
            } => {
                let (wf_id, step_id) = self.step_id_at(position)?;
                let mut patch = StepPatch::default();
                match key.as_str() {
                    "title" => patch.title = Some(value),
                    "description" => patch.description = Some(value),
                    _ => {
                        let mut config = self
                            .open_workflow()?
                            .step(&step_id)
                            .map(|s| s.config.clone())
                            .unwrap_or_default();
                        config.set(&key, &value).map_err(anyhow::Error::msg)?;
                        patch.config = Some(config);
                    }
                }
                self.workbench.store.update_step(&wf_id, &step_id, patch)?;
                format!("Step {} updated", position)
            }
            ShellCommand::Remove(position) => {
                let (wf_id, step_id) = self.step_id_at(position)?;
                let removed = self.workbench.store.delete_step(&wf_id, &step_id)?;
                format!("Removed '{}'", removed.title)
            }
            ShellCommand::Move { from, to } => {
                let id = self.open_workflow()?.id.clone();
                self.workbench.store.reorder_steps(&id, from - 1, to - 1)?;
                format_steps(self.open_workflow()?)
            }
            ShellCommand::Run(Some(position)) => {
                let (_, step_id) = self.step_id_at(position)?;
                let result = self.workbench.run_step(&step_id).await?;
                format_results(std::slice::from_ref(&result))
            }
            ShellCommand::Run(None) => {
                let results = self.workbench.run_workflow().await?;
                format_results(&results)
            }
            ShellCommand::Results => format_results(&self.workbench.dispatcher.results().await),
            ShellCommand::Templates => {
                let templates = available_templates(&self.templates_dir, &HashMap::new())?;
                let mut out = String::new();
                for tpl in &templates {
                    let _ = writeln!(out, "  {}  {} ({} steps)", tpl.id, tpl.name, tpl.steps.len());
                }
                out.trim_end().to_string()
            }
            ShellCommand::Import { name, vars } => {
                let templates = available_templates(&self.templates_dir, &vars)?;
                let tpl = find_template(&templates, &name)
                    .ok_or_else(|| anyhow::anyhow!("no template '{}' (see `templates`)", name))?;
                let wf = self.workbench.store.import_template(tpl);
                self.workbench.store.load_workflow(&wf.id);
                format!("Imported '{}' as [{}] and opened it", wf.name, wf.id)
            }
            ShellCommand::Session => {
                let state = self.monitor.snapshot();
                let mut out = format!("Session: {}", state.mode());
                if let Some(url) = &state.stream_url {
                    let _ = write!(out, "\n  Stream: {}", url);
                }
                if let Some(url) = &state.url {
                    let _ = write!(out, "\n  Page:   {}", url);
                }
                if let Some(shot) = &state.screenshot {
                    let _ = write!(out, "\n  Screenshot: {} bytes", shot.len());
                }
                out
            }
            ShellCommand::Reset => {
                self.workbench.reset_session(&self.monitor).await?;
                "Remote browser reset".into()
            }
            ShellCommand::Metrics => self.metrics.format_report().await,
            ShellCommand::Save => {
                self.workbench.store.save(&self.store_path).await?;
                format!("Saved to {}", self.store_path.display())
            }
            ShellCommand::Help => HELP.into(),
            ShellCommand::Exit => return Ok(None),
        };
        Ok(Some(out))
    }

    /// Readline loop. The store is saved after every mutating command.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("RpaDeck v{} — workflow editor", crate::VERSION);
        println!("Type 'help' for commands, 'exit' or Ctrl+D to quit.\n");

        let mut rl = rustyline::DefaultEditor::new()?;
        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let cmd = match parse_command(trimmed) {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            eprintln!("{}", e);
                            continue;
                        }
                    };
                    let mutates = cmd.mutates_store();

                    match self.execute(cmd).await {
                        Ok(Some(out)) => println!("{}\n", out),
                        Ok(None) => break,
                        Err(e) => {
                            eprintln!("Error: {}\n", e);
                            continue;
                        }
                    }

                    if mutates {
                        if let Err(e) = self.workbench.store.save(&self.store_path).await {
                            eprintln!("Failed to save workflows: {}\n", e);
                        }
                    }
                }
                Err(rustyline::error::ReadlineError::Eof) => break,
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    println!("Use 'exit' to quit or Ctrl+D to exit.");
                }
                Err(e) => {
                    eprintln!("Readline error: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::ScriptedBackend;
    use crate::dispatch::StepDispatcher;
    use crate::monitor::MonitorIntervals;
    use crate::workflow::WorkflowStore;

    fn shell(dir: &std::path::Path) -> Shell {
        let backend = ScriptedBackend::healthy();
        let metrics = Metrics::new();
        let workbench = Workbench::new(
            WorkflowStore::new(),
            StepDispatcher::new(backend.clone(), metrics.clone()),
        );
        let monitor = Arc::new(SessionMonitor::new(
            backend,
            MonitorIntervals::default(),
            metrics.clone(),
        ));
        Shell::new(
            workbench,
            monitor,
            metrics,
            dir.join("workflows.json"),
            dir.join("templates"),
        )
    }

    async fn exec(sh: &mut Shell, line: &str) -> String {
        sh.execute(parse_command(line).unwrap())
            .await
            .unwrap()
            .unwrap_or_default()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("new My Login").unwrap(), ShellCommand::New("My Login".into()));
        assert_eq!(parse_command("add Click").unwrap(), ShellCommand::Add(StepType::Click));
        assert_eq!(
            parse_command("set 2 text = hello world").unwrap(),
            ShellCommand::Set {
                position: 2,
                key: "text".into(),
                value: "hello world".into()
            }
        );
        assert_eq!(
            parse_command("set 1 xpath=//a[@href='/x']").unwrap(),
            ShellCommand::Set {
                position: 1,
                key: "xpath".into(),
                value: "//a[@href='/x']".into()
            }
        );
        assert_eq!(parse_command("mv 3 1").unwrap(), ShellCommand::Move { from: 3, to: 1 });
        assert_eq!(parse_command("run").unwrap(), ShellCommand::Run(None));
        assert_eq!(parse_command("run 2").unwrap(), ShellCommand::Run(Some(2)));

        match parse_command("import login email=a@example.com base_url=https://x.test").unwrap() {
            ShellCommand::Import { name, vars } => {
                assert_eq!(name, "login");
                assert_eq!(vars["base_url"], "https://x.test");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("add scroll").is_err());
        assert!(parse_command("rm 0").is_err());
        assert!(parse_command("mv 1").is_err());
        assert!(parse_command("set 1 url").is_err());
        assert!(parse_command("new").is_err());
        assert!(parse_command("import x notapair").is_err());
        assert!(parse_command("launch").is_err());
    }

    #[test]
    fn test_mutating_commands() {
        assert!(parse_command("add wait").unwrap().mutates_store());
        assert!(parse_command("mv 1 2").unwrap().mutates_store());
        assert!(!parse_command("run").unwrap().mutates_store());
        assert!(!parse_command("list").unwrap().mutates_store());
    }

    #[tokio::test]
    async fn test_edit_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(dir.path());

        exec(&mut sh, "new Checkout").await;
        exec(&mut sh, "add navigate").await;
        exec(&mut sh, "add click").await;
        exec(&mut sh, "add wait").await;
        exec(&mut sh, "set 1 url=https://shop.example.com").await;
        exec(&mut sh, "set 3 duration=2").await;
        exec(&mut sh, "set 2 title=Press Buy").await;
        exec(&mut sh, "mv 3 1").await;

        let wf = sh.workbench().store.current_workflow().unwrap().clone();
        let kinds: Vec<_> = wf.steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StepType::Wait, StepType::Navigate, StepType::Click]);
        assert_eq!(wf.steps[0].config.duration, Some(2.0));
        assert_eq!(wf.steps[2].title, "Press Buy");
        assert_eq!(wf.steps.iter().map(|s| s.order).collect::<Vec<_>>(), vec![1, 2, 3]);

        exec(&mut sh, "rm 1").await;
        let steps = exec(&mut sh, "steps").await;
        assert!(steps.contains("1. [navigate]"));
        assert!(steps.contains("(missing: xpath)"));

        let out = exec(&mut sh, "run").await;
        assert_eq!(out.lines().count(), 2);
        assert!(exec(&mut sh, "results").await.starts_with("ok"));

        exec(&mut sh, "save").await;
        let reloaded = WorkflowStore::load(&dir.path().join("workflows.json")).await.unwrap();
        assert_eq!(reloaded.current_workflow().unwrap().steps.len(), 2);
    }

    #[tokio::test]
    async fn test_import_and_open_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(dir.path());

        let out = exec(&mut sh, "import contact-form base_url=https://acme.example").await;
        assert!(out.starts_with("Imported"));
        exec(&mut sh, "new Scratch").await;
        exec(&mut sh, "open 1").await;

        let wf = sh.workbench().store.current_workflow().unwrap();
        assert!(wf.id.starts_with("workflow-"));
        assert_eq!(
            wf.steps[0].config.url.as_deref(),
            Some("https://acme.example/contact")
        );
        assert!(exec(&mut sh, "list").await.contains("* "));
    }

    #[tokio::test]
    async fn test_errors_without_open_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell(dir.path());
        assert!(sh.execute(ShellCommand::Steps).await.is_err());
        assert!(sh.execute(ShellCommand::Add(StepType::Click)).await.is_err());
        assert!(sh
            .execute(ShellCommand::Import {
                name: "nope".into(),
                vars: HashMap::new()
            })
            .await
            .is_err());
        assert_eq!(sh.execute(ShellCommand::Exit).await.unwrap(), None);
    }
}
