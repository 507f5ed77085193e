use crate::workflow::{Step, Workflow};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex"))
}

/// Read a template file (YAML or JSON) and fill `{{ name }}` placeholders.
pub fn parse_template(path: &Path, args: &HashMap<String, String>) -> anyhow::Result<Workflow> {
    let content = std::fs::read_to_string(path)?;
    let mut workflow = parse_template_str(&content, args)?;

    if workflow.id.is_empty() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            workflow.id = format!("template-{}", stem);
        }
    }
    Ok(workflow)
}

pub fn parse_template_str(content: &str, args: &HashMap<String, String>) -> anyhow::Result<Workflow> {
    // YAML is a superset of JSON, so one parser covers both formats.
    let mut workflow: Workflow = serde_yaml::from_str(content)?;

    if workflow.id.is_empty() && !workflow.name.trim().is_empty() {
        workflow.id = format!("template-{}", slug(&workflow.name));
    }

    for (index, step) in workflow.steps.iter_mut().enumerate() {
        fill_defaults(step, index);
        substitute_step(step, args);
    }

    Ok(workflow)
}

/// List template files (`.yaml`, `.yml`, `.json`) in a directory, sorted.
pub fn template_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_template = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e, "yaml" | "yml" | "json"));
        if path.is_file() && is_template {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn fill_defaults(step: &mut Step, index: usize) {
    if step.title.is_empty() {
        step.title = step.kind.default_title().to_string();
    }
    if step.description.is_empty() {
        step.description = step.kind.default_description().to_string();
    }
    if step.id.is_empty() {
        step.id = format!("step-{}", index + 1);
    }
    step.order = index as u32 + 1;
}

fn substitute_step(step: &mut Step, args: &HashMap<String, String>) {
    step.title = substitute(&step.title, args);
    step.description = substitute(&step.description, args);

    let config = &mut step.config;
    for field in [&mut config.url, &mut config.xpath, &mut config.text]
        .into_iter()
        .flatten()
    {
        *field = substitute(field, args);
    }
    for value in config.extra.values_mut() {
        if let Value::String(s) = value {
            *s = substitute(s, args);
        }
    }
}

/// Unknown placeholders are left in place so a later import can fill them.
fn substitute(text: &str, args: &HashMap<String, String>) -> String {
    placeholder()
        .replace_all(text, |caps: &Captures| {
            args.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}
