// RpaDeck — Template importer and built-in templates

use super::parser::{parse_template, parse_template_str, template_files};
use super::Workflow;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

/// Built-in templates, embedded at compile time: (file name, YAML source).
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "login-and-capture.yaml",
        include_str!("../../templates/login-and-capture.yaml"),
    ),
    (
        "contact-form.yaml",
        include_str!("../../templates/contact-form.yaml"),
    ),
];

/// Parse every built-in template, substituting `vars` into placeholders.
pub fn builtin_templates(vars: &HashMap<String, String>) -> anyhow::Result<Vec<Workflow>> {
    BUILTIN_TEMPLATES
        .iter()
        .map(|(name, source)| {
            parse_template_str(source, vars)
                .map_err(|e| anyhow::anyhow!("built-in template {}: {}", name, e))
        })
        .collect()
}

/// Built-in templates followed by every template file in `dir`. Files that
/// fail to parse are skipped with a warning.
pub fn available_templates(
    dir: &Path,
    vars: &HashMap<String, String>,
) -> anyhow::Result<Vec<Workflow>> {
    let mut templates = builtin_templates(vars)?;
    for path in template_files(dir)? {
        match parse_template(&path, vars) {
            Ok(tpl) => templates.push(tpl),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable template")
            }
        }
    }
    Ok(templates)
}

/// Resolve a template by id, by id without the `template-` prefix, or by
/// case-insensitive name.
pub fn find_template<'a>(templates: &'a [Workflow], name: &str) -> Option<&'a Workflow> {
    let name = name.trim();
    templates.iter().find(|t| {
        t.id == name
            || t.id.strip_prefix("template-") == Some(name)
            || t.name.eq_ignore_ascii_case(name)
    })
}

/// Clones templates into fresh workflows.
///
/// Ids are derived from a millisecond stamp that is forced to increase on
/// every call, so two instantiations in the same millisecond still get
/// disjoint ids.
#[derive(Debug, Default)]
pub struct TemplateImporter {
    last_stamp: AtomicI64,
}

impl TemplateImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instantiate(&self, template: &Workflow) -> Workflow {
        let stamp = self.next_stamp();
        let now = Utc::now();

        let mut workflow = template.clone();
        workflow.id = format!("workflow-{}", stamp);
        workflow.created_at = now;
        workflow.updated_at = now;
        for (index, step) in workflow.steps.iter_mut().enumerate() {
            step.id = format!("step-{}-{}", stamp, index);
            step.order = index as u32 + 1;
        }
        workflow
    }

    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last_stamp.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}
