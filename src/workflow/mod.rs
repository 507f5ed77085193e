// RpaDeck — Workflow data model

pub mod parser;
pub mod store;
pub mod template;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use store::{StoreError, WorkflowStore};
pub use template::{available_templates, builtin_templates, find_template, TemplateImporter};

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Step at a 1-based position, as shown to users.
    pub fn step_at(&self, order: usize) -> Option<&Step> {
        order.checked_sub(1).and_then(|i| self.steps.get(i))
    }
}

/// Editable workflow fields. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkflowPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Navigate,
    Click,
    Type,
    Wait,
    Screenshot,
}

impl StepType {
    pub const ALL: [StepType; 5] = [
        StepType::Navigate,
        StepType::Click,
        StepType::Type,
        StepType::Wait,
        StepType::Screenshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Navigate => "navigate",
            StepType::Click => "click",
            StepType::Type => "type",
            StepType::Wait => "wait",
            StepType::Screenshot => "screenshot",
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            StepType::Navigate => "Navigate to URL",
            StepType::Click => "Click Element",
            StepType::Type => "Type Text",
            StepType::Wait => "Wait",
            StepType::Screenshot => "Take Screenshot",
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            StepType::Navigate => "Navigate to a specific URL",
            StepType::Click => "Click on an element using XPath",
            StepType::Type => "Type text into an input field using XPath",
            StepType::Wait => "Wait for a specified duration",
            StepType::Screenshot => "Capture a screenshot of the current page",
        }
    }

    /// Config keys the backend needs to run this step type.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            StepType::Navigate => &["url"],
            StepType::Click => &["xpath"],
            StepType::Type => &["xpath", "text"],
            StepType::Wait => &["duration"],
            StepType::Screenshot => &[],
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown step type '{}' (expected one of: navigate, click, type, wait, screenshot)",
                    s
                )
            })
    }
}

/// Type-dependent field bag. Known keys are typed; anything else the backend
/// may understand is carried through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl StepConfig {
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn click(xpath: impl Into<String>) -> Self {
        Self {
            xpath: Some(xpath.into()),
            ..Default::default()
        }
    }

    pub fn type_text(xpath: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            xpath: Some(xpath.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn wait(seconds: f64) -> Self {
        Self {
            duration: Some(seconds),
            ..Default::default()
        }
    }

    /// Set a single field from user input (`key=value` in the shell).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "url" => self.url = Some(value.to_string()),
            "xpath" => self.xpath = Some(value.to_string()),
            "text" => self.text = Some(value.to_string()),
            "duration" => {
                let secs: f64 = value
                    .parse()
                    .map_err(|_| format!("duration must be a number of seconds, got '{}'", value))?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(format!("duration must be non-negative, got {}", secs));
                }
                self.duration = Some(secs);
            }
            _ => {
                self.extra
                    .insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        match key {
            "url" => self.url.as_deref().is_some_and(|v| !v.is_empty()),
            "xpath" => self.xpath.as_deref().is_some_and(|v| !v.is_empty()),
            "text" => self.text.is_some(),
            "duration" => self.duration.is_some(),
            other => self.extra.contains_key(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: StepConfig,
    #[serde(default)]
    pub order: u32,
}

impl Step {
    /// Config keys this step still needs before the backend can run it.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.kind
            .required_fields()
            .iter()
            .copied()
            .filter(|f| !self.config.has(f))
            .collect()
    }
}

/// A step before the store assigns its id and position.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDraft {
    pub kind: StepType,
    pub title: String,
    pub description: String,
    pub config: StepConfig,
}

impl StepDraft {
    /// Draft with the per-type default title and description and an empty config.
    pub fn new(kind: StepType) -> Self {
        Self {
            kind,
            title: kind.default_title().to_string(),
            description: kind.default_description().to_string(),
            config: StepConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Editable step fields. Identity and position are owned by the store.
#[derive(Debug, Clone, Default)]
pub struct StepPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub config: Option<StepConfig>,
}

// ---------------------------------------------------------------------------
// Execution results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "stepId", alias = "step_id")]
    pub step_id: String,
    #[serde(default)]
    pub result: Value,
    /// ISO-8601, kept verbatim as reported.
    #[serde(default)]
    pub timestamp: String,
}

impl ExecutionResult {
    pub fn now(step_id: impl Into<String>, result: Value) -> Self {
        Self {
            step_id: step_id.into(),
            result,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// The backend reports step-level failures inside a 2xx body.
    pub fn succeeded(&self) -> bool {
        let flag = |v: &Value| v.get("success").and_then(|s| s.as_bool());
        self.result
            .get("result")
            .and_then(flag)
            .or_else(|| flag(&self.result))
            .unwrap_or(true)
    }
}
