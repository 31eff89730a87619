//! Manifest script registration
//!
//! Turns manifest scripts into tools: one tool per script, identifiers
//! sanitized and made unique in manifest order. Each tool's handler runs the
//! script's original name, never the identifier.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::ident::{resolve_unique, sanitize};
use crate::manifest::CommandEntry;
use crate::protocol::ToolsCallResponse;
use crate::runner::ScriptRunner;
use crate::tools::{parse_arguments, OperationRegistry, RegisteredTool, ToolCallError, ToolHandler};

/// Outcome of one registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// `(identifier, script name)` for every tool added.
    pub registered: Vec<(String, String)>,
    /// Identifiers that were already taken in the registry at insert time.
    pub skipped: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScriptArguments {
    #[serde(default)]
    args: Option<Vec<String>>,
}

/// Handler bound to one manifest script.
pub struct ScriptTool {
    runner: Arc<ScriptRunner>,
    working_dir: PathBuf,
    script: String,
}

impl ScriptTool {
    pub fn new(runner: Arc<ScriptRunner>, working_dir: PathBuf, script: impl Into<String>) -> Self {
        Self {
            runner,
            working_dir,
            script: script.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for ScriptTool {
    async fn call(&self, arguments: Value) -> Result<ToolsCallResponse, ToolCallError> {
        let parsed: ScriptArguments = parse_arguments(arguments)?;
        let args = parsed.args.unwrap_or_default();
        Ok(self.runner.run(&self.working_dir, &self.script, &args).await)
    }
}

pub fn script_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "args": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Extra arguments passed to the script after `--`"
            }
        }
    })
}

pub fn describe(identifier: &str, entry: &CommandEntry) -> String {
    if identifier == entry.name {
        format!("script: {}", entry.command)
    } else {
        format!("script ({}): {}", entry.name, entry.command)
    }
}

/// Register one tool per entry, in order.
///
/// An identifier that turns out to be taken at insert time is skipped but stays
/// reserved for the rest of the pass.
pub async fn register_scripts<R>(
    entries: &[CommandEntry],
    working_dir: &Path,
    runner: &Arc<ScriptRunner>,
    registry: &R,
) -> RegistrationReport
where
    R: OperationRegistry + ?Sized,
{
    let mut used: HashSet<String> = HashSet::new();
    let mut report = RegistrationReport::default();

    for entry in entries {
        let base = sanitize(&entry.name);
        let existing = registry.existing_identifiers().await;
        let identifier = resolve_unique(&base, &used, &existing);
        used.insert(identifier.clone());

        let tool = RegisteredTool {
            name: identifier.clone(),
            description: describe(&identifier, entry),
            input_schema: script_input_schema(),
            handler: Arc::new(ScriptTool::new(
                Arc::clone(runner),
                working_dir.to_path_buf(),
                entry.name.clone(),
            )),
        };

        if registry.insert_if_absent(tool).await {
            debug!(tool = %identifier, script = %entry.name, "Registered script tool");
            report.registered.push((identifier, entry.name.clone()));
        } else {
            debug!(tool = %identifier, script = %entry.name, "Tool name already registered, skipping script");
            report.skipped.push(identifier);
        }
    }

    report
}
