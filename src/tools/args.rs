//! Typed tool arguments
//!
//! The untyped argument bag is decoded into one strongly-typed variant
//! per tool; a decode failure is the caller's fault and becomes a
//! `ToolError`.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::ToolName;
use crate::edit::ReplaceSpec;
use crate::error::ToolError;
use crate::git::DEFAULT_LOG_COUNT;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiffArgs {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitArgs {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddArgs {
    pub files: Vec<String>,
}

fn default_log_count() -> usize {
    DEFAULT_LOG_COUNT
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogArgs {
    #[serde(default = "default_log_count")]
    pub max_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateBranchArgs {
    pub branch_name: String,
    #[serde(default)]
    pub base_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutArgs {
    pub branch_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShowArgs {
    pub revision: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplyDiffArgs {
    pub diff_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadFileArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchAndReplaceArgs {
    pub file_path: String,
    pub search_string: String,
    pub replace_string: String,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
}

impl SearchAndReplaceArgs {
    pub fn spec(&self) -> ReplaceSpec {
        ReplaceSpec {
            search: self.search_string.clone(),
            replace: self.replace_string.clone(),
            ignore_case: self.ignore_case,
            start_line: self.start_line,
            end_line: self.end_line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WriteToFileArgs {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecuteCommandArgs {
    pub command: String,
}

/// A fully decoded call; `repo_path` is resolved separately
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Status,
    DiffUnstaged,
    DiffStaged,
    Diff(DiffArgs),
    Commit(CommitArgs),
    Add(AddArgs),
    Reset,
    Log(LogArgs),
    CreateBranch(CreateBranchArgs),
    Checkout(CheckoutArgs),
    Show(ShowArgs),
    ApplyDiff(ApplyDiffArgs),
    ReadFile(ReadFileArgs),
    StageAll,
    SearchAndReplace(SearchAndReplaceArgs),
    WriteToFile(WriteToFileArgs),
    ExecuteCommand(ExecuteCommandArgs),
}

impl ToolCall {
    /// Decode the argument bag for `tool`
    pub fn decode(tool: ToolName, args: &Map<String, Value>) -> Result<Self, ToolError> {
        Ok(match tool {
            ToolName::Status => ToolCall::Status,
            ToolName::DiffUnstaged => ToolCall::DiffUnstaged,
            ToolName::DiffStaged => ToolCall::DiffStaged,
            ToolName::Diff => ToolCall::Diff(decode(tool, args)?),
            ToolName::Commit => ToolCall::Commit(decode(tool, args)?),
            ToolName::Add => ToolCall::Add(decode(tool, args)?),
            ToolName::Reset => ToolCall::Reset,
            ToolName::Log => ToolCall::Log(decode(tool, args)?),
            ToolName::CreateBranch => ToolCall::CreateBranch(decode(tool, args)?),
            ToolName::Checkout => ToolCall::Checkout(decode(tool, args)?),
            ToolName::Show => ToolCall::Show(decode(tool, args)?),
            ToolName::ApplyDiff => ToolCall::ApplyDiff(decode(tool, args)?),
            ToolName::ReadFile => ToolCall::ReadFile(decode(tool, args)?),
            ToolName::StageAll => ToolCall::StageAll,
            ToolName::SearchAndReplace => ToolCall::SearchAndReplace(decode(tool, args)?),
            ToolName::WriteToFile => ToolCall::WriteToFile(decode(tool, args)?),
            ToolName::ExecuteCommand => ToolCall::ExecuteCommand(decode(tool, args)?),
        })
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, args: &Map<String, Value>) -> Result<T, ToolError> {
    // Explicit nulls mean "not given"
    let args: Map<String, Value> = args
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    serde_json::from_value(Value::Object(args)).map_err(|e| {
        let message = e.to_string();
        match missing_field(&message) {
            Some(argument) => ToolError::MissingArgument {
                tool: tool.to_string(),
                argument,
            },
            None => ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason: message,
            },
        }
    })
}

/// Extract `x` from serde's "missing field `x`" message
fn missing_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}
