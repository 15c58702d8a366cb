//! Tool catalog
//!
//! The fixed set of operations this server exposes, each with a JSON
//! Schema for its arguments. Built once at startup and listed to clients
//! verbatim.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::ToolError;

/// Every operation in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    Status,
    DiffUnstaged,
    DiffStaged,
    Diff,
    Commit,
    Add,
    Reset,
    Log,
    CreateBranch,
    Checkout,
    Show,
    ApplyDiff,
    ReadFile,
    StageAll,
    SearchAndReplace,
    WriteToFile,
    ExecuteCommand,
}

impl ToolName {
    /// Catalog order
    pub const ALL: [ToolName; 17] = [
        ToolName::Status,
        ToolName::DiffUnstaged,
        ToolName::DiffStaged,
        ToolName::Diff,
        ToolName::Commit,
        ToolName::Add,
        ToolName::Reset,
        ToolName::Log,
        ToolName::CreateBranch,
        ToolName::Checkout,
        ToolName::Show,
        ToolName::ApplyDiff,
        ToolName::ReadFile,
        ToolName::StageAll,
        ToolName::SearchAndReplace,
        ToolName::WriteToFile,
        ToolName::ExecuteCommand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::Status => "git_status",
            ToolName::DiffUnstaged => "git_diff_unstaged",
            ToolName::DiffStaged => "git_diff_staged",
            ToolName::Diff => "git_diff",
            ToolName::Commit => "git_commit",
            ToolName::Add => "git_add",
            ToolName::Reset => "git_reset",
            ToolName::Log => "git_log",
            ToolName::CreateBranch => "git_create_branch",
            ToolName::Checkout => "git_checkout",
            ToolName::Show => "git_show",
            ToolName::ApplyDiff => "git_apply_diff",
            ToolName::ReadFile => "git_read_file",
            ToolName::StageAll => "git_stage_all",
            ToolName::SearchAndReplace => "search_and_replace",
            ToolName::WriteToFile => "write_to_file",
            ToolName::ExecuteCommand => "execute_command",
        }
    }

    /// Whether the output may contain markup and must be CDATA-wrapped
    pub fn wraps_cdata(&self) -> bool {
        matches!(
            self,
            ToolName::ApplyDiff
                | ToolName::ReadFile
                | ToolName::SearchAndReplace
                | ToolName::WriteToFile
        )
    }

    fn description(&self) -> &'static str {
        match self {
            ToolName::Status => "Shows the working tree status",
            ToolName::DiffUnstaged => "Shows changes in the working directory that are not yet staged",
            ToolName::DiffStaged => "Shows changes that are staged for commit",
            ToolName::Diff => "Shows differences between the working tree and a branch, commit or tree",
            ToolName::Commit => "Records the staged changes to the repository",
            ToolName::Add => "Adds file contents to the staging area",
            ToolName::Reset => "Unstages all staged changes, leaving the working tree untouched",
            ToolName::Log => "Shows the commit logs, most recent first",
            ToolName::CreateBranch => "Creates a new branch from the current or an explicit base branch",
            ToolName::Checkout => "Switches branches",
            ToolName::Show => "Shows the metadata and diff of a commit",
            ToolName::ApplyDiff => "Applies a unified diff to the working tree",
            ToolName::ReadFile => "Reads a file from the working tree",
            ToolName::StageAll => "Stages every new, modified and deleted file",
            ToolName::SearchAndReplace => {
                "Replaces a literal string or regex pattern in a file, optionally within a line range"
            }
            ToolName::WriteToFile => "Writes content to a file, creating it and its directories if needed",
            ToolName::ExecuteCommand => "Runs a shell command in the repository root",
        }
    }

    fn fields(&self) -> Vec<Field> {
        let repo_path = Field::required("repo_path", Kind::String, "Path to the git repository");

        let extra = match self {
            ToolName::Status
            | ToolName::DiffUnstaged
            | ToolName::DiffStaged
            | ToolName::Reset
            | ToolName::StageAll => vec![],
            ToolName::Diff => vec![Field::required(
                "target",
                Kind::String,
                "Branch, commit or tree to compare against",
            )],
            ToolName::Commit => vec![Field::required("message", Kind::String, "Commit message")],
            ToolName::Add => vec![Field::required(
                "files",
                Kind::StringArray,
                "Paths to stage",
            )],
            ToolName::Log => vec![
                Field::optional("max_count", Kind::Integer, "Maximum number of commits")
                    .with_default(json!(crate::git::DEFAULT_LOG_COUNT)),
            ],
            ToolName::CreateBranch => vec![
                Field::required("branch_name", Kind::String, "Name of the new branch"),
                Field::optional(
                    "base_branch",
                    Kind::String,
                    "Branch to start from; defaults to the current branch",
                ),
            ],
            ToolName::Checkout => vec![Field::required(
                "branch_name",
                Kind::String,
                "Branch to switch to",
            )],
            ToolName::Show => vec![Field::required(
                "revision",
                Kind::String,
                "Commit, branch or tag to show",
            )],
            ToolName::ApplyDiff => vec![Field::required(
                "diff_content",
                Kind::String,
                "Unified diff to apply",
            )],
            ToolName::ReadFile => vec![Field::required(
                "file_path",
                Kind::String,
                "Path relative to the repository root",
            )],
            ToolName::SearchAndReplace => vec![
                Field::required("file_path", Kind::String, "Path relative to the repository root"),
                Field::required("search_string", Kind::String, "Literal text or regex to find"),
                Field::required("replace_string", Kind::String, "Replacement text"),
                Field::optional("ignore_case", Kind::Boolean, "Match case-insensitively")
                    .with_default(json!(false)),
                Field::optional("start_line", Kind::Integer, "First line to edit (1-indexed)"),
                Field::optional("end_line", Kind::Integer, "Last line to edit (inclusive)"),
            ],
            ToolName::WriteToFile => vec![
                Field::required("file_path", Kind::String, "Path relative to the repository root"),
                Field::required("content", Kind::String, "Full new file content"),
            ],
            ToolName::ExecuteCommand => vec![Field::required(
                "command",
                Kind::String,
                "Shell command line",
            )],
        };

        std::iter::once(repo_path).chain(extra).collect()
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Integer,
    Boolean,
    StringArray,
}

impl Kind {
    fn schema(&self) -> Value {
        match self {
            Kind::String => json!({ "type": "string" }),
            Kind::Integer => json!({ "type": "integer", "minimum": 0 }),
            Kind::Boolean => json!({ "type": "boolean" }),
            Kind::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }
}

#[derive(Debug, Clone)]
struct Field {
    name: &'static str,
    kind: Kind,
    description: &'static str,
    required: bool,
    default: Option<Value>,
}

impl Field {
    fn required(name: &'static str, kind: Kind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
            default: None,
        }
    }

    fn optional(name: &'static str, kind: Kind, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

fn input_schema(fields: &[Field], strict: bool) -> Value {
    let mut properties = Map::new();
    for field in fields {
        let mut schema = field.kind.schema();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("description".into(), json!(field.description));
            if let Some(default) = &field.default {
                obj.insert("default".into(), default.clone());
            }
        }
        properties.insert(field.name.to_string(), schema);
    }

    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": !strict,
    })
}

/// One catalog entry, serialized as an MCP tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Fixed at build time from [`ToolName::wraps_cdata`]
    #[serde(skip)]
    pub wrap_cdata: bool,
    #[serde(skip)]
    pub tool: ToolName,
}

impl ToolDescriptor {
    /// Names of the arguments this tool declares
    pub fn argument_names(&self) -> Vec<&str> {
        self.input_schema["properties"]
            .as_object()
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// The immutable operation catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    descriptors: Vec<ToolDescriptor>,
    strict: bool,
}

impl Catalog {
    /// Build every descriptor; `strict` rejects unknown argument keys
    pub fn build(strict: bool) -> Self {
        let descriptors = ToolName::ALL
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.as_str().to_string(),
                description: tool.description().to_string(),
                input_schema: input_schema(&tool.fields(), strict),
                wrap_cdata: tool.wraps_cdata(),
                tool,
            })
            .collect();

        Self {
            descriptors,
            strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Descriptor for `name`, or `ToolError::UnknownTool`
    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        self.descriptors
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}
