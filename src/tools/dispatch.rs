//! Tool dispatcher
//!
//! The single entry point between the transport and the handlers:
//! validates the argument bag, opens the working tree, decodes typed
//! arguments, runs the handler and wraps its text into content blocks.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::{Catalog, ToolCall, ToolDescriptor};
use crate::config::{Config, ConfigSources, ProjectConfig};
use crate::edit::{FileEditor, ReplacePipeline, ReplaceStrategy, TypeChecker};
use crate::error::{Result, ToolError};
use crate::git::WorkingTree;
use crate::process::ProcessRunner;

/// One block of a tool response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Content::Text { text } => text,
        }
    }
}

/// Wrap `text` so downstream parsers treat it as literal data
///
/// An embedded `]]>` is split across two sections.
pub fn wrap_cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// Shared dispatch context, built once at startup
#[derive(Debug, Clone)]
pub struct Dispatcher {
    catalog: Arc<Catalog>,
    runner: ProcessRunner,
    typecheck_runner: ProcessRunner,
    typecheck_enabled: bool,
    pipeline: ReplacePipeline,
    project_config_file: Option<PathBuf>,
    project_env_file: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        let runner = ProcessRunner::with_max_concurrent(config.max_concurrent_processes)
            .with_timeout(config.command_timeout());
        let typecheck_runner = runner.clone().with_timeout(config.typecheck_timeout());
        let pipeline = if config.sed_enabled {
            ReplacePipeline::with_sed(runner.clone())
        } else {
            ReplacePipeline::in_process()
        };

        Self {
            catalog: Arc::new(Catalog::build(config.strict_arguments)),
            runner,
            typecheck_runner,
            typecheck_enabled: config.typecheck_enabled,
            pipeline,
            project_config_file: config.project_config_file.clone(),
            project_env_file: config.project_env_file.clone(),
        }
    }

    /// Swap the primary search-and-replace strategy (`None` disables it)
    pub fn with_primary_replace_strategy(
        mut self,
        primary: Option<Arc<dyn ReplaceStrategy>>,
    ) -> Self {
        self.pipeline = self.pipeline.with_primary(primary);
        self
    }

    /// The operation catalog, in listing order
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        self.catalog.descriptors()
    }

    /// Run tool `name` with the given argument bag
    ///
    /// Tool-level failures come back as text; only protocol errors (unknown
    /// tool, bad arguments, unusable repository) are `Err`.
    #[instrument(skip(self, arguments), fields(tool = %name))]
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Vec<Content>> {
        let descriptor = self.catalog.lookup(name)?;
        let tool = descriptor.tool;

        let args = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(ToolError::InvalidArguments {
                    tool: name.to_string(),
                    reason: "arguments must be an object".to_string(),
                }
                .into());
            }
        };

        let repo_path = match args.get("repo_path") {
            Some(Value::String(path)) if !path.is_empty() => PathBuf::from(path),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(ToolError::MissingArgument {
                    tool: name.to_string(),
                    argument: "repo_path".to_string(),
                }
                .into());
            }
            Some(_) => {
                return Err(ToolError::InvalidArguments {
                    tool: name.to_string(),
                    reason: "repo_path must be a string".to_string(),
                }
                .into());
            }
        };

        if self.catalog.is_strict() {
            let known = descriptor.argument_names();
            if let Some(key) = args.keys().find(|key| !known.contains(&key.as_str())) {
                return Err(ToolError::InvalidArguments {
                    tool: name.to_string(),
                    reason: format!("unknown argument '{}'", key),
                }
                .into());
            }
        }

        let tree = WorkingTree::open(&repo_path, self.runner.clone())?;
        let call = ToolCall::decode(tool, &args)?;

        let sources = ConfigSources::discover(
            tree.root(),
            self.project_config_file.as_deref(),
            self.project_env_file.as_deref(),
        );
        let project = ProjectConfig::load(&sources);

        info!("Running {} in {}", name, tree.root().display());
        let text = self.execute(&tree, call, &project).await;
        debug!("{} produced {} bytes", name, text.len());

        let text = if descriptor.wrap_cdata {
            wrap_cdata(&text)
        } else {
            text
        };
        Ok(vec![Content::text(text)])
    }

    async fn execute(&self, tree: &WorkingTree, call: ToolCall, project: &ProjectConfig) -> String {
        let typecheck = TypeChecker::new(self.typecheck_runner.clone())
            .with_enabled(self.typecheck_enabled && project.get_bool("typecheck").unwrap_or(true))
            .with_env(project.env.clone());
        let pipeline = if project.get_bool("sed") == Some(false) {
            ReplacePipeline::in_process()
        } else {
            self.pipeline.clone()
        };
        let editor = FileEditor::new(tree, &typecheck, &pipeline);

        match call {
            ToolCall::Status => format!("Repository status:\n{}", tree.status().await),
            ToolCall::DiffUnstaged => format!("Unstaged changes:\n{}", tree.diff_unstaged().await),
            ToolCall::DiffStaged => format!("Staged changes:\n{}", tree.diff_staged().await),
            ToolCall::Diff(args) => format!(
                "Diff with {}:\n{}",
                args.target,
                tree.diff_target(&args.target).await
            ),
            ToolCall::Commit(args) => tree.commit(&args.message).await,
            ToolCall::Add(args) => tree.add(&args.files).await,
            ToolCall::Reset => tree.reset().await,
            ToolCall::Log(args) => match tree.log(args.max_count).await {
                Ok(entries) => {
                    let entries: Vec<String> = entries.iter().map(ToString::to_string).collect();
                    format!("Commit history:\n{}", entries.join("\n"))
                }
                Err(e) => e,
            },
            ToolCall::CreateBranch(args) => {
                tree.create_branch(&args.branch_name, args.base_branch.as_deref())
                    .await
            }
            ToolCall::Checkout(args) => tree.checkout(&args.branch_name).await,
            ToolCall::Show(args) => tree.show(&args.revision).await,
            ToolCall::ApplyDiff(args) => editor.apply_patch(&args.diff_content).await,
            ToolCall::ReadFile(args) => editor.read_file(&args.file_path).await,
            ToolCall::StageAll => tree.stage_all().await,
            ToolCall::SearchAndReplace(args) => {
                editor.search_and_replace(&args.file_path, &args.spec()).await
            }
            ToolCall::WriteToFile(args) => editor.write_file(&args.file_path, &args.content).await,
            ToolCall::ExecuteCommand(args) => {
                match tree
                    .runner()
                    .run_shell(&args.command, tree.root(), &project.env)
                    .await
                {
                    Ok(output) => output.to_report(),
                    Err(e) => format!("Error executing command: {}", e),
                }
            }
        }
    }
}
