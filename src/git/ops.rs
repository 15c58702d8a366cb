//! Repository operations
//!
//! Every operation returns plain text. Failures the git CLI reports
//! (unknown branch, nothing to commit, ...) come back as error text rather
//! than `Err`, so the dispatcher only ever sees protocol-level errors.
//!
//! gitoxide answers the read-only questions (does this branch exist, what
//! commit does this revision name); the git CLI produces status/diff/log
//! text and performs every mutation.

use std::fmt;

use chrono::DateTime;
use tracing::{info, instrument};

use super::WorkingTree;

/// `git log` format: sha, author, ISO date, raw body; unit/record separated
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%aI%x1f%B%x1e";

/// Default number of log entries
pub const DEFAULT_LOG_COUNT: usize = 10;

/// One commit as reported by `git_log` and `git_show`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    pub author: String,
    pub date: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Commit: {}", self.id)?;
        writeln!(f, "Author: {}", self.author)?;
        writeln!(f, "Date: {}", self.date)?;
        writeln!(f, "Message: {}", self.message)
    }
}

/// Parse output produced with [`LOG_FORMAT`]
pub fn parse_log(output: &str) -> Vec<LogEntry> {
    output
        .split('\x1e')
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(4, '\x1f');
            let id = fields.next()?.to_string();
            let author = fields.next()?.to_string();
            let date = format_date(fields.next()?);
            let message = fields.next().unwrap_or_default().trim_end().to_string();
            Some(LogEntry {
                id,
                author,
                date,
                message,
            })
        })
        .collect()
}

/// Render git's strict ISO date as `2024-01-31 12:00:00 +0100`
fn format_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|date| date.format("%Y-%m-%d %H:%M:%S %z").to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}

fn flatten(result: Result<String, String>) -> String {
    result.unwrap_or_else(|error| error)
}

impl WorkingTree {
    /// `git status`
    #[instrument(skip(self))]
    pub async fn status(&self) -> String {
        flatten(self.git_text(&["status"]).await)
    }

    /// Working tree against the index
    #[instrument(skip(self))]
    pub async fn diff_unstaged(&self) -> String {
        flatten(self.git_text(&["diff"]).await)
    }

    /// Index against HEAD
    #[instrument(skip(self))]
    pub async fn diff_staged(&self) -> String {
        flatten(self.git_text(&["diff", "--cached"]).await)
    }

    /// Working tree against an arbitrary branch, commit or tree
    #[instrument(skip(self))]
    pub async fn diff_target(&self, target: &str) -> String {
        if target.starts_with('-') {
            return format!("Error: invalid diff target '{}'", target);
        }
        flatten(self.git_text(&["diff", target, "--"]).await)
    }

    /// Commit exactly what is in the index
    #[instrument(skip(self, message))]
    pub async fn commit(&self, message: &str) -> String {
        match self.git(&["commit", "--quiet", "-m", message], None).await {
            Ok(output) if output.success() => {}
            Ok(output) => return format!("Error committing changes: {}", output.failure_text()),
            Err(e) => return format!("Error committing changes: {}", e),
        }

        match self.git_text(&["rev-parse", "HEAD"]).await {
            Ok(sha) => {
                let sha = sha.trim();
                info!("Created commit {}", sha);
                format!("Changes committed successfully with hash {}", sha)
            }
            Err(e) => format!("Changes committed, but the new hash is unknown: {}", e),
        }
    }

    /// Stage specific paths
    #[instrument(skip(self))]
    pub async fn add(&self, files: &[String]) -> String {
        if files.is_empty() {
            return "Error staging files: no files given".to_string();
        }

        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));

        match self.git(&args, None).await {
            Ok(output) if output.success() => "Files staged successfully".to_string(),
            Ok(output) => format!("Error staging files: {}", output.failure_text()),
            Err(e) => format!("Error staging files: {}", e),
        }
    }

    /// Unstage everything, leaving the working tree untouched
    #[instrument(skip(self))]
    pub async fn reset(&self) -> String {
        match self.git(&["reset", "--quiet"], None).await {
            Ok(output) if output.success() => "All staged changes reset".to_string(),
            Ok(output) => format!("Error resetting index: {}", output.failure_text()),
            Err(e) => format!("Error resetting index: {}", e),
        }
    }

    /// Most recent commits first
    #[instrument(skip(self))]
    pub async fn log(&self, max_count: usize) -> Result<Vec<LogEntry>, String> {
        let count = max_count.to_string();
        match self.git(&["log", "-n", &count, LOG_FORMAT], None).await {
            Ok(output) if output.success() => Ok(parse_log(&output.stdout)),
            Ok(output) => Err(format!(
                "Error reading commit history: {}",
                output.failure_text()
            )),
            Err(e) => Err(format!("Error reading commit history: {}", e)),
        }
    }

    /// Create a branch from `base`, or from the current branch
    #[instrument(skip(self))]
    pub async fn create_branch(&self, branch_name: &str, base: Option<&str>) -> String {
        if branch_name.is_empty() || branch_name.starts_with('-') {
            return format!("Error creating branch: invalid branch name '{}'", branch_name);
        }

        let resolved = self.backend().and_then(|backend| {
            let base = match base {
                Some(base) => base.to_string(),
                None => backend.current_branch()?,
            };
            let commit = backend.resolve_commit(&base)?;
            Ok((base, commit))
        });

        let base = match resolved {
            Ok((base, Some(_))) => base,
            Ok((base, None)) => return format!("Error: base '{}' not found", base),
            Err(e) => return format!("Error creating branch: {}", e),
        };

        match self.git(&["branch", branch_name, &base], None).await {
            Ok(output) if output.success() => {
                info!("Created branch {} from {}", branch_name, base);
                format!("Created branch '{}' from '{}'", branch_name, base)
            }
            Ok(output) => format!("Error creating branch: {}", output.failure_text()),
            Err(e) => format!("Error creating branch: {}", e),
        }
    }

    /// Switch the current branch
    #[instrument(skip(self))]
    pub async fn checkout(&self, branch_name: &str) -> String {
        let exists = self
            .backend()
            .and_then(|backend| backend.branch_exists(branch_name));

        match exists {
            Ok(true) => {}
            Ok(false) => return format!("Error: branch '{}' not found", branch_name),
            Err(e) => return format!("Error checking out branch: {}", e),
        }

        match self.git(&["checkout", "--quiet", branch_name, "--"], None).await {
            Ok(output) if output.success() => format!("Switched to branch '{}'", branch_name),
            Ok(output) => format!("Error checking out branch: {}", output.failure_text()),
            Err(e) => format!("Error checking out branch: {}", e),
        }
    }

    /// Commit metadata plus its diff against the first parent
    ///
    /// Root commits are diffed against the empty tree.
    #[instrument(skip(self))]
    pub async fn show(&self, revision: &str) -> String {
        let resolved = self
            .backend()
            .and_then(|backend| backend.resolve_commit(revision));

        let sha = match resolved {
            Ok(Some(sha)) => sha,
            Ok(None) => return format!("Error: revision '{}' not found", revision),
            Err(e) => return format!("Error showing revision: {}", e),
        };

        let entry = match self.git_text(&["log", "-1", LOG_FORMAT, &sha]).await {
            Ok(out) => match parse_log(&out).into_iter().next() {
                Some(entry) => entry,
                None => return format!("Error showing revision: no commit data for {}", sha),
            },
            Err(e) => return e,
        };

        let parent = format!("{}^1", sha);
        let base = match self
            .git(&["rev-parse", "--verify", "--quiet", &parent], None)
            .await
        {
            Ok(output) if output.success() => output.stdout.trim().to_string(),
            Ok(_) => match self.empty_tree().await {
                Ok(tree) => tree,
                Err(e) => return e,
            },
            Err(e) => return format!("Error showing revision: {}", e),
        };

        match self.git_text(&["diff", &base, &sha]).await {
            Ok(diff) => format!("{}\n{}", entry, diff),
            Err(e) => e,
        }
    }

    /// Stage every untracked, modified and deleted path
    #[instrument(skip(self))]
    pub async fn stage_all(&self) -> String {
        match self.git(&["add", "--all"], None).await {
            Ok(output) if output.success() => "All files staged successfully.".to_string(),
            Ok(output) => format!("Error staging all files: {}", output.failure_text()),
            Err(e) => format!("Error staging all files: {}", e),
        }
    }

    /// Id of the empty tree in this repository's hash format
    async fn empty_tree(&self) -> Result<String, String> {
        match self.git(&["hash-object", "-t", "tree", "--stdin"], Some("")).await {
            Ok(output) if output.success() => Ok(output.stdout.trim().to_string()),
            Ok(output) => Err(format!("Error showing revision: {}", output.failure_text())),
            Err(e) => Err(format!("Error showing revision: {}", e)),
        }
    }
}
