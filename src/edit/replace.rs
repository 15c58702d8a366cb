//! Search and replace
//!
//! A search string with no regex metacharacters is treated literally;
//! anything else is compiled as a regex. The edit is computed by a
//! two-stage [`ReplacePipeline`]: an optional primary strategy (the
//! external `sed` stream editor) and the in-process `regex` fallback,
//! which produces the same bytes `sed` would for every request `sed` is
//! given.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::{NoExpand, Regex, RegexBuilder};
use tracing::{debug, info, instrument, warn};

use super::{FileEditor, atomic_write, render_diff};
use crate::process::ProcessRunner;

/// Characters that switch a search string into regex mode
pub const REGEX_METACHARACTERS: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

/// How the search string is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Literal,
    Regex,
}

impl SearchMode {
    pub fn detect(search: &str) -> Self {
        if search.contains(REGEX_METACHARACTERS) {
            SearchMode::Regex
        } else {
            SearchMode::Literal
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Literal => write!(f, "literal"),
            SearchMode::Regex => write!(f, "regex"),
        }
    }
}

/// Inclusive, 1-indexed line range
///
/// Mirrors `sed` addressing: a missing end runs to the last line, a zero
/// bound counts as line 1, and an end before the start selects only the
/// start line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl LineRange {
    /// `None` when neither bound is given
    pub fn from_bounds(start_line: Option<usize>, end_line: Option<usize>) -> Option<Self> {
        if start_line.is_none() && end_line.is_none() {
            return None;
        }

        let start = start_line.unwrap_or(1).max(1);
        let end = end_line.map(|end| end.max(1).max(start));
        Some(Self { start, end })
    }

    /// Address prefix for a `sed` command
    fn sed_address(&self) -> String {
        match self.end {
            Some(end) => format!("{},{}", self.start, end),
            None => format!("{},$", self.start),
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-end", self.start),
        }
    }
}

/// Untyped search-and-replace arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceSpec {
    pub search: String,
    pub replace: String,
    pub ignore_case: bool,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
}

/// A validated search-and-replace request
#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    search: String,
    replace: String,
    ignore_case: bool,
    range: Option<LineRange>,
    mode: SearchMode,
    regex: Regex,
}

impl ReplaceRequest {
    /// Compile the search pattern; fails only for invalid regexes
    pub fn new(spec: &ReplaceSpec) -> Result<Self, regex::Error> {
        let mode = SearchMode::detect(&spec.search);
        let pattern = match mode {
            SearchMode::Literal => regex::escape(&spec.search),
            SearchMode::Regex => spec.search.clone(),
        };

        // An ASCII literal folds ASCII case only, like `sed`'s `I` flag
        let ascii_literal = mode == SearchMode::Literal && spec.search.is_ascii();
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(spec.ignore_case)
            .unicode(!ascii_literal)
            .multi_line(true)
            .build()?;

        Ok(Self {
            search: spec.search.clone(),
            replace: spec.replace.clone(),
            ignore_case: spec.ignore_case,
            range: LineRange::from_bounds(spec.start_line, spec.end_line),
            mode,
            regex,
        })
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn replacement(&self) -> &str {
        &self.replace
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn range(&self) -> Option<LineRange> {
        self.range
    }

    /// Replace every match in `text`
    fn replace_all(&self, text: &str) -> String {
        match self.mode {
            SearchMode::Literal => self
                .regex
                .replace_all(text, NoExpand(&self.replace))
                .into_owned(),
            SearchMode::Regex => self
                .regex
                .replace_all(text, self.replace.as_str())
                .into_owned(),
        }
    }

    /// Apply the request to `original`, honouring the line range
    pub fn apply(&self, original: &str) -> String {
        let Some(range) = self.range else {
            return self.replace_all(original);
        };

        let lines: Vec<&str> = original.split_inclusive('\n').collect();
        let start = range.start - 1;
        if start >= lines.len() {
            return original.to_string();
        }
        let end = range.end.map_or(lines.len(), |end| end.min(lines.len()));

        let mut result = lines[..start].concat();
        result.push_str(&self.replace_all(&lines[start..end].concat()));
        result.push_str(&lines[end..].concat());
        result
    }
}

/// One way of computing the replaced file content
#[async_trait]
pub trait ReplaceStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// New content for `path`, or `None` if this strategy declines
    async fn replace(&self, request: &ReplaceRequest, path: &Path, original: &str)
    -> Option<String>;
}

/// Pure in-process implementation; never declines
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessStrategy;

#[async_trait]
impl ReplaceStrategy for InProcessStrategy {
    fn name(&self) -> &'static str {
        "in-process"
    }

    async fn replace(
        &self,
        request: &ReplaceRequest,
        _path: &Path,
        original: &str,
    ) -> Option<String> {
        Some(request.apply(original))
    }
}

/// The external `sed` stream editor, run without a shell
///
/// Only used where its output is known to match [`InProcessStrategy`]:
/// literal, single-line search and replacement on a non-empty file, with
/// case folding restricted to ASCII. The edited text is captured from
/// stdout; the file is written by the caller.
#[derive(Debug, Clone)]
pub struct SedStrategy {
    runner: ProcessRunner,
}

impl SedStrategy {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    fn accepts(request: &ReplaceRequest, original: &str) -> bool {
        request.mode == SearchMode::Literal
            && !request.search.is_empty()
            && !request.search.contains(['\n', '\r'])
            && !request.replace.contains(['\n', '\r'])
            && (!request.ignore_case || request.search.is_ascii())
            && !original.is_empty()
    }

    /// `s` command for `request`, `#`-delimited
    pub fn script(request: &ReplaceRequest) -> String {
        let pattern = request.search.replace('#', r"\#");
        let replacement = request
            .replace
            .replace('\\', r"\\")
            .replace('&', r"\&")
            .replace('#', r"\#");
        let address = request
            .range
            .map(|range| range.sed_address())
            .unwrap_or_default();
        let flags = if request.ignore_case { "gI" } else { "g" };

        format!("{}s#{}#{}#{}", address, pattern, replacement, flags)
    }
}

#[async_trait]
impl ReplaceStrategy for SedStrategy {
    fn name(&self) -> &'static str {
        "sed"
    }

    async fn replace(
        &self,
        request: &ReplaceRequest,
        path: &Path,
        original: &str,
    ) -> Option<String> {
        if !Self::accepts(request, original) {
            return None;
        }

        let script = Self::script(request);
        let file = path.to_str()?;
        let cwd = path.parent().unwrap_or(Path::new("."));
        debug!("sed -e {}", script);

        match self.runner.run(&["sed", "-e", &script, file], cwd, None).await {
            Ok(output) if output.success() && !output.stdout.is_empty() => Some(output.stdout),
            Ok(output) => {
                warn!(
                    "sed exited with {} ({}), falling back",
                    output.exit_code,
                    output.failure_text()
                );
                None
            }
            Err(e) => {
                warn!("sed unavailable ({}), falling back", e);
                None
            }
        }
    }
}

/// Primary strategy with an in-process fallback
#[derive(Clone)]
pub struct ReplacePipeline {
    primary: Option<Arc<dyn ReplaceStrategy>>,
    fallback: Arc<dyn ReplaceStrategy>,
}

impl ReplacePipeline {
    /// `sed` first, then the in-process fallback
    pub fn with_sed(runner: ProcessRunner) -> Self {
        Self::in_process().with_primary(Some(Arc::new(SedStrategy::new(runner))))
    }

    /// Only the in-process implementation
    pub fn in_process() -> Self {
        Self {
            primary: None,
            fallback: Arc::new(InProcessStrategy),
        }
    }

    /// Replace (or remove) the primary stage
    pub fn with_primary(mut self, primary: Option<Arc<dyn ReplaceStrategy>>) -> Self {
        self.primary = primary;
        self
    }

    pub fn primary_name(&self) -> Option<&'static str> {
        self.primary.as_ref().map(|p| p.name())
    }

    /// Compute the new content for `path`
    pub async fn run(&self, request: &ReplaceRequest, path: &Path, original: &str) -> String {
        if let Some(primary) = &self.primary {
            if let Some(updated) = primary.replace(request, path, original).await {
                debug!("Replacement computed by {}", primary.name());
                return updated;
            }
        }

        self.fallback
            .replace(request, path, original)
            .await
            .unwrap_or_else(|| original.to_string())
    }
}

impl fmt::Debug for ReplacePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplacePipeline")
            .field("primary", &self.primary_name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl FileEditor<'_> {
    /// Replace occurrences of `spec.search` in `file_path`
    #[instrument(skip(self, spec), fields(search = %spec.search))]
    pub async fn search_and_replace(&self, file_path: &str, spec: &ReplaceSpec) -> String {
        if spec.search.is_empty() {
            return "Error: search string must not be empty".to_string();
        }

        let request = match ReplaceRequest::new(spec) {
            Ok(request) => request,
            Err(e) => return format!("Error: Invalid regex pattern '{}': {}", spec.search, e),
        };

        let Some(path) = self.resolve(file_path) else {
            return format!("Error: File not found: {}", file_path);
        };

        let original = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return format!("Error: File not found: {}", file_path);
            }
            Err(e) => return format!("An unexpected error occurred: {}", e),
        };

        let updated = self.pipeline.run(&request, &path, &original).await;

        if updated == original {
            let scope = request
                .range()
                .map(|range| format!(" within lines {}", range))
                .unwrap_or_default();
            return format!(
                "No changes made. '{}' not found in {}{}.",
                request.search(),
                file_path,
                scope
            );
        }

        if let Err(e) = atomic_write(&path, &updated).await {
            return format!("An unexpected error occurred: {}", e);
        }
        info!("Replaced '{}' in {}", request.search(), file_path);

        let mut result = format!(
            "Successfully replaced '{}' with '{}' in {} using {} search.\n{}",
            request.search(),
            request.replacement(),
            file_path,
            request.mode(),
            render_diff(&original, &updated, file_path)
        );
        result.push_str(&self.typecheck(file_path).await);
        result
    }
}
