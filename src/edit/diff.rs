//! Unified diff rendering for file mutations
//!
//! Pure function of its inputs; every mutator uses it to describe what
//! it changed on disk.

use std::fmt;
use std::ops::Range;

use similar::{ChangeTag, TextDiff};

/// Rendered diffs longer than this are replaced by [`DiffReport::TooLarge`]
pub const MAX_DIFF_LINES: usize = 1000;

/// Lines of unchanged context around each hunk
pub const CONTEXT_LINES: usize = 3;

/// Outcome of comparing two snapshots of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffReport {
    /// Both snapshots are byte-identical
    NoChanges,
    /// Unified diff body, header lines included
    Unified(String),
    /// The body exceeded [`MAX_DIFF_LINES`]
    TooLarge,
}

impl DiffReport {
    /// Whether the snapshots differed
    pub fn has_changes(&self) -> bool {
        !matches!(self, DiffReport::NoChanges)
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffReport::NoChanges => {
                write!(f, "No changes detected (file content was identical).")
            }
            DiffReport::Unified(body) => write!(f, "Diff:\n{}", body),
            DiffReport::TooLarge => write!(
                f,
                "Diff was too large (over {} lines).",
                MAX_DIFF_LINES
            ),
        }
    }
}

/// Compute a unified diff between `original` and `updated`
///
/// Headers read `--- a/<label>` / `+++ b/<label>`; line terminators are
/// stripped from the rendered lines.
pub fn render_diff(original: &str, updated: &str, label: &str) -> DiffReport {
    if original == updated {
        return DiffReport::NoChanges;
    }

    let diff = TextDiff::from_lines(original, updated);

    let mut lines = vec![format!("--- a/{}", label), format!("+++ b/{}", label)];

    for group in diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };

        let old = first.old_range().start..last.old_range().end;
        let new = first.new_range().start..last.new_range().end;
        lines.push(format!("@@ -{} +{} @@", hunk_range(old), hunk_range(new)));

        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                let text = change.value().trim_end_matches(['\n', '\r']);
                lines.push(format!("{}{}", sign, text));
            }
        }

        if lines.len() > MAX_DIFF_LINES {
            return DiffReport::TooLarge;
        }
    }

    DiffReport::Unified(lines.join("\n"))
}

/// Format a hunk range the way `diff -u` does (`start,len`, 1-based)
fn hunk_range(range: Range<usize>) -> String {
    let length = range.end - range.start;
    match length {
        1 => format!("{}", range.start + 1),
        // Empty ranges point at the line *before* the insertion.
        0 => format!("{},0", range.start),
        _ => format!("{},{}", range.start + 1, length),
    }
}
