//! Whole-file writes

use std::io::ErrorKind;

use tracing::{info, instrument};

use super::{FileEditor, atomic_write, render_diff};

impl FileEditor<'_> {
    /// Create or overwrite `file_path` with `content`
    ///
    /// Parent directories are created as needed. Overwrites report a diff
    /// against the previous content.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn write_file(&self, file_path: &str, content: &str) -> String {
        let Some(path) = self.resolve(file_path) else {
            return format!("Error: path '{}' is outside the repository", file_path);
        };

        let original = match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return format!("An unexpected error occurred: {}", e),
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return format!("An unexpected error occurred: {}", e);
            }
        }

        if let Err(e) = atomic_write(&path, content).await {
            return format!("An unexpected error occurred: {}", e);
        }
        info!("Wrote {}", file_path);

        let mut result = match original {
            None => format!("Successfully created new file: {}.", file_path),
            Some(original) => format!(
                "Successfully wrote to {}.\n{}",
                file_path,
                render_diff(&original, content, file_path)
            ),
        };
        result.push_str(&self.typecheck(file_path).await);
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::edit::{FileEditor, ReplacePipeline, TypeChecker};
    use crate::git::WorkingTree;
    use crate::process::ProcessRunner;
    use tempfile::TempDir;

    fn setup() -> (TempDir, WorkingTree) {
        let temp = TempDir::new().unwrap();
        gix::init(temp.path()).unwrap();
        let tree = WorkingTree::open(temp.path(), ProcessRunner::new()).unwrap();
        (temp, tree)
    }

    #[tokio::test]
    async fn test_create_then_overwrite() {
        let (temp, tree) = setup();
        let checker = TypeChecker::disabled();
        let pipeline = ReplacePipeline::in_process();
        let editor = FileEditor::new(&tree, &checker, &pipeline);

        let result = editor
            .write_file("new_dir/new_file.txt", "Hello, world!")
            .await;
        assert_eq!(result, "Successfully created new file: new_dir/new_file.txt.");
        let path = temp.path().join("new_dir/new_file.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Hello, world!");

        let result = editor
            .write_file("new_dir/new_file.txt", "Updated content.")
            .await;
        assert!(result.contains("Diff:"));
        assert!(result.contains("-Hello, world!"));
        assert!(result.contains("+Updated content."));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Updated content.");
    }

    #[tokio::test]
    async fn test_rewrite_with_same_content() {
        let (_temp, tree) = setup();
        let checker = TypeChecker::disabled();
        let pipeline = ReplacePipeline::in_process();
        let editor = FileEditor::new(&tree, &checker, &pipeline);

        editor.write_file("same.txt", "foo\nbar\n").await;
        let result = editor.write_file("same.txt", "foo\nbar\n").await;
        assert!(result.ends_with("\nNo changes detected (file content was identical)."));
    }

    #[tokio::test]
    async fn test_write_outside_tree_is_refused() {
        let (temp, tree) = setup();
        let checker = TypeChecker::disabled();
        let pipeline = ReplacePipeline::in_process();
        let editor = FileEditor::new(&tree, &checker, &pipeline);

        let result = editor.write_file("../escape.txt", "nope").await;
        assert!(result.starts_with("Error:"));
        assert!(!temp.path().parent().unwrap().join("escape.txt").exists());
    }
}
