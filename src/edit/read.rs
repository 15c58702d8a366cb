//! Read-only file view

use std::io::ErrorKind;

use tracing::instrument;

use super::FileEditor;

/// Reported for missing files and for paths outside the working tree
pub const FILE_NOT_FOUND: &str = "Error: file wasn't found or out of cwd";

impl FileEditor<'_> {
    /// Contents of `file_path` inside the working tree
    #[instrument(skip(self))]
    pub async fn read_file(&self, file_path: &str) -> String {
        let Some(path) = self.resolve(file_path) else {
            return FILE_NOT_FOUND.to_string();
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => format!("Content of {}:\n{}", file_path, content),
            Err(e) if e.kind() == ErrorKind::NotFound => FILE_NOT_FOUND.to_string(),
            Err(e) => format!("Error reading file: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{ReplacePipeline, TypeChecker};
    use crate::git::WorkingTree;
    use crate::process::ProcessRunner;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_file() {
        let temp = TempDir::new().unwrap();
        gix::init(temp.path()).unwrap();
        std::fs::write(temp.path().join("read_me.txt"), "This is a test file.").unwrap();

        let tree = WorkingTree::open(temp.path(), ProcessRunner::new()).unwrap();
        let checker = TypeChecker::disabled();
        let pipeline = ReplacePipeline::in_process();
        let editor = FileEditor::new(&tree, &checker, &pipeline);

        assert_eq!(
            editor.read_file("read_me.txt").await,
            "Content of read_me.txt:\nThis is a test file."
        );
        assert_eq!(editor.read_file("non_existent_file.txt").await, FILE_NOT_FOUND);
        assert_eq!(editor.read_file("../../etc/passwd").await, FILE_NOT_FOUND);
    }
}
