//! Recursive vault directory walker.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use super::VaultError;

/// A markdown file discovered under the vault root.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Absolute path to the file.
    pub absolute_path: PathBuf,
    /// Path relative to vault root.
    pub relative_path: PathBuf,
    /// File modification time.
    pub modified: SystemTime,
}

/// Walker for discovering markdown files in a vault.
#[derive(Debug, Clone)]
pub struct VaultWalker {
    root: PathBuf,
    /// Folders to exclude from walking (relative paths from vault root).
    excluded_folders: Vec<PathBuf>,
}

impl VaultWalker {
    pub fn new(root: &Path) -> Result<Self, VaultError> {
        Self::with_exclusions(root, Vec::new())
    }

    /// Create a walker that skips `excluded_folders`.
    ///
    /// Exclusions may be relative to the root (e.g. "archive/2019") or
    /// absolute paths inside it.
    pub fn with_exclusions(
        root: &Path,
        excluded_folders: Vec<PathBuf>,
    ) -> Result<Self, VaultError> {
        let root = root
            .canonicalize()
            .map_err(|_| VaultError::MissingRoot(root.display().to_string()))?;

        if !root.is_dir() {
            return Err(VaultError::MissingRoot(root.display().to_string()));
        }

        let excluded_folders = excluded_folders
            .into_iter()
            .map(|p| {
                if p.is_absolute() {
                    p.strip_prefix(&root).unwrap_or(&p).to_path_buf()
                } else {
                    p
                }
            })
            .collect();

        Ok(Self { root, excluded_folders })
    }

    /// Walk the vault and return all markdown files, sorted by relative path.
    pub fn walk(&self) -> Result<Vec<WalkedFile>, VaultError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e))
        {
            let entry = entry.map_err(|e| VaultError::Walk {
                root: self.root.display().to_string(),
                source: e,
            })?;

            let path = entry.path();
            if !entry.file_type().is_file() || !is_markdown_file(path) {
                continue;
            }

            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(std::time::UNIX_EPOCH);

            let relative_path = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();

            files.push(WalkedFile {
                absolute_path: path.to_path_buf(),
                relative_path,
                modified,
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        // Never filter the root directory (depth 0)
        if entry.depth() == 0 {
            return false;
        }

        entry.path().strip_prefix(&self.root).is_ok_and(|relative| self.skips(relative))
    }

    /// Whether `relative` is hidden, under a build/tool folder, or under an
    /// excluded folder. Such paths are never listed by [`walk`](Self::walk).
    pub fn skips(&self, relative: &Path) -> bool {
        let skipped_component = relative.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            name.starts_with('.')
                || matches!(name.as_ref(), "node_modules" | "target" | "__pycache__" | "venv")
        });

        skipped_component
            || self.excluded_folders.iter().any(|excluded| relative.starts_with(excluded))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub(crate) fn is_markdown_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("2024-05-01.md"), "# One").unwrap();
        fs::write(root.join("2024-05-02.md"), "# Two").unwrap();

        fs::create_dir(root.join("projects")).unwrap();
        fs::write(root.join("projects/app.md"), "# App").unwrap();

        fs::create_dir(root.join(".obsidian")).unwrap();
        fs::write(root.join(".obsidian/workspace.md"), "# Hidden").unwrap();

        fs::write(root.join("readme.txt"), "Not markdown").unwrap();

        dir
    }

    fn relative(files: &[WalkedFile]) -> Vec<String> {
        files.iter().map(|f| f.relative_path.to_string_lossy().replace('\\', "/")).collect()
    }

    #[test]
    fn test_walk_finds_markdown_files_sorted() {
        let vault = create_test_vault();
        let walker = VaultWalker::new(vault.path()).unwrap();
        let files = walker.walk().unwrap();

        assert_eq!(relative(&files), vec!["2024-05-01.md", "2024-05-02.md", "projects/app.md"]);
    }

    #[test]
    fn test_walk_skips_hidden_and_non_markdown() {
        let vault = create_test_vault();
        let walker = VaultWalker::new(vault.path()).unwrap();
        let paths = relative(&walker.walk().unwrap());

        assert!(!paths.iter().any(|p| p.contains(".obsidian")));
        assert!(!paths.iter().any(|p| p.contains("readme.txt")));
    }

    #[test]
    fn test_missing_root() {
        let result = VaultWalker::new(Path::new("/nonexistent/path"));
        assert!(matches!(result.unwrap_err(), VaultError::MissingRoot(_)));
    }

    #[test]
    fn test_walk_with_exclusions() {
        let vault = create_test_vault();
        fs::create_dir_all(vault.path().join("archive/2019")).unwrap();
        fs::write(vault.path().join("archive/2019/old.md"), "# Old").unwrap();

        let walker =
            VaultWalker::with_exclusions(vault.path(), vec![PathBuf::from("archive")]).unwrap();
        let paths = relative(&walker.walk().unwrap());

        assert_eq!(paths.len(), 3);
        assert!(!paths.iter().any(|p| p.starts_with("archive")));
    }

    #[test]
    fn test_skips_matches_walk() {
        let vault = create_test_vault();
        let walker =
            VaultWalker::with_exclusions(vault.path(), vec![PathBuf::from("archive")]).unwrap();

        assert!(walker.skips(Path::new(".obsidian/workspace.md")));
        assert!(walker.skips(Path::new("web/node_modules/readme.md")));
        assert!(walker.skips(Path::new("archive/2019/old.md")));
        assert!(!walker.skips(Path::new("projects/app.md")));
        assert!(!walker.skips(Path::new("archived.md")));
    }
}
