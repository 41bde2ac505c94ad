//! Local fixture traversal.
//!
//! Produces the entries to mirror without touching the remote side, so the
//! uploader in the parent module only has to consume them.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    /// Symlinks, sockets, devices. Never mirrored.
    Other,
}

/// One entry of a local tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub kind: EntryKind,
    pub local_path: PathBuf,
    /// Path relative to the parent of the walked directory, so it starts with
    /// the directory's own name.
    pub relative_path: PathBuf,
}

/// Depth-first walk of `root`, directories before their contents. Symlinks
/// are reported, not followed.
pub fn walk_tree(root: &Path) -> impl Iterator<Item = Result<TreeEntry, walkdir::Error>> {
    let base = root.file_name().map(PathBuf::from).unwrap_or_default();
    let root_path = root.to_path_buf();

    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .map(move |entry| {
            let entry = entry?;
            let relative_path = match entry.path().strip_prefix(&root_path) {
                Ok(rel) => base.join(rel),
                Err(_) => entry.path().to_path_buf(),
            };
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };

            Ok(TreeEntry {
                kind,
                relative_path,
                local_path: entry.into_path(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_order_and_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("testdata");
        std::fs::create_dir_all(root.join("b/inner")).unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::write(root.join("b/inner/c.txt"), "c").unwrap();

        let entries: Vec<TreeEntry> = walk_tree(&root).map(|e| e.unwrap()).collect();
        let seen: Vec<(EntryKind, PathBuf)> = entries
            .iter()
            .map(|e| (e.kind, e.relative_path.clone()))
            .collect();

        assert_eq!(
            seen,
            vec![
                (EntryKind::Dir, PathBuf::from("testdata")),
                (EntryKind::File, PathBuf::from("testdata/a.txt")),
                (EntryKind::Dir, PathBuf::from("testdata/b")),
                (EntryKind::Dir, PathBuf::from("testdata/b/inner")),
                (EntryKind::File, PathBuf::from("testdata/b/inner/c.txt")),
            ]
        );
        assert_eq!(entries[1].local_path, root.join("a.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("testdata");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("outside.txt"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("outside.txt"), root.join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path(), root.join("loop")).unwrap();

        let kinds: Vec<(EntryKind, PathBuf)> = walk_tree(&root)
            .map(|e| e.unwrap())
            .map(|e| (e.kind, e.relative_path))
            .collect();

        assert_eq!(
            kinds,
            vec![
                (EntryKind::Dir, PathBuf::from("testdata")),
                (EntryKind::Other, PathBuf::from("testdata/link")),
                (EntryKind::Other, PathBuf::from("testdata/loop")),
            ]
        );
    }

    #[test]
    fn test_walk_missing_root_errors() {
        let mut walk = walk_tree(Path::new("/nonexistent_path_xyz/testdata"));
        assert!(walk.next().unwrap().is_err());
    }
}
