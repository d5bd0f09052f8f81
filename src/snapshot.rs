//! Pre/post directory snapshotting and change detection.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::SnapshotError;

/// An in-memory record of one file at snapshot time. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FileState {
    pub size: u64,
    pub mtime: f64,
    pub content_hash: String,
}

/// `relative_path -> FileState` for every regular file under a root.
pub type Snapshot = HashMap<String, FileState>;

/// Recursively walk `root`, recording size/mtime/MD5 for every regular file.
///
/// Entries whose basename ends in `.lock` are skipped (they belong to the
/// file-manager's own coordination, not interpreter output). Symlinks are
/// not followed — a symlink is treated as absent rather than resolved,
/// since a fragment could otherwise point the snapshot outside the bind
/// mount. Unreadable entries are logged and omitted rather than failing
/// the whole snapshot.
pub fn snapshot(root: &Path) -> Result<Snapshot, SnapshotError> {
    let mut out = Snapshot::new();
    if !root.exists() {
        return Ok(out);
    }

    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry during snapshot");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if file_name.ends_with(".lock") {
            continue;
        }

        let path = entry.path();
        let rel = match path.strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping file with unreadable metadata");
                continue;
            }
        };
        let content = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file during snapshot");
                continue;
            }
        };

        let mut hasher = Md5::new();
        hasher.update(&content);
        let content_hash = format!("{:x}", hasher.finalize());

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        out.insert(
            rel,
            FileState {
                size: metadata.len(),
                mtime,
                content_hash,
            },
        );
    }

    Ok(out)
}

/// Paths present in `after` that are new or modified relative to `before`.
///
/// Deletions (present in `before`, absent in `after`) are deliberately
/// excluded — the engine only ever reports new/modified files. Content
/// hash is authoritative: a path whose size and mtime coincidentally match
/// but whose bytes differ is still classified as changed.
pub fn diff(before: &Snapshot, after: &Snapshot) -> HashSet<String> {
    let mut changed = HashSet::new();
    for (path, after_state) in after {
        match before.get(path) {
            None => {
                changed.insert(path.clone());
            }
            Some(before_state) => {
                if before_state != after_state {
                    changed.insert(path.clone());
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn write_file(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    #[test]
    fn snapshot_skips_lock_files_and_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "real.txt", b"data");
        write_file(dir.path(), "session.lock", b"lock");
        #[cfg(unix)]
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let snap = snapshot(dir.path()).unwrap();
        assert!(snap.contains_key("real.txt"));
        assert!(!snap.contains_key("session.lock"));
        #[cfg(unix)]
        assert!(!snap.contains_key("link.txt"));
    }

    #[test]
    fn snapshot_preserves_deep_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a/b/c/deep.txt", b"x");
        let snap = snapshot(dir.path()).unwrap();
        assert!(snap.contains_key("a/b/c/deep.txt"));
    }

    #[test]
    fn missing_root_snapshots_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let snap = snapshot(&missing).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn diff_detects_new_file() {
        let before = Snapshot::new();
        let mut after = Snapshot::new();
        after.insert(
            "new.txt".into(),
            FileState {
                size: 3,
                mtime: 1.0,
                content_hash: "abc".into(),
            },
        );
        let changed = diff(&before, &after);
        assert_eq!(changed, HashSet::from(["new.txt".to_string()]));
    }

    #[test]
    fn diff_excludes_deletions() {
        let mut before = Snapshot::new();
        before.insert(
            "gone.txt".into(),
            FileState {
                size: 1,
                mtime: 1.0,
                content_hash: "x".into(),
            },
        );
        let after = Snapshot::new();
        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn diff_hash_is_authoritative_over_coincidental_size_and_mtime() {
        let mut before = Snapshot::new();
        before.insert(
            "f.txt".into(),
            FileState {
                size: 3,
                mtime: 1.0,
                content_hash: "aaa".into(),
            },
        );
        let mut after = Snapshot::new();
        after.insert(
            "f.txt".into(),
            FileState {
                size: 3,
                mtime: 1.0,
                content_hash: "bbb".into(),
            },
        );
        assert_eq!(diff(&before, &after), HashSet::from(["f.txt".to_string()]));
    }

    #[test]
    fn diff_unchanged_file_is_not_reported() {
        let state = FileState {
            size: 3,
            mtime: 1.0,
            content_hash: "aaa".into(),
        };
        let mut before = Snapshot::new();
        before.insert("f.txt".into(), state.clone());
        let mut after = Snapshot::new();
        after.insert("f.txt".into(), state);
        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn identical_rewrite_across_two_snapshots_is_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "unchanged.txt", b"C");
        let before = snapshot(dir.path()).unwrap();
        write_file(dir.path(), "unchanged.txt", b"C");
        let after = snapshot(dir.path()).unwrap();
        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn fifty_files_ten_changed_reports_exactly_those_ten() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..50 {
            write_file(dir.path(), &format!("f{i:02}.txt"), format!("v{i}").as_bytes());
        }
        let before = snapshot(dir.path()).unwrap();

        for i in 10..20 {
            write_file(dir.path(), &format!("f{i:02}.txt"), format!("changed{i}").as_bytes());
        }
        let after = snapshot(dir.path()).unwrap();

        let changed = diff(&before, &after);
        let expected: HashSet<String> = (10..20).map(|i| format!("f{i:02}.txt")).collect();
        assert_eq!(changed, expected);
    }

    #[test]
    fn rename_reports_only_the_new_name() {
        let mut before = Snapshot::new();
        before.insert(
            "old.txt".into(),
            FileState {
                size: 3,
                mtime: 1.0,
                content_hash: "same".into(),
            },
        );
        let mut after = Snapshot::new();
        after.insert(
            "new.txt".into(),
            FileState {
                size: 3,
                mtime: 1.0,
                content_hash: "same".into(),
            },
        );
        assert_eq!(diff(&before, &after), HashSet::from(["new.txt".to_string()]));
    }
}
