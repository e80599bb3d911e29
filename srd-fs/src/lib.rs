//! UTF-8 filesystem helpers built on `cap-std` and `camino`.
//!
//! Source feeds, catalogue exports and sync markers all name files with
//! UTF-8 paths that may be absolute or relative to the working directory.
//! These helpers open the nearest ambient directory once and perform the
//! actual I/O through its capability handle.
#![forbid(unsafe_code)]

use std::io;
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Resolve `path` against `base` unless it is already absolute.
///
/// ```
/// use camino::Utf8Path;
/// use srd_fs::resolve_against;
///
/// let base = Utf8Path::new("/srv/srd");
/// assert_eq!(resolve_against(Some(base), "monsters.json"), "/srv/srd/monsters.json");
/// assert_eq!(resolve_against(Some(base), "/tmp/spells.json"), "/tmp/spells.json");
/// assert_eq!(resolve_against(None, "feats.json"), "feats.json");
/// ```
#[must_use]
pub fn resolve_against(base: Option<&Utf8Path>, path: &str) -> Utf8PathBuf {
    let candidate = Utf8Path::new(path);
    match base {
        Some(base) if candidate.is_relative() => base.join(candidate),
        _ => candidate.to_path_buf(),
    }
}

/// Read a UTF-8 text file.
pub fn read_utf8(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = parent_dir_and_name(path)?;
    dir.read_to_string(name.as_str())
}

/// Write `contents` to `path`, creating parent directories first.
///
/// The data lands in a sibling temporary file that is renamed over the
/// target, so readers never observe a half-written file.
pub fn write_utf8(path: &Utf8Path, contents: &str) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = parent_dir_and_name(path)?;
    let staging = format!(".{name}.partial");
    dir.write(staging.as_str(), contents)?;
    dir.rename(staging.as_str(), &dir, name.as_str())
}

/// Return whether `path` names an existing regular file.
pub fn file_exists(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match parent_dir_and_name(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Create `path` and any missing ancestors.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<()> {
    if path.as_str().is_empty() {
        return Ok(());
    }
    let (root, relative) = split_root(path)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    root.create_dir_all(&relative)
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

fn parent_dir_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
        .to_owned();
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Split `path` into an ambient root directory and the remaining relative
/// part, so `cap-std` never sees an absolute path.
fn split_root(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let root = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR_STR)
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR_STR),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if root == "." {
        path.to_path_buf()
    } else {
        path.strip_prefix(&root)
            .map_err(|_| io::Error::other(format!("failed to strip {root} from {path}")))?
            .to_path_buf()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&root, ambient_authority())?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        (dir, root)
    }

    #[rstest]
    fn writes_through_missing_directories(temp_root: (TempDir, Utf8PathBuf)) {
        let (_dir, root) = temp_root;
        let target = root.join("exports/2024/Monster.json");

        write_utf8(&target, "[]").expect("write export");

        assert!(file_exists(&target).expect("stat export"));
        assert_eq!(read_utf8(&target).expect("read export"), "[]");
    }

    #[rstest]
    fn rewriting_replaces_previous_contents(temp_root: (TempDir, Utf8PathBuf)) {
        let (_dir, root) = temp_root;
        let target = root.join("marker.txt");
        write_utf8(&target, "first").expect("write first");
        write_utf8(&target, "second").expect("write second");
        assert_eq!(read_utf8(&target).expect("read marker"), "second");
    }

    #[rstest]
    fn missing_files_do_not_exist(temp_root: (TempDir, Utf8PathBuf)) {
        let (_dir, root) = temp_root;
        assert!(!file_exists(&root.join("nowhere/marker.txt")).expect("stat missing"));
        assert!(!file_exists(&root).expect("directories are not files"));
    }

    #[rstest]
    fn reading_a_missing_file_fails(temp_root: (TempDir, Utf8PathBuf)) {
        let (_dir, root) = temp_root;
        let err = read_utf8(&root.join("absent.json")).expect_err("missing file");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
