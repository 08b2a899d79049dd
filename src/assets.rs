//! Places an exported asset bundle at its canonical directory, replacing
//! whatever a previous conversion left there.
//!
//! Two strategies are offered (see [`Replace`]). The staged strategy keeps
//! the old directory on disk until the new one has been renamed into place, so
//! a failure midway leaves the post with its previous assets rather than none.

use fs2::FileExt;
use serde::Deserialize;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How the canonical asset directory is replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Replace {
    /// Move the bundle next to the canonical directory, swap it in with
    /// renames, and only then delete the previous directory.
    Staged,

    /// Delete the canonical directory, then move the bundle into its place.
    InPlace,
}

impl Default for Replace {
    fn default() -> Self {
        Replace::Staged
    }
}

/// Replaces `canonical` with `bundle`. When `bundle` is `None` (the notebook
/// had no embedded outputs) any existing `canonical` directory is removed and
/// nothing takes its place.
pub fn install(bundle: Option<&Path>, canonical: &Path, replace: Replace) -> Result<()> {
    let bundle = match bundle {
        Some(bundle) => bundle,
        None => {
            debug!(canonical = %canonical.display(), "no asset bundle exported");
            return rmdir(canonical);
        }
    };

    if let Some(parent) = canonical.parent() {
        fs::create_dir_all(parent).map_err(|err| Error::new("creating", parent, err))?;
    }

    match replace {
        Replace::InPlace => {
            rmdir(canonical)?;
            move_dir(bundle, canonical)
        }
        Replace::Staged => {
            let incoming = sibling(canonical, "incoming");
            let previous = sibling(canonical, "previous");

            // leftovers from an interrupted run
            rmdir(&incoming)?;
            rmdir(&previous)?;

            move_dir(bundle, &incoming)?;
            swap_into_place(&incoming, canonical, &previous, |from, to| fs::rename(from, to))?;
            rmdir(&previous)
        }
    }
}

/// Renames `incoming` to `canonical`, first renaming any existing `canonical`
/// aside to `previous`. If the final rename fails, `previous` is renamed back.
fn swap_into_place<F>(incoming: &Path, canonical: &Path, previous: &Path, rename: F) -> Result<()>
where
    F: Fn(&Path, &Path) -> io::Result<()>,
{
    let had_previous = canonical.exists();
    if had_previous {
        rename(canonical, previous).map_err(|err| Error::new("setting aside", canonical, err))?;
    }

    if let Err(err) = rename(incoming, canonical) {
        if had_previous {
            if let Err(restore) = rename(previous, canonical) {
                warn!(
                    previous = %previous.display(),
                    error = %restore,
                    "could not restore previous asset directory"
                );
            }
        }
        return Err(Error::new("renaming into place", incoming, err));
    }
    Ok(())
}

/// `{parent}/.{name}.{label}` for a canonical directory `{parent}/{name}`.
fn sibling(canonical: &Path, label: &str) -> PathBuf {
    let name = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    canonical.with_file_name(format!(".{}.{}", name, label))
}

/// Moves a directory. Falls back to copy-then-delete when a plain rename is
/// refused, e.g. because source and destination are on different devices.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(src = %src.display(), dst = %dst.display(), error = %err, "rename failed; copying");
            copy_dir(src, dst)?;
            fs::remove_dir_all(src).map_err(|err| Error::new("removing", src, err))
        }
    }
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src) {
        let entry = result.map_err(|err| Error::new("walking", src, err.into()))?;
        // strip_prefix can't fail since `src` is the walk root
        let target = dst.join(entry.path().strip_prefix(src).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| Error::new("creating", &target, err))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|err| Error::new("copying", entry.path(), err))?;
        }
    }
    Ok(())
}

/// Removes a directory tree, treating an absent directory as success.
pub fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::new("removing", dir, e)),
    }
}

/// Removes a file, treating an absent file as success.
pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::new("removing", path, e)),
    }
}

/// The hidden directory, under the staging directory, that holds lock files.
pub const LOCK_DIRECTORY: &str = ".nbpost/locks";

/// An exclusive advisory lock held for the duration of one post's
/// conversion. Released on drop.
///
/// The lock file is never deleted, since a waiter may already have it open.
/// Lock files live under [`LOCK_DIRECTORY`], away from the published assets.
pub struct PostLock {
    file: File,
    path: PathBuf,
}

impl PostLock {
    /// Blocks until the lock file `{staging_directory}/.nbpost/locks/{name}.lock`
    /// is held exclusively.
    pub fn acquire(staging_directory: &Path, name: &str) -> Result<PostLock> {
        let locks = staging_directory.join(LOCK_DIRECTORY);
        fs::create_dir_all(&locks).map_err(|err| Error::new("creating", &locks, err))?;
        let path = locks.join(format!("{}.lock", name));
        let file = File::create(&path).map_err(|err| Error::new("creating", &path, err))?;
        file.lock_exclusive()
            .map_err(|err| Error::new("locking", &path, err))?;
        Ok(PostLock { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PostLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// The result of an asset-directory operation.
pub type Result<T> = std::result::Result<T, Error>;

/// A filesystem failure while moving or deleting asset directories.
#[derive(Debug)]
pub struct Error {
    pub action: &'static str,
    pub path: PathBuf,
    pub err: io::Error,
}

impl Error {
    pub(crate) fn new(action: &'static str, path: &Path, err: io::Error) -> Error {
        Error {
            action,
            path: path.to_owned(),
            err,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} `{}`: {}", self.action, self.path.display(), self.err)
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bundle(root: &Path, files: &[&str]) -> PathBuf {
        let dir = root.join("post_files");
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), file).unwrap();
        }
        dir
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_install_replaces_stale_directory() {
        for replace in &[Replace::Staged, Replace::InPlace] {
            let root = tempfile::tempdir().unwrap();
            let canonical = root.path().join("assets/post");
            fs::create_dir_all(&canonical).unwrap();
            fs::write(canonical.join("stale.png"), "old").unwrap();

            let src = bundle(root.path(), &["a.png", "b.png"]);
            install(Some(&src), &canonical, *replace).unwrap();

            assert_eq!(vec!["a.png", "b.png"], listing(&canonical));
            assert!(!src.exists());
            assert_eq!(vec!["post"], listing(&root.path().join("assets")));
        }
    }

    #[test]
    fn test_install_without_bundle_removes_canonical() {
        let root = tempfile::tempdir().unwrap();
        let canonical = root.path().join("assets/post");
        fs::create_dir_all(&canonical).unwrap();
        fs::write(canonical.join("stale.png"), "old").unwrap();

        install(None, &canonical, Replace::Staged).unwrap();
        assert!(!canonical.exists());
    }

    #[test]
    fn test_install_without_bundle_or_canonical_is_ok() {
        let root = tempfile::tempdir().unwrap();
        install(None, &root.path().join("assets/post"), Replace::InPlace).unwrap();
    }

    #[test]
    fn test_install_cleans_interrupted_staging() {
        let root = tempfile::tempdir().unwrap();
        let canonical = root.path().join("assets/post");
        let leftover = root.path().join("assets/.post.incoming");
        fs::create_dir_all(&leftover).unwrap();
        fs::write(leftover.join("junk"), "junk").unwrap();

        let src = bundle(root.path(), &["a.png"]);
        install(Some(&src), &canonical, Replace::Staged).unwrap();
        assert!(!leftover.exists());
        assert_eq!(vec!["a.png"], listing(&canonical));
    }

    #[test]
    fn test_swap_restores_previous_on_failure() {
        let root = tempfile::tempdir().unwrap();
        let canonical = root.path().join("post");
        let incoming = root.path().join(".post.incoming");
        let previous = root.path().join(".post.previous");
        fs::create_dir_all(&canonical).unwrap();
        fs::write(canonical.join("old.png"), "old").unwrap();
        fs::create_dir_all(&incoming).unwrap();

        let result = swap_into_place(&incoming, &canonical, &previous, |from, to| {
            if from == incoming.as_path() {
                Err(io::Error::new(io::ErrorKind::Other, "injected"))
            } else {
                fs::rename(from, to)
            }
        });

        assert!(result.is_err());
        assert_eq!(vec!["old.png"], listing(&canonical));
        assert!(!previous.exists());
    }

    #[test]
    fn test_copy_dir_is_recursive() {
        let root = tempfile::tempdir().unwrap();
        let src = bundle(root.path(), &["a.png"]);
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/b.svg"), "b").unwrap();

        let dst = root.path().join("copy");
        copy_dir(&src, &dst).unwrap();
        assert_eq!(vec!["a.png", "nested"], listing(&dst));
        assert_eq!("b", fs::read_to_string(dst.join("nested/b.svg")).unwrap());
    }

    #[test]
    fn test_post_lock_lives_under_staging_directory() {
        let root = tempfile::tempdir().unwrap();
        let lock = PostLock::acquire(root.path(), "post").unwrap();
        assert_eq!(root.path().join(".nbpost/locks/post.lock"), lock.path());
        assert!(lock.path().is_file());
        drop(lock);

        // released on drop, so a second acquisition does not block
        let again = PostLock::acquire(root.path(), "post").unwrap();
        assert!(again.path().is_file());
    }
}
