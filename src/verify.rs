//! Checks that every dated asset directory has a post to go with it.

use regex::Regex;
use std::fmt;
use std::fs::read_dir;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Asset directories whose names start with a `YYYY-MM-DD-` date belong to a
/// post.
const DATED_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}-";

/// For each directory directly under `assets_directory` whose name starts
/// with a date, requires `{posts_directory}/{name}.md` to be a file. Returns
/// the posts found, sorted. Fails with [`Error::MissingPost`] naming every
/// missing post.
pub fn verify(assets_directory: &Path, posts_directory: &Path) -> Result<Vec<PathBuf>> {
    let dated = Regex::new(DATED_PATTERN)?;
    let annotate = |err: io::Error| Error::Io {
        path: assets_directory.to_owned(),
        err,
    };

    let mut posts = Vec::new();
    let mut missing = Vec::new();
    for result in read_dir(assets_directory).map_err(annotate)? {
        let entry = result.map_err(annotate)?;
        if !entry.file_type().map_err(annotate)?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if !dated.is_match(&name) {
            continue;
        }
        let post = posts_directory.join(format!("{}.md", name));
        if post.is_file() {
            posts.push(post);
        } else {
            missing.push(post);
        }
    }

    if !missing.is_empty() {
        missing.sort();
        return Err(Error::MissingPost(missing));
    }

    posts.sort();
    info!("discovered {} asset directories for posts", posts.len());
    Ok(posts)
}

/// The result of a verification.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed verification.
#[derive(Debug)]
pub enum Error {
    /// Returned when dated asset directories have no matching post.
    MissingPost(Vec<PathBuf>),

    /// Returned when the assets directory can't be listed.
    Io { path: PathBuf, err: io::Error },

    /// Returned if the directory pattern fails to compile.
    Regex(regex::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingPost(posts) => {
                write!(f, "missing post")?;
                if posts.len() > 1 {
                    write!(f, "s")?;
                }
                for (i, post) in posts.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { ", " };
                    write!(f, "{}{}", sep, post.display())?;
                }
                Ok(())
            }
            Error::Io { path, err } => {
                write!(f, "listing `{}`: {}", path.display(), err)
            }
            Error::Regex(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingPost(_) => None,
            Error::Io { path: _, err } => Some(err),
            Error::Regex(err) => Some(err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Error {
        Error::Regex(err)
    }
}
