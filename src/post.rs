//! Defines the [`PostName`] and [`Variant`] types, which together decide where
//! every artifact of a converted notebook lives on disk and how it is linked.

use chrono::{DateTime, Local, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const MARKDOWN_EXTENSION: &str = "md";

/// The suffix the export tool appends to a notebook's stem when naming the
/// directory of support files it generates.
pub const BUNDLE_SUFFIX: &str = "_files";

/// Selects the on-disk conventions for a conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// The post keeps the notebook's stem (`_posts/{stem}.md`) and its assets
    /// live at `assets/{stem}/`. No front-matter is injected.
    Plain,

    /// The post is prefixed with its publish date
    /// (`_posts/{date}-{stem}.md`), its assets live at
    /// `media/{date}-{stem}/`, and a front-matter block is injected.
    Dated,
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Plain
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Variant::Plain),
            "dated" => Ok(Variant::Dated),
            _ => Err(format!("unknown variant `{}`", s)),
        }
    }
}

/// The identity of a post: the notebook's stem plus, for dated posts, the
/// publish date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostName {
    pub stem: String,
    pub date: Option<NaiveDate>,
}

impl PostName {
    /// Builds a [`PostName`] from a notebook path. Fails if the path has no
    /// UTF-8 file stem.
    pub fn from_notebook(notebook: &Path, date: Option<NaiveDate>) -> Result<PostName, InvalidFileNameError> {
        let stem = notebook
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| InvalidFileNameError(notebook.to_owned()))?;
        Ok(PostName {
            stem: stem.to_owned(),
            date,
        })
    }

    /// The base identifier of every derived artifact: `{stem}` or
    /// `{date}-{stem}`.
    pub fn name(&self) -> String {
        match self.date {
            None => self.stem.clone(),
            Some(date) => format!("{}-{}", date.format("%Y-%m-%d"), self.stem),
        }
    }

    /// The path token the export tool uses for the support-file directory,
    /// both on disk and inside the exported markdown.
    pub fn bundle_token(&self) -> String {
        format!("{}{}", self.stem, BUNDLE_SUFFIX)
    }

    /// The file name of the exported markdown (`{stem}.md`).
    pub fn exported_file_name(&self) -> String {
        format!("{}.{}", self.stem, MARKDOWN_EXTENSION)
    }

    /// The file name of the final post (`{name}.md`).
    pub fn post_file_name(&self) -> String {
        format!("{}.{}", self.name(), MARKDOWN_EXTENSION)
    }

    /// The canonical asset directory under `assets_directory`.
    pub fn asset_directory(&self, assets_directory: &Path) -> PathBuf {
        assets_directory.join(self.name())
    }

    /// The public path under which the canonical asset directory is linked,
    /// e.g. `/assets/{name}`.
    pub fn public_path(&self, assets_url: &str) -> String {
        format!("{}/{}", assets_url.trim_end_matches('/'), self.name())
    }
}

impl fmt::Display for PostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Returns the publish date a notebook gets when none is given explicitly:
/// its creation time in local time, or its modification time where the
/// platform does not record creation.
pub fn default_date(notebook: &Path) -> std::io::Result<NaiveDate> {
    let metadata = std::fs::metadata(notebook)?;
    let time = match metadata.created() {
        Ok(time) => time,
        Err(_) => metadata.modified()?,
    };
    Ok(DateTime::<Local>::from(time).date_naive())
}

#[derive(Debug)]
pub struct InvalidFileNameError(pub PathBuf);

impl fmt::Display for InvalidFileNameError {
    /// Displays an [`InvalidFileNameError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid notebook file name: {:?}", &self.0)
    }
}

impl std::error::Error for InvalidFileNameError {}

#[cfg(test)]
mod test {
    use super::*;

    fn dated(stem: &str) -> PostName {
        PostName {
            stem: stem.to_owned(),
            date: Some(NaiveDate::from_ymd_opt(2021, 5, 1).unwrap()),
        }
    }

    #[test]
    fn test_plain_name_is_stem() {
        let name = PostName::from_notebook(Path::new("nb/my-post.ipynb"), None).unwrap();
        assert_eq!("my-post", name.name());
        assert_eq!("my-post.md", name.post_file_name());
        assert_eq!("my-post_files", name.bundle_token());
        assert_eq!("/assets/my-post", name.public_path("/assets"));
        assert_eq!(PathBuf::from("assets/my-post"), name.asset_directory(Path::new("assets")));
    }

    #[test]
    fn test_dated_name_prefixes_date() {
        let name = dated("my-post");
        assert_eq!("2021-05-01-my-post", name.name());
        assert_eq!("2021-05-01-my-post.md", name.post_file_name());
        assert_eq!("my-post.md", name.exported_file_name());
        assert_eq!("my-post_files", name.bundle_token());
        assert_eq!("/media/2021-05-01-my-post", name.public_path("/media/"));
    }

    #[test]
    fn test_default_date_uses_file_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let notebook = dir.path().join("post.ipynb");
        std::fs::write(&notebook, "{}").unwrap();
        let metadata = std::fs::metadata(&notebook).unwrap();
        let time = metadata.created().or_else(|_| metadata.modified()).unwrap();
        let wanted = DateTime::<Local>::from(time).date_naive();
        assert_eq!(wanted, default_date(&notebook).unwrap());
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!(Ok(Variant::Dated), "dated".parse());
        assert_eq!(Ok(Variant::Plain), "plain".parse());
        assert!("other".parse::<Variant>().is_err());
    }
}
