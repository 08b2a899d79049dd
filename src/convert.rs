//! Converts one notebook into one publishable post plus its canonical asset
//! directory.
//!
//! The pipeline is linear:
//!
//! 1. Clear any `{stem}_files` bundle an earlier run left in the export
//!    directory, set aside any earlier `{stem}.md`, and run the export tool
//!    ([`crate::export`]) into the export directory.
//! 2. Read the freshly exported `{stem}.md`. If the export failed or did not
//!    produce it, the earlier `{stem}.md` is put back.
//! 3. Replace the canonical asset directory with the exported `{stem}_files`
//!    bundle, if any ([`crate::assets`]).
//! 4. Rewrite `{stem}_files` references to the canonical public path
//!    ([`crate::links`]).
//! 5. For dated posts, wrap the text in front-matter
//!    ([`crate::frontmatter`]).
//! 6. Write the final post and, for dated posts, delete the intermediate
//!    markdown.
//!
//! Re-running a conversion replaces the previous output for the same post;
//! nothing from an earlier run survives in the canonical asset directory.

use crate::assets::{self, PostLock};
use crate::config::Config;
use crate::export::{self, Exporter};
use crate::frontmatter::{self, FrontMatter};
use crate::links;
use crate::post::{self, InvalidFileNameError, PostName, Variant};
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-invocation options. Only dated conversions use them; they feed the
/// post's name and front-matter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// The publish date. Defaults to the notebook's creation date.
    pub date: Option<NaiveDate>,

    /// The front-matter layout. Defaults to [`Config::layout`].
    pub layout: Option<String>,

    /// The front-matter title. Omitted from the front-matter if absent.
    pub title: Option<String>,

    pub published: bool,

    /// Appends [`Config::mathjax_include`] to the post.
    pub mathjax: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            date: None,
            layout: None,
            title: None,
            published: true,
            mathjax: true,
        }
    }
}

/// What a successful conversion produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Converted {
    pub name: PostName,

    /// The final post file.
    pub post: PathBuf,

    /// The canonical asset directory, if the notebook had embedded outputs.
    pub assets: Option<PathBuf>,

    /// The number of bundle references that were rewritten.
    pub rewritten: usize,
}

/// Converts notebooks according to a [`Config`], delegating the export step to
/// an [`Exporter`].
pub struct Converter<'a> {
    config: &'a Config,
    exporter: &'a dyn Exporter,
}

impl<'a> Converter<'a> {
    pub fn new(config: &'a Config, exporter: &'a dyn Exporter) -> Converter<'a> {
        Converter { config, exporter }
    }

    /// Converts `notebook` into a post. See the module documentation for the
    /// sequence of steps.
    pub fn convert(&self, notebook: &Path, options: &ConvertOptions) -> Result<Converted> {
        if !notebook.is_file() {
            return Err(Error::InputNotFound(notebook.to_owned()));
        }

        let name = self.post_name(notebook, options)?;
        let export_directory = match self.config.variant {
            Variant::Plain => &self.config.posts_directory,
            Variant::Dated => &self.config.staging_directory,
        };
        create_dir(export_directory)?;
        create_dir(&self.config.posts_directory)?;

        let _lock = PostLock::acquire(&self.config.staging_directory, &name.name())?;

        // The export tool fills an existing bundle without emptying it.
        let bundle = export_directory.join(name.bundle_token());
        assets::rmdir(&bundle)?;

        let exported = export_directory.join(name.exported_file_name());
        let aside = set_aside(&exported)?;

        info!(notebook = %notebook.display(), post = %name, "exporting notebook");
        let outcome = match self.exporter.export(notebook, export_directory) {
            Ok(()) if exported.is_file() => Ok(()),
            Ok(()) => Err(Error::MissingExportedMarkdown(exported.clone())),
            Err(err) => Err(Error::Export(err)),
        };
        if let Some(aside) = aside {
            match &outcome {
                Ok(()) => assets::remove_file(&aside)?,
                Err(_) => restore(&aside, &exported),
            }
        }
        outcome?;

        let markdown = fs::read_to_string(&exported)
            .map_err(|err| assets::Error::new("reading", &exported, err))?;

        let bundle = if bundle.is_dir() { Some(bundle) } else { None };
        let canonical = name.asset_directory(&self.config.assets_directory);
        assets::install(bundle.as_deref(), &canonical, self.config.replace)?;
        debug!(canonical = %canonical.display(), bundled = bundle.is_some(), "placed assets");

        let token = name.bundle_token();
        let rewritten = links::references(&markdown, &token);
        let body = links::rewrite(&markdown, &token, &name.public_path(&self.config.assets_url));
        let text = match self.config.variant {
            Variant::Plain => body,
            Variant::Dated => self.wrap(&body, options),
        };

        let post = self.config.posts_directory.join(name.post_file_name());
        write_atomically(&post, &text)?;

        if exported != post {
            fs::remove_file(&exported)
                .map_err(|err| assets::Error::new("removing", &exported, err))?;
        }

        info!(
            post = %post.display(),
            rewritten,
            assets = bundle.is_some(),
            "converted notebook"
        );
        Ok(Converted {
            name,
            post,
            assets: bundle.map(|_| canonical),
            rewritten,
        })
    }

    fn post_name(&self, notebook: &Path, options: &ConvertOptions) -> Result<PostName> {
        let date = match self.config.variant {
            Variant::Plain => {
                if options.date.is_some() {
                    warn!("ignoring publish date for a plain conversion");
                }
                None
            }
            Variant::Dated => match options.date {
                Some(date) => Some(date),
                None => Some(
                    post::default_date(notebook)
                        .map_err(|err| assets::Error::new("reading metadata of", notebook, err))?,
                ),
            },
        };
        Ok(PostName::from_notebook(notebook, date)?)
    }

    /// Prepends the front-matter (`layout`, `published`, then `title` if
    /// given) and appends the mathjax include if enabled.
    fn wrap(&self, body: &str, options: &ConvertOptions) -> String {
        let mut fm = FrontMatter::new();
        fm.push("layout", options.layout.as_deref().unwrap_or(&self.config.layout));
        fm.push("published", frontmatter::yaml_bool(options.published));
        if let Some(title) = &options.title {
            fm.push("title", title.as_str());
        }
        let footer = match options.mathjax {
            true => Some(self.config.mathjax_include.as_str()),
            false => None,
        };
        frontmatter::wrap(&fm, body, footer)
    }
}

/// Moves an earlier run's `{stem}.md` to `.{stem}.md.previous` so that only a
/// file written by this export counts as exported.
fn set_aside(exported: &Path) -> Result<Option<PathBuf>> {
    if !exported.is_file() {
        return Ok(None);
    }
    let aside = hidden_sibling(exported, "previous");
    fs::rename(exported, &aside).map_err(|err| assets::Error::new("moving", exported, err))?;
    debug!(aside = %aside.display(), "set aside earlier export");
    Ok(Some(aside))
}

fn restore(aside: &Path, exported: &Path) {
    if let Err(err) = fs::rename(aside, exported) {
        warn!(
            aside = %aside.display(),
            error = %err,
            "failed to restore earlier export"
        );
    }
}

/// `dir/.{file name}.{suffix}`
fn hidden_sibling(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}", file_name, suffix))
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|err| Error::Filesystem(assets::Error::new("creating", dir, err)))
}

/// Writes `text` to `.{file name}.tmp` beside `path` and renames it over
/// `path`, so readers never see a half-written post.
fn write_atomically(path: &Path, text: &str) -> Result<()> {
    let tmp = hidden_sibling(path, "tmp");
    fs::write(&tmp, text).map_err(|err| assets::Error::new("writing", &tmp, err))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(assets::Error::new("writing", path, err).into());
    }
    Ok(())
}

/// The result of a conversion.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed conversion.
#[derive(Debug)]
pub enum Error {
    /// Returned when the notebook does not exist or is not a file.
    InputNotFound(PathBuf),

    /// Returned when the notebook's file name has no usable stem.
    InvalidFileName(InvalidFileNameError),

    /// Returned when the export tool fails. Nothing has been written yet.
    Export(export::Error),

    /// Returned when the export tool reported success but `{stem}.md` is not
    /// where its naming convention puts it.
    MissingExportedMarkdown(PathBuf),

    /// Returned for a failed read, write, move or delete. The conversion
    /// stops where it failed.
    Filesystem(assets::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InputNotFound(path) => {
                write!(f, "notebook `{}` not found", path.display())
            }
            Error::InvalidFileName(err) => err.fmt(f),
            Error::Export(err) => err.fmt(f),
            Error::MissingExportedMarkdown(path) => write!(
                f,
                "export succeeded but `{}` was not produced",
                path.display()
            ),
            Error::Filesystem(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InputNotFound(_) => None,
            Error::InvalidFileName(err) => Some(err),
            Error::Export(err) => Some(err),
            Error::MissingExportedMarkdown(_) => None,
            Error::Filesystem(err) => Some(err),
        }
    }
}

impl From<export::Error> for Error {
    /// Converts an [`export::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator when invoking the export tool.
    fn from(err: export::Error) -> Error {
        Error::Export(err)
    }
}

impl From<assets::Error> for Error {
    /// Converts an [`assets::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator for filesystem steps.
    fn from(err: assets::Error) -> Error {
        Error::Filesystem(err)
    }
}

impl From<InvalidFileNameError> for Error {
    /// Converts an [`InvalidFileNameError`] into an [`Error`].
    fn from(err: InvalidFileNameError) -> Error {
        Error::InvalidFileName(err)
    }
}
