//! Loads the optional `nbpost.yaml` project file and resolves it, together
//! with built-in defaults, into a [`Config`].

use crate::assets::Replace;
use crate::post::Variant;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const PROJECT_FILE_NAME: &str = "nbpost.yaml";

const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 600;
const DEFAULT_LAYOUT: &str = "post";
const DEFAULT_MATHJAX_INCLUDE: &str = "{% include mathjax.html %}";

/// The on-disk shape of `nbpost.yaml`. Every field is optional.
#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct Project {
    variant: Option<Variant>,
    posts_directory: Option<PathBuf>,
    assets_directory: Option<PathBuf>,
    assets_url: Option<String>,
    staging_directory: Option<PathBuf>,
    export_command: Option<Vec<String>>,
    export_timeout_secs: Option<u64>,
    layout: Option<String>,
    mathjax_include: Option<String>,
    replace: Option<Replace>,
}

/// Resolved settings for one invocation. All paths are absolute or relative
/// to the process's working directory.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub variant: Variant,

    /// Where final posts are written (`_posts`).
    pub posts_directory: PathBuf,

    /// The parent of every canonical asset directory (`assets` for plain
    /// posts, `media` for dated ones).
    pub assets_directory: PathBuf,

    /// The public path prefix under which `assets_directory` is served.
    pub assets_url: String,

    /// Where dated conversions ask the export tool to write its output.
    pub staging_directory: PathBuf,

    /// The export program and its leading arguments.
    pub export_command: Vec<String>,

    pub export_timeout: Duration,

    /// The front-matter `layout` used when none is given on the command
    /// line.
    pub layout: String,

    /// The line appended to dated posts that render math.
    pub mathjax_include: String,

    pub replace: Replace,
}

impl Config {
    /// Searches `dir` and its ancestors for `nbpost.yaml`. If none is found,
    /// the built-in defaults are used relative to `dir`. `variant` overrides
    /// the project file's variant.
    pub fn from_directory(dir: &Path, variant: Option<Variant>) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(candidate) = current {
            let path = candidate.join(PROJECT_FILE_NAME);
            if path.is_file() {
                return Config::from_project_file(&path, variant)
                    .with_context(|| format!("Loading configuration `{}`", path.display()));
            }
            current = candidate.parent();
        }
        debug!(dir = %dir.display(), "no {} found; using defaults", PROJECT_FILE_NAME);
        Ok(Config::resolve(Project::default(), dir, variant))
    }

    /// Loads a specific project file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn from_project_file(path: &Path, variant: Option<Variant>) -> Result<Config> {
        let file = File::open(path)
            .map_err(|e| anyhow!("Opening project file `{}`: {}", path.display(), e))?;
        let project: Project = serde_yaml::from_reader(file)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(root) => Ok(Config::resolve(project, root, variant)),
        }
    }

    /// The defaults, rooted at `root`.
    pub fn defaults(root: &Path, variant: Variant) -> Config {
        Config::resolve(Project::default(), root, Some(variant))
    }

    fn resolve(project: Project, root: &Path, variant: Option<Variant>) -> Config {
        let variant = variant.or(project.variant).unwrap_or_default();
        let (assets_directory, assets_url) = match variant {
            Variant::Plain => ("assets", "/assets"),
            Variant::Dated => ("media", "/media"),
        };
        let join = |p: Option<PathBuf>, default: &str| root.join(p.unwrap_or_else(|| PathBuf::from(default)));

        Config {
            variant,
            posts_directory: join(project.posts_directory, "_posts"),
            assets_directory: join(project.assets_directory, assets_directory),
            assets_url: project.assets_url.unwrap_or_else(|| assets_url.to_owned()),
            staging_directory: join(project.staging_directory, "."),
            export_command: project
                .export_command
                .unwrap_or_else(|| vec!["jupyter".to_owned(), "nbconvert".to_owned()]),
            export_timeout: Duration::from_secs(
                project.export_timeout_secs.unwrap_or(DEFAULT_EXPORT_TIMEOUT_SECS),
            ),
            layout: project.layout.unwrap_or_else(|| DEFAULT_LAYOUT.to_owned()),
            mathjax_include: project
                .mathjax_include
                .unwrap_or_else(|| DEFAULT_MATHJAX_INCLUDE.to_owned()),
            replace: project.replace.unwrap_or_default(),
        }
    }
}
