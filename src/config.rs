//! Loads the blog's configuration from `blog.yaml` and the theme description
//! from `theme/theme.yaml` next to it.
//!
//! ```yaml
//! site_name: My blog
//! description: Notes
//! base_url: https://example.org/blog/
//! author: { name: Jane, email: jane@example.org }
//! page_size: 5
//! ```

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file.
pub const PROJECT_FILE: &str = "blog.yaml";

/// The site's author, credited in feeds.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(5)
    }
}

#[derive(Deserialize)]
struct Threshold(usize);
impl Default for Threshold {
    fn default() -> Self {
        Threshold(10)
    }
}

#[derive(Deserialize)]
struct Project {
    site_name: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    copyright: Option<String>,
    base_url: Url,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default)]
    page_size: PageSize,

    #[serde(default)]
    tag_cloud_threshold: Threshold,

    #[serde(default = "default_data_directory")]
    data_directory: PathBuf,

    #[serde(default = "default_output_directory")]
    output_directory: PathBuf,

    #[serde(default = "default_fixpoint")]
    fixpoint: bool,
}

fn default_data_directory() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("public")
}

fn default_fixpoint() -> bool {
    true
}

#[derive(Deserialize)]
struct Theme {
    article_template: Vec<PathBuf>,
    index_template: Vec<PathBuf>,
    tags_template: Vec<PathBuf>,
}

/// The resolved configuration. Relative directories in the project file are
/// resolved against the project file's directory.
#[derive(Clone, Debug)]
pub struct Config {
    pub site_name: String,
    pub description: String,
    pub copyright: Option<String>,
    pub base_url: Url,
    pub author: Option<Author>,

    /// The number of articles per index page.
    pub page_size: usize,

    /// The percentage each article adds to its tag's size in the tag cloud.
    pub tag_cloud_threshold: usize,
    pub data_directory: PathBuf,
    pub output_directory: PathBuf,

    /// Whether generation repeats the queue drains until nothing new is
    /// discovered, or drains each queue once.
    pub fixpoint: bool,

    pub article_template: Vec<PathBuf>,
    pub index_template: Vec<PathBuf>,
    pub tags_template: Vec<PathBuf>,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for [`PROJECT_FILE`] and
    /// loads the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path)
                .with_context(|| format!("Loading configuration `{}`", path.display()))
        } else {
            match dir.parent() {
                Some(dir) => Config::from_directory(dir),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let project_root = match path.parent() {
            Some(root) => root,
            None => {
                return Err(anyhow!(
                    "Can't get parent directory for provided project file path '{:?}'",
                    path
                ))
            }
        };

        let theme_dir = project_root.join("theme");
        let theme_file = open(&theme_dir.join("theme.yaml"), "theme")?;
        let theme: Theme = serde_yaml::from_reader(theme_file)?;
        let in_theme = |relpaths: Vec<PathBuf>| -> Vec<PathBuf> {
            relpaths
                .iter()
                .map(|relpath| theme_dir.join(relpath))
                .collect()
        };

        if project.page_size.0 == 0 {
            return Err(anyhow!("`page_size` must be at least 1"));
        }

        Ok(Config {
            site_name: project.site_name,
            description: project.description,
            copyright: project.copyright,
            base_url: project.base_url,
            author: project.author,
            page_size: project.page_size.0,
            tag_cloud_threshold: project.tag_cloud_threshold.0,
            data_directory: project_root.join(project.data_directory),
            output_directory: project_root.join(project.output_directory),
            fixpoint: project.fixpoint,
            article_template: in_theme(theme.article_template),
            index_template: in_theme(theme.index_template),
            tags_template: in_theme(theme.tags_template),
        })
    }
}

fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}
