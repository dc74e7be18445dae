//! Defines the [`Article`] type and the [`ArticleStore`], which reads articles
//! and their tag memberships from the data directory:
//!
//! ```text
//! {data}/articles/{name}/article      title on the first line, then the body
//! {data}/articles/{name}/more         optional continuation (or `resume`)
//! {data}/articles/{name}/comments/    see [`crate::comment`]
//! {data}/tags/{tag}/{name}            membership marker (file or symlink)
//! ```
//!
//! Article names are timestamps (`YYYYMMDDHHMM...`), so sorting names sorts
//! articles by recency. Listing operations never fail: a missing directory is
//! an empty listing and other read errors are logged and skipped.

use crate::comment::COMMENTS_DIRECTORY;
use chrono::NaiveDateTime;
use log::warn;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// The `strftime` format of the first [`ARTICLE_NAME_MINLEN`] characters of an
/// article name.
pub const ARTICLE_NAME_FORMAT: &str = "%Y%m%d%H%M";

/// The minimum length of an article name.
pub const ARTICLE_NAME_MINLEN: usize = 12;

const ARTICLES_DIRECTORY: &str = "articles";
const TAGS_DIRECTORY: &str = "tags";
const CONTENT_FILE: &str = "article";
const CONTINUATION_FILES: [&str; 2] = ["more", "resume"];

/// Returns whether `name` looks like an article name: a `19` or `20` century
/// prefix, at least [`ARTICLE_NAME_MINLEN`] characters, a parseable
/// timestamp, and nothing that could escape the articles directory.
pub fn is_article_name(name: &str) -> bool {
    name.len() >= ARTICLE_NAME_MINLEN
        && (name.starts_with("19") || name.starts_with("20"))
        && !name.contains(|c: char| c == '/' || c == '\\')
        && !name.contains("..")
        && parse_article_date(name).is_some()
}

/// Parses the publication date encoded in an article name.
pub fn parse_article_date(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.get(..ARTICLE_NAME_MINLEN)?;
    NaiveDateTime::parse_from_str(stamp, ARTICLE_NAME_FORMAT).ok()
}

/// A single blog post read from the article store.
#[derive(Clone, Debug, PartialEq)]
pub struct Article {
    /// The article's name, e.g., `200901010000`.
    pub name: String,

    /// The first line of the content file.
    pub title: String,

    /// The publication date, parsed from the name.
    pub date: NaiveDateTime,

    /// Everything after the title line. This is HTML and is emitted as-is.
    pub body: String,

    /// The continuation ("read more") content, if any.
    pub more: Option<String>,
}

/// Reads articles and tags from a data directory. Cloning is cheap; the store
/// only holds paths.
#[derive(Clone, Debug)]
pub struct ArticleStore {
    articles_directory: PathBuf,
    tags_directory: PathBuf,
    page_size: usize,
}

impl ArticleStore {
    /// Creates a store rooted at `data_directory`. `page_size` is the number of
    /// articles per index page and is clamped to at least one.
    pub fn new(data_directory: &Path, page_size: usize) -> ArticleStore {
        ArticleStore {
            articles_directory: data_directory.join(ARTICLES_DIRECTORY),
            tags_directory: data_directory.join(TAGS_DIRECTORY),
            page_size: page_size.max(1),
        }
    }

    /// The number of articles per index page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The directory holding everything that belongs to article `name`.
    pub fn article_directory(&self, name: &str) -> PathBuf {
        self.articles_directory.join(name)
    }

    /// Lists the article names under `tag` (or the whole corpus for `None`),
    /// newest first, skipping `offset` names and returning at most `limit`
    /// (unbounded for `None`).
    pub fn list_articles(
        &self,
        tag: Option<&str>,
        offset: usize,
        limit: Option<usize>,
    ) -> Vec<String> {
        let names = match tag {
            // tag directories hold markers; the corpus holds directories
            Some(tag) => entries(&self.tags_directory.join(tag), false),
            None => entries(&self.articles_directory, true),
        };
        names
            .into_iter()
            .rev()
            .filter(|name| is_article_name(name))
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Returns the number of articles under `tag` (or in the whole corpus).
    pub fn count_articles(&self, tag: Option<&str>) -> usize {
        self.list_articles(tag, 0, None).len()
    }

    /// Returns the number of index pages for `tag`: `ceil(count / page_size)`.
    pub fn total_pages(&self, tag: Option<&str>) -> usize {
        let count = self.count_articles(tag);
        match count % self.page_size {
            0 => count / self.page_size,
            _ => count / self.page_size + 1,
        }
    }

    /// Returns the index page on which `name` appears within `tag`'s listing,
    /// or `None` if the article isn't listed there.
    pub fn page_of(&self, tag: Option<&str>, name: &str) -> Option<usize> {
        self.list_articles(tag, 0, None)
            .iter()
            .position(|n| n == name)
            .map(|position| position / self.page_size)
    }

    /// Returns whether article `name` has a content file.
    pub fn exists(&self, name: &str) -> bool {
        is_article_name(name)
            && self
                .article_directory(name)
                .join(CONTENT_FILE)
                .is_file()
    }

    /// Reads article `name`. Unlike the listing operations, this fails with
    /// [`Error::NotFound`] when the content file doesn't exist.
    pub fn read_article(&self, name: &str) -> Result<Article> {
        let date = match is_article_name(name) {
            true => parse_article_date(name),
            false => None,
        }
        .ok_or_else(|| Error::NotFound(name.to_owned()))?;

        let directory = self.article_directory(name);
        let path = directory.join(CONTENT_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(name.to_owned()))
            }
            Err(err) => return Err(Error::Io { path, err }),
        };

        let (title, body) = match contents.split_once('\n') {
            Some((title, body)) => (title, body),
            None => (contents.as_str(), ""),
        };

        Ok(Article {
            name: name.to_owned(),
            title: title.trim_end_matches('\r').to_owned(),
            date,
            body: body.to_owned(),
            more: read_continuation(&directory),
        })
    }

    /// Returns the tags (alphabetical) whose directories reference `name`.
    /// An untagged article yields an empty list.
    pub fn read_article_tags(&self, name: &str) -> Vec<String> {
        entries(&self.tags_directory, true)
            .into_iter()
            .filter(|tag| {
                // `symlink_metadata` so a marker counts even if it dangles
                self.tags_directory
                    .join(tag)
                    .join(name)
                    .symlink_metadata()
                    .is_ok()
            })
            .collect()
    }

    /// Returns every non-empty tag, alphabetically, with its article count.
    pub fn list_tags(&self) -> Vec<(String, usize)> {
        entries(&self.tags_directory, true)
            .into_iter()
            .map(|tag| {
                let count = self.count_articles(Some(&tag));
                (tag, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Returns the time article `name` last changed: the latest modification
    /// time of its content file, its continuation, its comments directory, and
    /// each comment file. `None` if the content file is missing.
    pub fn modified(&self, name: &str) -> Option<SystemTime> {
        let directory = self.article_directory(name);
        let mut latest = mtime(&directory.join(CONTENT_FILE))?;
        for continuation in CONTINUATION_FILES.iter() {
            if let Some(t) = mtime(&directory.join(continuation)) {
                latest = latest.max(t);
            }
        }

        let comments = directory.join(COMMENTS_DIRECTORY);
        if let Some(t) = mtime(&comments) {
            latest = latest.max(t);
            for comment in entries(&comments, false) {
                if let Some(t) = mtime(&comments.join(comment)) {
                    latest = latest.max(t);
                }
            }
        }
        Some(latest)
    }
}

/// Lists the entry names of `dir` in ascending order, following symlinks and
/// skipping dot-files. Only directories are returned if `directories_only`.
/// A missing directory yields an empty list; other errors are logged.
pub(crate) fn entries(dir: &Path, directories_only: bool) -> Vec<String> {
    let mut names = Vec::new();
    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        match result {
            Ok(entry) => {
                if directories_only && !entry.file_type().is_dir() {
                    continue;
                }
                match entry.file_name().to_str() {
                    Some(name) if !name.starts_with('.') => {
                        names.push(name.to_owned())
                    }
                    _ => {}
                }
            }
            Err(err) => match err.io_error().map(io::Error::kind) {
                // missing directory or dangling marker
                Some(io::ErrorKind::NotFound) => {}
                _ => warn!("reading `{}`: {}", dir.display(), err),
            },
        }
    }
    names.sort();
    names
}

fn read_continuation(directory: &Path) -> Option<String> {
    for file_name in CONTINUATION_FILES.iter() {
        let path = directory.join(file_name);
        match fs::read_to_string(&path) {
            Ok(contents) => return Some(contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                warn!("reading `{}`: {}", path.display(), err);
                return None;
            }
        }
    }
    None
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// The result of a fallible article-store operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading an article.
#[derive(Debug)]
pub enum Error {
    /// Returned when the article name is malformed or its content file is
    /// missing.
    NotFound(String),

    /// Returned for other I/O errors reading the content file.
    Io { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(name) => write!(f, "article `{}` not found", name),
            Error::Io { path, err } => {
                write!(f, "reading `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound(_) => None,
            Error::Io { path: _, err } => Some(err),
        }
    }
}
