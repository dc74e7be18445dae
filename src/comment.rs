//! Flat-file comments. Each comment is one file in
//! `{data}/articles/{name}/comments/`, named after the minute it was posted
//! plus a disambiguating suffix (`200901010000a`, `200901010000b`, ...), so
//! file-name order is posting order. A comment file is a block of headers, a
//! blank line, and the free-text body:
//!
//! ```text
//! Author: Jane
//! Ip: 192.0.2.1
//! Mail: jane@example.org
//! Web: https://example.org/
//!
//! Nice post!
//! ```

use crate::article::{self, parse_article_date, ArticleStore, ARTICLE_NAME_FORMAT};
use crate::escape::is_web_url;
use chrono::{Local, NaiveDateTime};
use log::{debug, warn};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The name of the per-article comments directory.
pub const COMMENTS_DIRECTORY: &str = "comments";

/// Maximum length in bytes of the author, mail, web, and IP fields.
pub const INPUT_LEN: usize = 128;

/// Maximum length in bytes of a comment body.
pub const TEXT_LEN: usize = 2048;

const LOCK_FILE: &str = ".lock";
const AUTHOR: &str = "Author: ";
const IP: &str = "Ip: ";
const MAIL: &str = "Mail: ";
const WEB: &str = "Web: ";

/// A comment read back from disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Comment {
    /// The 1-based position of the comment among the article's well-formed
    /// comments.
    pub number: usize,
    pub file_name: String,
    pub author: String,
    pub date: NaiveDateTime,
    pub ip: Option<String>,
    pub mail: Option<String>,
    pub web: Option<String>,
    pub body: String,
}

/// A comment as submitted, before validation. Empty optional fields are
/// omitted from the written file.
#[derive(Clone, Debug, Default)]
pub struct NewComment {
    pub author: String,
    pub mail: String,
    pub web: String,
    pub ip: String,
    pub body: String,
}

impl NewComment {
    /// Trims and truncates every field, failing if the author or the body is
    /// empty.
    fn sanitized(&self) -> Result<NewComment> {
        let author = single_line(&self.author);
        if author.is_empty() {
            return Err(Error::Validation("a name is required"));
        }
        let body = truncate(self.body.trim(), TEXT_LEN).to_owned();
        if body.is_empty() {
            return Err(Error::Validation("a comment is required"));
        }
        let web = single_line(&self.web);
        if !web.is_empty() && !is_web_url(&web) {
            return Err(Error::Validation("the homepage must be an http or https URL"));
        }
        Ok(NewComment {
            author,
            mail: single_line(&self.mail),
            web,
            ip: single_line(&self.ip),
            body,
        })
    }
}

/// Reads and appends comments for the articles of an [`ArticleStore`].
#[derive(Clone, Debug)]
pub struct CommentStore {
    store: ArticleStore,
}

impl CommentStore {
    pub fn new(store: ArticleStore) -> CommentStore {
        CommentStore { store }
    }

    fn directory(&self, article: &str) -> PathBuf {
        self.store
            .article_directory(article)
            .join(COMMENTS_DIRECTORY)
    }

    /// Appends a comment to `article`, returning the new comment's file name.
    /// See [`CommentStore::append_comment_at`].
    pub fn append_comment(
        &self,
        article: &str,
        comment: &NewComment,
    ) -> Result<String> {
        self.append_comment_at(article, comment, Local::now().naive_local())
    }

    /// Appends a comment to `article` as if posted at `now`. Concurrent
    /// appends to the same article are serialized by an exclusive lock on the
    /// comments directory's lock file, which is released when this returns.
    /// Within one minute, suffixes run `a`..`z`, then `za`..`zz`, `zza`, etc.
    pub fn append_comment_at(
        &self,
        article: &str,
        comment: &NewComment,
        now: NaiveDateTime,
    ) -> Result<String> {
        let comment = comment.sanitized()?;
        if !self.store.exists(article) {
            return Err(Error::NotFound(article.to_owned()));
        }

        let directory = self.directory(article);
        fs::create_dir_all(&directory).map_err(|err| Error::Io {
            path: directory.clone(),
            err,
        })?;
        let lock_path = directory.join(LOCK_FILE);
        let _lock = LockGuard::acquire(&lock_path).map_err(|err| Error::Io {
            path: lock_path.clone(),
            err,
        })?;

        let stamp = now.format(ARTICLE_NAME_FORMAT).to_string();
        let mut suffix = String::from("a");
        loop {
            let file_name = format!("{}{}", stamp, suffix);
            let path = directory.join(&file_name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let written = write_comment(&mut file, &comment)
                        .and_then(|_| file.sync_all());
                    if let Err(err) = written {
                        let _ = fs::remove_file(&path);
                        return Err(Error::Io { path, err });
                    }
                    debug!("wrote comment `{}`", path.display());
                    return Ok(file_name);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    suffix = next_suffix(&suffix)
                }
                Err(err) => return Err(Error::Io { path, err }),
            }
        }
    }

    /// Visits `article`'s well-formed comments (an author and a date parseable
    /// from the file name) oldest first, and returns how many there are. The
    /// count is the same whether or not a visitor is given.
    pub fn list_comments(
        &self,
        article: &str,
        visitor: Option<&mut dyn FnMut(Comment)>,
    ) -> usize {
        let mut visitor = visitor;
        let directory = self.directory(article);
        let mut count = 0;
        for file_name in article::entries(&directory, false) {
            let path = directory.join(&file_name);
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    warn!("reading `{}`: {}", path.display(), err);
                    continue;
                }
            };
            let mut comment = match parse_comment(&file_name, &contents) {
                Some(comment) => comment,
                None => {
                    debug!("skipping malformed comment `{}`", path.display());
                    continue;
                }
            };
            count += 1;
            if let Some(visit) = visitor.as_mut() {
                comment.number = count;
                visit(comment);
            }
        }
        count
    }

    /// Returns the number of well-formed comments on `article`.
    pub fn count_comments(&self, article: &str) -> usize {
        self.list_comments(article, None)
    }
}

/// Holds an exclusive advisory lock until dropped.
struct LockGuard(File);

impl LockGuard {
    fn acquire(path: &Path) -> io::Result<LockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock()?;
        Ok(LockGuard(file))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // closing the file releases the lock even if this fails
        let _ = self.0.unlock();
    }
}

fn write_comment<W: Write>(w: &mut W, comment: &NewComment) -> io::Result<()> {
    writeln!(w, "{}{}", AUTHOR, comment.author)?;
    writeln!(w, "{}{}", IP, comment.ip)?;
    if !comment.mail.is_empty() {
        writeln!(w, "{}{}", MAIL, comment.mail)?;
    }
    if !comment.web.is_empty() {
        writeln!(w, "{}{}", WEB, comment.web)?;
    }
    writeln!(w)?;
    w.write_all(comment.body.as_bytes())
}

fn parse_comment(file_name: &str, contents: &str) -> Option<Comment> {
    let date = parse_article_date(file_name)?;
    let mut author = None;
    let mut ip = None;
    let mut mail = None;
    let mut web = None;

    let mut rest = contents;
    loop {
        let (line, tail) = rest.split_once('\n').unwrap_or((rest, ""));
        rest = tail;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        let field = |prefix: &str| {
            line.strip_prefix(prefix)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };
        author = author.or_else(|| field(AUTHOR));
        ip = ip.or_else(|| field(IP));
        mail = mail.or_else(|| field(MAIL));
        web = web.or_else(|| field(WEB));
    }

    Some(Comment {
        number: 0,
        file_name: file_name.to_owned(),
        author: author?,
        date,
        ip,
        mail,
        web,
        body: rest.trim_end().to_owned(),
    })
}

/// Returns the suffix that follows `suffix`: the last letter increments, and
/// a trailing `z` lengthens the suffix instead (`z` -> `za`).
fn next_suffix(suffix: &str) -> String {
    let mut next = suffix.to_owned();
    match next.pop() {
        Some('z') => next.push_str("za"),
        Some(c) => next.push((c as u8 + 1) as char),
        None => next.push('a'),
    }
    next
}

fn single_line(s: &str) -> String {
    let line = s.lines().next().unwrap_or("").trim();
    truncate(line, INPUT_LEN).trim_end().to_owned()
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// The result of a fallible comment operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error posting a comment.
#[derive(Debug)]
pub enum Error {
    /// Returned when the submitted form is unacceptable. The message is meant
    /// for the submitter.
    Validation(&'static str),

    /// Returned when the article doesn't exist.
    NotFound(String),

    /// Returned for I/O errors creating, locking, or writing comment files.
    Io { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Validation(message) => message.fmt(f),
            Error::NotFound(name) => write!(f, "article `{}` not found", name),
            Error::Io { path, err } => {
                write!(f, "writing comment `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(_) => None,
            Error::NotFound(_) => None,
            Error::Io { path: _, err } => Some(err),
        }
    }
}
