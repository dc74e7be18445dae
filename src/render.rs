//! Renders single pages. [`Renderer`] applies the theme's templates to the
//! article and comment stores and reports every link it emits to a
//! [`PageDiscoverySink`], which is how the static generator finds the pages
//! that depend on a change.
//!
//! Each template sees these site values:
//!
//! * `site_name`, `description`, `copyright`
//! * `title`: the site name, followed by the page's own title if it has one
//! * `home_url`, `tags_url`, `feed_url`, `feed_title`
//!
//! Index pages add `articles` (summaries, see [`crate::value::ArticleView`]),
//! `tag`, `page`, `next` and `previous`. Article pages add `article`,
//! `comments` and `comment_count`. The tag cloud adds `tags`.

use crate::article::{self, Article, ArticleStore};
use crate::comment::{Comment, CommentStore};
use crate::config::{Author, Config};
use crate::feed::{write_feed, Error as FeedError, FeedConfig, FeedEntry};
use crate::page::{Linker, PageKind, TagPage};
use crate::queue::PageDiscoverySink;
use crate::tag::{CloudTag, Tag};
use crate::value::{object, optional, ArticleView};
use gtmpl::{Template, Value};
use log::warn;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Renders one page of the site.
pub trait PageRenderer {
    /// Renders `kind`, reporting the pages it links to to `sink`. Returns
    /// `Ok(None)` if the page has no content: a missing article, an empty tag,
    /// or an index page past the last one.
    fn render(
        &mut self,
        kind: &PageKind,
        sink: &mut dyn PageDiscoverySink,
    ) -> Result<Option<Vec<u8>>>;
}

/// Renders pages with `gtmpl` templates.
pub struct Renderer {
    store: ArticleStore,
    comments: CommentStore,
    linker: Linker,
    site_name: String,
    description: String,
    copyright: Option<String>,
    author: Option<Author>,
    tag_cloud_threshold: usize,
    article_template: Template,
    index_template: Template,
    tags_template: Template,
}

impl Renderer {
    /// Creates a renderer from `config`, loading and parsing its templates.
    pub fn new(config: &Config) -> Result<Renderer> {
        let store = ArticleStore::new(&config.data_directory, config.page_size);
        Ok(Renderer {
            comments: CommentStore::new(store.clone()),
            store,
            linker: Linker::new(&config.base_url),
            site_name: config.site_name.clone(),
            description: config.description.clone(),
            copyright: config.copyright.clone(),
            author: config.author.clone(),
            tag_cloud_threshold: config.tag_cloud_threshold,
            article_template: parse_template(config.article_template.iter())?,
            index_template: parse_template(config.index_template.iter())?,
            tags_template: parse_template(config.tags_template.iter())?,
        })
    }

    /// The article store pages are rendered from.
    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    fn feed_title(&self, tag: Option<&str>) -> String {
        match tag {
            Some(tag) => format!("{} RSS - tag:{}", self.site_name, tag),
            None => format!("{} RSS", self.site_name),
        }
    }

    fn site_values(
        &self,
        title: Option<&str>,
        tag: Option<&str>,
        sink: &mut dyn PageDiscoverySink,
    ) -> Vec<(&'static str, Value)> {
        let title = match title {
            Some(title) => format!("{} - {}", self.site_name, title),
            None => self.site_name.clone(),
        };
        vec![
            ("site_name", Value::String(self.site_name.clone())),
            ("description", Value::String(self.description.clone())),
            ("copyright", optional(self.copyright.clone())),
            ("title", Value::String(title)),
            (
                "home_url",
                Value::String(self.linker.link(&PageKind::index(None, 0), sink)),
            ),
            ("tags_url", Value::String(self.linker.url(&PageKind::TagCloud))),
            ("feed_url", Value::String(self.linker.url(&PageKind::feed(tag)))),
            ("feed_title", Value::String(self.feed_title(tag))),
        ]
    }

    fn tag_link(&self, name: String, sink: &mut dyn PageDiscoverySink) -> Tag {
        Tag {
            url: self.linker.link(&PageKind::index(Some(&name), 0), sink),
            name,
        }
    }

    /// Builds the view of `article`: in `full` with its continuation, or as a
    /// summary linking to the continuation.
    fn article_view(
        &self,
        article: &Article,
        full: bool,
        sink: &mut dyn PageDiscoverySink,
    ) -> ArticleView {
        let url = self
            .linker
            .link(&PageKind::Article(article.name.clone()), sink);
        let tags = self
            .store
            .read_article_tags(&article.name)
            .into_iter()
            .map(|tag| self.tag_link(tag, sink))
            .collect();
        let (body, more_url) = match (&article.more, full) {
            (Some(more), true) => (format!("{}{}", article.body, more), None),
            (Some(_), false) => (article.body.clone(), Some(url.clone())),
            (None, _) => (article.body.clone(), None),
        };
        ArticleView {
            name: article.name.clone(),
            title: article.title.clone(),
            date: article.date,
            url,
            body,
            more_url,
            tags,
            comment_count: self.comments.count_comments(&article.name),
        }
    }

    /// Reads one page of `tag`'s articles, starting at `offset`, skipping any
    /// that can't be read.
    fn listed_articles(&self, tag: Option<&str>, offset: usize) -> Vec<Article> {
        self.store
            .list_articles(tag, offset, Some(self.store.page_size()))
            .iter()
            .filter_map(|name| match self.store.read_article(name) {
                Ok(article) => Some(article),
                Err(err) => {
                    warn!("{}", err);
                    None
                }
            })
            .collect()
    }

    fn render_index(
        &self,
        index: &TagPage,
        sink: &mut dyn PageDiscoverySink,
    ) -> Result<Option<Vec<u8>>> {
        let tag = index.tag.as_deref();
        let page = index.page;
        let total = self.store.count_articles(tag);
        let page_size = self.store.page_size();

        let offset = match page.checked_mul(page_size) {
            Some(offset) if offset < total => offset,
            // the first global page is the home page and always exists
            _ if tag.is_none() && page == 0 => 0,
            _ => {
                warn!("omitting empty index page {:?} {}", tag, page);
                return Ok(None);
            }
        };

        let articles: Vec<Value> = self
            .listed_articles(tag, offset)
            .iter()
            .map(|article| Value::from(&self.article_view(article, false, sink)))
            .collect();
        let next = match page > 0 {
            true => Some(self.linker.link(&PageKind::index(tag, page - 1), sink)),
            false => None,
        };
        let previous = match total - offset > page_size {
            true => Some(self.linker.link(&PageKind::index(tag, page + 1), sink)),
            false => None,
        };

        let title = tag.map(|tag| format!("tag:{}", tag));
        let mut fields = self.site_values(title.as_deref(), tag, sink);
        fields.push(("articles", Value::Array(articles)));
        fields.push(("tag", optional(tag.map(str::to_owned))));
        fields.push(("page", Value::String(page.to_string())));
        fields.push(("next", optional(next)));
        fields.push(("previous", optional(previous)));
        execute(&self.index_template, fields).map(Some)
    }

    fn render_article(
        &self,
        name: &str,
        sink: &mut dyn PageDiscoverySink,
    ) -> Result<Option<Vec<u8>>> {
        let article = match self.store.read_article(name) {
            Ok(article) => article,
            Err(article::Error::NotFound(_)) => {
                warn!("omitting missing article `{}`", name);
                return Ok(None);
            }
            Err(err) => return Err(Error::Article(err)),
        };

        let view = self.article_view(&article, true, sink);
        let mut comments = Vec::new();
        let count = self.comments.list_comments(
            name,
            Some(&mut |comment: Comment| comments.push(Value::from(&comment))),
        );

        let mut fields = self.site_values(Some(&article.title), None, sink);
        fields.push(("article", Value::from(&view)));
        fields.push(("comments", Value::Array(comments)));
        fields.push(("comment_count", Value::String(count.to_string())));
        execute(&self.article_template, fields).map(Some)
    }

    fn render_feed(
        &self,
        tag: Option<&str>,
        sink: &mut dyn PageDiscoverySink,
    ) -> Result<Option<Vec<u8>>> {
        if tag.is_some() && self.store.count_articles(tag) == 0 {
            warn!("omitting feed of empty tag {:?}", tag);
            return Ok(None);
        }

        let entries: Vec<FeedEntry> = self
            .listed_articles(tag, 0)
            .into_iter()
            .map(|article| FeedEntry {
                url: self
                    .linker
                    .link(&PageKind::Article(article.name.clone()), sink),
                tags: self.store.read_article_tags(&article.name),
                has_more: article.more.is_some(),
                name: article.name,
                title: article.title,
                date: article.date,
                body: article.body,
            })
            .collect();

        let mut out = Vec::new();
        write_feed(
            FeedConfig {
                title: self.feed_title(tag),
                description: self.description.clone(),
                author: self.author.as_ref(),
                home_page: self.linker.url(&PageKind::index(tag, 0)),
            },
            &entries,
            &mut out,
        )?;
        Ok(Some(out))
    }

    fn render_tag_cloud(&self, sink: &mut dyn PageDiscoverySink) -> Result<Option<Vec<u8>>> {
        let tags: Vec<Value> = self
            .store
            .list_tags()
            .into_iter()
            .map(|(name, count)| {
                let tag = self.tag_link(name, sink);
                Value::from(&CloudTag::new(tag, count, self.tag_cloud_threshold))
            })
            .collect();

        let mut fields = self.site_values(Some("tags"), None, sink);
        fields.push(("tags", Value::Array(tags)));
        execute(&self.tags_template, fields).map(Some)
    }
}

impl PageRenderer for Renderer {
    fn render(
        &mut self,
        kind: &PageKind,
        sink: &mut dyn PageDiscoverySink,
    ) -> Result<Option<Vec<u8>>> {
        match kind {
            PageKind::Index(index) => self.render_index(index, sink),
            PageKind::Article(name) => self.render_article(name, sink),
            PageKind::Feed(tag) => self.render_feed(tag.as_deref(), sink),
            PageKind::TagCloud => self.render_tag_cloud(sink),
        }
    }
}

fn execute(template: &Template, fields: Vec<(&str, Value)>) -> Result<Vec<u8>> {
    let context = gtmpl::Context::from(object(fields))?;
    let mut out = Vec::new();
    template.execute(&mut out, &context)?;
    Ok(out)
}

// Loads the template file contents, concatenates them, and parses the result
// into a template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(&template_file)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|err| Error::Io {
                path: template_file.to_owned(),
                err,
            })?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template.parse(&contents)?;
    Ok(template)
}

/// The result of a fallible rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error rendering a page.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors parsing or executing templates.
    Template(String),

    /// Returned for I/O problems reading template files.
    Io { path: PathBuf, err: io::Error },

    /// Returned for errors writing a feed.
    Feed(FeedError),

    /// Returned when an article exists but can't be read.
    Article(article::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => write!(f, "Template error: {}", err),
            Error::Io { path, err } => {
                write!(f, "Reading template file '{}': {}", path.display(), err)
            }
            Error::Feed(err) => err.fmt(f),
            Error::Article(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(_) => None,
            Error::Io { path: _, err } => Some(err),
            Error::Feed(err) => Some(err),
            Error::Article(err) => Some(err),
        }
    }
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the `?`
    /// operator when writing feeds.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}
