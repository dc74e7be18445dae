//! Names the pages of the static site and builds links between them.
//!
//! | page                     | file                        |
//! |--------------------------|-----------------------------|
//! | global index, page `k`   | `index.html`, `index-k.html` |
//! | tag index, page `k`      | `index_{tag}.html`, `index_{tag}-k.html` |
//! | article                  | `{name}.html`               |
//! | feed                     | `rss.xml`, `rss_{tag}.xml`  |
//! | tag cloud                | `tags.html`                 |
//!
//! Tag names appear in file names as they are, except that `%` and `-` are
//! percent-encoded so the page suffix stays unambiguous and distinct tags
//! never share a file. URLs percent-encode file names once more.

use crate::article::is_article_name;
use crate::queue::PageDiscoverySink;
use url::Url;

/// One page of a tag's index. `tag` is `None` for the global index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagPage {
    pub tag: Option<String>,
    pub page: usize,
}

impl TagPage {
    pub fn new(tag: Option<&str>, page: usize) -> TagPage {
        TagPage {
            tag: tag.map(str::to_owned),
            page,
        }
    }
}

/// Identifies a page of the site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PageKind {
    Index(TagPage),
    Article(String),
    Feed(Option<String>),
    TagCloud,
}

impl PageKind {
    pub fn index(tag: Option<&str>, page: usize) -> PageKind {
        PageKind::Index(TagPage::new(tag, page))
    }

    pub fn feed(tag: Option<&str>) -> PageKind {
        PageKind::Feed(tag.map(str::to_owned))
    }

    /// Returns the page's output file name.
    pub fn file_name(&self) -> String {
        match self {
            PageKind::Index(TagPage { tag, page }) => {
                let mut name = String::from("index");
                if let Some(tag) = tag {
                    name.push('_');
                    name.push_str(&tag_file_name(tag));
                }
                if *page > 0 {
                    name.push_str(&format!("-{}", page));
                }
                name.push_str(".html");
                name
            }
            PageKind::Article(name) => format!("{}.html", name),
            PageKind::Feed(Some(tag)) => format!("rss_{}.xml", tag_file_name(tag)),
            PageKind::Feed(None) => String::from("rss.xml"),
            PageKind::TagCloud => String::from("tags.html"),
        }
    }

    /// Parses an output file name (with or without its extension) back into a
    /// page. Tags are resolved against `tags`; unknown tags, unknown names,
    /// and malformed page numbers yield `None`.
    pub fn parse(file_name: &str, tags: &[String]) -> Option<PageKind> {
        let stem = file_name
            .strip_suffix(".html")
            .or_else(|| file_name.strip_suffix(".xml"))
            .unwrap_or(file_name);
        let find_tag = |encoded: &str| {
            tags.iter()
                .find(|tag| tag_file_name(tag) == encoded)
                .cloned()
        };

        if stem == "tags" {
            return Some(PageKind::TagCloud);
        }
        if stem == "rss" {
            return Some(PageKind::Feed(None));
        }
        if let Some(encoded) = stem.strip_prefix("rss_") {
            return find_tag(encoded).map(|tag| PageKind::Feed(Some(tag)));
        }
        if stem == "index" {
            return Some(PageKind::index(None, 0));
        }
        if let Some(page) = stem.strip_prefix("index-") {
            return page_number(page).map(|page| PageKind::index(None, page));
        }
        if let Some(rest) = stem.strip_prefix("index_") {
            let (encoded, page) = match rest.split_once('-') {
                Some((encoded, page)) => (encoded, page_number(page)?),
                None => (rest, 0),
            };
            return find_tag(encoded).map(|tag| PageKind::Index(TagPage { tag: Some(tag), page }));
        }
        match is_article_name(stem) {
            true => Some(PageKind::Article(stem.to_owned())),
            false => None,
        }
    }
}

/// Encodes a tag name for use in a file name.
fn tag_file_name(tag: &str) -> String {
    let mut encoded = String::with_capacity(tag.len());
    for c in tag.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '-' => encoded.push_str("%2D"),
            c => encoded.push(c),
        }
    }
    encoded
}

fn page_number(s: &str) -> Option<usize> {
    match s.parse() {
        Ok(page) if page > 0 && !s.starts_with('0') => Some(page),
        _ => None,
    }
}

/// Builds absolute page URLs below the site's base URL.
#[derive(Clone, Debug)]
pub struct Linker {
    base_url: Url,
}

impl Linker {
    /// Creates a linker for `base_url`, adding a trailing slash to its path if
    /// it doesn't have one so page names resolve below it.
    pub fn new(base_url: &Url) -> Linker {
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Linker { base_url }
    }

    /// Returns the URL of `kind` without reporting it.
    pub fn url(&self, kind: &PageKind) -> String {
        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(&kind.file_name());
            }
            Err(()) => return format!("{}{}", self.base_url, kind.file_name()),
        }
        url.into()
    }

    /// Returns the URL of `kind`, reporting links to index and article pages
    /// to `sink`.
    pub fn link(&self, kind: &PageKind, sink: &mut dyn PageDiscoverySink) -> String {
        match kind {
            PageKind::Index(TagPage { tag, page }) => sink.on_tag_page(tag.as_deref(), *page),
            PageKind::Article(name) => sink.on_article_page(name),
            PageKind::Feed(_) | PageKind::TagCloud => {}
        }
        self.url(kind)
    }
}
