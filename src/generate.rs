//! Exports the [`Generator`], which writes the static site. Pages are found
//! by following links: generation starts from the home page, and every page
//! rendered while discovery is on reports its links into two work queues
//! ([`DiscoveryQueues`]), one for index pages and one for article pages. Each
//! page is rendered at most once per run.
//!
//! Article pages start with a marker recording when the article (or one of
//! its comments) last changed, which is how [`Generator::update_all`] tells
//! stale pages apart.

use crate::article::ArticleStore;
use crate::config::Config;
use crate::page::{PageKind, TagPage};
use crate::queue::DiscoveryQueues;
use crate::render::{Error as RenderError, PageRenderer, Renderer};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use log::{debug, info, warn};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The `strftime` format of the modification marker, in UTC.
pub const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MARKER_BEGIN: &str = "<!-- modified: ";
const MARKER_END: &str = " -->";

/// Writes pages rendered by `R` into an output directory.
pub struct Generator<R> {
    renderer: R,
    store: ArticleStore,
    output_directory: PathBuf,
    queues: DiscoveryQueues,
    fixpoint: bool,
}

impl Generator<Renderer> {
    /// Creates a generator with a template [`Renderer`] for `config`.
    pub fn from_config(config: &Config) -> Result<Generator<Renderer>> {
        let renderer = Renderer::new(config)?;
        let store = renderer.store().clone();
        Ok(Generator::new(
            renderer,
            store,
            &config.output_directory,
            config.fixpoint,
        ))
    }
}

impl<R: PageRenderer> Generator<R> {
    /// Creates a generator. With `fixpoint`, [`Generator::generate_all`]
    /// keeps draining the queues until neither has pending pages; otherwise
    /// it drains each queue once.
    pub fn new(
        renderer: R,
        store: ArticleStore,
        output_directory: &Path,
        fixpoint: bool,
    ) -> Generator<R> {
        Generator {
            renderer,
            store,
            output_directory: output_directory.to_owned(),
            queues: DiscoveryQueues::new(),
            fixpoint,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Regenerates every page reachable from the home page, then the tag
    /// cloud.
    pub fn generate_all(&mut self) -> Result<()> {
        self.queues.clear();
        self.queues.follow = true;
        self.queues.tags.push(TagPage::new(None, 0));
        let drained = self.drain();
        self.queues.follow = false;
        drained?;
        self.generate_tag_cloud()
    }

    /// Regenerates the tag cloud. Its links aren't followed.
    pub fn generate_tag_cloud(&mut self) -> Result<()> {
        let follow = self.queues.follow;
        self.queues.follow = false;
        let written = self.write_page(&PageKind::TagCloud);
        self.queues.follow = follow;
        written.map(|_| ())
    }

    /// Regenerates the pages of every article whose page is missing or older
    /// than the article, as if each were new. Each index page is rendered at
    /// most once for the whole sweep, and the tag cloud is regenerated once
    /// if anything changed. Returns the number of articles updated.
    pub fn update_all(&mut self) -> Result<usize> {
        self.queues.clear();
        let mut updated = 0;
        for name in self.store.list_articles(None, 0, None) {
            if self.is_stale(&name) {
                self.update_article(&name, true)?;
                updated += 1;
            }
        }
        if updated > 0 {
            self.generate_tag_cloud()?;
        }
        Ok(updated)
    }

    /// Regenerates the pages that show article `name`: its own page and, for
    /// its tags and the global index, either every index page (`is_new`,
    /// since a new article shifts every later page) or only the page listing
    /// it (a new comment only changes that page's comment count). First index
    /// pages bring their feeds along. Other pages reached through links are
    /// not regenerated.
    pub fn update_one_article(&mut self, name: &str, is_new: bool) -> Result<()> {
        self.queues.clear();
        self.update_article(name, is_new)
    }

    fn update_article(&mut self, name: &str, is_new: bool) -> Result<()> {
        self.queues.follow = true;
        let result = self.regenerate_article(name, is_new);
        self.queues.discard_pending();
        self.queues.follow = false;
        result
    }

    fn regenerate_article(&mut self, name: &str, is_new: bool) -> Result<()> {
        if self.queues.articles.visit(name.to_owned()) {
            self.write_page(&PageKind::Article(name.to_owned()))?;
        }

        let mut tags: Vec<Option<String>> = self
            .store
            .read_article_tags(name)
            .into_iter()
            .map(Some)
            .collect();
        tags.push(None);

        for tag in tags {
            let pages: Vec<usize> = match is_new {
                true => (0..self.store.total_pages(tag.as_deref())).collect(),
                false => self.store.page_of(tag.as_deref(), name).into_iter().collect(),
            };
            for page in pages {
                let page = TagPage {
                    tag: tag.clone(),
                    page,
                };
                if self.queues.tags.visit(page.clone()) {
                    self.write_index(&page)?;
                }
            }
        }
        Ok(())
    }

    /// Drains the tag queue and then the article queue, repeating while
    /// rendering keeps discovering pages if `fixpoint` is set.
    fn drain(&mut self) -> Result<()> {
        loop {
            while let Some(page) = self.queues.tags.pop() {
                self.write_index(&page)?;
            }
            while let Some(name) = self.queues.articles.pop() {
                self.write_page(&PageKind::Article(name))?;
            }
            if self.queues.is_empty() {
                return Ok(());
            }
            if !self.fixpoint {
                debug!(
                    "leaving {} index and {} article pages undiscovered",
                    self.queues.tags.len(),
                    self.queues.articles.len()
                );
                return Ok(());
            }
        }
    }

    fn write_index(&mut self, page: &TagPage) -> Result<()> {
        self.write_page(&PageKind::Index(page.clone()))?;
        if page.page == 0 {
            self.write_page(&PageKind::Feed(page.tag.clone()))?;
        }
        Ok(())
    }

    /// Renders `kind` and writes it to its file. Returns `false` if the page
    /// was omitted.
    fn write_page(&mut self, kind: &PageKind) -> Result<bool> {
        let body = match self.renderer.render(kind, &mut self.queues)? {
            Some(body) => body,
            None => return Ok(false),
        };

        let path = self.output_directory.join(kind.file_name());
        info!("generating {}", path.display());
        fs::create_dir_all(&self.output_directory).map_err(|err| Error::Write {
            path: self.output_directory.clone(),
            err,
        })?;

        let mut contents = Vec::with_capacity(body.len() + 40);
        if let PageKind::Article(name) = kind {
            if let Some(modified) = self.store.modified(name) {
                contents.extend_from_slice(marker(modified).as_bytes());
            }
        }
        contents.extend_from_slice(&body);
        fs::write(&path, contents).map_err(|err| Error::Write { path, err })?;
        Ok(true)
    }

    /// Returns whether article `name`'s page is missing or its marker differs
    /// from the article's modification time.
    fn is_stale(&self, name: &str) -> bool {
        let modified = match self.store.modified(name) {
            Some(modified) => truncate(modified),
            None => return false,
        };
        let path = self
            .output_directory
            .join(PageKind::Article(name.to_owned()).file_name());
        match read_marker(&path) {
            Some(marker) => marker != modified,
            None => true,
        }
    }
}

fn truncate(time: SystemTime) -> NaiveDateTime {
    let time = DateTime::<Utc>::from(time).naive_utc();
    time.with_nanosecond(0).unwrap_or(time)
}

/// Formats the marker line for an article modified at `modified`.
fn marker(modified: SystemTime) -> String {
    format!(
        "{}{}{}\n",
        MARKER_BEGIN,
        truncate(modified).format(MODIFIED_FORMAT),
        MARKER_END
    )
}

/// Reads the marker from the first line of the page at `path`.
fn read_marker(path: &Path) -> Option<NaiveDateTime> {
    let mut line = String::new();
    let read = File::open(path).and_then(|file| BufReader::new(file).read_line(&mut line));
    match read {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!("reading `{}`: {}", path.display(), err);
            return None;
        }
    }
    let stamp = line
        .trim_end()
        .strip_prefix(MARKER_BEGIN)?
        .strip_suffix(MARKER_END)?;
    NaiveDateTime::parse_from_str(stamp, MODIFIED_FORMAT).ok()
}

/// The result of a fallible generation operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error generating pages. Generation stops at the first
/// error; pages written before it are kept.
#[derive(Debug)]
pub enum Error {
    /// Returned when a page can't be rendered.
    Render(RenderError),

    /// Returned for I/O errors writing output files.
    Write { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Render(err) => err.fmt(f),
            Error::Write { path, err } => {
                write!(f, "Writing '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Render(err) => Some(err),
            Error::Write { path: _, err } => Some(err),
        }
    }
}

impl From<RenderError> for Error {
    /// Converts [`RenderError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: RenderError) -> Error {
        Error::Render(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::queue::PageDiscoverySink;
    use crate::render::Result as RenderResult;
    use crate::testutil::Fixture;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    /// Counts the renders of each page.
    struct Counting<R> {
        inner: R,
        counts: HashMap<PageKind, usize>,
    }

    impl<R> Counting<R> {
        fn new(inner: R) -> Counting<R> {
            Counting {
                inner,
                counts: HashMap::new(),
            }
        }

        fn rendered(&self) -> HashSet<PageKind> {
            self.counts.keys().cloned().collect()
        }

        fn assert_rendered_once(&self) {
            for (kind, count) in &self.counts {
                assert_eq!(1, *count, "{:?} rendered {} times", kind, count);
            }
        }
    }

    impl<R: PageRenderer> PageRenderer for Counting<R> {
        fn render(
            &mut self,
            kind: &PageKind,
            sink: &mut dyn PageDiscoverySink,
        ) -> RenderResult<Option<Vec<u8>>> {
            *self.counts.entry(kind.clone()).or_insert(0) += 1;
            self.inner.render(kind, sink)
        }
    }

    /// Renders every page as its name and discovers a fixed set of links per
    /// page.
    struct Scripted {
        links: HashMap<PageKind, Vec<PageKind>>,
    }

    impl PageRenderer for Scripted {
        fn render(
            &mut self,
            kind: &PageKind,
            sink: &mut dyn PageDiscoverySink,
        ) -> RenderResult<Option<Vec<u8>>> {
            for link in self.links.get(kind).into_iter().flatten() {
                match link {
                    PageKind::Index(TagPage { tag, page }) => sink.on_tag_page(tag.as_deref(), *page),
                    PageKind::Article(name) => sink.on_article_page(name),
                    _ => {}
                }
            }
            Ok(Some(kind.file_name().into_bytes()))
        }
    }

    fn articles(fixture: &Fixture, count: usize) -> Vec<String> {
        (1..=count)
            .map(|day| {
                let name = format!("200901{:02}0000", day);
                fixture.article(&name, &format!("Article {}", day), "<p>body</p>");
                name
            })
            .collect()
    }

    fn counting_generator(fixture: &Fixture, page_size: usize) -> Generator<Counting<Renderer>> {
        let config = fixture.config(page_size);
        let renderer = Renderer::new(&config).unwrap();
        Generator::new(
            Counting::new(renderer),
            fixture.store(page_size),
            &config.output_directory,
            config.fixpoint,
        )
    }

    fn output_files(fixture: &Fixture) -> HashSet<String> {
        fs::read_dir(fixture.out())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect()
    }

    #[test]
    fn test_generate_all_page_counts() -> Result<()> {
        const PAGE_SIZE: usize = 2;
        for &count in &[0, 1, PAGE_SIZE, PAGE_SIZE + 1, 2 * PAGE_SIZE] {
            let fixture = Fixture::new();
            let names = articles(&fixture, count);
            let mut generator = counting_generator(&fixture, PAGE_SIZE);
            generator.generate_all()?;
            generator.renderer().assert_rendered_once();

            let mut expected: HashSet<String> =
                names.iter().map(|name| format!("{}.html", name)).collect();
            expected.insert(String::from("index.html"));
            for page in 1..(count + PAGE_SIZE - 1) / PAGE_SIZE {
                expected.insert(format!("index-{}.html", page));
            }
            expected.insert(String::from("rss.xml"));
            expected.insert(String::from("tags.html"));
            assert_eq!(expected, output_files(&fixture), "{} articles", count);
        }
        Ok(())
    }

    #[test]
    fn test_generate_all_tags() -> Result<()> {
        let fixture = Fixture::new();
        let names = articles(&fixture, 5);
        for name in &names {
            fixture.tag("all", name);
        }
        fixture.tag("two words", &names[0]);
        let mut generator = counting_generator(&fixture, 2);
        generator.generate_all()?;
        generator.renderer().assert_rendered_once();

        let files = output_files(&fixture);
        for file in &[
            "index_all.html",
            "index_all-1.html",
            "index_all-2.html",
            "rss_all.xml",
            "index_two words.html",
            "rss_two words.xml",
        ] {
            assert!(files.contains(*file), "missing {}", file);
        }
        assert!(!files.contains("index_all-3.html"));

        let article = fs::read_to_string(fixture.out().join("200901050000.html")).unwrap();
        assert!(article.starts_with(MARKER_BEGIN));
        Ok(())
    }

    #[test]
    fn test_similar_tags_keep_their_own_pages() -> Result<()> {
        let fixture = Fixture::new();
        let names = articles(&fixture, 3);
        fixture.tag("C++", &names[0]);
        fixture.tag("c", &names[1]);
        fixture.tag("c-1", &names[2]);
        let mut generator = counting_generator(&fixture, 1);
        generator.generate_all()?;
        generator.renderer().assert_rendered_once();

        let files = output_files(&fixture);
        for file in &[
            "index_C++.html",
            "rss_C++.xml",
            "index_c.html",
            "rss_c.xml",
            "index_c%2D1.html",
            "rss_c%2D1.xml",
        ] {
            assert!(files.contains(*file), "missing {}", file);
        }

        let read = |file: &str| fs::read_to_string(fixture.out().join(file)).unwrap();
        let cpp = read("index_C++.html");
        assert!(cpp.contains("Article 1") && !cpp.contains("Article 2"));
        let c = read("index_c.html");
        assert!(c.contains("Article 2") && !c.contains("Article 1"));
        let c1 = read("index_c%2D1.html");
        assert!(c1.contains("Article 3") && !c1.contains("Article 2"));
        assert!(read(&format!("{}.html", names[2])).contains("https://example.org/index_c%252D1.html"));
        Ok(())
    }

    #[test]
    fn test_single_pass_vs_fixpoint() -> Result<()> {
        let mut links = HashMap::new();
        links.insert(
            PageKind::index(None, 0),
            vec![PageKind::Article(String::from("200901010000"))],
        );
        links.insert(
            PageKind::Article(String::from("200901010000")),
            vec![PageKind::index(Some("late"), 0), PageKind::index(None, 0)],
        );
        links.insert(
            PageKind::index(Some("late"), 0),
            vec![PageKind::Article(String::from("200902020000"))],
        );

        for &(fixpoint, expected) in &[(false, 4), (true, 7)] {
            let fixture = Fixture::new();
            let renderer = Counting::new(Scripted {
                links: links.clone(),
            });
            let mut generator = Generator::new(renderer, fixture.store(2), &fixture.out(), fixpoint);
            generator.generate_all()?;
            generator.renderer().assert_rendered_once();
            // index, rss, article, tags; then the late tag page, its feed,
            // and the article it links to
            assert_eq!(expected, generator.renderer().counts.len(), "fixpoint {}", fixpoint);
        }
        Ok(())
    }

    #[test]
    fn test_update_comment_vs_new_article() -> Result<()> {
        let fixture = Fixture::new();
        let names = articles(&fixture, 5);
        fixture.tag("rust", &names[2]);
        fixture.tag("rust", &names[0]);
        let updated = &names[2];

        let mut generator = counting_generator(&fixture, 2);
        generator.update_one_article(updated, false)?;
        let expected: HashSet<PageKind> = vec![
            PageKind::Article(updated.clone()),
            PageKind::index(None, 1),
            PageKind::index(Some("rust"), 0),
            PageKind::feed(Some("rust")),
        ]
        .into_iter()
        .collect();
        assert_eq!(expected, generator.renderer().rendered());

        let mut generator = counting_generator(&fixture, 2);
        generator.update_one_article(updated, true)?;
        let expected: HashSet<PageKind> = vec![
            PageKind::Article(updated.clone()),
            PageKind::index(None, 0),
            PageKind::index(None, 1),
            PageKind::index(None, 2),
            PageKind::feed(None),
            PageKind::index(Some("rust"), 0),
            PageKind::feed(Some("rust")),
        ]
        .into_iter()
        .collect();
        assert_eq!(expected, generator.renderer().rendered());
        generator.renderer().assert_rendered_once();
        Ok(())
    }

    #[test]
    fn test_update_all_regenerates_stale_articles() -> Result<()> {
        let fixture = Fixture::new();
        let names = articles(&fixture, 5);
        counting_generator(&fixture, 2).generate_all()?;

        let mut generator = counting_generator(&fixture, 2);
        assert_eq!(0, generator.update_all()?);
        assert!(generator.renderer().counts.is_empty());

        // a new comment makes the article newer than its page
        let comment = format!("articles/{}/comments/200901050101a", names[4]);
        fixture.write(&comment, "Author: x\n\nhi");
        fixture.touch(&fixture.path(&comment), SystemTime::now() + Duration::from_secs(3600));
        // and a missing page is stale too
        fs::remove_file(fixture.out().join(format!("{}.html", names[3]))).unwrap();

        let mut generator = counting_generator(&fixture, 2);
        assert_eq!(2, generator.update_all()?);
        generator.renderer().assert_rendered_once();
        let rendered = generator.renderer().rendered();
        assert!(rendered.contains(&PageKind::Article(names[4].clone())));
        assert!(rendered.contains(&PageKind::Article(names[3].clone())));
        assert!(!rendered.contains(&PageKind::Article(names[2].clone())));
        assert!(rendered.contains(&PageKind::index(None, 2)));
        assert!(rendered.contains(&PageKind::TagCloud));

        assert_eq!(0, generator.update_all()?);
        Ok(())
    }

    #[test]
    fn test_read_marker() {
        let fixture = Fixture::new();
        let path = fixture.path("page.html");
        assert_eq!(None, read_marker(&path));

        fixture.write("page.html", "<!-- modified: 2009-01-02 03:04:05 -->\n<html>");
        assert_eq!(
            NaiveDateTime::parse_from_str("2009-01-02 03:04:05", MODIFIED_FORMAT).ok(),
            read_marker(&path)
        );

        fixture.write("page.html", "<!-- modified: yesterday -->\n<html>");
        assert_eq!(None, read_marker(&path));

        let now = SystemTime::now();
        fixture.write("page.html", &marker(now));
        assert_eq!(Some(truncate(now)), read_marker(&path));
    }
}
