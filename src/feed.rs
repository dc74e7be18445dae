//! Support for creating RSS 2.0 feeds from a list of articles.

use crate::config::Author;
use crate::escape::EscapeHref;
use chrono::{NaiveDateTime, TimeZone, Utc};
use rss::{Category, Channel, Error as RssError, Guid, Item};
use std::fmt;
use std::io::Write;

/// The text of the link to an article's continuation.
pub const READ_MORE: &str = "Read more...";

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: String,
    pub description: String,
    pub author: Option<&'a Author>,
    pub home_page: String,
}

/// One article of a feed.
pub struct FeedEntry {
    /// The article's name, used as its `guid`.
    pub name: String,
    pub url: String,
    pub title: String,
    pub date: NaiveDateTime,

    /// The article body, as HTML.
    pub body: String,

    /// Whether the article has a continuation, in which case the description
    /// ends with a link to the article.
    pub has_more: bool,
    pub tags: Vec<String>,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// [`FeedEntry`]s and writes the result to a [`std::io::Write`]. The channel's
/// `pubDate` is that of the newest entry, so an unchanged corpus produces an
/// identical feed.
pub fn write_feed<W: Write>(config: FeedConfig, entries: &[FeedEntry], w: W) -> Result<()> {
    channel(config, entries).write_to(w)?;
    Ok(())
}

fn channel(config: FeedConfig, entries: &[FeedEntry]) -> Channel {
    let author = config.author;
    let pub_date = entries
        .iter()
        .map(|entry| entry.date)
        .max()
        .map(rfc2822)
        .unwrap_or_else(|| Utc::now().to_rfc2822());

    let mut channel = Channel::default();
    channel.set_title(config.title);
    channel.set_link(config.home_page);
    channel.set_description(config.description);
    channel.set_pub_date(Some(pub_date));
    channel.set_managing_editor(author.and_then(mailbox));
    channel.set_items(
        entries
            .iter()
            .map(|entry| item(author, entry))
            .collect::<Vec<Item>>(),
    );
    channel
}

fn item(author: Option<&Author>, article: &FeedEntry) -> Item {
    let mut description = article.body.clone();
    if article.has_more {
        description.push_str(&format!(
            r#"<a href="{}">{}</a>"#,
            EscapeHref(&article.url),
            READ_MORE
        ));
    }

    let mut guid = Guid::default();
    guid.set_value(article.name.clone());
    guid.set_permalink(false);

    let mut item = Item::default();
    item.set_title(Some(article.title.clone()));
    item.set_link(Some(article.url.clone()));
    item.set_description(Some(description));
    item.set_author(author.and_then(mailbox));
    item.set_pub_date(Some(rfc2822(article.date)));
    item.set_guid(Some(guid));
    item.set_categories(
        article
            .tags
            .iter()
            .map(|tag| {
                let mut category = Category::default();
                category.set_name(tag.clone());
                category
            })
            .collect::<Vec<Category>>(),
    );
    item
}

/// Article dates carry no zone; they are published as UTC.
fn rfc2822(date: NaiveDateTime) -> String {
    Utc.from_utc_datetime(&date).to_rfc2822()
}

/// RSS names people by mail address, so authors without one are left out.
fn mailbox(author: &Author) -> Option<String> {
    author
        .email
        .as_ref()
        .map(|email| format!("{} ({})", email, author.name))
}

/// The result of a fallible feed operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem writing a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an RSS-related error, including I/O errors
    /// writing the document.
    Rss(RssError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Rss(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Rss(err) => Some(err),
        }
    }
}

impl From<RssError> for Error {
    /// Converts [`RssError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: RssError) -> Error {
        Error::Rss(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn entry(has_more: bool) -> FeedEntry {
        FeedEntry {
            name: String::from("200901020304"),
            url: String::from("https://example.org/200901020304.html"),
            title: String::from("Hello"),
            date: NaiveDate::from_ymd_opt(2009, 1, 2)
                .and_then(|d| d.and_hms_opt(3, 4, 0))
                .unwrap(),
            body: String::from("<p>Hi</p>"),
            has_more,
            tags: vec![String::from("rust")],
        }
    }

    fn write(author: Option<&Author>, entries: &[FeedEntry]) -> Result<String> {
        let mut out = Vec::new();
        write_feed(
            FeedConfig {
                title: String::from("Blog RSS"),
                description: String::from("Notes"),
                author,
                home_page: String::from("https://example.org/"),
            },
            entries,
            &mut out,
        )?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_write_feed() -> Result<()> {
        let author = Author {
            name: String::from("Jane"),
            email: Some(String::from("jane@example.org")),
        };
        let xml = write(Some(&author), &[entry(true)])?;
        assert!(xml.contains(r#"<rss version="2.0""#));
        assert!(xml.contains("<title>Blog RSS</title>"));
        assert!(xml.contains("<link>https://example.org/</link>"));
        assert!(xml.contains("<description>Notes</description>"));
        assert!(xml.contains("<title>Hello</title>"));
        assert!(xml.contains("<category>rust</category>"));
        assert!(xml.contains("Fri, 02 Jan 2009 03:04:00 +0000"));
        assert!(xml.contains(r#"<guid isPermaLink="false">200901020304</guid>"#));
        assert!(xml.contains("Read more..."));
        assert!(xml.contains("jane@example.org (Jane)"));
        Ok(())
    }

    #[test]
    fn test_author_without_mail_is_left_out() -> Result<()> {
        let author = Author {
            name: String::from("Jane"),
            email: None,
        };
        let xml = write(Some(&author), &[entry(false)])?;
        assert!(!xml.contains("Jane"));
        assert!(!xml.contains("Read more..."));
        Ok(())
    }
}
