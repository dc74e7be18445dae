//! Conversions from page data into template [`Value`]s. Templates see plain
//! strings; optional fields are [`Value::Nil`] so `{{if .field}}` works.

use crate::comment::Comment;
use crate::escape::{comment_html, escape, is_web_url, EscapeHref};
use crate::tag::Tag;
use chrono::NaiveDateTime;
use gtmpl_value::Value;
use std::collections::HashMap;

/// The `strftime` format of dates shown on pages.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Builds a [`Value::Object`] from `fields`.
pub fn object<'a, I>(fields: I) -> Value
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    let m: HashMap<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect();
    Value::Object(m)
}

/// Converts an optional string into a [`Value::String`] or [`Value::Nil`].
pub fn optional(s: Option<String>) -> Value {
    match s {
        Some(s) => Value::String(s),
        None => Value::Nil,
    }
}

/// Returns the comment-count label shown under articles.
pub fn comments_label(count: usize) -> String {
    match count {
        0 => String::from("no comment"),
        1 => String::from("1 comment"),
        n => format!("{} comments", n),
    }
}

/// An article as shown on a page: in full on its own page, or as a summary
/// with a "read more" link on index pages.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleView {
    pub name: String,
    pub title: String,
    pub date: NaiveDateTime,
    pub url: String,
    pub body: String,

    /// The link to the full article, set for summaries of articles with a
    /// continuation.
    pub more_url: Option<String>,
    pub tags: Vec<Tag>,
    pub comment_count: usize,
}

impl From<&ArticleView> for Value {
    fn from(a: &ArticleView) -> Value {
        object(vec![
            ("name", Value::String(a.name.clone())),
            ("title", Value::String(a.title.clone())),
            ("date", Value::String(a.date.format(DATE_FORMAT).to_string())),
            ("url", Value::String(a.url.clone())),
            ("body", Value::String(a.body.clone())),
            ("more_url", optional(a.more_url.clone())),
            ("tags", Value::Array(a.tags.iter().map(Value::from).collect())),
            ("comments", Value::String(comments_label(a.comment_count))),
        ])
    }
}

impl From<&Comment> for Value {
    /// Converts a [`Comment`] into a [`Value`], escaping every field since
    /// comments are untrusted input. Homepages other than http(s) URLs are
    /// dropped.
    fn from(c: &Comment) -> Value {
        object(vec![
            ("number", Value::String(c.number.to_string())),
            ("author", Value::String(escape(&c.author))),
            ("date", Value::String(c.date.format(DATE_FORMAT).to_string())),
            ("ip", optional(c.ip.as_deref().map(escape))),
            ("mail", optional(c.mail.as_deref().map(escape))),
            (
                "web",
                optional(
                    c.web
                        .as_deref()
                        .filter(|web| is_web_url(web))
                        .map(|web| EscapeHref(web).to_string()),
                ),
            ),
            ("text", Value::String(comment_html(&c.body))),
        ])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn string<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
        match value {
            Value::Object(m) => match m.get(key) {
                Some(Value::String(s)) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_nil(value: &Value, key: &str) -> bool {
        match value {
            Value::Object(m) => matches!(m.get(key), Some(Value::Nil)),
            _ => false,
        }
    }

    #[test]
    fn test_comments_label() {
        assert_eq!("no comment", comments_label(0));
        assert_eq!("1 comment", comments_label(1));
        assert_eq!("12 comments", comments_label(12));
    }

    #[test]
    fn test_comment_value_is_escaped() {
        let comment = Comment {
            number: 2,
            file_name: String::from("200901010000a"),
            author: String::from("<script>"),
            date: NaiveDate::from_ymd_opt(2009, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
            ip: None,
            mail: None,
            web: Some(String::from("https://example.org/?a&b")),
            body: String::from("a\nb"),
        };
        let value = Value::from(&comment);
        assert_eq!(Some("&lt;script&gt;"), string(&value, "author"));
        assert!(is_nil(&value, "mail"));
        assert_eq!(Some("https://example.org/?a&amp;b"), string(&value, "web"));
        assert_eq!(Some("a<br>\nb"), string(&value, "text"));
        assert_eq!(Some("2009-01-01 00:00"), string(&value, "date"));
        assert_eq!(Some("2"), string(&value, "number"));
    }

    #[test]
    fn test_comment_homepage_must_be_web_url() {
        let comment = Comment {
            number: 1,
            file_name: String::from("200901010000a"),
            author: String::from("Mallory"),
            date: NaiveDate::from_ymd_opt(2009, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
            ip: None,
            mail: None,
            web: Some(String::from("javascript:alert(1)")),
            body: String::from("hi"),
        };
        assert!(is_nil(&Value::from(&comment), "web"));
    }
}
