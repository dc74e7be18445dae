//! HTML escaping built on [`pulldown_cmark`]'s escape functions, exposed as
//! [`Display`] adapters so escaped text can be written straight into a
//! [`fmt::Write`].

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use std::fmt::{self, Display, Write};
use std::io;

/// Bridges [`StrWrite`] to a [`fmt::Write`], keeping the formatter's error so
/// it can be returned from [`Display::fmt`].
struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

/// Displays a URL escaped for use in an `href` attribute.
pub struct EscapeHref<'a>(pub &'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

/// Displays text with HTML special characters escaped.
pub struct EscapeHtml<'a>(pub &'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

/// Returns `text` with HTML special characters escaped.
pub fn escape(text: &str) -> String {
    EscapeHtml(text).to_string()
}

/// Converts plain comment text into HTML: special characters are escaped,
/// `http://` and `https://` URLs become links, and line breaks become `<br>`.
pub fn comment_html(text: &str) -> String {
    let mut html = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            html.push_str("<br>\n");
        }
        // writing into a String can't fail
        let _ = write_linked(&mut html, line);
    }
    html
}

fn write_linked<W: Write>(w: &mut W, mut line: &str) -> fmt::Result {
    while let Some(start) = find_url(line) {
        write!(w, "{}", EscapeHtml(&line[..start]))?;
        let rest = &line[start..];
        let len = rest
            .find(|c: char| c.is_whitespace() || c == '<' || c == '>' || c == '"')
            .unwrap_or_else(|| rest.len());
        let url = rest[..len].trim_end_matches(|c: char| ".,;:!?)'".contains(c));
        write!(
            w,
            r#"<a href="{}" rel="nofollow">{}</a>"#,
            EscapeHref(url),
            EscapeHtml(url)
        )?;
        line = &rest[url.len()..];
    }
    write!(w, "{}", EscapeHtml(line))
}

/// Returns whether `s` is an `http://` or `https://` URL, the only kind
/// comments may link to.
pub fn is_web_url(s: &str) -> bool {
    let scheme = |prefix: &str| {
        s.get(..prefix.len())
            .map_or(false, |start| start.eq_ignore_ascii_case(prefix))
    };
    scheme("http://") || scheme("https://")
}

fn find_url(s: &str) -> Option<usize> {
    let http = s.find("http://");
    let https = s.find("https://");
    match (http, https) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
