//! Defines the [`Tag`] link type and the [`CloudTag`] entries of the tag
//! cloud, along with their template values.

use gtmpl::Value;
use std::collections::HashMap;

/// A link to the first index page of a tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    /// The tag's name as it appears in the data directory.
    pub name: String,

    /// The URL of the tag's first index page.
    pub url: String,
}

impl From<&Tag> for Value {
    /// Converts [`Tag`]s into [`Value`]s for templating. The object has the
    /// fields `tag` and `url`.
    fn from(t: &Tag) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("tag".to_owned(), Value::String(t.name.clone()));
        m.insert("url".to_owned(), Value::String(t.url.clone()));
        Value::Object(m)
    }
}

/// A tag as shown in the tag cloud.
#[derive(Clone, Debug, PartialEq)]
pub struct CloudTag {
    pub tag: Tag,

    /// The number of articles with the tag.
    pub count: usize,

    /// The font size, in percent.
    pub size: usize,
}

impl CloudTag {
    /// Sizes a tag with `count` articles: every article adds `threshold`
    /// percent to a base size of 100%.
    pub fn new(tag: Tag, count: usize, threshold: usize) -> CloudTag {
        CloudTag {
            tag,
            count,
            size: count * threshold + 100,
        }
    }
}

impl From<&CloudTag> for Value {
    /// Converts [`CloudTag`]s into [`Value`]s for templating. The object has
    /// the [`Tag`] fields plus `count` and `size`.
    fn from(t: &CloudTag) -> Value {
        let mut value = Value::from(&t.tag);
        if let Value::Object(m) = &mut value {
            m.insert("count".to_owned(), Value::String(t.count.to_string()));
            m.insert("size".to_owned(), Value::String(t.size.to_string()));
        }
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cloud_tag_size() {
        let tag = Tag {
            name: String::from("rust"),
            url: String::from("https://example.org/index_rust.html"),
        };
        assert_eq!(130, CloudTag::new(tag.clone(), 3, 10).size);
        assert_eq!(100, CloudTag::new(tag, 0, 10).size);
    }
}
