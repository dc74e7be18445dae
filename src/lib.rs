//! The library code for the `flatblog` blogging engine. Articles, tags, and
//! comments live in plain files under a data directory ([`crate::article`],
//! [`crate::comment`]); pages are rendered from them one at a time
//! ([`crate::render`]) and written out as a static site
//! ([`crate::generate`]).
//!
//! Generation is link-driven. Rendering a page reports every page it links to,
//! and the generator queues each newly seen page until nothing new turns up.
//! This lets an update regenerate exactly the pages that show a changed
//! article:
//!
//! 1. its own page
//! 2. the index pages of each of its tags, and of the global index, that list
//!    it (all of them for a new article, since it shifts later pages)
//! 3. the feeds of those tags
//! 4. the tag cloud, for new articles

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod article;
pub mod comment;
pub mod config;
pub mod escape;
pub mod feed;
pub mod generate;
pub mod page;
pub mod queue;
pub mod render;
pub mod tag;
pub mod value;

#[cfg(test)]
mod testutil;
