//! Helpers for building throwaway data directories in tests.

use crate::article::ArticleStore;
use crate::comment::CommentStore;
use crate::config::{Config, PROJECT_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

const THEME: &str = "article_template: [article.html]
index_template: [header.html, index.html]
tags_template: [header.html, tags.html]
";

const HEADER: &str = "<title>{{.title}}</title>home:{{.home_url}} ";

const ARTICLE: &str = "<title>{{.title}}</title>
<h1>{{.article.title}}</h1>{{.article.date}}
{{range .article.tags}}<a href=\"{{.url}}\">{{.tag}}</a>{{end}}
{{.article.body}}
{{range .comments}}<p>{{.number}} {{.author}} {{.date}}: {{.text}}</p>{{end}}
count:{{.comment_count}}
";

const INDEX: &str = "{{range .articles}}<h2><a href=\"{{.url}}\">{{.title}}</a></h2>{{.body}}
{{if .more_url}}more:{{.more_url}}{{end}} {{.comments}}
{{range .tags}}<a href=\"{{.url}}\">{{.tag}}</a>{{end}}
{{end}}{{if .next}}next:{{.next}}{{end}} {{if .previous}}previous:{{.previous}}{{end}}
";

const TAGS: &str = "{{range .tags}}<a href=\"{{.url}}\">{{.tag}}:{{.size}}</a> {{end}}";

/// A temporary site directory. `data/` holds the article store, `out/` the
/// static output, and `theme/` minimal templates.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Fixture {
        Fixture {
            dir: tempfile::tempdir().expect("creating temporary directory"),
        }
    }

    pub fn data(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Resolves `relative` against the data directory.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.data().join(relative)
    }

    pub fn mkdir(&self, relative: &str) {
        fs::create_dir_all(self.path(relative)).expect("creating directory");
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().expect("path has a parent"))
            .expect("creating parent directory");
        fs::write(path, contents).expect("writing file");
    }

    pub fn article(&self, name: &str, title: &str, body: &str) {
        self.write(
            &format!("articles/{}/article", name),
            &format!("{}\n{}", title, body),
        );
    }

    pub fn tag(&self, tag: &str, name: &str) {
        self.write(&format!("tags/{}/{}", tag, name), "");
    }

    pub fn touch(&self, path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .and_then(|f| f.set_modified(time))
            .expect("setting modification time");
    }

    /// Writes `project` as the project file next to a minimal theme.
    pub fn project(&self, project: &str) {
        let root = self.dir.path();
        let theme = root.join("theme");
        fs::create_dir_all(&theme).expect("creating theme directory");
        for (name, contents) in [
            ("theme.yaml", THEME),
            ("header.html", HEADER),
            ("article.html", ARTICLE),
            ("index.html", INDEX),
            ("tags.html", TAGS),
        ]
        .iter()
        {
            fs::write(theme.join(name), contents).expect("writing theme file");
        }
        fs::write(root.join(PROJECT_FILE), project).expect("writing project file");
    }

    /// Writes a project with `page_size` articles per page and loads it.
    pub fn config(&self, page_size: usize) -> Config {
        self.project(&format!(
            "site_name: Blog\nbase_url: https://example.org\npage_size: {}\noutput_directory: out\n",
            page_size
        ));
        Config::from_directory(self.dir.path()).expect("loading configuration")
    }

    pub fn store(&self, page_size: usize) -> ArticleStore {
        ArticleStore::new(&self.data(), page_size)
    }

    pub fn comments(&self, page_size: usize) -> CommentStore {
        CommentStore::new(self.store(page_size))
    }
}
