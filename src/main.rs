use anyhow::{anyhow, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use flatblog::article::ArticleStore;
use flatblog::comment::{CommentStore, NewComment};
use flatblog::config::Config;
use flatblog::generate::Generator;
use flatblog::page::PageKind;
use flatblog::queue::NoDiscovery;
use flatblog::render::{PageRenderer, Renderer};
use log::{error, info};
use std::io::{self, Read, Write};
use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
    if let Err(err) = run() {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("flatblog")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Renders a flat-file blog into static pages")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("directory")
                .short("C")
                .long("directory")
                .value_name("DIR")
                .takes_value(true)
                .help("Searches for blog.yaml from DIR instead of the working directory"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("OUT")
                .takes_value(true)
                .help("Overrides the output directory"),
        )
        .subcommand(SubCommand::with_name("generate").about("Regenerates the whole site"))
        .subcommand(
            SubCommand::with_name("update")
                .about("Regenerates stale articles, or the pages of one article")
                .arg(Arg::with_name("article").index(1))
                .arg(
                    Arg::with_name("comment")
                        .long("comment")
                        .requires("article")
                        .help("Only the article's comments changed"),
                ),
        )
        .subcommand(
            SubCommand::with_name("comment")
                .about("Adds a comment read from stdin to an article")
                .arg(Arg::with_name("article").required(true).index(1))
                .arg(
                    Arg::with_name("author")
                        .long("author")
                        .takes_value(true)
                        .required(true),
                )
                .arg(Arg::with_name("mail").long("mail").takes_value(true))
                .arg(Arg::with_name("web").long("web").takes_value(true))
                .arg(Arg::with_name("ip").long("ip").takes_value(true))
                .arg(
                    Arg::with_name("no-update")
                        .long("no-update")
                        .help("Doesn't regenerate the article's pages"),
                ),
        )
        .subcommand(
            SubCommand::with_name("render")
                .about("Prints one page, e.g. `index_rust-2`, `tags` or an article name")
                .arg(Arg::with_name("page").required(true).index(1)),
        )
        .get_matches();

    let directory = match matches.value_of("directory") {
        Some(directory) => PathBuf::from(directory),
        None => std::env::current_dir()?,
    };
    let mut config = Config::from_directory(&directory)?;
    if let Some(output) = matches.value_of("output") {
        config.output_directory = PathBuf::from(output);
    }

    match matches.subcommand() {
        ("generate", Some(_)) => Ok(Generator::from_config(&config)?.generate_all()?),
        ("update", Some(m)) => update(&config, m),
        ("comment", Some(m)) => comment(&config, m),
        ("render", Some(m)) => render(&config, m),
        _ => Err(anyhow!("no command given")),
    }
}

fn update(config: &Config, m: &ArgMatches) -> Result<()> {
    let mut generator = Generator::from_config(config)?;
    match m.value_of("article") {
        Some(article) => {
            if !generator.renderer().store().exists(article) {
                return Err(anyhow!("article `{}` not found", article));
            }
            let is_new = !m.is_present("comment");
            generator.update_one_article(article, is_new)?;
            // a new article changes the tag counts
            if is_new {
                generator.generate_tag_cloud()?;
            }
        }
        None => {
            let updated = generator.update_all()?;
            info!("updated {} articles", updated);
        }
    }
    Ok(())
}

fn comment(config: &Config, m: &ArgMatches) -> Result<()> {
    let article = m.value_of("article").unwrap_or_default();
    let mut body = String::new();
    io::stdin().read_to_string(&mut body)?;

    let field = |name: &str| m.value_of(name).unwrap_or_default().to_owned();
    let comment = NewComment {
        author: field("author"),
        mail: field("mail"),
        web: field("web"),
        ip: field("ip"),
        body,
    };
    let store = ArticleStore::new(&config.data_directory, config.page_size);
    let file_name = CommentStore::new(store).append_comment(article, &comment)?;
    info!("added comment {} to {}", file_name, article);

    if !m.is_present("no-update") {
        Generator::from_config(config)?.update_one_article(article, false)?;
    }
    Ok(())
}

fn render(config: &Config, m: &ArgMatches) -> Result<()> {
    let page = m.value_of("page").unwrap_or_default();
    let mut renderer = Renderer::new(config)?;
    let tags: Vec<String> = renderer
        .store()
        .list_tags()
        .into_iter()
        .map(|(tag, _)| tag)
        .collect();
    let kind = PageKind::parse(page, &tags).ok_or_else(|| anyhow!("unknown page `{}`", page))?;
    match renderer.render(&kind, &mut NoDiscovery)? {
        Some(body) => Ok(io::stdout().write_all(&body)?),
        None => Err(anyhow!("page `{}` has no content", page)),
    }
}
