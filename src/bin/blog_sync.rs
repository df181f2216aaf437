use blog_sync::{
    aws::S3Bucket,
    client::{Client, FeedSource},
    config,
    content::{self, ContentSource, GithubSource, LocalSource},
    dao::Dao,
    podcast,
    storage::{Bucket, LocalBucket},
    util::{self, BoxResult},
    Config, Database,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Keeps the blog database in object storage in sync with the content
/// repository and the podcast feed.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    #[arg(long, env = "BLOG_BUCKET", default_value = config::DEFAULT_BUCKET, global = true)]
    bucket: String,
    #[arg(long, env = "BLOG_DB_KEY", default_value = config::DEFAULT_DB_KEY, global = true)]
    db_key: String,
    #[arg(long, env = "AWS_REGION", default_value = config::DEFAULT_REGION, global = true)]
    region: String,
    /// Use this directory as the bucket instead of S3
    #[arg(long, env = "BLOG_LOCAL_ROOT", global = true)]
    local_root: Option<PathBuf>,
    /// Site domain stripped from episode links, repeatable
    #[arg(long = "domain", env = "BLOG_DOMAINS", value_delimiter = ',', default_value = config::DEFAULT_DOMAIN, global = true)]
    domains: Vec<String>,
    #[arg(long, env = "BLOG_REPO", default_value = config::DEFAULT_REPO, global = true)]
    repo: String,
    #[arg(long, env = "BLOG_BRANCH", default_value = config::DEFAULT_BRANCH, global = true)]
    branch: String,
    #[arg(long, env = "BLOG_AUTHOR", default_value = config::DEFAULT_AUTHOR, global = true)]
    author: String,
    #[arg(long, env = "BLOG_RENDER_PREFIX", default_value = config::DEFAULT_RENDER_PREFIX, global = true)]
    render_prefix: String,
    /// Local checkout of the content repository
    #[arg(long, env = "BLOG_CONTENT_DIR", default_value = ".", global = true)]
    content_dir: PathBuf,
    /// Read post sources from GitHub instead of the local checkout
    #[arg(long, global = true)]
    remote: bool,
    #[arg(long = "log", env = "BLOG_LOG", default_value = "info", global = true)]
    log_spec: String,
}

impl GlobalOpts {
    fn config(&self) -> Config {
        Config {
            bucket: self.bucket.clone(),
            db_key: self.db_key.clone(),
            region: self.region.clone(),
            domains: self.domains.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            author: self.author.clone(),
            render_prefix: self.render_prefix.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh episode guid/duration from the podcast feed
    ReloadRss {
        #[arg(long, default_value = config::DEFAULT_FEED_URL, conflicts_with = "file")]
        url: String,
        /// Read a previously downloaded feed instead
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Render one post and upsert its record
    ReloadOne { path: String },
    /// Render every post under the content directory
    ReloadAll,
    /// Write the whole database back
    Push {
        /// Replace the database with this JSON file first
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Remove a post's rendered HTML and record
    Delete { path: String },
}

#[tokio::main]
async fn main() -> BoxResult<()> {
    let cli = Cli::parse();
    let _lg = util::init_log(&cli.opts.log_spec)?;
    log::trace!("args: {:?}", cli);

    let cfg = cli.opts.config();
    let res = match &cli.opts.local_root {
        Some(root) => run(&cli, &cfg, LocalBucket::new(root)).await,
        None => run(&cli, &cfg, S3Bucket::from_region_name(&cfg.region, &cfg.bucket)).await,
    };
    res.map_err(|e| {
        log::error!("{}", e);
        e
    })
}

async fn run<B: Bucket>(cli: &Cli, cfg: &Config, bucket: B) -> BoxResult<()> {
    let dao = Dao::new(bucket, &cfg.db_key);
    let source: Box<dyn ContentSource> = if cli.opts.remote {
        Box::new(GithubSource::new(&cfg.repo, &cfg.branch))
    } else {
        Box::new(LocalSource::new(&cli.opts.content_dir))
    };

    match &cli.cmd {
        Command::ReloadRss { url, file } => {
            let feed = match file {
                Some(f) => FeedSource::File(f.clone()),
                None => FeedSource::Url(url.clone()),
            };
            let updated =
                podcast::update_podcast_rss(&dao, &Client::default(), &feed, &cfg.domains).await?;
            log::info!("{} records updated", updated.len());
        }
        Command::ReloadOne { path } => {
            let mut db = dao.load().await?;
            content::render_one(&mut db, &dao, source.as_ref(), path, &cfg.author, &cfg.render_prefix)
                .await?;
        }
        Command::ReloadAll => {
            let mut db = dao.load().await?;
            let posts = content::list_content(&cli.opts.content_dir)?;
            log::info!("rendering {} posts", posts.len());
            for post in &posts {
                content::render_one(&mut db, &dao, source.as_ref(), post, &cfg.author, &cfg.render_prefix)
                    .await?;
            }
        }
        Command::Push { from } => {
            let db = match from {
                Some(path) => Database::from_slice(&std::fs::read(path)?)?,
                None => dao.load().await?,
            };
            dao.save(&db, None).await?;
        }
        Command::Delete { path } => {
            let mut db = dao.load().await?;
            content::remove(&mut db, &dao, path, &cfg.render_prefix).await?;
        }
    }
    Ok(())
}
