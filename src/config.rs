pub const DEFAULT_BUCKET: &str = "dataskeptic.com";
pub const DEFAULT_DB_KEY: &str = "posts.db.json";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_DOMAIN: &str = "dataskeptic.com";
pub const DEFAULT_FEED_URL: &str = "http://dataskeptic.libsyn.com/rss";
pub const DEFAULT_REPO: &str = "data-skeptic/blog";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_AUTHOR: &str = "kyle@dataskeptic.com";
pub const DEFAULT_RENDER_PREFIX: &str = "blog/";

/// Where the database lives and how content keys are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bucket: String,
    pub db_key: String,
    pub region: String,
    /// Site domains stripped from episode links to form record keys.
    pub domains: Vec<String>,
    pub repo: String,
    pub branch: String,
    pub author: String,
    pub render_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bucket: DEFAULT_BUCKET.to_string(),
            db_key: DEFAULT_DB_KEY.to_string(),
            region: DEFAULT_REGION.to_string(),
            domains: vec![DEFAULT_DOMAIN.to_string()],
            repo: DEFAULT_REPO.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            render_prefix: DEFAULT_RENDER_PREFIX.to_string(),
        }
    }
}
