use crate::util::BoxResult;
use std::path::PathBuf;

/// Where the feed document comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSource {
    Url(String),
    File(PathBuf),
}

pub trait Fetcher {
    fn fetch(&self, source: &FeedSource) -> BoxResult<String>;
}

/// Blocking HTTP client for feeds and raw repository files.
pub struct Client {
    agent: ureq::Agent,
}

impl Default for Client {
    fn default() -> Self {
        Client {
            agent: ureq::AgentBuilder::new().redirects(10).build(),
        }
    }
}

impl Client {
    pub fn get_text(&self, url: &str) -> BoxResult<String> {
        log::info!("fetching {}", url);
        let body = self.agent.get(url).call()?.into_string()?;
        log::debug!("fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

impl Fetcher for Client {
    fn fetch(&self, source: &FeedSource) -> BoxResult<String> {
        match source {
            FeedSource::Url(url) => self.get_text(url),
            FeedSource::File(path) => {
                log::info!("reading feed from {}", path.display());
                Ok(std::fs::read_to_string(path)?)
            }
        }
    }
}
