use crate::client::{FeedSource, Fetcher};
use crate::dao::Dao;
use crate::entity::Episode;
use crate::model::{str_field, Database, Record};
use crate::rss::Feed;
use crate::storage::Bucket;
use crate::util::{dedup_keys, BoxResult};
use serde_json::Value;

pub const GUID: &str = "guid";
pub const DURATION: &str = "duration";

/// Record key for an episode link: a leading `http://<domain>` or
/// `https://<domain>` is removed, anything else passes through.
pub fn pretty_name<S: AsRef<str>>(link: &str, domains: &[S]) -> String {
    for domain in domains {
        for scheme in &["http://", "https://"] {
            let prefix = format!("{}{}", scheme, domain.as_ref());
            if let Some(rest) = link.strip_prefix(prefix.as_str()) {
                return rest.to_string();
            }
        }
    }
    link.to_string()
}

/// Durations are compared as plain strings, `3:56` and `03:56` differ.
pub fn requires_update(record: &Record, guid: &str, duration: &str) -> bool {
    str_field(record, GUID) != Some(guid) || str_field(record, DURATION) != Some(duration)
}

/// Refreshes the record for one episode. Returns its key when it changed.
pub fn update_episode<S: AsRef<str>>(
    db: &mut Database,
    episode: &Episode,
    domains: &[S],
) -> Option<String> {
    let key = pretty_name(&episode.link, domains);
    let record = match db.get_mut(&key) {
        Some(r) => r,
        None => {
            log::warn!(
                "unknown episode {} ({}), no record under {}",
                episode.title.as_deref().unwrap_or("untitled"),
                episode.link,
                key
            );
            return None;
        }
    };
    if !requires_update(record, &episode.guid, &episode.duration) {
        log::debug!("{} is up to date", key);
        return None;
    }
    log::debug!(
        "{} stale: guid {:?} -> {}, duration {:?} -> {}",
        key,
        str_field(record, GUID),
        episode.guid,
        str_field(record, DURATION),
        episode.duration
    );
    record.insert(DURATION.to_string(), Value::String(episode.duration.clone()));
    record.insert(GUID.to_string(), Value::String(episode.guid.clone()));
    Some(key)
}

/// Reconciles every episode in feed order and returns the changed keys.
pub fn update_from_feed<S: AsRef<str>>(db: &mut Database, feed: &Feed, domains: &[S]) -> Vec<String> {
    log::info!("number of episodes: {}", feed.len());
    let changed = feed
        .episodes()
        .iter()
        .filter_map(|ep| update_episode(db, ep, domains))
        .collect::<Vec<String>>();
    dedup_keys(changed)
}

/// Loads the database, reconciles it with the feed and persists each
/// changed key in turn. A feed that fails to fetch or parse changes nothing.
/// A failed write stops the run; keys written before it stay written.
pub async fn update_podcast_rss<B, F, S>(
    dao: &Dao<B>,
    fetcher: &F,
    source: &FeedSource,
    domains: &[S],
) -> BoxResult<Vec<String>>
where
    B: Bucket,
    F: Fetcher + ?Sized,
    S: AsRef<str>,
{
    let mut db = dao.load().await?;
    let feed = Feed::parse(&fetcher.fetch(source)?)?;
    let updated = update_from_feed(&mut db, &feed, domains);
    if updated.is_empty() {
        log::info!("no podcast updates");
        return Ok(updated);
    }
    log::info!("podcast updates made: {}", updated.len());
    for key in &updated {
        dao.save(&db, Some(std::slice::from_ref(key))).await?;
    }
    Ok(updated)
}
