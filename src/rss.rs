use crate::entity::Episode;
use crate::util::{BoxError, BoxResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use simple_error::bail;
use std::str::FromStr;

// element depths: rss = 1, channel = 2, item = 3, item fields = 4
const ITEM_DEPTH: usize = 3;

#[derive(Default)]
struct RawItem {
    title: Option<String>,
    guid: Option<String>,
    link: Option<String>,
    url: Option<String>,
    duration: Option<String>,
}

/// Episodes of a podcast feed, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feed {
    episodes: Vec<Episode>,
}

fn qname(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn enclosure_url(e: &BytesStart) -> BoxResult<Option<String>> {
    match e.try_get_attribute("url")? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

impl Feed {
    /// Parses a whole RSS document. Any item lacking one of the fields the
    /// reconciler needs rejects the entire feed.
    pub fn parse(xml: &str) -> BoxResult<Feed> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut path: Vec<String> = Vec::new();
        let mut saw_channel = false;
        let mut current: Option<RawItem> = None;
        let mut text = String::new();
        let mut raw_items = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = qname(&e);
                    match path.len() {
                        0 if name != "rss" => bail!("root element is <{}>, not <rss>", name),
                        1 if name == "channel" => saw_channel = true,
                        2 if path[1] == "channel" && name == "item" => {
                            current = Some(RawItem::default())
                        }
                        ITEM_DEPTH if name == "enclosure" => {
                            if let Some(item) = current.as_mut() {
                                item.url = enclosure_url(&e)?;
                            }
                        }
                        _ => {}
                    }
                    text.clear();
                    path.push(name);
                }
                Event::Empty(e) => {
                    let name = qname(&e);
                    match path.len() {
                        0 if name != "rss" => bail!("root element is <{}>, not <rss>", name),
                        1 if name == "channel" => saw_channel = true,
                        ITEM_DEPTH if name == "enclosure" => {
                            if let Some(item) = current.as_mut() {
                                item.url = enclosure_url(&e)?;
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(t) => text.push_str(&t.unescape()?),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(_) => {
                    let name = path.pop().unwrap_or_default();
                    if path.len() == ITEM_DEPTH {
                        if let Some(item) = current.as_mut() {
                            let value = Some(std::mem::take(&mut text));
                            match name.as_str() {
                                "title" => item.title = value,
                                "guid" => item.guid = value,
                                "link" => item.link = value,
                                "itunes:duration" => item.duration = value,
                                _ => {}
                            }
                        }
                    } else if path.len() == ITEM_DEPTH - 1 && name == "item" {
                        raw_items.extend(current.take());
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = path.last() {
            bail!("document ends inside <{}>", open);
        }
        if !saw_channel {
            bail!("feed has no channel");
        }
        let episodes = raw_items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| to_episode(idx, item))
            .collect::<BoxResult<Vec<Episode>>>()?;
        Ok(Feed { episodes })
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }
}

impl FromStr for Feed {
    type Err = BoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feed::parse(s)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn to_episode(idx: usize, item: RawItem) -> BoxResult<Episode> {
    let guid = match non_empty(item.guid) {
        Some(g) => g,
        None => bail!("item {} has no guid", idx),
    };
    let url = match non_empty(item.url) {
        Some(u) => u,
        None => bail!("item {} ({}) has no enclosure url", idx, guid),
    };
    let link = match non_empty(item.link) {
        Some(l) => l,
        None => bail!("item {} ({}) has no link", idx, guid),
    };
    let duration = match non_empty(item.duration) {
        Some(d) => d,
        None => bail!("item {} ({}) has no itunes:duration", idx, guid),
    };
    Ok(Episode {
        guid,
        url,
        link,
        duration,
        title: non_empty(item.title),
    })
}
