/// One `item` of the podcast feed.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Episode {
    pub guid: String,
    /// `enclosure/@url`, the media file.
    pub url: String,
    pub link: String,
    /// `itunes:duration`, kept verbatim (`03:56`, `1:02:11`, ...).
    pub duration: String,
    pub title: Option<String>,
}
