/// A parsed RSS channel. Text fields are already entity-unescaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `<pubDate>` text, parsed later by the ingestion pipeline.
    pub pub_date: String,
    pub guid: Option<String>,
}

impl FeedEntry {
    /// The URL a post for this entry is keyed on: the item link, then the
    /// guid, then the channel link.
    pub fn post_url<'a>(&'a self, channel_link: &'a str) -> &'a str {
        if !self.link.trim().is_empty() {
            return self.link.trim();
        }
        match self.guid.as_deref().map(str::trim) {
            Some(guid) if !guid.is_empty() => guid,
            _ => channel_link.trim(),
        }
    }
}
