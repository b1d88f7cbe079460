use quick_xml::events::Event;
use quick_xml::Reader;

use crate::models::{FeedDocument, FeedEntry};

/// Elements whose text is kept. Names are compared with their prefix, so
/// extensions like `atom:link` or `content:encoded` never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    Guid,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            b"pubDate" => Some(Self::PubDate),
            b"guid" => Some(Self::Guid),
            _ => None,
        }
    }
}

/// Text collected for a channel or an item, XML entities already decoded.
#[derive(Debug, Default)]
struct Collected {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    guid: String,
}

impl Collected {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Description => &mut self.description,
            Field::PubDate => &mut self.pub_date,
            Field::Guid => &mut self.guid,
        }
    }

    /// Only the first non-empty occurrence of an element counts.
    fn accepts(&mut self, field: Field) -> bool {
        self.slot(field).trim().is_empty()
    }
}

/// Feeds often encode entities twice (`&amp;amp;`), so the XML-level
/// decoding done while reading is followed by an HTML one.
fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text.trim()).into_owned()
}

/// Decodes an RSS 2.0 body into a [`FeedDocument`].
pub fn parse_document(body: &str) -> Result<FeedDocument, String> {
    if body.trim().is_empty() {
        return Err("empty document".to_string());
    }

    let mut reader = Reader::from_str(body);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut channel = Collected::default();
    let mut items: Vec<Collected> = Vec::new();
    let mut seen_channel = false;
    let mut in_item = false;
    let mut target: Option<Field> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if path.is_empty() && name != b"rss" {
                    return Err(format!(
                        "expected <rss> root, found <{}>",
                        String::from_utf8_lossy(&name)
                    ));
                }
                path.push(name);
                target = None;

                let names: Vec<&[u8]> = path.iter().map(Vec::as_slice).collect();
                match names.as_slice() {
                    [b"rss", b"channel"] => seen_channel = true,
                    [b"rss", b"channel", b"item"] => {
                        in_item = true;
                        items.push(Collected::default());
                    }
                    [b"rss", b"channel", field] => {
                        target = Field::from_name(field).filter(|f| channel.accepts(*f));
                    }
                    [b"rss", b"channel", b"item", field] => {
                        target = match (Field::from_name(field), items.last_mut()) {
                            (Some(f), Some(item)) => Some(f).filter(|f| item.accepts(*f)),
                            _ => None,
                        };
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some(b"item".as_slice()) && path.len() == 2 {
                    in_item = false;
                }
                target = None;
            }
            Event::Text(t) => {
                if let Some(field) = target {
                    let raw = t.into_inner();
                    let text = reader.decoder().decode(&raw).map_err(|e| e.to_string())?;
                    let decoded = html_escape::decode_html_entities(&text);
                    current(&mut channel, &mut items, in_item, field).push_str(&decoded);
                }
            }
            Event::CData(c) => {
                if let Some(field) = target {
                    let raw = c.into_inner();
                    let text = reader.decoder().decode(&raw).map_err(|e| e.to_string())?;
                    current(&mut channel, &mut items, in_item, field).push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    if !seen_channel {
        return Err("missing <channel> element".to_string());
    }

    let entries = items
        .into_iter()
        .map(|item| FeedEntry {
            title: unescape(&item.title),
            link: item.link.trim().to_string(),
            description: unescape(&item.description),
            pub_date: item.pub_date.trim().to_string(),
            guid: Some(item.guid.trim().to_string()).filter(|g| !g.is_empty()),
        })
        .collect();

    Ok(FeedDocument {
        title: unescape(&channel.title),
        link: channel.link.trim().to_string(),
        description: unescape(&channel.description),
        entries,
    })
}

fn current<'a>(
    channel: &'a mut Collected,
    items: &'a mut [Collected],
    in_item: bool,
    field: Field,
) -> &'a mut String {
    match items.last_mut() {
        Some(item) if in_item => item.slot(field),
        _ => channel.slot(field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Boot.dev &amp;amp; Friends</title>
    <link>https://ex.com/</link>
    <description>Notes &amp;lt;weekly&amp;gt;</description>
    <atom:link href="https://ex.com/rss" rel="self" type="application/rss+xml"/>
    <item>
      <title>Tom &amp;amp; Jerry</title>
      <link>https://ex.com/posts/1</link>
      <pubDate>2024-01-01T00:00:00Z</pubDate>
      <guid isPermaLink="false">post-1</guid>
      <description><![CDATA[<p>First &amp; best</p>]]></description>
    </item>
    <item>
      <title>Second</title>
      <link>https://ex.com/posts/2</link>
      <pubDate>not-a-date</pubDate>
      <description>Plain</description>
    </item>
  </channel>
</rss>"#;

    const WORDPRESS: &str = r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"
	xmlns:content="http://purl.org/rss/1.0/modules/content/"
	xmlns:wfw="http://wellformedweb.org/CommentAPI/"
	xmlns:dc="http://purl.org/dc/elements/1.1/"
	xmlns:atom="http://www.w3.org/2005/Atom"
	xmlns:sy="http://purl.org/rss/1.0/modules/syndication/"
	xmlns:slash="http://purl.org/rss/1.0/modules/slash/"
	>

<channel>
	<title>Wagslane</title>
	<atom:link href="https://wagslane.dev/index.xml" rel="self" type="application/rss+xml" />
	<link>https://wagslane.dev</link>
	<description>Thoughts on code &#38; teaching</description>
	<lastBuildDate>Mon, 08 Jan 2024 15:04:05 +0000</lastBuildDate>
	<language>en-US</language>
	<sy:updatePeriod>hourly</sy:updatePeriod>
	<sy:updateFrequency>1</sy:updateFrequency>
	<generator>https://wordpress.org/?v=6.4.2</generator>
	<image>
		<url>https://wagslane.dev/icon-32x32.png</url>
		<title>Wagslane</title>
		<link>https://wagslane.dev</link>
		<width>32</width>
		<height>32</height>
	</image>
	<item>
		<title>Leave Scrum to Rugby</title>
		<link>https://wagslane.dev/posts/leave-scrum-to-rugby/</link>
		<comments>https://wagslane.dev/posts/leave-scrum-to-rugby/#respond</comments>
		<dc:creator><![CDATA[Lane]]></dc:creator>
		<pubDate>Mon, 08 Jan 2024 15:04:05 +0000</pubDate>
		<category><![CDATA[Process]]></category>
		<guid isPermaLink="false">https://wagslane.dev/?p=101</guid>
		<description><![CDATA[Sprints are a bad fit &#8230;]]></description>
		<content:encoded><![CDATA[<p>Sprints are a bad fit for most teams.</p>]]></content:encoded>
		<wfw:commentRss>https://wagslane.dev/posts/leave-scrum-to-rugby/feed/</wfw:commentRss>
		<slash:comments>3</slash:comments>
	</item>
	<item>
		<title>Zen &#038; the Art of Go</title>
		<link>https://wagslane.dev/posts/zen/</link>
		<pubDate>2024-01-02T09:00:00Z</pubDate>
		<guid isPermaLink="true">https://wagslane.dev/posts/zen/</guid>
		<description><![CDATA[Simple is better]]></description>
		<content:encoded><![CDATA[<p>Simple is better.</p>]]></content:encoded>
	</item>
</channel>
</rss>
"#;

    #[test]
    fn parses_channel_and_items() {
        let doc = parse_document(SAMPLE).unwrap();
        assert_eq!(doc.title, "Boot.dev & Friends");
        assert_eq!(doc.link, "https://ex.com/");
        assert_eq!(doc.description, "Notes <weekly>");
        assert_eq!(doc.entries.len(), 2);

        let first = &doc.entries[0];
        assert_eq!(first.title, "Tom & Jerry");
        assert_eq!(first.link, "https://ex.com/posts/1");
        assert_eq!(first.pub_date, "2024-01-01T00:00:00Z");
        assert_eq!(first.guid.as_deref(), Some("post-1"));
        assert_eq!(first.description, "<p>First & best</p>");

        let second = &doc.entries[1];
        assert_eq!(second.pub_date, "not-a-date");
        assert_eq!(second.guid, None);
    }

    #[test]
    fn parses_wordpress_channel() {
        let doc = parse_document(WORDPRESS).unwrap();
        assert_eq!(doc.title, "Wagslane");
        assert_eq!(doc.link, "https://wagslane.dev");
        assert_eq!(doc.description, "Thoughts on code & teaching");
        assert_eq!(doc.entries.len(), 2);

        let first = &doc.entries[0];
        assert_eq!(first.title, "Leave Scrum to Rugby");
        assert_eq!(first.link, "https://wagslane.dev/posts/leave-scrum-to-rugby/");
        assert_eq!(first.pub_date, "Mon, 08 Jan 2024 15:04:05 +0000");
        assert_eq!(first.guid.as_deref(), Some("https://wagslane.dev/?p=101"));
        assert_eq!(first.description, "Sprints are a bad fit …");

        let second = &doc.entries[1];
        assert_eq!(second.title, "Zen & the Art of Go");
        assert_eq!(second.description, "Simple is better");
    }

    #[test]
    fn atom_self_link_is_ignored_wherever_it_appears() {
        let layouts = [
            r#"<link>https://ex.com/</link><description>d</description><atom:link href="https://ex.com/rss" rel="self"/>"#,
            r#"<atom:link href="https://ex.com/rss" rel="self"/><link>https://ex.com/</link>"#,
            r#"<link>https://ex.com/</link><atom:link href="https://ex.com/rss" rel="self"/>"#,
            r#"<atom:link href="https://ex.com/rss" rel="self"></atom:link><link>https://ex.com/</link>"#,
        ];
        for channel in layouts {
            let body = format!(
                r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel><title>T</title>{channel}<item><title>A</title><link>https://ex.com/a</link></item></channel></rss>"#
            );
            let doc = parse_document(&body).unwrap_or_else(|e| panic!("{channel}: {e}"));
            assert_eq!(doc.link, "https://ex.com/", "{channel}");
            assert_eq!(doc.entries.len(), 1, "{channel}");
        }
    }

    #[test]
    fn image_block_does_not_override_channel_fields() {
        let doc = parse_document(
            "<rss><channel><title>Main</title><link>https://main.com</link>\
             <image><title>Logo</title><link>https://logo.com</link></image></channel></rss>",
        )
        .unwrap();
        assert_eq!(doc.title, "Main");
        assert_eq!(doc.link, "https://main.com");
    }

    #[test]
    fn channel_without_items_is_valid() {
        let doc = parse_document(
            "<rss><channel><title>Quiet</title><link>https://q.com</link></channel></rss>",
        )
        .unwrap();
        assert_eq!(doc.title, "Quiet");
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn rejects_non_feed_bodies() {
        assert!(parse_document("").is_err());
        assert!(parse_document("<html><body>hi</body></html>").is_err());
        assert!(parse_document("<rss><channel><title>cut off").is_err());
        assert!(parse_document("<rss><channel></item></channel></rss>").is_err());
        assert!(parse_document("<rss version=\"2.0\"></rss>").is_err());
    }
}
