use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// A minimal RSS 2.0 channel: its title and each item's child elements by name.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    fields: HashMap<String, String>,
}

impl FeedItem {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn title(&self) -> &str {
        self.get("title").unwrap_or("")
    }

    pub fn description(&self) -> &str {
        self.get("description").unwrap_or("")
    }
}

/// Parse an RSS feed from raw XML bytes.
///
/// Item children are keyed by their local name, so RSSHub's extra elements
/// (`year`, `type`) land next to `title` and `description`. Text and CDATA
/// sections inside one element are concatenated.
pub fn parse_feed(xml: &[u8]) -> Result<Feed, String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut buf = Vec::new();

    let mut path: Vec<String> = Vec::new();
    let mut current_item: Option<FeedItem> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "item" || name == "entry" {
                    current_item = Some(FeedItem::default());
                }
                path.push(name);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "item" || name == "entry" {
                    if let Some(item) = current_item.take() {
                        feed.items.push(item);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                append_text(&mut feed, current_item.as_mut(), &path, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                append_text(&mut feed, current_item.as_mut(), &path, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error at {}: {}", reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

fn append_text(feed: &mut Feed, item: Option<&mut FeedItem>, path: &[String], text: &str) {
    if text.is_empty() {
        return;
    }
    let Some(element) = path.last() else {
        return;
    };

    match item {
        Some(item) => {
            // Only direct children of the item; nested markup is folded into its parent field.
            let Some(item_pos) = path.iter().rposition(|p| p == "item" || p == "entry") else {
                return;
            };
            let Some(field) = path.get(item_pos + 1) else {
                return;
            };
            item.fields.entry(field.clone()).or_default().push_str(text);
        }
        None => {
            if element == "title" && path.iter().any(|p| p == "channel" || p == "feed") && feed.title.is_none() {
                feed.title = Some(text.to_string());
            }
        }
    }
}
