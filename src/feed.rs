use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::error::{ComposeError, ComposeResult};
use crate::fetch::fetch_bytes;

pub const DEFAULT_FEED_URL: &str = "https://raw.githubusercontent.com/CloudNativeLinz/cloudnativelinz.github.io/refs/heads/main/_data/events.yml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Talk {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub speaker: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image: String,
}

/// One entry of the events feed. Keys the compositor does not use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub host: String,
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub talks: Vec<Talk>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Talk>, D::Error> {
    Ok(Option::<Vec<Talk>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Flat view of an event in template terms. Only the first two talks map to
/// speaker slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEventData {
    pub speaker1_title: String,
    pub speaker1_name: String,
    pub speaker1_image: String,
    pub speaker2_title: String,
    pub speaker2_name: String,
    pub speaker2_image: String,
    pub sponsor: String,
    pub date: String,
    pub event_title: String,
    pub event_id: i64,
}

impl ResolvedEventData {
    pub fn from_event(event: &EventRecord) -> Self {
        let talk = |index: usize| event.talks.get(index).cloned().unwrap_or_default();
        let (first, second) = (talk(0), talk(1));
        Self {
            speaker1_title: first.title,
            speaker1_name: first.speaker,
            speaker1_image: first.image,
            speaker2_title: second.title,
            speaker2_name: second.speaker,
            speaker2_image: second.image,
            sponsor: event.host.clone(),
            date: event.date.clone(),
            event_title: event.title.clone(),
            event_id: event.id,
        }
    }

    pub fn speaker_image(&self, slot: usize) -> &str {
        match slot {
            1 => &self.speaker1_image,
            2 => &self.speaker2_image,
            _ => "",
        }
    }
}

/// Where the events feed comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    File(PathBuf),
    Remote(String),
}

impl FeedSource {
    pub fn origin(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }
}

impl Default for FeedSource {
    fn default() -> Self {
        Self::Remote(DEFAULT_FEED_URL.to_owned())
    }
}

pub fn parse_event_feed(text: &str, origin: &str) -> ComposeResult<Vec<EventRecord>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str::<Option<Vec<EventRecord>>>(text)
        .map(Option::unwrap_or_default)
        .map_err(|error| {
            let message = match error.location() {
                Some(location) => format!(
                    "line {}, column {}: {error}",
                    location.line(),
                    location.column()
                ),
                None => error.to_string(),
            };
            ComposeError::FeedParse {
                origin: origin.to_owned(),
                message,
            }
        })
}

pub fn load_event_feed(source: &FeedSource) -> ComposeResult<Vec<EventRecord>> {
    let origin = source.origin();
    let text = match source {
        FeedSource::File(path) => {
            fs::read_to_string(path).map_err(|error| ComposeError::FeedFetch {
                origin: origin.clone(),
                message: error.to_string(),
            })?
        }
        FeedSource::Remote(url) => {
            let fetched = fetch_bytes(url).map_err(|error| ComposeError::FeedFetch {
                origin: origin.clone(),
                message: error.to_string(),
            })?;
            String::from_utf8(fetched.bytes).map_err(|error| ComposeError::FeedParse {
                origin: origin.clone(),
                message: format!("feed is not valid UTF-8: {error}"),
            })?
        }
    };
    parse_event_feed(&text, &origin)
}

pub fn find_event(events: &[EventRecord], id: i64) -> ComposeResult<&EventRecord> {
    events
        .iter()
        .find(|event| event.id == id)
        .ok_or(ComposeError::EventNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FEED: &str = r#"
- id: 41
  date: 2024-05-23
  title: "Spring Meetup"
  host: "ACME GmbH"
  location: Linz
  talks:
    - title: "Observability at scale"
      speaker: "Jane Doe"
      image: "https://example.com/jane.png"
      slides: "https://example.com/slides"
    - title: "eBPF for humans"
      speaker: "John Roe"
      image: /assets/speakers/john.jpg
    - title: "Lightning talk"
      speaker: "Third Speaker"
- id: 42
  date:
  talks:
"#;

    #[test]
    fn parses_events_and_ignores_unknown_keys() {
        let events = parse_event_feed(FEED, "events.yml").expect("feed should parse");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].talks.len(), 3);
        assert_eq!(events[0].date, "2024-05-23");
        assert_eq!(events[1].date, "");
        assert!(events[1].talks.is_empty());
    }

    #[test]
    fn resolution_uses_only_first_two_talks() {
        let events = parse_event_feed(FEED, "events.yml").expect("feed should parse");
        let data = ResolvedEventData::from_event(&events[0]);
        assert_eq!(data.speaker1_name, "Jane Doe");
        assert_eq!(data.speaker2_title, "eBPF for humans");
        assert_eq!(data.speaker_image(2), "/assets/speakers/john.jpg");
        assert_eq!(data.sponsor, "ACME GmbH");
        assert_eq!(data.event_title, "Spring Meetup");
        assert_eq!(data.event_id, 41);

        let empty = ResolvedEventData::from_event(&events[1]);
        assert_eq!(empty.speaker1_title, "");
        assert_eq!(empty.speaker_image(1), "");
    }

    #[test]
    fn unknown_event_id_is_fatal() {
        let events = parse_event_feed(FEED, "events.yml").expect("feed should parse");
        assert_eq!(find_event(&events, 42).expect("event should exist").id, 42);
        let err = find_event(&events, 7).unwrap_err();
        assert!(matches!(err, ComposeError::EventNotFound(7)));
        assert!(err.is_fatal());
    }

    #[test]
    fn parse_errors_carry_location() {
        let err = parse_event_feed("- id: [1, 2\n", "broken.yml").unwrap_err();
        assert!(matches!(err, ComposeError::FeedParse { .. }));
        let text = err.to_string();
        assert!(text.contains("broken.yml"));
        assert!(text.contains("line"), "got: {text}");
    }

    #[test]
    fn empty_feed_has_no_events() {
        assert!(parse_event_feed("", "empty.yml")
            .expect("empty feed should parse")
            .is_empty());
    }

    #[test]
    fn loads_feed_from_local_file() {
        let dir = tempdir().expect("tempdir should create");
        let path = dir.path().join("events.yml");
        fs::write(&path, FEED).expect("feed should write");
        let events = load_event_feed(&FeedSource::File(path)).expect("feed should load");
        assert_eq!(events.len(), 2);

        let missing = load_event_feed(&FeedSource::File(dir.path().join("nope.yml"))).unwrap_err();
        assert!(matches!(missing, ComposeError::FeedFetch { .. }));
    }
}
