use url::Url;

use crate::models::UnitDescriptor;

const WATCH_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com"];
const SHORT_HOST: &str = "youtu.be";

/// What the observer currently sees in its page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub location: String,
    pub title: Option<String>,
}

impl PageSnapshot {
    pub fn new(location: impl Into<String>, title: Option<String>) -> Self {
        Self {
            location: location.into(),
            title,
        }
    }
}

/// A location that identifies a single video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackableUnit {
    pub unit_id: String,
    /// Canonical watch URL, identical for every location form of the same video.
    pub unit_url: String,
}

impl TrackableUnit {
    pub fn descriptor(&self, title: Option<String>) -> UnitDescriptor {
        UnitDescriptor {
            unit_id: Some(self.unit_id.clone()),
            unit_url: self.unit_url.clone(),
            title,
        }
    }
}

/// Recognises `/watch?v=`, `/shorts/<id>` and `youtu.be/<id>` locations.
pub fn trackable_unit(location: &str) -> Option<TrackableUnit> {
    let url = Url::parse(location.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();

    let candidate = if host == SHORT_HOST {
        url.path_segments()?.next().map(str::to_string)
    } else if WATCH_HOSTS.contains(&host.as_str()) {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("shorts") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };
    let unit_id = candidate?;

    is_video_id(&unit_id).then(|| TrackableUnit {
        unit_url: format!("https://www.youtube.com/watch?v={unit_id}"),
        unit_id,
    })
}

fn is_video_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 64
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
