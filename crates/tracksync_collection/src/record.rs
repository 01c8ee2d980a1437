//! Track records.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Coarse length bucket of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackLength {
    /// Under three minutes.
    Short,
    /// Three to six minutes.
    #[default]
    Medium,
    /// Six to ten minutes.
    Long,
    /// Longer than ten minutes.
    Extended,
}

/// One track entry.
///
/// Identity for deduplication is [`Record::id`]. When two writers may have
/// assigned ids independently, `(title, artist)` acts as a secondary
/// identity: two records matching on either are the same track.
///
/// The JSON form uses camelCase keys (`fallbackSrc`, `albumArt`). `mood`
/// and `genre` accept either a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Caller-assigned unique id.
    pub id: i64,
    /// Track title.
    pub title: String,
    /// Performing artist.
    pub artist: String,
    /// Path or URI of the audio file.
    pub src: String,
    /// Alternative URI used when `src` cannot be played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_src: Option<String>,
    /// Cover art URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
    /// Mood tags.
    #[serde(default, deserialize_with = "one_or_many")]
    pub mood: BTreeSet<String>,
    /// Genre tags.
    #[serde(default, deserialize_with = "one_or_many")]
    pub genre: BTreeSet<String>,
    /// Length bucket.
    #[serde(default)]
    pub duration: TrackLength,
}

impl Record {
    /// Creates a record with no optional fields set.
    pub fn new(
        id: i64,
        title: impl Into<String>,
        artist: impl Into<String>,
        src: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            src: src.into(),
            fallback_src: None,
            album_art: None,
            mood: BTreeSet::new(),
            genre: BTreeSet::new(),
            duration: TrackLength::default(),
        }
    }

    /// Sets the fallback source.
    #[must_use]
    pub fn with_fallback_src(mut self, uri: impl Into<String>) -> Self {
        self.fallback_src = Some(uri.into());
        self
    }

    /// Sets the album art URI.
    #[must_use]
    pub fn with_album_art(mut self, uri: impl Into<String>) -> Self {
        self.album_art = Some(uri.into());
        self
    }

    /// Adds a mood tag.
    #[must_use]
    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood.insert(mood.into());
        self
    }

    /// Adds a genre tag.
    #[must_use]
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre.insert(genre.into());
        self
    }

    /// Sets the length bucket.
    #[must_use]
    pub fn with_duration(mut self, duration: TrackLength) -> Self {
        self.duration = duration;
        self
    }

    /// Returns the secondary identity `(title, artist)`.
    pub fn title_artist(&self) -> (&str, &str) {
        (&self.title, &self.artist)
    }

    /// Returns true if both records denote the same track.
    pub fn same_track(&self, other: &Record) -> bool {
        self.id == other.id || self.title_artist() == other.title_artist()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => BTreeSet::new(),
        Some(OneOrMany::One(tag)) if tag.is_empty() => BTreeSet::new(),
        Some(OneOrMany::One(tag)) => BTreeSet::from([tag]),
        Some(OneOrMany::Many(tags)) => tags.into_iter().collect(),
    })
}
