//! Property-based test generators using proptest.
//!
//! Ids and names are drawn from small pools so that generated collections
//! collide on identity often enough to exercise deduplication.

use proptest::prelude::*;
use tracksync_collection::{Collection, Record, TrackLength};

const TITLES: &[&str] = &["Intro", "Outro", "Drift", "Ember", "Tide", "Halo", "Echo", "Static"];
const ARTISTS: &[&str] = &["Nova", "Lumen", "Vesper", "Orca"];
const TAGS: &[&str] = &["calm", "dark", "upbeat", "ambient", "jazz", "lofi"];

/// Strategy for track length buckets.
pub fn track_length_strategy() -> impl Strategy<Value = TrackLength> {
    prop_oneof![
        Just(TrackLength::Short),
        Just(TrackLength::Medium),
        Just(TrackLength::Long),
        Just(TrackLength::Extended),
    ]
}

fn tag_set_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(TAGS, 0..3)
}

/// Strategy for records with ids in `0..32` and pooled titles and artists.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (
        0i64..32,
        prop::sample::select(TITLES),
        prop::sample::select(ARTISTS),
        proptest::option::of("[a-z]{3,8}"),
        tag_set_strategy(),
        tag_set_strategy(),
        track_length_strategy(),
    )
        .prop_map(|(id, title, artist, fallback, moods, genres, duration)| {
            let mut record = Record::new(id, title, artist, format!("audio/{id}.mp3"))
                .with_duration(duration);
            if let Some(name) = fallback {
                record = record.with_fallback_src(format!("https://cdn.example.com/{name}.mp3"));
            }
            for mood in moods {
                record = record.with_mood(mood);
            }
            for genre in genres {
                record = record.with_genre(genre);
            }
            record
        })
}

/// Strategy for collections that may contain duplicate tracks.
pub fn raw_collection_strategy(max_len: usize) -> impl Strategy<Value = Collection> {
    prop::collection::vec(record_strategy(), 0..=max_len).prop_map(Collection::from)
}

/// Strategy for collections without duplicate tracks, the shape every
/// stored collection has.
pub fn collection_strategy(max_len: usize) -> impl Strategy<Value = Collection> {
    raw_collection_strategy(max_len).prop_map(|c| c.deduplicated())
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
