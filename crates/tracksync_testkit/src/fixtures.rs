//! Record fixtures and store helpers.

use tempfile::TempDir;
use tracksync_collection::{Collection, Record, TrackLength};
use tracksync_store::LocalStore;

/// Builds a record whose title, artist and source are derived from `id`.
///
/// Distinct ids give distinct `(title, artist)` pairs.
pub fn track(id: i64) -> Record {
    Record::new(
        id,
        format!("Track {id}"),
        format!("Artist {}", id % 7),
        format!("audio/track-{id}.mp3"),
    )
}

/// Builds a fully populated record.
pub fn rich_track(id: i64) -> Record {
    track(id)
        .with_fallback_src(format!("https://cdn.example.com/track-{id}.mp3"))
        .with_album_art(format!("https://cdn.example.com/art-{id}.jpg"))
        .with_mood("calm")
        .with_genre("ambient")
        .with_duration(TrackLength::Long)
}

/// Builds a collection of [`track`]s with the given ids, in order.
pub fn tracks(ids: impl IntoIterator<Item = i64>) -> Collection {
    ids.into_iter().map(track).collect()
}

/// A directory-backed store with automatic cleanup.
pub struct TestStore {
    /// The store.
    pub store: LocalStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestStore {
    /// Creates a store in a fresh temporary directory.
    pub fn dir() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = LocalStore::open_dir(temp_dir.path()).expect("Failed to open store");
        Self {
            store,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the directory holding the store files.
    pub fn path(&self) -> &std::path::Path {
        self._temp_dir.path()
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary directory-backed store.
pub fn with_dir_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore) -> R,
{
    let test_store = TestStore::dir();
    f(&test_store.store)
}

/// Returns an in-memory store seeded with `collections`.
pub fn seeded_store<'a>(collections: impl IntoIterator<Item = (&'a str, Collection)>) -> LocalStore {
    let store = LocalStore::in_memory();
    for (key, collection) in collections {
        assert!(store.set(key, &collection), "seeding {key} failed");
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracksync_store::keys;

    #[test]
    fn distinct_ids_are_distinct_tracks() {
        let collection = tracks(1..=20);
        assert_eq!(collection.len(), 20);
        assert!(collection.is_deduplicated());
    }

    #[test]
    fn dir_store_persists_to_disk() {
        let test_store = TestStore::dir();
        assert!(test_store.set(keys::TRACKS, &tracks([1, 2])));
        assert!(test_store.path().join("tracks.json").exists());
    }

    #[test]
    fn seeded_store_holds_collections() {
        let store = seeded_store([(keys::PLAYLIST, tracks([3]))]);
        assert_eq!(store.get::<Collection>(keys::PLAYLIST), Some(tracks([3])));
    }

    #[test]
    fn rich_track_has_optional_fields() {
        let record = rich_track(5);
        assert!(record.fallback_src.is_some());
        assert!(record.album_art.is_some());
        with_dir_store(|store| {
            assert!(store.set("rich", &record));
            assert_eq!(store.get::<Record>("rich"), Some(record.clone()));
        });
    }
}
