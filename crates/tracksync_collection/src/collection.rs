//! Ordered collections of records and the merge primitive.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named, order-significant sequence of records.
///
/// Insertion order drives playback and display order. The JSON form is a
/// plain array of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    records: Vec<Record>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the records in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterates over the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Consumes the collection, returning its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Returns the record with the given id.
    pub fn get(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Returns true if a record matching `record` by id or `(title, artist)`
    /// is present.
    pub fn contains_track(&self, record: &Record) -> bool {
        self.records.iter().any(|r| r.same_track(record))
    }

    /// Appends `record` unless the same track is already present.
    ///
    /// Returns true if the record was appended.
    pub fn push(&mut self, record: Record) -> bool {
        if self.contains_track(&record) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Removes the record with the given id.
    pub fn remove(&mut self, id: i64) -> Option<Record> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Moves the record at `from` so that it ends up at index `to`.
    ///
    /// Returns false (and leaves the order unchanged) if either index is out
    /// of bounds.
    pub fn move_to(&mut self, from: usize, to: usize) -> bool {
        if from >= self.records.len() || to >= self.records.len() {
            return false;
        }
        let record = self.records.remove(from);
        self.records.insert(to, record);
        true
    }

    /// Removes all records.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Returns a copy with later duplicates (by id or `(title, artist)`)
    /// dropped. The first occurrence of each track wins.
    #[must_use]
    pub fn deduplicated(&self) -> Self {
        merge(self, &Collection::new())
    }

    /// Returns true if no two records denote the same track.
    pub fn is_deduplicated(&self) -> bool {
        let mut index = IdentityIndex::with_capacity(self.records.len());
        self.records.iter().all(|r| index.insert(r))
    }
}

/// Merges `incoming` into `base`.
///
/// The result starts from `base` and appends each record of `incoming` only
/// if no record already in the result matches it by `id` or by
/// `(title, artist)`. `base` wins ties; nothing is replaced. Order is
/// preserved: base records first, then new incoming records in their
/// incoming order.
///
/// Duplicates inside `base` itself are dropped too, so the result never
/// contains two records for the same track.
///
/// ```rust
/// use tracksync_collection::{merge, Collection, Record};
///
/// let local: Collection = vec![Record::new(1, "Intro", "Nova", "a.mp3")].into();
/// let remote: Collection = vec![
///     Record::new(1, "Intro", "Nova", "a.mp3"),
///     Record::new(2, "Outro", "Nova", "b.mp3"),
/// ]
/// .into();
///
/// let merged = merge(&local, &remote);
/// assert_eq!(merged.len(), 2);
/// ```
pub fn merge(base: &Collection, incoming: &Collection) -> Collection {
    let mut index = IdentityIndex::with_capacity(base.len() + incoming.len());
    let records = base
        .iter()
        .chain(incoming.iter())
        .filter(|r| index.insert(r))
        .cloned()
        .collect();
    Collection { records }
}

/// Seen ids and `(title, artist)` pairs.
struct IdentityIndex {
    ids: HashSet<i64>,
    pairs: HashSet<(String, String)>,
}

impl IdentityIndex {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(capacity),
            pairs: HashSet::with_capacity(capacity),
        }
    }

    /// Records `record` as seen; returns false if it matched an earlier one.
    fn insert(&mut self, record: &Record) -> bool {
        let pair = (record.title.clone(), record.artist.clone());
        if self.ids.contains(&record.id) || self.pairs.contains(&pair) {
            return false;
        }
        self.ids.insert(record.id);
        self.pairs.insert(pair);
        true
    }
}

impl From<Vec<Record>> for Collection {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for Collection {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Collection {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: i64, title: &str, artist: &str) -> Record {
        Record::new(id, title, artist, format!("/audio/{id}.mp3"))
    }

    fn ids(collection: &Collection) -> Vec<i64> {
        collection.iter().map(|r| r.id).collect()
    }

    #[test]
    fn merge_appends_new_records_in_order() {
        let base: Collection = vec![track(1, "A", "X"), track(2, "B", "X")].into();
        let incoming: Collection = vec![track(3, "C", "Y"), track(4, "D", "Y")].into();

        assert_eq!(ids(&merge(&base, &incoming)), vec![1, 2, 3, 4]);
    }

    #[test]
    fn merge_skips_matching_id_and_base_wins() {
        let base: Collection = vec![track(1, "A", "X")].into();
        let incoming: Collection = vec![track(1, "A (remaster)", "X")].into();

        let merged = merge(&base, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.records()[0].title, "A");
    }

    #[test]
    fn merge_skips_matching_title_artist_with_different_id() {
        let base: Collection = vec![track(1, "A", "X")].into();
        let incoming: Collection = vec![track(99, "A", "X"), track(100, "A", "Y")].into();

        assert_eq!(ids(&merge(&base, &incoming)), vec![1, 100]);
    }

    #[test]
    fn merge_with_empty_incoming_returns_base() {
        let base: Collection = vec![track(1, "A", "X"), track(2, "B", "X")].into();
        assert_eq!(merge(&base, &Collection::new()), base);
    }

    #[test]
    fn merge_into_empty_base_copies_incoming() {
        let incoming: Collection = vec![track(5, "E", "Z"), track(6, "F", "Z")].into();
        assert_eq!(merge(&Collection::new(), &incoming), incoming);
    }

    #[test]
    fn merge_is_idempotent() {
        let a: Collection = vec![track(1, "A", "X"), track(2, "B", "X")].into();
        assert_eq!(merge(&a, &a), a);
    }

    #[test]
    fn merge_drops_duplicates_inside_incoming() {
        let incoming: Collection =
            vec![track(1, "A", "X"), track(2, "A", "X"), track(1, "Z", "Z")].into();
        assert_eq!(ids(&merge(&Collection::new(), &incoming)), vec![1]);
    }

    #[test]
    fn push_rejects_same_track() {
        let mut c = Collection::new();
        assert!(c.push(track(1, "A", "X")));
        assert!(!c.push(track(2, "A", "X")));
        assert!(!c.push(track(1, "B", "Y")));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn remove_by_id() {
        let mut c: Collection = vec![track(1, "A", "X"), track(2, "B", "X")].into();
        assert_eq!(c.remove(1).map(|r| r.id), Some(1));
        assert!(c.remove(1).is_none());
        assert_eq!(ids(&c), vec![2]);
    }

    #[test]
    fn move_to_reorders() {
        let mut c: Collection =
            vec![track(1, "A", "X"), track(2, "B", "X"), track(3, "C", "X")].into();
        assert!(c.move_to(0, 2));
        assert_eq!(ids(&c), vec![2, 3, 1]);
        assert!(c.move_to(2, 0));
        assert_eq!(ids(&c), vec![1, 2, 3]);
        assert!(!c.move_to(0, 3));
        assert_eq!(ids(&c), vec![1, 2, 3]);
    }

    #[test]
    fn deduplicated_keeps_first_occurrence() {
        let c: Collection = vec![track(1, "A", "X"), track(1, "B", "Y"), track(2, "C", "Z")].into();
        assert!(!c.is_deduplicated());
        let d = c.deduplicated();
        assert!(d.is_deduplicated());
        assert_eq!(ids(&d), vec![1, 2]);
        assert_eq!(d.records()[0].title, "A");
    }

    #[test]
    fn serializes_as_plain_array() {
        let c: Collection = vec![track(1, "A", "X")].into();
        let value = serde_json::to_value(&c).unwrap();
        assert!(value.is_array());
        let back: Collection = serde_json::from_value(value).unwrap();
        assert_eq!(back, c);
    }
}
