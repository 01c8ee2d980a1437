//! The shared remote document.

use crate::collection::Collection;
use crate::error::{CollectionError, CollectionResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Key holding the ISO-8601 time of the last write.
pub const LAST_UPDATED_KEY: &str = "lastUpdated";

/// Collection that the legacy bare-array document is read as.
pub const LEGACY_COLLECTION: &str = "tracks";

/// The JSON object stored inside the remote document file.
///
/// The object is keyed by collection name plus `lastUpdated`:
///
/// ```json
/// { "tracks": [...], "playlist": [...], "lastUpdated": "2024-05-01T10:00:00.000Z" }
/// ```
///
/// Keys this crate does not know about are preserved untouched, so a write
/// of one collection never drops a sibling written by another client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteDocument {
    entries: Map<String, Value>,
    last_updated: Option<DateTime<Utc>>,
}

impl RemoteDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses document content in the current keyed-object shape.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Json`] if the content is not JSON and
    /// [`CollectionError::Malformed`] if it is not a JSON object.
    pub fn parse(content: &str) -> CollectionResult<Self> {
        match serde_json::from_str::<Value>(content)? {
            Value::Object(entries) => Ok(Self::from_entries(entries)),
            other => Err(CollectionError::malformed(format!(
                "expected a JSON object, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Parses content from the legacy file.
    ///
    /// The legacy shape is a bare array of records, read as the
    /// [`LEGACY_COLLECTION`] collection. Content that is already a keyed
    /// object is accepted as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is neither an array of records nor
    /// an object.
    pub fn parse_legacy(content: &str) -> CollectionResult<Self> {
        match serde_json::from_str::<Value>(content)? {
            Value::Array(items) => {
                let tracks: Collection = serde_json::from_value(Value::Array(items))?;
                let mut doc = Self::new();
                doc.set_collection(LEGACY_COLLECTION, &tracks)?;
                Ok(doc)
            }
            Value::Object(entries) => Ok(Self::from_entries(entries)),
            other => Err(CollectionError::malformed(format!(
                "expected a JSON array or object, found {}",
                kind_of(&other)
            ))),
        }
    }

    fn from_entries(mut entries: Map<String, Value>) -> Self {
        let last_updated = entries
            .remove(LAST_UPDATED_KEY)
            .and_then(|v| v.as_str().map(str::to_owned))
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            entries,
            last_updated,
        }
    }

    /// Returns true if the document holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the document has a value under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the names of all keys except `lastUpdated`.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Reads the collection stored under `name`.
    ///
    /// A missing key reads as an empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is not an array of records.
    pub fn collection(&self, name: &str) -> CollectionResult<Collection> {
        match self.entries.get(name) {
            None | Some(Value::Null) => Ok(Collection::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                CollectionError::malformed(format!("collection {name:?} is unreadable: {e}"))
            }),
        }
    }

    /// Stores `collection` under `name`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is the reserved `lastUpdated` key.
    pub fn set_collection(&mut self, name: &str, collection: &Collection) -> CollectionResult<()> {
        if name == LAST_UPDATED_KEY {
            return Err(CollectionError::malformed(format!(
                "{LAST_UPDATED_KEY:?} is reserved"
            )));
        }
        self.entries
            .insert(name.to_string(), serde_json::to_value(collection)?);
        Ok(())
    }

    /// Returns the time of the last write, if recorded and parseable.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Sets the time of the last write.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
    }

    /// Serializes the document, `lastUpdated` included.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CollectionResult<String> {
        let mut object = self.entries.clone();
        if let Some(ts) = self.last_updated {
            object.insert(
                LAST_UPDATED_KEY.to_string(),
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        Ok(serde_json::to_string_pretty(&Value::Object(object))?)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::TimeZone;
    use serde_json::json;

    fn tracks() -> Collection {
        vec![
            Record::new(1, "Intro", "Nova", "a.mp3"),
            Record::new(2, "Outro", "Nova", "b.mp3"),
        ]
        .into()
    }

    #[test]
    fn parse_keyed_document() {
        let content = json!({
            "tracks": [{"id": 1, "title": "Intro", "artist": "Nova", "src": "a.mp3"}],
            "lastUpdated": "2024-05-01T10:00:00.000Z"
        })
        .to_string();

        let doc = RemoteDocument::parse(&content).unwrap();
        assert_eq!(doc.collection("tracks").unwrap().len(), 1);
        assert_eq!(
            doc.last_updated(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert!(!doc.contains(LAST_UPDATED_KEY));
    }

    #[test]
    fn parse_rejects_bare_array() {
        let result = RemoteDocument::parse("[]");
        assert!(matches!(result, Err(CollectionError::Malformed(_))));
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let result = RemoteDocument::parse("{oops");
        assert!(matches!(result, Err(CollectionError::Json(_))));
    }

    #[test]
    fn parse_legacy_array_reads_as_tracks() {
        let content = serde_json::to_string(&tracks()).unwrap();
        let doc = RemoteDocument::parse_legacy(&content).unwrap();

        assert_eq!(doc.collection(LEGACY_COLLECTION).unwrap(), tracks());
        assert!(doc.last_updated().is_none());
    }

    #[test]
    fn missing_collection_reads_as_empty() {
        let doc = RemoteDocument::new();
        assert!(doc.collection("playlist").unwrap().is_empty());
    }

    #[test]
    fn wrong_shaped_collection_is_malformed() {
        let doc = RemoteDocument::parse(r#"{"playlist": {"id": 1}}"#).unwrap();
        assert!(matches!(
            doc.collection("playlist"),
            Err(CollectionError::Malformed(_))
        ));
    }

    #[test]
    fn set_collection_keeps_siblings_and_unknown_keys() {
        let mut doc =
            RemoteDocument::parse(r#"{"playlist": [], "settings": {"volume": 3}}"#).unwrap();
        doc.set_collection("tracks", &tracks()).unwrap();

        let names: Vec<&str> = doc.names().collect();
        assert!(names.contains(&"playlist"));
        assert!(names.contains(&"settings"));
        assert!(names.contains(&"tracks"));
    }

    #[test]
    fn last_updated_is_reserved() {
        let mut doc = RemoteDocument::new();
        assert!(doc.set_collection(LAST_UPDATED_KEY, &tracks()).is_err());
    }

    #[test]
    fn to_json_writes_iso_timestamp() {
        let mut doc = RemoteDocument::new();
        doc.set_collection("tracks", &tracks()).unwrap();
        doc.touch(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());

        let value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value[LAST_UPDATED_KEY], "2024-05-01T10:00:00.000Z");
        assert_eq!(value["tracks"].as_array().unwrap().len(), 2);

        let reparsed = RemoteDocument::parse(&doc.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn unparseable_timestamp_is_dropped() {
        let doc = RemoteDocument::parse(r#"{"lastUpdated": "yesterday"}"#).unwrap();
        assert!(doc.last_updated().is_none());
        assert!(doc.is_empty());
    }
}
