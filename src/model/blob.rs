use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::error::{ConnectorError, Result};

/// Per-invocation input for the upload method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInput {
    /// Local staging path; the blob is named after it.
    pub file: String,
    /// Content written to `file` before the upload.
    pub data: String,
}

impl UploadInput {
    pub fn new(file: &str, data: &str) -> Self {
        Self {
            file: file.to_string(),
            data: data.to_string(),
        }
    }

    /// Reads `file` and `data` from the host's input map.
    ///
    /// Missing or null values become empty strings, scalars are rendered as
    /// text, and nested values are rejected.
    pub fn from_map(values: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            file: coerce_to_string(values, "file")?,
            data: coerce_to_string(values, "data")?,
        })
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("file".to_string(), Value::String(self.file.clone()));
        map.insert("data".to_string(), Value::String(self.data.clone()));
        map
    }
}

fn coerce_to_string(values: &Map<String, Value>, key: &str) -> Result<String> {
    match values.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ConnectorError::InvalidConfig(format!(
            "input `{}` must be a string, got {}",
            key, other
        ))),
    }
}

/// Metadata the service reports for one blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub name: String,
    pub content_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_type: Option<String>,
}

/// Result of a full listing pass, keyed by blob name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOutput {
    pub result: BTreeMap<String, BlobDescriptor>,
}

impl ListOutput {
    /// Records `blob`, replacing any earlier entry with the same name.
    ///
    /// Listings are not snapshots: a name can show up again in a later
    /// segment if the container changes mid-listing. The later entry wins.
    pub fn insert(&mut self, blob: BlobDescriptor) -> Option<BlobDescriptor> {
        self.result.insert(blob.name.clone(), blob)
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "result".to_string(),
            serde_json::to_value(&self.result).unwrap_or(Value::Null),
        );
        map
    }
}

/// Continuation state of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageMarker {
    /// No segment fetched yet.
    #[default]
    Start,
    /// More segments remain, resume from this token.
    Continue(String),
    /// The previous segment was the last one.
    Done,
}

impl PageMarker {
    /// Interprets the continuation token a segment came back with. Absent and
    /// empty tokens both mean the listing is complete.
    pub fn from_next(next: Option<String>) -> Self {
        match next {
            Some(token) if !token.is_empty() => PageMarker::Continue(token),
            _ => PageMarker::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, PageMarker::Done)
    }

    /// Token to send with the next request, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            PageMarker::Continue(token) => Some(token),
            PageMarker::Start | PageMarker::Done => None,
        }
    }
}

/// One page of a blob listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSegment {
    pub blobs: Vec<BlobDescriptor>,
    pub next_marker: PageMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub blob_name: String,
    pub blocks: usize,
    pub bytes: u64,
}

/// What one invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Uploaded(UploadReceipt),
    Listed(ListOutput),
}

impl Output {
    /// Renders the output the way the host expects it. Only a listing
    /// populates `result`.
    pub fn to_map(&self) -> Map<String, Value> {
        match self {
            Output::Listed(list) => list.to_map(),
            Output::Uploaded(_) => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn descriptor(name: &str, len: u64) -> BlobDescriptor {
        BlobDescriptor {
            name: name.to_string(),
            content_length: len,
            ..Default::default()
        }
    }

    #[test]
    fn test_page_marker_from_next() {
        assert_eq!(PageMarker::from_next(None), PageMarker::Done);
        assert_eq!(PageMarker::from_next(Some(String::new())), PageMarker::Done);
        assert_eq!(
            PageMarker::from_next(Some("2!abc".to_string())),
            PageMarker::Continue("2!abc".to_string())
        );
    }

    #[test]
    fn test_page_marker_start_is_not_done() {
        let marker = PageMarker::default();
        assert!(!marker.is_done());
        assert_eq!(marker.token(), None);
    }

    #[test]
    fn test_list_output_last_write_wins() {
        let mut out = ListOutput::default();
        assert!(out.insert(descriptor("a.txt", 1)).is_none());
        assert!(out.insert(descriptor("b.txt", 2)).is_none());
        let previous = out.insert(descriptor("a.txt", 10));

        assert_eq!(previous.map(|d| d.content_length), Some(1));
        assert_eq!(out.len(), 2);
        assert_eq!(out.result["a.txt"].content_length, 10);
    }

    #[test]
    fn test_upload_input_from_map() {
        let map = match json!({ "file": "sample.txt", "data": "Sample Blob" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let input = UploadInput::from_map(&map).unwrap();
        assert_eq!(input, UploadInput::new("sample.txt", "Sample Blob"));
        assert_eq!(input.to_map(), map);
    }

    #[test]
    fn test_upload_input_coercion() {
        let map = match json!({ "file": "n.txt", "data": 42 }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let input = UploadInput::from_map(&map).unwrap();
        assert_eq!(input.data, "42");

        let input = UploadInput::from_map(&Map::new()).unwrap();
        assert_eq!(input, UploadInput::default());

        let map = match json!({ "file": ["a"] }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(matches!(
            UploadInput::from_map(&map),
            Err(ConnectorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_output_to_map() {
        let mut list = ListOutput::default();
        list.insert(descriptor("a.txt", 3));
        let map = Output::Listed(list).to_map();
        assert_eq!(map["result"]["a.txt"]["content_length"], json!(3));
        assert!(map["result"]["a.txt"].get("etag").is_none());

        let uploaded = Output::Uploaded(UploadReceipt {
            blob_name: "a.txt".to_string(),
            blocks: 1,
            bytes: 3,
        });
        assert!(uploaded.to_map().is_empty());
    }
}
