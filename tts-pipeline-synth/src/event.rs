//! Storage notification envelope and the file naming contract.

use serde_json::Value;

/// Suffix a source object must carry to be synthesized (case-insensitive).
pub const TEXT_SUFFIX: &str = ".txt";

/// Suffix given to synthesized audio objects.
pub const AUDIO_SUFFIX: &str = ".wav";

/// The object a storage notification refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
    /// Bucket holding the changed object
    pub bucket: String,
    /// Object key within the bucket
    pub name: String,
}

impl ObjectEvent {
    /// Extract `bucket` and `name` from a notification payload.
    ///
    /// Accepts both the bare storage object (binary-mode CloudEvent body) and a
    /// structured-mode envelope whose `data` member holds the object. Returns
    /// `None` when either field is absent, empty or not a string. Other fields
    /// are ignored.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        Self::from_object(payload).or_else(|| payload.get("data").and_then(Self::from_object))
    }

    fn from_object(value: &Value) -> Option<Self> {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            bucket: field("bucket")?,
            name: field("name")?,
        })
    }

    /// Whether the object looks like a text file to synthesize.
    pub fn is_text_object(&self) -> bool {
        is_text_object(&self.name)
    }
}

/// Case-insensitive check for the text suffix.
pub fn is_text_object(name: &str) -> bool {
    name.len() >= TEXT_SUFFIX.len()
        && name.is_char_boundary(name.len() - TEXT_SUFFIX.len())
        && name[name.len() - TEXT_SUFFIX.len()..].eq_ignore_ascii_case(TEXT_SUFFIX)
}

/// Output key for a text object: the text suffix replaced by the audio suffix.
///
/// Keys without the text suffix get the audio suffix appended. The directory
/// part of the key is preserved.
pub fn derive_output_key(name: &str) -> String {
    let base = if is_text_object(name) {
        &name[..name.len() - TEXT_SUFFIX.len()]
    } else {
        name
    };
    format!("{}{}", base, AUDIO_SUFFIX)
}
