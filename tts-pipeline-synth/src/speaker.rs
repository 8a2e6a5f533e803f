//! Speaker registry and the voice selection policy.

use tracing::warn;

/// Internal speaker identifier understood by an engine.
pub type SpeakerId = u32;

/// Speaker used when an engine exposes no speakers at all.
pub const FALLBACK_SPEAKER_ID: SpeakerId = 0;

/// Ordered mapping from voice name to speaker id.
///
/// Order is the order the engine reported its speakers in, and decides which
/// entry counts as "first" during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerRegistry {
    entries: Vec<(String, SpeakerId)>,
}

impl SpeakerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a speaker id by exact name.
    pub fn get(&self, name: &str) -> Option<SpeakerId> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    /// First registered entry.
    pub fn first(&self) -> Option<(&str, SpeakerId)> {
        self.entries.first().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SpeakerId)> {
        self.entries.iter().map(|(n, id)| (n.as_str(), *id))
    }
}

impl<S: Into<String>> FromIterator<(S, SpeakerId)> for SpeakerRegistry {
    fn from_iter<I: IntoIterator<Item = (S, SpeakerId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, id)| (n.into(), id)).collect(),
        }
    }
}

/// Conventional default voice label for a language.
///
/// English ships several accents and names its neutral voice `EN-Default`;
/// the other languages expose a single voice named after the language code.
pub fn default_speaker_name(language: &str) -> String {
    let language = language.to_uppercase();
    if language == "EN" {
        "EN-Default".to_string()
    } else {
        language
    }
}

/// Pick the speaker to synthesize with.
///
/// Precedence: the language's conventional default voice, then the first
/// registered speaker, then [`FALLBACK_SPEAKER_ID`]. Never fails.
pub fn resolve_speaker(registry: Option<&SpeakerRegistry>, language: &str) -> SpeakerId {
    let Some(registry) = registry else {
        warn!(language, "Engine exposes no speaker registry, using fallback speaker");
        return FALLBACK_SPEAKER_ID;
    };

    let default_name = default_speaker_name(language);
    if let Some(id) = registry.get(&default_name) {
        return id;
    }

    match registry.first() {
        Some((name, id)) => {
            warn!(
                language,
                default = %default_name,
                chosen = name,
                "Default speaker unavailable, using first registered speaker"
            );
            id
        }
        None => {
            warn!(language, "Speaker registry is empty, using fallback speaker");
            FALLBACK_SPEAKER_ID
        }
    }
}
