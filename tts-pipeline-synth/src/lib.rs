//! TTS Pipeline Synthesis Trigger Library
//!
//! Reacts to text objects landing in a storage bucket: loads a text-to-speech
//! engine for the configured language (once per process), synthesizes the
//! text and uploads the waveform to the output bucket under the same key with
//! a `.wav` suffix.

pub mod cache;
pub mod engine;
pub mod event;
pub mod handler;
pub mod server;
pub mod speaker;

#[cfg(test)]
mod testing;

pub use cache::EngineCache;
pub use engine::{EngineError, EngineHandle, EngineLoader, HttpEngineLoader, SynthesisEngine};
pub use event::{ObjectEvent, derive_output_key, is_text_object};
pub use handler::{Outcome, SkipReason, TriggerError, TriggerHandler, TriggerSettings};
pub use server::router;
pub use speaker::{FALLBACK_SPEAKER_ID, SpeakerId, SpeakerRegistry, resolve_speaker};
