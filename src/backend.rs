//! Speech-backend contracts.
//!
//! Two interchangeable shapes exist: a streaming on-device recognizer that
//! pushes typed events over a channel, and a cloud client polled for
//! full-session transcriptions. The engine only needs "give me the latest
//! raw text" and "I am done"; everything else about the backends lives
//! outside this crate.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Events pushed by the native (on-device) recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Recognizer is up and consuming audio.
    Ready,
    /// Recognizer-reported failure; treated as fatal for the session.
    Error(String),
    /// Recognizer finished on its own (end of stream).
    Ended,
    /// Latest hypothesis for the current utterance. `text` is a full
    /// restatement, not an increment.
    Transcript { text: String, is_final: bool },
}

/// Streaming on-device recognizer.
#[async_trait]
pub trait NativeBackend: Send + Sync {
    /// Starts recognition and returns the event stream for this session.
    async fn start(&self, language: &str) -> Result<mpsc::Receiver<BackendEvent>>;

    /// Signals the recognizer to terminate. Late events may still arrive on
    /// the channel afterwards and are consumed during finalization.
    async fn stop(&self);
}

/// Cloud transcription client, polled periodically for a transcription of
/// the full session audio captured so far.
#[async_trait]
pub trait CloudTranscriber: Send + Sync {
    async fn transcribe_session(&self, language: &str) -> Result<String>;
}

/// Microphone capture lifecycle. Permission problems surface from `start`.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self);
}
