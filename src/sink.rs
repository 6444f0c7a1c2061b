//! Output-side collaborators: the text-insertion sink and the refinement
//! service. Both are narrow trait contracts; the host wires in concrete
//! implementations (key injection, HTTP clients) that this crate never
//! sees.

use anyhow::Result;
use async_trait::async_trait;

/// Result of a single insertion attempt. Sinks signal failure through
/// `consumed: false`, never through an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub consumed: bool,
}

impl InsertOutcome {
    pub fn consumed() -> Self {
        Self { consumed: true }
    }

    pub fn rejected() -> Self {
        Self { consumed: false }
    }
}

/// Types text into whatever window last had focus.
#[async_trait]
pub trait TextSink: Send + Sync {
    async fn insert(&self, text: &str) -> InsertOutcome;

    /// Immediate delivery attempts per queue visit. The external typing
    /// sink gets one; an in-app onboarding sink may report two.
    fn immediate_attempts(&self) -> u32 {
        1
    }
}

/// Best-effort transcript cleanup. Failures are swallowed by the caller and
/// the original text is used.
#[async_trait]
pub trait RefinementService: Send + Sync {
    async fn refine(&self, text: &str) -> Result<String>;
}
