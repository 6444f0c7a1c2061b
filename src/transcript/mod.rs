//! Transcript text reconciliation primitives.
//!
//! Pure functions only: normalization, recognizer-noise scrubbing,
//! overlapping-chunk merging, append-only delta extraction, and boundary
//! formatting. All comparison-sensitive callers normalize first so cosmetic
//! backend differences never read as content rewrites.

mod delta;
mod format;
mod merge;
mod normalize;
mod scrub;

pub use delta::{
    compute_append_only_delta, extract_strict_suffix, LENIENT_OVERLAP_WINDOW_WORDS,
    STRICT_MIN_OVERLAP_WORDS, STRICT_OVERLAP_WINDOW_WORDS,
};
pub use format::format_delta;
pub use merge::{merge_chunks, MERGE_OVERLAP_WINDOW_WORDS};
pub use normalize::normalize;
pub use scrub::scrub_transcript;
