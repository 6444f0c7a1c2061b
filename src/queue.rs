//! Retry-bounded dispatch queue between transcript reconciliation and the
//! text sink.
//!
//! Each enqueued item is a formatted-later suffix extracted against a
//! forward-only anchor. The anchor always advances to the latest snapshot,
//! even when extraction fails: a confusing snapshot must not poison delta
//! extraction for every snapshot after it. Draining preserves FIFO order,
//! retries a rejected item a bounded number of times, and drops it with a
//! warning once the bound is exhausted so one stuck insertion can never
//! wedge the session.

use std::collections::VecDeque;
use std::time::Duration;

use crate::sink::TextSink;
use crate::transcript::{extract_strict_suffix, format_delta, normalize};

/// Re-dispatch attempts after the first failed visit (3 total tries).
pub const NATIVE_MAX_TYPE_RETRIES: u32 = 2;
/// Pause before revisiting the queue after a failed insertion.
pub const TYPE_RETRY_BACKOFF: Duration = Duration::from_millis(220);

/// Why a snapshot was flushed into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// Periodic flush timer fired.
    Timer,
    /// No new transcript events for the silence window.
    Silence,
    /// Backend marked the hypothesis final.
    Final,
    /// User requested stop.
    Stop,
    /// Backend event stream ended.
    Ended,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Timer => "timer",
            FlushReason::Silence => "silence",
            FlushReason::Final => "final",
            FlushReason::Stop => "stop",
            FlushReason::Ended => "ended",
        }
    }
}

/// One undelivered suffix.
#[derive(Debug, Clone)]
pub struct PendingSuffix {
    pub text: String,
    pub attempts: u32,
    pub reason: FlushReason,
}

/// FIFO suffix queue with a forward-only anchor.
#[derive(Debug, Default)]
pub struct SuffixQueue {
    items: VecDeque<PendingSuffix>,
    anchor: String,
    last_enqueued: Option<String>,
}

impl SuffixQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts the unseen suffix of `raw_snapshot` relative to the anchor
    /// and enqueues it. The anchor advances to the snapshot unconditionally.
    /// Returns whether anything was enqueued.
    pub fn enqueue(&mut self, reason: FlushReason, raw_snapshot: &str) -> bool {
        let snapshot = normalize(raw_snapshot);
        if snapshot.is_empty() {
            return false;
        }

        let suffix = extract_strict_suffix(&self.anchor, &snapshot);
        self.anchor = snapshot;

        let key = normalize(&suffix);
        if key.is_empty() {
            return false;
        }
        // Timer and silence flushes routinely re-offer the same stable
        // suffix; only the first copy may type.
        if self.last_enqueued.as_deref() == Some(key.as_str()) {
            log::debug!(
                target: "sotto::queue",
                "skipping duplicate suffix ({}): {:?}",
                reason.as_str(),
                key
            );
            return false;
        }
        self.last_enqueued = Some(key);

        log::debug!(
            target: "sotto::queue",
            "enqueue ({}): {:?}",
            reason.as_str(),
            suffix
        );
        self.items.push_back(PendingSuffix {
            text: suffix,
            attempts: 0,
            reason,
        });
        true
    }

    /// Starts a fresh extraction context at an utterance boundary. The
    /// duplicate guard is cleared too: after a boundary, identical text is
    /// a genuine repetition, not a re-offer.
    pub fn reset_anchor(&mut self) {
        self.anchor.clear();
        self.last_enqueued = None;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops all undelivered items. Used when finalization gives up.
    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            log::warn!(
                target: "sotto::queue",
                "discarding {} undelivered suffix(es)",
                self.items.len()
            );
            self.items.clear();
        }
    }

    /// Delivers queued suffixes to `sink` in order, appending successful
    /// insertions to `live_typed`.
    pub async fn drain(&mut self, sink: &dyn TextSink, live_typed: &mut String) {
        while let Some(mut item) = self.items.pop_front() {
            let formatted = format_delta(live_typed, &item.text);
            if formatted.is_empty() {
                continue;
            }

            let tries = sink.immediate_attempts().max(1);
            let mut delivered = false;
            for _ in 0..tries {
                if sink.insert(&formatted).await.consumed {
                    delivered = true;
                    break;
                }
            }

            if delivered {
                live_typed.push_str(&formatted);
                continue;
            }

            item.attempts += 1;
            if item.attempts > NATIVE_MAX_TYPE_RETRIES {
                log::warn!(
                    target: "sotto::queue",
                    "dropping suffix after {} attempts ({}): {:?}",
                    item.attempts,
                    item.reason.as_str(),
                    item.text
                );
                continue;
            }
            log::debug!(
                target: "sotto::queue",
                "insertion rejected, retrying (attempt {}): {:?}",
                item.attempts,
                item.text
            );
            self.items.push_back(item);
            tokio::time::sleep(TYPE_RETRY_BACKOFF).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InsertOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSink {
        calls: Mutex<Vec<String>>,
        /// Texts that the sink refuses to consume.
        reject: Vec<String>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reject: Vec::new(),
            }
        }

        fn rejecting(texts: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reject: texts.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextSink for RecordingSink {
        async fn insert(&self, text: &str) -> InsertOutcome {
            self.calls.lock().unwrap().push(text.to_string());
            if self.reject.iter().any(|r| r == text.trim()) {
                InsertOutcome::rejected()
            } else {
                InsertOutcome::consumed()
            }
        }
    }

    #[test]
    fn enqueue_extracts_suffix_and_advances_anchor() {
        let mut queue = SuffixQueue::new();
        assert!(queue.enqueue(FlushReason::Timer, "hello world"));
        assert!(queue.enqueue(FlushReason::Timer, "hello world how are you"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn consecutive_duplicate_suffixes_collapse() {
        let mut queue = SuffixQueue::new();
        assert!(queue.enqueue(FlushReason::Timer, "hello world"));
        // Same snapshot re-offered: anchor already covers it.
        assert!(!queue.enqueue(FlushReason::Silence, "hello world"));
        // Unrelated snapshot extracting to the same text is also skipped
        // until the anchor resets.
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn empty_and_blank_snapshots_are_ignored() {
        let mut queue = SuffixQueue::new();
        assert!(!queue.enqueue(FlushReason::Timer, ""));
        assert!(!queue.enqueue(FlushReason::Timer, "   "));
        assert!(queue.is_empty());
    }

    #[test]
    fn rewrite_snapshot_advances_anchor_without_enqueue() {
        let mut queue = SuffixQueue::new();
        assert!(queue.enqueue(FlushReason::Timer, "the original words here"));
        // Rewrite: no structural relation, nothing typed.
        assert!(!queue.enqueue(FlushReason::Timer, "completely new unrelated phrase"));
        // But the anchor moved: an extension of the rewrite now works.
        assert!(queue.enqueue(
            FlushReason::Timer,
            "completely new unrelated phrase plus more"
        ));
        let last = queue.items.back().unwrap();
        assert_eq!(last.text, " plus more");
    }

    #[test]
    fn reset_anchor_allows_genuine_repetition() {
        let mut queue = SuffixQueue::new();
        assert!(queue.enqueue(FlushReason::Final, "yes"));
        queue.reset_anchor();
        assert!(queue.enqueue(FlushReason::Final, "yes"));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn drain_types_in_order_and_appends_live_text() {
        let mut queue = SuffixQueue::new();
        queue.enqueue(FlushReason::Timer, "alpha");
        queue.enqueue(FlushReason::Timer, "alpha beta");
        queue.enqueue(FlushReason::Timer, "alpha beta gamma");

        let sink = RecordingSink::new();
        let mut live = String::new();
        queue.drain(&sink, &mut live).await;

        assert_eq!(sink.calls(), vec!["alpha", " beta", " gamma"]);
        assert_eq!(live, "alpha beta gamma");
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_item_is_bounded_and_order_preserved() {
        let mut queue = SuffixQueue::new();
        queue.items.push_back(PendingSuffix {
            text: "first".into(),
            attempts: 0,
            reason: FlushReason::Timer,
        });
        queue.items.push_back(PendingSuffix {
            text: " bad".into(),
            attempts: 0,
            reason: FlushReason::Timer,
        });
        queue.items.push_back(PendingSuffix {
            text: " tail".into(),
            attempts: 0,
            reason: FlushReason::Timer,
        });

        let sink = RecordingSink::rejecting(&["bad"]);
        let mut live = String::new();
        queue.drain(&sink, &mut live).await;

        // The failing item is revisited after the rest of the queue, three
        // tries total, then dropped.
        assert_eq!(sink.calls(), vec!["first", " bad", " tail", " bad", " bad"]);
        assert_eq!(live, "first tail");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn drain_skips_suffix_formatted_to_nothing() {
        let mut queue = SuffixQueue::new();
        queue.items.push_back(PendingSuffix {
            text: "   ".into(),
            attempts: 0,
            reason: FlushReason::Stop,
        });
        let sink = RecordingSink::new();
        let mut live = String::new();
        queue.drain(&sink, &mut live).await;
        assert!(sink.calls().is_empty());
    }
}
