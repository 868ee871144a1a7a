//! Transcript state for a live session.
//!
//! Holds the partial and final text of both parties, the responder's text
//! segments tagged with the playback byte position they arrived at, and a
//! bounded rolling history of completed turns used as context for resume
//! prompts.
//!
//! The inbound event loop is the only writer of the per-turn fields. The sync
//! loop only pops from the release queue. Callers share one instance behind a
//! single lock, which makes [`TranscriptState::snapshot_for_interruption`]
//! atomic with respect to chunk arrivals.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of turns kept in the rolling history.
pub const DEFAULT_HISTORY_WINDOW: usize = 4;

/// Party a piece of text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the model
    User,
    /// The responder
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// One completed turn in the rolling history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

impl HistoryTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Fixed-capacity FIFO of recent turns, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    capacity: usize,
    turns: VecDeque<HistoryTurn>,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a turn, evicting the oldest ones past capacity. Empty text is
    /// not recorded.
    pub fn push(&mut self, role: Role, text: &str) {
        if text.is_empty() || self.capacity == 0 {
            return;
        }
        self.turns.push_back(HistoryTurn::new(role, text));
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryTurn> {
        self.turns.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryTurn> {
        self.turns.iter().cloned().collect()
    }
}

/// Responder text chunk anchored to the playback byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// `total_received` of the playback buffer when the chunk arrived
    pub byte_marker: u64,
    pub is_final: bool,
}

/// Result of splitting the current responder turn at the playback position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterruptionSnapshot {
    /// Text whose audio had been played
    pub heard_text: String,
    /// Everything the responder produced this turn
    pub full_text: String,
    /// Text whose audio had not been played
    pub unheard_text: String,
    /// What the user had said when the interruption arrived
    pub user_text: String,
    /// Whether `user_text` is already part of the history
    pub user_text_recorded: bool,
    /// Heard segments that were still waiting for sync release
    pub released: Vec<Segment>,
}

impl InterruptionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.heard_text.is_empty() && self.full_text.is_empty()
    }
}

/// Mutable transcript record for both parties.
#[derive(Debug)]
pub struct TranscriptState {
    user_partial: String,
    user_finals: Vec<String>,
    last_user_chunk: String,

    model_partial: String,
    model_segments: Vec<Segment>,
    last_model_chunk: String,

    /// Segments not yet released to consumers, in arrival order
    pending_release: VecDeque<Segment>,

    history: ConversationHistory,

    interruption_count: u64,
    turn_active: bool,
    needs_resume: bool,
}

impl Default for TranscriptState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

fn join_chunk(acc: &mut String, chunk: &str) {
    if !acc.is_empty() {
        acc.push(' ');
    }
    acc.push_str(chunk);
}

fn join_segments<'a>(segments: impl Iterator<Item = &'a Segment>) -> String {
    let mut out = String::new();
    for segment in segments {
        join_chunk(&mut out, &segment.text);
    }
    out
}

impl TranscriptState {
    pub fn new(history_window: usize) -> Self {
        Self {
            user_partial: String::new(),
            user_finals: Vec::new(),
            last_user_chunk: String::new(),
            model_partial: String::new(),
            model_segments: Vec::new(),
            last_model_chunk: String::new(),
            pending_release: VecDeque::new(),
            history: ConversationHistory::new(history_window),
            interruption_count: 0,
            turn_active: false,
            needs_resume: false,
        }
    }

    // -------------------------------------------------------------------------
    // User side
    // -------------------------------------------------------------------------

    /// Record an unfinalized user transcription chunk.
    ///
    /// Returns the trimmed chunk when it was accepted (non-empty and not a
    /// repeat of the previous chunk).
    pub fn record_user_partial(&mut self, text: &str) -> Option<String> {
        let chunk = text.trim();
        if chunk.is_empty() || chunk == self.last_user_chunk {
            return None;
        }
        join_chunk(&mut self.user_partial, chunk);
        self.last_user_chunk = chunk.to_string();
        Some(chunk.to_string())
    }

    /// Record the last chunk of a user utterance and fold the utterance into
    /// the history.
    pub fn finalize_user(&mut self, text: &str) -> Option<String> {
        let accepted = self.record_user_partial(text);

        let utterance = std::mem::take(&mut self.user_partial);
        self.last_user_chunk.clear();
        if !utterance.is_empty() {
            self.history.push(Role::User, &utterance);
            self.user_finals.push(utterance);
        }
        accepted
    }

    pub fn user_partial(&self) -> &str {
        &self.user_partial
    }

    pub fn user_finals(&self) -> &[String] {
        &self.user_finals
    }

    // -------------------------------------------------------------------------
    // Model side
    // -------------------------------------------------------------------------

    /// Append a responder text chunk anchored at `byte_marker`.
    ///
    /// Markers never go backwards: a marker lower than the previous one is
    /// raised to it. Returns the stored segment when the chunk was accepted.
    pub fn record_model_chunk(
        &mut self,
        text: &str,
        byte_marker: u64,
        is_final: bool,
    ) -> Option<Segment> {
        let chunk = text.trim();
        if chunk.is_empty() || chunk == self.last_model_chunk {
            if is_final {
                self.last_model_chunk.clear();
            }
            return None;
        }

        let floor = self
            .model_segments
            .last()
            .map(|s| s.byte_marker)
            .into_iter()
            .chain(self.pending_release.back().map(|s| s.byte_marker))
            .max()
            .unwrap_or(0);
        let segment = Segment {
            text: chunk.to_string(),
            byte_marker: byte_marker.max(floor),
            is_final,
        };

        self.begin_model_turn();
        join_chunk(&mut self.model_partial, chunk);
        self.model_segments.push(segment.clone());
        self.pending_release.push_back(segment.clone());

        if is_final {
            self.last_model_chunk.clear();
        } else {
            self.last_model_chunk = segment.text.clone();
        }
        Some(segment)
    }

    /// Mark the start of a responder turn on its first content.
    ///
    /// User utterances finalized before this point prompted the turn and are
    /// already in the history; they are not interjections and are forgotten.
    pub fn begin_model_turn(&mut self) {
        if !self.turn_active {
            self.user_finals.clear();
            self.turn_active = true;
        }
    }

    /// Close a responder turn that finished without interruption.
    ///
    /// The accumulated text goes into the history. Segments still waiting for
    /// playback stay in the release queue.
    pub fn finalize_model_turn(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.model_partial);
        self.clear_turn();
        if text.is_empty() {
            return None;
        }
        self.history.push(Role::Model, &text);
        Some(text)
    }

    /// Split the current responder turn at `total_played` and clear it.
    ///
    /// Segments with `byte_marker <= total_played` were heard. Heard segments
    /// still waiting for release are handed back in `released`; unheard ones
    /// are dropped from the release queue. A second call without new chunks
    /// yields an empty split.
    pub fn snapshot_for_interruption(&mut self, total_played: u64) -> InterruptionSnapshot {
        let heard_text = join_segments(
            self.model_segments
                .iter()
                .filter(|s| s.byte_marker <= total_played),
        );
        let unheard_text = join_segments(
            self.model_segments
                .iter()
                .filter(|s| s.byte_marker > total_played),
        );
        let full_text = std::mem::take(&mut self.model_partial);

        let mut released = Vec::new();
        while let Some(segment) = self.pending_release.pop_front() {
            if segment.byte_marker <= total_played {
                released.push(segment);
            } else {
                break;
            }
        }
        self.pending_release.clear();

        let (user_text, user_text_recorded) = if !self.user_partial.is_empty() {
            (self.user_partial.clone(), false)
        } else if let Some(last) = self.user_finals.last() {
            (last.clone(), true)
        } else {
            (String::new(), true)
        };

        self.clear_turn();

        InterruptionSnapshot {
            heard_text,
            full_text,
            unheard_text,
            user_text,
            user_text_recorded,
            released,
        }
    }

    /// Count an interruption and fold what was heard, and what the user said
    /// so far, into the history.
    pub fn record_interruption(&mut self, snapshot: &InterruptionSnapshot) {
        self.interruption_count += 1;
        self.history.push(Role::Model, &snapshot.heard_text);
        if !snapshot.user_text_recorded && !snapshot.user_text.is_empty() {
            self.history.push(Role::User, &snapshot.user_text);
            self.user_partial.clear();
            self.last_user_chunk.clear();
        }
    }

    fn clear_turn(&mut self) {
        self.model_partial.clear();
        self.model_segments.clear();
        self.last_model_chunk.clear();
        self.user_finals.clear();
        self.turn_active = false;
    }

    /// Drop everything still queued for release.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending_release.len();
        self.pending_release.clear();
        dropped
    }

    /// Pop, in arrival order, every pending segment anchored at or below
    /// `allowed`. Stops at the first segment past the bound.
    pub fn release_until(&mut self, allowed: u64) -> Vec<Segment> {
        let mut released = Vec::new();
        while let Some(front) = self.pending_release.front() {
            if front.byte_marker > allowed {
                break;
            }
            if let Some(segment) = self.pending_release.pop_front() {
                released.push(segment);
            }
        }
        released
    }

    pub fn model_partial(&self) -> &str {
        &self.model_partial
    }

    pub fn model_segments(&self) -> &[Segment] {
        &self.model_segments
    }

    pub fn pending_release(&self) -> usize {
        self.pending_release.len()
    }

    // -------------------------------------------------------------------------
    // Session-wide fields
    // -------------------------------------------------------------------------

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn history_snapshot(&self) -> Vec<HistoryTurn> {
        self.history.to_vec()
    }

    pub fn interruption_count(&self) -> u64 {
        self.interruption_count
    }

    pub fn turn_active(&self) -> bool {
        self.turn_active
    }

    pub fn needs_resume(&self) -> bool {
        self.needs_resume
    }

    pub fn set_needs_resume(&mut self, needs_resume: bool) {
        self.needs_resume = needs_resume;
    }
}
