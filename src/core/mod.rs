pub mod continuation;
pub mod playback;
pub mod realtime;
pub mod resume;
pub mod session;
pub mod sync;
pub mod transcript;

// Re-export commonly used types for convenience
pub use continuation::find_continuation;
pub use playback::{PlaybackBuffer, PlaybackStats};
pub use realtime::{
    GeminiLiveClient, GeminiLiveConfig, LiveBackend, LiveEvent, LiveTransport, RealtimeError,
    RealtimeResult,
};
pub use resume::{
    DefaultResumePrompt, FnPromptBuilder, ResumeDirective, ResumePromptBuilder,
    SharedPromptBuilder, prompt_builder_fn,
};
pub use session::{
    ControlCommand, EngineConfig, LiveSession, LiveSessionBuilder, SessionError, SessionEvent,
    SessionResult, SessionSummary, TranscriptSegment,
};
pub use sync::SyncScheduler;
pub use transcript::{ConversationHistory, HistoryTurn, Role, Segment, TranscriptState};
