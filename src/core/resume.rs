//! Resume prompts injected after an interruption.
//!
//! When the user cuts the responder off, the session sends one complete user
//! turn describing what was heard, what the user said and where the cut-off
//! utterance should continue. The text of that turn comes from a
//! [`ResumePromptBuilder`]; [`DefaultResumePrompt`] is used unless the caller
//! supplies another one.

use std::fmt;
use std::sync::Arc;

use super::transcript::{HistoryTurn, Role};

/// Everything known about one interruption, handed to a prompt builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeDirective {
    /// Responder text whose audio reached the listener
    pub heard_text: String,
    /// Responder text that was generated but never played
    pub unheard_text: String,
    /// What the user said when interrupting (may be empty)
    pub user_interrupt_text: String,
    /// Cut-off utterance from the start of the interrupted sentence
    pub continuation_text: String,
    /// Rolling history, oldest first
    pub history_snapshot: Vec<HistoryTurn>,
}

/// Strategy producing the resume prompt text.
///
/// The session sends the output verbatim and never inspects it.
pub trait ResumePromptBuilder: Send + Sync {
    fn build(&self, directive: &ResumeDirective) -> String;
}

pub type SharedPromptBuilder = Arc<dyn ResumePromptBuilder>;

/// Built-in prompt: history, interrupted response, user interjection, resume
/// point and routing instructions, in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResumePrompt;

impl DefaultResumePrompt {
    const HEADER: &'static str = "[System Note: Interruption Context]\n\
        Your previous response was interrupted by the user. \
        Below is the context so you can decide how to proceed.";

    const INSTRUCTIONS: &'static str = "=== Instructions ===\n\
        Based on the above context, decide the best course of action:\n\
        1. If the user's interruption is a new question, request, or a clear change of topic, \
        answer it directly, then offer to continue the interrupted response.\n\
        2. If the user's interruption is a brief acknowledgment, background noise, or does not \
        introduce a new topic, continue your response verbatim from the resume point above.\n\
        3. If the user's interruption is a follow-up, clarification, or correction, address it \
        briefly and then continue the interrupted response from the resume point.\n\
        Do NOT mention this system note.";
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Model => "You (Model)",
    }
}

impl ResumePromptBuilder for DefaultResumePrompt {
    fn build(&self, directive: &ResumeDirective) -> String {
        let mut lines: Vec<String> = vec![Self::HEADER.to_string()];

        if !directive.history_snapshot.is_empty() {
            lines.push(String::new());
            lines.push("=== Recent Conversation ===".to_string());
            for turn in &directive.history_snapshot {
                lines.push(format!("{}: {}", speaker(turn.role), turn.text));
            }
        }

        lines.push(String::new());
        lines.push("=== Interrupted Response ===".to_string());
        lines.push(format!(
            "What the user heard before interrupting: {}",
            directive.heard_text
        ));

        lines.push(String::new());
        lines.push("=== What the User Said (interruption) ===".to_string());
        if directive.user_interrupt_text.is_empty() {
            lines.push("(nothing recognizable)".to_string());
        } else {
            lines.push(directive.user_interrupt_text.clone());
        }

        lines.push(String::new());
        lines.push("=== Resume Point ===".to_string());
        lines.push(directive.continuation_text.clone());

        lines.push(String::new());
        lines.push(Self::INSTRUCTIONS.to_string());

        lines.join("\n")
    }
}

/// Adapts a plain function of `(heard_text, user_text, history)` into a
/// [`ResumePromptBuilder`].
pub struct FnPromptBuilder<F> {
    func: F,
}

impl<F> FnPromptBuilder<F>
where
    F: Fn(&str, &str, &[HistoryTurn]) -> String + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnPromptBuilder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPromptBuilder").finish_non_exhaustive()
    }
}

impl<F> ResumePromptBuilder for FnPromptBuilder<F>
where
    F: Fn(&str, &str, &[HistoryTurn]) -> String + Send + Sync,
{
    fn build(&self, directive: &ResumeDirective) -> String {
        (self.func)(
            &directive.heard_text,
            &directive.user_interrupt_text,
            &directive.history_snapshot,
        )
    }
}

/// Shorthand for wrapping a closure as a shared prompt builder.
pub fn prompt_builder_fn<F>(func: F) -> SharedPromptBuilder
where
    F: Fn(&str, &str, &[HistoryTurn]) -> String + Send + Sync + 'static,
{
    Arc::new(FnPromptBuilder::new(func))
}
