use serde::{Deserialize, Serialize};

/// Supervisory directive attached to a turn.
///
/// Directives are advisory context for the response composer — they are
/// woven into the persona's voice and never shown to the user as a separate
/// message.  The user must never observe the supervisor as its own actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    /// No intervention this turn.
    #[default]
    None,
    /// The user is stuck in a repetitive loop — steer toward a fresh angle
    /// or the next topic.
    SuggestNextTopic,
    /// The conversation has drifted — pull it back on topic.
    RedirectOnTopic,
}

impl Directive {
    pub fn is_none(&self) -> bool {
        matches!(self, Directive::None)
    }
}

/// Output of one supervision pass.
#[derive(Debug, Clone, Default)]
pub struct SupervisorVerdict {
    pub directive: Directive,
    /// Lead-in clause the composer weaves into the reply when a directive
    /// is present.
    pub directive_text: Option<String>,
    /// Progress markers newly covered this turn.
    pub new_progress_markers: Vec<String>,
}
