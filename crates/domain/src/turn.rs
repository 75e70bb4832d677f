use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PersonaId;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry in a session's conversation history.
///
/// The embedding is cached at turn-creation time so the loop detector never
/// re-embeds historical utterances.  `None` means embedding failed or was
/// skipped for that turn (the detector treats such turns as non-comparable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// Persona the turn was addressed to (user turns) or spoken by
    /// (assistant turns).  `None` for system entries.
    pub persona_id: Option<PersonaId>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Turn {
    pub fn user(
        persona_id: impl Into<PersonaId>,
        text: impl Into<String>,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        Self {
            role: Role::User,
            persona_id: Some(persona_id.into()),
            text: text.into(),
            timestamp: Utc::now(),
            embedding,
        }
    }

    pub fn assistant(persona_id: impl Into<PersonaId>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            persona_id: Some(persona_id.into()),
            text: text.into(),
            timestamp: Utc::now(),
            embedding: None,
        }
    }

    /// Whether this is a user turn addressed to the given persona.
    pub fn is_user_turn_for(&self, persona_id: &str) -> bool {
        self.role == Role::User && self.persona_id.as_deref() == Some(persona_id)
    }
}
