use serde::{Deserialize, Serialize};

use ce_domain::PersonaId;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persona configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Behavioral configuration for one persona.
///
/// Consumed read-only by the response composer; trigger lists drive the
/// ±1 relationship delta per turn, tone rules map the relationship score
/// to a tone instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub id: PersonaId,
    pub name: String,
    pub role: String,

    /// Voice and framing instructions for reply composition.
    pub system_prompt: String,

    /// Topics this persona is an authority on.
    #[serde(default)]
    pub knowledge_domains: Vec<String>,

    /// Things the persona will not do, regardless of relationship.
    #[serde(default)]
    pub hidden_constraints: Vec<String>,

    /// Phrases/topics that earn a +1 relationship delta when the user's
    /// utterance matches one.
    #[serde(default)]
    pub enthusiasm_triggers: Vec<String>,

    /// Phrases/topics that earn a −1 relationship delta.
    #[serde(default)]
    pub pushback_triggers: Vec<String>,

    #[serde(default)]
    pub tone_rules: ToneRules,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tone banding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Relationship band for tone selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneBand {
    Warm,
    Neutral,
    Strained,
}

/// Maps the current relationship score onto a tone instruction.
///
/// Scores at or above `warm_at` are warm; at or below `strained_at` are
/// strained; everything between is neutral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneRules {
    #[serde(default = "d_warm_at")]
    pub warm_at: i8,
    #[serde(default = "d_strained_at")]
    pub strained_at: i8,
    #[serde(default = "d_warm_tone")]
    pub warm: String,
    #[serde(default = "d_neutral_tone")]
    pub neutral: String,
    #[serde(default = "d_strained_tone")]
    pub strained: String,
}

impl ToneRules {
    /// Select the band for a relationship score.
    pub fn band(&self, score: i8) -> ToneBand {
        if score >= self.warm_at {
            ToneBand::Warm
        } else if score <= self.strained_at {
            ToneBand::Strained
        } else {
            ToneBand::Neutral
        }
    }

    /// The tone instruction for a relationship score.
    pub fn instruction(&self, score: i8) -> &str {
        match self.band(score) {
            ToneBand::Warm => &self.warm,
            ToneBand::Neutral => &self.neutral,
            ToneBand::Strained => &self.strained,
        }
    }
}

impl Default for ToneRules {
    fn default() -> Self {
        Self {
            warm_at: d_warm_at(),
            strained_at: d_strained_at(),
            warm: d_warm_tone(),
            neutral: d_neutral_tone(),
            strained: d_strained_tone(),
        }
    }
}

fn d_warm_at() -> i8 {
    6
}
fn d_strained_at() -> i8 {
    -3
}
fn d_warm_tone() -> String {
    "Collaborative and open; share stories and concrete examples.".to_owned()
}
fn d_neutral_tone() -> String {
    "Professional and balanced; helpful but measured.".to_owned()
}
fn d_strained_tone() -> String {
    "Formal and brief; still helpful, fewer anecdotes.".to_owned()
}
