//! Deterministic reply composition in the persona's voice.
//!
//! The composer turns the turn's inputs — persona config, relationship
//! score, retrieval hits, and the supervisor's verdict — into one reply.
//! Trigger matching drives the ±1 relationship delta (enthusiasm wins when
//! both sides match), tone rules pick the register, and any directive is
//! woven into the persona's own words so the supervision stays invisible.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use ce_domain::directive::{Directive, SupervisorVerdict};
use ce_domain::PersonaId;
use ce_personas::{PersonaConfig, ToneBand};
use ce_retrieval::Snippet;
use ce_sessions::state::{Sentiment, SCORE_MAX, SCORE_MIN};

/// What composition produced for one turn.
#[derive(Debug, Clone)]
pub struct Composition {
    pub reply_text: String,
    /// Relationship delta earned this turn, already clamped to ±1.
    pub relationship_delta: i8,
    pub sentiment: Sentiment,
}

// ── trigger patterns ─────────────────────────────────────────────────

/// Compiled trigger patterns for one persona.  Matching is
/// case-insensitive whole-phrase matching on word boundaries, so "pay"
/// never fires on "payment".
#[derive(Debug)]
struct TriggerSet {
    enthusiasm: Vec<(String, Regex)>,
    pushback: Vec<(String, Regex)>,
}

impl TriggerSet {
    fn compile(persona: &PersonaConfig) -> Self {
        Self {
            enthusiasm: compile_phrases(&persona.enthusiasm_triggers),
            pushback: compile_phrases(&persona.pushback_triggers),
        }
    }
}

fn compile_phrases(phrases: &[String]) -> Vec<(String, Regex)> {
    phrases
        .iter()
        .filter_map(|phrase| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase)))
                .ok()
                .map(|re| (phrase.clone(), re))
        })
        .collect()
}

fn first_match<'a>(compiled: &'a [(String, Regex)], utterance: &str) -> Option<&'a str> {
    compiled
        .iter()
        .find(|(_, re)| re.is_match(utterance))
        .map(|(phrase, _)| phrase.as_str())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Composer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Reply composer with a per-persona cache of compiled trigger patterns.
/// Personas are immutable after registry construction, so entries are
/// compiled once on first use and never invalidated.
#[derive(Debug, Default)]
pub struct Composer {
    triggers: RwLock<HashMap<PersonaId, Arc<TriggerSet>>>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose the persona's reply to `utterance`.
    ///
    /// `score_before` is the relationship score prior to this turn; tone is
    /// selected from the score after the delta, so a trigger shifts the
    /// register of the very reply it triggered.
    pub fn compose(
        &self,
        persona: &PersonaConfig,
        score_before: i8,
        utterance: &str,
        snippets: &[Snippet],
        verdict: &SupervisorVerdict,
    ) -> Composition {
        let triggers = self.triggers_for(persona);
        let (delta, sentiment, matched) = classify(&triggers, utterance);
        let score_after = (score_before + delta).clamp(SCORE_MIN, SCORE_MAX);
        let band = persona.tone_rules.band(score_after);

        let mut reply = String::new();
        self.open(&mut reply, band, sentiment, matched);
        self.ground(&mut reply, persona, snippets);
        self.weave_directive(&mut reply, persona, verdict);

        debug!(
            persona_id = %persona.id,
            delta,
            ?band,
            directive = ?verdict.directive,
            "reply composed"
        );

        Composition {
            reply_text: reply.trim_end().to_owned(),
            relationship_delta: delta,
            sentiment,
        }
    }

    fn triggers_for(&self, persona: &PersonaConfig) -> Arc<TriggerSet> {
        if let Some(set) = self.triggers.read().get(&persona.id) {
            return Arc::clone(set);
        }
        let compiled = Arc::new(TriggerSet::compile(persona));
        let mut cache = self.triggers.write();
        Arc::clone(cache.entry(persona.id.clone()).or_insert(compiled))
    }

    #[cfg(test)]
    fn cached_trigger_sets(&self) -> usize {
        self.triggers.read().len()
    }

    // ── reply assembly ───────────────────────────────────────────────

    fn open(
        &self,
        reply: &mut String,
        band: ToneBand,
        sentiment: Sentiment,
        matched: Option<&str>,
    ) {
        match (sentiment, matched) {
            (Sentiment::Positive, Some(phrase)) => {
                reply.push_str(&format!(
                    "Now we're getting somewhere — {phrase} is exactly the kind of \
                     thing I care about. "
                ));
            }
            (Sentiment::Negative, Some(phrase)) => {
                reply.push_str(&format!(
                    "I'll be honest: \"{phrase}\" is where you lose me, and I'd \
                     push back on framing it that way. "
                ));
            }
            _ => match band {
                ToneBand::Warm => reply.push_str("Happy to dig into this with you. "),
                ToneBand::Neutral => reply.push_str("Let's work through this. "),
                ToneBand::Strained => reply.push_str("Noted. "),
            },
        }
    }

    fn ground(&self, reply: &mut String, persona: &PersonaConfig, snippets: &[Snippet]) {
        match snippets.first() {
            Some(top) => {
                reply.push_str(&format!(
                    "From where I sit as {}, the relevant piece is this: {} ",
                    persona.role, top.text
                ));
            }
            None => {
                let domain = persona
                    .knowledge_domains
                    .first()
                    .map(String::as_str)
                    .unwrap_or(&persona.role);
                reply.push_str(&format!(
                    "I don't have material in front of me for that one, but \
                     speaking from my {domain} experience I can give you a \
                     starting point. "
                ));
            }
        }
    }

    /// Directives are rendered in the persona's voice, never as a separate
    /// speaker.  The supervisor's `directive_text` is the lead-in clause;
    /// the persona's framing closes the sentence around it.
    fn weave_directive(
        &self,
        reply: &mut String,
        persona: &PersonaConfig,
        verdict: &SupervisorVerdict,
    ) {
        match verdict.directive {
            Directive::None => {}
            Directive::SuggestNextTopic => {
                let lead = verdict
                    .directive_text
                    .as_deref()
                    .unwrap_or("We've been over this same ground a few times now");
                reply.push_str(&format!(
                    "{lead} — rather than repeat myself, here's what I'd do next: \
                     pick one concrete piece of it and move it forward this week. "
                ));
            }
            Directive::RedirectOnTopic => {
                let lead = verdict
                    .directive_text
                    .as_deref()
                    .unwrap_or("That's a bit outside what I can help with");
                let domain = persona
                    .knowledge_domains
                    .first()
                    .map(String::as_str)
                    .unwrap_or(&persona.role);
                reply.push_str(&format!(
                    "{lead} — let's bring this back to {domain}, where I can \
                     actually be useful. "
                ));
            }
        }
    }
}

/// Match the utterance against the persona's trigger lists.  Enthusiasm
/// wins when both lists match the same utterance.
fn classify<'a>(triggers: &'a TriggerSet, utterance: &str) -> (i8, Sentiment, Option<&'a str>) {
    if let Some(phrase) = first_match(&triggers.enthusiasm, utterance) {
        return (1, Sentiment::Positive, Some(phrase));
    }
    if let Some(phrase) = first_match(&triggers.pushback, utterance) {
        return (-1, Sentiment::Negative, Some(phrase));
    }
    (0, Sentiment::Neutral, None)
}
