//! Immutable persona registry.
//!
//! Built once at startup; lookups return shared references.  Mutating the
//! registry after construction is not possible by design — personas are
//! static configuration, not runtime state.

use std::collections::HashMap;

use serde::Deserialize;

use ce_domain::error::{Error, Result};
use ce_domain::PersonaId;

use crate::builtin;
use crate::config::PersonaConfig;

/// Read-only table of persona configurations.
#[derive(Debug)]
pub struct PersonaRegistry {
    personas: HashMap<PersonaId, PersonaConfig>,
}

/// On-disk registry layout: `[[personas]]` array of tables.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    personas: Vec<PersonaConfig>,
}

impl PersonaRegistry {
    /// Build a registry from explicit configs.  Later duplicates replace
    /// earlier entries.
    pub fn from_configs(configs: impl IntoIterator<Item = PersonaConfig>) -> Self {
        let personas = configs
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { personas }
    }

    /// The built-in persona set (`chro`, `ceo`, `regional_manager`).
    pub fn with_builtin() -> Self {
        Self::from_configs(builtin::builtin_personas())
    }

    /// Parse a registry from TOML (`[[personas]]` tables).
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: RegistryFile =
            toml::from_str(raw).map_err(|e| Error::Config(format!("persona registry: {e}")))?;
        if file.personas.is_empty() {
            return Err(Error::Config("persona registry defines no personas".into()));
        }
        Ok(Self::from_configs(file.personas))
    }

    /// Look up a persona by id.
    pub fn load(&self, persona_id: &str) -> Result<&PersonaConfig> {
        self.personas
            .get(persona_id)
            .ok_or_else(|| Error::UnknownPersona(persona_id.to_owned()))
    }

    pub fn contains(&self, persona_id: &str) -> bool {
        self.personas.contains_key(persona_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.personas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
