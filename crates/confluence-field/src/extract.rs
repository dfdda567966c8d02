//! Signal extraction: one scorer's raw output becomes a normalized field.
//!
//! Failures never leave this module. A scorer that errored or returned
//! non-finite numbers yields an empty field with zero coherence, so a missing
//! scorer can never block the round.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::atom::{ScorerId, ScorerOutput};

/// Activations below this are treated as noise and zeroed.
pub const DEFAULT_NOISE_FLOOR: f64 = 0.05;

/// Normalization settings for the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Clipped activations strictly below this become 0.0
    pub noise_floor: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            noise_floor: DEFAULT_NOISE_FLOOR,
        }
    }
}

/// Why a scorer output was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Malformed {
    #[error("coherence is not finite ({0})")]
    NonFiniteCoherence(f64),

    #[error("activation for atom `{atom}` is not finite ({value})")]
    NonFiniteActivation { atom: String, value: f64 },

    #[error("atom with an empty name")]
    EmptyAtom,
}

/// One scorer's normalized read on the input for a single round.
///
/// Lives for one round only; it is consumed by nexus composition.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticField {
    /// Scorer that produced this field
    pub scorer: ScorerId,
    /// Atom → activation in [0, 1]
    pub activations: BTreeMap<String, f64>,
    /// Scorer self-consistency in [0, 1]
    pub coherence: f64,
}

impl SemanticField {
    /// A field carrying no signal. Stands in for failed, slow or broken scorers.
    pub fn empty(scorer: ScorerId) -> Self {
        Self {
            scorer,
            activations: BTreeMap::new(),
            coherence: 0.0,
        }
    }

    /// Activation of an atom, 0.0 when the scorer did not report it.
    pub fn activation(&self, atom: &str) -> f64 {
        self.activations.get(atom).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }
}

/// Validate and normalize a scorer output.
///
/// Values are clipped to [0, 1]; activations under the noise floor are zeroed
/// (kept as 0.0 rather than dropped).
pub fn normalize(
    scorer: ScorerId,
    output: ScorerOutput,
    config: &ExtractorConfig,
) -> Result<SemanticField, Malformed> {
    if !output.coherence.is_finite() {
        return Err(Malformed::NonFiniteCoherence(output.coherence));
    }

    let mut activations = BTreeMap::new();
    for (atom, value) in output.atoms {
        if atom.is_empty() {
            return Err(Malformed::EmptyAtom);
        }
        if !value.is_finite() {
            return Err(Malformed::NonFiniteActivation { atom, value });
        }
        let clipped = value.clamp(0.0, 1.0);
        let activation = if clipped < config.noise_floor { 0.0 } else { clipped };
        activations.insert(atom, activation);
    }

    Ok(SemanticField {
        scorer,
        activations,
        coherence: output.coherence.clamp(0.0, 1.0),
    })
}

/// Turn any scorer outcome into a semantic field.
///
/// Errors and malformed output are logged and absorbed as an empty field.
pub fn extract<E: fmt::Display>(
    scorer: ScorerId,
    outcome: Result<ScorerOutput, E>,
    config: &ExtractorConfig,
) -> SemanticField {
    match outcome {
        Ok(output) => match normalize(scorer.clone(), output, config) {
            Ok(field) => field,
            Err(reason) => {
                warn!(scorer = %scorer, %reason, "Malformed scorer output, using empty field");
                SemanticField::empty(scorer)
            }
        },
        Err(error) => {
            warn!(scorer = %scorer, %error, "Scorer failed, using empty field");
            SemanticField::empty(scorer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ScorerId {
        ScorerId::new("lexicon")
    }

    #[test]
    fn clips_and_applies_noise_floor() {
        let output = ScorerOutput::new(1.4)
            .with_atom("urgent", 1.7)
            .with_atom("calm", -0.3)
            .with_atom("drift", 0.04)
            .with_atom("grief", 0.05);

        let field = normalize(id(), output, &ExtractorConfig::default()).unwrap();

        assert_eq!(field.coherence, 1.0);
        assert_eq!(field.activation("urgent"), 1.0);
        assert_eq!(field.activation("calm"), 0.0);
        assert_eq!(field.activation("drift"), 0.0);
        // Exactly at the floor is kept
        assert_eq!(field.activation("grief"), 0.05);
        // Zeroed atoms are still present
        assert!(field.activations.contains_key("drift"));
    }

    #[test]
    fn custom_noise_floor() {
        let config = ExtractorConfig { noise_floor: 0.2 };
        let output = ScorerOutput::new(0.5).with_atom("urgent", 0.15);
        let field = normalize(id(), output, &config).unwrap();
        assert_eq!(field.activation("urgent"), 0.0);
    }

    #[test]
    fn non_finite_values_are_malformed() {
        let config = ExtractorConfig::default();

        let nan_coherence = ScorerOutput::new(f64::NAN).with_atom("urgent", 0.5);
        assert!(matches!(
            normalize(id(), nan_coherence, &config),
            Err(Malformed::NonFiniteCoherence(_))
        ));

        let inf_atom = ScorerOutput::new(0.5).with_atom("urgent", f64::INFINITY);
        assert!(matches!(
            normalize(id(), inf_atom, &config),
            Err(Malformed::NonFiniteActivation { .. })
        ));

        let unnamed = ScorerOutput::new(0.5).with_atom("", 0.5);
        assert_eq!(normalize(id(), unnamed, &config), Err(Malformed::EmptyAtom));
    }

    #[test]
    fn failures_become_empty_fields() {
        let config = ExtractorConfig::default();

        let failed = extract(id(), Err("lexicon offline"), &config);
        assert!(failed.is_empty());
        assert_eq!(failed.coherence, 0.0);
        assert_eq!(failed.scorer, id());

        let malformed = extract::<&str>(id(), Ok(ScorerOutput::new(f64::NAN)), &config);
        assert!(malformed.is_empty());
        assert_eq!(malformed.coherence, 0.0);
    }

    #[test]
    fn missing_atom_reads_as_zero() {
        let field = SemanticField::empty(id());
        assert_eq!(field.activation("anything"), 0.0);
    }
}
