//! Engine configuration.
//!
//! Every option has a default; a JSON document only needs the fields it
//! changes. [`EngineConfig::validate`] runs when an engine is built and
//! rejects settings that would silently produce wrong confidence scores.

use std::collections::BTreeMap;
use std::path::Path;

use confluence_field::{ComposerConfig, ExtractorConfig, ScorerId};
use confluence_learning::FamilyThresholds;
use serde::{Deserialize, Serialize};

use crate::convergence::{ControllerConfig, TensionWeights};
use crate::error::{Error, Result};
use crate::gate::{GateConfig, GateWeights};

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Full configuration surface of the convergence engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on rounds per invocation
    pub max_rounds: u32,
    /// Default participation threshold
    pub activation_threshold: f64,
    /// Per-scorer participation thresholds
    pub scorer_thresholds: BTreeMap<ScorerId, f64>,
    /// Activations below this are zeroed during extraction
    pub noise_floor: f64,
    /// Gate 1
    pub min_participants: usize,
    /// Gate 2
    pub coherence_threshold: f64,
    /// Gate 3, inclusive `[low, high]`
    pub satisfaction_window: (f64, f64),
    /// Gate 3 confidence weights (α, β, γ)
    pub gate_weights: GateWeights,
    /// Tension term weights
    pub tension_weights: TensionWeights,
    /// Band tension must settle in to converge
    pub tension_band: (f64, f64),
    /// Largest tension step that still counts as quiet
    pub descent_epsilon: f64,
    /// Consecutive quiet rounds needed to converge
    pub quiet_rounds: u32,
    /// Per-round budget for all scorer calls
    pub round_timeout_ms: u64,
    /// Confidence multiplier applied to exhausted decisions
    pub exhausted_confidence_factor: f64,
    /// Coupling reported for unseen scorer pairs
    pub coactivation_default: f64,
    pub ema_alpha_coactivation: f64,
    pub ema_alpha_family: f64,
    pub family_thresholds: FamilyThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 4,
            activation_threshold: confluence_field::DEFAULT_ACTIVATION_THRESHOLD,
            scorer_thresholds: BTreeMap::new(),
            noise_floor: confluence_field::DEFAULT_NOISE_FLOOR,
            min_participants: 2,
            coherence_threshold: 0.4,
            satisfaction_window: (0.45, 0.85),
            gate_weights: GateWeights::default(),
            tension_weights: TensionWeights::default(),
            tension_band: (0.30, 0.50),
            descent_epsilon: 0.05,
            quiet_rounds: 1,
            round_timeout_ms: 2_000,
            exhausted_confidence_factor: 0.8,
            coactivation_default: confluence_learning::DEFAULT_COUPLING,
            ema_alpha_coactivation: confluence_learning::DEFAULT_COACTIVATION_ALPHA,
            ema_alpha_family: confluence_learning::DEFAULT_FAMILY_ALPHA,
            family_thresholds: FamilyThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(Error::Config("max_rounds must be >= 1".to_string()));
        }
        if self.min_participants < confluence_field::MIN_NEXUS_PARTICIPANTS {
            return Err(Error::Config(format!(
                "min_participants must be >= {}, got {}",
                confluence_field::MIN_NEXUS_PARTICIPANTS,
                self.min_participants
            )));
        }
        if self.quiet_rounds == 0 {
            return Err(Error::Config("quiet_rounds must be >= 1".to_string()));
        }
        if self.round_timeout_ms == 0 {
            return Err(Error::Config("round_timeout_ms must be > 0".to_string()));
        }

        unit("activation_threshold", self.activation_threshold)?;
        for (scorer, threshold) in &self.scorer_thresholds {
            unit(&format!("scorer_thresholds.{scorer}"), *threshold)?;
        }
        unit("noise_floor", self.noise_floor)?;
        unit("coherence_threshold", self.coherence_threshold)?;
        unit("descent_epsilon", self.descent_epsilon)?;
        unit("exhausted_confidence_factor", self.exhausted_confidence_factor)?;
        band("satisfaction_window", self.satisfaction_window)?;
        band("tension_band", self.tension_band)?;

        if !(self.coactivation_default > 0.0 && self.coactivation_default <= 1.0) {
            return Err(Error::Config(format!(
                "coactivation_default must be in (0, 1], got {}",
                self.coactivation_default
            )));
        }
        rate("ema_alpha_coactivation", self.ema_alpha_coactivation)?;
        rate("ema_alpha_family", self.ema_alpha_family)?;

        let g = &self.gate_weights;
        for (name, w) in [("agreement", g.agreement), ("strength", g.strength), ("coupling", g.coupling)] {
            unit(&format!("gate_weights.{name}"), w)?;
        }
        if (g.sum() - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::Config(format!(
                "gate_weights must sum to 1.0, got {} + {} + {} = {}",
                g.agreement,
                g.strength,
                g.coupling,
                g.sum()
            )));
        }

        let t = &self.tension_weights;
        for (name, w) in [
            ("agreement", t.agreement),
            ("drift", t.drift),
            ("coherence", t.coherence),
            ("strength", t.strength),
        ] {
            unit(&format!("tension_weights.{name}"), w)?;
        }
        if (t.sum() - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::Config(format!(
                "tension_weights must sum to 1.0, got {}",
                t.sum()
            )));
        }

        let f = &self.family_thresholds;
        unit("family_thresholds.exploration", f.exploration)?;
        unit("family_thresholds.balance", f.balance)?;
        unit("family_thresholds.consolidation", f.consolidation)?;
        if f.balance_from > f.consolidation_from {
            return Err(Error::Config(format!(
                "family_thresholds.balance_from ({}) must not exceed consolidation_from ({})",
                f.balance_from, f.consolidation_from
            )));
        }

        Ok(())
    }

    pub fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            noise_floor: self.noise_floor,
        }
    }

    pub fn composer(&self) -> ComposerConfig {
        ComposerConfig {
            activation_threshold: self.activation_threshold,
            scorer_thresholds: self.scorer_thresholds.clone(),
        }
    }

    pub fn gate(&self) -> GateConfig {
        GateConfig {
            min_participants: self.min_participants,
            coherence_threshold: self.coherence_threshold,
            satisfaction_window: self.satisfaction_window,
            weights: self.gate_weights,
        }
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            max_rounds: self.max_rounds,
            tension_band: self.tension_band,
            descent_epsilon: self.descent_epsilon,
            quiet_rounds: self.quiet_rounds,
            weights: self.tension_weights,
        }
    }

    pub fn round_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.round_timeout_ms)
    }
}

fn unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be in [0, 1], got {value}")))
    }
}

fn rate(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be in (0, 1], got {value}")))
    }
}

fn band(name: &str, (low, high): (f64, f64)) -> Result<()> {
    unit(name, low)?;
    unit(name, high)?;
    if low > high {
        return Err(Error::Config(format!("{name} is inverted: [{low}, {high}]")));
    }
    Ok(())
}
