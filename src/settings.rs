//! Decoder configuration.
//!
//! `DecoderConfig` is an explicit value handed to `decode`; there is no
//! global. It can be built in code (`Default` plus struct update) or
//! parsed from TOML with `from_toml`, which validates every field.

use serde::Deserialize;

use crate::model::Score;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Maximum number of hypotheses kept per stack after pruning.
    pub stack_size: usize,
    /// Log-score margin below the stack's best score beyond which
    /// hypotheses are discarded. Non-positive; negative infinity disables
    /// the beam.
    pub beam_threshold: Score,
    /// Maximum reordering distance. Negative disables the limit.
    pub max_distortion: i32,
    /// Longest source span a single translation option may cover.
    pub max_phrase_len: usize,
    /// Keep recombined hypotheses as arcs for n-best extraction.
    pub nbest_enabled: bool,
    /// Arc-list bound per hypothesis, and the contender-pool multiplier
    /// during distinct n-best extraction.
    pub nbest_factor: usize,
    /// Cube pruning takes the top-k hypotheses of a coverage group and the
    /// top-k options of a span as grid axes, and emits at most k results.
    pub cube_top_k: usize,
    /// Extra grid cells popped beyond `cube_top_k` before the cube result
    /// is cut, widening the explored frontier on non-monotone grids.
    pub cube_slack: usize,
    /// Weight applied to the reordering distance.
    pub distortion_weight: Score,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            stack_size: 100,
            beam_threshold: Score::NEG_INFINITY,
            max_distortion: 6,
            max_phrase_len: 7,
            nbest_enabled: false,
            nbest_factor: 20,
            cube_top_k: 3,
            cube_slack: 0,
            distortion_weight: 1.0,
        }
    }
}

impl DecoderConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: DecoderConfig =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        macro_rules! check_positive {
            ($field:ident) => {
                if self.$field == 0 {
                    return Err(ConfigError::InvalidValue {
                        field: stringify!($field).to_string(),
                        reason: "must be positive".to_string(),
                    });
                }
            };
        }

        check_positive!(stack_size);
        check_positive!(max_phrase_len);
        check_positive!(nbest_factor);
        check_positive!(cube_top_k);

        // NaN fails the comparison and is rejected along with positives
        if !(self.beam_threshold <= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "beam_threshold".to_string(),
                reason: "must be a non-positive log score".to_string(),
            });
        }
        if !self.distortion_weight.is_finite() || self.distortion_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "distortion_weight".to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DecoderConfig::default();
        config.validate().unwrap();
        assert_eq!(config.stack_size, 100);
        assert_eq!(config.cube_top_k, 3);
        assert_eq!(config.cube_slack, 0);
        assert!(config.beam_threshold.is_infinite());
        assert!(!config.nbest_enabled);
    }

    #[test]
    fn parse_valid_toml() {
        let config = DecoderConfig::from_toml(
            r#"
stack_size = 50
beam_threshold = -2.5
max_distortion = -1
max_phrase_len = 5
nbest_enabled = true
nbest_factor = 10
cube_top_k = 5
cube_slack = 2
distortion_weight = 0.3
"#,
        )
        .unwrap();
        assert_eq!(config.stack_size, 50);
        assert_eq!(config.beam_threshold, -2.5);
        assert_eq!(config.max_distortion, -1);
        assert!(config.nbest_enabled);
        assert_eq!(config.cube_top_k, 5);
        assert_eq!(config.cube_slack, 2);
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let config = DecoderConfig::from_toml("stack_size = 7\n").unwrap();
        assert_eq!(config.stack_size, 7);
        assert_eq!(config.max_phrase_len, 7);
        assert_eq!(config.cube_top_k, 3);
    }

    #[test]
    fn error_zero_stack_size() {
        let err = DecoderConfig::from_toml("stack_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("stack_size"));
    }

    #[test]
    fn error_positive_beam() {
        let err = DecoderConfig::from_toml("beam_threshold = 0.5\n").unwrap_err();
        assert!(err.to_string().contains("beam_threshold"));
    }

    #[test]
    fn error_zero_cube_top_k() {
        let err = DecoderConfig::from_toml("cube_top_k = 0\n").unwrap_err();
        assert!(err.to_string().contains("cube_top_k"));
    }

    #[test]
    fn error_negative_distortion_weight() {
        let err = DecoderConfig::from_toml("distortion_weight = -1.0\n").unwrap_err();
        assert!(err.to_string().contains("distortion_weight"));
    }

    #[test]
    fn error_invalid_toml() {
        let err = DecoderConfig::from_toml("not valid {{{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
