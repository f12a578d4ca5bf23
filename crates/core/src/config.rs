use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_AMBIGUITY_MARGIN: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// A fuzzy score must be strictly above this to be accepted.
    pub acceptance_threshold: f64,
    /// Minimum lead of the best fuzzy score over the runner-up.
    pub ambiguity_margin: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(ConfigError::Threshold(self.acceptance_threshold));
        }
        if !(0.0..1.0).contains(&self.ambiguity_margin) {
            return Err(ConfigError::Margin(self.ambiguity_margin));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub top_k: usize,
    pub resolver: ResolverConfig,
    /// Send the tool output back to the model for a closing message.
    pub compose_final_answer: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            resolver: ResolverConfig::default(),
            compose_final_answer: false,
        }
    }
}

impl ChainSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::TopK);
        }
        self.resolver.validate()
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            temperature: 0.2,
            timeout: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::MaxAttempts);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ChainSettings::default().validate().is_ok());
        assert!(OpenAiConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_resolver_values_are_rejected() {
        let threshold = ResolverConfig {
            acceptance_threshold: 1.2,
            ..ResolverConfig::default()
        };
        assert!(matches!(threshold.validate(), Err(ConfigError::Threshold(_))));

        let margin = ResolverConfig {
            ambiguity_margin: 1.0,
            ..ResolverConfig::default()
        };
        assert!(matches!(margin.validate(), Err(ConfigError::Margin(_))));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let settings = ChainSettings {
            top_k: 0,
            ..ChainSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::TopK)));
    }
}
