use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A model identifier understood by the completion endpoint.
///
/// Known models are the allow-list offered to the user; anything else is
/// carried through verbatim as a custom identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Model {
    /// A model from the allow-list.
    Known(KnownModel),

    /// Custom model identifier (for models not on the allow-list).
    Custom(String),
}

/// Models offered for selection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KnownModel {
    /// DeepSeek R1, which streams a separate reasoning channel.
    DeepSeekR1,

    /// Aion 1.0
    Aion10,

    /// GPT-4o mini
    Gpt4oMini,

    /// Gemini 2.0 Flash Thinking (experimental, free tier)
    Gemini20FlashThinkingExpFree,
}

impl KnownModel {
    /// All known models in presentation order.
    pub const ALL: [KnownModel; 4] = [
        KnownModel::DeepSeekR1,
        KnownModel::Aion10,
        KnownModel::Gpt4oMini,
        KnownModel::Gemini20FlashThinkingExpFree,
    ];

    /// The identifier sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::DeepSeekR1 => "deepseek/deepseek-r1",
            KnownModel::Aion10 => "aion-labs/aion-1.0",
            KnownModel::Gpt4oMini => "openai/gpt-4o-mini",
            KnownModel::Gemini20FlashThinkingExpFree => {
                "google/gemini-2.0-flash-thinking-exp:free"
            }
        }
    }
}

impl Model {
    /// Returns the identifier sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Model::Known(known) => known.as_str(),
            Model::Custom(custom) => custom,
        }
    }

    /// Returns true if the model is on the allow-list.
    pub fn is_known(&self) -> bool {
        matches!(self, Model::Known(_))
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::DeepSeekR1)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string does not name a known model.
#[derive(Debug)]
pub struct KnownModelParseError {
    /// The string that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for KnownModelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown model: {}", self.invalid_value)
    }
}

impl std::error::Error for KnownModelParseError {}

impl FromStr for KnownModel {
    type Err = KnownModelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KnownModel::ALL
            .into_iter()
            .find(|known| known.as_str() == s)
            .ok_or_else(|| KnownModelParseError {
                invalid_value: s.to_string(),
            })
    }
}

impl FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Model::from(s))
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        match model.parse::<KnownModel>() {
            Ok(known) => Model::Known(known),
            Err(_) => Model::Custom(model),
        }
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Model::from(model.to_string())
    }
}

impl From<Model> for String {
    fn from(model: Model) -> Self {
        match model {
            Model::Known(known) => known.as_str().to_string(),
            Model::Custom(custom) => custom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_serialization() {
        let model = Model::Known(KnownModel::DeepSeekR1);
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, r#""deepseek/deepseek-r1""#);
    }

    #[test]
    fn custom_model_round_trips_verbatim() {
        let model: Model = serde_json::from_str(r#""mistral/some-new-model""#).unwrap();
        assert_eq!(model, Model::Custom("mistral/some-new-model".to_string()));
        assert!(!model.is_known());
    }

    #[test]
    fn parse_recognizes_allow_list() {
        let model: Model = "google/gemini-2.0-flash-thinking-exp:free".parse().unwrap();
        assert_eq!(model, Model::Known(KnownModel::Gemini20FlashThinkingExpFree));
        for known in KnownModel::ALL {
            assert_eq!(known.as_str().parse::<KnownModel>().unwrap(), known);
        }
    }

    #[test]
    fn default_is_deepseek() {
        assert_eq!(Model::default().to_string(), "deepseek/deepseek-r1");
    }
}
