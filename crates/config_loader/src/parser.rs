//! Blueprint decoding
//!
//! TOML is the primary format; JSON is accepted for generated configs.

use std::path::Path;

use contracts::{ContractError, RelayBlueprint};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from the file extension, case-insensitively
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "'{}' has no extension, expected .toml or .json",
                    path.display()
                ))
            })?;

        if ext.eq_ignore_ascii_case("toml") {
            Ok(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(ContractError::config_parse(format!(
                "unsupported config format: .{ext}"
            )))
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// Decode `content` into a blueprint; missing sections take their defaults
pub fn parse(content: &str, format: ConfigFormat) -> Result<RelayBlueprint, ContractError> {
    let decoded: Result<RelayBlueprint, BoxError> = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(Into::into),
        ConfigFormat::Json => serde_json::from_str(content).map_err(Into::into),
    };

    decoded.map_err(|source| ContractError::ConfigParse {
        message: format!("{} parse error: {source}", format.label()),
        source: Some(source),
    })
}
