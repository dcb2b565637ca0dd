//! # Config Loader
//!
//! Turns a relay config file into a validated [`RelayBlueprint`].
//!
//! Command-line overrides are applied before validation, so an override
//! that breaks a rule (a relative destination, an unparsable listen
//! address) is reported the same way a bad file value is.
//!
//! ```no_run
//! use config_loader::{ConfigLoader, Overrides};
//! use std::path::Path;
//!
//! let overrides = Overrides {
//!     listen: Some("127.0.0.1:9000".into()),
//!     ..Default::default()
//! };
//! let blueprint = ConfigLoader::load_with_overrides(Path::new("relay.toml"), &overrides).unwrap();
//! println!("Destination: {}", blueprint.destination.uri);
//! ```

mod parser;
mod validator;

pub use contracts::RelayBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Values that replace the file's settings
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces `server.listen`
    pub listen: Option<String>,
    /// Replaces `destination.uri`
    pub destination: Option<String>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.listen.is_none() && self.destination.is_none()
    }

    fn apply(&self, blueprint: &mut RelayBlueprint) {
        if let Some(listen) = &self.listen {
            blueprint.server.listen = listen.clone();
        }
        if let Some(destination) = &self.destination {
            blueprint.destination.uri = destination.clone();
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a `.toml` or `.json` file
    ///
    /// # Errors
    /// Unreadable file, unknown extension, parse or validation failure.
    pub fn load_from_path(path: &Path) -> Result<RelayBlueprint, ContractError> {
        Self::load_with_overrides(path, &Overrides::default())
    }

    /// Load a file, apply `overrides`, then validate the result
    pub fn load_with_overrides(
        path: &Path,
        overrides: &Overrides,
    ) -> Result<RelayBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;

        let mut blueprint = parser::parse(&content, format)?;
        overrides.apply(&mut blueprint);
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Parse and validate in-memory content
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RelayBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
