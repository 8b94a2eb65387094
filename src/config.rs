use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use libc::c_int;

use crate::libxml2::{XML_PARSE_NOBLANKS, XML_PARSE_NONET, XML_SAVE_AS_XML, XML_SAVE_FORMAT};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Library configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct XmlConfig {
    pub parser: ParserConfig,
    pub writer: WriterConfig,
}

/// Parser configuration
///
/// Strictness is not configurable: every parse escalates warnings and
/// recoverable errors to failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Refuse network access while loading external resources
    pub forbid_network: bool,
    /// Drop whitespace-only text between elements
    pub drop_blank_text: bool,
}

/// Writer save options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WriterConfig {
    /// Indent nested elements
    pub pretty_print: bool,
    /// Output character encoding
    pub encoding: String,
    /// Validate documents before writing them
    pub validate: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            forbid_network: true,
            drop_blank_text: true,
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            pretty_print: true,
            encoding: "UTF-8".to_string(),
            validate: true,
        }
    }
}

impl ParserConfig {
    /// libxml2 parser option flags for this configuration
    pub(crate) fn options(&self) -> c_int {
        let mut options = 0;
        if self.forbid_network {
            options |= XML_PARSE_NONET;
        }
        if self.drop_blank_text {
            options |= XML_PARSE_NOBLANKS;
        }
        options
    }
}

impl WriterConfig {
    /// libxml2 save option flags for this configuration
    pub(crate) fn options(&self) -> c_int {
        if self.pretty_print {
            XML_SAVE_AS_XML | XML_SAVE_FORMAT
        } else {
            XML_SAVE_AS_XML
        }
    }
}

impl XmlConfig {
    /// Parse and validate a TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: XmlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let encoding = &self.writer.encoding;
        if encoding.trim().is_empty() {
            return Err(ConfigError::Validation(
                "writer.encoding must not be empty".to_string(),
            ));
        }
        if !encoding.is_ascii() || encoding.contains('\0') {
            return Err(ConfigError::Validation(format!(
                "writer.encoding '{}' is not a valid encoding name",
                encoding.escape_default()
            )));
        }
        Ok(())
    }
}
