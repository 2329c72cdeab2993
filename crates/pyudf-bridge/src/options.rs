//! Conversion options
//!
//! Options are usually embedded in a host's settings file:
//!
//! ```toml
//! allow-extra-struct-fields = true
//! interval-month-days = 30
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Days a month counts for when an interval becomes a fixed duration
pub const DEFAULT_INTERVAL_MONTH_DAYS: u32 = 30;

/// Deepest container nesting accepted in either direction
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Errors raised while loading options
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid options: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid options: {0}")]
    Invalid(String),
}

/// Knobs for the conversions a [`Converter`](crate::Converter) performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConversionOptions {
    /// Accept dict keys a STRUCT does not declare, ignoring them
    pub allow_extra_struct_fields: bool,

    /// Render MAP values as `{'key': [...], 'value': [...]}`
    pub map_as_key_value_lists: bool,

    /// Days per month when an INTERVAL becomes a `timedelta`
    pub interval_month_days: u32,

    /// Deepest container nesting accepted
    pub max_nesting_depth: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            allow_extra_struct_fields: false,
            map_as_key_value_lists: false,
            interval_month_days: DEFAULT_INTERVAL_MONTH_DAYS,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl ConversionOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let options: Self = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.interval_month_days == 0 {
            return Err(OptionsError::Invalid(
                "interval-month-days must be at least 1".to_string(),
            ));
        }
        if self.max_nesting_depth == 0 {
            return Err(OptionsError::Invalid(
                "max-nesting-depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_extra_struct_fields(mut self, allow: bool) -> Self {
        self.allow_extra_struct_fields = allow;
        self
    }

    pub fn with_map_as_key_value_lists(mut self, enabled: bool) -> Self {
        self.map_as_key_value_lists = enabled;
        self
    }

    pub fn with_interval_month_days(mut self, days: u32) -> Self {
        self.interval_month_days = days;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_is_default() {
        let options = ConversionOptions::from_toml_str("").unwrap();
        assert_eq!(options, ConversionOptions::default());
        assert_eq!(options.interval_month_days, 30);
        assert_eq!(options.max_nesting_depth, 64);
    }

    #[test]
    fn test_parse_kebab_case() {
        let toml_str = r#"
            allow-extra-struct-fields = true
            map-as-key-value-lists = true
            max-nesting-depth = 8
        "#;
        let options = ConversionOptions::from_toml_str(toml_str).unwrap();
        assert_eq!(
            options,
            ConversionOptions::default()
                .with_extra_struct_fields(true)
                .with_map_as_key_value_lists(true)
                .with_max_nesting_depth(8)
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ConversionOptions::from_toml_str("allow_extra = true").unwrap_err();
        assert!(matches!(err, OptionsError::Parse(_)));
    }

    #[test]
    fn test_zero_month_days_rejected() {
        let err = ConversionOptions::from_toml_str("interval-month-days = 0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid options: interval-month-days must be at least 1"
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let options = ConversionOptions::default().with_interval_month_days(31);
        let text = toml::to_string(&options).unwrap();
        assert!(text.contains("interval-month-days = 31"));
        assert_eq!(ConversionOptions::from_toml_str(&text).unwrap(), options);
    }

    #[test]
    fn test_missing_file() {
        let err = ConversionOptions::from_file("/nonexistent/pyudf.toml").unwrap_err();
        assert!(matches!(err, OptionsError::Io(_)));
    }
}
