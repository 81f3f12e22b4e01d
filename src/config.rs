use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::relation_path::naming::{count_placeholders, NamingTemplates};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read compiler settings from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Compiler settings in {path} are not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("{key}={value} is not a usable setting: {reason}")]
    Setting {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Compiler settings rejected: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Paging syntax used by the relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    /// `LIMIT n OFFSET m`
    #[default]
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    FetchFirst,
}

impl std::str::FromStr for DialectKind {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "limit_offset" | "mysql" | "postgres" | "h2" => Ok(DialectKind::LimitOffset),
            "fetch_first" | "ansi" | "oracle" | "sqlserver" => Ok(DialectKind::FetchFirst),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown dialect '{0}' (expected limit_offset or fetch_first)")]
pub struct UnknownDialect(String);

/// Compiler configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Physical table/collection name template, one `%s` for the domain name
    #[validate(custom(function = "validate_single_placeholder"))]
    pub table_format: String,

    /// Join table name template, two `%s` for the adjacent domain names
    #[validate(custom(function = "validate_double_placeholder"))]
    pub join_table_format: String,

    /// Join key column template, one `%s` for the domain name
    #[validate(custom(function = "validate_single_placeholder"))]
    pub join_id_format: String,

    /// Paging syntax of the relational backend
    pub dialect: DialectKind,

    /// Map camelCase field names to snake_case columns
    pub map_camel_case_to_underscore: bool,

    /// Treat `pageNumber` 1 as the first page instead of 0
    pub start_page_number_from_one: bool,

    /// Page size used when only `pageNumber` is supplied
    #[validate(range(
        min = 1,
        max = 10000,
        message = "Default page size must be between 1 and 10000"
    ))]
    pub default_page_size: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            table_format: "t_%s".to_string(),
            join_table_format: "j_%s_and_%s".to_string(),
            join_id_format: "%s_id".to_string(),
            dialect: DialectKind::LimitOffset,
            map_camel_case_to_underscore: false,
            start_page_number_from_one: false,
            default_page_size: 10,
        }
    }
}

impl CompilerConfig {
    /// Defaults overridden by the `DOMAINQL_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            table_format: setting("DOMAINQL_TABLE_FORMAT", defaults.table_format)?,
            join_table_format: setting("DOMAINQL_JOIN_TABLE_FORMAT", defaults.join_table_format)?,
            join_id_format: setting("DOMAINQL_JOIN_ID_FORMAT", defaults.join_id_format)?,
            dialect: setting("DOMAINQL_DIALECT", defaults.dialect)?,
            map_camel_case_to_underscore: setting(
                "DOMAINQL_MAP_CAMEL_CASE",
                defaults.map_camel_case_to_underscore,
            )?,
            start_page_number_from_one: setting(
                "DOMAINQL_PAGE_FROM_ONE",
                defaults.start_page_number_from_one,
            )?,
            default_page_size: setting("DOMAINQL_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Environment settings with the command line flags applied on top
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        if let Some(table_format) = cli.table_format {
            config.table_format = table_format;
        }
        if let Some(join_table_format) = cli.join_table_format {
            config.join_table_format = join_table_format;
        }
        if let Some(dialect) = cli.dialect {
            config.dialect = dialect;
        }
        config.map_camel_case_to_underscore |= cli.map_camel_case_to_underscore;

        config.validate()?;
        Ok(config)
    }

    /// Settings file; keys left out keep their defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Naming templates used by the relationship path resolver
    pub fn naming(&self) -> NamingTemplates {
        NamingTemplates {
            table_format: self.table_format.clone(),
            join_table_format: self.join_table_format.clone(),
            join_id_format: self.join_id_format.clone(),
        }
    }

    /// Offset of the first row of `page_number` for pages of `page_size` rows
    pub fn calc_offset(&self, page_number: u64, page_size: u64) -> u64 {
        let base = u64::from(self.start_page_number_from_one);
        page_number.saturating_sub(base).saturating_mul(page_size)
    }
}

/// Overrides taken from the command line; `None` keeps the environment value.
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub table_format: Option<String>,
    pub join_table_format: Option<String>,
    pub dialect: Option<DialectKind>,
    pub map_camel_case_to_underscore: bool,
}

fn validate_single_placeholder(format: &str) -> Result<(), ValidationError> {
    validate_placeholders(format, 1)
}

fn validate_double_placeholder(format: &str) -> Result<(), ValidationError> {
    validate_placeholders(format, 2)
}

fn validate_placeholders(format: &str, expected: usize) -> Result<(), ValidationError> {
    if count_placeholders(format) == expected {
        Ok(())
    } else {
        let mut error = ValidationError::new("placeholder_count");
        error.message = Some(format!("'{}' must contain exactly {} %s", format, expected).into());
        Err(error)
    }
}

fn setting<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_setting(key, env::var(key).ok(), default)
}

/// Blank or absent values fall back to `default`.
fn parse_setting<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Setting {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.table_format, "t_%s");
        assert_eq!(config.join_table_format, "j_%s_and_%s");
        assert_eq!(config.dialect, DialectKind::LimitOffset);
    }

    #[test]
    fn test_join_table_format_needs_two_placeholders() {
        let config = CompilerConfig {
            join_table_format: "j_%s".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_format_needs_one_placeholder() {
        let config = CompilerConfig {
            table_format: "users".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_default_page_size() {
        let config = CompilerConfig {
            default_page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_calc_offset() {
        let config = CompilerConfig::default();
        assert_eq!(config.calc_offset(0, 10), 0);
        assert_eq!(config.calc_offset(3, 10), 30);

        let config = CompilerConfig {
            start_page_number_from_one: true,
            ..Default::default()
        };
        assert_eq!(config.calc_offset(1, 10), 0);
        assert_eq!(config.calc_offset(0, 10), 0);
        assert_eq!(config.calc_offset(2, 5), 5);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("fetch-first".parse::<DialectKind>().unwrap(), DialectKind::FetchFirst);
        assert_eq!("MySQL".parse::<DialectKind>().unwrap(), DialectKind::LimitOffset);
        assert!("sqlite3".parse::<DialectKind>().is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "table_format: \"tbl_%s\"\ndialect: fetch_first\nmap_camel_case_to_underscore: true"
        )
        .unwrap();

        let config = CompilerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.table_format, "tbl_%s");
        assert_eq!(config.join_table_format, "j_%s_and_%s");
        assert_eq!(config.dialect, DialectKind::FetchFirst);
        assert!(config.map_camel_case_to_underscore);
    }

    #[test]
    fn test_parse_setting() {
        assert_eq!(parse_setting("DOMAINQL_DEFAULT_PAGE_SIZE", Some(" 25 ".to_string()), 10u32).unwrap(), 25);
        assert_eq!(parse_setting("DOMAINQL_DEFAULT_PAGE_SIZE", Some(String::new()), 10u32).unwrap(), 10);
        assert!(!parse_setting("DOMAINQL_PAGE_FROM_ONE", None, false).unwrap());
        assert_eq!(
            parse_setting("DOMAINQL_DIALECT", Some("oracle".to_string()), DialectKind::LimitOffset).unwrap(),
            DialectKind::FetchFirst
        );

        let error = parse_setting("DOMAINQL_DIALECT", Some("sqlite3".to_string()), DialectKind::LimitOffset)
            .unwrap_err();
        assert!(matches!(&error, ConfigError::Setting { key, value, .. }
            if key == "DOMAINQL_DIALECT" && value == "sqlite3"));
        assert!(error.to_string().starts_with("DOMAINQL_DIALECT=sqlite3 is not a usable setting"));
    }

    #[test]
    fn test_from_yaml_file_read_and_syntax_errors() {
        let missing = std::env::temp_dir().join("domainql-no-such-settings.yaml");
        assert!(matches!(
            CompilerConfig::from_yaml_file(&missing),
            Err(ConfigError::Read { path, .. }) if path == missing
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dialect: [not, a, dialect").unwrap();
        assert!(matches!(
            CompilerConfig::from_yaml_file(file.path()),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_from_yaml_file_rejects_bad_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "join_table_format: \"%s_%s_%s\"").unwrap();
        assert!(matches!(
            CompilerConfig::from_yaml_file(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }
}
