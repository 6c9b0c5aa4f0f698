//! # Validation
//!
//! URL validation for configured endpoints and git origins, and the
//! order-insensitive comparison of decision mappings.

use crate::provider::das::DecisionMappingConfig;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Characters allowed in a URL path: RFC 3986 unreserved, sub-delims, `:` `@` `/`
static URL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-._~!$&'()*+,;=:@/]*$")
        .expect("Failed to compile URL_PATH regex - this should never happen")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("URL '{0}' must use the http or https scheme")]
    InvalidScheme(String),
    #[error("URL '{0}' has no host")]
    MissingHost(String),
    #[error("URL '{0}' contains characters that are not allowed in its path")]
    InvalidCharacters(String),
    #[error("URL '{url}' is malformed: {source}")]
    Malformed {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Validate an http(s) URL
///
/// An empty string is valid and means "not configured". The scheme is
/// matched case-insensitively; only the path is checked for allowed
/// characters, so query and fragment may carry anything the parser accepts.
pub fn validate_url(raw: &str) -> Result<(), ValidationError> {
    if raw.is_empty() {
        return Ok(());
    }
    let parsed = match Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(ValidationError::InvalidScheme(raw.to_string()))
        }
        Err(url::ParseError::EmptyHost) => return Err(ValidationError::MissingHost(raw.to_string())),
        Err(source) => {
            return Err(ValidationError::Malformed {
                url: raw.to_string(),
                source,
            })
        }
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidScheme(raw.to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::MissingHost(raw.to_string()));
    }
    if !URL_PATH.is_match(parsed.path()) {
        return Err(ValidationError::InvalidCharacters(raw.to_string()));
    }
    Ok(())
}

fn normalize(mappings: &BTreeMap<String, DecisionMappingConfig>) -> BTreeMap<String, DecisionMappingConfig> {
    mappings
        .iter()
        .map(|(name, mapping)| {
            let mut mapping = mapping.clone();
            mapping.columns.sort_by(|a, b| a.key.cmp(&b.key));
            (name.clone(), mapping)
        })
        .collect()
}

/// Equal after sorting each mapping's columns by key
pub fn decision_mappings_equal(
    a: &BTreeMap<String, DecisionMappingConfig>,
    b: &BTreeMap<String, DecisionMappingConfig>,
) -> bool {
    a.len() == b.len() && normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::das::{AllowedMappingConfig, ColumnMappingConfig};

    #[test]
    fn test_validate_url() {
        assert!(validate_url("").is_ok());
        assert!(validate_url("https://host/path").is_ok());
        assert!(validate_url("http://host:8080/a-b_c~d/e.git").is_ok());
        assert!(validate_url("https://user@host/path;x=1").is_ok());

        assert_eq!(
            validate_url("https://host/[x]/path"),
            Err(ValidationError::InvalidCharacters("https://host/[x]/path".to_string()))
        );
        assert!(matches!(
            validate_url("ftp://host/path"),
            Err(ValidationError::InvalidScheme(_))
        ));
        assert!(matches!(
            validate_url("host/path"),
            Err(ValidationError::InvalidScheme(_))
        ));
        assert!(matches!(
            validate_url("https://"),
            Err(ValidationError::MissingHost(_))
        ));
        assert!(validate_url("https://host/a b").is_err());
    }

    #[test]
    fn test_validate_url_checks_only_the_path() {
        assert!(validate_url("https://host/path?ref=main").is_ok());
        assert!(validate_url("https://host/path?q=[1]#frag{x}").is_ok());
        assert!(validate_url("HTTPS://Host/Path").is_ok());
        assert!(validate_url("Http://host").is_ok());
        assert!(matches!(
            validate_url("https://host/[x]/path?ref=main"),
            Err(ValidationError::InvalidCharacters(_))
        ));
        assert!(matches!(
            validate_url("https://host:99999/path"),
            Err(ValidationError::Malformed { .. })
        ));
    }

    fn column(key: &str) -> ColumnMappingConfig {
        ColumnMappingConfig {
            key: key.to_string(),
            path: format!("input.{key}"),
            type_: String::new(),
        }
    }

    fn mappings(keys: &[&str]) -> BTreeMap<String, DecisionMappingConfig> {
        BTreeMap::from([(
            "authz".to_string(),
            DecisionMappingConfig {
                allowed: Some(AllowedMappingConfig {
                    path: "result.allowed".to_string(),
                    expected: Some(serde_json::json!(true)),
                    negated: false,
                }),
                reason: None,
                columns: keys.iter().map(|k| column(k)).collect(),
            },
        )])
    }

    #[test]
    fn test_decision_mappings_ignore_column_order() {
        assert!(decision_mappings_equal(
            &mappings(&["user", "method", "path"]),
            &mappings(&["path", "user", "method"])
        ));
    }

    #[test]
    fn test_decision_mappings_detect_differences() {
        assert!(!decision_mappings_equal(
            &mappings(&["user", "method"]),
            &mappings(&["user", "path"])
        ));
        assert!(!decision_mappings_equal(&mappings(&["user"]), &BTreeMap::new()));
        assert!(decision_mappings_equal(&BTreeMap::new(), &BTreeMap::new()));
    }
}
