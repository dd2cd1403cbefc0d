//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Parse every mapping spec and detect structural duplicates
//! - Check referenced extensions exist
//! - Validate value ranges (sizes and timeouts > 0, reject statuses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;
use crate::endpoints::EndpointKind;
use crate::extensions::builtin;
use crate::pathspec::{PathSpec, PathSpecError};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("unknown extension `{0}`")]
    UnknownExtension(String),

    #[error("mapping #{index}: {error}")]
    InvalidSpec { index: usize, error: PathSpecError },

    #[error("mapping #{index}: spec `{spec}` duplicates an earlier mapping")]
    DuplicateSpec { index: usize, spec: String },

    #[error("mapping #{index}: reject endpoint needs a 4xx or 5xx status")]
    InvalidRejectStatus { index: usize },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let checks = [
        ("listener.max_sessions", config.listener.max_sessions as u64),
        ("session.idle_timeout_secs", config.session.idle_timeout_secs),
        ("session.max_text_message_size", config.session.max_text_message_size as u64),
        ("session.max_binary_message_size", config.session.max_binary_message_size as u64),
        ("session.max_frame_size", config.session.max_frame_size as u64),
    ];
    for (field, value) in checks {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    for name in &config.extensions.enabled {
        if builtin::descriptor(name).is_none() {
            errors.push(ValidationError::UnknownExtension(name.clone()));
        }
    }

    let mut seen = HashSet::new();
    for (index, mapping) in config.mappings.iter().enumerate() {
        match PathSpec::parse(&mapping.spec) {
            Ok(spec) => {
                if !seen.insert(spec) {
                    errors.push(ValidationError::DuplicateSpec {
                        index,
                        spec: mapping.spec.clone(),
                    });
                }
            }
            Err(error) => errors.push(ValidationError::InvalidSpec { index, error }),
        }

        if mapping.endpoint == EndpointKind::Reject
            && !matches!(mapping.status, Some(400..=599))
        {
            errors.push(ValidationError::InvalidRejectStatus { index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::MappingConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RouterConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RouterConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.session.max_frame_size = 0;
        config.extensions.enabled.push("x-unknown".into());
        config.mappings = vec![
            MappingConfig::echo("/a/*"),
            MappingConfig::echo("servlet|/a/*"),
            MappingConfig::echo("relative"),
            MappingConfig::reject("/b", 200),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::Zero("session.max_frame_size")));
        assert!(errors.contains(&ValidationError::UnknownExtension("x-unknown".into())));
        assert!(errors.contains(&ValidationError::DuplicateSpec {
            index: 1,
            spec: "servlet|/a/*".into()
        }));
        assert!(errors.contains(&ValidationError::InvalidRejectStatus { index: 3 }));
    }
}
