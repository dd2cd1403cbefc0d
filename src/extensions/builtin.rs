//! Built-in extensions.
//!
//! Only parameter negotiation happens here; the byte-level transforms run
//! in the framing layer, outside this crate.

use crate::extensions::config::ExtensionConfig;
use crate::extensions::registry::{Extension, ExtensionDescriptor, ExtensionError};

pub const IDENTITY: &str = "identity";
pub const PERMESSAGE_DEFLATE: &str = "permessage-deflate";

/// Names of every built-in extension.
pub const BUILTIN_EXTENSIONS: &[&str] = &[IDENTITY, PERMESSAGE_DEFLATE];

const MIN_WINDOW_BITS: u8 = 8;
const MAX_WINDOW_BITS: u8 = 15;

/// Descriptors for every built-in extension.
pub fn descriptors() -> Vec<ExtensionDescriptor> {
    BUILTIN_EXTENSIONS
        .iter()
        .filter_map(|name| descriptor(name))
        .collect()
}

/// Descriptor for one built-in extension, if `name` is one.
pub fn descriptor(name: &str) -> Option<ExtensionDescriptor> {
    match name {
        IDENTITY => Some(ExtensionDescriptor::new(IDENTITY, |offer: &ExtensionConfig| {
            Ok(Box::new(Identity {
                config: offer.clone(),
            }) as Box<dyn Extension>)
        })),
        PERMESSAGE_DEFLATE => Some(ExtensionDescriptor::new(
            PERMESSAGE_DEFLATE,
            |offer: &ExtensionConfig| {
                PerMessageDeflate::negotiate(offer).map(|ext| Box::new(ext) as Box<dyn Extension>)
            },
        )),
        _ => None,
    }
}

/// Accepts any parameters and answers with them unchanged.
#[derive(Debug)]
pub struct Identity {
    config: ExtensionConfig,
}

impl Extension for Identity {
    fn name(&self) -> &str {
        IDENTITY
    }

    fn negotiated(&self) -> ExtensionConfig {
        self.config.clone()
    }
}

/// RFC 7692 parameter negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerMessageDeflate {
    pub server_no_context_takeover: bool,
    pub client_no_context_takeover: bool,
    pub server_max_window_bits: Option<u8>,
    /// `Some(None)` when the client offered the flag without a value.
    pub client_max_window_bits: Option<Option<u8>>,
}

impl PerMessageDeflate {
    pub fn negotiate(offer: &ExtensionConfig) -> Result<Self, ExtensionError> {
        let mut deflate = Self::default();
        for (key, value) in &offer.params {
            match key.as_str() {
                "server_no_context_takeover" => deflate.server_no_context_takeover = true,
                "client_no_context_takeover" => deflate.client_no_context_takeover = true,
                "server_max_window_bits" => {
                    let bits = value
                        .as_deref()
                        .ok_or_else(|| invalid(key, ""))
                        .and_then(|v| window_bits(key, v))?;
                    deflate.server_max_window_bits = Some(bits);
                }
                "client_max_window_bits" => {
                    let bits = value.as_deref().map(|v| window_bits(key, v)).transpose()?;
                    deflate.client_max_window_bits = Some(bits);
                }
                _ => {
                    return Err(ExtensionError::UnsupportedParam {
                        name: PERMESSAGE_DEFLATE.to_string(),
                        param: key.clone(),
                    })
                }
            }
        }
        Ok(deflate)
    }
}

impl Extension for PerMessageDeflate {
    fn name(&self) -> &str {
        PERMESSAGE_DEFLATE
    }

    fn negotiated(&self) -> ExtensionConfig {
        let mut config = ExtensionConfig::new(PERMESSAGE_DEFLATE);
        if self.server_no_context_takeover {
            config = config.with_param("server_no_context_takeover", None);
        }
        if self.client_no_context_takeover {
            config = config.with_param("client_no_context_takeover", None);
        }
        if let Some(bits) = self.server_max_window_bits {
            config = config.with_param("server_max_window_bits", Some(&bits.to_string()));
        }
        // A bare client_max_window_bits offer needs no answer.
        if let Some(Some(bits)) = self.client_max_window_bits {
            config = config.with_param("client_max_window_bits", Some(&bits.to_string()));
        }
        config
    }
}

fn window_bits(key: &str, value: &str) -> Result<u8, ExtensionError> {
    value
        .parse::<u8>()
        .ok()
        .filter(|bits| (MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(bits))
        .ok_or_else(|| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ExtensionError {
    ExtensionError::InvalidParam {
        name: PERMESSAGE_DEFLATE.to_string(),
        param: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::registry::ExtensionRegistry;

    fn offer(header: &str) -> ExtensionConfig {
        ExtensionConfig::parse_header(header).remove(0)
    }

    #[test]
    fn test_deflate_negotiation() {
        let ext = PerMessageDeflate::negotiate(&offer(
            "permessage-deflate; client_no_context_takeover; server_max_window_bits=15; client_max_window_bits",
        ))
        .unwrap();
        assert!(ext.client_no_context_takeover);
        assert_eq!(ext.server_max_window_bits, Some(15));
        assert_eq!(ext.client_max_window_bits, Some(None));
        assert_eq!(
            ext.negotiated().to_string(),
            "permessage-deflate; client_no_context_takeover; server_max_window_bits=15"
        );
    }

    #[test]
    fn test_deflate_declines_bad_offers() {
        assert!(matches!(
            PerMessageDeflate::negotiate(&offer("permessage-deflate; mystery")),
            Err(ExtensionError::UnsupportedParam { .. })
        ));
        assert!(matches!(
            PerMessageDeflate::negotiate(&offer("permessage-deflate; server_max_window_bits=big")),
            Err(ExtensionError::InvalidParam { .. })
        ));
        assert!(PerMessageDeflate::negotiate(&offer("permessage-deflate; server_max_window_bits")).is_err());
        for header in [
            "permessage-deflate; server_max_window_bits=20",
            "permessage-deflate; server_max_window_bits=7",
            "permessage-deflate; client_max_window_bits=16",
        ] {
            assert!(
                matches!(
                    PerMessageDeflate::negotiate(&offer(header)),
                    Err(ExtensionError::InvalidParam { .. })
                ),
                "{header}"
            );
        }
        let ext = PerMessageDeflate::negotiate(&offer("permessage-deflate; client_max_window_bits=8")).unwrap();
        assert_eq!(ext.client_max_window_bits, Some(Some(8)));
    }

    #[test]
    fn test_builtin_registry_falls_back_to_second_offer() {
        let registry = ExtensionRegistry::with_builtins();
        let offers = ExtensionConfig::parse_header(
            "permessage-deflate; unknown, permessage-deflate; server_no_context_takeover, identity; x=1",
        );
        let chain = registry.resolve(&offers);
        let negotiated: Vec<_> = chain.iter().map(|e| e.negotiated().to_string()).collect();
        assert_eq!(
            negotiated,
            vec!["permessage-deflate; server_no_context_takeover", "identity; x=1"]
        );
    }
}
