//! Secret references for configuration values.
//!
//! Credentials never live in source. A config field holding a secret is a
//! [`SecretRef`]:
//!
//! - `token = "abc"` reads the value straight from the config file;
//! - `token = { env = "SBS_TELEGRAM_TOKEN" }` reads it from the environment
//!   when the process starts;
//! - `token = ""` (or omitted) means "not configured".

use crate::error::{Result, WatchError};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Reference to a configured secret.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum SecretRef {
    /// Value taken from the named environment variable at startup.
    Env(String),
    /// Value written inline in the config file.
    Inline(String),
    /// No secret configured.
    #[default]
    None,
}

// Never print secret material, even at debug level.
impl std::fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(name) => write!(f, "SecretRef::Env({name})"),
            Self::Inline(_) => write!(f, "SecretRef::Inline(***)"),
            Self::None => write!(f, "SecretRef::None"),
        }
    }
}

impl Serialize for SecretRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SecretRef::Inline(value) => serializer.serialize_str(value),
            SecretRef::None => serializer.serialize_str(""),
            SecretRef::Env(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("env", name)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for SecretRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SecretRefVisitor;

        impl<'de> Visitor<'de> for SecretRefVisitor {
            type Value = SecretRef;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a string or a map with an 'env' key")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<SecretRef, E> {
                if value.is_empty() {
                    Ok(SecretRef::None)
                } else {
                    Ok(SecretRef::Inline(value.to_owned()))
                }
            }

            fn visit_map<M: MapAccess<'de>>(
                self,
                mut map: M,
            ) -> std::result::Result<SecretRef, M::Error> {
                let mut env: Option<String> = Option::None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "env" => env = Some(map.next_value()?),
                        other => {
                            let _: de::IgnoredAny = map.next_value()?;
                            return Err(de::Error::unknown_field(other, &["env"]));
                        }
                    }
                }

                match env {
                    Some(name) if !name.trim().is_empty() => Ok(SecretRef::Env(name)),
                    _ => Err(de::Error::missing_field("env")),
                }
            }
        }

        deserializer.deserialize_any(SecretRefVisitor)
    }
}

impl SecretRef {
    /// `false` only for [`SecretRef::None`].
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self, SecretRef::None)
    }

    /// Resolve to the secret value, `Ok(None)` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] when the referenced environment
    /// variable is missing or empty.
    pub fn resolve(&self) -> Result<Option<String>> {
        match self {
            SecretRef::None => Ok(None),
            SecretRef::Inline(value) => Ok(Some(value.clone())),
            SecretRef::Env(name) => match std::env::var(name) {
                Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
                Ok(_) => Err(WatchError::Config(format!(
                    "environment variable {name} is empty"
                ))),
                Err(_) => Err(WatchError::Config(format!(
                    "environment variable {name} is not set"
                ))),
            },
        }
    }

    /// Resolve a secret that must be present. `what` names the field in the
    /// error message.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] when the secret is unset or unresolvable.
    pub fn require(&self, what: &str) -> Result<String> {
        self.resolve()?
            .ok_or_else(|| WatchError::Config(format!("{what} is required but not configured")))
    }
}
