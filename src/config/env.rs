//! Typed lookups against a snapshot of the process environment.

use std::collections::HashMap;
use std::str::FromStr;

use crate::config::database::DatabaseDescriptor;
use crate::error::ConfigError;

const TRUTHY: &[&str] = &["true", "on", "ok", "y", "yes", "1"];
const FALSY: &[&str] = &["false", "off", "n", "no", "0", ""];

/// Environment source for settings resolution.
///
/// Built once from the process environment (or from explicit pairs in tests) so that
/// resolution never observes the environment changing underneath it.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: HashMap<String, String>,
}

/// A type that can be read out of a single environment value.
pub trait FromEnvValue: Sized {
    fn from_env_value(key: &str, raw: &str) -> Result<Self, ConfigError>;
}

impl Env {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Looks up `key` and coerces it to `T`.
    ///
    /// An absent key falls back to `default`; an absent key without a default is a
    /// `ConfigError::Missing`. A present but malformed value is always an error, even
    /// when a default exists.
    pub fn resolve<T: FromEnvValue>(&self, key: &str, default: Option<T>) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => T::from_env_value(key, raw),
            None => default.ok_or_else(|| ConfigError::Missing { key: key.to_string() }),
        }
    }

    /// Shorthand for a required value.
    pub fn require<T: FromEnvValue>(&self, key: &str) -> Result<T, ConfigError> {
        self.resolve(key, None)
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        self.resolve(key, Some(default.to_string()))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.resolve(key, Some(default))
    }

    pub fn list_or(&self, key: &str, default: &[&str]) -> Result<Vec<String>, ConfigError> {
        self.resolve(key, Some(default.iter().map(|s| s.to_string()).collect()))
    }

    pub fn db_or(&self, key: &str, default: &str) -> Result<DatabaseDescriptor, ConfigError> {
        match self.get(key) {
            Some(raw) => DatabaseDescriptor::from_env_value(key, raw),
            None => DatabaseDescriptor::from_env_value(key, default),
        }
    }
}

impl FromEnvValue for String {
    fn from_env_value(_key: &str, raw: &str) -> Result<Self, ConfigError> {
        Ok(raw.to_string())
    }
}

impl FromEnvValue for bool {
    fn from_env_value(key: &str, raw: &str) -> Result<Self, ConfigError> {
        let lowered = raw.trim().to_ascii_lowercase();
        if TRUTHY.contains(&lowered.as_str()) {
            Ok(true)
        } else if FALSY.contains(&lowered.as_str()) {
            Ok(false)
        } else {
            Err(ConfigError::Invalid {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "a boolean (true/false, yes/no, on/off, 1/0)",
            })
        }
    }
}

impl FromEnvValue for Vec<String> {
    fn from_env_value(_key: &str, raw: &str) -> Result<Self, ConfigError> {
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect())
    }
}

macro_rules! impl_from_env_value_for_int {
    ($($ty:ty),*) => {
        $(
            impl FromEnvValue for $ty {
                fn from_env_value(key: &str, raw: &str) -> Result<Self, ConfigError> {
                    <$ty>::from_str(raw.trim()).map_err(|_| ConfigError::Invalid {
                        key: key.to_string(),
                        value: raw.to_string(),
                        expected: concat!("an integer (", stringify!($ty), ")"),
                    })
                }
            }
        )*
    };
}

impl_from_env_value_for_int!(u16, u32, u64, i64, usize);

impl FromEnvValue for DatabaseDescriptor {
    fn from_env_value(key: &str, raw: &str) -> Result<Self, ConfigError> {
        DatabaseDescriptor::parse(raw).map_err(|reason| ConfigError::InvalidDatabaseUrl {
            key: key.to_string(),
            reason,
        })
    }
}
