//! Environment parsing helpers shared by the config sections.

use std::time::Duration;

use crate::error::ConfigError;

/// Read an env var, treating empty values the same as unset ones.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.trim().is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}

/// Parse a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = optional_env(key)? else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be 'true' or 'false', got '{other}'"),
        }),
    }
}

pub(crate) fn parse_millis_env(key: &str, default_ms: u64) -> Result<Duration, ConfigError> {
    parse_optional_env(key, default_ms).map(Duration::from_millis)
}

pub(crate) fn parse_secs_env(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    parse_optional_env(key, default_secs).map(Duration::from_secs)
}


#[cfg(test)]
mod tests {
    use super::test_support::ENV_LOCK;
    use super::*;

    #[test]
    fn optional_env_returns_none_for_missing_var() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::remove_var("_PARLEY_TEST_MISSING") };
        assert!(optional_env("_PARLEY_TEST_MISSING").unwrap().is_none());
    }

    #[test]
    fn optional_env_returns_none_for_blank_string() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::set_var("_PARLEY_TEST_BLANK", "   ") };
        assert!(optional_env("_PARLEY_TEST_BLANK").unwrap().is_none());
        unsafe { std::env::remove_var("_PARLEY_TEST_BLANK") };
    }

    #[test]
    fn parse_optional_env_rejects_garbage() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::set_var("_PARLEY_TEST_NUM", "lots") };
        let err = parse_optional_env::<u32>("_PARLEY_TEST_NUM", 3).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "_PARLEY_TEST_NUM"
        ));
        unsafe { std::env::remove_var("_PARLEY_TEST_NUM") };
    }

    #[test]
    fn parse_bool_env_accepts_common_spellings() {
        let _lock = ENV_LOCK.lock();
        for (raw, expected) in [("TRUE", true), ("1", true), ("off", false), ("No", false)] {
            unsafe { std::env::set_var("_PARLEY_TEST_BOOL", raw) };
            assert_eq!(parse_bool_env("_PARLEY_TEST_BOOL", !expected).unwrap(), expected);
        }
        unsafe { std::env::set_var("_PARLEY_TEST_BOOL", "maybe") };
        assert!(parse_bool_env("_PARLEY_TEST_BOOL", false).is_err());
        unsafe { std::env::remove_var("_PARLEY_TEST_BOOL") };
    }
}
