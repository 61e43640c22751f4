use std::{env, fmt::Display, str::FromStr};

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads and parses the environment variable `key`.
///
/// Returns `Ok(None)` if the variable is not set, and `Err` with a printable reason if it is set but does not parse.
pub fn parse_env_var<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(s) => s.trim().parse::<T>().map(Some).map_err(|e| format!("{key}={s} is invalid. {e}")),
        Err(_) => Ok(None),
    }
}
