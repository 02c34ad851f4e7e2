use lazy_static::lazy_static;
use regex::Regex;
use std::env;

lazy_static! {
    static ref VAR_RE: Regex = Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z0-9_]+)").unwrap();
}

pub struct VariablesUtils {}

impl VariablesUtils {
    /// Expands ${VAR} or $VAR patterns using the current environment.
    pub fn expand_env_vars(input: &str) -> String {
        Self::expand_with(input, |key| env::var(key).ok())
    }

    /// Expands ${VAR} or $VAR patterns using `lookup`. Unknown keys expand to "".
    pub fn expand_with<F>(input: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        VAR_RE
            .replace_all(input, |caps: &regex::Captures| {
                // Capture either ${VAR} or $VAR
                let key = caps.get(1).or(caps.get(2)).map_or("", |m| m.as_str());
                lookup(key).unwrap_or_default()
            })
            .to_string()
    }

    /// Reads a variable, treating empty values as unset.
    pub fn non_empty_var(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}
