use std::{fmt::Debug, path::PathBuf};

use thiserror::Error;

pub type EmptyResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
pub type ResultWithError<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Run-level failures. Any of these aborts the run before (or instead of) fetching.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("destination conflict: '{first}' and '{second}' both write {}", .path.display())]
    DestinationConflict {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("invalid manifest entry '{name}': {reason}")]
    InvalidEntry { name: String, reason: String },
}

pub trait ResultTrait<T, E> {
    fn auto_err(self, desc: &str) -> ResultWithError<T>;
}

impl<T, E> ResultTrait<T, E> for Result<T, E>
where
    E: Debug,
{
    fn auto_err(self, desc: &str) -> ResultWithError<T> {
        match self {
            Ok(t) => Ok(t),
            Err(e) => Err(format!("{desc}: {e:?}").into()),
        }
    }
}

pub trait OptionResultTrait<T> {
    fn auto_err(self, desc: &str) -> ResultWithError<T>;
}

impl<T> OptionResultTrait<T> for Option<T> {
    fn auto_err(self, desc: &str) -> ResultWithError<T> {
        match self {
            Some(t) => Ok(t),
            None => Err(format!("{desc}: None Option").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_err_prefixes_description() {
        let res: Result<(), &str> = Err("boom");
        let err = res.auto_err("Could not do thing").unwrap_err();
        assert_eq!(err.to_string(), "Could not do thing: \"boom\"");
    }

    #[test]
    fn option_auto_err_reports_none() {
        let err = None::<u8>.auto_err("Missing value").unwrap_err();
        assert_eq!(err.to_string(), "Missing value: None Option");
    }

    #[test]
    fn conflict_message_names_both_entries() {
        let err = ProvisionError::DestinationConflict {
            path: PathBuf::from("/m/vae/a.safetensors"),
            first: "x/a".into(),
            second: "y/a".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'x/a'"));
        assert!(msg.contains("'y/a'"));
        assert!(msg.contains("/m/vae/a.safetensors"));
    }
}
