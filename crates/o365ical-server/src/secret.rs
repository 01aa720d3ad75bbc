//! Secret references in configuration values.
//!
//! - `pass::path/in/store`: first line of `pass show path/in/store`
//! - `env::VAR_NAME`: the value of `$VAR_NAME`
//! - anything else: used verbatim

use std::process::Command;

use thiserror::Error;

/// Failure to resolve a secret reference.
#[derive(Debug, Error)]
pub enum SecretError {
    /// `pass` could not be run or exited with an error.
    #[error("`pass show {path}` failed: {message}")]
    Pass { path: String, message: String },

    /// `pass` succeeded but printed nothing.
    #[error("`pass show {path}` produced no output")]
    PassEmpty { path: String },

    /// The referenced environment variable is unset.
    #[error("environment variable `{var}` is not set")]
    EnvMissing { var: String },
}

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    if let Some(path) = value.strip_prefix("pass::") {
        from_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var).map_err(|_| SecretError::EnvMissing {
            var: var.to_string(),
        })
    } else {
        Ok(value.to_string())
    }
}

fn from_pass(path: &str) -> Result<String, SecretError> {
    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| SecretError::Pass {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SecretError::Pass {
            path: path.to_string(),
            message: format!(
                "exit {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| SecretError::PassEmpty {
            path: path.to_string(),
        })
}
