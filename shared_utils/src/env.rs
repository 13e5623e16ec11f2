use secrecy::SecretString;
use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated the same as unset ones.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

/// Reads an environment variable holding a credential and wraps it so it is
/// never printed by `Debug`.
pub fn get_secret_env_var(name: &str) -> Result<SecretString, MissingEnvVarError> {
    get_env_var(name).map(|v| SecretString::new(v.into()))
}
