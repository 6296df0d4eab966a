use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the stores and by the generator.
///
/// `InvalidSpec` is the only kind the generator raises itself, every other
/// variant is passed through from a store unchanged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{0}")]
    InvalidSpec(String),

    #[error("request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_the_object() {
        let err = Error::not_found("deploymentConfig", "deploy1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "deploymentConfig \"deploy1\" not found");
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: Error = anyhow::anyhow!("connection refused").into();
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "connection refused");
    }
}
