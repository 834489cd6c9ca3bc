use portico_backend::BackendError;
use portico_core::errors::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("not authenticated, run `portico auth login`")]
    NotAuthenticated,

    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("token store error: {0}")]
    Storage(String),

    #[error(transparent)]
    Remote(BackendError),

    #[error("invalid input: {0}")]
    Validation(String),
}

impl AuthError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl From<BackendError> for AuthError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Auth(message) => Self::InvalidCredentials(message),
            BackendError::NotFound { entity, key } => Self::NotFound { entity, key },
            BackendError::Unauthorized(message) => Self::Forbidden(message),
            other => Self::Remote(other),
        }
    }
}

impl From<CoreError> for AuthError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(message) => Self::Validation(message),
            CoreError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_type,
                key: id,
            },
            CoreError::Other(error) => Self::Validation(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_onto_taxonomy() {
        assert!(matches!(
            AuthError::from(BackendError::Auth("Invalid login credentials".into())),
            AuthError::InvalidCredentials(_)
        ));
        assert!(matches!(
            AuthError::from(BackendError::Unauthorized("rls".into())),
            AuthError::Forbidden(_)
        ));
        assert!(matches!(
            AuthError::from(BackendError::Transient("reset".into())),
            AuthError::Remote(BackendError::Transient(_))
        ));
    }

    #[test]
    fn validation_message_is_kept() {
        let err = AuthError::from(CoreError::Validation("shortname is required".into()));
        assert_eq!(err.to_string(), "invalid input: shortname is required");
    }
}
