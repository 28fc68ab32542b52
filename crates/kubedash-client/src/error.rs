//! Error types for client construction

/// Message carried by every login-required failure
pub const MSG_LOGIN_UNAUTHORIZED_ERROR: &str = "MSG_LOGIN_UNAUTHORIZED_ERROR";

/// Result type for client manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for client manager operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TLS request without a bearer token while login is required
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Base configuration could not be derived
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Client construction or an API call failed
    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),
}

impl Error {
    pub fn login_required() -> Self {
        Error::Unauthorized(MSG_LOGIN_UNAUTHORIZED_ERROR.to_string())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// HTTP status the serving layer should answer with
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Error::Unauthorized(_) => http::StatusCode::UNAUTHORIZED,
            Error::Configuration(_) | Error::Kube(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<kube::config::KubeconfigError> for Error {
    fn from(e: kube::config::KubeconfigError) -> Self {
        Error::Configuration(e.to_string())
    }
}

impl From<kube::config::InClusterError> for Error {
    fn from(e: kube::config::InClusterError) -> Self {
        Error::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_required_message() {
        let err = Error::login_required();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "unauthorized: MSG_LOGIN_UNAUTHORIZED_ERROR");
        assert_eq!(err.status_code(), http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_configuration_status() {
        let err = Error::Configuration("bad kubeconfig".into());
        assert!(!err.is_unauthorized());
        assert_eq!(err.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
