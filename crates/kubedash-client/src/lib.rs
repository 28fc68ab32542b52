//! Request-scoped Kubernetes clients for kubedash
//!
//! Resolves the bearer token and impersonation headers of an inbound request
//! into a client configuration and builds API clients from it.

mod cmd_config;
mod config;
mod error;
mod factory;
mod headers;
mod manager;

pub use cmd_config::{ClientCmdConfig, ConfigSource};
pub use config::{
    BaseConnectionConfig, ConfigSummary, EffectiveClientConfig, SecureModePolicy, TlsSettings,
    build, parse_host, unauthenticated,
};
pub use error::{Error, MSG_LOGIN_UNAUTHORIZED_ERROR, Result};
pub use factory::{ApiExtensionsClient, ResourceVerber, new_client};
pub use headers::{
    extract_bearer_token, extract_credentials, extract_impersonate_extra,
    extract_impersonate_groups, extract_impersonate_user,
};
pub use manager::{CSRF_KEY_LEN, ClientManager, ManagerSettings};

// Re-export types used in our public API
pub use kubedash_types::{CredentialContext, Impersonation, IncomingRequest};
