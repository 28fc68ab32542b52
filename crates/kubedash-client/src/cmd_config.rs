//! Deferred, resolvable client configuration

use std::path::PathBuf;

use http::Uri;

use kubedash_types::CredentialContext;

use crate::config::{self, BaseConnectionConfig, EffectiveClientConfig, SecureModePolicy};
use crate::error::Result;

/// Where the base configuration comes from
#[derive(Clone, Debug)]
pub enum ConfigSource {
    /// Re-read from a kubeconfig file on every resolution
    File {
        path: PathBuf,
        context: Option<String>,
        host: Option<Uri>,
    },
    /// Derived in-process at startup (explicit host or in-cluster)
    InProcess(BaseConnectionConfig),
}

impl ConfigSource {
    pub async fn load(&self) -> Result<BaseConnectionConfig> {
        match self {
            ConfigSource::File {
                path,
                context,
                host,
            } => BaseConnectionConfig::from_kubeconfig(path, context.as_deref(), host.as_ref()).await,
            ConfigSource::InProcess(base) => Ok(base.clone()),
        }
    }
}

/// Request credentials bound to a config source, resolved on demand
#[derive(Clone, Debug)]
pub struct ClientCmdConfig {
    source: ConfigSource,
    credentials: CredentialContext,
    policy: SecureModePolicy,
}

impl ClientCmdConfig {
    pub fn new(
        source: ConfigSource,
        credentials: CredentialContext,
        policy: SecureModePolicy,
    ) -> Self {
        Self {
            source,
            credentials,
            policy,
        }
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Load the base configuration and apply the request credentials
    pub async fn resolve(&self) -> Result<EffectiveClientConfig> {
        let base = self.source.load().await?;
        config::build(&base, &self.credentials, self.policy)
    }
}
