//! Client manager shared by all request handlers

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use tracing::{debug, info};

use kubedash_types::IncomingRequest;

use crate::cmd_config::{ClientCmdConfig, ConfigSource};
use crate::config::{self, BaseConnectionConfig, EffectiveClientConfig, SecureModePolicy, parse_host};
use crate::error::Result;
use crate::factory::{self, ApiExtensionsClient, ResourceVerber};
use crate::headers::extract_credentials;

/// Size of the generated CSRF signing key in bytes
pub const CSRF_KEY_LEN: usize = 256;

/// Startup parameters for a client manager
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManagerSettings {
    /// Path to a kubeconfig file
    pub kubeconfig: Option<PathBuf>,
    /// API server host; overrides the kubeconfig server when both are set
    pub apiserver_host: Option<String>,
    /// Kubeconfig context, current context when unset
    pub context: Option<String>,
    /// Allow TLS requests without a bearer token
    pub enable_skip_login: bool,
}

/// Builds request-scoped API clients against one base configuration.
///
/// Safe to share across request handlers; only the skip-login flag is
/// mutable after construction.
pub struct ClientManager {
    source: ConfigSource,
    base: BaseConnectionConfig,
    csrf_key: Vec<u8>,
    skip_login: AtomicBool,
    insecure_client: kube::Client,
}

impl ClientManager {
    /// Create a manager from a kubeconfig path and/or an API server host.
    /// With neither, the in-cluster service account config is used.
    pub async fn new(kubeconfig_path: Option<&Path>, apiserver_host: Option<&str>) -> Result<Self> {
        Self::from_settings(&ManagerSettings {
            kubeconfig: kubeconfig_path.map(Path::to_path_buf),
            apiserver_host: apiserver_host.map(str::to_string),
            ..Default::default()
        })
        .await
    }

    pub async fn from_settings(settings: &ManagerSettings) -> Result<Self> {
        let host = settings
            .apiserver_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .map(parse_host)
            .transpose()?;
        let kubeconfig = settings
            .kubeconfig
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty());

        let source = match (kubeconfig, host) {
            (Some(path), host) => ConfigSource::File {
                path: path.clone(),
                context: settings.context.clone(),
                host,
            },
            (None, Some(host)) => ConfigSource::InProcess(BaseConnectionConfig::from_host(&host)),
            (None, None) => ConfigSource::InProcess(BaseConnectionConfig::in_cluster()?),
        };
        let base = source.load().await?;

        let insecure_client = factory::new_client(&config::unauthenticated(&base))?;

        info!(
            host = %base.host(),
            tls = base.tls_enabled(),
            skip_login = settings.enable_skip_login,
            "Client manager initialized"
        );

        Ok(Self {
            source,
            base,
            csrf_key: generate_csrf_key(),
            skip_login: AtomicBool::new(settings.enable_skip_login),
            insecure_client,
        })
    }

    pub fn base_config(&self) -> &BaseConnectionConfig {
        &self.base
    }

    /// Process-wide CSRF signing key, generated once
    pub fn csrf_key(&self) -> &[u8] {
        &self.csrf_key
    }

    pub fn skip_login(&self) -> bool {
        self.skip_login.load(Ordering::SeqCst)
    }

    /// Takes effect on the next resolution, not on configs already built
    pub fn set_skip_login(&self, enabled: bool) {
        debug!(enabled, "Updating skip-login policy");
        self.skip_login.store(enabled, Ordering::SeqCst);
    }

    fn policy(&self, tls: bool) -> SecureModePolicy {
        SecureModePolicy::new(tls, self.skip_login())
    }

    fn resolve(&self, request: &IncomingRequest, tls: bool) -> Result<EffectiveClientConfig> {
        let credentials = extract_credentials(&request.headers);
        config::build(&self.base, &credentials, self.policy(tls))
    }

    /// Resolved configuration for a request
    pub fn config(&self, request: &IncomingRequest) -> Result<EffectiveClientConfig> {
        self.resolve(request, request.tls)
    }

    /// Base configuration with no request credentials
    pub fn insecure_config(&self) -> EffectiveClientConfig {
        config::unauthenticated(&self.base)
    }

    /// Deferred configuration; resolves to the same values as `config`
    pub fn client_cmd_config(&self, request: &IncomingRequest) -> Result<ClientCmdConfig> {
        let credentials = extract_credentials(&request.headers);
        let policy = self.policy(request.tls);
        // Fail here rather than on resolve so callers see Unauthorized early
        config::build(&self.base, &credentials, policy)?;
        Ok(ClientCmdConfig::new(self.source.clone(), credentials, policy))
    }

    pub fn client(&self, request: &IncomingRequest) -> Result<kube::Client> {
        factory::new_client(&self.config(request)?)
    }

    /// Client for a request received on the TLS listener
    pub fn secure_client(&self, request: &IncomingRequest) -> Result<kube::Client> {
        factory::new_client(&self.resolve(request, true)?)
    }

    pub fn api_extensions_client(&self, request: &IncomingRequest) -> Result<ApiExtensionsClient> {
        ApiExtensionsClient::new(&self.config(request)?)
    }

    pub fn secure_api_extensions_client(
        &self,
        request: &IncomingRequest,
    ) -> Result<ApiExtensionsClient> {
        ApiExtensionsClient::new(&self.resolve(request, true)?)
    }

    /// Client with the manager's own identity
    pub fn insecure_client(&self) -> kube::Client {
        self.insecure_client.clone()
    }

    pub fn insecure_api_extensions_client(&self) -> ApiExtensionsClient {
        ApiExtensionsClient::from_client(self.insecure_client.clone())
    }

    /// Dynamic client for arbitrary resources. The request is always
    /// authorized like `client`; an already resolved `config` then replaces
    /// the one derived from the request.
    pub fn verber_client(
        &self,
        request: &IncomingRequest,
        config: Option<&EffectiveClientConfig>,
    ) -> Result<ResourceVerber> {
        let resolved = self.config(request)?;
        ResourceVerber::new(config.unwrap_or(&resolved))
    }
}

fn generate_csrf_key() -> Vec<u8> {
    let mut key = vec![0u8; CSRF_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}
