//! Base and per-request client configuration

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use http::{HeaderName, HeaderValue, Uri};
use kube::config::{AuthInfo, KubeConfigOptions, Kubeconfig};
use serde::Serialize;
use tracing::debug;

use kubedash_types::{CredentialContext, Impersonation};

use crate::error::{Error, Result};
use crate::headers::IMPERSONATE_EXTRA_PREFIX;

// ============================================================================
// Base configuration
// ============================================================================

/// Process-wide target description established at startup
#[derive(Clone)]
pub struct BaseConnectionConfig {
    host: String,
    tls_enabled: bool,
    kubeconfig_path: Option<PathBuf>,
    config: kube::Config,
}

impl BaseConnectionConfig {
    fn from_parts(config: kube::Config, kubeconfig_path: Option<PathBuf>) -> Self {
        Self {
            host: config.cluster_url.to_string(),
            tls_enabled: config.cluster_url.scheme_str() == Some("https"),
            kubeconfig_path,
            config,
        }
    }

    /// Load from a kubeconfig file. An explicit host replaces the server URL
    /// of the selected context.
    pub async fn from_kubeconfig(
        path: &Path,
        context: Option<&str>,
        host: Option<&Uri>,
    ) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(path)?;
        let mut config = kube::Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: context.map(str::to_string),
                ..Default::default()
            },
        )
        .await?;

        if let Some(host) = host {
            config.cluster_url = host.clone();
        }

        debug!(path = %path.display(), host = %config.cluster_url, "Loaded base config from kubeconfig");
        Ok(Self::from_parts(config, Some(path.to_path_buf())))
    }

    /// Unauthenticated config pointing at an explicit API server host
    pub fn from_host(host: &Uri) -> Self {
        Self::from_parts(kube::Config::new(host.clone()), None)
    }

    /// Config from the pod's service account environment
    pub fn in_cluster() -> Result<Self> {
        let config = kube::Config::incluster()?;
        debug!(host = %config.cluster_url, "Loaded in-cluster base config");
        Ok(Self::from_parts(config, None))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls_enabled
    }

    pub fn kubeconfig_path(&self) -> Option<&Path> {
        self.kubeconfig_path.as_deref()
    }

    pub fn kube_config(&self) -> &kube::Config {
        &self.config
    }
}

impl fmt::Debug for BaseConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseConnectionConfig")
            .field("host", &self.host)
            .field("tls_enabled", &self.tls_enabled)
            .field("kubeconfig_path", &self.kubeconfig_path)
            .finish()
    }
}

/// Parse an API server host. Hosts without a scheme are plain HTTP.
pub fn parse_host(host: &str) -> Result<Uri> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::Configuration("apiserver host is empty".into()));
    }

    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    let uri: Uri = with_scheme
        .parse()
        .map_err(|e| Error::Configuration(format!("invalid apiserver host '{}': {}", host, e)))?;

    if uri.authority().is_none() {
        return Err(Error::Configuration(format!(
            "apiserver host '{}' has no authority",
            host
        )));
    }

    Ok(uri)
}

// ============================================================================
// Secure mode
// ============================================================================

/// Whether a request must carry a bearer token
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SecureModePolicy {
    /// Request arrived over TLS
    pub tls: bool,
    /// Operator allowed anonymous access
    pub skip_login: bool,
}

impl SecureModePolicy {
    pub fn new(tls: bool, skip_login: bool) -> Self {
        Self { tls, skip_login }
    }

    pub fn requires_token(&self) -> bool {
        self.tls && !self.skip_login
    }
}

// ============================================================================
// Effective configuration
// ============================================================================

/// TLS parameters of the resolved configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TlsSettings {
    pub enabled: bool,
    pub accept_invalid_certs: bool,
    pub custom_root_cert: bool,
    pub server_name: Option<String>,
}

impl TlsSettings {
    fn from_config(config: &kube::Config) -> Self {
        Self {
            enabled: config.cluster_url.scheme_str() == Some("https"),
            accept_invalid_certs: config.accept_invalid_certs,
            custom_root_cert: config.root_cert.is_some(),
            server_name: config.tls_server_name.clone(),
        }
    }
}

/// Base configuration merged with one request's credentials
#[derive(Clone)]
pub struct EffectiveClientConfig {
    host: String,
    bearer_token: Option<String>,
    impersonation: Option<Impersonation>,
    tls: TlsSettings,
    config: kube::Config,
}

impl EffectiveClientConfig {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// `None` when no impersonation was forwarded
    pub fn impersonation(&self) -> Option<&Impersonation> {
        self.impersonation.as_ref()
    }

    /// Impersonated user, empty when not impersonating
    pub fn impersonate_user(&self) -> &str {
        self.impersonation
            .as_ref()
            .map(|i| i.user.as_str())
            .unwrap_or_default()
    }

    pub fn impersonate_groups(&self) -> &[String] {
        self.impersonation
            .as_ref()
            .map(|i| i.groups.as_slice())
            .unwrap_or_default()
    }

    pub fn impersonate_extra(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.impersonation.as_ref().map(|i| &i.extra)
    }

    pub fn tls(&self) -> &TlsSettings {
        &self.tls
    }

    /// The kube configuration clients are built from
    pub fn kube_config(&self) -> &kube::Config {
        &self.config
    }

    pub fn into_kube_config(self) -> kube::Config {
        self.config
    }

    /// Serializable view with the token redacted
    pub fn summary(&self) -> ConfigSummary<'_> {
        ConfigSummary {
            host: &self.host,
            bearer_token: self.bearer_token.as_ref().map(|_| "<redacted>"),
            impersonation: self.impersonation.as_ref(),
            tls: &self.tls,
        }
    }
}

impl fmt::Debug for EffectiveClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary();
        f.debug_struct("EffectiveClientConfig")
            .field("host", &summary.host)
            .field("bearer_token", &summary.bearer_token)
            .field("impersonation", &summary.impersonation)
            .field("tls", &summary.tls)
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigSummary<'a> {
    pub host: &'a str,
    pub bearer_token: Option<&'static str>,
    pub impersonation: Option<&'a Impersonation>,
    pub tls: &'a TlsSettings,
}

/// Merge a request's credentials into the base configuration.
///
/// A TLS request without a bearer token fails unless skip-login is on.
/// Impersonation is forwarded only together with a bearer token. The host
/// always comes from `base`.
pub fn build(
    base: &BaseConnectionConfig,
    credentials: &CredentialContext,
    policy: SecureModePolicy,
) -> Result<EffectiveClientConfig> {
    if policy.requires_token() && !credentials.has_token() {
        debug!(host = %base.host(), "Rejecting TLS request without bearer token");
        return Err(Error::login_required());
    }

    let bearer_token = credentials.bearer_token.clone();
    let impersonation = forwarded_impersonation(credentials);

    if credentials.requests_impersonation() && impersonation.is_none() {
        debug!("Dropping impersonation headers without bearer token");
    }

    let config = merge_kube_config(base.kube_config(), bearer_token.as_deref(), impersonation.as_ref())?;

    debug!(
        host = %base.host(),
        has_token = bearer_token.is_some(),
        impersonating = impersonation.is_some(),
        skip_login = policy.skip_login,
        "Resolved client config"
    );

    Ok(EffectiveClientConfig {
        host: base.host().to_string(),
        bearer_token,
        impersonation,
        tls: TlsSettings::from_config(&config),
        config,
    })
}

/// Base configuration with no request credentials applied
pub fn unauthenticated(base: &BaseConnectionConfig) -> EffectiveClientConfig {
    EffectiveClientConfig {
        host: base.host().to_string(),
        bearer_token: None,
        impersonation: None,
        tls: TlsSettings::from_config(base.kube_config()),
        config: base.kube_config().clone(),
    }
}

fn forwarded_impersonation(credentials: &CredentialContext) -> Option<Impersonation> {
    if !credentials.has_token() || !credentials.requests_impersonation() {
        return None;
    }

    Some(Impersonation {
        user: credentials.impersonate_user.clone().unwrap_or_default(),
        groups: credentials.impersonate_groups.clone(),
        extra: credentials.impersonate_extra.clone(),
    })
}

fn merge_kube_config(
    base: &kube::Config,
    bearer_token: Option<&str>,
    impersonation: Option<&Impersonation>,
) -> Result<kube::Config> {
    let mut config = base.clone();

    // The request token replaces whatever auth the base config carried
    if let Some(token) = bearer_token {
        config.auth_info = AuthInfo {
            token: Some(token.to_string().into()),
            ..Default::default()
        };
    }

    if let Some(impersonation) = impersonation {
        if !impersonation.user.is_empty() {
            config.auth_info.impersonate = Some(impersonation.user.clone());
        }
        if !impersonation.groups.is_empty() {
            config.auth_info.impersonate_groups = Some(impersonation.groups.clone());
        }

        for (key, values) in &impersonation.extra {
            let name = HeaderName::from_bytes(format!("{}{}", IMPERSONATE_EXTRA_PREFIX, key).as_bytes())
                .map_err(|e| Error::Configuration(format!("invalid impersonation extra key '{}': {}", key, e)))?;
            for value in values {
                let value = HeaderValue::from_str(value).map_err(|e| {
                    Error::Configuration(format!("invalid impersonation extra value for '{}': {}", key, e))
                })?;
                config.headers.push((name.clone(), value));
            }
        }
    }

    Ok(config)
}
