use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use http::{HeaderMap, HeaderName, HeaderValue};
use k8s_openapi::api::core::v1::Namespace;
use kube::Api;
use kube::api::ListParams;

use kubedash_client::{ClientManager, IncomingRequest, ManagerSettings};

/// Kubedash - resolve dashboard request credentials into a cluster client
#[derive(Parser, Debug)]
#[command(name = "kubedash")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a kubeconfig file
    #[arg(long, value_name = "PATH")]
    kubeconfig: Option<PathBuf>,

    /// API server host, overrides the kubeconfig server
    #[arg(long, value_name = "HOST")]
    apiserver_host: Option<String>,

    /// Kubeconfig context (defaults to the current context)
    #[arg(long)]
    context: Option<String>,

    /// Allow TLS requests without a bearer token
    #[arg(long)]
    enable_skip_login: bool,

    /// TOML settings file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Request header as 'Name: value', repeatable
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Treat the request as received over TLS
    #[arg(long)]
    tls: bool,

    /// List namespaces with the resolved client
    #[arg(long)]
    list_namespaces: bool,

    /// List custom resource definitions with the resolved extensions client
    #[arg(long)]
    list_crds: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let settings = load_settings(&args)?;
    let manager = ClientManager::from_settings(&settings)
        .await
        .context("Failed to initialize client manager")?;

    let request = IncomingRequest::new(parse_headers(&args.headers)?, args.tls);
    let config = manager
        .config(&request)
        .context("Failed to resolve client config")?;

    println!("{}", serde_json::to_string_pretty(&config.summary())?);

    if args.list_namespaces {
        let client = kubedash_client::new_client(&config)?;
        let namespaces: Api<Namespace> = Api::all(client);
        let list = namespaces
            .list(&ListParams::default())
            .await
            .context("Failed to list namespaces")?;

        for ns in list.items {
            println!("{}", ns.metadata.name.unwrap_or_default());
        }
    }

    if args.list_crds {
        let crds = manager
            .api_extensions_client(&request)?
            .list_crd_names()
            .await
            .context("Failed to list custom resource definitions")?;

        for name in crds {
            println!("{}", name);
        }
    }

    Ok(())
}

/// Merge the optional TOML settings file with command-line flags
fn load_settings(args: &Args) -> Result<ManagerSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .context(format!("Failed to read settings file: {}", path.display()))?;
            toml::from_str(&content)
                .context(format!("Failed to parse settings file: {}", path.display()))?
        }
        None => ManagerSettings::default(),
    };

    if args.kubeconfig.is_some() {
        settings.kubeconfig = args.kubeconfig.clone();
    }
    if args.apiserver_host.is_some() {
        settings.apiserver_host = args.apiserver_host.clone();
    }
    if args.context.is_some() {
        settings.context = args.context.clone();
    }
    settings.enable_skip_login |= args.enable_skip_login;

    Ok(settings)
}

fn parse_headers(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let (name, value) = header
            .split_once(':')
            .context(format!("Header '{}' is not in 'Name: value' form", header))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .context(format!("Invalid header name in '{}'", header))?;
        let value = HeaderValue::from_str(value.trim_start())
            .context(format!("Invalid header value in '{}'", header))?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers_keeps_repeats() {
        let headers = parse_headers(&[
            "Authorization: Bearer abc".to_string(),
            "Impersonate-Group: one".to_string(),
            "Impersonate-Group: two".to_string(),
        ])
        .unwrap();

        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        let groups: Vec<_> = headers.get_all("impersonate-group").iter().collect();
        assert_eq!(groups, vec!["one", "two"]);
    }

    #[test]
    fn test_list_flags() {
        let args = Args::parse_from(["kubedash", "--list-crds", "--tls"]);
        assert!(args.list_crds);
        assert!(args.tls);
        assert!(!args.list_namespaces);
    }

    #[test]
    fn test_parse_headers_rejects_garbage() {
        assert!(parse_headers(&["no-colon".to_string()]).is_err());
    }

    #[test]
    fn test_flags_override_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"apiserver_host = \"http://from-file:8080\"\ncontext = \"file-ctx\"\n",
        )
        .unwrap();

        let args = Args::parse_from([
            "kubedash",
            "--config",
            file.path().to_str().unwrap(),
            "--apiserver-host",
            "http://from-flag:8080",
            "--enable-skip-login",
        ]);
        let settings = load_settings(&args).unwrap();

        assert_eq!(settings.apiserver_host.as_deref(), Some("http://from-flag:8080"));
        assert_eq!(settings.context.as_deref(), Some("file-ctx"));
        assert!(settings.enable_skip_login);
    }
}
