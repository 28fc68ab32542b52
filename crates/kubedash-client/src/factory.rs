//! Constructors for API clients bound to a resolved configuration

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::Api;
use kube::api::{ApiResource, DeleteParams, DynamicObject, ListParams, PostParams};
use tracing::debug;

use crate::config::EffectiveClientConfig;
use crate::error::Result;

/// Client for the core and named API groups
pub fn new_client(config: &EffectiveClientConfig) -> Result<kube::Client> {
    let client = kube::Client::try_from(config.kube_config().clone())?;
    Ok(client)
}

/// Client bound to the `apiextensions.k8s.io` group
#[derive(Clone)]
pub struct ApiExtensionsClient {
    client: kube::Client,
}

impl ApiExtensionsClient {
    pub fn new(config: &EffectiveClientConfig) -> Result<Self> {
        Ok(Self::from_client(new_client(config)?))
    }

    pub fn from_client(client: kube::Client) -> Self {
        Self { client }
    }

    pub fn crds(&self) -> Api<CustomResourceDefinition> {
        Api::all(self.client.clone())
    }

    /// Names of all installed custom resource definitions
    pub async fn list_crd_names(&self) -> Result<Vec<String>> {
        let list = self.crds().list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|crd| crd.metadata.name)
            .collect())
    }

    pub fn client(&self) -> &kube::Client {
        &self.client
    }
}

/// Create, update and delete arbitrary resource kinds
#[derive(Clone)]
pub struct ResourceVerber {
    client: kube::Client,
}

impl ResourceVerber {
    pub fn new(config: &EffectiveClientConfig) -> Result<Self> {
        Ok(Self::from_client(new_client(config)?))
    }

    pub fn from_client(client: kube::Client) -> Self {
        Self { client }
    }

    /// Dynamic API for a resource, cluster-scoped when `namespace` is `None`
    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }

    pub async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        Ok(self.api(resource, namespace).get(name).await?)
    }

    pub async fn create(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        debug!(kind = %resource.kind, namespace = ?namespace, "Creating resource");
        Ok(self
            .api(resource, namespace)
            .create(&PostParams::default(), object)
            .await?)
    }

    /// Replace an existing object
    pub async fn put(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        debug!(kind = %resource.kind, namespace = ?namespace, name, "Replacing resource");
        Ok(self
            .api(resource, namespace)
            .replace(name, &PostParams::default(), object)
            .await?)
    }

    /// Delete with foreground propagation so dependents go first
    pub async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        debug!(kind = %resource.kind, namespace = ?namespace, name, "Deleting resource");
        self.api(resource, namespace)
            .delete(name, &DeleteParams::foreground())
            .await?;
        Ok(())
    }

    pub fn client(&self) -> &kube::Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseConnectionConfig, parse_host, unauthenticated};
    use kube::api::GroupVersionKind;

    fn config() -> EffectiveClientConfig {
        unauthenticated(&BaseConnectionConfig::from_host(
            &parse_host("http://localhost:8080").unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_verber_paths() {
        let verber = ResourceVerber::new(&config()).unwrap();

        let cm = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"));
        assert_eq!(
            verber.api(&cm, Some("default")).resource_url(),
            "/api/v1/namespaces/default/configmaps"
        );

        let cr = ApiResource::from_gvk(&GroupVersionKind::gvk("rbac.authorization.k8s.io", "v1", "ClusterRole"));
        assert_eq!(
            verber.api(&cr, None).resource_url(),
            "/apis/rbac.authorization.k8s.io/v1/clusterroles"
        );
    }

    #[tokio::test]
    async fn test_list_crd_names_surfaces_connection_errors() {
        let config = unauthenticated(&BaseConnectionConfig::from_host(
            &parse_host("http://127.0.0.1:1").unwrap(),
        ));
        let client = ApiExtensionsClient::new(&config).unwrap();

        let err = client.list_crd_names().await.unwrap_err();
        assert!(matches!(err, crate::Error::Kube(_)));
    }

    #[tokio::test]
    async fn test_extensions_client_group() {
        let client = ApiExtensionsClient::new(&config()).unwrap();
        assert_eq!(
            client.crds().resource_url(),
            "/apis/apiextensions.k8s.io/v1/customresourcedefinitions"
        );
    }
}
