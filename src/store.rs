use crate::error::{Error, Result};
use crate::resources::{DeploymentConfig, ImageRepository};
use crate::state::RequestContext;
use async_trait::async_trait;
use kube::api::ListParams;
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{debug, info};

/// Read access to deployment configurations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn fetch_config(&self, ctx: &RequestContext, id: &str) -> Result<DeploymentConfig>;
}

/// Read access to image repositories in the context namespace.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn fetch_repository(&self, ctx: &RequestContext, name: &str) -> Result<ImageRepository>;
    async fn list_repositories(&self, ctx: &RequestContext) -> Result<Vec<ImageRepository>>;
}

#[async_trait]
impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    async fn fetch_config(&self, ctx: &RequestContext, id: &str) -> Result<DeploymentConfig> {
        (**self).fetch_config(ctx, id).await
    }
}

#[async_trait]
impl<T: RepositoryStore + ?Sized> RepositoryStore for Arc<T> {
    async fn fetch_repository(&self, ctx: &RequestContext, name: &str) -> Result<ImageRepository> {
        (**self).fetch_repository(ctx, name).await
    }

    async fn list_repositories(&self, ctx: &RequestContext) -> Result<Vec<ImageRepository>> {
        (**self).list_repositories(ctx).await
    }
}

pub async fn create_client() -> anyhow::Result<Client> {
    info!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    let api_server_info = client.apiserver_version().await?;
    info!(
        "Connected to namespace {}, Kubernetes API server with version {}.{}",
        client.default_namespace(),
        api_server_info.major,
        api_server_info.minor
    );
    Ok(client)
}

/// Both stores, backed by the `DeploymentConfig` and `ImageRepository` custom resources.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigStore for KubeStore {
    async fn fetch_config(&self, ctx: &RequestContext, id: &str) -> Result<DeploymentConfig> {
        let api: Api<DeploymentConfig> = Api::namespaced(self.client.clone(), ctx.namespace());
        debug!("Fetching deployment config {}/{}", ctx.namespace(), id);
        ctx.run(api.get_opt(id))
            .await?
            .ok_or_else(|| Error::not_found("deploymentConfig", id))
    }
}

#[async_trait]
impl RepositoryStore for KubeStore {
    async fn fetch_repository(&self, ctx: &RequestContext, name: &str) -> Result<ImageRepository> {
        let api: Api<ImageRepository> = Api::namespaced(self.client.clone(), ctx.namespace());
        debug!("Fetching image repository {}/{}", ctx.namespace(), name);
        ctx.run(api.get_opt(name))
            .await?
            .ok_or_else(|| Error::not_found("imageRepository", name))
    }

    async fn list_repositories(&self, ctx: &RequestContext) -> Result<Vec<ImageRepository>> {
        let api: Api<ImageRepository> = Api::namespaced(self.client.clone(), ctx.namespace());
        let list = ctx.run(api.list(&ListParams::default())).await?;
        debug!(
            "Listed {} image repositories in namespace {}",
            list.items.len(),
            ctx.namespace()
        );
        Ok(list.items)
    }
}
