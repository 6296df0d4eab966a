use crate::error::{Error, Result};
use crate::resources::{DeploymentConfig, ImageChangeParams, ImageRepository, ImageSource};
use crate::state::RequestContext;
use crate::store::{ConfigStore, RepositoryStore};
use kube::ResourceExt;
use tracing::{debug, info};

/// Produces the next version of a deployment config from the current state of
/// the image repositories its image change triggers point at.
pub struct Generator<C, R> {
    configs: C,
    repositories: R,
}

impl<C, R> Generator<C, R>
where
    C: ConfigStore,
    R: RepositoryStore,
{
    pub fn new(configs: C, repositories: R) -> Self {
        Self {
            configs,
            repositories,
        }
    }

    /// Fetches the deployment config `id` and returns a copy with every triggered
    /// container moved to the image its trigger currently resolves to.
    ///
    /// `latestVersion` is bumped by exactly one when any container image changed.
    /// Triggers whose repository or tag has not been observed yet are skipped.
    pub async fn generate(&self, ctx: &RequestContext, id: &str) -> Result<DeploymentConfig> {
        info!("Generating deployment config {}/{}", ctx.namespace(), id);
        let current = self.configs.fetch_config(ctx, id).await?;
        let mut generated = current.clone();
        let mut changed = false;

        for params in current.image_change_triggers() {
            let Some(image) = self.resolve_image(ctx, params).await? else {
                continue;
            };

            for container_name in &params.container_names {
                let Some(container) = generated.container_mut(container_name) else {
                    debug!(
                        "Deployment config {} has no container {}, ignoring",
                        id, container_name
                    );
                    continue;
                };

                if container.image.as_deref() != Some(image.as_str()) {
                    info!(
                        "Container {} of deployment config {} moves from image {} to {}",
                        container_name,
                        id,
                        container.image.as_deref().unwrap_or("<none>"),
                        image
                    );
                    container.image = Some(image.clone());
                    changed = true;
                }
            }
        }

        if changed {
            generated.spec.latest_version =
                current.spec.latest_version.checked_add(1).ok_or_else(|| {
                    Error::InvalidSpec(format!(
                        "deployment config {} is already at the highest version {}",
                        current.name_any(),
                        current.spec.latest_version
                    ))
                })?;
            info!(
                "Deployment config {} advanced to version {}",
                generated.name_any(),
                generated.spec.latest_version
            );
        } else {
            info!(
                "Deployment config {} is up to date at version {}",
                generated.name_any(),
                generated.spec.latest_version
            );
        }

        Ok(generated)
    }

    /// The image a trigger points at, `None` when the trigger cannot be satisfied yet.
    async fn resolve_image(
        &self,
        ctx: &RequestContext,
        params: &ImageChangeParams,
    ) -> Result<Option<String>> {
        debug!("Resolving tag {} from {}", params.tag, params.source);
        let Some(repository) = self.resolve_repository(ctx, &params.source).await? else {
            debug!("No observed repository for {}, skipping", params.source);
            return Ok(None);
        };

        let image = repository.image_for_tag(&params.tag);
        if image.is_none() {
            debug!(
                "Image repository {} has no tag {}, skipping",
                repository.qualified_name(),
                params.tag
            );
        }
        Ok(image)
    }

    async fn resolve_repository(
        &self,
        ctx: &RequestContext,
        source: &ImageSource,
    ) -> Result<Option<ImageRepository>> {
        match source {
            ImageSource::RepositoryName(pull_spec) => {
                let repositories = self.repositories.list_repositories(ctx).await?;
                Ok(repositories
                    .into_iter()
                    .find(|repository| repository.pull_spec() == Some(pull_spec.as_str())))
            }
            ImageSource::From(reference) => {
                let name = reference
                    .name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        Error::InvalidSpec(
                            "image change trigger references an image repository without a name"
                                .to_string(),
                        )
                    })?;

                let repository = match reference.namespace.as_deref() {
                    Some(namespace) if !namespace.is_empty() && namespace != ctx.namespace() => {
                        self.repositories
                            .fetch_repository(&ctx.with_namespace(namespace), name)
                            .await?
                    }
                    _ => self.repositories.fetch_repository(ctx, name).await?,
                };

                if repository.pull_spec().is_none() {
                    return Err(Error::InvalidSpec(format!(
                        "image repository {} does not have a Docker image repository reference",
                        repository.qualified_name()
                    )));
                }
                Ok(Some(repository))
            }
        }
    }
}
