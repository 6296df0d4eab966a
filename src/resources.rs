use k8s_openapi::api::core::v1::{Container, ObjectReference, PodTemplateSpec};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A versioned template for the replication controllers that make up a deployment.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "apps.openshift.io",
    version = "v1",
    kind = "DeploymentConfig",
    plural = "deploymentconfigs",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    /// Incremented by one each time a trigger moves a container to a new image.
    #[serde(default)]
    pub latest_version: u64,
    #[serde(default)]
    pub triggers: Vec<DeploymentTriggerPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub template: PodTemplateSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "imageChangeParams")]
pub enum DeploymentTriggerPolicy {
    ImageChange(ImageChangeParams),
    ConfigChange,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "RawImageChangeParams")]
pub struct ImageChangeParams {
    pub container_names: Vec<String>,
    #[serde(flatten)]
    pub source: ImageSource,
    pub tag: String,
}

/// Wire form of [`ImageChangeParams`], with both addressing fields optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImageChangeParams {
    #[serde(default)]
    container_names: Vec<String>,
    #[serde(default)]
    repository_name: Option<String>,
    #[serde(default)]
    from: Option<ObjectReference>,
    tag: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageSourceError {
    #[error("image change trigger for tag {0} sets both repositoryName and from")]
    Ambiguous(String),
    #[error("image change trigger for tag {0} sets neither repositoryName nor from")]
    Missing(String),
}

impl TryFrom<RawImageChangeParams> for ImageChangeParams {
    type Error = ImageSourceError;

    fn try_from(raw: RawImageChangeParams) -> Result<Self, Self::Error> {
        let repository_name = raw.repository_name.filter(|name| !name.is_empty());
        let source = match (repository_name, raw.from) {
            (Some(name), None) => ImageSource::RepositoryName(name),
            (None, Some(reference)) => ImageSource::From(reference),
            (Some(_), Some(_)) => return Err(ImageSourceError::Ambiguous(raw.tag)),
            (None, None) => return Err(ImageSourceError::Missing(raw.tag)),
        };
        Ok(Self {
            container_names: raw.container_names,
            source,
            tag: raw.tag,
        })
    }
}

/// Where an image change trigger looks for its repository.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ImageSource {
    /// Registry qualified pull spec, matched against the observed pull spec of every repository.
    RepositoryName(String),
    /// Reference to a single `ImageRepository` object.
    From(ObjectReference),
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::RepositoryName(name) => write!(f, "repository {}", name),
            ImageSource::From(reference) => write!(
                f,
                "image repository {}/{}",
                reference.namespace.as_deref().unwrap_or_default(),
                reference.name.as_deref().unwrap_or_default()
            ),
        }
    }
}

impl ImageChangeParams {
    pub fn from_repository_name<S: Into<String>>(
        container_names: impl IntoIterator<Item = S>,
        repository_name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            container_names: container_names.into_iter().map(Into::into).collect(),
            source: ImageSource::RepositoryName(repository_name.into()),
            tag: tag.into(),
        }
    }

    pub fn from_reference<S: Into<String>>(
        container_names: impl IntoIterator<Item = S>,
        reference: ObjectReference,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            container_names: container_names.into_iter().map(Into::into).collect(),
            source: ImageSource::From(reference),
            tag: tag.into(),
        }
    }
}

impl DeploymentConfig {
    pub fn image_change_triggers(&self) -> impl Iterator<Item = &ImageChangeParams> {
        self.spec.triggers.iter().filter_map(|trigger| match trigger {
            DeploymentTriggerPolicy::ImageChange(params) => Some(params),
            DeploymentTriggerPolicy::ConfigChange => None,
        })
    }

    pub fn containers(&self) -> &[Container] {
        self.spec
            .template
            .spec
            .as_ref()
            .map(|pod| pod.containers.as_slice())
            .unwrap_or_default()
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut Container> {
        self.spec
            .template
            .spec
            .as_mut()?
            .containers
            .iter_mut()
            .find(|container| container.name == name)
    }
}

/// A set of tagged images that share a single registry pull spec.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "image.openshift.io",
    version = "v1",
    kind = "ImageRepository",
    plural = "imagerepositories",
    namespaced,
    schema = "disabled",
    status = "ImageRepositoryStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ImageRepositorySpec {
    /// Pull spec requested by the user, before the registry has seen the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image_repository: Option<String>,
    /// Tag name to image reference.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRepositoryStatus {
    #[serde(default)]
    pub docker_image_repository: String,
}

impl ImageRepository {
    /// The registry observed pull spec, `None` until the registry has seen the repository.
    pub fn pull_spec(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|status| status.docker_image_repository.as_str())
            .filter(|pull_spec| !pull_spec.is_empty())
    }

    /// `<pull spec>:<reference>` for the given tag.
    pub fn image_for_tag(&self, tag: &str) -> Option<String> {
        let pull_spec = self.pull_spec()?;
        let reference = self.spec.tags.get(tag)?;
        Some(format!("{}:{}", pull_spec, reference))
    }

    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }
}
