use crate::resources::DeploymentConfig;
use anyhow::Context;
use k8s_openapi::api::core::v1::{ReplicationController, ReplicationControllerSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub static DEPLOYMENT_CONFIG_ANNOTATION: &str = "openshift.io/deployment-config.name";
pub static DEPLOYMENT_STATUS_ANNOTATION: &str = "openshift.io/deployment.phase";
pub static DEPLOYMENT_VERSION_ANNOTATION: &str = "openshift.io/deployment-config.latest-version";
pub static DEPLOYMENT_ENCODED_CONFIG_ANNOTATION: &str = "openshift.io/encoded-deployment-config";
static DEPLOYMENT_STATUS_NEW: &str = "New";

/// Serializes a deployment config so it can be stored in an annotation and restored on rollback.
pub fn encode_deployment_config(config: &DeploymentConfig) -> anyhow::Result<String> {
    serde_json::to_string(config)
        .with_context(|| format!("Failed to encode deployment config {}", config.name_any()))
}

pub fn decode_deployment_config(encoded: &str) -> anyhow::Result<DeploymentConfig> {
    serde_json::from_str(encoded).context("Failed to decode deployment config annotation")
}

/// `<config name>-<latest version>`
pub fn latest_deployment_name_for_config(config: &DeploymentConfig) -> String {
    format!("{}-{}", config.name_any(), config.spec.latest_version)
}

/// A config that was never deployed (`latestVersion` 0) is deployed as version 1,
/// even when no trigger moved an image. Every other config is returned unchanged.
pub fn apply_initial_deployment_policy(mut config: DeploymentConfig) -> DeploymentConfig {
    if config.spec.latest_version == 0 {
        info!(
            "Deployment config {} has never been deployed, deploying it as version 1",
            config.name_any()
        );
        config.spec.latest_version = 1;
    }
    config
}

/// Builds, without persisting it, the replication controller that deploys the
/// latest version of `config`. The config itself travels along in an annotation.
pub fn make_deployment(config: &DeploymentConfig) -> anyhow::Result<ReplicationController> {
    let encoded = encode_deployment_config(config)?;
    let name = latest_deployment_name_for_config(config);

    let annotations = BTreeMap::from([
        (DEPLOYMENT_CONFIG_ANNOTATION.to_string(), config.name_any()),
        (
            DEPLOYMENT_STATUS_ANNOTATION.to_string(),
            DEPLOYMENT_STATUS_NEW.to_string(),
        ),
        (
            DEPLOYMENT_VERSION_ANNOTATION.to_string(),
            config.spec.latest_version.to_string(),
        ),
        (DEPLOYMENT_ENCODED_CONFIG_ANNOTATION.to_string(), encoded),
    ]);

    let labels = config.labels();
    let selector = &config.spec.selector;

    debug!("Built deployment {} for deployment config {}", name, config.name_any());

    Ok(ReplicationController {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: config.namespace(),
            labels: (!labels.is_empty()).then(|| labels.clone()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(ReplicationControllerSpec {
            replicas: config.spec.replicas,
            selector: (!selector.is_empty()).then(|| selector.clone()),
            template: Some(config.spec.template.clone()),
            ..Default::default()
        }),
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{DeploymentConfigSpec, DeploymentTriggerPolicy, ImageChangeParams};
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};

    fn config() -> DeploymentConfig {
        let mut config = DeploymentConfig::new(
            "deploy1",
            DeploymentConfigSpec {
                latest_version: 3,
                triggers: vec![DeploymentTriggerPolicy::ImageChange(
                    ImageChangeParams::from_repository_name(
                        ["container1"],
                        "registry:8080/repo1",
                        "tag1",
                    ),
                )],
                replicas: Some(2),
                selector: BTreeMap::from([("app".to_string(), "deploy1".to_string())]),
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "container1".to_string(),
                            image: Some("registry:8080/repo1:ref1".to_string()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
            },
        );
        config.metadata.namespace = Some("project1".to_string());
        config
            .labels_mut()
            .insert("team".to_string(), "platform".to_string());
        config
    }

    #[test]
    fn test_latest_deployment_name() {
        assert_eq!(latest_deployment_name_for_config(&config()), "deploy1-3");
    }

    #[test]
    fn test_encoded_config_decodes_to_the_same_config() {
        let config = config();
        let encoded = encode_deployment_config(&config).expect("Encoding should succeed");
        let decoded = decode_deployment_config(&encoded).expect("Decoding should succeed");
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_deployment_config("not json").is_err());
    }

    #[test]
    fn test_initial_deployment_policy_bumps_never_deployed_config() {
        let mut never_deployed = config();
        never_deployed.spec.latest_version = 0;

        let config = apply_initial_deployment_policy(never_deployed);

        assert_eq!(config.spec.latest_version, 1);
        assert_eq!(latest_deployment_name_for_config(&config), "deploy1-1");
    }

    #[test]
    fn test_initial_deployment_policy_keeps_deployed_config() {
        assert_eq!(apply_initial_deployment_policy(config()), config());
    }

    #[test]
    fn test_make_deployment() {
        let config = config();
        let deployment = make_deployment(&config).expect("Deployment should be built");

        assert_eq!(deployment.metadata.name.as_deref(), Some("deploy1-3"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("project1"));
        assert_eq!(
            deployment
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("team"))
                .map(String::as_str),
            Some("platform")
        );

        let annotations = deployment
            .metadata
            .annotations
            .as_ref()
            .expect("Deployment should be annotated");
        assert_eq!(annotations[DEPLOYMENT_CONFIG_ANNOTATION], "deploy1");
        assert_eq!(annotations[DEPLOYMENT_STATUS_ANNOTATION], "New");
        assert_eq!(annotations[DEPLOYMENT_VERSION_ANNOTATION], "3");
        let snapshot = decode_deployment_config(&annotations[DEPLOYMENT_ENCODED_CONFIG_ANNOTATION])
            .expect("Snapshot should decode");
        assert_eq!(snapshot, config);

        let spec = deployment.spec.expect("Deployment should have a spec");
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(
            spec.selector
                .as_ref()
                .and_then(|s| s.get("app"))
                .map(String::as_str),
            Some("deploy1")
        );
        assert_eq!(spec.template, Some(config.spec.template.clone()));
    }
}
