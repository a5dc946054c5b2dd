use k8s_openapi::{api::core::v1::PodSpec, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::merge::Merge;

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Merge, PartialEq, Serialize)]
#[merge(path_overrides(merge = "crate::merge"))]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    #[serde(default)]
    pub zone: PodTemplateZone,

    /// Scheduling rules, expanded into affinities by the pod builder.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_distribution: Vec<PodDistribution>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PodSpec,
}

/// Node label selecting the availability zone(s) the pods may run in.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Merge, PartialEq, Eq, Serialize)]
#[merge(path_overrides(merge = "crate::merge"))]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateZone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodDistribution {
    #[serde(rename = "type", default)]
    pub distribution_type: PodDistributionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<PodDistributionScope>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_key: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
pub enum PodDistributionType {
    #[default]
    Unspecified,
    ClickHouseAntiAffinity,
    ShardAntiAffinity,
    ReplicaAntiAffinity,
    AnotherNamespaceAntiAffinity,
    AnotherClickHouseInstallationAntiAffinity,
    AnotherClusterAntiAffinity,
    MaxNumberPerNode,
    NamespaceAffinity,
    ClickHouseInstallationAffinity,
    ClusterAffinity,
    ShardAffinity,
    ReplicaAffinity,
    PreviousTailAffinity,
    CircularReplication,
}

#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
pub enum PodDistributionScope {
    Unspecified,
    Shard,
    Replica,
    Cluster,
    ClickHouseInstallation,
    Namespace,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;
    use k8s_openapi::api::core::v1::Container;

    use super::*;
    use crate::merge::merge;

    #[test]
    fn zone_and_spec_are_merged_independently() {
        let receiver: PodTemplate = serde_yaml::from_str(indoc! {"
            name: worker
            zone:
              values: [zone-a]
            metadata:
              labels:
                tier: hot
            spec:
              containers:
                - name: clickhouse
                  image: clickhouse/clickhouse-server:24.3
        "})
        .expect("test YAML is valid");
        let defaults: PodTemplate = serde_yaml::from_str(indoc! {"
            name: worker
            generateName: chi-worker
            zone:
              key: topology.kubernetes.io/zone
              values: [zone-b, zone-c]
            podDistribution:
              - type: ShardAntiAffinity
                scope: Shard
            metadata:
              labels:
                tier: cold
                team: db
              annotations:
                owner: platform
            spec:
              containers:
                - name: clickhouse
                  image: clickhouse/clickhouse-server:23.8
              terminationGracePeriodSeconds: 30
        "})
        .expect("test YAML is valid");

        let merged = merge(receiver, &defaults);

        assert_eq!(merged.generate_name.as_deref(), Some("chi-worker"));
        assert_eq!(merged.zone, PodTemplateZone {
            key: Some("topology.kubernetes.io/zone".to_owned()),
            values: vec!["zone-a".to_owned()],
        });
        assert_eq!(merged.pod_distribution, vec![PodDistribution {
            distribution_type: PodDistributionType::ShardAntiAffinity,
            scope: Some(PodDistributionScope::Shard),
            ..Default::default()
        }]);
        assert_eq!(
            merged.metadata.labels,
            Some(BTreeMap::from([("tier".to_owned(), "hot".to_owned())]))
        );
        assert_eq!(
            merged.metadata.annotations,
            Some(BTreeMap::from([("owner".to_owned(), "platform".to_owned())]))
        );
        assert_eq!(merged.spec.containers, vec![Container {
            name: "clickhouse".to_owned(),
            image: Some("clickhouse/clickhouse-server:24.3".to_owned()),
            ..Default::default()
        }]);
        assert_eq!(merged.spec.termination_grace_period_seconds, Some(30));
    }
}
