use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::merge::Merge;

/// Settings shared by the hosts that refer to this template by name.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Merge, PartialEq, Eq, Serialize)]
#[merge(path_overrides(merge = "crate::merge"))]
#[serde(rename_all = "camelCase")]
pub struct HostTemplate {
    pub name: String,

    /// How ports are distributed between the hosts created from this template.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_distribution: Vec<PortDistribution>,

    #[serde(default)]
    pub spec: HostSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDistribution {
    #[serde(rename = "type", default)]
    pub distribution_type: PortDistributionType,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
pub enum PortDistributionType {
    #[default]
    Unspecified,
    ClusterScopeIndex,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Merge, PartialEq, Eq, Serialize)]
#[merge(path_overrides(merge = "crate::merge"))]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,

    #[serde(
        rename = "interserverHTTPPort",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub interserver_http_port: Option<u16>,

    /// Server settings, taken as a whole from whichever layer sets any.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,

    /// Extra configuration files, keyed by file name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,

    #[serde(default)]
    pub templates: TemplateNames,
}

/// Names of the templates of the other categories that a host is built from.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Merge, PartialEq, Eq, Serialize)]
#[merge(path_overrides(merge = "crate::merge"))]
#[serde(rename_all = "camelCase")]
pub struct TemplateNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume_claim_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_volume_claim_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_template: Option<String>,
}
