use k8s_openapi::{
    api::core::v1::PersistentVolumeClaimSpec, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::merge::Merge;

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Merge, PartialEq, Serialize)]
#[merge(path_overrides(merge = "crate::merge"))]
#[serde(rename_all = "camelCase")]
pub struct VolumeClaimTemplate {
    pub name: String,

    /// What happens to the claim once the host using it is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_policy: Option<ReclaimPolicy>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PersistentVolumeClaimSpec,
}

#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, Merge, PartialEq, Eq, Serialize)]
#[merge(path_overrides(merge = "crate::merge"))]
pub enum ReclaimPolicy {
    Retain,
    Delete,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use rstest::rstest;

    use super::*;
    use crate::merge::merge;

    #[rstest]
    #[case::receiver_wins(Some(ReclaimPolicy::Retain), Some(ReclaimPolicy::Delete), Some(ReclaimPolicy::Retain))]
    #[case::filled(None, Some(ReclaimPolicy::Delete), Some(ReclaimPolicy::Delete))]
    #[case::nothing_to_fill(None, None, None)]
    fn reclaim_policy(
        #[case] receiver: Option<ReclaimPolicy>,
        #[case] defaults: Option<ReclaimPolicy>,
        #[case] expected: Option<ReclaimPolicy>,
    ) {
        let merged = merge(
            VolumeClaimTemplate {
                name: "data".to_owned(),
                reclaim_policy: receiver,
                ..Default::default()
            },
            &VolumeClaimTemplate {
                name: "data".to_owned(),
                reclaim_policy: defaults,
                ..Default::default()
            },
        );
        assert_eq!(merged.reclaim_policy, expected);
    }

    #[test]
    fn storage_request_is_kept_as_a_whole() {
        let receiver: VolumeClaimTemplate = serde_yaml::from_str(indoc! {"
            name: data
            spec:
              resources:
                requests:
                  storage: 100Gi
        "})
        .expect("test YAML is valid");
        let defaults: VolumeClaimTemplate = serde_yaml::from_str(indoc! {"
            name: data
            spec:
              accessModes: [ReadWriteOnce]
              storageClassName: gp3
              resources:
                requests:
                  storage: 10Gi
                  cpu: '1'
        "})
        .expect("test YAML is valid");

        let merged = merge(receiver, &defaults);

        assert_eq!(
            merged.spec.access_modes,
            Some(vec!["ReadWriteOnce".to_owned()])
        );
        assert_eq!(merged.spec.storage_class_name.as_deref(), Some("gp3"));
        let requests = merged
            .spec
            .resources
            .and_then(|resources| resources.requests)
            .expect("requests are set");
        assert_eq!(
            requests,
            BTreeMap::from([("storage".to_owned(), Quantity("100Gi".to_owned()))])
        );
    }
}
