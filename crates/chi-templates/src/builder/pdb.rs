use std::collections::BTreeMap;

use k8s_openapi::{
    api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec},
    apimachinery::pkg::{
        apis::meta::v1::{LabelSelector, ObjectMeta},
        util::intstr::IntOrString,
    },
};
use kube::{Resource, ResourceExt};
use snafu::{ResultExt, Snafu};

use crate::builder::owner_reference::{self, owner_references};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("failed to set owner references from installation"))]
    OwnerReferences { source: owner_reference::Error },
}

/// This builder is used to construct the [`PodDisruptionBudget`] of one cluster of an
/// installation.
///
/// The following attributes are mandatory and must be specified before the
/// [`PodDisruptionBudget`] can be built:
///
/// 1. [`PodDisruptionBudget::metadata`]
/// 2. [`PodDisruptionBudgetSpec::selector`]
/// 3. [`PodDisruptionBudgetSpec::max_unavailable`]
///
/// [`PodDisruptionBudgetBuilder::new_for_cluster`] sets the metadata.
#[derive(Debug, Default)]
pub struct PodDisruptionBudgetBuilder<Metadata, Selector, MaxUnavailable> {
    metadata: Metadata,
    selector: Selector,
    max_unavailable: MaxUnavailable,
}

impl PodDisruptionBudgetBuilder<(), (), ()> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates [`PodDisruptionBudget::metadata`] for the cluster `cluster_name` of the
    /// installation `owner`.
    ///
    /// * `root_name` - The name all objects of the installation are prefixed with.
    /// * `skip_owner_references` - Whether the budget should outlive `owner`.
    pub fn new_for_cluster<R: Resource<DynamicType = ()>>(
        owner: &R,
        root_name: &str,
        cluster_name: &str,
        skip_owner_references: bool,
    ) -> Result<PodDisruptionBudgetBuilder<ObjectMeta, (), ()>> {
        let metadata = ObjectMeta {
            name: Some(format!("{root_name}-{cluster_name}")),
            namespace: owner.namespace(),
            owner_references: owner_references(owner, skip_owner_references)
                .context(OwnerReferencesSnafu)?,
            ..ObjectMeta::default()
        };
        Ok(PodDisruptionBudgetBuilder::new().new_with_metadata(metadata))
    }

    /// Sets the mandatory [`PodDisruptionBudget::metadata`].
    pub fn new_with_metadata(
        self,
        metadata: impl Into<ObjectMeta>,
    ) -> PodDisruptionBudgetBuilder<ObjectMeta, (), ()> {
        PodDisruptionBudgetBuilder {
            metadata: metadata.into(),
            ..PodDisruptionBudgetBuilder::default()
        }
    }
}

impl<Selector, MaxUnavailable> PodDisruptionBudgetBuilder<ObjectMeta, Selector, MaxUnavailable> {
    /// Adds labels, overriding existing labels with the same key.
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels);
        self
    }

    /// Adds annotations, overriding existing annotations with the same key.
    pub fn with_annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations);
        self
    }
}

impl PodDisruptionBudgetBuilder<ObjectMeta, (), ()> {
    /// Sets the mandatory [`PodDisruptionBudgetSpec::selector`].
    pub fn with_selector(
        self,
        selector: LabelSelector,
    ) -> PodDisruptionBudgetBuilder<ObjectMeta, LabelSelector, ()> {
        PodDisruptionBudgetBuilder {
            metadata: self.metadata,
            selector,
            max_unavailable: (),
        }
    }

    /// Sets the mandatory [`PodDisruptionBudgetSpec::selector`] to select all pods carrying
    /// `labels`.
    pub fn with_match_labels(
        self,
        labels: BTreeMap<String, String>,
    ) -> PodDisruptionBudgetBuilder<ObjectMeta, LabelSelector, ()> {
        self.with_selector(LabelSelector {
            match_expressions: None,
            match_labels: Some(labels),
        })
    }
}

impl PodDisruptionBudgetBuilder<ObjectMeta, LabelSelector, ()> {
    /// Sets the mandatory [`PodDisruptionBudgetSpec::max_unavailable`].
    ///
    /// Only fixed numbers are supported. [`IntOrString`] takes an i32, a u16 always fits and
    /// cannot be negative.
    pub fn with_max_unavailable(
        self,
        max_unavailable: u16,
    ) -> PodDisruptionBudgetBuilder<ObjectMeta, LabelSelector, u16> {
        PodDisruptionBudgetBuilder {
            metadata: self.metadata,
            selector: self.selector,
            max_unavailable,
        }
    }
}

impl PodDisruptionBudgetBuilder<ObjectMeta, LabelSelector, u16> {
    pub fn build(self) -> PodDisruptionBudget {
        PodDisruptionBudget {
            metadata: self.metadata,
            spec: Some(PodDisruptionBudgetSpec {
                max_unavailable: Some(IntOrString::Int(i32::from(self.max_unavailable))),
                selector: Some(self.selector),
                ..PodDisruptionBudgetSpec::default()
            }),
            ..PodDisruptionBudget::default()
        }
    }
}
