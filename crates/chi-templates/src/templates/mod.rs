//! Named templates for hosts, pods, volume claims and services, and the collection merging them
//! across configuration layers.
//!
//! A [`TemplateCollection`] holds one ordered sequence of templates per [`TemplateCategory`].
//! Within a category, template names are unique. Merging a less specific collection (such as the
//! global defaults) into a more specific one matches templates by name:
//!
//! - Templates present in both are [merged](crate::merge::Merge), the receiver winning every field
//!   it has set.
//! - Templates only present in the source are appended as independent copies.
//!
//! Categories never interact with each other, the same name may be used in several of them.
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use strum::{Display, EnumIter};
use tracing::{debug, instrument, warn};

use crate::merge::{ConflictTracker, Merge, MergeConflict};

mod host;
mod index;
mod pod;
mod service;
mod volume_claim;

pub use host::*;
pub use index::TemplateIndex;
pub use pod::*;
pub use service::*;
pub use volume_claim::*;

#[derive(Clone, Copy, Debug, Display, EnumIter, PartialEq, Eq, Hash)]
#[strum(serialize_all = "camelCase")]
pub enum TemplateCategory {
    Host,
    Pod,
    VolumeClaim,
    Service,
}

/// A template that is stored by name in one category of a [`TemplateCollection`].
///
/// The projection functions let the merge and index logic be written once for all categories.
pub trait NamedTemplate: Merge + Clone {
    const CATEGORY: TemplateCategory;

    fn name(&self) -> &str;

    fn templates(collection: &TemplateCollection) -> &[Self];
    fn templates_mut(collection: &mut TemplateCollection) -> &mut Vec<Self>;

    fn index(collection: &TemplateCollection) -> &TemplateIndex<Self>;
    fn index_mut(collection: &mut TemplateCollection) -> &mut TemplateIndex<Self>;
}

macro_rules! impl_named_template {
    ($ty:ty, $category:ident, $templates:ident, $index:ident) => {
        impl NamedTemplate for $ty {
            const CATEGORY: TemplateCategory = TemplateCategory::$category;

            fn name(&self) -> &str {
                &self.name
            }

            fn templates(collection: &TemplateCollection) -> &[Self] {
                &collection.$templates
            }

            fn templates_mut(collection: &mut TemplateCollection) -> &mut Vec<Self> {
                &mut collection.$templates
            }

            fn index(collection: &TemplateCollection) -> &TemplateIndex<Self> {
                &collection.$index
            }

            fn index_mut(collection: &mut TemplateCollection) -> &mut TemplateIndex<Self> {
                &mut collection.$index
            }
        }
    };
}

impl_named_template!(HostTemplate, Host, host_templates, host_templates_index);
impl_named_template!(PodTemplate, Pod, pod_templates, pod_templates_index);
impl_named_template!(
    VolumeClaimTemplate,
    VolumeClaim,
    volume_claim_templates,
    volume_claim_templates_index
);
impl_named_template!(
    ServiceTemplate,
    Service,
    service_templates,
    service_templates_index
);

/// All templates of one configuration layer.
///
/// The per-category [`TemplateIndex`]es are not part of the serialized form and do not take part
/// in equality.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCollection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_templates: Vec<HostTemplate>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_templates: Vec<PodTemplate>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_claim_templates: Vec<VolumeClaimTemplate>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_templates: Vec<ServiceTemplate>,

    #[serde(skip)]
    host_templates_index: TemplateIndex<HostTemplate>,

    #[serde(skip)]
    pod_templates_index: TemplateIndex<PodTemplate>,

    #[serde(skip)]
    volume_claim_templates_index: TemplateIndex<VolumeClaimTemplate>,

    #[serde(skip)]
    service_templates_index: TemplateIndex<ServiceTemplate>,
}

impl PartialEq for TemplateCollection {
    fn eq(&self, other: &Self) -> bool {
        self.host_templates == other.host_templates
            && self.pod_templates == other.pod_templates
            && self.volume_claim_templates == other.volume_claim_templates
            && self.service_templates == other.service_templates
    }
}

impl TemplateCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of templates across all categories
    pub fn len(&self) -> usize {
        self.host_templates.len()
            + self.pod_templates.len()
            + self.volume_claim_templates.len()
            + self.service_templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn templates<T: NamedTemplate>(&self) -> &[T] {
        T::templates(self)
    }

    /// Looks up a template by name in the ordered sequence (not the index)
    pub fn template<T: NamedTemplate>(&self, name: &str) -> Option<&T> {
        self.templates::<T>()
            .iter()
            .find(|template| template.name() == name)
    }

    /// Adds `template` to its category, replacing (in place) and returning any template with the
    /// same name.
    pub fn insert<T: NamedTemplate>(&mut self, template: T) -> Option<T> {
        let templates = T::templates_mut(self);
        match templates
            .iter()
            .position(|existing| existing.name() == template.name())
        {
            Some(position) => Some(std::mem::replace(&mut templates[position], template)),
            None => {
                templates.push(template);
                None
            }
        }
    }

    /// Merges `from` into `self`, category by category (host, pod, volume claim, service).
    ///
    /// Templates of `self` win over templates of `from` with the same name, but any of their
    /// fields that are still empty are filled from `from`. Templates only present in `from` are
    /// copied over. Indexes are not updated.
    ///
    /// Fields that could not be merged keep the value of `self` and are listed in the returned
    /// [`MergeReport`].
    #[instrument(level = "debug", skip_all, fields(receiver = self.len(), from = from.len()))]
    pub fn merge_from(&mut self, from: &Self) -> MergeReport {
        let mut report = MergeReport::default();
        if from.is_empty() {
            return report;
        }

        merge_category(&mut self.host_templates, &from.host_templates, &mut report);
        merge_category(&mut self.pod_templates, &from.pod_templates, &mut report);
        merge_category(
            &mut self.volume_claim_templates,
            &from.volume_claim_templates,
            &mut report,
        );
        merge_category(
            &mut self.service_templates,
            &from.service_templates,
            &mut report,
        );

        report
    }

    /// Returns the index of category `T`, which is uninitialized unless it has been
    /// [ensured](Self::ensure_index)
    pub fn index<T: NamedTemplate>(&self) -> &TemplateIndex<T> {
        T::index(self)
    }

    /// Returns the index of category `T`, initializing it first if needed
    pub fn ensure_index<T: NamedTemplate>(&mut self) -> &mut TemplateIndex<T> {
        let index = T::index_mut(self);
        if !index.is_initialized() {
            *index = TemplateIndex::new();
        }
        index
    }

    /// Replaces the index of category `T` with a fresh index of the templates currently stored
    pub fn reindex<T: NamedTemplate>(&mut self) -> &mut TemplateIndex<T> {
        let mut index = TemplateIndex::new();
        for template in T::templates(self) {
            index.set(template.name(), template.clone());
        }
        let slot = T::index_mut(self);
        *slot = index;
        slot
    }
}

/// Merges `from` into `receiver`, matching templates by name.
fn merge_category<T: NamedTemplate>(receiver: &mut Vec<T>, from: &[T], report: &mut MergeReport) {
    for from_template in from {
        let name = from_template.name();
        match receiver.iter().position(|template| template.name() == name) {
            Some(position) => {
                debug!(category = %T::CATEGORY, template = name, "merging into existing template");
                let mut tracker = ConflictTracker::default();
                receiver[position].merge_tracked(from_template, &mut tracker);
                report.record(T::CATEGORY, name, tracker);
            }
            None => {
                debug!(category = %T::CATEGORY, template = name, "copying missing template");
                receiver.push(from_template.clone());
            }
        }
    }
}

/// The outcome of [`TemplateCollection::merge_from`]. Merges always complete, so this only
/// carries diagnostics.
#[derive(Debug, Default)]
pub struct MergeReport {
    conflicts: Vec<TemplateConflict>,
}

impl MergeReport {
    fn record(&mut self, category: TemplateCategory, template: &str, tracker: ConflictTracker) {
        for conflict in tracker.into_conflicts() {
            warn!(
                %category,
                template,
                field = %conflict.path(),
                problem = %conflict.problem(),
                "could not merge template field, keeping the receiver's value"
            );
            self.conflicts.push(TemplateConflict {
                category,
                template: template.to_owned(),
                conflict,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflicts(&self) -> &[TemplateConflict] {
        &self.conflicts
    }

    pub fn into_conflicts(self) -> Vec<TemplateConflict> {
        self.conflicts
    }
}

#[derive(Debug, Snafu)]
#[snafu(display(
    "could not merge field {} of {category} template {template:?}",
    conflict.path()
))]
pub struct TemplateConflict {
    category: TemplateCategory,
    template: String,
    #[snafu(source)]
    conflict: MergeConflict,
}

impl TemplateConflict {
    pub fn category(&self) -> TemplateCategory {
        self.category
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn conflict(&self) -> &MergeConflict {
        &self.conflict
    }
}

/// Operations on a collection that may not have been initialized yet.
pub trait OptionalTemplates {
    /// Total number of templates, zero if there is no collection
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Like [`TemplateCollection::merge_from`], but
    ///
    /// - returns without touching `self` if `from` is absent or has no templates, and
    /// - creates an empty receiver first if `self` is absent.
    fn merge_from(&mut self, from: Option<&TemplateCollection>) -> MergeReport;
}

impl OptionalTemplates for Option<TemplateCollection> {
    fn len(&self) -> usize {
        self.as_ref().map_or(0, TemplateCollection::len)
    }

    fn merge_from(&mut self, from: Option<&TemplateCollection>) -> MergeReport {
        match from {
            Some(from) if !from.is_empty() => self
                .get_or_insert_with(TemplateCollection::new)
                .merge_from(from),
            _ => MergeReport::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::merge::ConflictProblem;

    fn collection(yaml: &str) -> TemplateCollection {
        serde_yaml::from_str(yaml).expect("test YAML is valid")
    }

    #[test]
    fn report_names_category_template_and_field() {
        let mut tracker = ConflictTracker::default();
        tracker.field("spec", |tracker| {
            tracker.field("placement", |tracker| {
                tracker.record(ConflictProblem::VariantMismatch {
                    receiver: "Anywhere",
                    defaults: "Zone",
                });
            });
        });
        let mut report = MergeReport::default();

        report.record(TemplateCategory::Pod, "worker", tracker);

        assert!(!report.is_empty());
        let [conflict] = report.conflicts() else {
            panic!("expected one conflict, got {:?}", report.conflicts());
        };
        assert_eq!(conflict.category(), TemplateCategory::Pod);
        assert_eq!(conflict.template(), "worker");
        assert_eq!(conflict.conflict().path().to_string(), "spec.placement");
        assert!(matches!(
            conflict.conflict().problem(),
            ConflictProblem::VariantMismatch {
                receiver: "Anywhere",
                defaults: "Zone",
            }
        ));
        assert_eq!(
            conflict.to_string(),
            r#"could not merge field spec.placement of pod template "worker""#
        );
        assert_eq!(report.into_conflicts().len(), 1);
    }

    #[test]
    fn len_sums_all_categories() {
        let templates = collection(indoc! {"
            hostTemplates:
              - name: a
            podTemplates:
              - name: a
              - name: b
            volumeClaimTemplates:
              - name: a
            serviceTemplates:
              - name: a
        "});
        assert_eq!(templates.len(), 5);
        assert!(!templates.is_empty());
        assert_eq!(None::<TemplateCollection>.len(), 0);
        assert!(None::<TemplateCollection>.is_empty());
    }

    #[test]
    fn categories_display_like_document_keys() {
        let names = TemplateCategory::iter()
            .map(|category| category.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["host", "pod", "volumeClaim", "service"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut templates = TemplateCollection::new();
        assert!(
            templates
                .insert(ServiceTemplate {
                    name: "a".to_owned(),
                    ..Default::default()
                })
                .is_none()
        );
        templates.insert(ServiceTemplate {
            name: "b".to_owned(),
            ..Default::default()
        });
        let replaced = templates.insert(ServiceTemplate {
            name: "a".to_owned(),
            generate_name: Some("svc".to_owned()),
            ..Default::default()
        });

        assert_eq!(replaced.map(|template| template.generate_name), Some(None));
        let names = templates
            .templates::<ServiceTemplate>()
            .iter()
            .map(NamedTemplate::name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(
            templates
                .template::<ServiceTemplate>("a")
                .and_then(|template| template.generate_name.as_deref()),
            Some("svc")
        );
    }

    #[test]
    fn same_name_in_different_categories_is_independent() {
        let mut receiver = collection(indoc! {"
            hostTemplates:
              - name: shared
                spec:
                  tcpPort: 9000
        "});
        let from = collection(indoc! {"
            hostTemplates:
              - name: shared
                spec:
                  httpPort: 8123
            podTemplates:
              - name: shared
                generateName: pod
        "});

        let report = receiver.merge_from(&from);

        assert!(report.is_empty());
        let host = receiver
            .template::<HostTemplate>("shared")
            .expect("host template exists");
        assert_eq!(host.spec.tcp_port, Some(9000));
        assert_eq!(host.spec.http_port, Some(8123));
        let pod = receiver
            .template::<PodTemplate>("shared")
            .expect("pod template exists");
        assert_eq!(pod.generate_name.as_deref(), Some("pod"));
    }

    #[test]
    fn appended_templates_keep_source_order() {
        let mut receiver = collection(indoc! {"
            volumeClaimTemplates:
              - name: log
        "});
        let from = collection(indoc! {"
            volumeClaimTemplates:
              - name: data
              - name: log
              - name: backup
        "});

        receiver.merge_from(&from);

        let names = receiver
            .templates::<VolumeClaimTemplate>()
            .iter()
            .map(NamedTemplate::name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["log", "data", "backup"]);
    }

    #[test]
    fn atomic_lists_never_conflict() {
        let mut receiver = collection(indoc! {"
            serviceTemplates:
              - name: svc-a
                spec:
                  ports:
                    - port: 80
                      targetPort: http
        "});
        let from = collection(indoc! {"
            serviceTemplates:
              - name: svc-a
                spec:
                  type: ClusterIP
                  ports:
                    - port: 8080
                      targetPort: 8080
        "});

        let report = receiver.merge_from(&from);

        // Port lists are atomic, so the differing targetPort shapes never meet
        assert!(report.is_empty());
        let service = receiver
            .template::<ServiceTemplate>("svc-a")
            .expect("service template exists");
        assert_eq!(service.spec.type_.as_deref(), Some("ClusterIP"));
    }

    #[test]
    fn ensure_index_is_idempotent() {
        let mut templates = TemplateCollection::new();
        assert!(!templates.index::<PodTemplate>().is_initialized());

        templates.ensure_index::<PodTemplate>().set(
            "worker",
            PodTemplate {
                name: "worker".to_owned(),
                ..Default::default()
            },
        );
        let index = templates.ensure_index::<PodTemplate>();

        assert!(index.is_initialized());
        assert!(index.has("worker"));
        assert!(!templates.index::<HostTemplate>().is_initialized());
    }

    #[test]
    fn reindex_reflects_current_templates() {
        let mut templates = collection(indoc! {"
            hostTemplates:
              - name: a
              - name: b
        "});
        templates.ensure_index::<HostTemplate>().set(
            "stale",
            HostTemplate {
                name: "stale".to_owned(),
                ..Default::default()
            },
        );

        let index = templates.reindex::<HostTemplate>();

        assert!(index.has("a"));
        assert!(index.has("b"));
        assert!(!index.has("stale"));
    }

    #[test]
    fn indexes_are_not_serialized() {
        let mut templates = collection(indoc! {"
            hostTemplates:
              - name: a
        "});
        templates.reindex::<HostTemplate>();

        let serialized = serde_json::to_value(&templates).expect("collection serializes");
        assert_eq!(
            serialized,
            serde_json::json!({
                "hostTemplates": [{"name": "a", "spec": {"templates": {}}}]
            })
        );
    }
}
