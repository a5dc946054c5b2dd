//! Templates of ClickHouse installations, and the engine that layers them.
//!
//! An installation is described by several configuration layers (for example operator-wide
//! defaults, installation templates and the installation itself), each of which may define named
//! host, pod, volume claim and service templates. [`templates::TemplateCollection::merge_from`]
//! resolves them into one set of templates, which the [`builder`]s then turn into Kubernetes
//! objects.
//!
//! The merge rules themselves live in [`merge`].

pub mod builder;
pub mod merge;
pub mod templates;

// External re-exports
pub use k8s_openapi;
pub use kube;
pub use schemars;
