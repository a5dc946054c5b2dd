//! Deep merging of template layers.
//!
//! A template coming from a more specific layer (the *receiver*) is merged with the same template
//! from a less specific layer (the *defaults*). Every field that is still empty in the receiver is
//! filled with an owned copy of the defaults' value, everything else is left as-is.
//!
//! What "empty" means depends on the type:
//!
//! - Leaf values (integers, [`bool`], [`String`], [`Quantity`], [`LabelSelector`]) are empty when
//!   they equal their [`Default`] (zero) value.
//! - [`Option`]s are empty when they are [`None`]. When both sides are [`Some`] the merge recurses
//!   into the contained values.
//! - Sequences and maps ([`Vec`], [`BTreeMap`], [`HashMap`]) are empty when they contain no
//!   entries. They are filled wholesale and are never concatenated or merged entry by entry.
//! - Structs and enums recurse field by field, usually via [the derive macro](`derive@Merge`).
//! - Opaque Kubernetes structures (such as [`PodSpec`](k8s_openapi::api::core::v1::PodSpec)) are
//!   merged through their JSON schema, see [`schema`].
//!
//! Merging never fails. Fields that cannot be merged (for example because both sides hold
//! different enum variants) keep the receiver's value and are reported to the [`ConflictTracker`].
use std::{
    collections::{BTreeMap, HashMap},
    fmt::{Display, Write},
    hash::Hash,
};

use k8s_openapi::apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::LabelSelector};
use snafu::Snafu;

pub mod schema;

pub use chi_templates_derive::Merge;

/// A type that can be merged with itself.
///
/// This is primarily intended to be implemented for templates that can come from several
/// configuration layers (for example a cluster definition and its global defaults), where the more
/// specific layer should take precedence.
///
/// Most users will want to implement this for custom types using
/// [the associated derive macro](`derive@Merge`).
///
/// # Example
///
/// ```
/// # use chi_templates::merge::Merge;
///
/// #[derive(Merge, Debug, PartialEq, Eq)]
/// struct Foo {
///     bar: Option<u8>,
///     baz: Option<u8>,
/// }
///
/// let mut config = Foo {
///     bar: Some(1),
///     baz: None,
/// };
/// config.merge(&Foo {
///     bar: Some(5),
///     baz: Some(2),
/// });
/// assert_eq!(config, Foo {
///     bar: Some(1), // Kept from the receiver
///     baz: Some(2), // Filled from the defaults
/// });
/// ```
pub trait Merge {
    /// Merge with `defaults`, preferring values from `self` if they are set there.
    ///
    /// Any conflicts are discarded, use [`Merge::merge_tracked`] to inspect them.
    fn merge(&mut self, defaults: &Self) {
        self.merge_tracked(defaults, &mut ConflictTracker::default());
    }

    /// Merge with `defaults`, reporting fields that could not be merged to `tracker`.
    fn merge_tracked(&mut self, defaults: &Self, tracker: &mut ConflictTracker);
}

/// Moving version of [`Merge::merge`], to produce slightly nicer test output
pub fn merge<T: Merge>(mut overrides: T, defaults: &T) -> T {
    overrides.merge(defaults);
    overrides
}

/// Collects the conflicts encountered while merging, together with the path of the field that
/// was being merged at the time.
#[derive(Debug, Default)]
pub struct ConflictTracker {
    path: Vec<String>,
    conflicts: Vec<MergeConflict>,
}

impl ConflictTracker {
    /// Runs `f` while tracking a subfield of the current value
    pub fn field<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(name.to_owned());
        let result = f(self);
        self.path.pop();
        result
    }

    /// Records a problem for the field that is currently being merged
    pub fn record(&mut self, problem: ConflictProblem) {
        self.conflicts.push(MergeConflict {
            path: FieldPath {
                idents: self.path.clone(),
            },
            problem,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.conflicts
    }

    pub fn into_conflicts(self) -> Vec<MergeConflict> {
        self.conflicts
    }
}

/// Dotted path to a (nested) field, such as `spec.templates.podTemplate`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath {
    idents: Vec<String>,
}

impl FieldPath {
    pub fn idents(&self) -> &[String] {
        &self.idents
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.idents.is_empty() {
            return f.write_char('.');
        }
        for (i, ident) in self.idents.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            f.write_str(ident)?;
        }
        Ok(())
    }
}

/// A field that could not be merged. The receiver's value was kept.
#[derive(Debug, Snafu)]
#[snafu(display("failed to merge field {path}"))]
pub struct MergeConflict {
    path: FieldPath,
    #[snafu(source)]
    problem: ConflictProblem,
}

impl MergeConflict {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn problem(&self) -> &ConflictProblem {
        &self.problem
    }
}

/// A problem that was discovered while merging, with no additional context.
#[derive(Debug, Snafu)]
pub enum ConflictProblem {
    #[snafu(display(
        "receiver holds variant {receiver:?}, discarding the fields of defaults variant {defaults:?}"
    ))]
    VariantMismatch {
        receiver: &'static str,
        defaults: &'static str,
    },

    /// Only reachable for loosely typed payloads, such as a [`serde_json::Value`] inside a
    /// schema-merged structure.
    #[snafu(display("receiver holds a JSON {receiver} but defaults hold a JSON {defaults}"))]
    ShapeMismatch {
        receiver: &'static str,
        defaults: &'static str,
    },

    #[snafu(display("failed to serialize {type_name} to JSON"))]
    SerializeValue {
        source: serde_json::Error,
        type_name: &'static str,
    },

    #[snafu(display("failed to deserialize merged {type_name} from JSON"))]
    DeserializeValue {
        source: serde_json::Error,
        type_name: &'static str,
    },
}

impl<T: Merge> Merge for Box<T> {
    fn merge_tracked(&mut self, defaults: &Self, tracker: &mut ConflictTracker) {
        T::merge_tracked(self, defaults, tracker);
    }
}

impl<T: Merge + Clone> Merge for Option<T> {
    fn merge_tracked(&mut self, defaults: &Self, tracker: &mut ConflictTracker) {
        match (self, defaults) {
            (Some(this), Some(defaults)) => this.merge_tracked(defaults, tracker),
            (this @ None, defaults) => *this = defaults.clone(),
            (Some(_), None) => {}
        }
    }
}

impl<T: Clone> Merge for Vec<T> {
    fn merge_tracked(&mut self, defaults: &Self, _tracker: &mut ConflictTracker) {
        if self.is_empty() {
            self.clone_from(defaults);
        }
    }
}

impl<K: Ord + Clone, V: Clone> Merge for BTreeMap<K, V> {
    fn merge_tracked(&mut self, defaults: &Self, _tracker: &mut ConflictTracker) {
        if self.is_empty() {
            self.clone_from(defaults);
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Merge for HashMap<K, V> {
    fn merge_tracked(&mut self, defaults: &Self, _tracker: &mut ConflictTracker) {
        if self.is_empty() {
            self.clone_from(defaults);
        }
    }
}

/// Leaf types are merged atomically (as one single value) rather than trying to merge their
/// contents. They count as empty when they equal their [`Default`] value.
macro_rules! impl_merge_for_atomic {
    ($($ty:ty),* $(,)?) => {$(
        impl Merge for $ty {
            fn merge_tracked(&mut self, defaults: &Self, _tracker: &mut ConflictTracker) {
                if *self == <$ty as Default>::default() {
                    self.clone_from(defaults);
                }
            }
        }
    )*};
}

impl_merge_for_atomic!(
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    bool,
    String,
    Quantity,
    LabelSelector,
);
