//! Merging of opaque structures (such as the Kubernetes API objects) that cannot derive [`Merge`].
//!
//! Both sides are rendered to JSON and walked alongside the type's JSON schema. This is what lets
//! the walk tell structs apart from maps, which look identical once they are JSON objects:
//!
//! - Schema nodes with `properties` are structs, their fields are merged one by one.
//! - Every other object (typically with `additionalProperties`) is a map and is merged wholesale.
//!
//! JSON zero values (`null`, `false`, `0`, `""`, `[]`, `{}`, or a missing key) count as empty.
use std::sync::OnceLock;

use k8s_openapi::{
    api::core::v1::{PersistentVolumeClaimSpec, PodSpec, ServiceSpec},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use snafu::ResultExt;

use super::{
    ConflictTracker, DeserializeValueSnafu, Merge, SerializeValueSnafu, ShapeMismatchSnafu,
};

/// Upper bound for chains of `$ref`s pointing at other `$ref`s
const MAX_REF_DEPTH: usize = 16;

static UNKNOWN_SCHEMA: Value = Value::Null;

macro_rules! impl_merge_via_schema {
    ($($ty:ty),* $(,)?) => {$(
        impl Merge for $ty {
            fn merge_tracked(&mut self, defaults: &Self, tracker: &mut ConflictTracker) {
                static SCHEMA: OnceLock<Value> = OnceLock::new();
                let schema = SCHEMA.get_or_init(root_schema::<$ty>);
                merge_via_schema(self, defaults, schema, tracker);
            }
        }
    )*};
}

impl_merge_via_schema!(
    ObjectMeta,
    PodSpec,
    PersistentVolumeClaimSpec,
    ServiceSpec,
);

/// Generates the root JSON schema of `T`, including the definitions its `$ref`s point to
pub fn root_schema<T: JsonSchema>() -> Value {
    schemars::schema_for!(T).to_value()
}

/// Merges `defaults` into `receiver` by walking their JSON representations with `schema`, which
/// must be the root schema of `T` (see [`root_schema`]).
///
/// `receiver` is only replaced if the walk changed anything, and left untouched if either side
/// cannot be converted.
pub fn merge_via_schema<T>(
    receiver: &mut T,
    defaults: &T,
    schema: &Value,
    tracker: &mut ConflictTracker,
) where
    T: Serialize + DeserializeOwned,
{
    let type_name = std::any::type_name::<T>();
    let values = serde_json::to_value(&*receiver)
        .and_then(|receiver| Ok((receiver, serde_json::to_value(defaults)?)))
        .context(SerializeValueSnafu { type_name });
    let (mut receiver_value, defaults_value) = match values {
        Ok(values) => values,
        Err(problem) => return tracker.record(problem),
    };

    let walker = SchemaWalker { root: schema };
    if !walker.merge(&mut receiver_value, &defaults_value, schema, tracker) {
        return;
    }

    match serde_json::from_value(receiver_value).context(DeserializeValueSnafu { type_name }) {
        Ok(merged) => *receiver = merged,
        Err(problem) => tracker.record(problem),
    }
}

struct SchemaWalker<'a> {
    root: &'a Value,
}

impl<'a> SchemaWalker<'a> {
    /// Returns whether `receiver` was modified
    fn merge(
        &self,
        receiver: &mut Value,
        defaults: &Value,
        schema: &'a Value,
        tracker: &mut ConflictTracker,
    ) -> bool {
        if is_zero(defaults) {
            return false;
        }
        if is_zero(receiver) {
            receiver.clone_from(defaults);
            return true;
        }

        match (receiver, defaults) {
            (Value::Object(receiver_fields), Value::Object(defaults_fields)) => {
                let Some(properties) = self.properties(schema) else {
                    // Maps are kept wholesale once they have any entries
                    return false;
                };
                let mut changed = false;
                for (key, defaults_field) in defaults_fields {
                    if is_zero(defaults_field) {
                        continue;
                    }
                    let field_schema = properties.get(key).unwrap_or(&UNKNOWN_SCHEMA);
                    changed |= tracker.field(key, |tracker| match receiver_fields.get_mut(key) {
                        Some(receiver_field) => {
                            self.merge(receiver_field, defaults_field, field_schema, tracker)
                        }
                        None => {
                            receiver_fields.insert(key.clone(), defaults_field.clone());
                            true
                        }
                    });
                }
                changed
            }
            (receiver, defaults) if json_kind(receiver) != json_kind(defaults) => {
                tracker.record(
                    ShapeMismatchSnafu {
                        receiver: json_kind(receiver),
                        defaults: json_kind(defaults),
                    }
                    .build(),
                );
                false
            }
            // Non-empty leaves and arrays are kept
            _ => false,
        }
    }

    /// Returns the struct fields described by `schema`, or [`None`] if it doesn't describe a struct
    fn properties(&self, schema: &'a Value) -> Option<&'a Map<String, Value>> {
        let schema = self.resolve(schema);
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            return Some(properties);
        }
        // Nullable or annotated subschemas can be wrapped in a combinator
        ["allOf", "anyOf", "oneOf"]
            .into_iter()
            .filter_map(|keyword| schema.get(keyword).and_then(Value::as_array))
            .flatten()
            .find_map(|subschema| {
                self.resolve(subschema)
                    .get("properties")
                    .and_then(Value::as_object)
            })
    }

    fn resolve(&self, mut schema: &'a Value) -> &'a Value {
        for _ in 0..MAX_REF_DEPTH {
            let Some(target) = schema
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|reference| reference.strip_prefix('#'))
                .and_then(|pointer| self.root.pointer(pointer))
            else {
                break;
            };
            schema = target;
        }
        schema
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(value) => !value,
        Value::Number(value) => value.as_f64() == Some(0.0),
        Value::String(value) => value.is_empty(),
        Value::Array(values) => values.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
