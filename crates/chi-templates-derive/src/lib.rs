use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod merge;

/// Derives [`Merge`](trait.Merge.html) for structs and enums.
///
/// Structs are merged field by field. Enums merge the fields of matching variants, a variant
/// mismatch keeps the receiver untouched.
///
/// Supported attributes:
///
/// - `#[merge(bound = "T: Merge")]` adds additional where-clause predicates to the generated impl.
/// - `#[merge(path_overrides(merge = "crate::merge"))]` overrides the path of the `merge` module,
///   which defaults to `::chi_templates::merge`.
#[proc_macro_derive(Merge, attributes(merge))]
pub fn derive_merge(input: TokenStream) -> TokenStream {
    merge::derive(&parse_macro_input!(input as DeriveInput)).into()
}
