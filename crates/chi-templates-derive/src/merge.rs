use darling::{
    FromDeriveInput, FromField, FromMeta, FromVariant,
    ast::{Data, Fields},
};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use syn::{DeriveInput, Index, Path, WherePredicate, parse_quote};

#[derive(FromMeta)]
struct ModulePaths {
    #[darling(default = "ModulePaths::default_merge")]
    merge: Path,
}

impl Default for ModulePaths {
    fn default() -> Self {
        Self {
            merge: Self::default_merge(),
        }
    }
}

impl ModulePaths {
    fn default_merge() -> Path {
        parse_quote!(::chi_templates::merge)
    }
}

#[derive(FromDeriveInput)]
#[darling(attributes(merge))]
struct MergeOptions {
    ident: Ident,
    generics: syn::Generics,
    data: Data<VariantOptions, FieldOptions>,
    #[darling(default, rename = "path_overrides")]
    paths: ModulePaths,
    #[darling(default)]
    bound: Option<Vec<WherePredicate>>,
}

#[derive(FromField)]
struct FieldOptions {
    ident: Option<Ident>,
}

#[derive(FromVariant)]
struct VariantOptions {
    ident: Ident,
    fields: Fields<FieldOptions>,
}

/// The bindings of one side (`self` or `defaults`) of a destructured struct or variant
struct Side {
    pattern: TokenStream,
    bindings: Vec<Ident>,
}

impl Side {
    fn destructure(constructor: &TokenStream, fields: &Fields<FieldOptions>, side: &str) -> Self {
        let mut members = Vec::with_capacity(fields.len());
        let mut bindings = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            let (member, binding) = match &field.ident {
                Some(ident) => (quote!(#ident), format_ident!("{side}_{ident}")),
                None => {
                    let index = Index::from(position);
                    (quote!(#index), format_ident!("{side}_{position}"))
                }
            };
            members.push(member);
            bindings.push(binding);
        }
        Self {
            pattern: quote!(#constructor { #(#members: #bindings,)* }),
            bindings,
        }
    }
}

/// Names the fields for conflict paths: the identifier for named fields, the position otherwise
fn field_names(fields: &Fields<FieldOptions>) -> Vec<String> {
    fields
        .iter()
        .enumerate()
        .map(|(position, field)| match &field.ident {
            Some(ident) => ident.to_string(),
            None => position.to_string(),
        })
        .collect()
}

/// A match arm merging two values that were built by the same `constructor`
fn matching_arm(
    constructor: &TokenStream,
    fields: &Fields<FieldOptions>,
    merge_mod: &Path,
) -> TokenStream {
    let receiver = Side::destructure(constructor, fields, "self");
    let defaults = Side::destructure(constructor, fields, "defaults");
    let names = field_names(fields);
    let (receiver_pattern, receiver_bindings) = (&receiver.pattern, &receiver.bindings);
    let (defaults_pattern, defaults_bindings) = (&defaults.pattern, &defaults.bindings);
    quote! {
        (#receiver_pattern, #defaults_pattern) => {
            #(
                tracker.field(#names, |tracker| {
                    #merge_mod::Merge::merge_tracked(#receiver_bindings, #defaults_bindings, tracker)
                });
            )*
        }
    }
}

/// The arm for two different enum variants. The receiver is kept as-is, which is only reported
/// when the defaults variant had fields that are now lost.
fn mismatch_arm(ident: &Ident, variants: &[VariantOptions], merge_mod: &Path) -> TokenStream {
    let variant_idents = variants.iter().map(|variant| &variant.ident).collect::<Vec<_>>();
    let variant_names = variant_idents
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    let has_fields = variants.iter().map(|variant| !variant.fields.is_empty());
    quote! {
        #[allow(unreachable_patterns)]
        (receiver, defaults) => {
            let discards_fields = match defaults {
                #(#ident::#variant_idents { .. } => #has_fields,)*
            };
            if discards_fields {
                tracker.record(#merge_mod::ConflictProblem::VariantMismatch {
                    receiver: match &*receiver { #(#ident::#variant_idents { .. } => #variant_names,)* },
                    defaults: match defaults { #(#ident::#variant_idents { .. } => #variant_names,)* },
                });
            }
        }
    }
}

pub fn derive(input: &DeriveInput) -> TokenStream {
    let options = match MergeOptions::from_derive_input(input) {
        Ok(options) => options,
        Err(err) => return err.write_errors(),
    };
    let MergeOptions {
        ident,
        mut generics,
        data,
        paths: ModulePaths { merge: merge_mod },
        bound,
    } = options;

    let arms = match &data {
        Data::Struct(fields) => matching_arm(&quote!(#ident), fields, &merge_mod),
        Data::Enum(variants) => {
            let matching = variants.iter().map(|variant| {
                let variant_ident = &variant.ident;
                matching_arm(&quote!(#ident::#variant_ident), &variant.fields, &merge_mod)
            });
            let mismatch = mismatch_arm(&ident, variants, &merge_mod);
            quote! {
                #(#matching)*
                #mismatch
            }
        }
    };

    if let Some(bound) = bound {
        generics.make_where_clause().predicates.extend(bound);
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    quote! {
        impl #impl_generics #merge_mod::Merge for #ident #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn merge_tracked(
                &mut self,
                defaults: &Self,
                tracker: &mut #merge_mod::ConflictTracker,
            ) {
                match (self, defaults) {
                    #arms
                }
            }
        }
    }
}
