//! # Accessor Derive
//!
//! Derive macro for builder-style structs: every named field gets a pair of
//! setters, and the field's own doc comment is carried over to both, so the
//! generated API documents itself.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Fields, Ident, LitBool, LitStr, parse_macro_input,
    spanned::Spanned,
};

/// Derive `.set_<field>(&mut self, value: Ty) -> &mut Self` and
/// `const .with_<field>(mut self, value: Ty) -> Self` for each **named** field.
///
/// Field attributes:
/// - `#[setters(skip)]` (or `skip = true`): generate nothing for this field.
/// - `#[setters(rename = "name")]`: use `set_name`/`with_name` instead of the
///   field identifier.
///
/// Doc comments on a field are copied onto both generated methods.
///
/// # Example
///
/// ```
/// use utils_accessors_derive::Setters;
///
/// #[derive(Default, Setters)]
/// struct Geometry {
///     /// Number of offset bits.
///     #[setters(rename = "pobits")]
///     page_offset_bits: u32,
///     levels: u32,
///     #[setters(skip)]
///     _sealed: (),
/// }
///
/// let mut g = Geometry::default();
/// g.set_pobits(12).set_levels(2);
/// let g = g.with_levels(4);
/// assert_eq!((g.page_offset_bits, g.levels), (12, 4));
/// ```
#[proc_macro_derive(Setters, attributes(setters))]
pub fn derive_setters(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Per-field options parsed from `#[setters(...)]`.
#[derive(Default)]
struct FieldOptions {
    skip: bool,
    rename: Option<Ident>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(n) => &n.named,
            Fields::Unnamed(u) => {
                return Err(syn::Error::new(
                    u.span(),
                    "Setters only supports named fields",
                ));
            }
            Fields::Unit => {
                return Err(syn::Error::new(
                    ident.span(),
                    "Setters does not apply to unit structs",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                ident.span(),
                "Setters can only be derived for structs",
            ));
        }
    };

    let mut methods = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(fname) = &field.ident else { continue };
        let options = field_options(&field.attrs)?;
        if options.skip {
            continue;
        }

        let ty = &field.ty;
        let stem = options.rename.as_ref().unwrap_or(fname);
        let set_name = format_ident!("set_{}", stem);
        let with_name = format_ident!("with_{}", stem);
        let docs = field.attrs.iter().filter(|a| a.path().is_ident("doc"));
        let docs_again = docs.clone();

        methods.push(quote! {
            #(#docs)*
            #[inline]
            pub fn #set_name(&mut self, value: #ty) -> &mut Self {
                self.#fname = value;
                self
            }

            #(#docs_again)*
            #[inline]
            #[must_use]
            pub const fn #with_name(mut self, value: #ty) -> Self {
                self.#fname = value;
                self
            }
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*
        }
    })
}

fn field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("setters")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = meta.input.is_empty() || meta.value()?.parse::<LitBool>()?.value;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                options.rename = Some(name.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `rename = \"...\"`"))
            }
        })?;
    }
    Ok(options)
}
