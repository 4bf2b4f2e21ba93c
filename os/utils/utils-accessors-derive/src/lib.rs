//! # Setter Derive
//!
//! `#[derive(Setters)]` for plain register snapshots such as saved trap
//! frames, where the kernel and the program loader adjust one or two fields
//! (`eip`, `esp`, `eax`) of an otherwise copied value.

use proc_macro::TokenStream;
use quote::{ToTokens, format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{Data, DeriveInput, Field, Fields, LitBool, Token, parse_macro_input, spanned::Spanned};

/// Generates, for every **named** field `x: T`:
///
/// - `fn set_x(&mut self, value: T) -> &mut Self`
/// - `const fn with_x(self, value: T) -> Self`
///
/// Fields marked `#[setters(skip)]` (or `#[setters(skip = true)]`) get
/// neither.
///
/// # Example
///
/// ```
/// use utils_accessors_derive::Setters;
///
/// #[derive(Clone, Copy, Default, Setters)]
/// struct Frame {
///     eip: u32,
///     esp: u32,
///     #[setters(skip)]
///     vector: u32,
/// }
///
/// let mut frame = Frame::default().with_eip(0x0804_8000);
/// frame.set_esp(0xffff_b000).set_eip(0x0804_8010);
/// assert_eq!((frame.eip, frame.esp, frame.vector), (0x0804_8010, 0xffff_b000, 0));
/// ```
#[proc_macro_derive(Setters, attributes(setters))]
pub fn derive_setters(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = named_fields(input)?;
    let mut methods = Vec::with_capacity(fields.len());
    for field in fields {
        if !is_skipped(field)? {
            methods.push(setter_pair(field));
        }
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*
        }
    }
    .into())
}

fn named_fields(input: &DeriveInput) -> syn::Result<&Punctuated<Field, Token![,]>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "Setters can only be derived for structs",
        ));
    };
    match &data.fields {
        Fields::Named(named) => Ok(&named.named),
        Fields::Unnamed(unnamed) => Err(syn::Error::new(
            unnamed.span(),
            "Setters requires named fields",
        )),
        Fields::Unit => Err(syn::Error::new(
            input.ident.span(),
            "Setters has nothing to generate for a unit struct",
        )),
    }
}

fn setter_pair(field: &Field) -> impl ToTokens {
    let name = field.ident.as_ref().map_or_else(String::new, ToString::to_string);
    let ident = &field.ident;
    let ty = &field.ty;
    let set_name = format_ident!("set_{}", name);
    let with_name = format_ident!("with_{}", name);
    let set_doc = format!("Set `{name}` in place.");
    let with_doc = format!("Return a copy with `{name}` replaced.");

    quote! {
        #[doc = #set_doc]
        #[inline]
        pub fn #set_name(&mut self, value: #ty) -> &mut Self {
            self.#ident = value;
            self
        }

        #[doc = #with_doc]
        #[inline]
        #[must_use]
        pub const fn #with_name(mut self, value: #ty) -> Self {
            self.#ident = value;
            self
        }
    }
}

/// `#[setters(skip)]` or `#[setters(skip = <bool>)]`.
fn is_skipped(field: &Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("setters")) {
        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident("skip") {
                return Err(meta.error("unknown setters option, expected `skip`"));
            }
            skip = if meta.input.is_empty() {
                true
            } else {
                meta.value()?.parse::<LitBool>()?.value
            };
            Ok(())
        })?;
    }
    Ok(skip)
}
