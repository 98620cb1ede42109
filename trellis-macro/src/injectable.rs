use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, GenericArgument, PathArguments, Type, parse_macro_input};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_injectable_impl(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let data = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ));
        }
    };

    let body = match &data.fields {
        Fields::Named(fields) => {
            let injections = fields
                .named
                .iter()
                .map(|field| {
                    let name = &field.ident;
                    let value = field_injection(field)?;
                    Ok(quote!(#name: #value))
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote!(Self { #(#injections),* })
        }
        Fields::Unnamed(fields) => {
            let injections = fields
                .unnamed
                .iter()
                .map(field_injection)
                .collect::<syn::Result<Vec<_>>>()?;
            quote!(Self(#(#injections),*))
        }
        Fields::Unit => quote!(Self),
    };

    Ok(quote! {
        impl #impl_generics ::trellis::di::Injectable for #struct_name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn inject(
                injector: &mut ::trellis::di::Injector<'_>
            ) -> ::trellis::Result<Self> {
                ::core::result::Result::Ok(#body)
            }
        }
    })
}

/// Expression producing one field's value.
fn field_injection(field: &Field) -> syn::Result<TokenStream2> {
    let lookup = has_lookup_attr(field)?;

    if let Some(inner) = generic_arg(&field.ty, "Option").and_then(|ty| generic_arg(ty, "Arc")) {
        return Ok(match inner {
            Type::TraitObject(_) => quote! {
                injector
                    .optional::<::std::sync::Arc<#inner>>()?
                    .map(|shared| ::std::sync::Arc::clone(&*shared))
            },
            _ => quote!(injector.optional::<#inner>()?),
        });
    }

    if let Some(inner) = generic_arg(&field.ty, "Arc") {
        return Ok(match inner {
            Type::TraitObject(_) => quote! {
                ::std::sync::Arc::clone(&*injector.lookup::<::std::sync::Arc<#inner>>()?)
            },
            _ if lookup => quote!(injector.lookup::<#inner>()?),
            _ => quote!(injector.get::<#inner>()?),
        });
    }

    if lookup {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "#[inject(lookup)] requires an Arc<T> field",
        ));
    }
    Ok(quote!(::core::default::Default::default()))
}

fn has_lookup_attr(field: &Field) -> syn::Result<bool> {
    let mut lookup = false;
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("lookup") {
                lookup = true;
                Ok(())
            } else {
                Err(meta.error("unsupported inject option, expected `lookup`"))
            }
        })?;
    }
    Ok(lookup)
}

/// `T` when `ty` is `Wrapper<T>` (matched on the last path segment).
fn generic_arg<'t>(ty: &'t Type, wrapper: &str) -> Option<&'t Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
