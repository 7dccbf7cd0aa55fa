//! `#[filter]`.

use crate::args::{MacroArgs, context_client, referent, two_args};
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemFn, parse_macro_input};

pub fn filter_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as MacroArgs);
    let input = parse_macro_input!(item as ItemFn);

    match expand(args, input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(args: MacroArgs, input: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let (ctx_ty, event_ty) = two_args(&input, "Filter")?;
    let ctx_ty = referent(ctx_ty, "Filter context argument must be a reference (&Context<B>)")?;
    let event_ty = referent(event_ty, "Filter event argument must be a reference (&Event)")?;
    let client = context_client(ctx_ty)?;

    let fn_name = &input.sig.ident;
    let fn_vis = &input.vis;
    let name = args.name.unwrap_or_else(|| fn_name.to_string());

    let mut body = input.clone();
    body.sig.ident = format_ident!("__courier_filter_body");
    body.vis = syn::Visibility::Inherited;
    body.attrs.retain(|attr| !attr.path().is_ident("doc"));
    let docs = input.attrs.iter().filter(|attr| attr.path().is_ident("doc"));

    Ok(quote! {
        #(#docs)*
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, Default)]
        #fn_vis struct #fn_name;

        impl ::courier::Filter<#client, #event_ty> for #fn_name {
            async fn test(
                &self,
                __ctx: &::courier::Context<#client>,
                __event: &#event_ty,
            ) -> ::core::result::Result<bool, ::courier::BoxError> {
                #body
                ::courier::IntoFilterResult::into_filter_result(
                    __courier_filter_body(__ctx, __event).await,
                )
            }

            fn name(&self) -> &str {
                #name
            }
        }
    })
}
