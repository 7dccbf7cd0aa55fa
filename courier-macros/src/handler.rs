//! `#[handler]`.

use crate::args::{MacroArgs, context_client, two_args};
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemFn, Type, parse_macro_input};

pub fn handler_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as MacroArgs);
    let input = parse_macro_input!(item as ItemFn);

    match expand(args, input) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(args: MacroArgs, input: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let (ctx_ty, event_ty) = two_args(&input, "Handler")?;
    if let Type::Reference(reference) = event_ty {
        return Err(syn::Error::new_spanned(
            reference,
            "Handler event argument must be owned (Event, not &Event)",
        ));
    }
    let client = context_client(ctx_ty)?;

    let fn_name = &input.sig.ident;
    let fn_vis = &input.vis;
    let name = args.name.unwrap_or_else(|| fn_name.to_string());

    let mut body = input.clone();
    body.sig.ident = format_ident!("__courier_handler_body");
    body.vis = syn::Visibility::Inherited;
    body.attrs.retain(|attr| !attr.path().is_ident("doc"));
    let docs = input.attrs.iter().filter(|attr| attr.path().is_ident("doc"));

    Ok(quote! {
        #(#docs)*
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, Default)]
        #fn_vis struct #fn_name;

        impl #fn_name {
            /// Name used when registering this handler.
            pub const NAME: &'static str = #name;
        }

        impl ::courier::Handler<#client, #event_ty> for #fn_name {
            async fn handle(
                &self,
                __ctx: ::courier::Context<#client>,
                __event: #event_ty,
            ) -> ::core::result::Result<(), ::courier::BoxError> {
                #body
                ::courier::HandlerResult::into_result(__courier_handler_body(__ctx, __event).await)
            }
        }
    })
}
