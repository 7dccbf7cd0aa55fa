//! Shared argument and signature parsing.

use syn::{
    FnArg, GenericArgument, Ident, ItemFn, LitStr, PathArguments, Token, Type,
    parse::{Parse, ParseStream},
};

/// Arguments accepted by both attributes.
pub(crate) struct MacroArgs {
    pub name: Option<String>,
}

impl Parse for MacroArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut name = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "name" => {
                    let lit: LitStr = input.parse()?;
                    name = Some(lit.value());
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(MacroArgs { name })
    }
}

/// Check the function is async and takes exactly two typed arguments.
pub(crate) fn two_args<'a>(input: &'a ItemFn, what: &str) -> syn::Result<(&'a Type, &'a Type)> {
    if input.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            input.sig.fn_token,
            format!("{what} function must be async"),
        ));
    }
    if !input.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.sig.generics,
            format!("{what} function must not be generic"),
        ));
    }

    let mut typed = input.sig.inputs.iter().map(|arg| match arg {
        FnArg::Typed(pat_type) => Ok(&*pat_type.ty),
        FnArg::Receiver(receiver) => Err(syn::Error::new_spanned(
            receiver,
            format!("{what} function must not take self"),
        )),
    });

    match (typed.next(), typed.next(), typed.next()) {
        (Some(ctx), Some(event), None) => Ok((ctx?, event?)),
        _ => Err(syn::Error::new_spanned(
            &input.sig.inputs,
            format!("{what} function must take exactly two arguments: (context, event)"),
        )),
    }
}

/// Strip one level of `&`, or fail with `message`.
pub(crate) fn referent<'a>(ty: &'a Type, message: &str) -> syn::Result<&'a Type> {
    match ty {
        Type::Reference(reference) => Ok(&reference.elem),
        other => Err(syn::Error::new_spanned(other, message)),
    }
}

/// Extract `B` from `Context<B>`.
pub(crate) fn context_client(ty: &Type) -> syn::Result<&Type> {
    let error = || syn::Error::new_spanned(ty, "expected `Context<B>` for the context argument");

    let Type::Path(path) = ty else {
        return Err(error());
    };
    let segment = path.path.segments.last().ok_or_else(error)?;
    if segment.ident != "Context" {
        return Err(error());
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return Err(error());
    };
    match args.args.first() {
        Some(GenericArgument::Type(client)) if args.args.len() == 1 => Ok(client),
        _ => Err(error()),
    }
}
