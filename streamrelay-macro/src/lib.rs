//! Procedural macros for streamrelay.
//!
//! `#[streaming_handler]` turns an `async fn` with the handler signature
//! into a unit struct implementing `StreamingHandler`.
//!
//! # Example
//!
//! ```ignore
//! use streamrelay::prelude::*;
//!
//! #[streaming_handler(name = "ticker")]
//! async fn ticker(
//!     event: InvocationEvent,
//!     response: &mut dyn ResponseSink,
//!     ctx: &InvocationContext,
//!     callback: Option<CompletionCallback>,
//! ) -> Result<(), HandlerError> {
//!     response.write(b"tick")?;
//!     Ok(())
//! }
//!
//! // Generates `TickerHandler`.
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, ExprLit, ItemFn, Lit, Meta, Token,
};

/// Number of arguments a handler function takes: event, response, context
/// and completion callback.
const HANDLER_ARITY: usize = 4;

#[derive(Default, Debug)]
struct HandlerAttrs {
    /// Registered handler name; defaults to the function name.
    name: Option<String>,
}

impl HandlerAttrs {
    fn parse_meta_list(metas: Punctuated<Meta, Token![,]>) -> syn::Result<Self> {
        let mut attrs = HandlerAttrs::default();

        for meta in metas {
            let nv = match meta {
                Meta::NameValue(nv) => nv,
                other => return Err(syn::Error::new_spanned(other, "expected name = value")),
            };

            let ident = nv
                .path
                .get_ident()
                .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected identifier"))?
                .to_string();

            match (ident.as_str(), &nv.value) {
                ("name", Expr::Lit(ExprLit { lit: Lit::Str(lit_str), .. })) => {
                    attrs.name = Some(lit_str.value());
                }
                ("name", other) => {
                    return Err(syn::Error::new_spanned(other, "expected string literal"));
                }
                _ => {
                    return Err(syn::Error::new_spanned(
                        &nv.path,
                        format!("unknown attribute: {}", ident),
                    ));
                }
            }
        }

        Ok(attrs)
    }
}

/// Generate a `StreamingHandler` implementation from an async function.
///
/// The function must be `async` and take `(InvocationEvent, &mut dyn
/// ResponseSink, &InvocationContext, Option<CompletionCallback>)`, returning
/// `Result<(), HandlerError>`. The generated struct is named after the
/// function in PascalCase with a `Handler` suffix.
///
/// # Attributes
///
/// - `name` (optional): handler name reported by `StreamingHandler::name`
#[proc_macro_attribute]
pub fn streaming_handler(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_handler(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_handler(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = HandlerAttrs::parse_meta_list(args)?;

    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input_fn.sig,
            "streaming_handler must be async",
        ));
    }
    if input_fn.sig.inputs.len() != HANDLER_ARITY {
        return Err(syn::Error::new_spanned(
            &input_fn.sig.inputs,
            "streaming_handler expects (event, response, ctx, callback)",
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let handler_name = attrs.name.unwrap_or_else(|| fn_name.to_string());
    let struct_name = format_ident!("{}Handler", to_pascal_case(&fn_name.to_string()));

    Ok(quote! {
        /// Generated streaming handler.
        #[derive(Debug, Default, Clone, Copy)]
        #fn_vis struct #struct_name;

        #[allow(dead_code)]
        impl #struct_name {
            pub fn new() -> Self {
                Self
            }
        }

        #[::streamrelay::prelude::async_trait]
        impl ::streamrelay::prelude::StreamingHandler for #struct_name {
            async fn handle(
                &self,
                event: ::streamrelay::prelude::InvocationEvent,
                response: &mut dyn ::streamrelay::prelude::ResponseSink,
                ctx: &::streamrelay::prelude::InvocationContext,
                callback: ::std::option::Option<::streamrelay::prelude::CompletionCallback>,
            ) -> ::std::result::Result<(), ::streamrelay::prelude::HandlerError> {
                #fn_name(event, response, ctx, callback).await
            }

            fn name(&self) -> &str {
                #handler_name
            }
        }

        #input_fn
    })
}

/// Convert a snake_case string to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
