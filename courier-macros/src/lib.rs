//! Procedural macros for Courier.
//!
//! - `#[filter]` turns an `async fn(&Context<B>, &E) -> bool` into a filter.
//! - `#[handler]` turns an `async fn(Context<B>, E)` into a handler.
//!
//! Both generate a unit struct named after the function, so the function
//! name can be passed straight to `HandlerEntry::with_filter` or
//! `HandlerEntry::new`.

use proc_macro::TokenStream;

mod args;
mod filter;
mod handler;

/// Turn an async predicate into a `Filter` implementation.
///
/// ```rust,ignore
/// #[courier::filter]
/// async fn is_admin(ctx: &Context<Bot>, msg: &ChatMessage) -> bool {
///     msg.from.as_ref().is_some_and(|user| ctx.bot().admins.contains(&user.id))
/// }
/// ```
///
/// The function may return `bool` or `Result<bool, E>`. An optional
/// `name = "..."` argument overrides the name used in logs.
#[proc_macro_attribute]
pub fn filter(attr: TokenStream, item: TokenStream) -> TokenStream {
    filter::filter_impl(attr, item)
}

/// Turn an async function into a `Handler` implementation.
///
/// ```rust,ignore
/// #[courier::handler(name = "greeter")]
/// async fn greet(ctx: Context<Bot>, msg: ChatMessage) -> Result<(), BoxError> {
///     ctx.bot().send_text(msg.chat.id, "hello").await?;
///     Ok(())
/// }
/// ```
///
/// The function may return `()` or `Result<(), E>`. The generated struct
/// carries the handler name as `NAME`.
#[proc_macro_attribute]
pub fn handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    handler::handler_impl(attr, item)
}
