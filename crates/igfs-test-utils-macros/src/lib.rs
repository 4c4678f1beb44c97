// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `#[logged_test]`: wraps a test in an [`igfs_test_utils::TestLoggerGuard`].
//!
//! The wrapped body sees a `logger` binding (`&mut TestLogger`) and the log
//! file is finalized as passed or failed when the test returns or panics.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemFn, ReturnType, Type};

/// Attribute macro for synchronous tests.
///
/// ```rust,ignore
/// #[igfs_test_utils::logged_test]
/// fn handshake_succeeds() {
///     logger.log("connecting").unwrap();
/// }
/// ```
#[proc_macro_attribute]
pub fn logged_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(Span::call_site(), "#[logged_test] does not accept arguments")
            .to_compile_error()
            .into();
    }

    let input = parse_macro_input!(item as ItemFn);

    if let Some(async_token) = &input.sig.asyncness {
        return syn::Error::new(
            async_token.span(),
            "#[logged_test] cannot be applied to async functions",
        )
        .to_compile_error()
        .into();
    }

    if !input.sig.inputs.is_empty() {
        return syn::Error::new(
            input.sig.ident.span(),
            "#[logged_test] can only be applied to functions without parameters",
        )
        .to_compile_error()
        .into();
    }

    expand(input).into()
}

fn expand(mut input: ItemFn) -> TokenStream2 {
    input.attrs.retain(|attr| !attr.path().is_ident("logged_test"));

    let fn_ident = &input.sig.ident;
    let fn_name = fn_ident.to_string();
    let visibility = &input.vis;
    let generics = &input.sig.generics;
    let block = &input.block;
    let other_attrs = &input.attrs;

    let (return_tokens, finish) = match &input.sig.output {
        ReturnType::Default => (quote! {}, finish_unit()),
        ReturnType::Type(arrow, ty) if is_result_type(ty) => (quote! { #arrow #ty }, finish_result()),
        ReturnType::Type(arrow, ty) => (quote! { #arrow #ty }, finish_value()),
    };

    quote! {
        #[::core::prelude::v1::test]
        #(#other_attrs)*
        #visibility fn #fn_ident #generics () #return_tokens {
            let mut __guard = ::igfs_test_utils::TestLoggerGuard::new(#fn_name)
                .expect("failed to create TestLogger");
            let mut logger = __guard.logger();
            let _ = &mut logger;

            let inner_result = { #block };
            drop(logger);
            #finish
        }
    }
}

fn is_result_type(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Result"),
        _ => false,
    }
}

fn finish_unit() -> TokenStream2 {
    quote! {
        let _ = inner_result;
        if let Err(e) = __guard.finish_success() {
            panic!("failed to finalize TestLogger: {}", e);
        }
    }
}

fn finish_result() -> TokenStream2 {
    quote! {
        match inner_result {
            ::std::result::Result::Ok(value) => {
                if let Err(e) = __guard.finish_success() {
                    panic!("failed to finalize TestLogger: {}", e);
                }
                ::std::result::Result::Ok(value)
            }
            ::std::result::Result::Err(err) => {
                let __err_msg = format!("{}", err);
                if let Err(e) = __guard.finish_failure(&__err_msg) {
                    eprintln!("failed to finalize TestLogger after error: {}", e);
                }
                ::std::result::Result::Err(err)
            }
        }
    }
}

fn finish_value() -> TokenStream2 {
    quote! {
        let value = inner_result;
        if let Err(e) = __guard.finish_success() {
            panic!("failed to finalize TestLogger: {}", e);
        }
        value
    }
}
