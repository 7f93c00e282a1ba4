// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! `#[derive(Schema)]` turns a plain struct into a structured log event: every
//! named field becomes a `(key, value)` pair that the logger can serialize as
//! JSON or render as `key=value` text, without hand-writing the boilerplate at
//! every call site.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

#[proc_macro_derive(Schema)]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(named) => named.named,
            _ => panic!("Schema can only be derived for structs with named fields"),
        },
        _ => panic!("Schema can only be derived for structs"),
    };

    let entries = fields.iter().map(|f| {
        let ident = f.ident.as_ref().expect("named field");
        let key = ident.to_string();
        quote! {
            (#key, ::serde_json::to_value(&self.#ident).unwrap_or(::serde_json::Value::Null))
        }
    });

    let expanded = quote! {
        impl #name {
            pub fn schema(&self) -> Vec<(&'static str, ::serde_json::Value)> {
                vec![#(#entries),*]
            }
        }
    };

    expanded.into()
}
