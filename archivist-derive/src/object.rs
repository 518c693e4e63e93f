// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{parse_quote, Data, DataEnum, DeriveInput, Fields, FieldsNamed};

use crate::attrs::parse_archive_meta;

pub fn derive_archived(input: &DeriveInput) -> syn::Result<TokenStream> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => derive_struct(input, fields),
            Fields::Unit => derive_struct(input, &parse_quote!({})),
            Fields::Unnamed(_) => Err(syn::Error::new_spanned(
                &input.ident,
                "Archived needs named fields; implement Serialize by hand for tuple structs",
            )),
        },
        Data::Enum(data) => derive_enum(input, data),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "Archived cannot be derived for unions",
        )),
    }
}

fn derive_struct(input: &DeriveInput, fields: &FieldsNamed) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let mut generics = input.generics.clone();
    let params: Vec<_> = generics.type_params().map(|p| p.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for param in params {
        where_clause
            .predicates
            .push(parse_quote!(#param: ::archivist_core::serializer::Serialize));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut visits = Vec::new();
    for field in &fields.named {
        let meta = parse_archive_meta(&field.attrs)?;
        if meta.skip {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        let field_name = meta.name_or(ident);
        let alt = meta.alt_or_empty();
        visits.push(quote! {
            ::archivist_core::serializer::Serialize::serialize(
                &mut self.#ident, ar, #field_name, #alt,
            )?;
        });
    }

    Ok(quote! {
        impl #impl_generics ::archivist_core::serializer::SerializeFields for #name #ty_generics #where_clause {
            fn serialize_fields(
                &mut self,
                ar: &mut dyn ::archivist_core::archive::Archive,
            ) -> ::std::result::Result<(), ::archivist_core::error::Error> {
                #(#visits)*
                Ok(())
            }
        }

        impl #impl_generics ::archivist_core::serializer::Serialize for #name #ty_generics #where_clause {
            fn serialize(
                &mut self,
                ar: &mut dyn ::archivist_core::archive::Archive,
                name: &str,
                name_alt: &str,
            ) -> ::std::result::Result<bool, ::archivist_core::error::Error> {
                ::archivist_core::serializer::serialize_struct(self, ar, name, name_alt)
            }
        }
    })
}

fn derive_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Archived enums cannot be generic",
        ));
    }
    let enum_meta = parse_archive_meta(&input.attrs)?;
    let ignore_errors = enum_meta.ignore_errors;
    let type_name = enum_meta.name_or(name);

    let mut idents = Vec::new();
    let mut names = Vec::new();
    let mut alts = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Archived enums must be fieldless",
            ));
        }
        let meta = parse_archive_meta(&variant.attrs)?;
        names.push(meta.name_or(&variant.ident));
        alts.push(meta.alt_or_empty());
        idents.push(&variant.ident);
    }

    Ok(quote! {
        impl ::archivist_core::serializer::ArchiveEnum for #name {
            fn to_value(self) -> i32 {
                self as i32
            }

            fn from_value(value: i32) -> ::std::option::Option<Self> {
                #(
                    if value == #name::#idents as i32 {
                        return ::std::option::Option::Some(#name::#idents);
                    }
                )*
                ::std::option::Option::None
            }

            fn descriptor() -> ::archivist_core::registry::EnumDescriptor {
                ::archivist_core::registry::EnumDescriptor::new(#type_name)
                    .ignore_errors(#ignore_errors)
                    #(.with(#name::#idents as i32, #names, #alts))*
            }
        }

        impl ::archivist_core::serializer::Serialize for #name {
            fn serialize(
                &mut self,
                ar: &mut dyn ::archivist_core::archive::Archive,
                name: &str,
                name_alt: &str,
            ) -> ::std::result::Result<bool, ::archivist_core::error::Error> {
                ::archivist_core::serializer::enum_::serialize_enum(self, ar, name, name_alt)
            }
        }
    })
}
