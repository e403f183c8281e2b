use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;
use syn::{
    Attribute, Error, Expr, FnArg, GenericArgument, Ident, ImplItem, ImplItemFn, ItemImpl, LitStr,
    Meta, Path, PathArguments, Token, Type,
};

/// Expands the `#[bindings]` attribute macro.
///
/// The impl block is re-emitted without the `#[subscriber]` markers, followed by a
/// `Bindings` implementation listing every declaration in source order: bases first, then
/// subscribers, then publisher slots.
pub fn expand_bindings(args: TokenStream, mut input: ItemImpl) -> TokenStream {
    let args = match syn::parse2::<BlockArgs>(args) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error(),
    };

    if let Some((_, path, _)) = &input.trait_ {
        return Error::new_spanned(path, "#[bindings] must be placed on an inherent impl block")
            .to_compile_error();
    }

    let subscribers = match collect_subscribers(&mut input) {
        Ok(subscribers) => subscribers,
        Err(err) => return err.to_compile_error(),
    };

    let krate = &args.krate;
    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    let bases = args.bases.iter().map(|Base { field, ty }| {
        quote_spanned! {field.span()=>
            builder.extend::<#ty>(stringify!(#field), |this| &this.#field);
        }
    });
    let subscriber_decls = subscribers.iter().map(|s| s.declaration(krate));
    let publishers = args.publishers.iter().map(|field| {
        quote_spanned! {field.span()=>
            builder.publisher(stringify!(#field), |this| &this.#field);
        }
    });

    quote! {
        #input

        #[automatically_derived]
        impl #impl_generics #krate::Bindings for #self_ty #where_clause {
            fn bindings<Root>(builder: &mut #krate::BindingBuilder<Self, Root>)
            where
                Root: ::std::marker::Send + ::std::marker::Sync + 'static,
            {
                #(#bases)*
                #(#subscriber_decls)*
                #(#publishers)*
            }
        }
    }
}

/// A `extends(field: Type)` declaration.
struct Base {
    field: Ident,
    ty: Type,
}

struct BlockArgs {
    krate: Path,
    publishers: Vec<Ident>,
    bases: Vec<Base>,
}

impl Parse for BlockArgs {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        let mut krate = None;
        let mut publishers = Vec::new();
        let mut bases = Vec::new();
        let mut seen = FxHashSet::default();

        while !input.is_empty() {
            let key = Ident::parse_any(input)?;
            match key.to_string().as_str() {
                "publisher" => {
                    input.parse::<Token![=]>()?;
                    let field: Ident = input.parse()?;
                    if !seen.insert(field.to_string()) {
                        return Err(Error::new_spanned(field, "Field is declared more than once"));
                    }
                    publishers.push(field);
                },
                "extends" => {
                    let content;
                    syn::parenthesized!(content in input);
                    let field: Ident = content.parse()?;
                    content.parse::<Token![:]>()?;
                    let ty: Type = content.parse()?;
                    if !seen.insert(field.to_string()) {
                        return Err(Error::new_spanned(field, "Field is declared more than once"));
                    }
                    bases.push(Base { field, ty });
                },
                "crate" => {
                    input.parse::<Token![=]>()?;
                    let lit: LitStr = input.parse()?;
                    if krate.is_some() {
                        return Err(Error::new_spanned(lit, "Duplicate argument"));
                    }
                    krate = Some(lit.parse_with(Path::parse_mod_style)?);
                },
                _ => {
                    return Err(Error::new_spanned(
                        key,
                        "Unsupported argument; expected publisher, extends or crate",
                    ));
                },
            }

            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        Ok(Self { krate: krate.unwrap_or_else(|| syn::parse_quote!(::tidings)), publishers, bases })
    }
}

struct Subscriber {
    method: Ident,
    event: Type,
    order: Option<Expr>,
    asyncness: bool,
}

impl Subscriber {
    fn declaration(&self, krate: &Path) -> TokenStream {
        let Self { method, event, order, asyncness } = self;
        let order = order.as_ref().map_or_else(
            || quote! { #krate::DEFAULT_ORDER },
            |expr| quote! { { let order: i32 = #expr; order } },
        );

        let body = if *asyncness {
            quote! {
                ::std::boxed::Box::pin(async move {
                    #krate::HandlerOutput::into_result(this.#method(event).await)
                })
            }
        } else {
            quote! {
                let output = #krate::HandlerOutput::into_result(this.#method(event));
                ::std::boxed::Box::pin(::std::future::ready(output))
            }
        };

        quote_spanned! {method.span()=>
            builder.subscriber::<#event>(
                stringify!(#method),
                #order,
                |this: ::std::sync::Arc<Self>, event: ::std::sync::Arc<#event>| -> #krate::Completion {
                    #body
                },
            );
        }
    }
}

fn collect_subscribers(input: &mut ItemImpl) -> syn::Result<Vec<Subscriber>> {
    let mut subscribers = Vec::new();

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else { continue };

        let mut markers = Vec::new();
        method.attrs.retain(|attr| {
            if attr.path().is_ident("subscriber") {
                markers.push(attr.clone());
                false
            } else {
                true
            }
        });

        match markers.as_slice() {
            [] => {},
            [marker] => subscribers.push(inspect_subscriber(method, marker)?),
            [_, duplicate, ..] => {
                return Err(Error::new_spanned(duplicate, "Duplicate #[subscriber] marker"));
            },
        }
    }

    Ok(subscribers)
}

fn inspect_subscriber(method: &ImplItemFn, marker: &Attribute) -> syn::Result<Subscriber> {
    let sig = &method.sig;

    if !sig.generics.params.is_empty() {
        return Err(Error::new_spanned(&sig.generics, "Subscriber methods cannot be generic"));
    }

    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {},
        _ => {
            return Err(Error::new_spanned(
                &sig.ident,
                "Subscriber methods must take `&self` as their receiver",
            ));
        },
    }

    let params: Vec<_> = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat) => Some(pat),
            FnArg::Receiver(_) => None,
        })
        .collect();

    let [param] = params.as_slice() else {
        let message =
            format!("Subscriber methods take exactly one event parameter, found {}", params.len());
        return Err(match params.get(1) {
            Some(extra) => Error::new_spanned(extra, message),
            None => Error::new(sig.ident.span(), message),
        });
    };

    let event = arc_inner(&param.ty).ok_or_else(|| {
        Error::new_spanned(&param.ty, "Subscriber event parameter must be `Arc<Event>`")
    })?;

    Ok(Subscriber {
        method: sig.ident.clone(),
        event: event.clone(),
        order: parse_order(marker)?,
        asyncness: sig.asyncness.is_some(),
    })
}

/// Accepts `#[subscriber]`, `#[subscriber(3)]` and `#[subscriber(order = 3)]`.
fn parse_order(marker: &Attribute) -> syn::Result<Option<Expr>> {
    match &marker.meta {
        Meta::Path(_) => Ok(None),
        Meta::List(list) => list
            .parse_args_with(|input: ParseStream<'_>| {
                if input.peek(Ident) && input.peek2(Token![=]) {
                    let key: Ident = input.parse()?;
                    if key != "order" {
                        return Err(Error::new_spanned(key, "Unsupported argument; expected order"));
                    }
                    input.parse::<Token![=]>()?;
                }
                let expr: Expr = input.parse()?;
                if !input.is_empty() {
                    return Err(input.error("Unexpected tokens after the subscriber order"));
                }
                Ok(expr)
            })
            .map(Some),
        Meta::NameValue(name_value) => Err(Error::new_spanned(
            name_value,
            "Expected `#[subscriber]` or `#[subscriber(order = N)]`",
        )),
    }
}

fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.iter().collect::<Vec<_>>().as_slice() {
        [GenericArgument::Type(inner)] => Some(inner),
        _ => None,
    }
}
