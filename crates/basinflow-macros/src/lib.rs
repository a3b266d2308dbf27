use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derive macro that renders a struct as an ordered list of `key=value[unit]`
/// lines, the flat format read by the NextGen BMI sub-models.
///
/// Fields are emitted in declaration order. `Option` fields are skipped when
/// `None`. Every field type must implement `basinflow_core::config_file::ConfigValue`.
///
/// Use `#[config(key = "soil_params.b", unit = "[]")]` on a field to override
/// the emitted key (default: the field name) and append a unit suffix.
#[proc_macro_derive(ConfigLines, attributes(config))]
pub fn derive_config_lines(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "ConfigLines can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "ConfigLines can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    if fields.is_empty() {
        return syn::Error::new_spanned(name, "ConfigLines struct must have at least one field")
            .to_compile_error()
            .into();
    }

    let mut keys = Vec::new();
    let mut pushes = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let attr = match FieldAttr::parse(field) {
            Ok(attr) => attr,
            Err(err) => return err.to_compile_error().into(),
        };
        let key = attr.key.unwrap_or_else(|| ident.to_string());
        let unit = attr.unit.unwrap_or_default();

        let push = if is_option_type(&field.ty) {
            quote! {
                if let Some(value) = &self.#ident {
                    lines.push(format!(
                        "{}={}{}",
                        #key,
                        ::basinflow_core::config_file::ConfigValue::render(value),
                        #unit
                    ));
                }
            }
        } else {
            quote! {
                lines.push(format!(
                    "{}={}{}",
                    #key,
                    ::basinflow_core::config_file::ConfigValue::render(&self.#ident),
                    #unit
                ));
            }
        };
        keys.push(key);
        pushes.push(push);
    }

    let n_fields = keys.len();

    let expanded = quote! {
        impl ::basinflow_core::config_file::ConfigLines for #name {
            fn keys() -> &'static [&'static str] {
                &[#(#keys),*]
            }

            fn lines(&self) -> Vec<String> {
                let mut lines = Vec::with_capacity(#n_fields);
                #(#pushes)*
                lines
            }
        }
    };

    expanded.into()
}

#[derive(Default)]
struct FieldAttr {
    key: Option<String>,
    unit: Option<String>,
}

impl FieldAttr {
    fn parse(field: &syn::Field) -> syn::Result<Self> {
        let mut out = FieldAttr::default();
        for attr in &field.attrs {
            if !attr.path().is_ident("config") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("key") {
                    let lit: LitStr = meta.value()?.parse()?;
                    out.key = Some(lit.value());
                    Ok(())
                } else if meta.path.is_ident("unit") {
                    let lit: LitStr = meta.value()?.parse()?;
                    out.unit = Some(lit.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `key` or `unit`"))
                }
            })?;
        }
        Ok(out)
    }
}

fn is_option_type(ty: &syn::Type) -> bool {
    if let syn::Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option")
    } else {
        false
    }
}
