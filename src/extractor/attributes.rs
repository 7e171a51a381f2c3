//! Parsing of generator attributes (`#[path("/people")]`, `#[response(201, "Created", Person)]`,
//! `#[query_param("q", collection_format = "csv")]`, ...) and of doc-comment tags.

use crate::declaration::{
    Annotation, BindingRole, DateKind, HttpVerb, NumericKind, ResponseDecl,
};
use crate::extractor::types::lower_type;
use log::{debug, warn};
use serde_json::Value;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{bracketed, Attribute, Lit, Meta, Token};

/// One argument of a generator attribute
#[derive(Debug, Clone)]
pub enum AttrArg {
    Lit(Lit),
    /// `-1`, `-2.5`
    Negative(Lit),
    Array(Vec<AttrArg>),
    Named(syn::Ident, Box<AttrArg>),
    Type(syn::Type),
}

impl Parse for AttrArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(Token![-]) {
            input.parse::<Token![-]>()?;
            return Ok(AttrArg::Negative(input.parse()?));
        }
        if input.peek(Lit) {
            return Ok(AttrArg::Lit(input.parse()?));
        }
        if input.peek(syn::token::Bracket) {
            let content;
            bracketed!(content in input);
            let items = Punctuated::<AttrArg, Token![,]>::parse_terminated(&content)?;
            return Ok(AttrArg::Array(items.into_iter().collect()));
        }
        if input.peek(syn::Ident) && input.peek2(Token![=]) {
            let name: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            return Ok(AttrArg::Named(name, Box::new(input.parse()?)));
        }
        Ok(AttrArg::Type(input.parse()?))
    }
}

impl AttrArg {
    /// String content of a string literal, or the text of a bare identifier-like type.
    pub fn as_string(&self) -> Option<String> {
        match self {
            AttrArg::Lit(Lit::Str(s)) => Some(s.value()),
            AttrArg::Lit(Lit::Int(i)) => Some(i.base10_digits().to_string()),
            _ => None,
        }
    }

    /// Literal value as JSON; arrays recurse.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            AttrArg::Lit(lit) => lit_to_value(lit, false),
            AttrArg::Negative(lit) => lit_to_value(lit, true),
            AttrArg::Array(items) => items.iter().map(AttrArg::to_value).collect::<Option<_>>().map(Value::Array),
            AttrArg::Named(_, _) | AttrArg::Type(_) => None,
        }
    }

    /// A string literal holding JSON is parsed; anything else is taken literally.
    pub fn to_example(&self) -> Option<Value> {
        match self {
            AttrArg::Lit(Lit::Str(s)) => {
                let text = s.value();
                Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
            }
            other => other.to_value(),
        }
    }

    /// Strings of a single string or of an array of strings.
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            AttrArg::Array(items) => items.iter().filter_map(AttrArg::as_string).collect(),
            other => other.as_string().into_iter().collect(),
        }
    }
}

fn lit_to_value(lit: &Lit, negative: bool) -> Option<Value> {
    let sign = if negative { "-" } else { "" };
    match lit {
        Lit::Str(s) if !negative => Some(Value::String(s.value())),
        Lit::Bool(b) if !negative => Some(Value::Bool(b.value)),
        Lit::Int(i) => format!("{}{}", sign, i.base10_digits())
            .parse::<i64>()
            .ok()
            .map(Value::from),
        Lit::Float(f) => format!("{}{}", sign, f.base10_digits())
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

/// Parsed arguments of one attribute: positional arguments plus `name = value` pairs.
#[derive(Debug, Default)]
pub struct AttrArgs {
    pub positional: Vec<AttrArg>,
    pub named: Vec<(String, AttrArg)>,
}

impl AttrArgs {
    /// Parses the arguments of `attr`; `#[x]` has none, `#[x = "v"]` has one positional.
    pub fn from_attribute(attr: &Attribute) -> syn::Result<Self> {
        let mut args = AttrArgs::default();
        match &attr.meta {
            Meta::Path(_) => {}
            Meta::NameValue(name_value) => {
                if let syn::Expr::Lit(expr) = &name_value.value {
                    args.positional.push(AttrArg::Lit(expr.lit.clone()));
                }
            }
            Meta::List(_) => {
                let parsed =
                    attr.parse_args_with(Punctuated::<AttrArg, Token![,]>::parse_terminated)?;
                for arg in parsed {
                    match arg {
                        AttrArg::Named(name, value) => args.named.push((name.to_string(), *value)),
                        other => args.positional.push(other),
                    }
                }
            }
        }
        Ok(args)
    }

    pub fn first_string(&self) -> Option<String> {
        self.positional.first().and_then(AttrArg::as_string)
    }

    pub fn named(&self, name: &str) -> Option<&AttrArg> {
        self.named
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// All positional strings, flattening arrays.
    pub fn strings(&self) -> Vec<String> {
        self.positional.iter().flat_map(AttrArg::as_strings).collect()
    }
}

/// Result of reading the generator attributes of one item
#[derive(Debug, Default)]
pub struct LoweredAttributes {
    pub annotations: Vec<Annotation>,
    /// `default = ...` given on a parameter binding
    pub default: Option<Value>,
    /// `#[extends(Base<T>)]`
    pub extends: Vec<syn::Type>,
}

/// Attribute name, i.e. the last path segment.
pub fn attribute_name(attr: &Attribute) -> Option<String> {
    attr.path().segments.last().map(|s| s.ident.to_string())
}

/// Lowers every recognised generator attribute in `attrs` into annotations.
///
/// Malformed arguments of a recognised attribute are reported as an error message.
pub fn lower_attributes(attrs: &[Attribute]) -> Result<LoweredAttributes, String> {
    let mut lowered = LoweredAttributes::default();
    for attr in attrs {
        let Some(name) = attribute_name(attr) else {
            continue;
        };
        if !is_generator_attribute(&name) {
            continue;
        }
        let args = AttrArgs::from_attribute(attr)
            .map_err(|e| format!("invalid #[{}] attribute: {}", name, e))?;
        debug!("Lowering attribute #[{}]", name);
        lower_attribute(&name, &args, &mut lowered)?;
    }
    Ok(lowered)
}

fn is_generator_attribute(name: &str) -> bool {
    HttpVerb::from_name(name).is_some()
        || binding_role(name).is_some()
        || matches!(
            name,
            "path"
                | "hidden"
                | "is_int"
                | "is_long"
                | "is_float"
                | "is_double"
                | "is_date"
                | "is_date_time"
                | "enum_values"
                | "consumes"
                | "produces"
                | "accept"
                | "tags"
                | "security"
                | "response"
                | "example"
                | "summary"
                | "deprecated"
                | "extends"
        )
}

fn binding_role(name: &str) -> Option<BindingRole> {
    let role = match name {
        "path_param" => BindingRole::Path,
        "query_param" => BindingRole::Query,
        "header_param" => BindingRole::Header,
        "form_param" => BindingRole::Form,
        "file_param" => BindingRole::File,
        "files_param" => BindingRole::Files,
        "param" => BindingRole::Param,
        "cookie_param" => BindingRole::Cookie,
        "context" | "context_request" | "context_response" | "context_next"
        | "context_language" | "context_accept" => BindingRole::Context,
        _ => return None,
    };
    Some(role)
}

fn lower_attribute(name: &str, args: &AttrArgs, lowered: &mut LoweredAttributes) -> Result<(), String> {
    let annotations = &mut lowered.annotations;

    if let Some(verb) = HttpVerb::from_name(name) {
        annotations.push(Annotation::Verb(verb));
        if let Some(path) = args.first_string() {
            annotations.push(Annotation::Path(path));
        }
        return Ok(());
    }

    if let Some(role) = binding_role(name) {
        annotations.push(Annotation::Binding {
            role,
            name: args.first_string(),
            collection_format: args.named("collection_format").and_then(AttrArg::as_string),
        });
        if let Some(default) = args.named("default") {
            lowered.default = default.to_value();
        }
        return Ok(());
    }

    match name {
        "path" => annotations.push(Annotation::Path(args.first_string().unwrap_or_default())),
        "hidden" => annotations.push(Annotation::Hidden),
        "deprecated" => annotations.push(Annotation::Deprecated),
        "is_int" => annotations.push(Annotation::Numeric(NumericKind::Int)),
        "is_long" => annotations.push(Annotation::Numeric(NumericKind::Long)),
        "is_float" => annotations.push(Annotation::Numeric(NumericKind::Float)),
        "is_double" => annotations.push(Annotation::Numeric(NumericKind::Double)),
        "is_date" => annotations.push(Annotation::DateFormat(DateKind::Date)),
        "is_date_time" => annotations.push(Annotation::DateFormat(DateKind::DateTime)),
        "enum_values" => annotations.push(Annotation::EnumValues(
            args.positional
                .iter()
                .filter_map(AttrArg::to_value)
                .flat_map(|value| match value {
                    Value::Array(items) => items,
                    other => vec![other],
                })
                .collect(),
        )),
        "consumes" => annotations.push(Annotation::Consumes(args.strings())),
        "produces" => annotations.push(Annotation::Produces(args.strings())),
        "accept" => annotations.push(Annotation::Accept(args.strings())),
        "tags" => annotations.push(Annotation::Tags(args.strings())),
        "security" => annotations.push(Annotation::Security {
            scopes: args
                .positional
                .first()
                .map(AttrArg::as_strings)
                .unwrap_or_default(),
            name: args
                .positional
                .get(1)
                .and_then(AttrArg::as_string)
                .or_else(|| args.named("name").and_then(AttrArg::as_string)),
        }),
        "summary" => {
            if let Some(summary) = args.first_string() {
                annotations.push(Annotation::Summary(summary));
            }
        }
        "example" => match args.positional.first().and_then(AttrArg::to_example) {
            Some(example) => annotations.push(Annotation::Example(example)),
            None => return Err("#[example] expects a literal value".to_string()),
        },
        "response" => annotations.push(Annotation::Response(lower_response(args)?)),
        "extends" => {
            for arg in &args.positional {
                match arg {
                    AttrArg::Type(ty) => lowered.extends.push(ty.clone()),
                    _ => return Err("#[extends] expects a type".to_string()),
                }
            }
        }
        other => warn!("Ignoring unknown attribute #[{}]", other),
    }
    Ok(())
}

/// `#[response(status, "description", Type, example = "...")]`; every part is optional.
fn lower_response(args: &AttrArgs) -> Result<ResponseDecl, String> {
    let mut response = ResponseDecl::default();
    let mut strings = Vec::new();
    for arg in &args.positional {
        match arg {
            AttrArg::Lit(Lit::Int(status)) => response.status = Some(status.base10_digits().to_string()),
            AttrArg::Lit(Lit::Str(text)) => strings.push(text.value()),
            AttrArg::Type(ty) => response.schema = Some(lower_type(ty)),
            other => return Err(format!("unexpected #[response] argument {:?}", other)),
        }
    }
    let mut strings = strings.into_iter();
    if response.status.is_none() {
        response.status = strings.next();
    }
    response.description = strings.next();
    response.examples = args
        .named("example")
        .or_else(|| args.named("examples"))
        .and_then(AttrArg::to_example);
    Ok(response)
}

/// Doc comment split into its description and `@tag` annotations
#[derive(Debug, Default, PartialEq)]
pub struct DocComment {
    pub description: String,
    pub annotations: Vec<Annotation>,
}

/// Reads `///` comments. Lines starting with `@` are tags and are left out of the description.
pub fn doc_comment(attrs: &[Attribute]) -> DocComment {
    let mut lines = Vec::new();
    let mut annotations = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        let Meta::NameValue(name_value) = &attr.meta else {
            continue;
        };
        let syn::Expr::Lit(syn::ExprLit {
            lit: Lit::Str(text), ..
        }) = &name_value.value
        else {
            continue;
        };
        for line in text.value().lines() {
            let line = line.trim();
            match line.strip_prefix('@') {
                Some(tag) => annotations.extend(doc_tag(tag)),
                None => lines.push(line.to_string()),
            }
        }
    }
    DocComment {
        description: lines.join("\n").trim().to_string(),
        annotations,
    }
}

fn doc_tag(tag: &str) -> Option<Annotation> {
    let (name, rest) = match tag.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (tag, ""),
    };
    let annotation = match name.to_ascii_lowercase().as_str() {
        "summary" => Annotation::Summary(rest.to_string()),
        "deprecated" => Annotation::Deprecated,
        "hidden" => Annotation::Hidden,
        "isint" => Annotation::Numeric(NumericKind::Int),
        "islong" => Annotation::Numeric(NumericKind::Long),
        "isfloat" => Annotation::Numeric(NumericKind::Float),
        "isdouble" => Annotation::Numeric(NumericKind::Double),
        "isdate" => Annotation::DateFormat(DateKind::Date),
        "isdatetime" => Annotation::DateFormat(DateKind::DateTime),
        _ => return None,
    };
    Some(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::TypeExpr;
    use syn::parse_quote;

    fn lower(attrs: Vec<Attribute>) -> LoweredAttributes {
        lower_attributes(&attrs).unwrap()
    }

    #[test]
    fn test_verb_with_inline_path() {
        let lowered = lower(vec![parse_quote!(#[get("/{id}")])]);
        assert_eq!(
            lowered.annotations,
            vec![
                Annotation::Verb(HttpVerb::Get),
                Annotation::Path("/{id}".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_path() {
        let lowered = lower(vec![parse_quote!(#[path])]);
        assert_eq!(lowered.annotations, vec![Annotation::Path(String::new())]);
    }

    #[test]
    fn test_query_binding_with_options() {
        let lowered = lower(vec![parse_quote!(
            #[query_param("tag", collection_format = "csv", default = 10)]
        )]);
        assert_eq!(
            lowered.annotations,
            vec![Annotation::Binding {
                role: BindingRole::Query,
                name: Some("tag".to_string()),
                collection_format: Some("csv".to_string()),
            }]
        );
        assert_eq!(lowered.default, Some(Value::from(10)));
    }

    #[test]
    fn test_response_attribute() {
        let lowered = lower(vec![parse_quote!(
            #[response(404, "Not found", ErrorBody, example = r#"{"code": 404}"#)]
        )]);
        let Annotation::Response(response) = &lowered.annotations[0] else {
            panic!("expected a response annotation");
        };
        assert_eq!(response.status.as_deref(), Some("404"));
        assert_eq!(response.description.as_deref(), Some("Not found"));
        assert_eq!(response.schema, Some(TypeExpr::named("ErrorBody")));
        assert_eq!(response.examples, Some(serde_json::json!({"code": 404})));
    }

    #[test]
    fn test_security_attribute() {
        let lowered = lower(vec![parse_quote!(#[security(["admin", "user"], "oauth")])]);
        assert_eq!(
            lowered.annotations,
            vec![Annotation::Security {
                scopes: vec!["admin".to_string(), "user".to_string()],
                name: Some("oauth".to_string()),
            }]
        );
    }

    #[test]
    fn test_enum_values_and_numeric_hints() {
        let lowered = lower(vec![
            parse_quote!(#[enum_values("a", "b")]),
            parse_quote!(#[is_long]),
        ]);
        assert_eq!(
            lowered.annotations,
            vec![
                Annotation::EnumValues(vec!["a".into(), "b".into()]),
                Annotation::Numeric(NumericKind::Long)
            ]
        );
    }

    #[test]
    fn test_unrelated_attributes_are_ignored() {
        let lowered = lower(vec![
            parse_quote!(#[derive(Debug, Clone)]),
            parse_quote!(#[serde(rename = "x")]),
        ]);
        assert!(lowered.annotations.is_empty());
    }

    #[test]
    fn test_doc_comment_tags() {
        let attrs: Vec<Attribute> = vec![
            parse_quote!(#[doc = " Gets one person."]),
            parse_quote!(#[doc = " @summary Fetch person"]),
            parse_quote!(#[doc = " @IsInt"]),
        ];
        let doc = doc_comment(&attrs);
        assert_eq!(doc.description, "Gets one person.");
        assert_eq!(
            doc.annotations,
            vec![
                Annotation::Summary("Fetch person".to_string()),
                Annotation::Numeric(NumericKind::Int)
            ]
        );
    }

    #[test]
    fn test_example_accepts_plain_strings() {
        let lowered = lower(vec![parse_quote!(#[example("hello")])]);
        assert_eq!(
            lowered.annotations,
            vec![Annotation::Example(Value::String("hello".to_string()))]
        );
    }
}
