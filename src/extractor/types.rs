//! Lowering of `syn` types into [`TypeExpr`]s.

use crate::declaration::{Keyword, Literal, NumericKind, TypeExpr, TypeRef};
use syn::parse::{Parse, ParseStream};
use syn::{parenthesized, GenericArgument, Lit, PathArguments, Token};

/// Path prefixes that never name a namespace
const PATH_ROOTS: [&str; 3] = ["crate", "self", "super"];

/// Strips `Option<..>`, returning the inner type and whether it was optional.
pub fn split_optional(ty: &syn::Type) -> (&syn::Type, bool) {
    match generic_single_arg(ty, "Option") {
        Some(inner) => (inner, true),
        None => (ty, false),
    }
}

/// Last identifier of a path type (`chrono::NaiveDate` gives `NaiveDate`).
pub fn last_ident(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        syn::Type::Reference(reference) => last_ident(&reference.elem),
        syn::Type::Paren(paren) => last_ident(&paren.elem),
        _ => None,
    }
}

/// Key and value types of a map type (`HashMap`, `BTreeMap`, `IndexMap`).
pub fn map_types(ty: &syn::Type) -> Option<(&syn::Type, &syn::Type)> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if !is_map(&segment.ident.to_string()) {
        return None;
    }
    let mut args = type_args(&segment.arguments);
    Some((args.next()?, args.next()?))
}

fn is_map(name: &str) -> bool {
    matches!(name, "HashMap" | "BTreeMap" | "IndexMap" | "Map")
}

fn generic_single_arg<'t>(ty: &'t syn::Type, wrapper: &str) -> Option<&'t syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    type_args(&segment.arguments).next()
}

fn type_args(arguments: &PathArguments) -> impl Iterator<Item = &syn::Type> {
    let args = match arguments {
        PathArguments::AngleBracketed(angle) => Some(angle.args.iter()),
        _ => None,
    };
    args.into_iter().flatten().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

/// Lowers a Rust type into a declaration type expression.
///
/// Containers, smart pointers and well known library types map onto their serialized form;
/// anything else becomes a named reference resolved later against the declarations.
pub fn lower_type(ty: &syn::Type) -> TypeExpr {
    match ty {
        syn::Type::Path(type_path) => lower_path(&type_path.path),
        syn::Type::Reference(reference) => lower_type(&reference.elem),
        syn::Type::Paren(paren) => TypeExpr::Parenthesized(Box::new(lower_type(&paren.elem))),
        syn::Type::Group(group) => lower_type(&group.elem),
        syn::Type::Slice(slice) => lower_sequence(&slice.elem),
        syn::Type::Array(array) => lower_sequence(&array.elem),
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => TypeExpr::void(),
        syn::Type::Tuple(_) => TypeExpr::Unsupported("tuple type".to_string()),
        syn::Type::BareFn(_) => TypeExpr::Function,
        syn::Type::Macro(type_macro) => lower_macro(&type_macro.mac),
        syn::Type::ImplTrait(_) | syn::Type::TraitObject(_) => {
            TypeExpr::Unsupported("trait object type".to_string())
        }
        syn::Type::Never(_) => TypeExpr::void(),
        _ => TypeExpr::Unsupported("unrecognised type".to_string()),
    }
}

fn lower_sequence(element: &syn::Type) -> TypeExpr {
    if last_ident(element).as_deref() == Some("u8") {
        return TypeExpr::named("Buffer");
    }
    TypeExpr::array(lower_type(element))
}

fn lower_path(path: &syn::Path) -> TypeExpr {
    let Some(segment) = path.segments.last() else {
        return TypeExpr::Unsupported("empty path".to_string());
    };
    let ident = segment.ident.to_string();
    let mut args = type_args(&segment.arguments);

    if let Some(keyword) = keyword(&ident) {
        return TypeExpr::Keyword(keyword);
    }

    match ident.as_str() {
        "Option" | "Box" | "Rc" | "Arc" | "Cow" | "Json" | "Result" | "RefCell" | "Mutex" => {
            args.next().map(lower_type).unwrap_or(TypeExpr::Any)
        }
        "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet" => {
            match args.next() {
                Some(element) => lower_sequence(element),
                None => TypeExpr::array(TypeExpr::Any),
            }
        }
        "Value" => TypeExpr::Any,
        "Bytes" | "BytesMut" => TypeExpr::named("Buffer"),
        "DateTime" | "NaiveDateTime" | "NaiveDate" | "SystemTime" | "OffsetDateTime"
        | "PrimitiveDateTime" => TypeExpr::named("Date"),
        name if is_map(name) => TypeExpr::ObjectKeyword,
        _ => {
            let qualified: Vec<String> = path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .skip_while(|s| PATH_ROOTS.contains(&s.as_str()))
                .collect();
            TypeExpr::Reference(TypeRef::with_args(
                qualified.join("."),
                args.map(lower_type).collect(),
            ))
        }
    }
}

fn keyword(ident: &str) -> Option<Keyword> {
    let keyword = match ident {
        "String" | "str" | "char" | "Uuid" | "Url" => Keyword::String,
        "bool" => Keyword::Boolean,
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => Keyword::Number(Some(NumericKind::Int)),
        "i64" | "u64" | "i128" | "u128" | "isize" | "usize" => {
            Keyword::Number(Some(NumericKind::Long))
        }
        "f32" => Keyword::Number(Some(NumericKind::Float)),
        "f64" => Keyword::Number(Some(NumericKind::Double)),
        _ => return None,
    };
    Some(keyword)
}

/// `union!(A | B | "literal")` and `all_of!(A & B)` in type position.
fn lower_macro(mac: &syn::Macro) -> TypeExpr {
    let name = mac
        .path
        .segments
        .last()
        .map(|s| s.ident.to_string())
        .unwrap_or_default();
    if name != "union" && name != "all_of" {
        return TypeExpr::Unsupported(format!("macro {}!", name));
    }
    match mac.parse_body::<Composite>() {
        Ok(composite) => composite.0,
        Err(e) => TypeExpr::Unsupported(format!("{}! body: {}", name, e)),
    }
}

/// Operands joined by `|` (union) or `&` (intersection)
struct Composite(TypeExpr);

impl Parse for Composite {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut operands = vec![parse_operand(input)?];
        let mut union = None;
        while !input.is_empty() {
            let is_union = if input.peek(Token![|]) {
                input.parse::<Token![|]>()?;
                true
            } else {
                input.parse::<Token![&]>()?;
                false
            };
            if union.is_some_and(|u| u != is_union) {
                return Err(input.error("mixing `|` and `&` needs parentheses"));
            }
            union = Some(is_union);
            operands.push(parse_operand(input)?);
        }
        let expr = match union {
            None => operands.remove(0),
            Some(true) => TypeExpr::Union(operands),
            Some(false) => TypeExpr::Intersection(operands),
        };
        Ok(Composite(expr))
    }
}

fn parse_operand(input: ParseStream) -> syn::Result<TypeExpr> {
    if input.peek(syn::token::Paren) {
        let content;
        parenthesized!(content in input);
        let Composite(inner) = content.parse()?;
        return Ok(TypeExpr::Parenthesized(Box::new(inner)));
    }
    let negative = input.peek(Token![-]);
    if negative {
        input.parse::<Token![-]>()?;
    }
    if input.peek(Lit) {
        let lit: Lit = input.parse()?;
        return literal(&lit, negative)
            .map(TypeExpr::Literal)
            .ok_or_else(|| syn::Error::new(lit.span(), "unsupported literal"));
    }
    Ok(lower_type(&input.parse::<syn::Type>()?))
}

fn literal(lit: &Lit, negative: bool) -> Option<Literal> {
    let sign = if negative { "-" } else { "" };
    match lit {
        Lit::Str(s) if !negative => Some(Literal::String(s.value())),
        Lit::Bool(b) if !negative => Some(Literal::Boolean(b.value)),
        Lit::Int(i) => format!("{}{}", sign, i.base10_digits())
            .parse::<i64>()
            .ok()
            .map(|n| Literal::Number(n.into())),
        Lit::Float(f) => format!("{}{}", sign, f.base10_digits())
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Literal::Number),
        _ => None,
    }
}

/// Literal initializer of an enum discriminant (`Red = 1`).
pub fn discriminant(expr: &syn::Expr) -> Option<Literal> {
    match expr {
        syn::Expr::Lit(expr) => literal(&expr.lit, false),
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => match expr.as_ref() {
            syn::Expr::Lit(inner) => literal(&inner.lit, true),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use syn::parse_quote;

    fn lower(ty: syn::Type) -> TypeExpr {
        lower_type(&ty)
    }

    #[test]
    fn test_primitives() {
        assert_eq!(lower(parse_quote!(String)), TypeExpr::string());
        assert_eq!(lower(parse_quote!(&'a str)), TypeExpr::string());
        assert_eq!(lower(parse_quote!(bool)), TypeExpr::boolean());
        assert_eq!(
            lower(parse_quote!(i64)),
            TypeExpr::Keyword(Keyword::Number(Some(NumericKind::Long)))
        );
        assert_eq!(
            lower(parse_quote!(f32)),
            TypeExpr::Keyword(Keyword::Number(Some(NumericKind::Float)))
        );
        assert_eq!(lower(parse_quote!(())), TypeExpr::void());
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            lower(parse_quote!(Vec<Person>)),
            TypeExpr::array(TypeExpr::named("Person"))
        );
        assert_eq!(lower(parse_quote!(Vec<u8>)), TypeExpr::named("Buffer"));
        assert_eq!(
            lower(parse_quote!(Arc<Option<String>>)),
            TypeExpr::string()
        );
        assert_eq!(
            lower(parse_quote!(Result<Json<Person>, ApiError>)),
            TypeExpr::named("Person")
        );
        assert_eq!(
            lower(parse_quote!(HashMap<String, i32>)),
            TypeExpr::ObjectKeyword
        );
        assert_eq!(lower(parse_quote!(serde_json::Value)), TypeExpr::Any);
        assert_eq!(
            lower(parse_quote!(chrono::DateTime<Utc>)),
            TypeExpr::named("Date")
        );
    }

    #[test]
    fn test_qualified_generic_reference() {
        assert_eq!(
            lower(parse_quote!(crate::models::Page<Person>)),
            TypeExpr::generic("models.Page", vec![TypeExpr::named("Person")])
        );
    }

    #[test]
    fn test_union_macro() {
        assert_eq!(
            lower(parse_quote!(union!("on" | "off"))),
            TypeExpr::Union(vec![
                TypeExpr::Literal(Literal::String("on".into())),
                TypeExpr::Literal(Literal::String("off".into())),
            ])
        );
        assert_eq!(
            lower(parse_quote!(union!(String | Vec<String>))),
            TypeExpr::Union(vec![
                TypeExpr::string(),
                TypeExpr::array(TypeExpr::string())
            ])
        );
    }

    #[test]
    fn test_all_of_macro_with_group() {
        assert_eq!(
            lower(parse_quote!(all_of!(Base & (A | B)))),
            TypeExpr::Intersection(vec![
                TypeExpr::named("Base"),
                TypeExpr::Parenthesized(Box::new(TypeExpr::Union(vec![
                    TypeExpr::named("A"),
                    TypeExpr::named("B")
                ])))
            ])
        );
    }

    #[test]
    fn test_negative_literals_in_union() {
        assert_eq!(
            lower(parse_quote!(union!(-1 | 1))),
            TypeExpr::Union(vec![
                TypeExpr::Literal(Literal::Number((-1).into())),
                TypeExpr::Literal(Literal::Number(1.into())),
            ])
        );
    }

    #[test]
    fn test_unsupported_types() {
        assert_eq!(lower(parse_quote!(fn(i32) -> i32)), TypeExpr::Function);
        assert!(matches!(
            lower(parse_quote!((i32, String))),
            TypeExpr::Unsupported(_)
        ));
        assert!(matches!(
            lower(parse_quote!(impl Iterator<Item = u8>)),
            TypeExpr::Unsupported(_)
        ));
    }

    #[test]
    fn test_split_optional() {
        let ty: syn::Type = parse_quote!(Option<i32>);
        let (inner, optional) = split_optional(&ty);
        assert!(optional);
        assert_eq!(last_ident(inner).as_deref(), Some("i32"));
    }
}
