//! The subset of `#[serde(...)]` that changes the wire shape of a model.

use log::debug;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitStr, Token};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SerdeAttrs {
    pub rename: Option<String>,
    pub rename_all: Option<RenameRule>,
    pub skip: bool,
    pub flatten: bool,
    pub default: bool,
}

impl SerdeAttrs {
    pub fn from_attributes(attrs: &[Attribute]) -> Self {
        let mut serde = SerdeAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            let result = attr.parse_nested_meta(|meta| {
                let key = meta
                    .path
                    .get_ident()
                    .map(|ident| ident.to_string())
                    .unwrap_or_default();
                match key.as_str() {
                    "rename" if meta.input.peek(Token![=]) => {
                        serde.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                    }
                    "rename_all" if meta.input.peek(Token![=]) => {
                        let rule = meta.value()?.parse::<LitStr>()?.value();
                        serde.rename_all = RenameRule::from_name(&rule);
                    }
                    "skip" | "skip_serializing" => serde.skip = true,
                    "flatten" => serde.flatten = true,
                    "default" => {
                        serde.default = true;
                        skip_value(&meta)?;
                    }
                    _ => skip_value(&meta)?,
                }
                Ok(())
            });
            if let Err(e) = result {
                debug!("Ignoring unparsable serde attribute: {}", e);
            }
        }
        serde
    }
}

fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_value(&inner))?;
    }
    Ok(())
}

/// `rename_all` case conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    pub fn from_name(name: &str) -> Option<Self> {
        let rule = match name {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            _ => return None,
        };
        Some(rule)
    }

    /// Renames a `snake_case` field.
    pub fn apply_to_field(&self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => field.split('_').map(capitalize).collect(),
            RenameRule::Camel => {
                let pascal = RenameRule::Pascal.apply_to_field(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => pascal,
                }
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }

    /// Renames a `PascalCase` variant.
    pub fn apply_to_variant(&self, variant: &str) -> String {
        match self {
            RenameRule::Pascal => variant.to_string(),
            RenameRule::Lower => variant.to_ascii_lowercase(),
            RenameRule::Upper => variant.to_ascii_uppercase(),
            RenameRule::Camel => {
                let mut chars = variant.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            RenameRule::Snake
            | RenameRule::ScreamingSnake
            | RenameRule::Kebab
            | RenameRule::ScreamingKebab => {
                let mut snake = String::new();
                for (i, ch) in variant.char_indices() {
                    if i > 0 && ch.is_uppercase() {
                        snake.push('_');
                    }
                    snake.push(ch.to_ascii_lowercase());
                }
                RenameRule::from_snake(*self, &snake)
            }
        }
    }

    fn from_snake(rule: RenameRule, snake: &str) -> String {
        match rule {
            RenameRule::ScreamingSnake => snake.to_ascii_uppercase(),
            RenameRule::Kebab => snake.replace('_', "-"),
            RenameRule::ScreamingKebab => snake.to_ascii_uppercase().replace('_', "-"),
            _ => snake.to_string(),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_field_attributes() {
        let attrs: Vec<Attribute> = vec![
            parse_quote!(#[serde(rename = "userName", skip_serializing_if = "Option::is_none")]),
            parse_quote!(#[serde(default = "defaults::name")]),
        ];
        let serde = SerdeAttrs::from_attributes(&attrs);
        assert_eq!(serde.rename.as_deref(), Some("userName"));
        assert!(serde.default);
        assert!(!serde.skip);
    }

    #[test]
    fn test_nested_rename_is_not_a_plain_rename() {
        let attrs: Vec<Attribute> = vec![parse_quote!(#[serde(rename(serialize = "a"), flatten)])];
        let serde = SerdeAttrs::from_attributes(&attrs);
        assert_eq!(serde.rename, None);
        assert!(serde.flatten);
    }

    #[test]
    fn test_field_rules() {
        assert_eq!(RenameRule::Camel.apply_to_field("created_at"), "createdAt");
        assert_eq!(RenameRule::Pascal.apply_to_field("created_at"), "CreatedAt");
        assert_eq!(RenameRule::Kebab.apply_to_field("created_at"), "created-at");
        assert_eq!(
            RenameRule::ScreamingSnake.apply_to_field("created_at"),
            "CREATED_AT"
        );
    }

    #[test]
    fn test_variant_rules() {
        assert_eq!(RenameRule::Snake.apply_to_variant("InProgress"), "in_progress");
        assert_eq!(RenameRule::Camel.apply_to_variant("InProgress"), "inProgress");
        assert_eq!(
            RenameRule::ScreamingKebab.apply_to_variant("InProgress"),
            "IN-PROGRESS"
        );
        assert_eq!(RenameRule::Lower.apply_to_variant("InProgress"), "inprogress");
    }
}
