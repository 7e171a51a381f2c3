//! Declaration model consumed by the generator.
//!
//! A [`Declaration`] is a named enum, model (struct/controller) or type alias lifted out of the
//! source front-end, together with the annotation facts attached to it. The
//! [`DeclarationProvider`] trait is the only way the resolver and endpoint builder look
//! declarations up, so any front-end able to produce a [`DeclarationSet`] can drive generation.

use crate::error::{Error, Result};
use log::debug;
use serde_json::{Number, Value};
use std::path::PathBuf;

/// Width refinement for numeric properties and parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Int,
    Long,
    Float,
    Double,
}

/// Date refinement for `Date` typed properties and parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Date,
    DateTime,
}

/// HTTP verbs accepted on controller methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl HttpVerb {
    /// Parses a verb name case-insensitively (`get`, `GET`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "get" => Some(HttpVerb::Get),
            "post" => Some(HttpVerb::Post),
            "put" => Some(HttpVerb::Put),
            "patch" => Some(HttpVerb::Patch),
            "delete" => Some(HttpVerb::Delete),
            "options" => Some(HttpVerb::Options),
            "head" => Some(HttpVerb::Head),
            _ => None,
        }
    }

    /// Lowercase name used as the path item key.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Patch => "patch",
            HttpVerb::Delete => "delete",
            HttpVerb::Options => "options",
            HttpVerb::Head => "head",
        }
    }

    /// Verbs allowed to carry body, form and file parameters.
    pub fn carries_body(&self) -> bool {
        matches!(
            self,
            HttpVerb::Delete | HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch
        )
    }
}

/// Binding role a parameter annotation requests.
///
/// Parameters without any binding annotation are bound to the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingRole {
    Path,
    Query,
    Header,
    Form,
    File,
    Files,
    Param,
    Cookie,
    Context,
}

impl BindingRole {
    /// Fixed precedence used when a parameter carries several binding annotations.
    pub const PRECEDENCE: [BindingRole; 9] = [
        BindingRole::Path,
        BindingRole::Query,
        BindingRole::Header,
        BindingRole::Form,
        BindingRole::File,
        BindingRole::Files,
        BindingRole::Param,
        BindingRole::Cookie,
        BindingRole::Context,
    ];

    fn rank(&self) -> usize {
        Self::PRECEDENCE
            .iter()
            .position(|role| role == self)
            .unwrap_or(Self::PRECEDENCE.len())
    }
}

/// Literal value usable in type position and as enum initializer
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Boolean(bool),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => Value::Number(n.clone()),
            Literal::Boolean(b) => Value::Bool(*b),
        }
    }

    fn same_kind(&self, other: &Literal) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Keyword types
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    String,
    /// Number with an optional width intrinsic to the source type (`i64` is a long)
    Number(Option<NumericKind>),
    Boolean,
    Void,
}

/// A named type reference with its generic arguments, e.g. `models.Box<String>`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Name, optionally namespace qualified with `.`
    pub name: String,
    pub args: Vec<TypeExpr>,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Last segment of a qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Syntactic type expression as written in a declaration
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Keyword(Keyword),
    Any,
    ObjectKeyword,
    Array(Box<TypeExpr>),
    TypeLiteral(Vec<Member>),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    Parenthesized(Box<TypeExpr>),
    Literal(Literal),
    Reference(TypeRef),
    /// Callable member; such members never become properties
    Function,
    Unsupported(String),
}

impl TypeExpr {
    pub fn string() -> Self {
        TypeExpr::Keyword(Keyword::String)
    }

    pub fn number() -> Self {
        TypeExpr::Keyword(Keyword::Number(None))
    }

    pub fn boolean() -> Self {
        TypeExpr::Keyword(Keyword::Boolean)
    }

    pub fn void() -> Self {
        TypeExpr::Keyword(Keyword::Void)
    }

    pub fn array(element: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(element))
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Reference(TypeRef::new(name))
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Reference(TypeRef::with_args(name, args))
    }

    /// Returns the literals of a union made only of literals of one kind.
    pub fn literal_union(members: &[TypeExpr]) -> Option<Vec<&Literal>> {
        let literals: Vec<&Literal> = members
            .iter()
            .map(|member| match member {
                TypeExpr::Literal(literal) => Some(literal),
                _ => None,
            })
            .collect::<Option<_>>()?;
        let first = literals.first()?;
        literals
            .iter()
            .all(|literal| literal.same_kind(first))
            .then_some(literals)
    }
}

/// Property signature of a model or inline object type
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: TypeExpr,
    pub optional: bool,
    pub description: String,
    pub annotations: Vec<Annotation>,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            description: String::new(),
            annotations: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// Enum variant with its optional literal initializer
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Literal>,
}

/// `[key: K]: V` style additional-properties declaration
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSignature {
    pub key: TypeExpr,
    pub value: TypeExpr,
}

/// Body of a struct/interface/controller declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDecl {
    pub members: Vec<Member>,
    pub index_signatures: Vec<IndexSignature>,
    /// Extended supertypes, in declaration order
    pub heritage: Vec<TypeRef>,
    pub methods: Vec<MethodDecl>,
}

/// What a declaration declares
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationKind {
    Enum(Vec<EnumMember>),
    Model(ModelDecl),
    Alias(TypeExpr),
}

/// A named declaration and the facts attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    /// Enclosing namespaces, outermost first
    pub namespace: Vec<String>,
    pub description: String,
    pub type_params: Vec<String>,
    pub kind: DeclarationKind,
    pub annotations: Vec<Annotation>,
    /// Source file the declaration was lowered from, when known
    pub source: Option<PathBuf>,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
            description: String::new(),
            type_params: Vec::new(),
            kind,
            annotations: Vec::new(),
            source: None,
        }
    }

    pub fn model(name: impl Into<String>, members: Vec<Member>) -> Self {
        Self::new(
            name,
            DeclarationKind::Model(ModelDecl {
                members,
                ..ModelDecl::default()
            }),
        )
    }

    pub fn alias(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self::new(name, DeclarationKind::Alias(ty))
    }

    pub fn enumeration(name: impl Into<String>, members: Vec<EnumMember>) -> Self {
        Self::new(name, DeclarationKind::Enum(members))
    }

    pub fn in_namespace(mut self, namespace: &[&str]) -> Self {
        self.namespace = namespace.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_type_params(mut self, params: &[&str]) -> Self {
        self.type_params = params.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Name prefixed with its namespaces, joined with `.`
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace.join("."), self.name)
        }
    }

    pub fn as_model(&self) -> Option<&ModelDecl> {
        match &self.kind {
            DeclarationKind::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_model_mut(&mut self) -> Option<&mut ModelDecl> {
        match &mut self.kind {
            DeclarationKind::Model(model) => Some(model),
            _ => None,
        }
    }
}

/// Controller method declaration
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    /// Declared return type; `None` means nothing is returned
    pub return_type: Option<TypeExpr>,
    pub parameters: Vec<ParameterDecl>,
    pub description: String,
    pub annotations: Vec<Annotation>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, return_type: Option<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
            description: String::new(),
            annotations: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterDecl) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// Controller method parameter declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub optional: bool,
    /// Literal default value
    pub default: Option<Value>,
    pub description: String,
    pub annotations: Vec<Annotation>,
}

impl ParameterDecl {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            optional: false,
            default: None,
            description: String::new(),
            annotations: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Shorthand for a single binding annotation without wire name override.
    pub fn bound(self, role: BindingRole) -> Self {
        self.annotated(Annotation::Binding {
            role,
            name: None,
            collection_format: None,
        })
    }
}

/// Explicitly declared response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDecl {
    pub status: Option<String>,
    pub description: Option<String>,
    pub schema: Option<TypeExpr>,
    pub examples: Option<Value>,
}

/// Annotation facts attached to declarations, members, methods and parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Path(String),
    Hidden,
    Verb(HttpVerb),
    Binding {
        role: BindingRole,
        /// Wire name, when different from the source name
        name: Option<String>,
        collection_format: Option<String>,
    },
    Numeric(NumericKind),
    DateFormat(DateKind),
    EnumValues(Vec<Value>),
    Consumes(Vec<String>),
    Produces(Vec<String>),
    Accept(Vec<String>),
    Tags(Vec<String>),
    Security {
        scopes: Vec<String>,
        name: Option<String>,
    },
    Response(ResponseDecl),
    Example(Value),
    Summary(String),
    Deprecated,
}

/// Convenience queries over an annotation list.
pub trait Annotated {
    fn annotations(&self) -> &[Annotation];

    fn is_hidden(&self) -> bool {
        self.annotations()
            .iter()
            .any(|a| matches!(a, Annotation::Hidden))
    }

    fn is_deprecated(&self) -> bool {
        self.annotations()
            .iter()
            .any(|a| matches!(a, Annotation::Deprecated))
    }

    fn paths(&self) -> Vec<&str> {
        self.annotations()
            .iter()
            .filter_map(|a| match a {
                Annotation::Path(path) => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    fn verbs(&self) -> Vec<HttpVerb> {
        self.annotations()
            .iter()
            .filter_map(|a| match a {
                Annotation::Verb(verb) => Some(*verb),
                _ => None,
            })
            .collect()
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        numeric_kind(self.annotations())
    }

    fn summary(&self) -> Option<&str> {
        self.annotations().iter().find_map(|a| match a {
            Annotation::Summary(summary) => Some(summary.as_str()),
            _ => None,
        })
    }

    /// Highest-precedence binding annotation, if any.
    fn binding(&self) -> Option<(BindingRole, Option<&str>, Option<&str>)> {
        self.annotations()
            .iter()
            .filter_map(|a| match a {
                Annotation::Binding {
                    role,
                    name,
                    collection_format,
                } => Some((*role, name.as_deref(), collection_format.as_deref())),
                _ => None,
            })
            .min_by_key(|(role, _, _)| role.rank())
    }
}

/// First numeric refinement in `annotations`.
pub fn numeric_kind(annotations: &[Annotation]) -> Option<NumericKind> {
    annotations.iter().find_map(|a| match a {
        Annotation::Numeric(kind) => Some(*kind),
        _ => None,
    })
}

/// First date refinement in `annotations`.
pub fn date_kind(annotations: &[Annotation]) -> Option<DateKind> {
    annotations.iter().find_map(|a| match a {
        Annotation::DateFormat(kind) => Some(*kind),
        _ => None,
    })
}

/// Enum values attached to a string-typed member or parameter.
pub fn enum_values(annotations: &[Annotation]) -> Option<&[Value]> {
    annotations.iter().find_map(|a| match a {
        Annotation::EnumValues(values) => Some(values.as_slice()),
        _ => None,
    })
}

impl Annotated for Declaration {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for Member {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for MethodDecl {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for ParameterDecl {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

/// Source of declarations for one generation run.
pub trait DeclarationProvider {
    /// Every declaration known to the provider, in discovery order.
    fn declarations(&self) -> &[Declaration];

    /// Finds the unique declaration named `name` as seen from namespace `scope`.
    ///
    /// Unqualified names are searched from `scope` outwards to the root namespace, then across
    /// every namespace. A qualified name (`models.Person`) selects the namespace suffix
    /// `models` relative to each scope level. Several matches at the first level that has any
    /// are reported as [`Error::AmbiguousName`].
    fn lookup(&self, name: &str, scope: &[String]) -> Result<Option<&Declaration>> {
        let mut segments: Vec<&str> = name.split('.').collect();
        let simple = segments.pop().unwrap_or(name);
        let qualifier: Vec<&str> = segments;

        for level in (0..=scope.len()).rev() {
            let found = matching(self.declarations(), simple, &qualifier, Some(&scope[..level]));
            match found.len() {
                0 => continue,
                1 => return Ok(Some(found[0])),
                _ => {
                    return Err(Error::AmbiguousName {
                        name: name.to_string(),
                    })
                }
            }
        }

        let mut anywhere = matching(self.declarations(), simple, &qualifier, None);
        if anywhere.is_empty() && !qualifier.is_empty() {
            // qualifiers may name file modules, which carry no namespace
            anywhere = matching(self.declarations(), simple, &[], None);
        }
        match anywhere.len() {
            0 => {
                debug!("No declaration named {} visible from {:?}", name, scope);
                Ok(None)
            }
            1 => Ok(Some(anywhere[0])),
            _ => Err(Error::AmbiguousName {
                name: name.to_string(),
            }),
        }
    }
}

/// Declarations named `simple` whose namespace is `prefix` followed by `qualifier`, or any
/// namespace ending in `qualifier` when `prefix` is `None`.
fn matching<'d>(
    declarations: &'d [Declaration],
    simple: &str,
    qualifier: &[&str],
    prefix: Option<&[String]>,
) -> Vec<&'d Declaration> {
    declarations
        .iter()
        .filter(|decl| decl.name == simple)
        .filter(|decl| {
            let namespace = &decl.namespace;
            if namespace.len() < qualifier.len() {
                return false;
            }
            let split = namespace.len() - qualifier.len();
            let tail_matches = namespace[split..]
                .iter()
                .zip(qualifier)
                .all(|(a, b)| a == b);
            match prefix {
                Some(prefix) => tail_matches && namespace[..split] == *prefix,
                None => tail_matches,
            }
        })
        .collect()
}

/// In-memory declaration store produced by the source front-end.
#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
    declarations: Vec<Declaration>,
}

impl DeclarationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, declaration: Declaration) {
        debug!("Registering declaration {}", declaration.qualified_name());
        self.declarations.push(declaration);
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Mutable access to a declaration by exact namespace and name.
    pub fn get_mut(&mut self, namespace: &[String], name: &str) -> Option<&mut Declaration> {
        self.declarations
            .iter_mut()
            .find(|decl| decl.name == name && decl.namespace == namespace)
    }
}

impl FromIterator<Declaration> for DeclarationSet {
    fn from_iter<I: IntoIterator<Item = Declaration>>(iter: I) -> Self {
        Self {
            declarations: iter.into_iter().collect(),
        }
    }
}

impl Extend<Declaration> for DeclarationSet {
    fn extend<I: IntoIterator<Item = Declaration>>(&mut self, iter: I) {
        self.declarations.extend(iter);
    }
}

impl DeclarationProvider for DeclarationSet {
    fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_prefers_innermost_scope() {
        let set: DeclarationSet = vec![
            Declaration::model("Person", vec![]),
            Declaration::model("Person", vec![]).in_namespace(&["admin"]),
        ]
        .into_iter()
        .collect();

        let inner = set.lookup("Person", &ns(&["admin"])).unwrap().unwrap();
        assert_eq!(inner.qualified_name(), "admin.Person");

        let root = set.lookup("Person", &[]).unwrap().unwrap();
        assert_eq!(root.qualified_name(), "Person");
    }

    #[test]
    fn test_lookup_qualified_name() {
        let set: DeclarationSet = vec![
            Declaration::model("Person", vec![]).in_namespace(&["a"]),
            Declaration::model("Person", vec![]).in_namespace(&["b"]),
        ]
        .into_iter()
        .collect();

        let found = set.lookup("b.Person", &[]).unwrap().unwrap();
        assert_eq!(found.namespace, ns(&["b"]));
    }

    #[test]
    fn test_lookup_falls_back_to_unique_global_match() {
        let set: DeclarationSet = vec![Declaration::model("Address", vec![]).in_namespace(&["geo"])]
            .into_iter()
            .collect();

        let found = set.lookup("Address", &ns(&["people"])).unwrap().unwrap();
        assert_eq!(found.qualified_name(), "geo.Address");
    }

    #[test]
    fn test_lookup_ambiguous_global_match() {
        let set: DeclarationSet = vec![
            Declaration::model("Address", vec![]).in_namespace(&["a"]),
            Declaration::model("Address", vec![]).in_namespace(&["b"]),
        ]
        .into_iter()
        .collect();

        let err = set.lookup("Address", &[]).unwrap_err();
        assert!(matches!(err, Error::AmbiguousName { .. }));
    }

    #[test]
    fn test_lookup_ambiguous_same_scope() {
        let set: DeclarationSet = vec![
            Declaration::enumeration("Color", vec![]),
            Declaration::alias("Color", TypeExpr::string()),
        ]
        .into_iter()
        .collect();

        assert!(matches!(
            set.lookup("Color", &[]),
            Err(Error::AmbiguousName { .. })
        ));
    }

    #[test]
    fn test_lookup_unknown_qualifier_uses_simple_name() {
        let set: DeclarationSet = vec![Declaration::model("Person", vec![])]
            .into_iter()
            .collect();

        let found = set.lookup("models.Person", &[]).unwrap().unwrap();
        assert_eq!(found.qualified_name(), "Person");
    }

    #[test]
    fn test_lookup_missing() {
        let set = DeclarationSet::new();
        assert!(set.lookup("Nothing", &[]).unwrap().is_none());
    }

    #[test]
    fn test_binding_precedence() {
        let param = ParameterDecl::new("id", TypeExpr::string())
            .bound(BindingRole::Context)
            .bound(BindingRole::Query)
            .bound(BindingRole::Path);

        let (role, name, _) = param.binding().unwrap();
        assert_eq!(role, BindingRole::Path);
        assert!(name.is_none());
    }

    #[test]
    fn test_literal_union_requires_one_kind() {
        let strings = vec![
            TypeExpr::Literal(Literal::String("a".into())),
            TypeExpr::Literal(Literal::String("b".into())),
        ];
        assert_eq!(TypeExpr::literal_union(&strings).map(|l| l.len()), Some(2));

        let mixed = vec![
            TypeExpr::Literal(Literal::String("a".into())),
            TypeExpr::Literal(Literal::Number(1.into())),
        ];
        assert!(TypeExpr::literal_union(&mixed).is_none());

        let with_ref = vec![
            TypeExpr::Literal(Literal::String("a".into())),
            TypeExpr::named("B"),
        ];
        assert!(TypeExpr::literal_union(&with_ref).is_none());
    }

    #[test]
    fn test_verb_names() {
        assert_eq!(HttpVerb::from_name("GET"), Some(HttpVerb::Get));
        assert_eq!(HttpVerb::from_name("trace"), None);
        assert!(HttpVerb::Delete.carries_body());
        assert!(!HttpVerb::Get.carries_body());
    }
}
