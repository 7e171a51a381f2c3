//! Normalized metadata handed from the endpoint builder to the schema assembler.

use crate::declaration::HttpVerb;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;

/// Primitive type kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    DateTime,
    Buffer,
    Byte,
    Binary,
    Object,
    Void,
    File,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Date => "date",
            PrimitiveKind::DateTime => "datetime",
            PrimitiveKind::Buffer => "buffer",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Binary => "binary",
            PrimitiveKind::Object => "object",
            PrimitiveKind::Void => "void",
            PrimitiveKind::File => "file",
        }
    }
}

/// Schema composition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinatorKind {
    OneOf,
    AnyOf,
    AllOf,
}

/// Handle to a named reference type.
///
/// The body lives in [`Metadata::reference_types`] under `name`. Response wrappers keep
/// their own marker name and carry the wrapped type in `type_argument`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReference {
    pub name: String,
    pub type_argument: Option<Box<Type>>,
}

/// Resolved type
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(PrimitiveKind),
    Array(Box<Type>),
    /// Enumeration of literal values (strings, numbers or booleans)
    Enum(Vec<Value>),
    Reference(TypeReference),
    Combinator(CombinatorKind, Vec<Type>),
    /// Anonymous inline object, never cached
    Object(Vec<Property>),
    /// Stand-in for a reference type still being resolved; replaced once resolution finishes
    Circular(String),
}

impl Type {
    pub fn reference(name: impl Into<String>) -> Self {
        Type::Reference(TypeReference {
            name: name.into(),
            type_argument: None,
        })
    }

    /// Kind label used by parameter role validation (`string`, `enum`, `array`, ...).
    pub fn type_name(&self) -> &str {
        match self {
            Type::Primitive(kind) => kind.as_str(),
            Type::Array(_) => "array",
            Type::Enum(_) => "enum",
            Type::Reference(reference) => &reference.name,
            Type::Combinator(CombinatorKind::OneOf, _) => "oneOf",
            Type::Combinator(CombinatorKind::AnyOf, _) => "anyOf",
            Type::Combinator(CombinatorKind::AllOf, _) => "allOf",
            Type::Object(_) => "",
            Type::Circular(name) => name,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::Void))
    }

    /// Applies `f` to this type and every type nested inside it, children first.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Type)) {
        match self {
            Type::Array(element) => element.walk_mut(f),
            Type::Reference(reference) => {
                if let Some(argument) = reference.type_argument.as_mut() {
                    argument.walk_mut(f);
                }
            }
            Type::Combinator(_, members) => members.iter_mut().for_each(|m| m.walk_mut(f)),
            Type::Object(properties) => properties.iter_mut().for_each(|p| p.ty.walk_mut(f)),
            Type::Primitive(_) | Type::Enum(_) | Type::Circular(_) => {}
        }
        f(self);
    }
}

/// Property of a reference type or inline object
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub description: String,
    pub ty: Type,
    pub required: bool,
}

/// Body of a named reference type
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceType {
    /// Fully qualified name including rendered generic arguments
    pub name: String,
    pub description: String,
    /// Empty when `type_alias` holds a combinator
    pub properties: Vec<Property>,
    pub additional_properties: Vec<Property>,
    pub type_alias: Option<Type>,
}

impl ReferenceType {
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Type)) {
        for property in self
            .properties
            .iter_mut()
            .chain(self.additional_properties.iter_mut())
        {
            property.ty.walk_mut(f);
        }
        if let Some(alias) = self.type_alias.as_mut() {
            alias.walk_mut(f);
        }
    }
}

/// Where a parameter travels in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    FormData,
    Body,
    Context,
    Cookie,
    /// Either query or form data
    Param,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::FormData => "formData",
            ParameterLocation::Body => "body",
            ParameterLocation::Context => "context",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Param => "param",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name in the method signature
    pub parameter_name: String,
    /// Name on the wire
    pub name: String,
    pub location: ParameterLocation,
    pub ty: Type,
    pub required: bool,
    pub description: String,
    pub default: Option<Value>,
    pub collection_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseType {
    pub status: String,
    pub description: String,
    pub schema: Option<Type>,
    pub examples: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Security {
    pub name: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub verb: HttpVerb,
    /// Normalized local path, empty or starting with `/`
    pub path: String,
    pub parameters: Vec<Parameter>,
    /// Resolved return type
    pub ty: Type,
    pub responses: Vec<ResponseType>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    pub tags: Vec<String>,
    pub security: Option<Vec<Security>>,
    pub summary: Option<String>,
    pub description: String,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    pub name: String,
    pub location: Option<PathBuf>,
    pub path: String,
    pub methods: Vec<Method>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    pub tags: Vec<String>,
    pub security: Option<Vec<Security>>,
    pub responses: Vec<ResponseType>,
}

impl Controller {
    /// Applies `f` to every type reachable from the controller.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Type)) {
        let responses = self
            .responses
            .iter_mut()
            .chain(self.methods.iter_mut().flat_map(|m| m.responses.iter_mut()));
        for response in responses {
            if let Some(schema) = response.schema.as_mut() {
                schema.walk_mut(f);
            }
        }
        for method in &mut self.methods {
            method.ty.walk_mut(f);
            for parameter in &mut method.parameters {
                parameter.ty.walk_mut(f);
            }
        }
    }
}

/// Root of the metadata graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub controllers: Vec<Controller>,
    pub reference_types: IndexMap<String, ReferenceType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_mut_reaches_nested_types() {
        let mut ty = Type::Array(Box::new(Type::Object(vec![Property {
            name: "next".to_string(),
            description: String::new(),
            ty: Type::Circular("Node".to_string()),
            required: true,
        }])));

        let mut seen = 0;
        ty.walk_mut(&mut |t| {
            if let Type::Circular(name) = t {
                *t = Type::reference(name.clone());
                seen += 1;
            }
        });

        assert_eq!(seen, 1);
        match ty {
            Type::Array(inner) => match *inner {
                Type::Object(props) => assert_eq!(props[0].ty, Type::reference("Node")),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Type::Primitive(PrimitiveKind::DateTime).type_name(), "datetime");
        assert_eq!(Type::Enum(vec![]).type_name(), "enum");
        assert_eq!(Type::reference("Person").type_name(), "Person");
    }
}
