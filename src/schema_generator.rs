use crate::error::{Error, Result};
use crate::metadata::{CombinatorKind, PrimitiveKind, Property, ReferenceType, Type};
use glob::Pattern;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of every definition reference
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Swagger 2.0 schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a definition
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "date-time", "binary")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(rename = "anyOf", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    fn formatted(schema_type: &str, format: &str) -> Self {
        Self {
            format: Some(format.to_string()),
            ..Self::of_type(schema_type)
        }
    }

    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", DEFINITIONS_PREFIX, name)),
            ..Self::default()
        }
    }

    fn composed(kind: CombinatorKind, members: Vec<Schema>) -> Self {
        let mut schema = Self::default();
        match kind {
            CombinatorKind::AllOf => schema.all_of = Some(members),
            CombinatorKind::AnyOf => schema.any_of = Some(members),
            CombinatorKind::OneOf => schema.one_of = Some(members),
        }
        schema
    }

    pub fn is_type(&self, schema_type: &str) -> bool {
        self.schema_type.as_deref() == Some(schema_type)
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

/// Compiles name globs, reporting a bad pattern as a configuration error.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern)
                .map_err(|e| Error::Config(format!("invalid pattern '{}': {}", pattern, e)))
        })
        .collect()
}

/// Name filters applied while rendering definitions
#[derive(Debug, Clone, Default)]
pub struct SchemaFilters {
    /// When set, only definitions matching one of these are emitted
    pub include_types: Option<Vec<Pattern>>,
    pub ignore_types: Vec<Pattern>,
    pub ignore_properties: Vec<Pattern>,
}

/// Schema generator - converts resolved types into Swagger schemas
pub struct SchemaGenerator {
    filters: SchemaFilters,
}

impl SchemaGenerator {
    pub fn new(filters: SchemaFilters) -> Self {
        debug!("Initializing SchemaGenerator");
        Self { filters }
    }

    /// Renders a resolved type.
    pub fn generate_schema(&self, ty: &Type) -> Schema {
        match ty {
            Type::Primitive(kind) => Self::primitive_to_schema(*kind),
            Type::Array(element) => Schema {
                items: Some(Box::new(self.generate_schema(element))),
                ..Schema::of_type("array")
            },
            Type::Enum(values) => Schema {
                enum_values: Some(values.clone()),
                ..Schema::of_type(enum_type(values))
            },
            Type::Reference(reference) => Schema::reference(&reference.name),
            Type::Circular(name) => Schema::reference(name),
            Type::Combinator(kind, members) => Schema::composed(
                *kind,
                members.iter().map(|m| self.generate_schema(m)).collect(),
            ),
            Type::Object(properties) => Schema {
                properties: Some(self.build_properties(properties)),
                required: required(properties),
                ..Schema::of_type("object")
            },
        }
    }

    fn primitive_to_schema(kind: PrimitiveKind) -> Schema {
        match kind {
            PrimitiveKind::Binary => Schema::formatted("string", "binary"),
            PrimitiveKind::Byte => Schema::formatted("string", "byte"),
            PrimitiveKind::Date => Schema::formatted("string", "date"),
            PrimitiveKind::DateTime => Schema::formatted("string", "date-time"),
            PrimitiveKind::Double => Schema::formatted("number", "double"),
            PrimitiveKind::Float => Schema::formatted("number", "float"),
            PrimitiveKind::Integer => Schema::formatted("integer", "int32"),
            PrimitiveKind::Long => Schema::formatted("integer", "int64"),
            PrimitiveKind::Buffer | PrimitiveKind::File => Schema::of_type("file"),
            PrimitiveKind::Boolean => Schema::of_type("boolean"),
            PrimitiveKind::Number => Schema::of_type("number"),
            PrimitiveKind::Object => Schema::of_type("object"),
            PrimitiveKind::String => Schema::of_type("string"),
            PrimitiveKind::Void => Schema::of_type("void"),
        }
    }

    /// Renders every reference type that passes the type filters.
    pub fn build_definitions(
        &self,
        reference_types: &IndexMap<String, ReferenceType>,
    ) -> IndexMap<String, Schema> {
        let mut definitions = IndexMap::new();
        for (name, reference_type) in reference_types {
            if !self.includes_type(name) {
                debug!("Skipping filtered definition {}", name);
                continue;
            }
            debug!("Generating definition for type: {}", name);
            definitions.insert(name.clone(), self.build_definition(reference_type));
        }
        definitions
    }

    fn includes_type(&self, name: &str) -> bool {
        let included = match &self.filters.include_types {
            Some(patterns) => patterns.iter().any(|p| p.matches(name)),
            None => true,
        };
        included && !self.filters.ignore_types.iter().any(|p| p.matches(name))
    }

    fn build_definition(&self, reference_type: &ReferenceType) -> Schema {
        let description = non_empty(&reference_type.description);
        let mut definition = match &reference_type.type_alias {
            Some(Type::Combinator(kind, members)) => Schema {
                description,
                ..Schema::composed(
                    *kind,
                    members.iter().map(|m| self.generate_schema(m)).collect(),
                )
            },
            Some(alias) => Schema {
                description,
                ..self.generate_schema(alias)
            },
            None => Schema {
                description,
                properties: Some(self.build_properties(&reference_type.properties)),
                ..Schema::of_type("object")
            },
        };

        if let Some(required) = required(&reference_type.properties) {
            definition.required = Some(required);
        }
        if !reference_type.additional_properties.is_empty() {
            definition.additional_properties = self
                .build_additional_properties(&reference_type.additional_properties)
                .map(Box::new);
        }
        definition
    }

    fn keeps_property(&self, name: &str) -> bool {
        !self.filters.ignore_properties.iter().any(|p| p.matches(name))
    }

    fn build_properties(&self, properties: &[Property]) -> IndexMap<String, Schema> {
        properties
            .iter()
            .filter(|property| self.keeps_property(&property.name))
            .map(|property| {
                let mut schema = self.generate_schema(&property.ty);
                let description = non_empty(&property.description);
                if schema.reference.is_none() {
                    schema.description = description;
                } else if description.is_some() {
                    schema = Schema {
                        all_of: Some(vec![schema]),
                        description,
                        ..Schema::default()
                    };
                }
                (property.name.clone(), schema)
            })
            .collect()
    }

    /// A `$ref` value type passes through as a reference; any other value type is inlined.
    fn build_additional_properties(&self, properties: &[Property]) -> Option<Schema> {
        properties
            .iter()
            .filter(|property| self.keeps_property(&property.name))
            .map(|property| match self.generate_schema(&property.ty) {
                Schema {
                    reference: Some(reference),
                    ..
                } => Schema {
                    reference: Some(reference),
                    ..Schema::default()
                },
                inline => inline,
            })
            .last()
    }
}

fn required(properties: &[Property]) -> Option<Vec<String>> {
    let required: Vec<String> = properties
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.clone())
        .collect();
    (!required.is_empty()).then_some(required)
}

/// `number` or `boolean` when every value has that kind, otherwise `string`.
fn enum_type(values: &[Value]) -> &'static str {
    if !values.is_empty() && values.iter().all(Value::is_number) {
        "number"
    } else if !values.is_empty() && values.iter().all(Value::is_boolean) {
        "boolean"
    } else {
        "string"
    }
}
