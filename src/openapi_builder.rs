use crate::config::SwaggerConfig;
use crate::declaration::HttpVerb;
use crate::endpoint_builder::join_paths;
use crate::error::{Error, Result};
use crate::metadata::{
    Controller, Metadata, Method, Parameter as MethodParameter, ParameterLocation, PrimitiveKind,
    ResponseType, Security, Type,
};
use crate::schema_generator::{compile_patterns, Schema, SchemaFilters, SchemaGenerator};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Swagger 2.0 document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerDocument {
    pub swagger: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produces: Option<Vec<String>>,
    pub security_definitions: Value,
    pub definitions: IndexMap<String, Schema>,
    pub paths: IndexMap<String, PathItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub name: String,
}

/// All operations for a single path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, verb: HttpVerb) -> &mut Option<Operation> {
        match verb {
            HttpVerb::Get => &mut self.get,
            HttpVerb::Post => &mut self.post,
            HttpVerb::Put => &mut self.put,
            HttpVerb::Delete => &mut self.delete,
            HttpVerb::Patch => &mut self.patch,
            HttpVerb::Options => &mut self.options,
            HttpVerb::Head => &mut self.head,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// One `{name: scopes}` requirement per security entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<IndexMap<String, Vec<String>>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub responses: IndexMap<String, Response>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set for body parameters and references; mutually exclusive with `type`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<IndexMap<String, Value>>,
}

/// Renders [`Metadata`] into a Swagger 2.0 document.
pub struct OpenApiBuilder<'c> {
    config: &'c SwaggerConfig,
    schema_gen: SchemaGenerator,
}

impl<'c> OpenApiBuilder<'c> {
    /// Fails when one of the configured name filters is not a valid glob.
    pub fn new(config: &'c SwaggerConfig) -> Result<Self> {
        debug!("Initializing OpenApiBuilder");
        let filters = SchemaFilters {
            include_types: config
                .include_types
                .as_deref()
                .map(compile_patterns)
                .transpose()?,
            ignore_types: compile_patterns(&config.ignore_types)?,
            ignore_properties: compile_patterns(&config.ignore_properties)?,
        };
        Ok(Self {
            config,
            schema_gen: SchemaGenerator::new(filters),
        })
    }

    /// Builds the typed document, without the configured `spec` overlay.
    pub fn build(&self, metadata: &Metadata) -> Result<SwaggerDocument> {
        debug!("Building final Swagger document");
        let definitions = self.schema_gen.build_definitions(&metadata.reference_types);
        let paths = self.build_paths(metadata, &definitions)?;

        let config = self.config;
        Ok(SwaggerDocument {
            swagger: "2.0".to_string(),
            info: Info {
                title: config.name.clone(),
                version: config.version.clone(),
                description: config.description.clone(),
                license: config.license.clone().map(|name| License { name }),
            },
            host: config.host.clone(),
            base_path: config.base_path.clone(),
            consumes: config.consumes.clone(),
            produces: config.produces.clone(),
            security_definitions: config
                .security_definitions
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new())),
            definitions,
            paths,
        })
    }

    /// Builds the document as JSON with the configured `spec` fragment merged over it.
    pub fn build_spec(&self, metadata: &Metadata) -> Result<Value> {
        let mut spec = serde_json::to_value(self.build(metadata)?)?;
        if let Some(overlay) = &self.config.spec {
            debug!("Merging user supplied spec fragment");
            merge_values(&mut spec, overlay.clone());
        }
        Ok(spec)
    }

    fn build_paths(
        &self,
        metadata: &Metadata,
        definitions: &IndexMap<String, Schema>,
    ) -> Result<IndexMap<String, PathItem>> {
        let mut paths: IndexMap<String, PathItem> = IndexMap::new();
        for controller in &metadata.controllers {
            debug!("Generating paths for controller: {}", controller.name);
            for method in &controller.methods {
                let path = join_paths(&[&controller.path, &method.path]);
                debug!("Adding route: {} {}", method.verb.as_str(), path);
                let operation = self.build_operation(controller, method, definitions)?;
                *paths.entry(path).or_default().slot(method.verb) = Some(operation);
            }
        }
        Ok(paths)
    }

    fn build_operation(
        &self,
        controller: &Controller,
        method: &Method,
        definitions: &IndexMap<String, Schema>,
    ) -> Result<Operation> {
        let location = format!("{}.{}", controller.name, method.name);
        let security = method.security.as_ref().or(controller.security.as_ref());

        let (responses, inferred_produces) =
            self.build_responses(controller.responses.iter().chain(&method.responses));
        let produces = union(&controller.produces, &method.produces);
        let produces = if produces.is_empty() {
            inferred_produces.into_iter().collect()
        } else {
            produces
        };

        let mut parameters: Vec<Parameter> = method
            .parameters
            .iter()
            .filter(|p| p.location != ParameterLocation::Param)
            .map(|p| self.build_parameter(p))
            .collect();
        for param in method
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Param)
        {
            for location in [ParameterLocation::Query, ParameterLocation::FormData] {
                let expanded = MethodParameter {
                    location,
                    required: false,
                    default: None,
                    collection_format: None,
                    ..param.clone()
                };
                parameters.push(self.build_parameter(&expanded));
            }
        }
        if parameters.iter().filter(|p| p.location == "body").count() > 1 {
            return Err(Error::endpoint(
                location,
                "Only one body parameter allowed per controller method",
            ));
        }

        let description = if method.description.is_empty() {
            body_description(method, definitions)
        } else {
            method.description.clone()
        };

        Ok(Operation {
            operation_id: operation_id(&controller.name, &method.name),
            description,
            summary: method.summary.clone(),
            deprecated: method.deprecated,
            tags: union(&controller.tags, &method.tags),
            security: security.map(|entries| entries.iter().map(security_requirement).collect()),
            consumes: consumes(&union(&controller.consumes, &method.consumes), method),
            produces,
            parameters,
            responses,
        })
    }

    /// Renders responses by status, later declarations overriding earlier ones, and collects
    /// the media types implied by their schemas.
    fn build_responses<'m>(
        &self,
        declared: impl Iterator<Item = &'m ResponseType>,
    ) -> (IndexMap<String, Response>, IndexSet<String>) {
        let mut responses = IndexMap::new();
        let mut media_types = IndexSet::new();
        for response in declared {
            let schema = response
                .schema
                .as_ref()
                .filter(|ty| !ty.is_void())
                .map(|ty| self.schema_gen.generate_schema(ty));
            if let Some(schema) = &schema {
                media_types.insert(mime_type(schema).to_string());
            }
            let examples = response.examples.clone().map(|example| {
                let mut examples = IndexMap::new();
                examples.insert("application/json".to_string(), example);
                examples
            });
            responses.insert(
                response.status.clone(),
                Response {
                    description: response.description.clone(),
                    schema,
                    examples,
                },
            );
        }
        (responses, media_types)
    }

    fn build_parameter(&self, parameter: &MethodParameter) -> Parameter {
        let mut schema = self.schema_gen.generate_schema(&parameter.ty);
        let mut swagger_parameter = Parameter {
            name: parameter.name.clone(),
            location: parameter.location.as_str().to_string(),
            required: parameter.required,
            description: (!parameter.description.is_empty()).then(|| parameter.description.clone()),
            schema: None,
            parameter_type: None,
            items: None,
            collection_format: None,
            format: schema.format.clone(),
            default: parameter.default.clone(),
            enum_values: schema.enum_values.clone(),
        };

        if schema.reference.is_some() || parameter.location == ParameterLocation::Body {
            if swagger_parameter.description.is_none() {
                swagger_parameter.description = schema.description.take();
            }
            swagger_parameter.schema = Some(schema);
        } else {
            swagger_parameter.parameter_type = schema.schema_type.take();
            if let Some(items) = schema.items.take() {
                swagger_parameter.items = Some(items);
                swagger_parameter.collection_format = parameter
                    .collection_format
                    .clone()
                    .or_else(|| self.config.collection_format.clone());
            }
        }
        swagger_parameter
    }
}

/// Controller name without a trailing `Controller`, followed by the capitalized method name.
/// Snake case method names are camel cased first (`get_person` gives `GetPerson`).
fn operation_id(controller: &str, method: &str) -> String {
    let prefix = controller.strip_suffix("Controller").unwrap_or(controller);
    method
        .split('_')
        .filter(|segment| !segment.is_empty())
        .fold(prefix.to_string(), |mut id, segment| {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                id.extend(first.to_uppercase());
                id.push_str(chars.as_str());
            }
            id
        })
}

/// Ordered, de-duplicated union, controller values first.
fn union(first: &[String], second: &[String]) -> Vec<String> {
    first
        .iter()
        .chain(second)
        .cloned()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn security_requirement(security: &Security) -> IndexMap<String, Vec<String>> {
    let mut requirement = IndexMap::new();
    requirement.insert(security.name.clone(), security.scopes.clone());
    requirement
}

/// Declared media types, or the ones implied by the method's form/file parameters and verb.
fn consumes(declared: &[String], method: &Method) -> Vec<String> {
    if !declared.is_empty() {
        return declared.to_vec();
    }
    let form_params = || {
        method
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::FormData)
    };
    let inferred = if form_params().any(|p| matches!(p.ty, Type::Primitive(PrimitiveKind::File))) {
        "multipart/form-data"
    } else if form_params().next().is_some() {
        "application/x-www-form-urlencoded"
    } else if matches!(method.verb, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch) {
        "application/json"
    } else {
        return Vec::new();
    };
    vec![inferred.to_string()]
}

fn mime_type(schema: &Schema) -> &'static str {
    if schema.reference.is_some() || schema.is_type("array") || schema.is_type("object") {
        "application/json"
    } else if schema.is_type("string") && schema.format.as_deref() == Some("binary") {
        "application/octet-stream"
    } else {
        "text/html"
    }
}

/// Description of the first body parameter's definition that has one.
fn body_description(method: &Method, definitions: &IndexMap<String, Schema>) -> String {
    method
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Body)
        .filter_map(|p| match &p.ty {
            Type::Reference(reference) => definitions.get(&reference.name),
            _ => None,
        })
        .find_map(|definition| definition.description.clone())
        .unwrap_or_default()
}

/// Deep merge: objects merge key by key, anything else in `overlay` replaces `base`.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
