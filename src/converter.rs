//! Swagger 2.0 to OpenAPI 3.0 conversion.

use crate::error::{Error, Result};
use log::{debug, warn};
use serde_json::{json, Map, Value};

const DEFINITIONS_REF: &str = "#/definitions/";
const SCHEMAS_REF: &str = "#/components/schemas/";
const DEFAULT_MEDIA_TYPE: &str = "application/json";
const VERBS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Turns a finished Swagger 2.0 document into another document flavour.
pub trait SpecConverter {
    fn convert(&self, swagger: Value) -> Result<Value>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConverterOptions {
    /// Repair small defects (missing info fields, path parameters not marked required)
    pub patch: bool,
    /// Log problems and skip the offending element instead of failing
    pub warn_only: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            patch: true,
            warn_only: true,
        }
    }
}

/// Built-in Swagger 2.0 to OpenAPI 3.0.0 converter.
#[derive(Debug, Clone, Default)]
pub struct OpenApi3Converter {
    options: ConverterOptions,
}

impl OpenApi3Converter {
    pub fn new(options: ConverterOptions) -> Self {
        Self { options }
    }

    /// Reports `message` as a warning in lenient mode, as an error otherwise.
    fn problem(&self, message: String) -> Result<()> {
        if self.options.warn_only {
            warn!("{}", message);
            Ok(())
        } else {
            Err(Error::Conversion(message))
        }
    }

    fn convert_info(&self, info: Option<Value>) -> Result<Value> {
        let mut info = match info {
            Some(Value::Object(info)) => info,
            _ => Map::new(),
        };
        for field in ["title", "version"] {
            if !info.contains_key(field) {
                if self.options.patch {
                    debug!("Patching missing info.{}", field);
                    info.insert(field.to_string(), Value::String(String::new()));
                } else {
                    self.problem(format!("info.{} is required", field))?;
                }
            }
        }
        Ok(Value::Object(info))
    }

    fn convert_security_schemes(&self, definitions: Map<String, Value>) -> Result<Map<String, Value>> {
        let mut schemes = Map::new();
        for (name, scheme) in definitions {
            match self.convert_security_scheme(&scheme) {
                Some(converted) => {
                    schemes.insert(name, converted);
                }
                None => self.problem(format!("Unsupported security definition '{}'", name))?,
            }
        }
        Ok(schemes)
    }

    fn convert_security_scheme(&self, scheme: &Value) -> Option<Value> {
        let mut converted = scheme.as_object()?.clone();
        match scheme.get("type")?.as_str()? {
            "basic" => {
                converted.insert("type".to_string(), json!("http"));
                converted.insert("scheme".to_string(), json!("basic"));
            }
            "apiKey" => {}
            "oauth2" => {
                let (flow, keys): (&str, &[&str]) = match scheme.get("flow")?.as_str()? {
                    "implicit" => ("implicit", &["authorizationUrl"]),
                    "password" => ("password", &["tokenUrl"]),
                    "application" => ("clientCredentials", &["tokenUrl"]),
                    "accessCode" => ("authorizationCode", &["authorizationUrl", "tokenUrl"]),
                    _ => return None,
                };
                let mut flow_object = Map::new();
                for key in keys {
                    flow_object.insert(key.to_string(), converted.remove(*key)?);
                }
                flow_object.insert(
                    "scopes".to_string(),
                    converted.remove("scopes").unwrap_or_else(|| json!({})),
                );
                converted.remove("flow");
                let mut flows = Map::new();
                flows.insert(flow.to_string(), Value::Object(flow_object));
                converted.insert("flows".to_string(), Value::Object(flows));
            }
            _ => return None,
        }
        Some(Value::Object(converted))
    }

    fn convert_operation(
        &self,
        location: &str,
        mut operation: Map<String, Value>,
        shared_parameters: &[Value],
        global_consumes: &[String],
        global_produces: &[String],
    ) -> Result<Value> {
        let consumes = media_types(operation.remove("consumes"), global_consumes);
        let produces = media_types(operation.remove("produces"), global_produces);

        let mut parameters = shared_parameters.to_vec();
        if let Some(Value::Array(own)) = operation.remove("parameters") {
            parameters.extend(own);
        }

        let mut converted = Vec::new();
        let mut form_properties = Map::new();
        let mut form_required = Vec::new();
        let mut has_file = false;
        for parameter in parameters {
            let Value::Object(mut parameter) = parameter else {
                self.problem(format!("Parameter of {} is not an object", location))?;
                continue;
            };
            let name = parameter
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let kind = parameter
                .get("in")
                .and_then(Value::as_str)
                .map(str::to_string);
            match kind.as_deref() {
                Some("body") => {
                    let schema = parameter.remove("schema").unwrap_or_else(|| json!({}));
                    let mut body = Map::new();
                    if let Some(description) = parameter.remove("description") {
                        body.insert("description".to_string(), description);
                    }
                    body.insert("content".to_string(), content(&consumes, &schema));
                    if parameter.get("required").and_then(Value::as_bool) == Some(true) {
                        body.insert("required".to_string(), json!(true));
                    }
                    operation.insert("requestBody".to_string(), Value::Object(body));
                }
                Some("formData") => {
                    if parameter.remove("required").and_then(|r| r.as_bool()) == Some(true) {
                        form_required.push(Value::String(name.clone()));
                    }
                    has_file |= parameter.get("type").and_then(Value::as_str) == Some("file");
                    let mut schema = parameter_schema(&mut parameter);
                    if let Some(description) = parameter.remove("description") {
                        schema.insert("description".to_string(), description);
                    }
                    form_properties.insert(name, Value::Object(schema));
                }
                Some(kind @ ("path" | "query" | "header" | "cookie")) => {
                    if kind == "path" && parameter.get("required").and_then(Value::as_bool) != Some(true) {
                        if self.options.patch {
                            debug!("Marking path parameter {} of {} as required", name, location);
                            parameter.insert("required".to_string(), json!(true));
                        } else {
                            self.problem(format!(
                                "Path parameter '{}' of {} must be required",
                                name, location
                            ))?;
                        }
                    }
                    converted.push(Value::Object(convert_parameter(parameter)));
                }
                other => self.problem(format!(
                    "Unsupported parameter location {:?} for '{}' in {}",
                    other, name, location
                ))?,
            }
        }

        if !form_properties.is_empty() {
            let form_types: Vec<String> = if has_file {
                vec!["multipart/form-data".to_string()]
            } else {
                let declared: Vec<String> = consumes
                    .iter()
                    .filter(|t| t.contains("form"))
                    .cloned()
                    .collect();
                if declared.is_empty() {
                    vec!["application/x-www-form-urlencoded".to_string()]
                } else {
                    declared
                }
            };
            let mut schema = Map::new();
            schema.insert("type".to_string(), json!("object"));
            schema.insert("properties".to_string(), Value::Object(form_properties));
            if !form_required.is_empty() {
                schema.insert("required".to_string(), Value::Array(form_required));
            }
            operation.insert(
                "requestBody".to_string(),
                json!({ "content": content(&form_types, &Value::Object(schema)) }),
            );
        }
        if !converted.is_empty() {
            operation.insert("parameters".to_string(), Value::Array(converted));
        }

        if let Some(Value::Object(responses)) = operation.remove("responses") {
            let responses = responses
                .into_iter()
                .map(|(status, response)| (status, convert_response(response, &produces)))
                .collect();
            operation.insert("responses".to_string(), Value::Object(responses));
        }
        Ok(Value::Object(operation))
    }
}

impl SpecConverter for OpenApi3Converter {
    fn convert(&self, swagger: Value) -> Result<Value> {
        let Value::Object(mut swagger) = swagger else {
            return Err(Error::Conversion("document is not an object".to_string()));
        };
        match swagger.get("swagger").and_then(Value::as_str) {
            Some("2.0") => {}
            other => {
                return Err(Error::Conversion(format!(
                    "expected a Swagger 2.0 document, found version {:?}",
                    other
                )))
            }
        }
        debug!("Converting Swagger 2.0 document to OpenAPI 3.0");

        let global_consumes = string_list(swagger.remove("consumes"));
        let global_produces = string_list(swagger.remove("produces"));

        let mut openapi = Map::new();
        openapi.insert("openapi".to_string(), json!("3.0.0"));
        openapi.insert("info".to_string(), self.convert_info(swagger.remove("info"))?);

        let servers = servers(
            swagger.remove("host"),
            swagger.remove("basePath"),
            swagger.remove("schemes"),
        );
        if !servers.is_empty() {
            openapi.insert("servers".to_string(), Value::Array(servers));
        }
        for key in ["tags", "security", "externalDocs"] {
            if let Some(value) = swagger.remove(key) {
                openapi.insert(key.to_string(), value);
            }
        }

        let mut paths = Map::new();
        if let Some(Value::Object(source)) = swagger.remove("paths") {
            for (path, item) in source {
                let Value::Object(mut item) = item else {
                    self.problem(format!("Path item {} is not an object", path))?;
                    continue;
                };
                let shared = match item.remove("parameters") {
                    Some(Value::Array(shared)) => shared,
                    _ => Vec::new(),
                };
                let mut converted = Map::new();
                for (key, value) in item {
                    match (VERBS.contains(&key.as_str()), value) {
                        (true, Value::Object(operation)) => {
                            let location = format!("{} {}", key, path);
                            let operation = self.convert_operation(
                                &location,
                                operation,
                                &shared,
                                &global_consumes,
                                &global_produces,
                            )?;
                            converted.insert(key, operation);
                        }
                        (true, _) => {
                            self.problem(format!("Operation {} {} is not an object", key, path))?
                        }
                        (false, value) => {
                            converted.insert(key, value);
                        }
                    }
                }
                paths.insert(path, Value::Object(converted));
            }
        }
        openapi.insert("paths".to_string(), Value::Object(paths));

        let mut components = Map::new();
        if let Some(Value::Object(definitions)) = swagger.remove("definitions") {
            if !definitions.is_empty() {
                components.insert("schemas".to_string(), Value::Object(definitions));
            }
        }
        if let Some(Value::Object(definitions)) = swagger.remove("securityDefinitions") {
            let schemes = self.convert_security_schemes(definitions)?;
            if !schemes.is_empty() {
                components.insert("securitySchemes".to_string(), Value::Object(schemes));
            }
        }
        openapi.insert("components".to_string(), Value::Object(components));

        // vendor extensions travel unchanged
        for (key, value) in swagger {
            if key.starts_with("x-") {
                openapi.insert(key, value);
            }
        }

        let mut openapi = Value::Object(openapi);
        fix_schemas(&mut openapi);
        Ok(openapi)
    }
}

fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn media_types(own: Option<Value>, global: &[String]) -> Vec<String> {
    let own = string_list(own);
    if !own.is_empty() {
        own
    } else if !global.is_empty() {
        global.to_vec()
    } else {
        vec![DEFAULT_MEDIA_TYPE.to_string()]
    }
}

fn content(media_types: &[String], schema: &Value) -> Value {
    let content: Map<String, Value> = media_types
        .iter()
        .map(|media_type| (media_type.clone(), json!({ "schema": schema })))
        .collect();
    Value::Object(content)
}

fn servers(host: Option<Value>, base_path: Option<Value>, schemes: Option<Value>) -> Vec<Value> {
    let host = host.and_then(|h| h.as_str().map(str::to_string));
    let base_path = base_path
        .and_then(|b| b.as_str().map(str::to_string))
        .unwrap_or_default();
    match host {
        Some(host) => {
            let schemes = string_list(schemes);
            if schemes.is_empty() {
                vec![json!({ "url": format!("//{}{}", host, base_path) })]
            } else {
                schemes
                    .iter()
                    .map(|scheme| json!({ "url": format!("{}://{}{}", scheme, host, base_path) }))
                    .collect()
            }
        }
        None if !base_path.is_empty() => vec![json!({ "url": base_path })],
        None => Vec::new(),
    }
}

/// Moves the Swagger 2.0 type keywords of a non-body parameter into a schema object.
fn parameter_schema(parameter: &mut Map<String, Value>) -> Map<String, Value> {
    let mut schema = Map::new();
    for key in [
        "type",
        "format",
        "items",
        "default",
        "enum",
        "minimum",
        "maximum",
        "pattern",
    ] {
        if let Some(value) = parameter.remove(key) {
            schema.insert(key.to_string(), value);
        }
    }
    schema
}

fn convert_parameter(mut parameter: Map<String, Value>) -> Map<String, Value> {
    let collection_format = parameter.remove("collectionFormat");
    if !parameter.contains_key("schema") {
        let schema = parameter_schema(&mut parameter);
        parameter.insert("schema".to_string(), Value::Object(schema));
    }
    let style = match collection_format.as_ref().and_then(Value::as_str) {
        Some("csv") => Some(("form", false)),
        Some("multi") => Some(("form", true)),
        Some("ssv") => Some(("spaceDelimited", false)),
        Some("pipes") => Some(("pipeDelimited", false)),
        _ => None,
    };
    if let Some((style, explode)) = style {
        let in_query = parameter.get("in").and_then(Value::as_str) == Some("query");
        let style = if in_query { style } else { "simple" };
        parameter.insert("style".to_string(), json!(style));
        parameter.insert("explode".to_string(), json!(explode));
    }
    parameter
}

fn convert_response(response: Value, produces: &[String]) -> Value {
    let Value::Object(mut response) = response else {
        return response;
    };
    let schema = response.remove("schema");
    let examples = match response.remove("examples") {
        Some(Value::Object(examples)) => examples,
        _ => Map::new(),
    };
    if schema.is_none() && examples.is_empty() {
        return Value::Object(response);
    }

    let mut content = Map::new();
    if let Some(schema) = &schema {
        for media_type in produces {
            content.insert(media_type.clone(), json!({ "schema": schema }));
        }
    }
    for (media_type, example) in examples {
        let entry = content
            .entry(media_type)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(entry) = entry {
            entry.insert("example".to_string(), example);
        }
    }
    response.insert("content".to_string(), Value::Object(content));
    Value::Object(response)
}

/// Rewrites definition references and `file` types everywhere in the document.
fn fix_schemas(value: &mut Value) {
    match value {
        Value::Object(object) => {
            if let Some(Value::String(reference)) = object.get_mut("$ref") {
                if let Some(name) = reference.strip_prefix(DEFINITIONS_REF) {
                    *reference = format!("{}{}", SCHEMAS_REF, name);
                }
            }
            if object.get("type").and_then(Value::as_str) == Some("file") {
                object.insert("type".to_string(), json!("string"));
                object.insert("format".to_string(), json!("binary"));
            }
            object.values_mut().for_each(fix_schemas);
        }
        Value::Array(items) => items.iter_mut().for_each(fix_schemas),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn convert(swagger: Value) -> Value {
        OpenApi3Converter::default().convert(swagger).unwrap()
    }

    #[test]
    fn test_document_frame() {
        let openapi = convert(json!({
            "swagger": "2.0",
            "info": {"title": "People"},
            "host": "api.example.com",
            "basePath": "/v1",
            "securityDefinitions": {"basic": {"type": "basic"}},
            "definitions": {
                "Person": {"type": "object", "properties": {"friend": {"$ref": "#/definitions/Person"}}}
            },
            "paths": {}
        }));
        assert_eq!(openapi["openapi"], json!("3.0.0"));
        assert_eq!(openapi["info"], json!({"title": "People", "version": ""}));
        assert_eq!(openapi["servers"], json!([{"url": "//api.example.com/v1"}]));
        assert_eq!(
            openapi["components"]["schemas"]["Person"]["properties"]["friend"],
            json!({"$ref": "#/components/schemas/Person"})
        );
        assert_eq!(
            openapi["components"]["securitySchemes"]["basic"],
            json!({"type": "http", "scheme": "basic"})
        );
    }

    #[test]
    fn test_body_and_responses() {
        let openapi = convert(json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/people": {"post": {
                "operationId": "PeopleCreate",
                "consumes": ["application/json"],
                "produces": ["application/json"],
                "parameters": [
                    {"name": "person", "in": "body", "required": true,
                     "schema": {"$ref": "#/definitions/Person"}},
                    {"name": "dryRun", "in": "query", "required": false, "type": "boolean"}
                ],
                "responses": {"201": {
                    "description": "Created",
                    "schema": {"$ref": "#/definitions/Person"},
                    "examples": {"application/json": {"name": "Ann"}}
                }}
            }}}
        }));
        let operation = &openapi["paths"]["/people"]["post"];
        assert_eq!(
            operation["requestBody"],
            json!({"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Person"}}},
                   "required": true})
        );
        assert_eq!(
            operation["parameters"],
            json!([{"name": "dryRun", "in": "query", "required": false, "schema": {"type": "boolean"}}])
        );
        assert_eq!(
            operation["responses"]["201"]["content"]["application/json"],
            json!({"schema": {"$ref": "#/components/schemas/Person"}, "example": {"name": "Ann"}})
        );
        assert_eq!(operation.get("consumes"), None);
    }

    #[test]
    fn test_form_data_with_file() {
        let openapi = convert(json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/upload": {"post": {
                "parameters": [
                    {"name": "file", "in": "formData", "required": true, "type": "file"},
                    {"name": "note", "in": "formData", "required": false, "type": "string"}
                ],
                "responses": {"204": {"description": "No content"}}
            }}}
        }));
        let body = &openapi["paths"]["/upload"]["post"]["requestBody"];
        assert_eq!(
            body["content"]["multipart/form-data"]["schema"],
            json!({
                "type": "object",
                "properties": {
                    "file": {"type": "string", "format": "binary"},
                    "note": {"type": "string"}
                },
                "required": ["file"]
            })
        );
        assert_eq!(
            openapi["paths"]["/upload"]["post"]["responses"]["204"],
            json!({"description": "No content"})
        );
    }

    #[test]
    fn test_collection_format_and_oauth() {
        let openapi = convert(json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "securityDefinitions": {"oauth": {
                "type": "oauth2", "flow": "password", "tokenUrl": "https://auth/token",
                "scopes": {"read": "Read access"}
            }},
            "paths": {"/search": {"get": {
                "parameters": [{"name": "ids", "in": "query", "required": false, "type": "array",
                                "items": {"type": "integer"}, "collectionFormat": "multi"}],
                "responses": {}
            }}}
        }));
        assert_eq!(
            openapi["paths"]["/search"]["get"]["parameters"][0],
            json!({"name": "ids", "in": "query", "required": false,
                   "schema": {"type": "array", "items": {"type": "integer"}},
                   "style": "form", "explode": true})
        );
        assert_eq!(
            openapi["components"]["securitySchemes"]["oauth"],
            json!({"type": "oauth2", "flows": {"password": {
                "tokenUrl": "https://auth/token", "scopes": {"read": "Read access"}}}})
        );
    }

    #[test]
    fn test_lenient_and_strict_modes() {
        let swagger = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "securityDefinitions": {"odd": {"type": "mystery"}},
            "paths": {}
        });
        let lenient = convert(swagger.clone());
        assert_eq!(lenient["components"].get("securitySchemes"), None);

        let strict = OpenApi3Converter::new(ConverterOptions {
            patch: true,
            warn_only: false,
        });
        assert!(matches!(strict.convert(swagger), Err(Error::Conversion(_))));
    }

    #[test]
    fn test_path_parameter_patch() {
        let swagger = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {"/people/{id}": {"get": {
                "parameters": [{"name": "id", "in": "path", "type": "string"}],
                "responses": {}
            }}}
        });
        let openapi = convert(swagger.clone());
        assert_eq!(
            openapi["paths"]["/people/{id}"]["get"]["parameters"][0]["required"],
            json!(true)
        );

        let unpatched = OpenApi3Converter::new(ConverterOptions {
            patch: false,
            warn_only: false,
        });
        assert!(unpatched.convert(swagger).is_err());
    }

    #[test]
    fn test_rejects_other_versions() {
        let err = OpenApi3Converter::default()
            .convert(json!({"openapi": "3.0.0"}))
            .unwrap_err();
        assert!(err.to_string().contains("Swagger 2.0"));
    }
}
