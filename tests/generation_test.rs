use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;
use swagger_from_source::{
    cli::generate,
    config::SwaggerConfig,
    endpoint_builder::EndpointBuilder,
    error::Error,
    extractor::{DeclarationExtractor, RustExtractor},
    openapi_builder::OpenApiBuilder,
    parser::ParsedFile,
    serializer::{write_documents, JSON_FILE_NAME, YAML_FILE_NAME},
};
use tempfile::TempDir;

fn parse(name: &str, code: &str) -> ParsedFile {
    ParsedFile {
        path: PathBuf::from(name),
        syntax_tree: syn::parse_file(code).expect("Failed to parse fixture"),
    }
}

fn config(extra: Value) -> SwaggerConfig {
    let mut base = json!({"entryFile": "src", "outputDirectory": "dist"});
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    serde_json::from_value(base).expect("Invalid test config")
}

fn build(sources: &[(&str, &str)], config: &SwaggerConfig) -> Result<Value, Error> {
    let parsed: Vec<ParsedFile> = sources.iter().map(|(name, code)| parse(name, code)).collect();
    let declarations = RustExtractor.extract(&parsed)?;
    let metadata = EndpointBuilder::new(&declarations).build()?;
    OpenApiBuilder::new(config)?.build_spec(&metadata)
}

fn people_spec() -> Value {
    build(
        &[("people_api.rs", include_str!("fixtures/people_api.rs"))],
        &config(json!({})),
    )
    .expect("Failed to build people document")
}

#[test]
fn test_end_to_end_person_lookup() {
    let code = r#"
        pub struct Person {
            pub name: String,
            #[is_int]
            pub age: f64,
        }

        #[path("/people")]
        pub struct PeopleController;

        impl PeopleController {
            #[get("/{id}")]
            pub fn get(&self, #[path_param] id: String) -> Vec<Person> {
                todo!()
            }
        }
    "#;
    let spec = build(&[("people.rs", code)], &config(json!({}))).unwrap();

    let operation = &spec["paths"]["/people/{id}"]["get"];
    assert_eq!(
        operation["parameters"],
        json!([{"name": "id", "in": "path", "required": true, "type": "string"}])
    );
    assert_eq!(
        operation["responses"]["200"]["schema"],
        json!({"type": "array", "items": {"$ref": "#/definitions/Person"}})
    );
    assert_eq!(
        spec["definitions"]["Person"],
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "format": "int32"}
            },
            "required": ["name", "age"]
        })
    );
}

#[test]
fn test_fixture_paths_and_operations() {
    let spec = people_spec();
    let paths = spec["paths"].as_object().unwrap();
    let keys: Vec<&String> = paths.keys().collect();
    assert_eq!(keys, vec!["/people/{id}", "/people", "/people/audits"]);

    let get = &spec["paths"]["/people/{id}"]["get"];
    assert_eq!(get["operationId"], json!("PeopleGetPerson"));
    assert_eq!(get["description"], json!("Fetch a person by id"));
    assert_eq!(get["tags"], json!(["people"]));

    let remove = &spec["paths"]["/people/{id}"]["delete"];
    assert_eq!(remove["responses"], json!({"204": {"description": "No content"}}));
    assert_eq!(remove["security"], json!([{"oauth": ["admin"]}]));
    assert_eq!(remove.get("consumes"), None);

    assert!(spec["paths"]["/people/internal"].is_null());
}

#[test]
fn test_fixture_query_parameters() {
    let spec = people_spec();
    let list = &spec["paths"]["/people"]["get"];
    assert_eq!(
        list["parameters"],
        json!([
            {"name": "status", "in": "query", "required": false, "type": "string",
             "enum": ["active", "banned"]},
            {"name": "pageNumber", "in": "query", "required": false, "type": "integer",
             "format": "int32", "default": 1}
        ])
    );
    assert_eq!(
        list["responses"]["200"]["schema"],
        json!({"$ref": "#/definitions/models.PagePerson"})
    );
    assert_eq!(
        spec["definitions"]["models.PagePerson"]["properties"]["items"],
        json!({"type": "array", "items": {"$ref": "#/definitions/models.Person"}})
    );
}

#[test]
fn test_fixture_new_resource_response() {
    let spec = people_spec();
    let create = &spec["paths"]["/people"]["post"];
    assert_eq!(
        create["responses"],
        json!({
            "409": {"description": "Already registered"},
            "201": {"description": "Ok", "schema": {"$ref": "#/definitions/models.Person"}}
        })
    );
    assert_eq!(create["consumes"], json!(["application/json"]));
    assert_eq!(create["produces"], json!(["application/json"]));
    assert_eq!(create["description"], json!("A person"));
    assert_eq!(
        create["parameters"],
        json!([{"name": "person", "in": "body", "required": true,
                "schema": {"$ref": "#/definitions/models.Person"}}])
    );
}

#[test]
fn test_fixture_namespaced_definition() {
    let spec = people_spec();
    assert_eq!(
        spec["definitions"]["admin.Audit"],
        json!({
            "type": "object",
            "description": "Audit trail entry",
            "properties": {
                "at": {"type": "string", "format": "date-time"},
                "actor": {"type": "string"},
                "subject": {
                    "allOf": [{"$ref": "#/definitions/models.Person"}],
                    "description": "Record touched by the change"
                }
            },
            "required": ["at", "subject"]
        })
    );
}

#[test]
fn test_definition_filters_from_config() {
    let spec = build(
        &[("people_api.rs", include_str!("fixtures/people_api.rs"))],
        &config(json!({"ignoreTypes": ["admin.*"], "ignoreProperties": ["total"]})),
    )
    .unwrap();
    let definitions = spec["definitions"].as_object().unwrap();
    assert!(!definitions.contains_key("admin.Audit"));
    assert!(spec["definitions"]["models.PagePerson"]["properties"]
        .get("total")
        .is_none());
}

#[test]
fn test_file_upload_trait_controller() {
    let spec = build(
        &[("files_api.rs", include_str!("fixtures/files_api.rs"))],
        &config(json!({})),
    )
    .unwrap();
    let upload = &spec["paths"]["/files"]["post"];
    assert_eq!(upload["summary"], json!("Upload a document"));
    assert_eq!(upload["consumes"], json!(["multipart/form-data"]));
    assert_eq!(
        upload["parameters"],
        json!([
            {"name": "document", "in": "formData", "required": true, "type": "file"},
            {"name": "label", "in": "formData", "required": true, "type": "string"}
        ])
    );

    let download = &spec["paths"]["/files/{name}"]["get"];
    assert_eq!(download["parameters"].as_array().unwrap().len(), 1);
}

#[test]
fn test_path_parameter_must_appear_in_path() {
    let code = r#"
        #[path("/items")]
        pub struct ItemsController;

        impl ItemsController {
            #[get]
            pub fn find(&self, #[path_param] id: String) -> String {
                todo!()
            }
        }
    "#;
    let err = build(&[("items.rs", code)], &config(json!({}))).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("id"), "{}", message);
    assert!(message.contains("ItemsController.find"), "{}", message);
}

#[test]
fn test_user_spec_is_merged_last() {
    let spec = build(
        &[("people_api.rs", include_str!("fixtures/people_api.rs"))],
        &config(json!({
            "name": "People",
            "version": "1.0",
            "spec": {"info": {"version": "2.0"}, "schemes": ["https"]}
        })),
    )
    .unwrap();
    assert_eq!(spec["info"], json!({"title": "People", "version": "2.0"}));
    assert_eq!(spec["schemes"], json!(["https"]));
}

#[test]
fn test_generate_writes_every_output_directory() {
    let project = TempDir::new().unwrap();
    let src = project.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("people_api.rs"), include_str!("fixtures/people_api.rs")).unwrap();
    std::fs::write(src.join("files_api.rs"), include_str!("fixtures/files_api.rs")).unwrap();

    let out = vec![project.path().join("docs"), project.path().join("public/api")];
    let config = config(json!({"ignore": ["**/files_api.rs"]}));
    let spec = generate(&config, project.path()).unwrap();
    assert!(spec["paths"].get("/files").is_none());
    assert!(spec["paths"].get("/people").is_some());

    write_documents(&spec, &out, config.yaml).unwrap();
    for dir in &out {
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(JSON_FILE_NAME)).unwrap())
                .unwrap();
        assert_eq!(written, spec);
        assert!(dir.join(YAML_FILE_NAME).is_file());
    }
}
