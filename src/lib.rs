//! Swagger From Source - Swagger 2.0 / OpenAPI 3.0 documents from annotated Rust declarations.
//!
//! Controllers are structs (or traits) carrying a `#[path("...")]` attribute; their methods
//! carry verb attributes such as `#[get]` and parameter binding attributes such as
//! `#[path_param]`. Plain structs, enums and type aliases reachable from those methods become
//! definitions.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Expands entry patterns into source files
//! 2. [`parser`] - Parses the files into `syn` syntax trees
//! 3. [`extractor`] - Lowers annotated items into [`declaration`]s
//! 4. [`endpoint_builder`] - Builds controller/method [`metadata`], resolving types through
//!    the [`type_resolver`]
//! 5. [`schema_generator`] - Renders resolved types as schemas
//! 6. [`openapi_builder`] - Assembles the Swagger 2.0 document
//! 7. [`converter`] - Optionally converts it to OpenAPI 3.0
//! 8. [`serializer`] - Writes JSON and YAML output
//!
//! # Example Usage
//!
//! ```no_run
//! use swagger_from_source::{
//!     config::SwaggerConfig,
//!     endpoint_builder::EndpointBuilder,
//!     extractor::{DeclarationExtractor, RustExtractor},
//!     openapi_builder::OpenApiBuilder,
//!     parser::AstParser,
//!     scanner::FileScanner,
//!     serializer::serialize_json,
//! };
//! use std::path::{Path, PathBuf};
//!
//! let config = SwaggerConfig::load(Path::new("swagger.json")).unwrap();
//! let scanner = FileScanner::new(PathBuf::from("."), config.entry_file.clone(), config.ignore.clone());
//! let files = scanner.scan().unwrap().rust_files;
//! let parsed = AstParser::parse_files(&files).unwrap();
//! let declarations = RustExtractor.extract(&parsed).unwrap();
//! let metadata = EndpointBuilder::new(&declarations).build().unwrap();
//! let spec = OpenApiBuilder::new(&config).unwrap().build_spec(&metadata).unwrap();
//! println!("{}", serialize_json(&spec).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod converter;
pub mod declaration;
pub mod endpoint_builder;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod openapi_builder;
pub mod parser;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
