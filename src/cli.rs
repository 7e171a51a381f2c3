use crate::config::{OutputFormat, SwaggerConfig};
use crate::converter::{ConverterOptions, OpenApi3Converter, SpecConverter};
use crate::endpoint_builder::EndpointBuilder;
use crate::extractor::{DeclarationExtractor, RustExtractor};
use crate::openapi_builder::OpenApiBuilder;
use crate::parser::AstParser;
use crate::scanner::FileScanner;
use crate::serializer::write_documents;
use anyhow::{bail, Result};
use clap::Parser;
use log::{debug, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Swagger From Source - generate Swagger/OpenAPI documents from annotated Rust declarations
#[derive(Parser, Debug)]
#[command(name = "swagger-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file (JSON or YAML) with a top level `swagger` section
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "swagger.json")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);
    if !args.config.is_file() {
        bail!("Configuration file does not exist: {}", args.config.display());
    }
    info!("Configuration file: {}", args.config.display());
    Ok(args)
}

/// Produces the final document for `config`, resolving entry patterns against `base_dir`.
pub fn generate(config: &SwaggerConfig, base_dir: &Path) -> Result<Value> {
    info!("Scanning entry files...");
    let scanner = FileScanner::new(
        base_dir.to_path_buf(),
        config.entry_file.clone(),
        config.ignore.clone(),
    );
    let scan_result = scanner.scan()?;
    info!("Found {} Rust files", scan_result.rust_files.len());
    if scan_result.rust_files.is_empty() {
        bail!("No Rust files matched entryFile {:?}", config.entry_file);
    }

    info!("Parsing Rust files...");
    let parsed_files = AstParser::parse_files(&scan_result.rust_files)?;

    info!("Extracting declarations...");
    let declarations = RustExtractor.extract(&parsed_files)?;

    info!("Building endpoint metadata...");
    let metadata = EndpointBuilder::new(&declarations).build()?;
    let method_count: usize = metadata.controllers.iter().map(|c| c.methods.len()).sum();
    if method_count == 0 {
        warn!("No endpoints found in the entry files");
    }

    info!("Building Swagger document...");
    let spec = OpenApiBuilder::new(config)?.build_spec(&metadata)?;

    let spec = match config.output_format {
        OutputFormat::Swagger2 => spec,
        OutputFormat::OpenApi3 => {
            info!("Converting to OpenAPI 3.0...");
            OpenApi3Converter::new(ConverterOptions {
                patch: true,
                warn_only: true,
            })
            .convert(spec)?
        }
    };

    info!("Summary:");
    info!("  - Files scanned: {}", scan_result.rust_files.len());
    info!("  - Controllers: {}", metadata.controllers.len());
    info!("  - Endpoints: {}", method_count);
    info!("  - Definitions: {}", metadata.reference_types.len());
    Ok(spec)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    let base_dir = std::env::current_dir()?;
    let config = SwaggerConfig::load(&args.config)?.with_package_defaults(&base_dir)?;
    debug!("Configuration: {:?}", config);

    let spec = generate(&config, &base_dir)?;

    let written = write_documents(&spec, &config.output_directory, config.yaml)?;
    for path in &written {
        info!("Wrote {}", path.display());
    }
    info!("Generation completed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_path() {
        let args = CliArgs::parse_from(["swagger-from-source"]);
        assert_eq!(args.config, PathBuf::from("swagger.json"));
        assert!(!args.verbose);

        let args = CliArgs::parse_from(["swagger-from-source", "-c", "api.yaml", "-v"]);
        assert_eq!(args.config, PathBuf::from("api.yaml"));
        assert!(args.verbose);
    }

    #[test]
    fn test_missing_config_file() {
        let args = CliArgs::parse_from(["swagger-from-source", "-c", "/nonexistent/swagger.json"]);
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_generate_openapi3() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("api.rs"),
            r#"
            pub struct Pet { pub name: String }

            #[path("pets")]
            pub struct PetsController;

            impl PetsController {
                #[post]
                pub fn create(&self, pet: Pet) -> Pet { unimplemented!() }
            }
            "#,
        )
        .unwrap();
        let config: SwaggerConfig = serde_json::from_value(json!({
            "entryFile": "api.rs",
            "outputDirectory": "dist",
            "outputFormat": "OpenApi_3",
            "host": "localhost:3000"
        }))
        .unwrap();

        let spec = generate(&config, temp_dir.path()).unwrap();
        assert_eq!(spec["openapi"], json!("3.0.0"));
        assert_eq!(spec["servers"], json!([{"url": "//localhost:3000"}]));
        let operation = &spec["paths"]["/pets"]["post"];
        assert_eq!(
            operation["requestBody"]["content"]["application/json"]["schema"],
            json!({"$ref": "#/components/schemas/Pet"})
        );
        assert!(spec["components"]["schemas"].get("Pet").is_some());
    }

    #[test]
    fn test_generate_without_sources() {
        let temp_dir = TempDir::new().unwrap();
        let config: SwaggerConfig = serde_json::from_value(json!({
            "entryFile": "src/**/*.rs",
            "outputDirectory": "dist"
        }))
        .unwrap();
        assert!(generate(&config, temp_dir.path()).is_err());
    }
}
