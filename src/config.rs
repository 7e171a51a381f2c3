//! Generator configuration, read from the `swagger` section of a JSON or YAML config file.

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Target document flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "Swagger_2", alias = "Swagger2")]
    Swagger2,
    #[serde(rename = "OpenApi_3", alias = "OpenApi3")]
    OpenApi3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerConfig {
    /// Source files, directories or glob patterns to read declarations from
    #[serde(default, deserialize_with = "one_or_many")]
    pub entry_file: Vec<String>,
    /// Path patterns excluded from `entry_file` expansion
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub output_directory: Vec<PathBuf>,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_yaml")]
    pub yaml: bool,
    pub host: Option<String>,
    pub base_path: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    pub security_definitions: Option<Value>,
    /// Fallback `collectionFormat` for array parameters
    pub collection_format: Option<String>,
    #[serde(default)]
    pub ignore_types: Vec<String>,
    pub include_types: Option<Vec<String>>,
    #[serde(default)]
    pub ignore_properties: Vec<String>,
    /// Fragment deep-merged over the generated document
    pub spec: Option<Value>,
}

fn default_yaml() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}

#[derive(Deserialize)]
struct ConfigFile {
    swagger: Option<SwaggerConfig>,
}

#[derive(Deserialize)]
struct Manifest {
    package: Option<ManifestPackage>,
}

// Values stay loose so `version.workspace = true` style entries don't fail the read.
#[derive(Deserialize)]
struct ManifestPackage {
    name: Option<toml::Value>,
    version: Option<toml::Value>,
    description: Option<toml::Value>,
    license: Option<toml::Value>,
}

impl SwaggerConfig {
    /// Reads and validates the config file at `path`.
    ///
    /// `.yml`/`.yaml` files are read as YAML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Unable to read config file {}: {}", path.display(), e))
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yml") | Some("yaml")
        );
        let file: ConfigFile = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?
        };
        let config = file.swagger.ok_or_else(|| {
            Error::Config(format!("Missing 'swagger' section in {}", path.display()))
        })?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_directory.is_empty() {
            return Err(Error::Config(
                "Missing outputDirectory: configuration must contain output directory".to_string(),
            ));
        }
        if self.entry_file.is_empty() {
            return Err(Error::Config(
                "Missing entryFile: configuration must contain an entry point file".to_string(),
            ));
        }
        Ok(())
    }

    /// Fills `name`, `version`, `description` and `license` from the `[package]` table of
    /// `dir/Cargo.toml`, leaving explicitly configured values alone.
    pub fn with_package_defaults(mut self, dir: &Path) -> Result<Self> {
        let manifest_path = dir.join("Cargo.toml");
        if !manifest_path.is_file() {
            debug!("No Cargo.toml in {}, skipping package defaults", dir.display());
            return Ok(self);
        }
        let content = fs::read_to_string(&manifest_path)?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid manifest {}: {}", manifest_path.display(), e))
        })?;
        let Some(package) = manifest.package else {
            return Ok(self);
        };

        let text = |value: Option<toml::Value>| value.and_then(|v| v.as_str().map(str::to_string));
        self.name = self.name.or_else(|| text(package.name));
        self.version = self.version.or_else(|| text(package.version));
        self.description = self.description.or_else(|| text(package.description));
        self.license = self.license.or_else(|| text(package.license));
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_json_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "swagger.json",
            r#"{"swagger": {"entryFile": "src/api.rs", "outputDirectory": "dist"}}"#,
        );

        let config = SwaggerConfig::load(&path).unwrap();
        assert_eq!(config.entry_file, vec!["src/api.rs"]);
        assert_eq!(config.output_directory, vec![PathBuf::from("dist")]);
        assert_eq!(config.output_format, OutputFormat::Swagger2);
        assert!(config.yaml);
        assert!(config.ignore_types.is_empty());
        assert_eq!(config.include_types, None);
    }

    #[test]
    fn test_load_yaml_with_lists() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "swagger.yaml",
            "swagger:\n  entryFile: [src/a.rs, src/b.rs]\n  outputDirectory: [out1, out2]\n  outputFormat: OpenApi_3\n  yaml: false\n  basePath: /v1\n",
        );

        let config = SwaggerConfig::load(&path).unwrap();
        assert_eq!(config.entry_file.len(), 2);
        assert_eq!(config.output_directory.len(), 2);
        assert_eq!(config.output_format, OutputFormat::OpenApi3);
        assert!(!config.yaml);
        assert_eq!(config.base_path.as_deref(), Some("/v1"));
    }

    #[test]
    fn test_output_format_alias() {
        let format: OutputFormat = serde_json::from_str(r#""OpenApi3""#).unwrap();
        assert_eq!(format, OutputFormat::OpenApi3);
    }

    #[test]
    fn test_missing_output_directory() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "swagger.json", r#"{"swagger": {"entryFile": "src"}}"#);

        let err = SwaggerConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("outputDirectory")));
    }

    #[test]
    fn test_missing_entry_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "swagger.json", r#"{"swagger": {"outputDirectory": "dist"}}"#);

        let err = SwaggerConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("entryFile")));
    }

    #[test]
    fn test_missing_swagger_section() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "swagger.json", r#"{"other": {}}"#);

        assert!(matches!(
            SwaggerConfig::load(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_package_defaults() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "Cargo.toml",
            "[package]\nname = \"petstore\"\nversion.workspace = true\ndescription = \"Pets\"\nlicense = \"MIT\"\n",
        );
        let path = write(
            &dir,
            "swagger.json",
            r#"{"swagger": {"entryFile": "src", "outputDirectory": "dist", "name": "Pet API"}}"#,
        );

        let config = SwaggerConfig::load(&path)
            .unwrap()
            .with_package_defaults(dir.path())
            .unwrap();
        assert_eq!(config.name.as_deref(), Some("Pet API"));
        assert_eq!(config.version, None);
        assert_eq!(config.description.as_deref(), Some("Pets"));
        assert_eq!(config.license.as_deref(), Some("MIT"));
    }
}
