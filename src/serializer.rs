//! Writing finished documents as `swagger.json` and `swagger.yaml`.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::path::{Path, PathBuf};

pub const JSON_FILE_NAME: &str = "swagger.json";
pub const YAML_FILE_NAME: &str = "swagger.yaml";

/// Serializes a document to YAML.
pub fn serialize_yaml<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes a document to JSON, pretty printed with tab indentation.
pub fn serialize_json<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to JSON");
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
    doc.serialize(&mut serializer)
        .context("Failed to serialize document to JSON")?;
    String::from_utf8(out).context("Serialized JSON is not valid UTF-8")
}

/// Writes string content to a file, creating parent directories as needed.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;
    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Writes `swagger.json`, and `swagger.yaml` when `yaml` is set, into every output
/// directory. Returns the written paths.
pub fn write_documents<T: Serialize>(
    doc: &T,
    output_directories: &[PathBuf],
    yaml: bool,
) -> Result<Vec<PathBuf>> {
    let json = serialize_json(doc)?;
    let yaml = if yaml { Some(serialize_yaml(doc)?) } else { None };

    let mut written = Vec::new();
    for dir in output_directories {
        info!("Saving document to {}", dir.display());
        let json_path = dir.join(JSON_FILE_NAME);
        write_to_file(&json, &json_path)?;
        written.push(json_path);
        if let Some(yaml) = &yaml {
            let yaml_path = dir.join(YAML_FILE_NAME);
            write_to_file(yaml, &yaml_path)?;
            written.push(yaml_path);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn document() -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "People"},
            "paths": {"/people": {"get": {"operationId": "PeopleList", "responses": {}}}}
        })
    }

    #[test]
    fn test_serialize_json_uses_tabs() {
        let json = serialize_json(&document()).unwrap();
        assert!(json.starts_with("{\n\t\"swagger\": \"2.0\""));
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, document());
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&document()).unwrap();
        assert!(yaml.contains("swagger: '2.0'"));
        let parsed: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, document());
    }

    #[test]
    fn test_write_documents_to_every_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dirs = vec![temp_dir.path().join("a"), temp_dir.path().join("b/nested")];

        let written = write_documents(&document(), &dirs, true).unwrap();
        assert_eq!(written.len(), 4);
        for dir in &dirs {
            assert!(dir.join(JSON_FILE_NAME).is_file());
            assert!(dir.join(YAML_FILE_NAME).is_file());
        }
    }

    #[test]
    fn test_write_documents_without_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let dirs = vec![temp_dir.path().to_path_buf()];

        write_documents(&document(), &dirs, false).unwrap();
        assert!(temp_dir.path().join(JSON_FILE_NAME).is_file());
        assert!(!temp_dir.path().join(YAML_FILE_NAME).exists());
    }

    #[test]
    fn test_write_to_file_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");
        write_to_file("first", &path).unwrap();
        write_to_file("second", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }
}
