use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Parser turning declaration sources into `syn` syntax trees.
///
/// # Example
///
/// ```no_run
/// use swagger_from_source::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/api.rs")).unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A parsed source file.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Parses a single source file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`] if it is not
    /// valid Rust.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());
        let content = fs::read_to_string(path)?;
        let syntax_tree = syn::parse_file(&content).map_err(|e| Error::Parse {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            syntax_tree,
        })
    }

    /// Parses every file, stopping at the first failure.
    ///
    /// Declarations may live in any of the files, so one unreadable file makes the whole run
    /// unreliable.
    pub fn parse_files(paths: &[PathBuf]) -> Result<Vec<ParsedFile>> {
        debug!("Parsing {} files", paths.len());
        let parsed = paths
            .iter()
            .map(|path| Self::parse_file(path))
            .collect::<Result<Vec<_>>>()?;
        debug!("Parsing complete: {} files", parsed.len());
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_annotated_controller() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(
            &temp_dir,
            "people.rs",
            r#"
            /// A person
            pub struct Person { pub name: String }

            #[path("/people")]
            pub struct PeopleController;

            impl PeopleController {
                #[get]
                #[path(":id")]
                pub fn get_person(&self, #[path_param] id: String) -> Person {
                    unimplemented!()
                }
            }
            "#,
        );

        let parsed = AstParser::parse_file(&path).unwrap();
        assert_eq!(parsed.path, path);
        assert_eq!(parsed.syntax_tree.items.len(), 3);
    }

    #[test]
    fn test_parse_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(&temp_dir, "broken.rs", "pub struct Person {\n    name: String,\n");

        let err = AstParser::parse_file(&path).unwrap_err();
        match err {
            Error::Parse { file, message } => {
                assert_eq!(file, path);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let result = AstParser::parse_file(Path::new("/nonexistent/file.rs"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_parse_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(&temp_dir, "empty.rs", "");

        let parsed = AstParser::parse_file(&path).unwrap();
        assert!(parsed.syntax_tree.items.is_empty());
    }

    #[test]
    fn test_parse_files_stops_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let good = create_temp_file(&temp_dir, "good.rs", "pub struct World;");
        let bad = create_temp_file(&temp_dir, "bad.rs", "pub fn broken( {");

        assert_eq!(AstParser::parse_files(&[good.clone()]).unwrap().len(), 1);
        assert!(matches!(
            AstParser::parse_files(&[good, bad]),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_files_empty_list() {
        assert!(AstParser::parse_files(&[]).unwrap().is_empty());
    }
}
