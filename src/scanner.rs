use anyhow::{bail, Context, Result};
use glob::Pattern;
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expands `entryFile` patterns into the Rust sources to read declarations from.
///
/// Each entry is a file, a directory (walked recursively) or a glob pattern, resolved
/// relative to the base directory. Directory walks skip `target` and hidden directories.
/// Anything matching one of the `ignore` patterns is left out.
///
/// # Example
///
/// ```no_run
/// use swagger_from_source::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("."), vec!["src/controllers/**/*.rs".into()], vec![]);
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    base_dir: PathBuf,
    entries: Vec<String>,
    ignore: Vec<String>,
}

/// Files found by a scan, in discovery order
pub struct ScanResult {
    pub rust_files: Vec<PathBuf>,
    /// Inaccessible paths and patterns that matched nothing
    pub warnings: Vec<String>,
}

struct Collector<'s> {
    base_dir: &'s Path,
    ignore: Vec<Pattern>,
    seen: HashSet<PathBuf>,
    result: ScanResult,
}

impl Collector<'_> {
    fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(self.base_dir).unwrap_or(path);
        self.ignore
            .iter()
            .any(|p| p.matches_path(relative) || p.matches_path(path))
    }

    fn warn(&mut self, warning: String) {
        warn!("{}", warning);
        self.result.warnings.push(warning);
    }

    fn add_file(&mut self, path: &Path) {
        if path.extension().and_then(|s| s.to_str()) != Some("rs") || self.is_ignored(path) {
            return;
        }
        // `components` drops interior `.` segments, so `./api.rs` and `api.rs` collapse
        let path: PathBuf = path.components().collect();
        if self.seen.insert(path.clone()) {
            self.result.rust_files.push(path);
        }
    }

    fn add_path(&mut self, path: &Path) {
        if path.is_dir() {
            self.walk(path);
        } else {
            self.add_file(path);
        }
    }

    fn walk(&mut self, root: &Path) {
        debug!("Walking directory {}", root.display());
        let entries: Vec<_> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == root {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_target = file_name == "target";
                !is_hidden && !is_target && !self.is_ignored(e.path())
            })
            .collect();

        for entry in entries {
            match entry {
                Ok(entry) if entry.file_type().is_file() => self.add_file(entry.path()),
                Ok(_) => {}
                Err(e) => self.warn(format!("Failed to access path: {}", e)),
            }
        }
    }
}

impl FileScanner {
    pub fn new(base_dir: PathBuf, entries: Vec<String>, ignore: Vec<String>) -> Self {
        Self {
            base_dir,
            entries,
            ignore,
        }
    }

    /// Resolves every entry.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid pattern or for a plain entry path that does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        let ignore = self
            .ignore
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid ignore pattern: {}", p)))
            .collect::<Result<Vec<_>>>()?;
        let mut collector = Collector {
            base_dir: &self.base_dir,
            ignore,
            seen: HashSet::new(),
            result: ScanResult {
                rust_files: Vec::new(),
                warnings: Vec::new(),
            },
        };

        for entry in &self.entries {
            let full = self.base_dir.join(entry);
            if has_glob_chars(entry) {
                let pattern = full.to_string_lossy().into_owned();
                let matches = glob::glob(&pattern)
                    .with_context(|| format!("Invalid entry pattern: {}", entry))?;
                let mut matched_any = false;
                for path in matches {
                    match path {
                        Ok(path) => {
                            matched_any = true;
                            collector.add_path(&path);
                        }
                        Err(e) => collector.warn(format!("Failed to access path: {}", e)),
                    }
                }
                if !matched_any {
                    collector.warn(format!("Entry pattern matched no files: {}", entry));
                }
            } else if full.exists() {
                collector.add_path(&full);
            } else {
                bail!("Entry file does not exist: {}", full.display());
            }
        }

        debug!("Scan found {} files", collector.result.rust_files.len());
        Ok(collector.result)
    }
}

fn has_glob_chars(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
}
