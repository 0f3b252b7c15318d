use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::RuntimeConfig;

pub const MANIFEST_FILE: &str = "hashlit.toml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize hashlit.toml: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("hashlit.toml already exists in {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("no hashlit.toml found in {} or any parent directory", .0.display())]
    NotFound(PathBuf),
}

/// Project manifest (hashlit.toml)
#[derive(Debug, Serialize, Deserialize)]
pub struct PackageManifest {
    pub package: PackageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSettings>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default = "default_entry")]
    pub entry: String,
}

/// Optional `[run]` table overriding runtime defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_call_depth: Option<usize>,
    #[serde(default)]
    pub trace_protocol: bool,
}

fn default_entry() -> String {
    "src/main.hl".to_string()
}

impl PackageManifest {
    /// Create a new package manifest with default values
    pub fn new(name: &str) -> Self {
        Self {
            package: PackageInfo {
                name: name.to_string(),
                version: "0.1.0".to_string(),
                entry: default_entry(),
            },
            run: None,
        }
    }

    /// Load manifest from a directory
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ManifestError::Parse { path, source })
    }

    /// Save manifest to a directory
    pub fn save(&self, dir: &Path) -> Result<(), ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|source| ManifestError::Write { path, source })
    }

    /// Entry file resolved against the project root.
    pub fn entry_path(&self, root: &Path) -> PathBuf {
        root.join(&self.package.entry)
    }

    /// Apply the `[run]` table on top of `config`.
    pub fn apply_to(&self, config: &mut RuntimeConfig) {
        if let Some(run) = &self.run {
            if let Some(depth) = run.max_call_depth {
                config.max_call_depth = depth;
            }
            config.trace_protocol |= run.trace_protocol;
        }
    }
}

/// Walk up from `start` to the nearest directory holding a manifest.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ManifestError> {
    start
        .ancestors()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| ManifestError::NotFound(start.to_path_buf()))
}

/// Initialize a new hashlit project. Returns the project name.
pub fn init_project(dir: &Path, name: Option<&str>) -> Result<String, ManifestError> {
    let project_name = name
        .map(|s| s.to_string())
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "myproject".to_string());

    if dir.join(MANIFEST_FILE).exists() {
        return Err(ManifestError::AlreadyExists(dir.to_path_buf()));
    }

    let src_dir = dir.join("src");
    fs::create_dir_all(&src_dir).map_err(|source| ManifestError::Write {
        path: src_dir.clone(),
        source,
    })?;

    let manifest = PackageManifest::new(&project_name);
    manifest.save(dir)?;

    let main_file = manifest.entry_path(dir);
    if !main_file.exists() {
        let content = r#"# Welcome to hashlit!
let greeting = Array#["Hello", "world!"];
print(greeting[0] + ", " + greeting[1]);
"#;
        fs::write(&main_file, content).map_err(|source| ManifestError::Write {
            path: main_file.clone(),
            source,
        })?;
    }

    Ok(project_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manifest() {
        let manifest = PackageManifest::new("testproject");
        assert_eq!(manifest.package.name, "testproject");
        assert_eq!(manifest.package.version, "0.1.0");
        assert_eq!(manifest.package.entry, "src/main.hl");
        assert!(manifest.run.is_none());
    }

    #[test]
    fn test_run_section_overrides_config() {
        let manifest: PackageManifest = toml::from_str(
            r#"
            [package]
            name = "demo"
            version = "0.2.0"

            [run]
            max_call_depth = 32
            "#,
        )
        .unwrap();
        assert_eq!(manifest.package.entry, "src/main.hl");

        let mut config = RuntimeConfig::default();
        manifest.apply_to(&mut config);
        assert_eq!(config.max_call_depth, 32);
        assert!(!config.trace_protocol);
    }

    #[test]
    fn test_init_project() {
        let temp = tempfile::tempdir().unwrap();

        let name = init_project(temp.path(), Some("mytest")).unwrap();
        assert_eq!(name, "mytest");
        assert!(temp.path().join(MANIFEST_FILE).exists());
        assert!(temp.path().join("src/main.hl").exists());

        let manifest = PackageManifest::load(temp.path()).unwrap();
        assert_eq!(manifest.package.name, "mytest");

        let err = init_project(temp.path(), None).unwrap_err();
        assert!(matches!(err, ManifestError::AlreadyExists(_)));
    }

    #[test]
    fn test_find_project_root_walks_up() {
        let temp = tempfile::tempdir().unwrap();
        init_project(temp.path(), Some("nested")).unwrap();
        let deep = temp.path().join("src/a/b");
        fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_project_root(&deep).unwrap(), temp.path());
    }

    #[test]
    fn test_starter_program_runs() {
        let temp = tempfile::tempdir().unwrap();
        init_project(temp.path(), Some("hello")).unwrap();
        let source = fs::read_to_string(temp.path().join("src/main.hl")).unwrap();

        let program = crate::compiler::compile_source(&source).unwrap();
        let mut interp = crate::interp::Interpreter::new().capture_output();
        interp.run(&program).unwrap();
        assert_eq!(interp.take_output(), vec!["Hello, world!"]);
    }
}
