//! One analysed project: scan result, build database and include resolver.

use std::path::{Path, PathBuf};

use crate::analyzer::{FunctionStore, SourceScanner, SourceWalker};
use crate::build::BuildDatabase;
use crate::config::EngineConfig;
use crate::context::{AssembledContext, ContextAssembler};
use crate::error::{ContextError, Result, Warning};
use crate::include::{IncludeResolver, Resolution};
use crate::paths::{absolutize, normalize_path};

pub struct Engine {
    config: EngineConfig,
    root: PathBuf,
    functions: FunctionStore,
    builds: BuildDatabase,
    resolver: IncludeResolver,
    warnings: Vec<Warning>,
}

impl Engine {
    /// Loads the build log and scans the project.
    ///
    /// A missing or malformed build log only produces a warning. Invalid
    /// settings and a missing project root are errors.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let root = normalize_path(&config.project_root);
        if !root.is_dir() {
            return Err(ContextError::Settings(format!(
                "project root {} is not a directory",
                root.display()
            )));
        }
        let config = EngineConfig {
            project_root: root.clone(),
            ..config
        };

        let mut warnings = Vec::new();
        let log_path = config.compile_commands_path();
        let builds = match BuildDatabase::load(&log_path) {
            Ok(builds) => builds,
            Err(e @ (ContextError::ConfigNotFound(_) | ContextError::ConfigFormat { .. })) => {
                tracing::warn!("Continuing without build configuration: {}", e);
                warnings.push(Warning::from_error(log_path.display().to_string(), &e));
                BuildDatabase::new()
            }
            Err(e) => return Err(e),
        };

        let walker = SourceWalker::new(config.recursive);
        let mut files = walker.headers(&config.include_root());
        files.extend(walker.sources(&config.src_root()));

        let mut scanner = SourceScanner::new();
        scanner.analyze_files(&files);
        let (functions, scan_warnings) = scanner.into_parts();
        warnings.extend(scan_warnings);

        let resolver = IncludeResolver::new(&root, config.strategy)
            .with_header_root(config.include_root())
            .with_timeout(config.backend_timeout());
        warnings.extend(resolver.warnings().iter().cloned());

        tracing::info!(
            "Scanned {} files in {}: {} functions, {} build entries",
            files.len(),
            root.display(),
            functions.len(),
            builds.len()
        );

        Ok(Self {
            config,
            root,
            functions,
            builds,
            resolver,
            warnings,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn functions(&self) -> &FunctionStore {
        &self.functions
    }

    pub fn builds(&self) -> &BuildDatabase {
        &self.builds
    }

    pub fn resolver(&self) -> &IncludeResolver {
        &self.resolver
    }

    /// Problems met while opening the project.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn assembler(&self) -> ContextAssembler<'_> {
        ContextAssembler::new(&self.functions, &self.builds, &self.resolver).with_budget(self.config.budget())
    }

    pub fn assemble(&self, function_name: &str) -> Result<AssembledContext> {
        self.assembler().assemble(function_name)
    }

    /// Header closure of `source`, relative paths taken from the project root.
    pub fn resolve_includes(&self, source: &Path) -> Resolution {
        let source = absolutize(&self.root, source);
        self.resolver.resolve(&source, self.builds.get(&source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarningKind;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("include")).unwrap();
        fs::write(root.join("include/math_util.h"), "int clamp(int v, int lo, int hi);\n").unwrap();
        fs::write(
            root.join("src/math_util.c"),
            "#include \"math_util.h\"\nint clamp(int v, int lo, int hi) { return v < lo ? lo : (v > hi ? hi : v); }\n",
        )
        .unwrap();
        fs::write(root.join("src/main.c"), "int main(void) { return clamp(1, 0, 2); }\n").unwrap();
        temp_dir
    }

    #[test]
    fn test_open_without_build_log() {
        let temp_dir = project();
        let engine = Engine::open(EngineConfig::new(temp_dir.path())).unwrap();

        assert_eq!(engine.functions().names().collect::<Vec<_>>(), vec!["clamp"]);
        assert!(engine.builds().is_empty());
        assert_eq!(engine.warnings().len(), 1);
        assert_eq!(engine.warnings()[0].kind, WarningKind::BuildLogUnavailable);

        let ctx = engine.assemble("clamp").unwrap();
        assert_eq!(ctx.strategy, "fallback");
        assert_eq!(ctx.headers.len(), 1);
    }

    #[test]
    fn test_open_with_build_log() {
        let temp_dir = project();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("build")).unwrap();
        let log = serde_json::json!([{
            "directory": root.join("build"),
            "file": "../src/math_util.c",
            "command": "cc -I../include -DNDEBUG -std=c99 -c ../src/math_util.c",
        }]);
        fs::write(root.join("build/compile_commands.json"), log.to_string()).unwrap();

        let engine = Engine::open(EngineConfig::new(root)).unwrap();
        assert!(engine.warnings().is_empty());
        assert_eq!(engine.builds().len(), 1);

        let resolution = engine.resolve_includes(Path::new("src/math_util.c"));
        assert_eq!(resolution.strategy, "precise");
        assert!(resolution.includes.is_resolved("math_util.h"));

        let ctx = engine.assemble("clamp").unwrap();
        assert_eq!(ctx.build.unwrap().c_standard.as_deref(), Some("c99"));
    }

    #[test]
    fn test_malformed_build_log_is_warning() {
        let temp_dir = project();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/compile_commands.json"), "not json").unwrap();

        let engine = Engine::open(EngineConfig::new(root)).unwrap();
        assert_eq!(engine.warnings()[0].kind, WarningKind::BuildLogUnavailable);
        assert_eq!(engine.functions().len(), 1);
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Engine::open(EngineConfig::new(temp_dir.path().join("absent")));
        assert!(matches!(result, Err(ContextError::Settings(_))));
    }
}
