use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use ctest_context::analyzer::FunctionFact;
use ctest_context::config::{ConfigOverrides, EngineConfig};
use ctest_context::error::Warning;
use ctest_context::include::StrategyMode;
use ctest_context::Engine;

#[derive(Parser)]
#[command(name = "ctest-context")]
#[command(about = "Extracts C function context for unit test generation")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # List the functions found under include/ and src/
    ctest-context functions

    # Summarise build/compile_commands.json
    ctest-context build-info

    # Show the headers a translation unit pulls in
    ctest-context includes src/db.c

    # Assemble the context for one function
    ctest-context context db_open --output db_open.txt

    # Same, as JSON, with the textual include scan only
    ctest-context --strategy fallback context db_open --format json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root (default: current directory)
    #[arg(long, short = 'p', global = true)]
    pub project: Option<PathBuf>,

    /// Settings file (default: <project>/.ctest-context.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Build log, relative to the project root
    #[arg(long, global = true)]
    pub compile_commands: Option<PathBuf>,

    /// Walk include/ and src/ recursively
    #[arg(long, global = true)]
    pub recursive: bool,

    /// Include resolution strategy (auto, precise, fallback)
    #[arg(long, global = true)]
    pub strategy: Option<String>,

    /// Per-file limit for the precise include backend, 0 for none
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List discovered functions
    Functions {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Summarise the build log
    BuildInfo,

    /// Show the resolved include set of a translation unit
    Includes {
        /// Source file, relative to the project root
        file: PathBuf,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Assemble the generation context of a function
    Context {
        /// Function name
        function: String,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the payload to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Settings after layering file values and command-line flags.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = EngineConfig::discover(self.project.as_deref(), self.config.as_deref())?;
        let strategy = self
            .strategy
            .as_deref()
            .map(str::parse::<StrategyMode>)
            .transpose()?;

        ConfigOverrides {
            compile_commands: self.compile_commands.clone(),
            recursive: self.recursive,
            strategy,
            backend_timeout_ms: self.timeout_ms,
        }
        .apply(&mut config);
        Ok(config)
    }
}

fn check_format(format: &str) -> anyhow::Result<()> {
    match format {
        "text" | "json" => Ok(()),
        other => anyhow::bail!("unknown format '{}' (expected text or json)", other),
    }
}

fn display_path(engine: &Engine, path: &Path) -> String {
    path.strip_prefix(engine.root())
        .unwrap_or(path)
        .display()
        .to_string()
}

pub fn list_functions(engine: &Engine, format: &str) -> anyhow::Result<()> {
    check_format(format)?;
    let functions: Vec<&FunctionFact> = engine.functions().all().values().collect();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&functions)?);
        return Ok(());
    }

    if functions.is_empty() {
        println!("No functions found");
        return Ok(());
    }
    println!("Found {} functions:", functions.len());
    for function in functions {
        println!(
            "{} - {}:{}",
            function.signature(),
            display_path(engine, &function.source_file),
            function.line
        );
        if !function.external_calls.is_empty() {
            let calls: Vec<&str> = function.external_calls.iter().map(String::as_str).collect();
            println!("  Calls: {}", calls.join(", "));
        }
    }
    Ok(())
}

pub fn build_info(engine: &Engine) -> anyhow::Result<()> {
    let builds = engine.builds();
    println!("Build log: {}", engine.config().compile_commands_path().display());
    println!("  Entries: {}", builds.len());
    if builds.is_empty() {
        return Ok(());
    }

    let include_dirs = builds.all_include_dirs();
    println!("\n  Include dirs ({}):", include_dirs.len());
    for dir in &include_dirs {
        println!("    {}", dir);
    }

    let defines = builds.all_defines();
    println!("\n  Defines ({}):", defines.len());
    for (name, value) in &defines {
        match value {
            Some(value) => println!("    {}={}", name, value),
            None => println!("    {}", name),
        }
    }

    println!("\n  Files:");
    for (path, config) in builds.iter() {
        let mut details = vec![config.optimization_level.to_string()];
        if let Some(std) = &config.c_standard {
            details.push(std.clone());
        }
        if let Some(std) = &config.cxx_standard {
            details.push(std.clone());
        }
        details.extend(config.warning_flags.iter().cloned());
        println!("    {} [{}]", display_path(engine, path), details.join(" "));
    }
    Ok(())
}

pub fn show_includes(engine: &Engine, file: &Path, format: &str) -> anyhow::Result<()> {
    check_format(format)?;
    let resolution = engine.resolve_includes(file);
    print_warnings(&resolution.warnings);

    if format == "json" {
        let output = serde_json::json!({
            "file": file,
            "strategy": resolution.strategy,
            "includes": resolution.includes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let includes = &resolution.includes;
    println!("{} ({} strategy)", file.display(), resolution.strategy);
    println!("\n  Local headers ({}):", includes.paths.len());
    for (path, name) in &includes.paths {
        println!("    {} -> {}", name, display_path(engine, path));
    }
    if !includes.system.is_empty() {
        println!("\n  System headers ({}):", includes.system.len());
        for name in &includes.system {
            println!("    <{}>", name);
        }
    }
    let unresolved = includes.unresolved();
    if !unresolved.is_empty() {
        println!("\n  Unresolved ({}):", unresolved.len());
        for name in unresolved {
            println!("    \"{}\"", name);
        }
    }
    Ok(())
}

pub fn show_context(engine: &Engine, function: &str, format: &str, output: Option<&Path>) -> anyhow::Result<()> {
    check_format(format)?;
    let context = engine.assemble(function)?;
    print_warnings(&context.warnings);

    let payload = if format == "json" {
        serde_json::to_string_pretty(&context)?
    } else {
        context.render()
    };

    match output {
        Some(path) => {
            fs::write(path, &payload).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "Wrote context for {} ({} headers) to {}",
                function,
                context.headers.len(),
                path.display()
            );
        }
        None => print!("{}", payload),
    }
    Ok(())
}

/// Prints warnings to stderr so stdout carries only the payload.
pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}
