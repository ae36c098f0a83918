pub mod analyzer;
pub mod build;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod include;
pub mod paths;

pub use analyzer::{
    CallGraphExtractor, FunctionFact, FunctionStore, Parameter, SourceScanner, SourceWalker,
};
pub use build::{BuildConfig, BuildConfigParser, BuildDatabase, CompileEnvironment, OptimizationLevel, RawEntry};
pub use config::{ConfigOverrides, EngineConfig};
pub use context::{
    AssembledContext, BuildMetadata, ContextAssembler, ContextBudget, GenerationBackend,
    GenerationParams, HeaderText,
};
pub use engine::Engine;
pub use error::{ContextError, Result, Warning, WarningKind};
pub use include::{
    IncludeRequest, IncludeResolutionStrategy, IncludeResolver, IncludeSet, Resolution, StrategyMode,
};
