//! End-to-end tests over a small C project written to a temp dir.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use ctest_context::context::generation::{request_tests, GenerationBackend, GenerationParams};
use ctest_context::context::{header_banner, CALLS_BANNER, METADATA_BANNER, SIGNATURE_BANNER, SOURCE_BANNER};
use ctest_context::{
    AssembledContext, ContextError, Engine, EngineConfig, OptimizationLevel, StrategyMode, WarningKind,
};

const QUEUE_H: &str = r#"#ifndef QUEUE_H
#define QUEUE_H

#include <stddef.h>
#include "config.h"

#ifdef QUEUE_TRACE
#include "trace.h"
#endif

typedef struct queue {
    int *items;
    size_t head;
    size_t tail;
    size_t capacity;
} queue_t;

int queue_push(queue_t *q, int value);
int queue_pop(queue_t *q, int *out);

#endif
"#;

const QUEUE_C: &str = r#"#include "queue.h"
#include <string.h>

static int _grow(queue_t *q)
{
    return q->capacity * 2;
}

int queue_push(queue_t *q, int value)
{
    if (q->tail == q->capacity) {
        if (_grow(q) < 0) {
            return -1;
        }
    }
    q->items[q->tail++] = value;
    TRACE("push %d", value);
    return 0;
}

int queue_pop(queue_t *q, int *out)
{
    if (q->head == q->tail) {
        return -1;
    }
    *out = q->items[q->head++];
    return 0;
}

int main(void)
{
    return 0;
}
"#;

const BROKEN_C: &str = "int truncated(int x)\n{\n    if (x) {\n        return x;\n";

fn create_project() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();

    fs::create_dir_all(root.join("include")).unwrap();
    fs::create_dir_all(root.join("src/util")).unwrap();
    fs::create_dir_all(root.join("build")).unwrap();

    fs::write(root.join("include/queue.h"), QUEUE_H).unwrap();
    fs::write(root.join("include/config.h"), "#define QUEUE_MAX 64\n").unwrap();
    fs::write(root.join("include/trace.h"), "#define TRACE(...) printf(__VA_ARGS__)\n").unwrap();
    fs::write(root.join("src/queue.c"), QUEUE_C).unwrap();
    fs::write(root.join("src/broken.c"), BROKEN_C).unwrap();
    fs::write(
        root.join("src/util/strings.c"),
        "int str_len(const char *s) { int n = 0; while (s[n]) n++; return n; }\n",
    )
    .unwrap();

    let log = serde_json::json!([
        {
            "directory": root.join("build"),
            "file": "../src/queue.c",
            "command": "gcc -I../include -DQUEUE_TRACE -DCAPACITY=16 -std=gnu11 -O3 -Wall -Wextra -c ../src/queue.c",
            "output": "queue.o"
        },
        {
            "directory": root,
            "file": "src/broken.c",
            "arguments": ["cl.exe", "/Iinclude", "/DWIN32", "/Od", "/W4", "/c", "src/broken.c"]
        }
    ]);
    fs::write(root.join("build/compile_commands.json"), log.to_string()).unwrap();

    temp_dir
}

fn open(root: &Path, strategy: StrategyMode) -> Engine {
    let mut config = EngineConfig::new(root);
    config.strategy = strategy;
    Engine::open(config).expect("Failed to open project")
}

#[test]
fn test_scan_collects_public_functions() {
    let temp_dir = create_project();
    let engine = open(temp_dir.path(), StrategyMode::Auto);

    let names: Vec<_> = engine.functions().names().collect();
    assert_eq!(names, vec!["queue_pop", "queue_push"]);

    let push = engine.functions().get("queue_push").unwrap();
    assert_eq!(push.signature(), "int queue_push(queue_t *q, int value)");
    let calls: Vec<_> = push.external_calls.iter().map(String::as_str).collect();
    assert_eq!(calls, vec!["TRACE", "_grow"]);
    assert!(push.declared_includes.contains("queue.h"));
    assert!(push.declared_includes.contains("string.h"));

    let unbalanced: Vec<_> = engine
        .warnings()
        .iter()
        .filter(|w| w.kind == WarningKind::UnbalancedBody)
        .collect();
    assert_eq!(unbalanced.len(), 1);
    assert_eq!(unbalanced[0].subject, "truncated");
}

#[test]
fn test_recursive_walk_reaches_subdirectories() {
    let temp_dir = create_project();
    let mut config = EngineConfig::new(temp_dir.path());
    config.recursive = true;
    let engine = Engine::open(config).unwrap();

    assert!(engine.functions().contains("str_len"));
    assert!(!open(temp_dir.path(), StrategyMode::Auto).functions().contains("str_len"));
}

#[test]
fn test_build_database_dialects() {
    let temp_dir = create_project();
    let engine = open(temp_dir.path(), StrategyMode::Auto);
    assert_eq!(engine.builds().len(), 2);

    let queue = engine.builds().get(&temp_dir.path().join("src/queue.c")).unwrap();
    assert_eq!(queue.include_dirs, vec!["../include"]);
    assert_eq!(queue.c_standard.as_deref(), Some("gnu11"));
    assert_eq!(queue.optimization_level, OptimizationLevel::O3);
    assert!(queue.warning_flags.contains("Wall"));

    let broken = engine.builds().get(&temp_dir.path().join("src/broken.c")).unwrap();
    assert_eq!(broken.include_dirs, vec!["include"]);
    assert_eq!(broken.defines.get("WIN32"), Some(&None));
    assert_eq!(broken.optimization_level, OptimizationLevel::O0);
    assert!(broken.warning_flags.contains("W4"));

    let env = queue.compile_environment();
    assert!(env.to_gcc_flags().contains(&"-DQUEUE_TRACE".to_string()));
}

#[test]
fn test_precise_honours_build_defines() {
    let temp_dir = create_project();
    let root = temp_dir.path();

    let precise = open(root, StrategyMode::Auto).resolve_includes(Path::new("src/queue.c"));
    assert_eq!(precise.strategy, "precise");
    assert!(precise.includes.is_resolved("trace.h"));

    // drop the define: the precise walk no longer follows the #ifdef
    let log = fs::read_to_string(root.join("build/compile_commands.json"))
        .unwrap()
        .replace("-DQUEUE_TRACE ", "");
    fs::write(root.join("build/compile_commands.json"), log).unwrap();

    let precise = open(root, StrategyMode::Auto).resolve_includes(Path::new("src/queue.c"));
    assert!(!precise.includes.is_resolved("trace.h"));
    assert!(precise.includes.is_resolved("config.h"));

    // the textual scan is macro-unaware
    let textual = open(root, StrategyMode::Fallback).resolve_includes(Path::new("src/queue.c"));
    assert_eq!(textual.strategy, "fallback");
    assert!(textual.includes.is_resolved("trace.h"));

    let system: Vec<_> = textual.includes.system.iter().map(String::as_str).collect();
    assert_eq!(system, vec!["stddef.h", "string.h"]);
}

#[test]
fn test_assemble_and_render() {
    let temp_dir = create_project();
    let engine = open(temp_dir.path(), StrategyMode::Auto);

    let context = engine.assemble("queue_push").unwrap();
    assert_eq!(context.external_calls, vec!["TRACE", "_grow"]);
    let headers: Vec<_> = context.headers.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(headers, vec!["config.h", "queue.h", "trace.h"]);
    assert_eq!(context.build.as_ref().unwrap().defines.get("CAPACITY"), Some(&Some("16".to_string())));

    let payload = context.render();
    for banner in [SIGNATURE_BANNER, SOURCE_BANNER, CALLS_BANNER, METADATA_BANNER] {
        assert_eq!(payload.matches(banner).count(), 1, "banner {}", banner);
    }
    assert!(payload.contains(&header_banner("include/queue.h")));
    assert!(payload.contains("- TRACE() (likely macro)"));
    assert!(payload.contains("C Standard: gnu11"));
    assert!(payload.contains("Optimization: O3"));
    assert!(payload.contains("q->items[q->tail++] = value;"));
    assert!(!payload.contains("return q->capacity * 2;"));
}

#[test]
fn test_assemble_unknown_and_private() {
    let temp_dir = create_project();
    let engine = open(temp_dir.path(), StrategyMode::Auto);

    for name in ["queue_clear", "_grow", "main", "truncated"] {
        let err = engine.assemble(name).unwrap_err();
        assert!(matches!(err, ContextError::FunctionNotFound(_)), "{}", name);
    }
}

#[test]
fn test_context_json_round_trip() {
    let temp_dir = create_project();
    let engine = open(temp_dir.path(), StrategyMode::Fallback);

    let context = engine.assemble("queue_pop").unwrap();
    let json = serde_json::to_string(&context).unwrap();
    let parsed: AssembledContext = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, context);
    assert_eq!(parsed.strategy, "fallback");
}

#[test]
fn test_settings_file_layering() {
    let temp_dir = create_project();
    let root = temp_dir.path();
    fs::write(
        root.join(".ctest-context.toml"),
        "strategy = \"fallback\"\nmax_header_bytes = 32\n",
    )
    .unwrap();

    let config = EngineConfig::discover(Some(root), None).unwrap();
    assert_eq!(config.strategy, StrategyMode::Fallback);

    let engine = Engine::open(config).unwrap();
    let context = engine.assemble("queue_push").unwrap();
    assert_eq!(context.strategy, "fallback");
    assert!(context.headers.iter().any(|h| h.truncated));
}

struct RecordingBackend {
    reply: String,
    payloads: RefCell<Vec<String>>,
}

impl GenerationBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn generate(&self, payload: &str, params: &GenerationParams) -> ctest_context::Result<String> {
        assert_eq!(params.max_tokens, 8192);
        self.payloads.borrow_mut().push(payload.to_string());
        Ok(self.reply.clone())
    }
}

#[test]
fn test_request_tests_with_backend() {
    let temp_dir = create_project();
    let engine = open(temp_dir.path(), StrategyMode::Auto);
    let context = engine.assemble("queue_pop").unwrap();

    let backend = RecordingBackend {
        reply: "```cpp\nTEST(Queue, PopEmpty) {}\n```\n".to_string(),
        payloads: RefCell::new(Vec::new()),
    };
    let code = request_tests(&backend, &context, &GenerationParams::default()).unwrap();

    assert_eq!(code, "TEST(Queue, PopEmpty) {}");
    let payloads = backend.payloads.borrow();
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0].starts_with(SIGNATURE_BANNER));

    let empty = RecordingBackend {
        reply: "```\n```".to_string(),
        payloads: RefCell::new(Vec::new()),
    };
    let err = request_tests(&empty, &context, &GenerationParams::default()).unwrap_err();
    assert!(matches!(err, ContextError::Generation(_)));
}
