use std::fs;
use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;

use ctest_context::analyzer::{extract_body, locate_definition, scan_source, EXCLUDED_CALLEES};
use ctest_context::build::{BuildConfigParser, RawEntry};
use ctest_context::include::{IncludeRequest, IncludeResolutionStrategy, PreprocessorStrategy, TextualStrategy};
use ctest_context::CallGraphExtractor;

fn unrelated_flag() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "-Wall", "-Wextra", "-O0", "-O3", "-Iinclude", "-I", "vendor", "-DBAR=3", "-DBAZ",
        "-std=c99", "-std=c++17", "/W4", "/Od", "-c", "-g", "-fPIC", "/DQUX=1",
    ])
}

fn block_body() -> impl Strategy<Value = String> {
    let leaf = prop::sample::select(vec!["x = 1;", "call(a);", "", "y += x;"])
        .prop_map(String::from);
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop::collection::vec(inner, 0..4)
            .prop_map(|items| format!("{{ {} }}", items.join(" ")))
    })
    .prop_map(|body| {
        if body.starts_with('{') {
            body
        } else {
            format!("{{ {} }}", body)
        }
    })
}

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

proptest! {
    #[test]
    fn last_define_wins(
        before in prop::collection::vec(unrelated_flag(), 0..5),
        between in prop::collection::vec(unrelated_flag(), 0..5),
        after in prop::collection::vec(unrelated_flag(), 0..5),
    ) {
        let command = format!(
            "gcc {} -DFOO=1 {} -DFOO=2 {} -c a.c",
            before.join(" "),
            between.join(" "),
            after.join(" ")
        );
        let config = BuildConfigParser::parse_entry(&RawEntry::new("a.c", "/p", command));
        prop_assert_eq!(config.defines.get("FOO"), Some(&Some("2".to_string())));
    }

    #[test]
    fn extracted_body_is_balanced(body in block_body()) {
        let source = format!("int f(void)\n{}\n", body);
        let definition = locate_definition(&source, "f").unwrap();
        let extracted = extract_body(&source, definition.open_brace).unwrap();

        prop_assert!(extracted.starts_with('{'), "extracted should start with '{{'");
        prop_assert!(extracted.ends_with('}'), "extracted should end with '}}'");
        prop_assert_eq!(extracted.matches('{').count(), extracted.matches('}').count());
        prop_assert_eq!(extracted, body.as_str());
    }

    #[test]
    fn single_function_is_found(prefix in "[a-z][a-z0-9]{0,8}", ret in "(int|void|char \\*|size_t)") {
        let name = format!("{}_fn", prefix);
        let source = format!("{} {}(int a)\n{{\n    return helper(a);\n}}\n", ret, name);
        let scan = scan_source(Path::new("a.c"), &source);

        prop_assert_eq!(scan.functions.len(), 1);
        prop_assert_eq!(&scan.functions[0].name, &name);
        prop_assert!(scan.warnings.is_empty());
    }

    #[test]
    fn private_and_main_never_recorded(suffix in "[a-z0-9_]{0,8}", use_main in any::<bool>()) {
        let name = if use_main { "main".to_string() } else { format!("_{}", suffix) };
        let source = format!("int {}(void) {{ return work(); }}\n", name);
        let scan = scan_source(Path::new("a.c"), &source);

        prop_assert!(scan.functions.is_empty());
    }

    #[test]
    fn call_set_never_has_excluded_names(body in "[a-zA-Z_(){};, \n]{0,200}") {
        let calls = CallGraphExtractor::new().extract(&body);
        for excluded in EXCLUDED_CALLEES {
            prop_assert!(!calls.contains(excluded));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn include_resolution_is_idempotent(
        edges in prop::collection::vec((0usize..5, 0usize..6), 0..12),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // h5.h is never written, so edges to it stay unresolved
        let mut contents = vec![String::new(); 5];
        for (from, to) in &edges {
            contents[*from].push_str(&format!("#include \"h{}.h\"\n", to));
        }
        for (i, content) in contents.iter().enumerate() {
            write(root, &format!("include/h{}.h", i), content);
        }
        write(root, "src/a.c", "#include \"h0.h\"\n#include <stdio.h>\n");

        let request = IncludeRequest::new(root).with_header_root(root.join("include"));
        let source = root.join("src/a.c");

        let textual = TextualStrategy::new();
        let first = textual.resolve(&source, &request).unwrap();
        let second = textual.resolve(&source, &request).unwrap();
        prop_assert_eq!(&first, &second);

        let precise = PreprocessorStrategy::new().unwrap();
        let first_precise = precise.resolve(&source, &request).unwrap();
        let second_precise = precise.resolve(&source, &request).unwrap();
        prop_assert_eq!(&first_precise, &second_precise);

        // without conditionals both strategies agree
        prop_assert_eq!(first, first_precise);
    }
}
