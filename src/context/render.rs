//! Text payload rendering.
//!
//! Sections are delimited by fixed banner lines so a consumer can find them
//! by substring search.

use std::fmt::Write;

use super::AssembledContext;
use crate::analyzer::is_likely_macro;

pub const SIGNATURE_BANNER: &str = "=== FUNCTION SIGNATURE ===";
pub const SOURCE_BANNER: &str = "=== FUNCTION SOURCE ===";
pub const CALLS_BANNER: &str = "=== EXTERNAL CALLS ===";
pub const METADATA_BANNER: &str = "=== COMPILER METADATA ===";

/// Banner of one header section, labelled with its project-relative path.
pub fn header_banner(label: &str) -> String {
    format!("=== HEADER: {} ===", label)
}

/// Renders `context` as one delimited text payload.
pub fn render(context: &AssembledContext) -> String {
    let mut out = String::new();

    // writes into a String cannot fail
    let _ = writeln!(out, "{}", SIGNATURE_BANNER);
    let _ = writeln!(out, "{}", context.signature);
    let _ = writeln!(out, "Source File: {}", context.function.source_file.display());
    out.push('\n');

    let _ = writeln!(out, "{}", SOURCE_BANNER);
    push_fenced(&mut out, &context.source);
    out.push('\n');

    let _ = writeln!(out, "{}", CALLS_BANNER);
    if context.external_calls.is_empty() {
        out.push_str("None\n");
    }
    for call in &context.external_calls {
        if is_likely_macro(call) {
            let _ = writeln!(out, "- {}() (likely macro)", call);
        } else {
            let _ = writeln!(out, "- {}()", call);
        }
    }
    out.push('\n');

    for header in &context.headers {
        let _ = writeln!(out, "{}", header_banner(&header.label));
        push_fenced(&mut out, &header.text);
        out.push('\n');
    }

    let _ = writeln!(out, "{}", METADATA_BANNER);
    match &context.build {
        Some(build) => {
            let _ = writeln!(out, "C Standard: {}", build.c_standard.as_deref().unwrap_or("default"));
            let _ = writeln!(out, "C++ Standard: {}", build.cxx_standard.as_deref().unwrap_or("default"));
            let _ = writeln!(out, "Optimization: {}", build.optimization_level);
            if build.defines.is_empty() {
                out.push_str("Macros: None\n");
            } else {
                out.push_str("Macros:\n");
                for (name, value) in &build.defines {
                    match value {
                        Some(value) => {
                            let _ = writeln!(out, "- {}={}", name, value);
                        }
                        None => {
                            let _ = writeln!(out, "- {}", name);
                        }
                    }
                }
            }
        }
        None => out.push_str("No build configuration recorded for this file\n"),
    }
    if !context.system_headers.is_empty() {
        let _ = writeln!(out, "System Headers: {}", context.system_headers.join(", "));
    }
    if !context.unresolved_headers.is_empty() {
        let _ = writeln!(out, "Unresolved Headers: {}", context.unresolved_headers.join(", "));
    }

    out
}

fn push_fenced(out: &mut String, code: &str) {
    out.push_str("```c\n");
    out.push_str(code);
    if !code.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n");
}
