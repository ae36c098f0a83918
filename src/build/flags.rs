//! Compiler flag extraction
//!
//! GCC-style (`-I`, `-D`, `-std=`) and MSVC-style (`/I`, `/D`, `/std:`)
//! flags are read by two independent passes. Each pass reports flags with
//! their argument position; merging in position order gives one normalised
//! result where later flags override earlier ones regardless of dialect.
//!
//! The MSVC pass cannot tell `/Isomething` from an absolute Unix path that
//! happens to start with `/I`; such paths are read as include dirs.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use super::OptimizationLevel;

static DEFINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)(?:=(.*))?$").expect("define pattern is valid"));
static GCC_C_STD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-std=(c|gnu)(\d\w*)$").expect("c std pattern is valid"));
static GCC_CXX_STD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-std=(c|gnu)\+\+(\w+)$").expect("c++ std pattern is valid"));
static MSVC_C_STD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/std:c(\d+|latest)$").expect("msvc c std pattern is valid"));
static MSVC_CXX_STD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[/-]std:c\+\+(\w+)$").expect("msvc c++ std pattern is valid")
});

/// One recognised compiler flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flag {
    IncludeDir(String),
    Define(String, Option<String>),
    CStandard(String),
    CxxStandard(String),
    Optimization(OptimizationLevel),
    Warning(String),
}

/// A flag and the index of the argument it came from.
pub type PositionedFlag = (usize, Flag);

/// Normalised result of both passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub include_dirs: Vec<String>,
    pub defines: BTreeMap<String, Option<String>>,
    pub c_standard: Option<String>,
    pub cxx_standard: Option<String>,
    pub optimization_level: Option<OptimizationLevel>,
    pub warning_flags: BTreeSet<String>,
}

impl FlagSet {
    fn apply(&mut self, flag: Flag) {
        match flag {
            Flag::IncludeDir(dir) => {
                let dir = normalize_include_path(&dir);
                if !dir.is_empty() && !self.include_dirs.contains(&dir) {
                    self.include_dirs.push(dir);
                }
            }
            Flag::Define(name, value) => {
                self.defines.insert(name, value);
            }
            Flag::CStandard(std) => {
                self.c_standard.get_or_insert(std);
            }
            Flag::CxxStandard(std) => {
                self.cxx_standard.get_or_insert(std);
            }
            Flag::Optimization(level) => self.optimization_level = Some(level),
            Flag::Warning(w) => {
                self.warning_flags.insert(w);
            }
        }
    }
}

/// Splits a command line into arguments, honouring single and double quotes.
///
/// A backslash only escapes a following quote, so Windows paths survive.
pub fn split_command_line(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (_, '\\') if matches!(chars.peek(), Some('"') | Some('\'')) => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_arg = true;
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(ch);
                in_arg = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

/// Strips quotes and converts backslashes to forward slashes.
pub fn normalize_include_path(path: &str) -> String {
    path.trim_matches(|c| c == '"' || c == '\'').replace('\\', "/")
}

fn parse_define(spec: &str) -> Option<Flag> {
    let caps = DEFINE_RE.captures(spec)?;
    let value = caps
        .get(2)
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.is_empty());
    Some(Flag::Define(caps[1].to_string(), value))
}

/// Reads `-I`, `-D`, `-std=`, `-O*`, `-Wall` and `-Wextra`.
pub fn gcc_pass(args: &[String]) -> Vec<PositionedFlag> {
    let mut flags = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        let pos = i;
        i += 1;

        let flag = if arg == "-I" || arg == "-D" {
            let Some(value) = args.get(i) else { continue };
            i += 1;
            if arg == "-I" {
                Some(Flag::IncludeDir(value.clone()))
            } else {
                parse_define(value)
            }
        } else if let Some(dir) = arg.strip_prefix("-I") {
            Some(Flag::IncludeDir(dir.to_string()))
        } else if let Some(spec) = arg.strip_prefix("-D") {
            parse_define(spec)
        } else if let Some(caps) = GCC_C_STD_RE.captures(arg) {
            Some(Flag::CStandard(format!("{}{}", &caps[1], &caps[2])))
        } else if let Some(caps) = GCC_CXX_STD_RE.captures(arg) {
            Some(Flag::CxxStandard(format!("{}++{}", &caps[1], &caps[2])))
        } else if arg == "-Wall" || arg == "-Wextra" {
            Some(Flag::Warning(arg[1..].to_string()))
        } else {
            arg.strip_prefix('-')
                .and_then(OptimizationLevel::from_gcc)
                .map(Flag::Optimization)
        };

        if let Some(flag) = flag {
            flags.push((pos, flag));
        }
    }

    flags
}

/// Reads `/I`, `-external:I`, `/D`, `/std:`, `/O*`, `/W3` and `/W4`.
pub fn msvc_pass(args: &[String]) -> Vec<PositionedFlag> {
    let mut flags = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        let pos = i;
        i += 1;

        let detached = matches!(arg, "/I" | "/D" | "-external:I" | "/external:I");
        let flag = if detached {
            let Some(value) = args.get(i) else { continue };
            i += 1;
            if arg == "/D" {
                parse_define(value)
            } else {
                Some(Flag::IncludeDir(value.clone()))
            }
        } else if let Some(dir) = arg
            .strip_prefix("-external:I")
            .or_else(|| arg.strip_prefix("/external:I"))
            .or_else(|| arg.strip_prefix("/I"))
        {
            Some(Flag::IncludeDir(dir.to_string()))
        } else if let Some(spec) = arg.strip_prefix("/D") {
            parse_define(spec)
        } else if let Some(caps) = MSVC_C_STD_RE.captures(arg) {
            Some(Flag::CStandard(format!("c{}", &caps[1])))
        } else if let Some(caps) = MSVC_CXX_STD_RE.captures(arg) {
            Some(Flag::CxxStandard(format!("c++{}", &caps[1])))
        } else if arg == "/W3" || arg == "/W4" {
            Some(Flag::Warning(arg[1..].to_string()))
        } else {
            arg.strip_prefix('/')
                .and_then(OptimizationLevel::from_msvc)
                .map(Flag::Optimization)
        };

        if let Some(flag) = flag {
            flags.push((pos, flag));
        }
    }

    flags
}

/// Runs both passes and merges their flags in argument order.
pub fn extract_flags(args: &[String]) -> FlagSet {
    let mut positioned = gcc_pass(args);
    positioned.extend(msvc_pass(args));
    positioned.sort_by_key(|(pos, _)| *pos);

    let mut set = FlagSet::default();
    for (_, flag) in positioned {
        set.apply(flag);
    }
    set
}
