//! Script build step.
//!
//! Bundles the entry script and its relative ES-module imports into one
//! self-executing module. Each module is parsed with oxc so syntax errors
//! surface as step failures; module syntax (import statements, `export`
//! keywords) is stripped span-precisely before the sources are concatenated
//! in dependency-first order. Bare specifiers are not resolved — external
//! packages are expected to be loaded as page globals.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::Statement;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

/// Options for a script bundle.
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    /// Project root, used to relativize module names in the bundle and map
    pub root: PathBuf,

    /// Entry script
    pub entry: PathBuf,

    /// Output directory; the bundle keeps the entry's file name
    pub out_dir: PathBuf,

    /// Strip comments and indentation from module bodies
    pub minify: bool,

    /// Emit a `<bundle>.map` next to the bundle
    pub source_map: bool,
}

/// Result of a successful bundle.
#[derive(Debug)]
pub struct BundleOutput {
    /// Path of the written bundle
    pub out_file: PathBuf,

    /// Number of modules inlined
    pub modules: usize,
}

/// Errors from the script step.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("syntax error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("cannot resolve import \"{specifier}\" from {from}")]
    Resolve { specifier: String, from: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A module's parsed surface: its import specifiers and its source with
/// module syntax removed.
struct ModuleAnalysis {
    imports: Vec<String>,
    code: String,
}

/// An inlined module, kept with its original source for the source map.
struct Chunk {
    path: PathBuf,
    original: String,
    code: String,
}

/// Bundle the entry script and write it (and optionally its source map)
/// into the output directory.
pub fn build_scripts(opts: &ScriptOptions) -> Result<BundleOutput, ScriptError> {
    let mut visited = HashSet::new();
    let mut chunks = Vec::new();
    visit(&opts.entry, &mut visited, &mut chunks)?;

    let name = opts
        .entry
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("main.js");
    let out_file = opts.out_dir.join(name);

    let mut bundle = String::from("(function () {\n'use strict';\n\n");
    for chunk in &chunks {
        let rel = chunk.path.strip_prefix(&opts.root).unwrap_or(&chunk.path);
        bundle.push_str(&format!("// {}\n", rel.display()));
        if opts.minify {
            bundle.push_str(&minify(&chunk.code));
        } else {
            bundle.push_str(chunk.code.trim());
        }
        bundle.push_str("\n\n");
    }
    bundle.push_str("})();\n");

    fs::create_dir_all(&opts.out_dir).map_err(|e| ScriptError::Write {
        path: opts.out_dir.display().to_string(),
        source: e,
    })?;

    if opts.source_map {
        let map_name = format!("{name}.map");
        write_source_map(&opts.out_dir.join(&map_name), name, &opts.root, &chunks)?;
        bundle.push_str(&format!("//# sourceMappingURL={map_name}\n"));
    }

    fs::write(&out_file, bundle.as_bytes()).map_err(|e| ScriptError::Write {
        path: out_file.display().to_string(),
        source: e,
    })?;

    tracing::debug!("bundled {} modules into {}", chunks.len(), out_file.display());

    Ok(BundleOutput {
        out_file,
        modules: chunks.len(),
    })
}

/// Depth-first, dependencies before dependents. A module already marked
/// visited is skipped, which both deduplicates diamond imports and breaks
/// cycles.
fn visit(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    chunks: &mut Vec<Chunk>,
) -> Result<(), ScriptError> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Ok(());
    }

    let source = fs::read_to_string(path).map_err(|e| ScriptError::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let analysis = analyze_module(path, &source)?;

    for specifier in &analysis.imports {
        let target = resolve_import(specifier, path)?;
        visit(&target, visited, chunks)?;
    }

    chunks.push(Chunk {
        path: path.to_path_buf(),
        original: source,
        code: analysis.code,
    });

    Ok(())
}

/// Parse one module, collect its import specifiers, and strip module syntax
/// using the statement spans oxc reports.
fn analyze_module(path: &Path, source: &str) -> Result<ModuleAnalysis, ScriptError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();

    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ScriptError::Parse {
            path: path.display().to_string(),
            message,
        });
    }

    let mut imports = Vec::new();
    let mut removals: Vec<(usize, usize)> = Vec::new();

    for stmt in &ret.program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                imports.push(decl.source.value.to_string());
                removals.push((decl.span.start as usize, decl.span.end as usize));
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(src) = &decl.source {
                    imports.push(src.value.to_string());
                }
                match &decl.declaration {
                    // `export const x = ...` keeps the declaration, drops the keyword
                    Some(inner) => {
                        removals.push((decl.span.start as usize, inner.span().start as usize));
                    }
                    // `export { a, b }` has no runtime effect inside the bundle
                    None => removals.push((decl.span.start as usize, decl.span.end as usize)),
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                removals.push((
                    decl.span.start as usize,
                    decl.declaration.span().start as usize,
                ));
            }
            Statement::ExportAllDeclaration(decl) => {
                imports.push(decl.source.value.to_string());
                removals.push((decl.span.start as usize, decl.span.end as usize));
            }
            _ => {}
        }
    }

    Ok(ModuleAnalysis {
        imports,
        code: splice_out(source, &removals),
    })
}

/// Remove the given byte ranges from `source`. Ranges come from statements
/// in source order, so they are sorted and disjoint.
fn splice_out(source: &str, removals: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;

    for &(start, end) in removals {
        out.push_str(&source[cursor..start]);
        cursor = end;
    }
    out.push_str(&source[cursor..]);

    out
}

/// Resolve a relative import specifier against the importing file's
/// directory, trying an appended `.js` for extension-less specifiers.
fn resolve_import(specifier: &str, from: &Path) -> Result<PathBuf, ScriptError> {
    let unresolved = || ScriptError::Resolve {
        specifier: specifier.to_string(),
        from: from.display().to_string(),
    };

    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return Err(unresolved());
    }

    let base = from.parent().unwrap_or_else(|| Path::new("."));
    let candidate = base.join(specifier);
    if candidate.is_file() {
        return Ok(candidate);
    }

    let with_ext = PathBuf::from(format!("{}.js", candidate.display()));
    if with_ext.is_file() {
        return Ok(with_ext);
    }

    Err(unresolved())
}

/// Whitespace-level minification: strip indentation, blank lines, and line
/// comments. Lines inside a multi-line template literal are kept verbatim;
/// template tracking is a lexical backtick count, not a full parse.
fn minify(source: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_template = false;

    for line in source.lines() {
        if in_template {
            in_template ^= has_odd_backticks(line);
            out.push(line);
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        in_template ^= has_odd_backticks(trimmed);
        out.push(trimmed);
    }

    out.join("\n")
}

/// True when the line contains an odd number of unescaped backticks.
fn has_odd_backticks(line: &str) -> bool {
    let mut count = 0usize;
    let mut escaped = false;

    for ch in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '`' => count += 1,
            _ => {}
        }
    }

    count % 2 == 1
}

/// Source-map v3 with the original sources embedded. No mappings are
/// generated; the map exists so devtools can show the pre-bundle sources.
fn write_source_map(
    map_file: &Path,
    bundle_name: &str,
    root: &Path,
    chunks: &[Chunk],
) -> Result<(), ScriptError> {
    let sources: Vec<String> = chunks
        .iter()
        .map(|c| {
            c.path
                .strip_prefix(root)
                .unwrap_or(&c.path)
                .display()
                .to_string()
        })
        .collect();
    let contents: Vec<&str> = chunks.iter().map(|c| c.original.as_str()).collect();

    let map = serde_json::json!({
        "version": 3,
        "file": bundle_name,
        "sources": sources,
        "sourcesContent": contents,
        "names": [],
        "mappings": "",
    });

    let json = serde_json::to_string(&map).map_err(|e| ScriptError::Write {
        path: map_file.display().to_string(),
        source: io::Error::other(e),
    })?;

    fs::write(map_file, json).map_err(|e| ScriptError::Write {
        path: map_file.display().to_string(),
        source: e,
    })
}
