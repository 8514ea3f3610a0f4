//! Style compiler task: Sass -> browser-ready CSS plus source maps.
//!
//! Order of operations per stylesheet:
//! 1. glob-expand `@use`/`@forward` rules ending in `/*`
//! 2. compile with grass (expanded output)
//! 3. post-process with lightningcss for the configured browser matrix
//!    (vendor prefixes, forward-syntax downleveling) and collect a map
//! 4. sort declarations alphabetically within each block
//! 5. merge top-level `@media` blocks with identical queries
//! 6. write `name.css` and `name.css.map`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use crate::config::ResolvedPaths;
use crate::tasks::{ensure_parent, rebase, TaskError};

/// Compile every non-partial `.scss` under the sass root into the
/// stylesheet output directory. Returns the written files (css and maps).
pub fn compile(paths: &ResolvedPaths, browsers: &[String]) -> Result<Vec<PathBuf>, TaskError> {
    let pattern = format!("{}/**/*.scss", paths.sass_dir.display());
    let mut written = Vec::new();

    for entry in glob(&pattern)?.flatten() {
        if is_partial(&entry) {
            continue;
        }
        let Some(dest) = rebase(&entry, &paths.sass_dir, &paths.css_out) else {
            continue;
        };
        let dest = dest.with_extension("css");
        let map_dest = PathBuf::from(format!("{}.map", dest.display()));

        let (css, map) = compile_file(&entry, &paths.sass_dir, browsers)?;

        ensure_parent(&dest)?;
        let map_name = map_dest.file_name().map(|n| n.to_string_lossy().into_owned());
        let css = match map_name {
            Some(name) => format!("{}\n/*# sourceMappingURL={} */\n", css.trim_end(), name),
            None => css,
        };
        fs::write(&dest, css)?;
        fs::write(&map_dest, map)?;
        written.push(dest);
        written.push(map_dest);
    }

    Ok(written)
}

/// Compile one stylesheet, returning (css, source map JSON).
pub fn compile_file(
    entry: &Path,
    sass_root: &Path,
    browsers: &[String],
) -> Result<(String, String), TaskError> {
    let source = fs::read_to_string(entry)?;
    let base = entry.parent().unwrap_or(sass_root);
    let expanded = expand_glob_uses(&source, base);

    let options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .load_path(sass_root)
        .load_path(base);
    let css = grass::from_string(expanded, &options)
        .map_err(|e| TaskError::Sass { file: entry.to_path_buf(), message: e.to_string() })?;

    let label = entry.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let (css, map) = post_process(&label, &css, browsers)
        .map_err(|message| TaskError::Css { file: entry.to_path_buf(), message })?;

    let css = merge_media_queries(&sort_declarations(&css));
    Ok((css, map))
}

/// Partials (leading underscore) are only ever pulled in by other sheets.
fn is_partial(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('_'))
}

/// Run compiled CSS through lightningcss: vendor prefixes and syntax
/// downleveling for the browser matrix, expanded printing, source map.
fn post_process(label: &str, css: &str, queries: &[String]) -> Result<(String, String), String> {
    let browsers = Browsers::from_browserslist(queries).map_err(|e| e.to_string())?;
    let targets = Targets { browsers, ..Targets::default() };

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions { filename: label.to_string(), ..ParserOptions::default() },
    )
    .map_err(|e| e.to_string())?;

    sheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| e.to_string())?;

    let mut source_map = SourceMap::new("/");
    source_map.add_source(label);
    let _ = source_map.set_source_content(0, css);

    let result = sheet
        .to_css(PrinterOptions {
            minify: false,
            source_map: Some(&mut source_map),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let map_json = source_map.to_json(None).map_err(|e| e.to_string())?;
    Ok((result.code, map_json))
}

/// Expand `@use "dir/*";` / `@forward "dir/*";` into one rule per partial
/// in that directory, alphabetically. Non-glob rules pass through.
fn expand_glob_uses(source: &str, base: &Path) -> String {
    let mut out = String::with_capacity(source.len());

    for line in source.lines() {
        let trimmed = line.trim_start();
        let is_use = trimmed.starts_with("@use");
        let is_forward = trimmed.starts_with("@forward");

        if is_use || is_forward {
            if let Some(spec) = glob_specifier(trimmed) {
                let prefix = spec.trim_end_matches("/*");
                let mut names = partial_names(&base.join(prefix));
                names.sort();
                for name in &names {
                    if is_use {
                        out.push_str(&format!("@use \"{}/{}\" as *;\n", prefix, name));
                    } else {
                        out.push_str(&format!("@forward \"{}/{}\";\n", prefix, name));
                    }
                }
                if !names.is_empty() {
                    continue;
                }
            }
        }

        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Pull the quoted specifier out of a rule line, if it ends in `/*`.
fn glob_specifier(line: &str) -> Option<&str> {
    let rest = line.split_once(char::is_whitespace)?.1.trim_start();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let end = rest[1..].find(quote)?;
    let spec = &rest[1..end + 1];
    if spec.ends_with("/*") {
        Some(spec)
    } else {
        None
    }
}

/// Module names for every `.scss` partial directly inside `dir`.
fn partial_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter_map(|e| {
            let path = e.path();
            if path.extension().and_then(|x| x.to_str()) != Some("scss") {
                return None;
            }
            let stem = path.file_stem()?.to_str()?;
            let name = stem.trim_start_matches('_');
            if name == "index" {
                return None;
            }
            Some(name.to_string())
        })
        .collect()
}

/// Sort runs of consecutive declaration lines alphabetically by property
/// name. Works on the expanded printer output (one declaration per line);
/// prefixed properties sort ahead of their unprefixed forms because `-`
/// orders before letters.
fn sort_declarations(css: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut run: Vec<String> = Vec::new();

    for line in css.lines() {
        if is_declaration(line) {
            run.push(line.to_string());
        } else {
            flush_sorted(&mut run, &mut out);
            out.push(line.to_string());
        }
    }
    flush_sorted(&mut run, &mut out);

    let mut joined = out.join("\n");
    if css.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

fn is_declaration(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty()
        && !t.starts_with('@')
        && !t.starts_with("/*")
        && t.ends_with(';')
        && t.contains(':')
        && !t.contains('{')
        && !t.contains('}')
}

fn flush_sorted(run: &mut Vec<String>, out: &mut Vec<String>) {
    run.sort_by(|a, b| property_name(a).cmp(&property_name(b)));
    out.append(run);
}

fn property_name(line: &str) -> String {
    line.trim().split(':').next().unwrap_or("").trim().to_ascii_lowercase()
}

#[derive(Debug)]
enum Segment {
    Raw(String),
    Media { query: String, body: String },
}

/// Merge top-level `@media` blocks with identical queries into the first
/// occurrence, preserving order otherwise. Quote-aware brace scanning; the
/// input is the expanded printer output, not arbitrary CSS.
fn merge_media_queries(css: &str) -> String {
    let segments = split_top_level(css);

    let mut result: Vec<Segment> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for segment in segments {
        match segment {
            Segment::Raw(text) => result.push(Segment::Raw(text)),
            Segment::Media { query, body } => {
                if let Some(&at) = index.get(&query) {
                    if let Segment::Media { body: first, .. } = &mut result[at] {
                        if !first.ends_with('\n') {
                            first.push('\n');
                        }
                        first.push_str(body.trim_start_matches('\n'));
                    }
                } else {
                    index.insert(query.clone(), result.len());
                    result.push(Segment::Media { query, body });
                }
            }
        }
    }

    let mut out = String::with_capacity(css.len());
    for segment in &result {
        match segment {
            Segment::Raw(text) => out.push_str(text),
            Segment::Media { query, body } => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(query);
                out.push_str(" {");
                out.push_str(body);
                out.push_str("}\n");
            }
        }
    }
    out
}

/// Split CSS into top-level segments: `@media` blocks and everything else.
fn split_top_level(css: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut segment_start = 0usize;
    let mut prelude_end = 0usize;

    for (i, c) in css.char_indices() {
        if let Some(quote) = in_string {
            if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => in_string = Some(c),
            '{' => {
                if depth == 0 {
                    prelude_end = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let prelude = &css[segment_start..prelude_end];
                    let body = &css[prelude_end + 1..i];
                    if let Some(at) = prelude.find("@media") {
                        let head = &prelude[..at];
                        if !head.is_empty() {
                            segments.push(Segment::Raw(head.to_string()));
                        }
                        segments.push(Segment::Media {
                            query: normalize_whitespace(&prelude[at..]),
                            body: body.to_string(),
                        });
                    } else {
                        segments.push(Segment::Raw(css[segment_start..=i].to_string()));
                    }
                    segment_start = i + 1;
                }
            }
            _ => {}
        }
    }

    if segment_start < css.len() {
        segments.push(Segment::Raw(css[segment_start..].to_string()));
    }
    segments
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sort_declarations_within_block() {
        let css = ".card {\n  z-index: 1;\n  color: red;\n  background: blue;\n}\n";
        let sorted = sort_declarations(css);
        let background = sorted.find("background").unwrap();
        let color = sorted.find("color").unwrap();
        let z_index = sorted.find("z-index").unwrap();
        assert!(background < color && color < z_index);
    }

    #[test]
    fn test_sort_declarations_prefix_first() {
        let css = ".a {\n  user-select: none;\n  -webkit-user-select: none;\n}\n";
        let sorted = sort_declarations(css);
        assert!(sorted.find("-webkit-user-select").unwrap() < sorted.find("\n  user-select").unwrap());
    }

    #[test]
    fn test_sort_declarations_blocks_independent() {
        let css = ".a {\n  color: red;\n}\n\n.b {\n  border: 0;\n  animation: spin 1s;\n}\n";
        let sorted = sort_declarations(css);
        // .a's declaration must stay inside .a
        assert!(sorted.find(".a").unwrap() < sorted.find("color").unwrap());
        assert!(sorted.find("animation").unwrap() < sorted.find("border").unwrap());
    }

    #[test]
    fn test_merge_media_queries_identical() {
        let css = "@media (min-width: 600px) {\n  .a {\n    color: red;\n  }\n}\n\
                   .plain {\n  margin: 0;\n}\n\
                   @media (min-width: 600px) {\n  .b {\n    color: blue;\n  }\n}\n";
        let merged = merge_media_queries(css);
        assert_eq!(merged.matches("@media").count(), 1);
        let media_at = merged.find("@media").unwrap();
        assert!(merged[media_at..].contains(".a") && merged[media_at..].contains(".b"));
        assert!(merged.contains(".plain"));
    }

    #[test]
    fn test_merge_media_queries_distinct_kept() {
        let css = "@media (min-width: 600px) {\n  .a {\n    color: red;\n  }\n}\n\
                   @media (min-width: 900px) {\n  .b {\n    color: blue;\n  }\n}\n";
        let merged = merge_media_queries(css);
        assert_eq!(merged.matches("@media").count(), 2);
    }

    #[test]
    fn test_merge_media_queries_braces_in_strings() {
        let css = ".a {\n  content: \"{\";\n}\n@media print {\n  .b {\n    display: none;\n  }\n}\n";
        let merged = merge_media_queries(css);
        assert!(merged.contains("content: \"{\""));
        assert_eq!(merged.matches("@media").count(), 1);
    }

    #[test]
    fn test_glob_specifier() {
        assert_eq!(glob_specifier("@use \"components/*\";"), Some("components/*"));
        assert_eq!(glob_specifier("@forward 'mixins/*';"), Some("mixins/*"));
        assert_eq!(glob_specifier("@use \"variables\";"), None);
        assert_eq!(glob_specifier("@use components;"), None);
    }

    #[test]
    fn test_expand_glob_uses() {
        let temp = TempDir::new().unwrap();
        let components = temp.path().join("components");
        fs::create_dir_all(&components).unwrap();
        fs::write(components.join("_button.scss"), ".btn { color: red; }").unwrap();
        fs::write(components.join("_card.scss"), ".card { margin: 0; }").unwrap();

        let expanded = expand_glob_uses("@use \"components/*\";\nbody { margin: 0; }", temp.path());
        assert!(expanded.contains("@use \"components/button\" as *;"));
        assert!(expanded.contains("@use \"components/card\" as *;"));
        assert!(!expanded.contains("components/*"));
        assert!(expanded.contains("body { margin: 0; }"));
    }

    #[test]
    fn test_expand_glob_uses_empty_dir_passthrough() {
        let temp = TempDir::new().unwrap();
        let source = "@use \"missing/*\";\n";
        // Nothing matched: the original line survives so grass reports it.
        assert_eq!(expand_glob_uses(source, temp.path()), source);
    }

    #[test]
    fn test_is_partial() {
        assert!(is_partial(Path::new("src/sass/_variables.scss")));
        assert!(!is_partial(Path::new("src/sass/style.scss")));
    }

    #[test]
    fn test_compile_file_prefixes_and_sorts() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("style.scss");
        fs::write(&entry, ".card {\n  z-index: 1;\n  user-select: none;\n  color: red;\n}\n")
            .unwrap();

        let browsers: Vec<String> =
            ["ie 11", "ios >= 8", "last 2 versions"].iter().map(|s| s.to_string()).collect();
        let (css, map) = compile_file(&entry, temp.path(), &browsers).unwrap();

        assert!(css.contains("-webkit-user-select") || css.contains("-ms-user-select"));
        assert!(css.find("color").unwrap() < css.find("z-index").unwrap());
        assert!(map.contains("\"sources\""));
    }

    #[test]
    fn test_compile_file_syntax_error() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("broken.scss");
        fs::write(&entry, ".a { color: $undefined-variable; }").unwrap();

        let browsers = vec!["last 2 versions".to_string()];
        let result = compile_file(&entry, temp.path(), &browsers);
        assert!(matches!(result, Err(TaskError::Sass { .. })));
    }
}
