use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use composer::ComposeDiagnostic;
use doctree::SectionKind;

#[derive(Debug, Deserialize)]
pub struct ExpectedDiagnostic {
    /// Substring that must appear in the diagnostic message.
    pub contains: String,

    /// If set, the diagnostic's span must start on this 1-based line of
    /// the source section it points into.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Data context as an inline TOML table, converted to JSON before
    /// composing. Defaults to an empty object.
    #[serde(default)]
    pub data: Option<toml::Value>,

    /// Extra header/footer section sources.
    #[serde(default)]
    pub headers: Vec<String>,

    /// Extra footer section sources.
    #[serde(default)]
    pub footers: Vec<String>,

    /// Expected composed output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected diagnostics. If present (even empty), count and content
    /// are checked.
    #[serde(default)]
    pub expect_diagnostics: Option<Vec<ExpectedDiagnostic>>,
}

/// Convert TOML frontmatter data to the JSON value tree the engine
/// consumes.
fn toml_to_json(value: &toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s.clone()),
        toml::Value::Integer(n) => serde_json::Value::Number((*n).into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        toml::Value::Boolean(b) => serde_json::Value::Bool(*b),
        toml::Value::Datetime(d) => serde_json::Value::String(d.to_string()),
        toml::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Parse a `.test.md` file into its TOML config and template source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, body) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    // Source id 0 is the body; headers and footers follow in order.
    let mut sources: Vec<String> = vec![body.to_string()];
    let mut template = doctree::Parser::new(body.to_string(), 0).parse();
    for header in &config.headers {
        let id = sources.len();
        sources.push(header.clone());
        doctree::Parser::new(header.clone(), id).parse_section(&mut template, SectionKind::Header);
    }
    for footer in &config.footers {
        let id = sources.len();
        sources.push(footer.clone());
        doctree::Parser::new(footer.clone(), id).parse_section(&mut template, SectionKind::Footer);
    }

    let data = match &config.data {
        Some(value) => toml_to_json(value),
        None => serde_json::Value::Object(serde_json::Map::new()),
    };

    let composed = match composer::compose(&template, &data) {
        Ok(c) => c,
        Err(e) => return fail(description, format!("compose error: {}", e)),
    };

    if let Some(expected_output) = &config.expect_output {
        let actual = composed.document.to_markdown();
        let actual_trimmed = actual.trim();
        let expected_trimmed = expected_output.trim();
        if actual_trimmed != expected_trimmed {
            return fail(
                description,
                format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected_trimmed.replace('\n', "\\n"),
                    actual_trimmed.replace('\n', "\\n")
                ),
            );
        }
    }

    if let Some(expected) = &config.expect_diagnostics {
        if let Some(reason) = check_diagnostics(&sources, &composed.diagnostics, expected) {
            return fail(description, reason);
        }
    }

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Pass,
    }
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Check that actual diagnostics match expectations. Returns
/// `Some(reason)` on mismatch.
fn check_diagnostics(
    sources: &[String],
    diagnostics: &[ComposeDiagnostic],
    expected: &[ExpectedDiagnostic],
) -> Option<String> {
    if diagnostics.len() != expected.len() {
        let actual_msgs: Vec<String> = diagnostics
            .iter()
            .map(|d| format!("  - {}", d))
            .collect();
        return Some(format!(
            "expected {} diagnostic(s), got {}\n  actual diagnostics:\n{}",
            expected.len(),
            diagnostics.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in diagnostics.iter().zip(expected.iter()).enumerate() {
        let msg = actual.to_string();

        if !msg.contains(&expected.contains) {
            return Some(format!(
                "diagnostic[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, msg
            ));
        }

        if let Some(expected_line) = expected.line {
            let Some(span) = &actual.span else {
                return Some(format!(
                    "diagnostic[{}]: expected on line {}, but diagnostic has no span",
                    i, expected_line
                ));
            };
            let source = sources
                .get(actual.source_id)
                .map(String::as_str)
                .unwrap_or("");
            let actual_line = byte_offset_to_line(source, span.start);
            if actual_line != expected_line {
                return Some(format!(
                    "diagnostic[{}]: expected on line {}, but span is on line {}",
                    i, expected_line, actual_line
                ));
            }
        }
    }

    None
}

/// Discover `.test.md` files grouped by category (subfolder relative to
/// `root`). Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".test.md") {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn result_label(result: &TestResult) -> String {
    result
        .description
        .clone()
        .unwrap_or_else(|| {
            result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
                .to_string()
        })
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    // Single file mode, ignoring categories.
    if path.is_file() {
        let result = run_single_test(path);
        let label = result_label(&result);
        return match &result.outcome {
            TestOutcome::Pass => {
                eprintln!("  {}  {}", pass_label(no_color), label);
                eprintln!();
                eprintln!(
                    "test result: {}. 1 passed, 0 failed",
                    if no_color { "ok" } else { "\x1b[32mok\x1b[0m" }
                );
                0
            }
            TestOutcome::Fail(reason) => {
                eprintln!("  {}  {}", fail_label(no_color), label);
                eprintln!();
                eprintln!("failures:");
                eprintln!();
                eprintln!("  --- {} ---", path.display());
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
                eprintln!();
                eprintln!(
                    "test result: {}. 0 passed, 1 failed (of 1)",
                    if no_color {
                        "FAILED"
                    } else {
                        "\x1b[31mFAILED\x1b[0m"
                    }
                );
                1
            }
        };
    }

    let all_categories = discover_categorized(path);

    if all_categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return 1;
    }

    let run_categories: BTreeMap<&str, &Vec<PathBuf>> = if categories.is_empty() {
        all_categories.iter().map(|(k, v)| (k.as_str(), v)).collect()
    } else {
        let mut filtered = BTreeMap::new();
        for requested in categories {
            let req = requested.trim_matches('/');
            let mut found = false;
            for (cat, files) in &all_categories {
                if cat == req || cat.starts_with(&format!("{}/", req)) {
                    filtered.insert(cat.as_str(), files);
                    found = true;
                }
            }
            if !found {
                eprintln!(
                    "warning: category '{}' not found (available: {})",
                    req,
                    all_categories
                        .keys()
                        .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        filtered
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        let header = if cat.is_empty() {
            "(root)".to_string()
        } else {
            cat.to_string()
        };
        eprintln!();
        eprintln!("{}", bold(&header, no_color));

        for file in *files {
            let result = run_single_test(file);
            let label = result_label(&result);

            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label);
                }
                TestOutcome::Fail(_) => {
                    failed += 1;
                    eprintln!("  {}  {}", fail_label(no_color), label);
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failed == 0 {
        if no_color {
            eprintln!("test result: ok. {} passed, 0 failed", passed);
        } else {
            eprintln!("test result: \x1b[32mok\x1b[0m. {} passed, 0 failed", passed);
        }
        0
    } else {
        let total = passed + failed;
        if no_color {
            eprintln!(
                "test result: FAILED. {} passed, {} failed (of {})",
                passed, failed, total
            );
        } else {
            eprintln!(
                "test result: \x1b[31mFAILED\x1b[0m. {} passed, {} failed (of {})",
                passed, failed, total
            );
        }
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn frontmatter_round_trip() {
        let content = "---\ndescription = \"demo\"\n\n[data]\nname = \"Ada\"\n---\nHello `@{name}`\n";
        let (config, source) = parse_test_file(content).expect("frontmatter parses");
        assert_eq!(config.description.as_deref(), Some("demo"));
        assert_eq!(source, "Hello `@{name}`\n");
        let data = toml_to_json(config.data.as_ref().expect("data table"));
        assert_eq!(data["name"], serde_json::json!("Ada"));
    }

    #[test]
    fn missing_frontmatter_is_rejected() {
        assert!(parse_test_file("no frontmatter here").is_err());
    }

    #[test]
    fn discovers_tests_by_category() {
        let dir = tempfile::tempdir().expect("temp dir");
        let sub = dir.path().join("tables");
        std::fs::create_dir(&sub).expect("mkdir");

        let mut root_test = std::fs::File::create(dir.path().join("a.test.md")).unwrap();
        write!(root_test, "---\n---\nhello\n").unwrap();
        let mut sub_test = std::fs::File::create(sub.join("b.test.md")).unwrap();
        write!(sub_test, "---\n---\nworld\n").unwrap();

        let categories = discover_categorized(dir.path());
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[""].len(), 1);
        assert_eq!(categories["tables"].len(), 1);
    }

    #[test]
    fn passing_test_file_runs_green() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("subst.test.md");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "---\nexpect_output = \"Hello Ada\"\n\n[data]\nname = \"Ada\"\n---\nHello `@{{name}}`\n"
        )
        .unwrap();

        let result = run_single_test(&path);
        assert!(matches!(result.outcome, TestOutcome::Pass));
    }
}
