mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use composer::ComposeDiagnostic;
use doctree::{Document, NodeData, NodeId, SectionKind};

const SUBCOMMANDS: &[&str] = &["compose", "test", "help"];

#[derive(Parser)]
#[command(name = "weave", version, about = "Markdown template composer")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose a template with a JSON data context
    Compose(ComposeArgs),

    /// Run .test.md golden test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ComposeArgs {
    /// Markdown template file (the document body)
    template: String,

    /// JSON data file; the root value must be an object
    data: String,

    /// Write the composed document here instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Extra header section template (repeatable)
    #[arg(long)]
    header: Vec<String>,

    /// Extra footer section template (repeatable)
    #[arg(long)]
    footer: Vec<String>,

    /// Parse the template and lint its directives, don't compose
    #[arg(long)]
    check: bool,

    /// Dump the parsed tree
    #[arg(long)]
    ast: bool,

    /// Exit nonzero when composition reports an error diagnostic
    #[arg(long)]
    strict: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or a directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // Backwards compatibility: if the first positional arg is not a known
    // subcommand, inject "compose" so `weave t.md d.json` works like
    // `weave compose t.md d.json`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first_pos) = args.iter().skip(1).find(|a| !a.starts_with('-')) {
        let first_pos = first_pos.clone();
        if !SUBCOMMANDS.contains(&first_pos.as_str()) {
            let pos = args.iter().position(|a| *a == first_pos).unwrap();
            args.insert(pos, "compose".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Compose(compose_args) => do_compose(compose_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn do_compose(args: ComposeArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let mut files = SimpleFiles::new();

    // Parse the body template.
    let source = read_or_exit(&args.template);
    let file_id = files.add(args.template.clone(), source.clone());
    let mut template = doctree::Parser::new(source, file_id).parse();

    // Attach extra sections.
    for path in &args.header {
        let source = read_or_exit(path);
        let file_id = files.add(path.clone(), source.clone());
        doctree::Parser::new(source, file_id).parse_section(&mut template, SectionKind::Header);
    }
    for path in &args.footer {
        let source = read_or_exit(path);
        let file_id = files.add(path.clone(), source.clone());
        doctree::Parser::new(source, file_id).parse_section(&mut template, SectionKind::Footer);
    }

    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    // --check: lint directives and stop.
    if args.check {
        let lints = lint_directives(&template);
        for diag in &lints {
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, diag);
        }
        eprintln!(
            "ok: {} parsed successfully ({} suspect directives)",
            args.template,
            lints.len()
        );
        return;
    }

    // --ast: dump the tree and stop.
    if args.ast {
        println!("{:#?}", template);
        return;
    }

    // Load the data context.
    let data_source = read_or_exit(&args.data);
    let data: serde_json::Value = match serde_json::from_str(&data_source) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: cannot parse '{}': {}", args.data, e);
            process::exit(1);
        }
    };

    let composed = match composer::compose(&template, &data) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    for diag in &composed.diagnostics {
        let diagnostic = to_codespan(diag);
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
    }

    let result = match &args.output {
        Some(path) => std::fs::File::create(path)
            .and_then(|mut f| composed.document.save(&mut f)),
        None => composed.document.save(&mut std::io::stdout()),
    };
    if let Err(e) = result {
        eprintln!("error: cannot write output: {}", e);
        process::exit(1);
    }

    if args.strict && composed.diagnostics.iter().any(|d| !d.is_warning) {
        process::exit(1);
    }
}

fn read_or_exit(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path, e);
            process::exit(1);
        }
    }
}

fn to_codespan(diag: &ComposeDiagnostic) -> Diagnostic<usize> {
    let severity = if diag.is_warning {
        Severity::Warning
    } else {
        Severity::Error
    };
    let mut diagnostic = Diagnostic::new(severity).with_message(diag.to_string());
    if let Some(span) = &diag.span {
        diagnostic = diagnostic.with_labels(vec![Label::primary(diag.source_id, span.clone())]);
    }
    diagnostic
}

/// Warn about placeholders that look like directives but match no
/// grammar entry; composition would leave them as literal text.
fn lint_directives(doc: &Document) -> Vec<Diagnostic<usize>> {
    let mut lints = Vec::new();
    for root in doc.roots() {
        lint_node(doc, root, &mut lints);
    }
    lints
}

fn lint_node(doc: &Document, node: NodeId, lints: &mut Vec<Diagnostic<usize>>) {
    if let NodeData::Placeholder(p) = doc.data(node) {
        let text = p.text.trim();
        if text.starts_with('@') && composer::directive::parse(text).is_none() {
            lints.push(
                Diagnostic::warning()
                    .with_message(format!("directive matches no grammar entry: {}", text))
                    .with_labels(vec![Label::primary(p.source_id, p.span.clone())]),
            );
        }
    }
    for &child in doc.children(node) {
        lint_node(doc, child, lints);
    }
}
