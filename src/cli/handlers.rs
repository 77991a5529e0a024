// FILE: src/cli/handlers.rs
use crate::cli::{LayoutCli, OutputFormat};
use crate::core::types::{NodeId, Rect};
use crate::document::{load_file, DOCUMENT_EXTENSIONS};
use crate::{LayoutError, LayoutOptions, LayoutTree, Result, UpdateReport};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::Instant;

#[derive(Debug, Serialize)]
struct NodeSummary {
    index: usize,
    id: Option<String>,
    #[serde(rename = "type")]
    type_name: String,
    depth: usize,
    frame: Rect,
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvalOutput<'a> {
    document: &'a str,
    report: &'a UpdateReport,
    nodes: Vec<NodeSummary>,
    symbols: Vec<(String, String)>,
    warnings: Vec<String>,
}

fn input_of(matches: &clap::ArgMatches) -> Result<&String> {
    matches.get_one::<String>("input").ok_or_else(|| LayoutError::InvalidFormat {
        message: "Missing input document".to_string(),
    })
}

// --- EVAL ---
pub fn handle_eval_command(cli: &LayoutCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_of(matches)?;
    let options = cli.build_layout_options(matches)?;

    if matches.get_flag("watch") {
        watch_and_evaluate(input_path, options, matches)
    } else {
        evaluate_single_file(input_path, options, matches)?;
        log::info!("Finished in {}ms", cli.elapsed_ms());
        Ok(())
    }
}

fn evaluate_single_file(input_path: &str, options: LayoutOptions, matches: &clap::ArgMatches) -> Result<()> {
    let eval_start = Instant::now();
    let (mut tree, root) = load_file(input_path, options)?;
    let report = tree.update();
    let eval_time = eval_start.elapsed();

    let symbols: Vec<(String, String)> = matches
        .get_many::<String>("symbol")
        .into_iter()
        .flatten()
        .map(|symbol| {
            let value = match tree.resolve(root, symbol) {
                Ok(value) => value.to_string(),
                Err(e) => format!("error: {}", e),
            };
            (symbol.clone(), value)
        })
        .collect();

    let format = matches.get_one::<OutputFormat>("format").unwrap_or(&OutputFormat::Text);
    match format {
        OutputFormat::Json => {
            let output = EvalOutput {
                document: input_path,
                report: &report,
                nodes: summarize(&tree, &report),
                symbols,
                warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
            };
            let json = serde_json::to_string_pretty(&output).map_err(|e| LayoutError::InvalidFormat {
                message: format!("Cannot serialize output: {}", e),
            })?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("📐 {} ({} nodes, {:.2}ms)", input_path, report.nodes, eval_time.as_secs_f64() * 1000.0);
            for summary in summarize(&tree, &report) {
                let label = summary.id.map(|id| format!("#{}", id)).unwrap_or_default();
                println!(
                    "{}{} {} x={} y={} w={} h={}",
                    "  ".repeat(summary.depth + 1),
                    summary.type_name,
                    label,
                    summary.frame.x,
                    summary.frame.y,
                    summary.frame.width,
                    summary.frame.height
                );
                for error in summary.errors {
                    println!("{}  ❌ {}", "  ".repeat(summary.depth + 1), error);
                }
            }
            for (symbol, value) in &symbols {
                println!("   {} = {}", symbol, value);
            }
            for warning in &report.warnings {
                println!("   ⚠️  {}", warning);
            }
            if let Some(overlay) = tree.overlay() {
                println!("\n🐞 Debug overlay:\n{}", overlay);
            }
        }
    }

    if matches.get_flag("stats") {
        print_detailed_stats(&tree, &report);
    }
    Ok(())
}

fn summarize(tree: &LayoutTree, report: &UpdateReport) -> Vec<NodeSummary> {
    tree.roots()
        .into_iter()
        .flat_map(|root| tree.subtree(root))
        .filter_map(|id: NodeId| {
            let node = tree.node(id).ok()?;
            Some(NodeSummary {
                index: id.0,
                id: node.id().map(|s| s.to_string()),
                type_name: node.type_name().to_string(),
                depth: tree.ancestors(id).len(),
                frame: node.host().frame,
                errors: report
                    .errors
                    .iter()
                    .filter(|record| record.origin == id)
                    .map(|record| record.message.clone())
                    .collect(),
            })
        })
        .collect()
}

fn watch_and_evaluate(input_path: &str, options: LayoutOptions, matches: &clap::ArgMatches) -> Result<()> {
    println!("👀 Watching {} for changes...", input_path);

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    log::error!("Watch error: {}", e);
                }
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| {
        LayoutError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to create file watcher: {}", e),
        ))
    })?;

    watcher
        .watch(Path::new(input_path), RecursiveMode::NonRecursive)
        .map_err(|e| {
            LayoutError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to watch file: {}", e),
            ))
        })?;

    if let Err(e) = evaluate_single_file(input_path, options.clone(), matches) {
        eprintln!("❌ Initial evaluation failed: {}", e);
    }

    loop {
        match rx.recv() {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                println!("🔄 Document changed, re-evaluating...");
                if let Err(e) = evaluate_single_file(input_path, options.clone(), matches) {
                    eprintln!("❌ Evaluation failed: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

// --- CHECK ---
pub fn handle_check_command(cli: &LayoutCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_of(matches)?;
    let options = cli.build_layout_options(matches)?;

    if matches.get_flag("recursive") && Path::new(input_path).is_dir() {
        check_directory_recursive(input_path, &options)
    } else {
        check_single_file(Path::new(input_path), options)
    }
}

fn check_single_file(input_path: &Path, options: LayoutOptions) -> Result<()> {
    println!("🔍 Checking {}", input_path.display());
    let outcome = load_file(input_path, options).map(|(mut tree, _)| tree.update());
    match outcome {
        Ok(report) if report.errors.is_empty() => {
            println!("✅ {} - No issues found", input_path.display());
            for warning in &report.warnings {
                println!("   ⚠️  {}", warning);
            }
            Ok(())
        }
        Ok(report) => {
            for record in &report.errors {
                println!("❌ {} - {}: {}", input_path.display(), record.origin, record.message);
            }
            Err(LayoutError::MalformedDocument {
                message: format!("{} evaluation error(s) in {}", report.errors.len(), input_path.display()),
            })
        }
        Err(e) => {
            println!("❌ {} - {}", input_path.display(), e);
            Err(e)
        }
    }
}

fn check_directory_recursive(dir_path: &str, options: &LayoutOptions) -> Result<()> {
    let mut total_files = 0;
    let mut error_files = 0;

    for entry in walkdir::WalkDir::new(dir_path) {
        let entry = entry.map_err(|e| {
            LayoutError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        let is_document = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| DOCUMENT_EXTENSIONS.contains(&ext));
        if entry.file_type().is_file() && is_document {
            total_files += 1;
            if check_single_file(entry.path(), options.clone()).is_err() {
                error_files += 1;
            }
        }
    }

    println!("\n📊 Check Summary:");
    println!("   Total documents: {}", total_files);
    println!("   Documents with errors: {}", error_files);
    if total_files > 0 {
        println!(
            "   Success rate: {:.1}%",
            (total_files - error_files) as f64 / total_files as f64 * 100.0
        );
    }

    if error_files > 0 {
        Err(LayoutError::MalformedDocument {
            message: format!("{} document(s) have errors", error_files),
        })
    } else {
        Ok(())
    }
}

// --- SYMBOLS ---
pub fn handle_symbols_command(cli: &LayoutCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_of(matches)?;
    let options = cli.build_layout_options(matches)?;
    let (tree, root) = load_file(input_path, options)?;

    let node = match matches.get_one::<String>("node") {
        Some(id) => tree
            .find_by_id(root, id)
            .ok_or_else(|| LayoutError::UnknownNodeId { id: id.clone() })?,
        None => root,
    };

    println!("🔤 Symbols visible from {}:", node);
    for symbol in tree.available_symbols(node) {
        println!("   {}", symbol);
    }
    Ok(())
}

// --- HELPERS ---
fn print_detailed_stats(tree: &LayoutTree, report: &UpdateReport) {
    let stats = tree.stats();
    println!("\n📊 Evaluation Statistics:");
    println!("   Layout pass: {}", tree.pass());
    println!("   Nodes: {}", report.nodes);
    println!("   Values applied: {}", report.applied);
    println!("   Evaluations: {}", stats.evaluations);
    println!("   Cache hits: {} ({} constant)", stats.cache_hits, stats.constant_hits);
    println!("   Compilations: {}", stats.compilations);
    println!("   Invalidations: {}", stats.invalidations);
    if report.suppressed {
        println!("   ⚠️  Pass suppressed by an update lock");
    }
}
