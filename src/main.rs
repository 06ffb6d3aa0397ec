//! CLI tool for inspecting a PDF for scripts, attachments, links and
//! unusual structure.

use pdffindings::{Anomaly, PdfAnalyzer, Report};
use std::{env, process};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

struct Options {
    pdf_path: String,
    json: bool,
    extract_dir: Option<String>,
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("pdffindings");

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(program);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let options = match parse_args(&args[1..]) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("❌ {message}");
            print_usage(program);
            process::exit(1);
        }
    };

    init_logging(options.verbose);

    let analyzer = match PdfAnalyzer::from_path(&options.pdf_path) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("❌ Failed to load '{}': {}", options.pdf_path, e);
            process::exit(1);
        }
    };

    let report = analyzer.analyze().await;

    if options.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("❌ Failed to serialise report: {e}");
                process::exit(1);
            }
        }
    } else {
        print_report(&options.pdf_path, analyzer.page_count(), &report);
    }

    if let Some(dir) = &options.extract_dir {
        extract_attachments(&report, dir);
    }
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut pdf_path = None;
    let mut json = false;
    let mut extract_dir = None;
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "-v" | "--verbose" => verbose = true,
            "--extract" => {
                let dir = iter.next().ok_or("--extract needs a directory")?;
                extract_dir = Some(dir.clone());
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option '{flag}'")),
            path if pdf_path.is_none() => pdf_path = Some(path.to_string()),
            extra => return Err(format!("unexpected argument '{extra}'")),
        }
    }

    Ok(Options {
        pdf_path: pdf_path.ok_or("missing <pdf_file>")?,
        json,
        extract_dir,
        verbose,
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_usage(program_name: &str) {
    println!("🔎 pdffindings - PDF security findings extractor");
    println!();
    println!("USAGE:");
    println!("    {} <pdf_file> [options]", program_name);
    println!();
    println!("OPTIONS:");
    println!("    --json             Print the report as JSON");
    println!("    --extract <dir>    Write every attachment into <dir>");
    println!("    -v, --verbose      Log every finding while analysing");
    println!("    -h, --help         Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("    {} invoice.pdf", program_name);
    println!("    {} invoice.pdf --json", program_name);
    println!("    {} invoice.pdf --extract ./attachments", program_name);
    println!();
    println!("RUST_LOG overrides the log filter.");
}

fn print_report(pdf_path: &str, pages: u32, report: &Report) {
    println!("🔍 Analysed: {}", pdf_path);
    println!("📄 Pages   : {}", pages);
    println!(
        "🔑 SHA-256 : {}",
        report.document_hash.as_deref().unwrap_or("(not computed)")
    );
    println!("{}", "─".repeat(60));

    print_anomalies("🏷️  Document", &report.other);

    println!("\n📜 Scripts: {}", report.scripts.len());
    for (i, (source, provenance)) in report.scripts.iter().enumerate() {
        println!("\n   Script #{} ({} bytes)", i + 1, source.len());
        for (trigger, origin_type, detail) in provenance.locations() {
            if detail.is_empty() {
                println!("     ↳ {trigger} on {origin_type}");
            } else {
                println!("     ↳ {trigger} on {origin_type} {detail}");
            }
        }
        println!("     {}", preview(source, 120));
    }

    println!("\n📎 Attachments: {}", report.attachments.len());
    for attachment in &report.attachments {
        println!(
            "   • {} ({}), {}, sha256 {}",
            attachment.filename,
            attachment.origin,
            format_bytes(attachment.len()),
            attachment.digest()
        );
    }

    println!("\n🔗 Links: {}", report.links.len());
    for link in &report.links {
        println!("   • {}: {}", link.origin, link.url);
    }

    print_anomalies("⚠️  Suspicious annotations", &report.suspicious_annotations);
    print_anomalies("❌ Errors", &report.errors);

    println!("\n{}", "─".repeat(60));
    if report.is_clean() {
        println!("✅ Nothing of interest found.");
    }
}

fn print_anomalies(title: &str, anomalies: &[Anomaly]) {
    println!("\n{}: {}", title, anomalies.len());
    for anomaly in anomalies {
        println!("   • {}: {}", anomaly.origin(), anomaly.description());
    }
}

fn extract_attachments(report: &Report, dir: &str) {
    if report.attachments.is_empty() {
        println!("ℹ️  No attachments to extract");
        return;
    }
    for attachment in &report.attachments {
        match attachment.save_to_disk(dir) {
            Ok(path) => println!("💾 Saved {}", path.display()),
            Err(e) => eprintln!("❌ Failed to save '{}': {}", attachment.filename, e),
        }
    }
}

/// First line of `source`, cut to `max` characters.
fn preview(source: &str, max: usize) -> String {
    let line = source.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut out: String = line.trim().chars().take(max).collect();
    if line.trim().chars().count() > max || source.lines().count() > 1 {
        out.push('…');
    }
    out
}

fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
