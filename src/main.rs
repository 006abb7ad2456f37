//! Command-line interface for dml

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use dml::codec::{self, ReadOptions, WriteOptions};
#[cfg(feature = "cli")]
use dml::schema::{FileResolver, TranslationResolver};
#[cfg(feature = "cli")]
use dml::xml::{self, ExportOptions, ImportOptions};
#[cfg(feature = "cli")]
use dml::Document;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "dml")]
#[command(author, version, about = "DML binary/XML conversion and inspection tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert between XML and binary DML (by file extension)
    Convert {
        /// Input file (`.xml` is read as XML, anything else as binary)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (`.xml` is written as XML, anything else as binary)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Deflate level for compressed fragments (0-9)
        #[arg(short, long, default_value_t = 6)]
        level: u32,

        /// Keep imported text untyped instead of folding it into primitives
        #[arg(long)]
        no_optimize: bool,
    },

    /// Resolve a translation document and list its associations
    Inspect {
        /// Path to the translation document
        #[arg(value_name = "TRANSLATION")]
        translation: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Decode a binary document and check its compressed fragments
    Verify {
        /// Path to the binary document
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            level,
            no_optimize,
        } => cmd_convert(&input, &output, level, !no_optimize),
        Commands::Inspect { translation, json } => cmd_inspect(&translation, json),
        Commands::Verify { file } => cmd_verify(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("xml"))
}

#[cfg(feature = "cli")]
fn resolver_for(path: &Path) -> FileResolver {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => FileResolver::new(dir),
        _ => FileResolver::new("."),
    }
}

#[cfg(feature = "cli")]
fn load(path: &Path, resolver: &FileResolver, optimize: bool) -> dml::Result<Document> {
    let bytes = fs::read(path)?;
    if is_xml(path) {
        let options = ImportOptions::default().with_optimize(optimize);
        xml::import_xml(&bytes[..], resolver, &options)
    } else {
        codec::read_document(&bytes[..], resolver, &ReadOptions::default())
    }
}

#[cfg(feature = "cli")]
fn cmd_convert(
    input: &Path,
    output: &Path,
    level: u32,
    optimize: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = resolver_for(input);
    let document = load(input, &resolver, optimize)?;

    let sink = std::io::BufWriter::new(fs::File::create(output)?);
    if is_xml(output) {
        xml::export_xml(&document, sink, &ExportOptions::default())?;
    } else {
        let options = WriteOptions::default().with_compression_level(level);
        codec::write_document(&document, sink, &options)?;
    }

    println!(
        "Converted {} -> {} ({} nodes)",
        input.display(),
        output.display(),
        document.node_count()
    );
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_inspect(path: &Path, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = resolver_for(path);
    let document = load(path, &resolver, true)?;
    let resolved = TranslationResolver::new(&resolver).resolve_document(&document)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resolved.to_json())?);
        return Ok(());
    }

    println!("dml v{}", dml::VERSION);
    println!();
    println!("Translation: {}", resolved.translation.uri().unwrap_or("(anonymous)"));
    println!("  Associations: {}", resolved.translation.len());
    if !resolved.required_sets.is_empty() {
        println!("\n=== Required Primitive Sets ===");
        for set in &resolved.required_sets {
            let support = if set.is_supported() { "" } else { " (unsupported)" };
            println!("  {}{}", set, support);
        }
    }

    println!("\n=== Associations ===");
    for association in resolved.translation.iter() {
        println!(
            "  {:>6}  {} : {}",
            association.id(),
            association.name(),
            association.kind()
        );
        if let Some(local) = association.local_translation() {
            for nested in local.iter() {
                println!("  {:>6}    {} : {}", nested.id(), nested.name(), nested.kind());
            }
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_verify(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = resolver_for(path);
    let bytes = fs::read(path)?;
    let document = codec::read_document(&bytes[..], &resolver, &ReadOptions::default())?;
    let (validated, total) = codec::validation_summary(&document);

    println!("{}: OK", path.display());
    println!("  Nodes: {}", document.node_count());
    println!("  Compressed fragments: {} ({} checksum-validated)", total, validated);
    if validated < total {
        println!("  {} fragment(s) carried no checksum", total - validated);
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
