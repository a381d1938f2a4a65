use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use ilmono::error::{MetadataError, MonoError};
use ilmono::instantiation::InstantiationTable;
use ilmono::metadata::snapshot::{parse_snapshot, LoadedSnapshot, RequestTarget};

#[derive(Parser)]
#[command(name = "ilmono")]
#[command(author, version, about = "Canonical instantiation keys for generic CIL signatures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the requested instantiations and print their keys
    Keys {
        /// The metadata snapshot (JSON)
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the requested instantiations without printing keys
    Check {
        /// The metadata snapshot (JSON)
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logger before parsing CLI args
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let result = match cli.command {
        Commands::Keys { input, json } => keys(input, json),
        Commands::Check { input } => check(input),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

/// 読み込み中のスナップショットファイル
struct SnapshotSource {
    files: SimpleFiles<String, String>,
    file_id: usize,
}

impl SnapshotSource {
    fn new(input: &Path) -> Result<(Self, String)> {
        let source = fs::read_to_string(input)
            .with_context(|| format!("Failed to read snapshot file: {:?}", input))?;

        let mut files = SimpleFiles::new();
        let file_id = files.add(input.display().to_string(), source.clone());
        Ok((Self { files, file_id }, source))
    }

    fn report_error(&self, diagnostic: &Diagnostic<usize>) -> Result<()> {
        let writer = StandardStream::stderr(ColorChoice::Always);
        let config = codespan_reporting::term::Config::default();
        codespan_reporting::term::emit(&mut writer.lock(), &config, &self.files, diagnostic)?;
        Ok(())
    }
}

/// 1始まりの行・列をバイトオフセットに変換
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}

fn load(input: &Path) -> Result<LoadedSnapshot> {
    log::info!("Loading {:?}", input);
    let (state, source) = SnapshotSource::new(input)?;

    let snapshot = match parse_snapshot(&source) {
        Ok(snapshot) => snapshot,
        Err(MonoError::Metadata(MetadataError::Syntax { message, line, column })) => {
            let offset = byte_offset(&source, line, column);
            let diagnostic = Diagnostic::error()
                .with_message(format!("Snapshot syntax error: {}", message))
                .with_labels(vec![Label::primary(state.file_id, offset..offset)]);
            state.report_error(&diagnostic)?;
            anyhow::bail!("Parsing snapshot failed");
        }
        Err(e) => return Err(e.into()),
    };

    Ok(snapshot.build()?)
}

/// 要求された具体化をすべて解決
fn resolve_all(loaded: &LoadedSnapshot) -> Result<(InstantiationTable, Vec<String>)> {
    let metadata = &loaded.metadata;
    let mut table = InstantiationTable::new();
    let mut skipped = Vec::new();

    for request in &loaded.requests {
        let type_name = metadata.type_def(request.ty).full_name();
        let Some(ty) = table.resolve_type(metadata, request.ty, request.type_args.clone())? else {
            skipped.push(type_name);
            continue;
        };
        match &request.target {
            RequestTarget::Type => {}
            RequestTarget::Method { def, args } => {
                let resolved = table
                    .resolve_method(metadata, ty, *def, args.clone())
                    .with_context(|| format!("Failed to resolve a method of {}", type_name))?;
                if resolved.is_none() {
                    skipped.push(format!("{}::{}", type_name, metadata.method_def(*def).name));
                }
            }
            RequestTarget::Field { index } => {
                table
                    .resolve_field(metadata, ty, *index)
                    .with_context(|| format!("Failed to resolve a field of {}", type_name))?;
            }
        }
    }

    Ok((table, skipped))
}

#[derive(Serialize)]
struct KeyReport {
    types: Vec<String>,
    methods: Vec<MethodReport>,
    fields: Vec<FieldReport>,
    skipped: Vec<String>,
}

#[derive(Serialize)]
struct MethodReport {
    owner: String,
    signature_key: String,
    declared_key: String,
    concretized_key: String,
}

#[derive(Serialize)]
struct FieldReport {
    owner: String,
    key: String,
}

fn build_report(loaded: &LoadedSnapshot, table: &mut InstantiationTable, skipped: Vec<String>) -> Result<KeyReport> {
    let mut types = Vec::new();
    for (_, inst) in table.types() {
        types.push(inst.name_key()?.to_string());
    }

    let mut methods = Vec::new();
    for id in table.pending_methods() {
        let inst = table.method(id);
        methods.push(MethodReport {
            owner: inst.decl_type().name_key()?.to_string(),
            signature_key: loaded.metadata.method_def(inst.def()).signature_key()?,
            declared_key: inst.declared_key()?.to_string(),
            concretized_key: inst.concretized_key()?,
        });
        table.method_mut(id).is_processed = true;
    }

    let mut fields = Vec::new();
    for (_, inst) in table.fields() {
        fields.push(FieldReport {
            owner: inst.decl_type().name_key()?.to_string(),
            key: inst.name_key().to_string(),
        });
    }

    Ok(KeyReport {
        types,
        methods,
        fields,
        skipped,
    })
}

fn keys(input: PathBuf, json: bool) -> Result<()> {
    let loaded = load(&input)?;
    let (mut table, skipped) = resolve_all(&loaded)?;
    let report = build_report(&loaded, &mut table, skipped)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "=== Types ===".blue().bold());
    for key in &report.types {
        println!("  {}", key);
    }
    println!("{}", "=== Methods ===".blue().bold());
    for method in &report.methods {
        println!("  {} {}", method.owner.cyan(), "->".dimmed());
        println!("    signature:   {}", method.signature_key);
        println!("    declared:    {}", method.declared_key);
        println!("    concretized: {}", method.concretized_key);
    }
    if !report.fields.is_empty() {
        println!("{}", "=== Fields ===".blue().bold());
        for field in &report.fields {
            println!("  {} -> {}", field.owner.cyan(), field.key);
        }
    }
    for name in &report.skipped {
        println!("{}: {} has open generic arguments, skipped", "warning".yellow().bold(), name);
    }

    Ok(())
}

fn check(input: PathBuf) -> Result<()> {
    let loaded = load(&input)?;
    let (table, skipped) = resolve_all(&loaded)?;

    log::debug!(
        "Resolved {} types and {} methods ({} skipped)",
        table.type_count(),
        table.method_count(),
        skipped.len()
    );
    println!("{}: No errors found", "success".green().bold());
    Ok(())
}
