use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::MultiSelect;
use dialoguer::theme::ColorfulTheme;

use openapi_bindgen::document::{Method, OperationKey};
use openapi_bindgen::loader::{self, SpecSource};
use openapi_bindgen::pipeline::{self, GenerateOptions, RunContext};
use openapi_bindgen::selection::{self, SelectionDiff, SelectionState};
use openapi_bindgen::synthesizer::TsSynthesizer;
use openapi_bindgen::writer::Writer;

#[derive(Parser)]
#[command(
    name = "openapi-bindgen",
    version,
    about = "Generate typed TypeScript API bindings from an OpenAPI document"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bindings for one API alias
    Generate(GenerateArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// URL or file path of the OpenAPI document
    #[arg(long)]
    source: String,

    /// API alias; names the output subdirectory and the reducer path
    #[arg(long)]
    name: String,

    /// Output directory for generated modules
    #[arg(long)]
    dir: PathBuf,

    /// Base url prefix stripped from endpoint paths
    #[arg(long, default_value = "/")]
    base_url: String,

    /// Pick one operation non-interactively as `<path>::<method>`; repeatable
    #[arg(long = "select", value_name = "PATH::METHOD")]
    select: Vec<String>,

    /// Pick every operation in the document
    #[arg(long)]
    all: bool,

    /// Selection state file
    #[arg(long, default_value = ".openapi-bindgen.json")]
    state: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    openapi_bindgen::init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => run_generate(args).await,
    }
}

async fn run_generate(args: GenerateArgs) -> ExitCode {
    let source = SpecSource::parse(&args.source);
    let spec = match loader::load(&source).await {
        Ok(spec) => spec,
        Err(e) => return fail(&e.to_string()),
    };

    let mut state = SelectionState::load(&args.state);
    let entry = state.apis.entry(args.name.clone()).or_default();
    if entry.base_url.is_empty() {
        entry.base_url = args.base_url.clone();
    }
    let base_url = entry.base_url.clone();
    let diff = selection::resolve(&spec.document, entry);

    let chosen = if args.all {
        let mut keys = diff.confirmed.clone();
        keys.extend(diff.available.iter().cloned());
        keys
    } else if !args.select.is_empty() {
        match parse_selections(&args.select, &base_url) {
            Ok(keys) => keys,
            Err(message) => return fail(&message),
        }
    } else {
        match prompt_selection(&diff) {
            Some(keys) => keys,
            // Esc/interrupt: abort before anything is written.
            None => {
                eprintln!("{}", style("selection cancelled, nothing written").yellow());
                return ExitCode::FAILURE;
            }
        }
    };

    // Pinned (missing) operations stay selected no matter what was picked.
    let mut keep = chosen;
    keep.extend(diff.missing.iter().cloned());
    selection::apply_choices(entry, &keep);

    let options = GenerateOptions {
        api_name: args.name,
        out_dir: args.dir,
        state_path: args.state,
    };
    let mut ctx = RunContext {
        spec,
        state,
        writer: Writer::new(),
    };
    match pipeline::generate(&mut ctx, &options, &TsSynthesizer) {
        Ok(diff) => {
            print_summary(&ctx, &diff);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn fail(message: &str) -> ExitCode {
    eprintln!("{} {message}", style("error:").red().bold());
    ExitCode::FAILURE
}

fn parse_selections(specs: &[String], base_url: &str) -> Result<Vec<OperationKey>, String> {
    let mut keys = Vec::new();
    for spec in specs {
        let Some((path, method)) = spec.rsplit_once("::") else {
            return Err(format!("`{spec}` is not of the form <path>::<method>"));
        };
        let Some(method) = Method::parse(method) else {
            return Err(format!("`{method}` is not an HTTP method"));
        };
        keys.push(OperationKey::new(path, method, base_url));
    }
    Ok(keys)
}

fn prompt_selection(diff: &SelectionDiff) -> Option<Vec<OperationKey>> {
    let mut items: Vec<(OperationKey, bool)> = Vec::new();
    for key in &diff.confirmed {
        items.push((key.clone(), true));
    }
    for key in &diff.available {
        items.push((key.clone(), false));
    }
    if items.is_empty() {
        return Some(Vec::new());
    }

    let labels: Vec<String> = items.iter().map(|(key, _)| format_key(key)).collect();
    let defaults: Vec<bool> = items.iter().map(|(_, checked)| *checked).collect();
    let picked = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select endpoints")
        .items(&labels)
        .defaults(&defaults)
        .interact_opt()
        .ok()??;
    Some(picked.into_iter().map(|i| items[i].0.clone()).collect())
}

fn format_key(key: &OperationKey) -> String {
    let label = format!("{:7}", key.method.as_str().to_uppercase());
    let method = match key.method {
        Method::Get => style(label).green(),
        Method::Post => style(label).yellow(),
        Method::Put => style(label).cyan(),
        Method::Delete => style(label).red(),
        Method::Patch => style(label).magenta(),
        _ => style(label).dim(),
    };
    format!("{method} {}", key.path)
}

fn print_summary(ctx: &RunContext, diff: &SelectionDiff) {
    let ledger = ctx.writer.ledger();
    println!(
        "{} {} generated, {} pinned: {} created, {} updated",
        style("done").green().bold(),
        diff.confirmed.len(),
        diff.missing.len(),
        ledger.created().len(),
        ledger.changed().len(),
    );
    if !diff.missing.is_empty() {
        for key in &diff.missing {
            println!(
                "  {} {key} is gone from the document but kept (remove it from the state file to drop it)",
                style("pinned").yellow()
            );
        }
    }
}
