//! End-to-end generation for one API alias.
//!
//! One run: resolve the stored selection against the live document, collect
//! and emit every confirmed operation, splice pinned entries out of the
//! prior registry, write the new registry and scaffold, rewrite the state.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::collector;
use crate::collector::ParameterSet;
use crate::emitter::registry::RegistryImport;
use crate::emitter::{artifacts, ident, registry};
use crate::error::GenerateError;
use crate::loader::LoadedSpec;
use crate::selection::{self, SelectionDiff, SelectionState};
use crate::synthesizer::TypeSynthesizer;
use crate::writer::{Mode, Writer};

/// State threaded through a run, passed explicitly instead of living in
/// globals.
#[derive(Debug)]
pub struct RunContext {
    pub spec: LoadedSpec,
    pub state: SelectionState,
    pub writer: Writer,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// API alias; names the output subdirectory and the reducer path.
    pub api_name: String,
    /// Root output directory, the alias directory lands inside it.
    pub out_dir: PathBuf,
    /// Location of the selection state file.
    pub state_path: PathBuf,
}

impl GenerateOptions {
    pub fn api_dir(&self) -> PathBuf {
        self.out_dir.join(&self.api_name)
    }
}

/// Runs generation for one API alias and returns the resolved diff.
pub fn generate(
    ctx: &mut RunContext,
    options: &GenerateOptions,
    synthesizer: &dyn TypeSynthesizer,
) -> Result<SelectionDiff, GenerateError> {
    let selection = ctx
        .state
        .apis
        .get(&options.api_name)
        .cloned()
        .unwrap_or_default();
    let diff = selection::resolve(&ctx.spec.document, &selection);
    info!(
        api = %options.api_name,
        confirmed = diff.confirmed.len(),
        missing = diff.missing.len(),
        available = diff.available.len(),
        "selection resolved"
    );

    let api_dir = options.api_dir();
    let mut entries = Vec::new();
    let mut imports = Vec::new();

    for key in &diff.confirmed {
        let set = collector::collect(
            &ctx.spec.document,
            &mut ctx.spec.graph,
            key,
            &selection.base_url,
        )?;
        let op_dir = api_dir.join(ident::module_path(key));
        write_schema_files(ctx, &op_dir, &set)?;

        let module = artifacts::type_module(&ctx.spec.graph, &set, synthesizer)?;
        write(ctx, &op_dir.join("index.ts"), &module, Mode::Signed)?;

        let (entry, import) = artifacts::binding_entry(&ctx.spec.graph, key, &set);
        entries.push(entry);
        imports.push(import);
    }

    splice_pinned_entries(ctx, &api_dir, &diff, &mut entries, &mut imports)?;

    let registry_source = artifacts::registry_module(
        &options.api_name,
        &selection.base_url,
        &imports,
        &entries,
    );
    write(ctx, &api_dir.join("index.ts"), &registry_source, Mode::Signed)?;

    ctx.writer
        .create_once(&api_dir.join("extension.ts"), artifacts::EXTENSION_SOURCE)
        .map_err(|e| write_error(&api_dir.join("extension.ts"), e))?;

    let next = selection::rewritten(&selection, &diff);
    ctx.state.apis.insert(options.api_name.clone(), next);
    let state_text = ctx
        .state
        .to_pretty_json()
        .map_err(|e| write_error(&options.state_path, io::Error::other(e)))?;
    write(ctx, &options.state_path, &state_text, Mode::Unsigned)?;

    Ok(diff)
}

/// Operations gone from the document keep their prior registry declarations
/// verbatim, imports included.
fn splice_pinned_entries(
    ctx: &mut RunContext,
    api_dir: &Path,
    diff: &SelectionDiff,
    entries: &mut Vec<registry::RegistryEntry>,
    imports: &mut Vec<RegistryImport>,
) -> Result<(), GenerateError> {
    if diff.missing.is_empty() {
        return Ok(());
    }
    let index_path = api_dir.join("index.ts");
    if !ctx.writer.exists(&index_path) {
        warn!("no prior registry; pinned operations stay in state only");
        return Ok(());
    }
    let prior_source = ctx
        .writer
        .read(&index_path)
        .map_err(|e| write_error(&index_path, e))?;
    let prior = registry::parse(&prior_source);

    for key in &diff.missing {
        let name = ident::operation_ident(key);
        match prior.entry(&name) {
            Some(entry) => {
                entries.push(entry.clone());
                let import = prior.import(&name).cloned().unwrap_or_else(|| {
                    RegistryImport {
                        ident: name.clone(),
                        path: format!("./{}", ident::module_path(key)),
                    }
                });
                imports.push(import);
                info!(key = %key, "kept prior registry entry for missing operation");
            }
            None => {
                warn!(key = %key, "missing operation has no prior registry entry to keep");
            }
        }
    }
    Ok(())
}

/// The collected schemas are also persisted as pretty JSON, one file per
/// slot and per response code, next to the type module.
fn write_schema_files(
    ctx: &mut RunContext,
    op_dir: &Path,
    set: &ParameterSet,
) -> Result<(), GenerateError> {
    for (slot, id) in set.slots() {
        let Some(id) = id else {
            continue;
        };
        let mut json = serde_json::to_string_pretty(&ctx.spec.graph.to_json(id))
            .map_err(|e| write_error(op_dir, io::Error::other(e)))?;
        json.push('\n');
        let path = op_dir.join(format!("{}.json", slot.as_str()));
        write(ctx, &path, &json, Mode::Unsigned)?;
    }
    for (code, id) in &set.responses {
        let mut json = serde_json::to_string_pretty(&ctx.spec.graph.to_json(*id))
            .map_err(|e| write_error(op_dir, io::Error::other(e)))?;
        json.push('\n');
        let path = op_dir.join(format!("{code}.json"));
        write(ctx, &path, &json, Mode::Unsigned)?;
    }
    Ok(())
}

fn write(
    ctx: &mut RunContext,
    path: &Path,
    content: &str,
    mode: Mode,
) -> Result<(), GenerateError> {
    ctx.writer
        .write(path, content, mode)
        .map(|_| ())
        .map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, source: io::Error) -> GenerateError {
    GenerateError::Write {
        path: path.display().to_string(),
        source,
    }
}
