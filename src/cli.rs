//! Developer CLI: derive → (schema | validate | expand)
use std::path::PathBuf;
use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

use pytree_schema::{Annotation, Node, PathSegment, PyTree, Registry, emit_schema, transform};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// derive pytree schemas from JSON/NDJSON samples or annotations, validate samples, and expand transforms
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// derive the exact schema of every input, optionally narrowed by a declared annotation
    Schema(SchemaOut),
    /// check every input against a declared annotation
    Validate(ValidateOut),
    /// print the trees a named transform produces
    Expand(ExpandOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1..)]
    input: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum Format {
    /// annotation-style one-liners
    #[default]
    Text,
    /// JSON-Schema-style documents
    Json,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// declared annotation every input is reconciled against (e.g. 'Dict[str, List[int]]')
    #[arg(long)]
    annotation: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    format: Format,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ValidateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// declared annotation to validate against
    #[arg(long)]
    annotation: String,

    #[arg(long, value_enum, default_value_t)]
    format: Format,
}

#[derive(clap::Parser, Debug)]
struct ExpandOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// expand the schema of this annotation instead of (or as well as) the inputs
    #[arg(long)]
    annotation: Option<String>,

    /// transform name; unregistered names fall back to the default transform
    #[arg(long, default_value = transform::SPLIT_TREES_ON_OPTIONS)]
    transform: String,

    /// stop after this many trees per source
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, value_enum, default_value_t)]
    format: Format,
}

/// One decoded input document and where it came from.
struct Sample {
    source: String,
    value: PyTree,
}

#[derive(Serialize)]
struct SchemaReport {
    source: String,
    schema: Value,
}

#[derive(Serialize)]
struct ValidationReport {
    source: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<Vec<PathSegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_samples(&self) -> anyhow::Result<Vec<Sample>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let mut samples = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file ({source_path_str})"))?;
            if self.ndjson {
                for (line_no, line) in source.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let label = format!("{source_path_str}:{}", line_no + 1);
                    samples.push(self.decode(line, label)?);
                }
            } else {
                samples.push(self.decode(&source, source_path_str)?);
            }
        }
        tracing::debug!(count = samples.len(), "loaded input samples");
        Ok(samples)
    }

    fn decode(&self, source: &str, label: String) -> anyhow::Result<Sample> {
        let json_value = serde_json::from_str::<Value>(source)
            .with_context(|| format!("failed to parse JSON ({label})"))?;
        let json_value = match self.json_pointer.as_deref() {
            None => json_value,
            Some(pointer) => json_value
                .pointer(pointer)
                .cloned()
                .with_context(|| format!("JSON pointer `{pointer}` selects nothing ({label})"))?,
        };
        let value = PyTree::try_from(json_value).with_context(|| format!("not a pytree ({label})"))?;
        Ok(Sample { source: label, value })
    }

    fn require_samples(&self) -> anyhow::Result<Vec<Sample>> {
        if self.input.is_empty() {
            bail!("no inputs given (use --input)");
        }
        self.load_samples()
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Schema(target) => target.run(),
            Command::Validate(target) => target.run(),
            Command::Expand(target) => target.run(),
        }
    }
}

impl SchemaOut {
    fn run(&self) -> anyhow::Result<()> {
        let declared = self.annotation.as_deref().map(parse_annotation).transpose()?;
        let samples = self.input_settings.require_samples()?;

        let mut reports = Vec::with_capacity(samples.len());
        for sample in samples {
            let observed = pytree_schema::from_value(&sample.value)
                .with_context(|| format!("cannot derive a schema ({})", sample.source))?;
            let schema = match declared.as_ref() {
                None => observed,
                Some(declared) => declared
                    .intersect(&observed)
                    .with_context(|| format!("{} contradicts the declared schema", sample.source))?,
            };
            reports.push((sample.source, schema));
        }

        let rendered = match self.format {
            Format::Text => reports
                .iter()
                .map(|(source, schema)| format!("{source}: {schema}"))
                .collect::<Vec<_>>()
                .join("\n"),
            Format::Json => {
                let reports = reports
                    .iter()
                    .map(|(source, schema)| {
                        let schema = emit_schema(schema).with_context(|| format!("cannot render {source} as JSON"))?;
                        Ok(SchemaReport { source: source.clone(), schema })
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                serde_json::to_string_pretty(&reports)?
            }
        };
        match self.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                std::fs::write(out, &rendered).with_context(|| format!("failed to write {}", out.display()))?;
            }
            None => println!("{rendered}"),
        }
        Ok(())
    }
}

impl ValidateOut {
    fn run(&self) -> anyhow::Result<()> {
        let schema = parse_annotation(&self.annotation)?;
        let samples = self.input_settings.require_samples()?;

        let reports = samples
            .par_iter()
            .map(|sample| match schema.validate(&sample.value) {
                Ok(()) => ValidationReport { source: sample.source.clone(), ok: true, path: None, reason: None },
                Err(failure) => ValidationReport {
                    source: sample.source.clone(),
                    ok: false,
                    path: Some(failure.path),
                    reason: Some(failure.reason),
                },
            })
            .collect::<Vec<_>>();

        match self.format {
            Format::Text => {
                for report in &reports {
                    match report.reason.as_ref() {
                        None => println!("{} {}", "✅".green(), report.source),
                        Some(reason) => {
                            let path = report.path.as_deref().map(pytree_schema::error::display_path).unwrap_or_default();
                            println!("{} {}: {}", "❌".red(), report.source, format!("at {path}: {reason}").as_str().red());
                        }
                    }
                }
            }
            Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        }

        let failed = reports.iter().filter(|r| !r.ok).count();
        if failed > 0 {
            bail!("{failed} of {} inputs failed validation", reports.len());
        }
        Ok(())
    }
}

impl ExpandOut {
    fn run(&self) -> anyhow::Result<()> {
        let mut roots = Vec::<(String, Node)>::new();
        if let Some(annotation) = self.annotation.as_deref() {
            roots.push((annotation.to_string(), parse_annotation(annotation)?));
        }
        if !self.input_settings.input.is_empty() {
            for sample in self.input_settings.load_samples()? {
                let node = pytree_schema::from_value(&sample.value)
                    .with_context(|| format!("cannot derive a schema ({})", sample.source))?;
                roots.push((sample.source, node));
            }
        }
        if roots.is_empty() {
            bail!("nothing to expand (use --annotation or --input)");
        }

        let registry = Registry::builtin();
        let data = Value::Null;
        let limit = self.limit.unwrap_or(usize::MAX);
        for (source, root) in &roots {
            let trees = registry.transform(root, &self.transform, &data).take(limit);
            match self.format {
                Format::Text => {
                    println!("{}", source.as_str().bold());
                    for tree in trees {
                        println!("  {tree}");
                    }
                }
                Format::Json => {
                    let trees = trees
                        .map(|tree| emit_schema(&tree))
                        .collect::<Result<Vec<_>, _>>()
                        .with_context(|| format!("cannot render trees of {source} as JSON"))?;
                    let report = SchemaReport { source: source.clone(), schema: Value::Array(trees) };
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn parse_annotation(src: &str) -> anyhow::Result<Node> {
    let annotation = src.parse::<Annotation>()?;
    let node = pytree_schema::from_annotation(&annotation)
        .with_context(|| format!("cannot lower annotation `{annotation}`"))?;
    Ok(node)
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
