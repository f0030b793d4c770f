use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sheetmerge_compose::{
    compose_packages, ComposeConfig, ComposeInputs, ComposeReport, Composer, EntryState,
    PlanEntry, Sources, Template,
};
use sheetmerge_xlsx::load_from_bytes;

/// Base name of the composed file when `--output` is omitted.
pub const DEFAULT_OUTPUT_STEM: &str = "DCF_Model";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "sheetmerge",
    about = "Compose a template workbook with consensus and profile workbooks."
)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct InputArgs {
    /// Template workbook (.xlsx or .xlsm). The output keeps its flavour.
    #[arg(long)]
    template: PathBuf,

    /// Consensus workbook. Required.
    #[arg(long)]
    primary: PathBuf,

    /// Company profile workbook. Skipped with a report entry when unreadable.
    #[arg(long)]
    secondary: Option<PathBuf>,

    /// JSON composition config. Defaults to the built-in DCF layout.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Compose the inputs and write the output package.
    Compose {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output path. Defaults to `DCF_Model.xlsx` (or `.xlsm`) in the current directory.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also write the composition report as JSON to this path.
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Format of the summary printed to stdout.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Validate the composition plan against the inputs without writing anything.
    Check {
        #[command(flatten)]
        inputs: InputArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Dump a workbook's decoded model as JSON.
    Inspect {
        workbook: PathBuf,

        /// Indent the JSON output.
        #[arg(long)]
        pretty: bool,
    },
    /// Print the built-in composition config as JSON.
    DefaultConfig,
}

pub fn run() -> Result<()> {
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Compose {
            inputs,
            output,
            report,
            format,
        } => compose(&inputs, output, report.as_deref(), format, &mut out),
        Command::Check { inputs, format } => check(&inputs, format, &mut out),
        Command::Inspect { workbook, pretty } => {
            let bytes = read(&workbook)?;
            let workbook = load_from_bytes(&bytes)
                .with_context(|| format!("decode {}", workbook.display()))?
                .workbook;
            if pretty {
                serde_json::to_writer_pretty(&mut out, &workbook)?;
            } else {
                serde_json::to_writer(&mut out, &workbook)?;
            }
            out.write_all(b"\n")?;
            Ok(())
        }
        Command::DefaultConfig => {
            serde_json::to_writer_pretty(&mut out, &ComposeConfig::default())?;
            out.write_all(b"\n")?;
            Ok(())
        }
    }
}

struct LoadedInputs {
    template: Template,
    primary: Vec<u8>,
    secondary: Option<Vec<u8>>,
    config: ComposeConfig,
}

impl LoadedInputs {
    fn read(args: &InputArgs) -> Result<Self> {
        let config = match &args.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("read config {}", path.display()))?;
                ComposeConfig::from_json(&json)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => ComposeConfig::default(),
        };
        Ok(Self {
            template: Template::new(read(&args.template)?),
            primary: read(&args.primary)?,
            secondary: args.secondary.as_deref().map(read).transpose()?,
            config,
        })
    }

    fn inputs(&self) -> ComposeInputs<'_> {
        ComposeInputs {
            template: &self.template,
            primary: &self.primary,
            secondary: self.secondary.as_deref(),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read {}", path.display()))
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    output: &'a str,
    report: &'a ComposeReport,
}

fn compose(
    args: &InputArgs,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let loaded = LoadedInputs::read(args)?;
    let composed = compose_packages(&loaded.inputs(), &loaded.config)?;

    let output = output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "{DEFAULT_OUTPUT_STEM}.{}",
            composed.kind.file_extension()
        ))
    });
    std::fs::write(&output, &composed.bytes)
        .with_context(|| format!("write {}", output.display()))?;
    if let Some(path) = report_path {
        let json = serde_json::to_vec_pretty(&composed.report)?;
        std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    }

    match format {
        OutputFormat::Text => {
            writeln!(out, "Composed {}", output.display())?;
            for sheet in composed.report.output_sheets() {
                writeln!(out, "  sheet: {sheet}")?;
            }
            write_findings(&composed.report, out)?;
        }
        OutputFormat::Json => {
            let output = output.to_string_lossy();
            serde_json::to_writer(
                &mut *out,
                &JsonSummary {
                    output: &output,
                    report: &composed.report,
                },
            )?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn write_findings(report: &ComposeReport, out: &mut impl Write) -> Result<()> {
    if !report.events.is_empty() {
        writeln!(out)?;
        for event in &report.events {
            writeln!(out, "{event}")?;
        }
    }
    if !report.diagnostics.is_empty() {
        writeln!(out)?;
        for diagnostic in &report.diagnostics {
            writeln!(out, "warning: {diagnostic}")?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonPlanEntry<'a> {
    role: &'a str,
    source: &'a str,
    target: &'a str,
    required: bool,
    state: EntryState,
}

fn check(args: &InputArgs, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let loaded = LoadedInputs::read(args)?;
    loaded.config.validate()?;
    let sources = Sources::load(&loaded.inputs())?;
    let plan = Composer::new(&loaded.config).plan(&sources)?;

    match format {
        OutputFormat::Text => {
            writeln!(out, "Plan ({} sheets)", plan.entries().len())?;
            for entry in plan.entries() {
                writeln!(out, "  {}", describe(entry))?;
            }
            if !plan.skipped().is_empty() {
                writeln!(out)?;
                for event in plan.skipped() {
                    writeln!(out, "{event}")?;
                }
            }
        }
        OutputFormat::Json => {
            let entries: Vec<_> = plan
                .entries()
                .iter()
                .map(|entry| JsonPlanEntry {
                    role: entry.role.as_str(),
                    source: &entry.source_sheet,
                    target: &entry.target_sheet,
                    required: entry.required,
                    state: entry.state,
                })
                .collect();
            serde_json::to_writer(
                &mut *out,
                &serde_json::json!({ "entries": entries, "skipped": plan.skipped() }),
            )?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn describe(entry: &PlanEntry) -> String {
    let mut line = format!("{}!{:?}", entry.role, entry.source_sheet);
    if entry.target_sheet != entry.source_sheet {
        line.push_str(&format!(" -> {:?}", entry.target_sheet));
    }
    if let Some(region) = entry.region {
        line.push_str(&format!(" [{region}]"));
    }
    if !entry.required {
        line.push_str(" (optional)");
    }
    line
}
