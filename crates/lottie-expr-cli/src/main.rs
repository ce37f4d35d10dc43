//! # lottie-expr
//!
//! Runs the expressions of a Lottie file outside of a player.
//!
//! ## Commands
//! - `eval`: sample one expression at a time or over a frame range
//! - `check`: compile expressions and report the statements that are dropped
//! - `scan`: list every expression in a document

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;

use lottie_data::model::LottieJson;
use lottie_expressions::{
    AnimatedProperty, Document, EvaluationContext, ExpressionConfig, ExpressionEvaluator,
    PropertyValue, Script,
};

#[derive(Parser)]
#[command(name = "lottie-expr")]
#[command(about = "Evaluate and lint After Effects expressions in Lottie files")]
#[command(version)]
struct Cli {
    /// Engine config (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fail on the first statement error instead of dropping the statement
    #[arg(long, global = true)]
    strict: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Eval {
        /// Lottie file; without it the expression runs in an empty context
        file: Option<PathBuf>,

        /// Layer name or index
        #[arg(short, long)]
        layer: Option<String>,

        /// Property path as printed by `scan`, e.g. transform.position
        #[arg(short, long, default_value = "transform.position")]
        property: String,

        /// Expression source; defaults to the one stored on the property
        #[arg(short, long)]
        expression: Option<String>,

        /// Time in seconds
        #[arg(short, long, default_value = "0")]
        time: f64,

        /// Frame range `start..end` (end exclusive); overrides --time
        #[arg(short, long)]
        frames: Option<String>,

        /// Frame rate used without a file
        #[arg(long, default_value = "30")]
        fps: f64,
    },

    /// Compile expressions and report dropped statements
    Check {
        /// Lottie file to check
        file: Option<PathBuf>,

        /// Single expression to check instead of a file
        #[arg(short, long)]
        expression: Option<String>,
    },

    /// List the expressions of a Lottie file
    Scan {
        /// Lottie file to scan
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => ExpressionConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExpressionConfig::default(),
    };
    config.strict |= cli.strict;
    let evaluator = ExpressionEvaluator::with_config(config);

    match cli.command {
        Commands::Eval {
            file,
            layer,
            property,
            expression,
            time,
            frames,
            fps,
        } => cmd_eval(
            &evaluator,
            EvalArgs {
                file: file.as_deref(),
                layer: layer.as_deref(),
                property: &property,
                expression: expression.as_deref(),
                time,
                frames: frames.as_deref(),
                fps,
            },
        ),
        Commands::Check { file, expression } => cmd_check(file.as_deref(), expression.as_deref()),
        Commands::Scan { file } => cmd_scan(&file),
    }
}

struct EvalArgs<'a> {
    file: Option<&'a Path>,
    layer: Option<&'a str>,
    property: &'a str,
    expression: Option<&'a str>,
    time: f64,
    frames: Option<&'a str>,
    fps: f64,
}

fn load_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let json: LottieJson = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse Lottie JSON {}", path.display()))?;
    Ok(Document::from_json(&json))
}

/// `"10..40"` into `(10, 40)`.
fn parse_frames(range: &str) -> Result<(i64, i64)> {
    let Some((start, end)) = range.split_once("..") else {
        bail!("frame range must look like START..END, got `{}`", range);
    };
    let start: i64 = start
        .trim()
        .parse()
        .with_context(|| format!("invalid start frame `{}`", start))?;
    let end: i64 = end
        .trim()
        .parse()
        .with_context(|| format!("invalid end frame `{}`", end))?;
    if end < start {
        bail!("frame range {}..{} is reversed", start, end);
    }
    Ok((start, end))
}

fn format_value(value: &PropertyValue) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}

fn sample_times(args: &EvalArgs<'_>, fps: f64) -> Result<Vec<(Option<i64>, f64)>> {
    match args.frames {
        Some(range) => {
            let (start, end) = parse_frames(range)?;
            Ok((start..end).map(|f| (Some(f), f as f64 / fps)).collect())
        }
        None => Ok(vec![(None, args.time)]),
    }
}

fn print_sample(frame: Option<i64>, time: f64, value: &str) {
    match frame {
        Some(frame) => println!("{}\t{:.4}\t{}", frame, time, value),
        None => println!("{}", value),
    }
}

fn cmd_eval(evaluator: &ExpressionEvaluator, args: EvalArgs<'_>) -> Result<()> {
    let Some(path) = args.file else {
        let Some(source) = args.expression else {
            bail!("pass a Lottie file or --expression");
        };
        for (frame, time) in sample_times(&args, args.fps)? {
            let ctx = EvaluationContext::new(time, args.fps);
            let value = evaluator.evaluate(source, &ctx)?;
            print_sample(frame, time, &value.to_string());
        }
        return Ok(());
    };

    let doc = load_document(path)?;
    let layer = match args.layer {
        Some(layer) => layer.to_string(),
        None => match doc.main().layers.first() {
            Some(first) => first.name.clone(),
            None => bail!("{} has no layers", path.display()),
        },
    };
    let Some(binding) = doc.find(&layer, args.property) else {
        bail!(
            "no expression on `{}` of layer `{}`; run `lottie-expr scan {}`",
            args.property,
            layer,
            path.display()
        );
    };
    let script = args.expression.unwrap_or(&binding.script);
    debug!(layer = %layer, property = args.property, "evaluating");

    for (frame, time) in sample_times(&args, binding.comp.frame_rate)? {
        let ctx = doc.context(binding, time);
        let base = binding.property.value_at_time(time);
        let value = if evaluator.config().strict {
            match evaluator.evaluate(script, &ctx)?.to_property_value() {
                Some(value) => value,
                None => base,
            }
        } else {
            evaluator.resolve(base, Some(script), &ctx)
        };
        print_sample(frame, time, &format_value(&value));
    }
    Ok(())
}

/// Prints the dropped statements of `source`; returns how many there were.
fn report(label: &str, source: &str) -> usize {
    let script = Script::compile(source);
    for diagnostic in script.diagnostics() {
        println!("{}: {}", label, diagnostic.error);
        println!("    {}", diagnostic.statement);
    }
    script.diagnostics().len()
}

fn cmd_check(file: Option<&Path>, expression: Option<&str>) -> Result<()> {
    let failures = match (file, expression) {
        (_, Some(source)) => report("<expression>", source),
        (Some(path), None) => {
            let doc = load_document(path)?;
            doc.expressions()
                .iter()
                .map(|b| report(&format!("{} {}", b.layer.name, b.path), &b.script))
                .sum()
        }
        (None, None) => bail!("pass a Lottie file or --expression"),
    };

    if failures > 0 {
        bail!("{} statement(s) failed to compile", failures);
    }
    println!("ok");
    Ok(())
}

fn cmd_scan(path: &Path) -> Result<()> {
    let doc = load_document(path)?;
    println!(
        "{} composition(s), {} expression(s)",
        doc.compositions().len(),
        doc.expressions().len()
    );
    for binding in doc.expressions() {
        let script = Script::compile(&binding.script);
        let status = if script.diagnostics().is_empty() {
            "ok".to_string()
        } else {
            format!("{} dropped", script.diagnostics().len())
        };
        println!(
            "{}\t#{} {}\t{}\t{} statement(s), {}",
            binding.comp.name,
            binding.layer.index,
            binding.layer.name,
            binding.path,
            script.statements().len(),
            status
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames() {
        assert_eq!(parse_frames("0..30").unwrap(), (0, 30));
        assert_eq!(parse_frames(" 5 .. 6 ").unwrap(), (5, 6));
        assert!(parse_frames("30..0").is_err());
        assert!(parse_frames("12").is_err());
        assert!(parse_frames("a..b").is_err());
    }

    #[test]
    fn test_report_counts_dropped_statements() {
        assert_eq!(report("test", "var a = 1\na * 2"), 0);
        assert_eq!(report("test", "var a = )\na * 2"), 1);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&PropertyValue::Scalar(1.5)), "1.5");
        assert_eq!(
            format_value(&PropertyValue::Vector(vec![1.0, 2.0])),
            "[1.0,2.0]"
        );
    }
}
