use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use clap::Parser;
use owo_colors::OwoColorize;
use phpsniff_cli::Commands;
use phpsniff_cli::OutputFormat;
use phpsniff_cli::PhpsniffCli;
use phpsniff_core::AnyResult;
use phpsniff_core::BatchOptions;
use phpsniff_core::BatchReport;
use phpsniff_core::Diagnostic;
use phpsniff_core::FileReport;
use phpsniff_core::FileStatus;
use phpsniff_core::PhpsniffConfig;
use phpsniff_core::Ruleset;
use phpsniff_core::RuleFaultRecord;
use phpsniff_core::RunMode;
use phpsniff_core::ScanOptions;
use phpsniff_core::Severity;
use phpsniff_core::SniffError;
use phpsniff_core::Summary;
use phpsniff_core::discover_files;
use phpsniff_core::find_definition;
use phpsniff_core::run_batch;
use phpsniff_core::utils::common::SniffCode;
use phpsniff_core::utils::common::strip_basepath;
use serde_json::json;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

/// Exit status for configuration and usage failures.
const EXIT_USAGE: i32 = 3;

static USE_COLOR: AtomicBool = AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = match PhpsniffCli::try_parse() {
		Ok(args) => args,
		Err(error) => {
			// `--help` and `--version` are reported through the same path.
			let code = if error.use_stderr() { EXIT_USAGE } else { 0 };
			error.print().ok();
			process::exit(code);
		}
	};

	// Respect NO_COLOR env var, --no-color flag and terminals without color.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	USE_COLOR.store(use_color, Ordering::Relaxed);

	init_tracing(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Check {
			paths,
			format,
			sniffs,
		}) => run_sniffs(&args, paths, sniffs, RunMode::Check, None, *format, false),
		Some(Commands::Fix {
			paths,
			dry_run,
			diff,
			max_iterations,
			format,
			sniffs,
		}) => {
			run_sniffs(
				&args,
				paths,
				sniffs,
				RunMode::Fix { dry_run: *dry_run },
				*max_iterations,
				*format,
				*diff,
			)
		}
		Some(Commands::List) => run_list(&args),
		Some(Commands::Explain { code }) => run_explain(code),
		None => {
			eprintln!("No subcommand specified. Run `phpsniff --help` for usage.");
			process::exit(EXIT_USAGE);
		}
	};

	match result {
		Ok(code) => process::exit(code),
		Err(e) => {
			// Try to render through miette for rich diagnostics with help text
			// and error codes.
			match e.downcast::<SniffError>() {
				Ok(sniff_err) => {
					let report: miette::Report = (*sniff_err).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(EXIT_USAGE);
		}
	}
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.try_init()
		.ok();
}

fn resolve_root(args: &PhpsniffCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

struct Project {
	root: PathBuf,
	config: Option<PhpsniffConfig>,
	ruleset: Ruleset,
}

/// Load `phpsniff.toml` and resolve the ruleset, optionally narrowed to
/// `sniffs`.
fn load_project(args: &PhpsniffCli, sniffs: &[String]) -> AnyResult<Project> {
	let root = resolve_root(args);
	let config = PhpsniffConfig::load(&root)?;

	if args.verbose {
		match PhpsniffConfig::resolve_path(&root) {
			Some(path) => eprintln!("Using config {}", path.display()),
			None => eprintln!("No config file found, running every built-in sniff"),
		}
	}

	let ruleset = Ruleset::from_config(config.as_ref())?;
	let ruleset = if sniffs.is_empty() {
		ruleset
	} else {
		ruleset.restrict(sniffs)?
	};

	Ok(Project {
		root,
		config,
		ruleset,
	})
}

fn run_sniffs(
	args: &PhpsniffCli,
	paths: &[PathBuf],
	sniffs: &[String],
	mode: RunMode,
	max_iterations: Option<usize>,
	format: OutputFormat,
	show_diff: bool,
) -> AnyResult<i32> {
	let project = load_project(args, sniffs)?;
	let config = project.config.as_ref();
	let scan_options = ScanOptions::from_config(config)?;
	let mut options = BatchOptions::from_config(config);

	if let Some(max_iterations) = max_iterations {
		options.engine.max_iterations = max_iterations;
	}

	let files = discover_files(&project.root, paths, &scan_options)?;
	tracing::debug!(files = files.len(), sniffs = project.ruleset.len(), "starting batch");
	let report = run_batch(&files, &project.ruleset, mode, &options)?;
	let summary = report.summary();

	match format {
		OutputFormat::Text => print_text(&report, &summary, &project.root, mode, show_diff),
		OutputFormat::Json => print_json(&report, &summary, &project.root),
		OutputFormat::Github => print_github(&report, &summary, &project.root),
	}

	Ok(summary.exit_code())
}

fn print_text(report: &BatchReport, summary: &Summary, root: &Path, mode: RunMode, show_diff: bool) {
	for file in &report.files {
		let rel = strip_basepath(&file.path, Some(root));
		let outcome = match &file.result {
			Ok(outcome) => outcome,
			Err(error) => {
				eprintln!("{} {rel}: {error}", colored!("error:", red));

				for diagnostic in error.partial_diagnostics() {
					print_diagnostic(&rel, diagnostic);
				}

				print_faults(&rel, error.faults());
				continue;
			}
		};

		for diagnostic in &outcome.diagnostics {
			print_diagnostic(&rel, diagnostic);
		}

		print_faults(&rel, &outcome.faults);

		if outcome.status == FileStatus::NotConverged {
			eprintln!(
				"{} {rel}: fixes did not converge after {} passes",
				colored!("warning:", yellow),
				outcome.iterations
			);
		}

		if let RunMode::Fix { dry_run } = mode
			&& outcome.changed()
		{
			if file.written {
				println!("Fixed {rel} ({} fix(es))", outcome.fixes_applied);
			} else if dry_run && file.fixed_text().is_some() {
				println!("Would fix {rel} ({} fix(es))", outcome.fixes_applied);
			}

			if show_diff
				&& let (Some(original), Some(fixed)) = (file.original.as_deref(), file.fixed_text())
			{
				print_diff(&rel, original, fixed);
			}
		}
	}

	if summary.exit_code() == 0 {
		println!(
			"{} no violations found in {} file(s).",
			colored!("Check passed:", green),
			summary.files
		);
		return;
	}

	eprintln!("{}", summary_line(summary, mode));
}

fn print_diagnostic(rel: &str, diagnostic: &Diagnostic) {
	let severity = match diagnostic.severity {
		Severity::Error => colored!("error", red),
		Severity::Warning => colored!("warning", yellow),
	};
	let fixable = if diagnostic.fixable { " (fixable)" } else { "" };

	println!(
		"{rel}:{}:{} {severity} [{}] {}{fixable}",
		diagnostic.line, diagnostic.column, diagnostic.code, diagnostic.message
	);
}

fn print_faults(rel: &str, faults: &[RuleFaultRecord]) {
	for fault in faults {
		eprintln!(
			"{} {rel}: sniff `{}` faulted on token {} and was disabled: {}",
			colored!("fault:", red),
			fault.sniff,
			fault.position,
			fault.fault
		);
	}
}

fn summary_line(summary: &Summary, mode: RunMode) -> String {
	let mut line = format!(
		"{} file(s) checked: {} error(s), {} warning(s), {} fixable",
		summary.files, summary.errors, summary.warnings, summary.fixable
	);

	if matches!(mode, RunMode::Fix { .. }) {
		line.push_str(&format!(
			"; {} file(s) fixed with {} fix(es)",
			summary.fixed_files, summary.fixes_applied
		));
	}

	for (count, label) in [
		(summary.faults, "sniff fault(s)"),
		(summary.not_converged, "file(s) not converged"),
		(summary.failed, "file(s) failed"),
	] {
		if count > 0 {
			line.push_str(&format!("; {count} {label}"));
		}
	}

	line
}

fn print_json(report: &BatchReport, summary: &Summary, root: &Path) {
	let files: Vec<serde_json::Value> = report
		.files
		.iter()
		.map(|file| file_json(file, root))
		.collect();
	let output = json!({
		"ok": summary.exit_code() == 0,
		"files": files,
		"summary": {
			"files": summary.files,
			"errors": summary.errors,
			"warnings": summary.warnings,
			"fixable": summary.fixable,
			"fixed_files": summary.fixed_files,
			"fixes_applied": summary.fixes_applied,
			"faults": summary.faults,
			"not_converged": summary.not_converged,
			"failed": summary.failed,
			"exit_code": summary.exit_code(),
		},
	});

	println!("{output}");
}

fn file_json(file: &FileReport, root: &Path) -> serde_json::Value {
	let path = strip_basepath(&file.path, Some(root));

	match &file.result {
		Ok(outcome) => {
			json!({
				"path": path,
				"status": outcome.status,
				"ignored": outcome.ignored,
				"iterations": outcome.iterations,
				"fixes_applied": outcome.fixes_applied,
				"written": file.written,
				"diagnostics": outcome.diagnostics,
				"faults": outcome.faults,
			})
		}
		Err(error) => {
			json!({
				"path": path,
				"status": "failed",
				"error": error.to_string(),
				"diagnostics": error.partial_diagnostics(),
				"faults": error.faults(),
			})
		}
	}
}

fn print_github(report: &BatchReport, summary: &Summary, root: &Path) {
	for file in &report.files {
		let rel = strip_basepath(&file.path, Some(root));
		let outcome = match &file.result {
			Ok(outcome) => outcome,
			Err(error) => {
				println!("::error file={rel}::{error}");
				continue;
			}
		};

		for diagnostic in &outcome.diagnostics {
			println!(
				"::{} file={rel},line={},col={}::{} [{}]",
				diagnostic.severity, diagnostic.line, diagnostic.column, diagnostic.message, diagnostic.code
			);
		}

		for fault in &outcome.faults {
			println!(
				"::error file={rel}::Sniff `{}` faulted on token {}: {}",
				fault.sniff, fault.position, fault.fault
			);
		}

		if outcome.status == FileStatus::NotConverged {
			println!(
				"::warning file={rel}::Fixes did not converge after {} passes",
				outcome.iterations
			);
		}
	}

	eprintln!("{}", summary_line(summary, RunMode::Check));
}

/// Print a unified diff between two strings, colorized.
fn print_diff(rel: &str, current: &str, fixed: &str) {
	println!("--- {rel}");
	println!("+++ {rel}");

	let diff = TextDiff::from_lines(current, fixed);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				print!("{}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				print!("{}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				print!(" {change}");
			}
		}
	}
}

fn run_list(args: &PhpsniffCli) -> AnyResult<i32> {
	let project = load_project(args, &[])?;

	if project.ruleset.is_empty() {
		println!("No sniffs are enabled.");
		return Ok(0);
	}

	println!("{}", colored!("Enabled sniffs:", bold));

	for sniff in project.ruleset.iter() {
		println!("  {}", sniff.code());

		for (key, value) in sniff.options() {
			println!("    {key} = {value}");
		}
	}

	println!("\n{} sniff(s)", project.ruleset.len());

	Ok(0)
}

fn run_explain(code: &str) -> AnyResult<i32> {
	let parsed: SniffCode = code.parse()?;
	let definition = find_definition(&parsed.sniff_code())?;
	let defaults = (definition.configure)(None)?;

	println!("{}", colored!(definition.code, bold));
	println!("{}", definition.description);

	if let Some(violation) = &parsed.code {
		println!();
		println!("Violation code: {violation}");
	}

	if !defaults.options().is_empty() {
		println!();
		println!("Options (defaults):");

		for (key, value) in defaults.options() {
			println!("  {key} = {value}");
		}
	}

	Ok(0)
}
