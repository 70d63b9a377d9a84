use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Detect and fix violations of PHP coding standards.",
	long_about = "phpsniff tokenizes PHP files, runs a configurable set of sniffs over every \
	              token and reports the style violations they find. Most violations can be \
	              fixed automatically.\n\nQuick start:\n  phpsniff check    Report violations\n  \
	              phpsniff fix      Fix what can be fixed\n  phpsniff list     Show the enabled \
	              sniffs\n  phpsniff explain  Describe a sniff"
)]
pub struct PhpsniffCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Report coding standard violations without changing any file.
	///
	/// Checks every PHP file under the project root, or only the given
	/// files and directories. Exits with `0` when nothing was found, `1`
	/// when every error can be fixed with `phpsniff fix`, and `2` when
	/// unfixable errors or sniff faults are present.
	Check {
		/// Files or directories to check, relative to the project root.
		paths: Vec<PathBuf>,

		/// Output format. Use `text` for human-readable output, `json` for
		/// programmatic consumption, or `github` for GitHub Actions
		/// annotations that appear inline on PRs.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,

		/// Only run these sniffs. May be repeated.
		#[arg(long = "sniff", value_name = "CODE")]
		sniffs: Vec<String>,
	},
	/// Fix coding standard violations in place.
	///
	/// Runs the sniffs repeatedly, applying their fixes after each pass,
	/// until a pass produces no further fix or `--max-iterations` passes
	/// have run. Remaining violations are reported like `check` does.
	Fix {
		/// Files or directories to fix, relative to the project root.
		paths: Vec<PathBuf>,

		/// Preview the fixes without writing files.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// Show a unified diff for every file that changes.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Maximum number of fix passes per file. Overrides
		/// `max_iterations` from `phpsniff.toml`.
		#[arg(long, value_name = "N")]
		max_iterations: Option<usize>,

		/// Output format for the remaining violations.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,

		/// Only run these sniffs. May be repeated.
		#[arg(long = "sniff", value_name = "CODE")]
		sniffs: Vec<String>,
	},
	/// List the enabled sniffs with their effective options.
	List,
	/// Describe a sniff.
	///
	/// Accepts a sniff code such as `PSR2.Classes.ClassDeclaration` or a
	/// full diagnostic code such as
	/// `PSR2.Classes.ClassDeclaration.SpaceAfterName`.
	Explain {
		/// The sniff or diagnostic code.
		code: String,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption. Each file entry includes
	/// its status, diagnostics and sniff faults.
	Json,
	/// GitHub Actions annotation format. Emits `::warning` or `::error`
	/// annotations that appear inline on pull request diffs.
	Github,
}
