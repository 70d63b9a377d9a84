use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::SniffError;
use crate::SniffResult;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default cap on fix passes per file.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["phpsniff.toml", ".phpsniff.toml", ".config/phpsniff.toml"];

/// Configuration loaded from a `phpsniff.toml` file.
///
/// ```toml
/// sniffs = ["Generic.PHP.RequireStrictTypes", "PSR2.Classes.ClassDeclaration"]
/// exclude_sniffs = []
/// extensions = ["php", "inc"]
/// max_iterations = 50
/// timeout_ms = 10000
///
/// [options."PSR2.Classes.ClassDeclaration"]
/// indent = 2
///
/// [exclude]
/// patterns = ["vendor/", "*.blade.php"]
///
/// [include]
/// patterns = ["src/**/*.php"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PhpsniffConfig {
	/// Enabled sniff codes in run order. Every built-in sniff when absent.
	#[serde(default)]
	pub sniffs: Option<Vec<String>>,
	/// Sniff codes removed from `sniffs`.
	#[serde(default)]
	pub exclude_sniffs: Vec<String>,
	/// Per-sniff option tables keyed by sniff code.
	#[serde(default)]
	pub options: BTreeMap<String, toml::Value>,
	/// Exclusion configuration using gitignore-style patterns.
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// Inclusion configuration. When patterns are present only matching
	/// files are checked.
	#[serde(default)]
	pub include: IncludeConfig,
	/// File extensions to check, without the dot.
	#[serde(default = "default_extensions")]
	pub extensions: Vec<String>,
	/// Fix passes per file before giving up with a non-convergence report.
	#[serde(default = "default_max_iterations")]
	pub max_iterations: usize,
	/// Per-file processing time limit in milliseconds.
	#[serde(default)]
	pub timeout_ms: Option<u64>,
	/// Maximum file size in bytes. Larger files are reported as input
	/// faults. Defaults to 10 MB.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// When true, `.gitignore` files are not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
}

impl Default for PhpsniffConfig {
	fn default() -> Self {
		Self {
			sniffs: None,
			exclude_sniffs: Vec::new(),
			options: BTreeMap::new(),
			exclude: ExcludeConfig::default(),
			include: IncludeConfig::default(),
			extensions: default_extensions(),
			max_iterations: DEFAULT_MAX_ITERATIONS,
			timeout_ms: None,
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			disable_gitignore: false,
		}
	}
}

fn default_extensions() -> Vec<String> {
	vec!["php".to_string(), "inc".to_string()]
}

fn default_max_iterations() -> usize {
	DEFAULT_MAX_ITERATIONS
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

/// Configuration for excluding files from checking.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeConfig {
	/// Gitignore-style patterns relative to the project root.
	///
	/// Examples: `"vendor/"`, `"*.tpl.php"`, `"!vendor/acme/"`.
	#[serde(default)]
	pub patterns: Vec<String>,
}

/// Configuration for restricting checks to matching files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncludeConfig {
	/// Glob patterns relative to the project root.
	#[serde(default)]
	pub patterns: Vec<String>,
}

impl PhpsniffConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> SniffResult<Option<PhpsniffConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;

		Self::parse(&content).map(Some)
	}

	/// Parse config file content.
	pub fn parse(content: &str) -> SniffResult<PhpsniffConfig> {
		toml::from_str(content).map_err(|e| SniffError::ConfigParse(e.to_string()))
	}
}
