use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use rayon::prelude::*;
use tracing::debug;
use tracing::info;

use crate::EngineOptions;
use crate::FileOutcome;
use crate::FileStatus;
use crate::PhpsniffConfig;
use crate::Ruleset;
use crate::Severity;
use crate::SniffError;
use crate::SniffResult;
use crate::check_source;
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::run;

/// Files handed to the thread pool at a time.
pub const FILE_BATCH_SIZE: usize = 64;

/// Options for discovering the files of a project.
///
/// Use [`ScanOptions::default()`] for sensible defaults or
/// [`ScanOptions::from_config`] to construct from a [`PhpsniffConfig`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
	/// Gitignore-style patterns to exclude.
	pub exclude_patterns: Vec<String>,
	/// Glob patterns restricting which files are checked. Empty matches
	/// everything.
	pub include_set: GlobSet,
	/// Extensions, without the dot, of the files picked up from directories.
	pub extensions: Vec<String>,
	/// Whether to disable `.gitignore` integration.
	pub disable_gitignore: bool,
}

impl Default for ScanOptions {
	fn default() -> Self {
		Self {
			exclude_patterns: Vec::new(),
			include_set: GlobSet::empty(),
			extensions: PhpsniffConfig::default().extensions,
			disable_gitignore: false,
		}
	}
}

impl ScanOptions {
	/// Construct [`ScanOptions`] from a [`PhpsniffConfig`].
	pub fn from_config(config: Option<&PhpsniffConfig>) -> SniffResult<Self> {
		let Some(config) = config else {
			return Ok(Self::default());
		};

		Ok(Self {
			exclude_patterns: config.exclude.patterns.clone(),
			include_set: build_glob_set(&config.include.patterns)?,
			extensions: config.extensions.clone(),
			disable_gitignore: config.disable_gitignore,
		})
	}

	fn has_extension(&self, path: &Path) -> bool {
		path.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
	}
}

/// Options for processing a batch of files.
#[derive(Debug, Clone)]
pub struct BatchOptions {
	pub engine: EngineOptions,
	/// Larger files are reported as input faults without being read.
	pub max_file_size: u64,
}

impl Default for BatchOptions {
	fn default() -> Self {
		Self {
			engine: EngineOptions::default(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
		}
	}
}

impl BatchOptions {
	pub fn from_config(config: Option<&PhpsniffConfig>) -> Self {
		let Some(config) = config else {
			return Self::default();
		};

		Self {
			engine: EngineOptions {
				max_iterations: config.max_iterations,
				timeout: config.timeout_ms.map(Duration::from_millis),
				..EngineOptions::default()
			},
			max_file_size: config.max_file_size,
		}
	}
}

/// What a batch does with each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
	/// Report only. Files are never modified.
	Check,
	/// Run the convergence loop. With `dry_run` the fixed text is kept in
	/// the report instead of being written.
	Fix { dry_run: bool },
}

/// The result of processing one file of a batch.
#[derive(Debug)]
pub struct FileReport {
	pub path: PathBuf,
	/// The text read from disk. `None` when the file could not be read.
	pub original: Option<String>,
	pub result: SniffResult<FileOutcome>,
	/// Whether the fixed text was written back.
	pub written: bool,
}

impl FileReport {
	/// The fixed text, when it differs from what was read.
	pub fn fixed_text(&self) -> Option<&str> {
		let outcome = self.result.as_ref().ok()?;
		let original = self.original.as_deref()?;

		(outcome.text != original).then_some(outcome.text.as_str())
	}
}

/// Per-file reports of one batch, sorted by path.
#[derive(Debug, Default)]
pub struct BatchReport {
	pub files: Vec<FileReport>,
}

impl BatchReport {
	pub fn summary(&self) -> Summary {
		let mut summary = Summary {
			files: self.files.len(),
			..Summary::default()
		};

		for report in &self.files {
			let outcome = match &report.result {
				Ok(outcome) => outcome,
				Err(error) => {
					summary.failed += 1;
					summary.faults += error.faults().len();

					for diagnostic in error.partial_diagnostics() {
						summary.count(diagnostic.severity, diagnostic.fixable);
					}

					continue;
				}
			};

			for diagnostic in &outcome.diagnostics {
				summary.count(diagnostic.severity, diagnostic.fixable);
			}

			summary.faults += outcome.faults.len();
			summary.fixes_applied += outcome.fixes_applied;

			match outcome.status {
				FileStatus::Unchanged => {}
				FileStatus::Fixed => summary.fixed_files += 1,
				FileStatus::NotConverged => summary.not_converged += 1,
			}
		}

		summary
	}
}

/// Totals across every file of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
	pub files: usize,
	pub errors: usize,
	pub warnings: usize,
	pub fixable: usize,
	/// Errors that no fix can resolve.
	pub unfixable_errors: usize,
	pub fixed_files: usize,
	pub fixes_applied: usize,
	pub faults: usize,
	pub not_converged: usize,
	/// Files that failed with an input fault, a timeout or a cancellation.
	pub failed: usize,
}

impl Summary {
	fn count(&mut self, severity: Severity, fixable: bool) {
		match severity {
			Severity::Error => self.errors += 1,
			Severity::Warning => self.warnings += 1,
		}

		if fixable {
			self.fixable += 1;
		} else if severity == Severity::Error {
			self.unfixable_errors += 1;
		}
	}

	/// The process exit status for these totals.
	///
	/// * `0` nothing to report.
	/// * `1` only fixable diagnostics and warnings remain, or files were
	///   fixed.
	/// * `2` unfixable errors, sniff faults, non-convergence or failed files.
	pub fn exit_code(&self) -> i32 {
		if self.unfixable_errors > 0 || self.faults > 0 || self.not_converged > 0 || self.failed > 0 {
			2
		} else if self.errors > 0 || self.warnings > 0 || self.fixed_files > 0 {
			1
		} else {
			0
		}
	}
}

/// Find the files to check.
///
/// With no `paths` the whole project under `root` is walked. Relative
/// paths are resolved against `root`. Files named explicitly are always
/// included; files found in directories must carry one of the configured
/// extensions, match the include patterns (when there are any) and escape
/// both `.gitignore` and the exclude patterns.
pub fn discover_files(root: &Path, paths: &[PathBuf], options: &ScanOptions) -> SniffResult<Vec<PathBuf>> {
	let gitignore = if options.disable_gitignore {
		Gitignore::empty()
	} else {
		build_gitignore(root)
	};
	let exclude = build_exclude_matcher(root, &options.exclude_patterns)?;
	let walker = Walker {
		root,
		options,
		gitignore: &gitignore,
		exclude: &exclude,
	};
	let mut files = Vec::new();
	let mut visited_dirs = HashSet::new();

	if paths.is_empty() {
		walker.walk_dir(root, &mut files, &mut visited_dirs)?;
	}

	for path in paths {
		let path = root.join(path);

		if path.is_dir() {
			walker.walk_dir(&path, &mut files, &mut visited_dirs)?;
		} else if path.is_file() {
			files.push(path);
		} else {
			return Err(SniffError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("no such file or directory: `{}`", path.display()),
			)));
		}
	}

	// Sort for deterministic ordering.
	files.sort();
	files.dedup();

	debug!(files = files.len(), "discovered files");

	Ok(files)
}

struct Walker<'a> {
	root: &'a Path,
	options: &'a ScanOptions,
	gitignore: &'a Gitignore,
	exclude: &'a Gitignore,
}

impl Walker<'_> {
	fn walk_dir(&self, dir: &Path, files: &mut Vec<PathBuf>, visited_dirs: &mut HashSet<PathBuf>) -> SniffResult<()> {
		// Symlinked directories may point back up the tree.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());

		if !visited_dirs.insert(canonical) {
			debug!(path = %dir.display(), "directory already visited");
			return Ok(());
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();

			if path
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(is_ignored_directory_name)
			{
				continue;
			}

			let is_dir = path.is_dir();

			if self.gitignore.matched(&path, is_dir).is_ignore() || self.exclude.matched(&path, is_dir).is_ignore() {
				continue;
			}

			if is_dir {
				self.walk_dir(&path, files, visited_dirs)?;
			} else if self.options.has_extension(&path) && self.is_included(&path) {
				files.push(path);
			}
		}

		Ok(())
	}

	fn is_included(&self, path: &Path) -> bool {
		if self.options.include_set.is_empty() {
			return true;
		}

		path.strip_prefix(self.root)
			.is_ok_and(|relative| self.options.include_set.is_match(relative))
	}
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules"
}

/// Build a `GlobSet` from `[include]` patterns.
fn build_glob_set(patterns: &[String]) -> SniffResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();

	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| SniffError::InvalidPattern {
			pattern: pattern.clone(),
			reason: e.to_string(),
		})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| SniffError::InvalidPattern {
		pattern: patterns.join(", "),
		reason: e.to_string(),
	})
}

/// Build a `Gitignore` matcher from `[exclude]` patterns. These follow
/// `.gitignore` syntax and are applied on top of any `.gitignore` rules.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> SniffResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);

	for pattern in patterns {
		builder
			.add_line(None, pattern)
			.map_err(|e| SniffError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			})?;
	}

	builder.build().map_err(|e| SniffError::InvalidPattern {
		pattern: patterns.join(", "),
		reason: e.to_string(),
	})
}

/// Build a `Gitignore` matcher from the project's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");

	if gitignore_path.exists() {
		let _ = builder.add(gitignore_path);
	}

	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Read a source file, enforcing the size limit and UTF-8 encoding.
pub fn read_source(path: &Path, max_file_size: u64) -> SniffResult<String> {
	let size = std::fs::metadata(path)?.len();

	if size > max_file_size {
		return Err(SniffError::FileTooLarge {
			path: path.display().to_string(),
			size,
			limit: max_file_size,
		});
	}

	String::from_utf8(std::fs::read(path)?).map_err(|_| SniffError::InvalidEncoding {
		path: path.display().to_string(),
	})
}

/// Process `files` in parallel batches, each file with its own engine.
///
/// In [`RunMode::Fix`] a file is written only when its outcome is
/// [`FileStatus::Fixed`] or [`FileStatus::NotConverged`] and the text
/// changed, and never in a dry run. Per-file failures are kept in the
/// report; only write errors abort the batch.
#[tracing::instrument(skip_all, level = "debug")]
pub fn run_batch(files: &[PathBuf], ruleset: &Ruleset, mode: RunMode, options: &BatchOptions) -> SniffResult<BatchReport> {
	let mut reports = Vec::with_capacity(files.len());

	for batch in files.chunks(FILE_BATCH_SIZE) {
		let processed = batch
			.par_iter()
			.map(|path| process_file(path, ruleset, mode, options))
			.collect::<Vec<_>>();

		for mut report in processed {
			if mode == (RunMode::Fix { dry_run: false })
				&& let Ok(outcome) = &report.result
				&& matches!(outcome.status, FileStatus::Fixed | FileStatus::NotConverged)
				&& let Some(text) = report.fixed_text()
			{
				std::fs::write(&report.path, text)?;
				info!(path = %report.path.display(), fixes = outcome.fixes_applied, "wrote fixed file");
				report.written = true;
			}

			reports.push(report);
		}
	}

	reports.sort_by(|a, b| a.path.cmp(&b.path));

	Ok(BatchReport { files: reports })
}

fn process_file(path: &Path, ruleset: &Ruleset, mode: RunMode, options: &BatchOptions) -> FileReport {
	let original = match read_source(path, options.max_file_size) {
		Ok(source) => source,
		Err(error) => {
			return FileReport {
				path: path.to_path_buf(),
				original: None,
				result: Err(error),
				written: false,
			};
		}
	};
	let result = match mode {
		RunMode::Check => check_source(&original, ruleset, &options.engine),
		RunMode::Fix { .. } => run(&original, ruleset, &options.engine),
	};

	FileReport {
		path: path.to_path_buf(),
		original: Some(original),
		result,
		written: false,
	}
}
