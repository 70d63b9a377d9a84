use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub const STRICT_TYPES: &str = "Generic.PHP.RequireStrictTypes";

pub const MISSING_STRICT_TYPES: &str = "<?php\necho 1;\n";

pub const WITH_STRICT_TYPES: &str = "<?php\ndeclare(strict_types=1);\necho 1;\n";

pub fn phpsniff_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("phpsniff"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
	let path = root.join(relative);

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}

	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}
