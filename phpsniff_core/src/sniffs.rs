//! Built-in sniffs.
//!
//! Each module exposes a `CODE` and a `DEFINITION` registered in
//! [`CATALOGUE`].

use crate::SniffDefinition;

pub mod class_declaration;
pub mod duplicate_class_name;
pub mod member_var_spacing;
pub mod namespace_separator_spacing;
pub mod require_strict_types;

/// Every built-in sniff in default run order.
pub const CATALOGUE: &[SniffDefinition] = &[
	require_strict_types::DEFINITION,
	namespace_separator_spacing::DEFINITION,
	duplicate_class_name::DEFINITION,
	member_var_spacing::DEFINITION,
	class_declaration::DEFINITION,
];
