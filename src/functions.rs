//! Function discovery over the line sequence: definition boundaries, the
//! two suspension detectors, and the whole-text call-site locator.
//!
//! Bodies are bounded lexically by indentation. Any line that is blank or
//! indented deeper than the `def` line belongs to the body; the first line
//! at the same or a shallower indent ends it, so a sibling `def` never
//! bleeds into its neighbour's body.

use indexmap::IndexMap;
use log::debug;

use crate::scan;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRecord {
	pub name: String,
	/// Index of the `def` line.
	pub line: usize,
	/// Exact leading whitespace of the `def` line.
	pub indent: String,
}

/// A located invocation of a suspending function.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
	pub line: usize,
	pub text: String,
}

fn strip_keyword<'a>(rest: &'a str, kw: &str) -> Option<&'a str> {
	let rest = rest.strip_prefix(kw)?;
	if !rest.starts_with([' ', '\t']) {
		return None;
	}
	Some(rest.trim_start_matches([' ', '\t']))
}

fn ident_len(s: &str) -> usize {
	let bytes = s.as_bytes();
	if bytes.is_empty() || !(bytes[0].is_ascii_alphabetic() || bytes[0] == b'_') {
		return 0;
	}
	bytes.iter().take_while(|b| b.is_ascii_alphanumeric() || **b == b'_').count()
}

/// Match `def name(params):` at the start of a line, tolerating an existing
/// `async` marker. Returns the indent, the name and whether the definition
/// is already marked.
pub(crate) fn match_def(line: &str) -> Option<(&str, &str, bool)> {
	let indent = scan::leading_whitespace(line);
	let mut rest = &line[indent.len()..];

	let mut is_async = false;
	if let Some(r) = strip_keyword(rest, "async") {
		rest = r;
		is_async = true;
	}
	let rest = strip_keyword(rest, "def")?;

	let name_len = ident_len(rest);
	if name_len == 0 {
		return None;
	}
	let (name, after) = rest.split_at(name_len);

	let after = after.trim_start_matches([' ', '\t']);
	let after = after.strip_prefix('(')?;
	let close = after.find(')')?;
	if !after[close + 1..].starts_with(':') {
		return None;
	}
	Some((indent, name, is_async))
}

pub fn scan_functions(lines: &[String]) -> Vec<FunctionRecord> {
	lines
		.iter()
		.enumerate()
		.filter_map(|(i, line)| {
			match_def(line).map(|(indent, name, _)| FunctionRecord {
				name: name.to_string(),
				line: i,
				indent: indent.to_string(),
			})
		})
		.collect()
}

fn body_range(lines: &[String], rec: &FunctionRecord) -> std::ops::Range<usize> {
	let mut end = rec.line + 1;
	while end < lines.len() {
		let line = &lines[end];
		if scan::is_blank(line) || scan::leading_whitespace(line).len() > rec.indent.len() {
			end += 1;
		} else {
			break;
		}
	}
	rec.line + 1..end
}

/// Functions whose body calls any suspending primitive, anywhere. This is
/// lexical presence only: a call in a dead branch still counts.
pub fn find_suspending_functions(lines: &[String], primitives: &[String]) -> Vec<FunctionRecord> {
	scan_functions(lines)
		.into_iter()
		.filter(|rec| {
			let body = &lines[body_range(lines, rec)];
			let hit = primitives.iter().find(|prim| body.iter().any(|l| !scan::find_calls(l, prim).is_empty()));
			if let Some(prim) = &hit {
				debug!("function `{}` suspends: body calls `{}()`", rec.name, prim);
			}
			hit.is_some()
		})
		.collect()
}

/// Functions whose body already carries a suspension marker. These became
/// suspending in an earlier iteration, when a call site inside them was
/// marked, and need their own definition and callers marked in turn.
pub fn find_awaiting_functions(lines: &[String]) -> Vec<FunctionRecord> {
	scan_functions(lines)
		.into_iter()
		.filter(|rec| {
			let body = &lines[body_range(lines, rec)];
			body.iter().any(|l| scan::has_await(l))
		})
		.collect()
}

/// Every call to every listed name, excluding definition lines. Multiple
/// calls on one line are each recorded. Purely textual: shadowed locals or
/// same-named attributes are indistinguishable from real calls.
pub fn locate_call_sites(lines: &[String], names: &[String]) -> IndexMap<String, Vec<CallSite>> {
	let mut sites: IndexMap<String, Vec<CallSite>> = names.iter().map(|n| (n.clone(), Vec::new())).collect();

	for (idx, line) in lines.iter().enumerate() {
		for name in names {
			for _pos in scan::find_calls(line, name) {
				if let Some(list) = sites.get_mut(name.as_str()) {
					list.push(CallSite {
						line: idx,
						text: line.trim().to_string(),
					});
				}
			}
		}
	}
	sites
}
