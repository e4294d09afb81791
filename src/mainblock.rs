//! Relocates the conventional `if __name__ == "__main__":` guard.
//!
//! The embedded interpreter wraps the whole script as the body of an
//! implicit top-level entry procedure, so the guard never fires there.
//! Its body is un-indented into the enclosing scope; the guard line and
//! any `elif`/`else` arms are kept as comments for auditability.

use log::debug;

use crate::scan;

#[derive(PartialEq)]
enum State {
	Outside,
	InMainBody,
	InMainElse,
}

pub fn relocate_main_block(code: &str) -> String {
	let mut out: Vec<String> = Vec::new();
	let mut state = State::Outside;
	let mut guard_indent = String::new();

	for (idx, line) in scan::split_lines(code).into_iter().enumerate() {
		if let Some(indent) = match_main_guard(&line) {
			debug!("entry-point guard at line {}", idx + 1);
			guard_indent = indent.to_string();
			state = State::InMainBody;
			out.push(format!("{guard_indent}# This block ran behind the script's __main__ entry guard."));
			out.push(format!(
				"{guard_indent}# The embedded interpreter has no such entry point, so the body now runs at top level."
			));
			out.push(comment_out(&guard_indent, &line));
			continue;
		}

		if state == State::Outside {
			out.push(line);
			continue;
		}

		if scan::is_blank(&line) {
			out.push(line);
			continue;
		}

		let trimmed = line.trim_start();
		if state == State::InMainBody && (trimmed.starts_with("elif ") || trimmed.starts_with("else:")) {
			state = State::InMainElse;
			out.push(comment_out(&guard_indent, &line));
			continue;
		}

		let indent = scan::leading_whitespace(&line);
		if indent.len() < guard_indent.len() {
			// Shallower indent ends the guarded block.
			state = State::Outside;
			out.push(line);
			continue;
		}

		if state == State::InMainElse {
			out.push(comment_out(&guard_indent, &line));
		} else {
			// Drop exactly one 4-column nesting level relative to the guard.
			let relative = &indent[guard_indent.len()..];
			let kept = if relative.len() >= 4 { &relative[4..] } else { "" };
			out.push(format!("{guard_indent}{kept}{trimmed}"));
		}
	}

	scan::join_lines(&out)
}

fn comment_out(guard_indent: &str, line: &str) -> String {
	let rest = line.get(guard_indent.len()..).unwrap_or_else(|| line.trim_start());
	format!("{guard_indent}#{rest}")
}

/// Match `if __name__ == "__main__":` (either quote style) and return the
/// guard's indent. Trailing content after the colon is tolerated.
fn match_main_guard(line: &str) -> Option<&str> {
	let indent = scan::leading_whitespace(line);
	let rest = line[indent.len()..].strip_prefix("if")?;
	if !rest.starts_with([' ', '\t']) {
		return None;
	}
	let rest = rest.trim_start_matches([' ', '\t']);
	let rest = rest.strip_prefix("__name__")?;
	let rest = rest.trim_start_matches([' ', '\t']);
	let rest = rest.strip_prefix("==")?;
	let rest = rest.trim_start_matches([' ', '\t']);

	let quote = rest.chars().next()?;
	if quote != '"' && quote != '\'' {
		return None;
	}
	let rest = rest[1..].strip_prefix("__main__")?;
	let rest = rest.strip_prefix(quote)?;
	let rest = rest.trim_start_matches([' ', '\t']);
	if rest.starts_with(':') { Some(indent) } else { None }
}
