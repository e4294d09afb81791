//! Line-level lexical helpers shared by every rewrite pass.
//!
//! The rewriter never builds a full AST: each pass walks the physical lines
//! and decides, byte by byte, which parts of a line are live code. A small
//! quote/escape state machine masks out string literals and `#` comments so
//! that `input(` inside a prompt string or `await` inside a message does not
//! confuse the scanners. Triple-quoted and multi-line strings are not
//! tracked; that is a known limit of the line-at-a-time model.

/// Split into physical lines, tolerating CRLF input.
pub fn split_lines(code: &str) -> Vec<String> {
	code.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l).to_string()).collect()
}

pub fn join_lines(lines: &[String]) -> String {
	lines.join("\n")
}

/// The exact leading-whitespace prefix of a line.
pub fn leading_whitespace(line: &str) -> &str {
	let trimmed = line.trim_start_matches([' ', '\t']);
	&line[..line.len() - trimmed.len()]
}

pub fn is_blank(line: &str) -> bool {
	line.trim().is_empty()
}

fn is_ident(b: u8) -> bool {
	b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte mask of `line`: true where the byte is live code, false inside
/// string literals and from an unquoted `#` to end of line.
fn code_mask(line: &str) -> Vec<bool> {
	let bytes = line.as_bytes();
	let mut mask = vec![false; bytes.len()];
	let mut quote: Option<u8> = None;
	let mut escaped = false;

	for (i, &b) in bytes.iter().enumerate() {
		match quote {
			Some(q) => {
				if escaped {
					escaped = false;
				} else if b == b'\\' {
					escaped = true;
				} else if b == q {
					quote = None;
				}
			},
			None => {
				if b == b'#' {
					// Comment: the rest of the line stays masked out.
					break;
				}
				if b == b'"' || b == b'\'' {
					quote = Some(b);
				} else {
					mask[i] = true;
				}
			},
		}
	}
	mask
}

/// True when the token ending just before `pos` (ignoring spaces) is `kw`.
fn preceded_by_keyword(line: &str, pos: usize, kw: &str) -> bool {
	let bytes = line.as_bytes();
	let mut k = pos;
	while k > 0 && (bytes[k - 1] == b' ' || bytes[k - 1] == b'\t') {
		k -= 1;
	}
	if k < kw.len() || !line[..k].ends_with(kw) {
		return false;
	}
	let start = k - kw.len();
	start == 0 || !is_ident(bytes[start - 1])
}

/// Byte offsets at which a call to `name` begins: the name at a word
/// boundary followed by optional spaces and `(`, outside strings and
/// comments. A match right after the `def` keyword is the definition
/// itself, not a call, and is skipped.
pub fn find_calls(line: &str, name: &str) -> Vec<usize> {
	let mask = code_mask(line);
	let bytes = line.as_bytes();
	let mut out = Vec::new();

	for (pos, _) in line.match_indices(name) {
		let end = pos + name.len();
		if !mask[pos..end].iter().all(|&c| c) {
			continue;
		}
		if pos > 0 && is_ident(bytes[pos - 1]) {
			continue;
		}
		let mut j = end;
		while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
			j += 1;
		}
		if j >= bytes.len() || bytes[j] != b'(' || !mask[j] {
			continue;
		}
		if preceded_by_keyword(line, pos, "def") {
			continue;
		}
		out.push(pos);
	}
	out
}

/// True when the line contains the `await` keyword as live code.
pub fn has_await(line: &str) -> bool {
	let mask = code_mask(line);
	let bytes = line.as_bytes();

	for (pos, _) in line.match_indices("await") {
		let end = pos + "await".len();
		if !mask[pos..end].iter().all(|&c| c) {
			continue;
		}
		if pos > 0 && is_ident(bytes[pos - 1]) {
			continue;
		}
		if end < bytes.len() && is_ident(bytes[end]) {
			continue;
		}
		return true;
	}
	false
}

/// Insert `await ` before the first call to `name`, if any.
pub fn insert_await_first(line: &str, name: &str) -> Option<String> {
	let pos = find_calls(line, name).into_iter().next()?;
	Some(splice_await(line, &[pos]))
}

/// Insert `await ` before every call to `name`. An already-awaited call
/// anywhere on the line marks the whole line as done and yields `None`,
/// which keeps repeated passes from double-marking.
pub fn insert_await_all(line: &str, name: &str) -> Option<String> {
	let positions = find_calls(line, name);
	if positions.is_empty() || positions.iter().any(|&p| preceded_by_keyword(line, p, "await")) {
		return None;
	}
	Some(splice_await(line, &positions))
}

fn splice_await(line: &str, positions: &[usize]) -> String {
	let mut out = line.to_string();
	for &pos in positions.iter().rev() {
		out.insert_str(pos, "await ");
	}
	out
}
