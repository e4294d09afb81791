//! Post-pass that batches runs of consecutive `print(...)` lines into a
//! single call, cutting host round-trips on the output bridge. Purely a
//! line-level merge: no argument semantics, no reordering.

use log::debug;

use crate::scan;

pub fn concatenate_prints(code: &str) -> String {
	let lines = scan::split_lines(code);
	let mut out: Vec<String> = Vec::new();
	let mut i = 0;

	while i < lines.len() {
		let Some((indent, first)) = match_print(&lines[i]) else {
			out.push(lines[i].clone());
			i += 1;
			continue;
		};

		// Collect the run: consecutive print lines at the identical indent.
		let mut args = vec![first];
		let mut j = i + 1;
		while j < lines.len() {
			match match_print(&lines[j]) {
				Some((next_indent, arg)) if next_indent == indent => {
					args.push(arg);
					j += 1;
				},
				_ => break,
			}
		}

		if args.len() > 1 {
			debug!("merging {} consecutive prints at line {}", args.len(), i + 1);
			out.push(format!("{}print({})", indent, args.join(", \"\\n\", ")));
		} else {
			out.push(lines[i].clone());
		}
		i = j;
	}

	scan::join_lines(&out)
}

/// `print( <args> )` with nothing after the closing paren. Arguments whose
/// parentheses do not balance break the match and the line stays unmerged.
fn match_print(line: &str) -> Option<(&str, &str)> {
	let indent = scan::leading_whitespace(line);
	let rest = line[indent.len()..].strip_prefix("print(")?;
	let args = rest.strip_suffix(')')?;
	if args.is_empty() || !balanced(args) {
		return None;
	}
	Some((indent, args))
}

fn balanced(args: &str) -> bool {
	let mut depth = 0i32;
	for b in args.bytes() {
		match b {
			b'(' => depth += 1,
			b')' => {
				depth -= 1;
				if depth < 0 {
					return false;
				}
			},
			_ => {},
		}
	}
	depth == 0
}
