//! Fixpoint propagation of the "may suspend" property.
//!
//! Each iteration rescans the current text from scratch: functions whose
//! body calls a suspending primitive, plus functions whose body already
//! carries an `await` marker from a previous iteration, form this round's
//! suspending set. Their definitions get an `async` marker and every call
//! site gets an `await` marker, which is what lets the next iteration see
//! the callers as suspending too. The set grows monotonically, so the loop
//! stops as soon as an iteration discovers nothing new, or at the
//! configured cap.

use indexmap::IndexSet;
use log::{debug, info, warn};

use crate::functions::{self, FunctionRecord};
use crate::scan;

/// Host-bridged blocking primitives: a blocking read and a blocking delay.
pub const BUILTIN_PRIMITIVES: [&str; 2] = ["input", "time.sleep"];

#[derive(Debug, Clone)]
pub struct RewriteConfig {
	/// Extra function names treated exactly like the built-in primitives:
	/// their call sites are marked unconditionally, every iteration.
	pub extra_primitives: Vec<String>,
	/// Fixpoint iteration cap. Exhausting it is reported on the outcome,
	/// never raised as an error.
	pub max_iterations: usize,
}

impl Default for RewriteConfig {
	fn default() -> Self {
		Self {
			extra_primitives: Vec::new(),
			max_iterations: 10,
		}
	}
}

#[derive(Debug, Clone)]
pub struct RewriteOutcome {
	pub text: String,
	pub iterations: usize,
	/// True when the loop stopped at `max_iterations` before converging.
	/// The text is still the best-effort partial rewrite.
	pub cap_reached: bool,
	/// Names of suspending functions, in discovery order.
	pub suspending: Vec<String>,
}

/// Rewrite `code` so every suspending call is marked. Pure: owns its own
/// line buffer, holds no state between invocations.
pub fn asyncify(code: &str, config: &RewriteConfig) -> RewriteOutcome {
	let mut lines = scan::split_lines(code);
	let primitives: Vec<String> = BUILTIN_PRIMITIVES
		.iter()
		.map(|s| (*s).to_string())
		.chain(config.extra_primitives.iter().cloned())
		.collect();

	let mut previous: IndexSet<String> = IndexSet::new();
	let mut iterations = 0;
	let mut cap_reached = false;

	// Always runs at least once so top-level primitive calls, which have no
	// enclosing FunctionRecord, are rewritten even when no function
	// qualifies as suspending.
	loop {
		iterations += 1;
		debug!("fixpoint iteration {}", iterations);

		let blocking = functions::find_suspending_functions(&lines, &primitives);
		let awaiting = functions::find_awaiting_functions(&lines);

		// Union of both detectors, deduplicated by name. First occurrence
		// wins, so the blocking-call record takes precedence.
		let mut records: Vec<FunctionRecord> = Vec::new();
		let mut suspending: IndexSet<String> = IndexSet::new();
		for rec in blocking.into_iter().chain(awaiting) {
			if suspending.insert(rec.name.clone()) {
				records.push(rec);
			}
		}

		let names: Vec<String> = suspending.iter().cloned().collect();
		let call_sites = functions::locate_call_sites(&lines, &names);

		for rec in &records {
			mark_definition(&mut lines, rec);
		}
		for (name, sites) in &call_sites {
			for site in sites {
				mark_call_site(&mut lines, name, site.line);
			}
		}
		// Unconditional, not gated on the suspending set: primitive calls
		// at top level are marked directly on every line.
		for line in &mut lines {
			for prim in &primitives {
				if let Some(marked) = scan::insert_await_all(line, prim) {
					*line = marked;
				}
			}
		}

		if suspending == previous {
			info!("converged after {} iterations, {} suspending functions", iterations, suspending.len());
			break;
		}
		previous = suspending;
		if iterations >= config.max_iterations {
			warn!(
				"iteration cap ({}) reached before convergence; returning partial rewrite",
				config.max_iterations
			);
			cap_reached = true;
			break;
		}
	}

	RewriteOutcome {
		text: scan::join_lines(&lines),
		iterations,
		cap_reached,
		suspending: previous.into_iter().collect(),
	}
}

fn mark_definition(lines: &mut [String], rec: &FunctionRecord) {
	let Some((_, _, is_async)) = functions::match_def(&lines[rec.line]) else {
		return;
	};
	if is_async {
		return;
	}
	let rest = lines[rec.line][rec.indent.len()..].to_string();
	lines[rec.line] = format!("{}async {}", rec.indent, rest);
	debug!("marked definition of `{}` on line {}", rec.name, rec.line + 1);
}

fn mark_call_site(lines: &mut [String], name: &str, idx: usize) {
	// A marker anywhere on the line means it was handled already.
	if scan::has_await(&lines[idx]) {
		return;
	}
	if let Some(marked) = scan::insert_await_first(&lines[idx], name) {
		debug!("marked call to `{}` on line {}", name, idx + 1);
		lines[idx] = marked;
	}
}
