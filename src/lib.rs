//! Source-to-source rewriter that prepares blocking Python-style scripts for
//! cooperative execution in a browser-embedded interpreter.
//!
//! Scripts are written against blocking primitives (`input()`,
//! `time.sleep()`), but the host can only deliver keystrokes and timers
//! asynchronously. The rewriter finds every function whose body blocks,
//! transitively marks every caller as suspending, annotates the call sites,
//! relocates the `__main__` entry guard into top-level scope, and finally
//! batches consecutive `print` lines into one call. The result is handed to
//! the interpreter bootstrapper, which wraps it as the body of an implicit
//! suspending entry procedure.

pub mod asyncify;
pub mod functions;
pub mod mainblock;
pub mod prints;
mod scan;

pub use asyncify::{BUILTIN_PRIMITIVES, RewriteConfig, RewriteOutcome};
pub use functions::{CallSite, FunctionRecord, locate_call_sites, scan_functions};
pub use scan::split_lines;

use log::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

/// Full rewrite pipeline: fixpoint suspension marking, entry-guard
/// relocation, then print batching. A pure function from text (plus
/// configuration) to text; safe to call repeatedly, and applying it to its
/// own output changes nothing.
pub fn prepare_script(source: &str, config: &RewriteConfig) -> RewriteOutcome {
	let outcome = asyncify::asyncify(source, config);
	let text = mainblock::relocate_main_block(&outcome.text);
	let text = prints::concatenate_prints(&text);
	info!("rewrite finished: {} -> {} chars", source.len(), text.len());
	RewriteOutcome { text, ..outcome }
}

#[wasm_bindgen]
pub fn start() {
	set_panic_hook();
	init_logging();
	info!("py-asyncify ready");
}

/// Rewrite entry point for the JS bootstrapper. `extra_primitives` lists
/// user function names bridged by the host, treated like `input`.
#[wasm_bindgen]
pub fn rewrite_script(source: &str, extra_primitives: Vec<String>) -> String {
	let config = RewriteConfig {
		extra_primitives,
		..RewriteConfig::default()
	};
	prepare_script(source, &config).text
}

/// Fetch a script over HTTP and return the rewritten text, ready for the
/// interpreter bootstrapper to wrap and execute.
#[wasm_bindgen]
pub async fn fetch_and_rewrite(url: String) -> Result<String, JsValue> {
	let resp_value = JsFuture::from(window().fetch_with_str(&url)).await?;
	let resp: Response = resp_value.dyn_into()?;
	let text = JsFuture::from(resp.text()?).await?;
	let source = text.as_string().unwrap_or_default();
	Ok(prepare_script(&source, &RewriteConfig::default()).text)
}

fn window() -> web_sys::Window {
	web_sys::window().expect("no global `window` exists")
}

pub fn set_panic_hook() {
	// When the `console_error_panic_hook` feature is enabled, we can call the
	// `set_panic_hook` function at least once during initialization, and then
	// we will get better error messages if our code ever panics.
	//
	// For more details see
	// https://github.com/rustwasm/console_error_panic_hook#readme
	#[cfg(feature = "console_error_panic_hook")]
	console_error_panic_hook::set_once();
}

pub fn init_logging() {
	#[cfg(target_arch = "wasm32")]
	{
		console_log::init_with_level(log::Level::Debug).expect("Failed to initialize console_log");
	}

	#[cfg(not(target_arch = "wasm32"))]
	{
		env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Info).init();
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	fn rewrite(src: &str) -> String {
		prepare_script(src, &RewriteConfig::default()).text
	}

	fn rewrite_full(src: &str) -> RewriteOutcome {
		prepare_script(src, &RewriteConfig::default())
	}

	/// Trimmed, non-blank, non-comment lines with suspension markers
	/// stripped back out.
	fn statement_seq(text: &str) -> Vec<String> {
		text.lines()
			.map(str::trim)
			.filter(|l| !l.is_empty() && !l.starts_with('#'))
			.map(|l| l.replace("await ", "").replace("async ", ""))
			.collect()
	}

	#[test]
	fn transitive_closure_through_nested_calls() {
		let src = "def a():\n    input()\n\ndef b():\n    a()\n\ndef c():\n    b()\n\nc()";
		let expected = "async def a():\n    await input()\n\nasync def b():\n    await a()\n\nasync def c():\n    await b()\n\nawait c()";
		let out = rewrite_full(src);
		assert_eq!(out.text, expected);
		assert_eq!(out.suspending, vec!["a", "b", "c"]);
		assert!(!out.cap_reached);
	}

	#[test]
	fn top_level_primitive_rewritten_without_any_functions() {
		let out = rewrite_full("time.sleep(2)\nprint(\"done\")");
		assert_eq!(out.text, "await time.sleep(2)\nprint(\"done\")");
		assert_eq!(out.iterations, 1);
		assert!(out.suspending.is_empty());
	}

	#[test]
	fn nested_primitive_call_gets_both_markers() {
		let out = rewrite("time.sleep(input())");
		assert_eq!(out, "await time.sleep(await input())");
	}

	#[test]
	fn sibling_definition_is_not_folded_into_body() {
		let src = r#"def wait_for_key():
    input()

def silent():
    x = 1

silent()
wait_for_key()"#;
		let out = rewrite(src);
		assert!(out.contains("async def wait_for_key():"));
		assert!(out.contains("\ndef silent():"));
		assert!(!out.contains("async def silent"));
		assert!(out.contains("\nsilent()"));
		assert!(out.contains("\nawait wait_for_key()"));
	}

	#[test]
	fn call_in_comment_does_not_mark_function() {
		let src = "def baz():\n    # input() in a comment should not count\n    pass\n\nbaz()";
		assert_eq!(rewrite(src), src);
	}

	#[test]
	fn call_in_string_literal_does_not_mark_function() {
		let src = "def quiet():\n    msg = \"call input() later\"\n    print(msg)\n\nquiet()";
		assert_eq!(rewrite(src), src);
	}

	#[test]
	fn await_inside_string_does_not_block_marking() {
		// The word `await` in a prompt must not defeat the line-level
		// idempotence check for the actual call around it.
		let out = rewrite("x = input(\"await here\")");
		assert_eq!(out, "x = await input(\"await here\")");
	}

	#[test]
	fn extra_primitives_are_treated_like_builtins() {
		let config = RewriteConfig {
			extra_primitives: vec!["custom_wait".to_string()],
			..RewriteConfig::default()
		};
		let src = "def helper():\n    custom_wait()\n\nhelper()\ncustom_wait(5)";
		let out = prepare_script(src, &config);
		assert_eq!(
			out.text,
			"async def helper():\n    await custom_wait()\n\nawait helper()\nawait custom_wait(5)"
		);
		assert_eq!(out.suspending, vec!["helper"]);
	}

	#[test]
	fn already_async_definitions_are_recognized() {
		let src = "async def a():\n    await input()\n\ndef b():\n    a()\n\nb()";
		let out = rewrite(src);
		assert!(out.contains("async def b():"));
		assert!(out.contains("    await a()"));
		assert!(out.contains("\nawait b()"));
		// No double marker on the definition that was already async.
		assert!(!out.contains("async async"));
	}

	#[test]
	fn full_rewrite_is_idempotent() {
		let src = r#"import time

def greet():
    print("hi")
    print("there")

def ask():
    name = input("name? ")
    return name

def main():
    greet()
    ask()
    time.sleep(1)

if __name__ == "__main__":
    main()
else:
    print("imported")"#;
		let once = rewrite(src);
		let twice = rewrite(&once);
		assert_eq!(twice, once);
		assert!(once.contains("async def ask():"));
		assert!(once.contains("name = await input(\"name? \")"));
		assert!(once.contains("    await time.sleep(1)"));
		assert!(once.contains("\nawait main()"));
	}

	#[test]
	fn statement_order_is_preserved() {
		let src = "def a():\n    input()\n\ndef b():\n    a()\n\ndef c():\n    b()\n\nc()";
		let out = rewrite(src);
		assert_eq!(statement_seq(&out), statement_seq(src));
	}

	#[test]
	fn consecutive_prints_collapse_per_indent_level() {
		let src = r#"print("one")
print("two")
print("three")
while True:
    print("four")"#;
		let expected = r#"print("one", "\n", "two", "\n", "three")
while True:
    print("four")"#;
		assert_eq!(rewrite(src), expected);
	}

	#[test]
	fn unbalanced_print_argument_breaks_the_run() {
		let src = "print(\"x\")\nprint(\"y(\")\nprint(\"z\")";
		// Middle line fails the balance check, so nothing merges.
		assert_eq!(rewrite(src), src);
	}

	#[test]
	fn entry_guard_body_moves_to_top_level() {
		let src = r#"def run():
    x = 1

if __name__ == "__main__":
    run()
    y = 2
else:
    z = 3"#;
		let expected = r#"def run():
    x = 1

# This block ran behind the script's __main__ entry guard.
# The embedded interpreter has no such entry point, so the body now runs at top level.
#if __name__ == "__main__":
run()
y = 2
#else:
#    z = 3"#;
		assert_eq!(rewrite(src), expected);
	}

	#[test]
	fn entry_guard_accepts_single_quotes() {
		let out = rewrite("if __name__ == '__main__':\n    x = 1");
		assert!(out.contains("#if __name__ == '__main__':"));
		assert!(out.contains("\nx = 1"));
	}

	#[test]
	fn deeper_nesting_inside_guard_keeps_relative_indent() {
		let src = r#"if __name__ == "__main__":
    while True:
        x = 1"#;
		let out = rewrite(src);
		assert!(out.contains("\nwhile True:\n    x = 1"));
	}

	#[test]
	fn iteration_cap_stops_pathological_chains() {
		// A call chain one level deeper than the cap: the set grows by one
		// function per iteration and cannot converge in time.
		let mut src = String::from("def f0():\n    input()\n");
		for i in 1..12 {
			src.push_str(&format!("\ndef f{}():\n    f{}()\n", i, i - 1));
		}
		src.push_str("\nf11()\n");

		let out = rewrite_full(&src);
		assert!(out.cap_reached);
		assert_eq!(out.iterations, RewriteConfig::default().max_iterations);
		assert!(out.text.contains("async def f0():"));
	}

	#[test]
	fn iteration_cap_is_configurable() {
		let config = RewriteConfig {
			max_iterations: 2,
			..RewriteConfig::default()
		};
		let src = "def f0():\n    input()\n\ndef f1():\n    f0()\n\ndef f2():\n    f1()\n\nf2()";
		let out = prepare_script(src, &config);
		assert!(out.cap_reached);
		assert_eq!(out.iterations, 2);
	}

	#[test]
	fn plain_script_passes_through_unchanged() {
		let src = "x = 1\ny = x + 2";
		let out = rewrite_full(src);
		assert_eq!(out.text, src);
		assert_eq!(out.iterations, 1);
		assert!(!out.cap_reached);
	}

	#[test]
	fn definition_line_is_not_a_call_site() {
		let out = rewrite("def ask():\n    input()\n\nask()");
		assert!(out.contains("async def ask():"));
		assert!(!out.contains("await def"));
		assert!(!out.contains("await ask():"));
	}

	#[test]
	fn rewrite_script_entry_point_threads_extra_primitives() {
		let out = rewrite_script("custom_fn(1)", vec!["custom_fn".to_string()]);
		assert_eq!(out, "await custom_fn(1)");
	}
}
