use anyhow::{Context, Result};
use py_asyncify::{RewriteConfig, init_logging, locate_call_sites, prepare_script, split_lines};
use std::{env, fs};

// Built-in demo program used when no file is given.
const SAMPLE: &str = r#"def menu(title, options):
    print(title)
    while True:
        choice = int(input("Choose: "))
        if choice <= len(options):
            return options[choice - 1]
        print("Invalid choice. Try again.")

def farewell():
    print("No input here!")

def ask_name():
    name = input("Enter your name: ")
    return name

def idle():
    # input() in a comment should not count
    pass

if __name__ == "__main__":
    menu("Main menu", ["start", "quit"])
    ask_name()
    farewell()
    idle()
"#;

fn main() -> Result<()> {
	init_logging();

	let mut args = env::args().skip(1);
	let source = match args.next() {
		Some(path) => fs::read_to_string(&path).with_context(|| format!("Failed to read script: {}", path))?,
		None => SAMPLE.to_string(),
	};
	let extra_primitives: Vec<String> = args.collect();

	let config = RewriteConfig {
		extra_primitives,
		..RewriteConfig::default()
	};
	let outcome = prepare_script(&source, &config);

	println!("=== Original ===");
	println!("{}", source);
	println!("=== Rewritten ===");
	println!("{}", outcome.text);

	println!("=== Analysis ===");
	print!("iterations: {}", outcome.iterations);
	if outcome.cap_reached {
		println!(" (cap reached, rewrite may be incomplete)");
	} else {
		println!();
	}

	if outcome.suspending.is_empty() {
		println!("no suspending functions found");
		return Ok(());
	}
	println!("suspending functions: {}", outcome.suspending.join(", "));

	let lines = split_lines(&source);
	let sites = locate_call_sites(&lines, &outcome.suspending);
	for (name, calls) in &sites {
		println!("\ncalls to `{}`:", name);
		if calls.is_empty() {
			println!("  (none)");
		}
		for call in calls {
			println!("  line {}: {}", call.line + 1, call.text);
		}
	}

	Ok(())
}
