// Feature walkthrough for the conscript language.
//
// Run with: cargo run --example conscript_demo

use conscript::{compile, Conscript, ExecOptions, Options};
use serde_json::json;

fn show(src: &str, vars: serde_json::Value) {
    match conscript::evaluate(src, vars.clone()) {
        Ok(value) => println!("  {:<40} {:>8}   with {}", src, value.to_string(), vars),
        Err(e) => println!("  {:<40} error: {}", src, e),
    }
}

fn main() {
    println!("=== Conscript Demo ===\n");

    println!("--- Comparisons and boolean logic ---");
    show("month=10 & day=28", json!({"month": 10, "day": 28}));
    show("(x>0 & x<=y-1) | x=999", json!({"x": 51, "y": 100}));
    show("role in [\"admin\", \"editor\"]", json!({"role": "editor"}));

    println!("\n--- Unquoted strings (unknowns default to strings) ---");
    show("status = active", json!({"status": "active"}));
    show("first name ^= \"A\"", json!({"first name": "Ada"}));

    println!("\n--- Arrays, strings and methods ---");
    show("tags.length > 1", json!({"tags": ["a", "b"]}));
    show("[1,2,3].map((x){x*2}).last", json!({}));
    show("word.slice(0, 4)", json!({"word": "conscript"}));
    show("scores.every((s){s >= 60})", json!({"scores": [75, 88, 61]}));

    println!("\n--- Ternary and left-default ---");
    show("x > 5 ? \"big\" : \"small\"", json!({"x": 10}));
    show("nickname ?: \"anonymous\"", json!({"nickname": ""}));

    println!("\n--- Regex literals (opt-in) ---");
    let factory = Conscript::with_options(Options {
        allow_regex_literals: Some(true),
        ..Options::default()
    });
    let check = factory.compile("\"test\" matches @^T@i").unwrap();
    println!(
        "  {:<40} {:>8}",
        check.source(),
        check.exec(json!({})).unwrap().to_string()
    );

    println!("\n--- Default-left pipelines ---");
    let range = compile(">2 & +1=4 & -  1 = 2").unwrap();
    let result = range
        .exec_with(json!({}), ExecOptions::default_left(3.0))
        .unwrap();
    println!("  {:<40} {:>8}   with defaultLeft: 3", range.source(), result.to_string());

    println!("\n--- Type predicates ---");
    show("5 is int", json!({}));
    show("tags is empty array", json!({"tags": []}));
    show("name is not number", json!({"name": "Ada"}));
}
