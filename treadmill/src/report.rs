//! Operator-facing output.
//!
//! Progress goes to stdout, problems to stderr. Color is dropped when stderr
//! is not a terminal. Diagnostics for debugging belong in `tracing`, not here.

use std::io::IsTerminal;

use colored::Colorize;

pub fn init_color() {
    if !std::io::stderr().is_terminal() || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Start of a step.
pub fn step(msg: &str) {
    println!("{} {}", "==>".cyan().bold(), msg.bold());
}

/// Informational detail under a step.
pub fn note(msg: &str) {
    println!("    {msg}");
}

pub fn dry_run(msg: &str) {
    println!("{} {msg}", "[dry-run]".cyan());
}

pub fn success(msg: &str) {
    println!("{}", msg.green().bold());
}

pub fn warn(msg: &str) {
    eprintln!("{} {msg}", "warning:".yellow().bold());
}

pub fn error(msg: &str) {
    eprintln!("{} {msg}", "error:".red().bold());
}
