//! Shared styling utilities for the CLI.

use console::Style;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Create an accent-styled string (cyan), used for example input.
pub fn accent(msg: &str) -> String {
    let style = Style::new().cyan();
    style.apply_to(msg).to_string()
}

/// Print a titled help box with example inputs above an interactive prompt.
pub fn print_prompt_box(title: &str, lines: &[&str], examples: &[&str]) {
    let width = 77;
    let yellow = Style::new().yellow();
    let cyan = Style::new().cyan();
    println!("┌{}┐", "─".repeat(width));
    println!("│ {:<w$}│", yellow.apply_to(title), w = width - 1);
    println!("│{}│", " ".repeat(width));
    for line in lines {
        println!("│ {:<w$}│", line, w = width - 1);
    }
    if !examples.is_empty() {
        println!("│{}│", " ".repeat(width));
        println!("│ {:<w$}│", yellow.apply_to("Example input:"), w = width - 1);
        for example in examples {
            println!("│ {:<w$}│", cyan.apply_to(example), w = width - 1);
        }
    }
    println!("└{}┘", "─".repeat(width));
}
