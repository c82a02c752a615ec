//! Terminal output helpers for consistent CLI formatting

/// Check if color output is enabled
fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a success message (green checkmark)
pub fn print_success(message: &str) {
    if use_color() {
        println!("\x1b[32m✓\x1b[0m {}", message);
    } else {
        println!("OK: {}", message);
    }
}

/// Print a failure message (red cross)
pub fn print_failure(message: &str) {
    if use_color() {
        println!("\x1b[31m✕\x1b[0m {}", message);
    } else {
        println!("FAILED: {}", message);
    }
}

/// Print a warning message (yellow)
pub fn print_warning(message: &str) {
    if use_color() {
        eprintln!("\x1b[33mWarning:\x1b[0m {}", message);
    } else {
        eprintln!("Warning: {}", message);
    }
}

/// Print an info message (blue)
pub fn print_info(message: &str) {
    if use_color() {
        println!("\x1b[34mℹ\x1b[0m {}", message);
    } else {
        println!("Info: {}", message);
    }
}

/// Print a header with decorative border
pub fn print_header(title: &str) {
    let border = "═".repeat(59);
    println!();
    println!("{}", border);
    println!("{:^59}", title);
    println!("{}", border);
    println!();
}

/// Print a key-value pair with consistent formatting
pub fn print_key_value(key: &str, value: &str) {
    if use_color() {
        println!("  \x1b[1m{}:\x1b[0m {}", key, value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Text of the final migration line.
pub fn migration_result_line(succeeded: usize, total: usize) -> String {
    format!("Migrated {} / {} devices!", succeeded, total)
}

/// Print the final migration line, green when every device made it.
pub fn print_migration_result(succeeded: usize, total: usize) {
    let line = migration_result_line(succeeded, total);
    if succeeded == total {
        print_success(&line);
    } else {
        print_failure(&line);
    }
}
