use colored::{ColoredString, Colorize};
use reconcile::MutationStatus;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num:>2}/{total}]").blue().bold(), msg);
}

/// Icon for an entity outcome
pub fn status_icon(status: MutationStatus) -> ColoredString {
    match status {
        MutationStatus::Created | MutationStatus::Updated | MutationStatus::Deleted => {
            "●".green()
        }
        MutationStatus::UsedExisting | MutationStatus::None => "○".dimmed(),
        MutationStatus::Ignored => "−".dimmed(),
        MutationStatus::Error => "✗".red(),
    }
}

/// Wire name of an outcome, padded and colored
pub fn status_label(status: MutationStatus) -> ColoredString {
    let text = format!("{:<13}", status.as_str());
    match status {
        MutationStatus::Created => text.green(),
        MutationStatus::Updated => text.yellow(),
        MutationStatus::Deleted => text.magenta(),
        MutationStatus::Error => text.red().bold(),
        MutationStatus::UsedExisting | MutationStatus::Ignored | MutationStatus::None => {
            text.dimmed()
        }
    }
}

/// Truncate text for display, keeping the start
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = text.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

// ============================================================================
// Tests
// ============================================================================
