//! Terminal output utilities

use console::style;
use vault_init_save::Saved;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Report where a bootstrap result ended up, warning loudly on a fallback
pub fn saved(saved: &Saved) {
    kv("Saved to", &format!("{} ({})", saved.location, saved.method));
    if saved.fell_back {
        warning(&format!(
            "The configured backend failed; the result is in the fallback file {}. Move it to its intended store and delete the file.",
            saved.location
        ));
    }
}
