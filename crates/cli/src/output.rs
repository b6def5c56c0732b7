//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No rows".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a regression metric for display
pub fn format_metric(value: f64) -> String {
    format!("{:.4}", value)
}

/// Color R² by how much variance the model explains
pub fn color_r2(r2: f64) -> String {
    let formatted = format_metric(r2);
    if r2 >= 0.5 {
        formatted.green().to_string()
    } else if r2 >= 0.2 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(2.0), "2.0000");
        assert_eq!(format_metric(0.123456), "0.1235");
    }

    #[test]
    fn test_color_r2_keeps_value() {
        colored::control::set_override(false);
        assert_eq!(color_r2(0.55), "0.5500");
        assert_eq!(color_r2(-0.1), "-0.1000");
    }
}
