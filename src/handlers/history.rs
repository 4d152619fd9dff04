//! History command handlers
//!
//! Handles viewing and clearing the sync operation history.

use anyhow::{Context, Result};
use colored::Colorize;
use inquire::Confirm;

use crate::history::{self, OperationType};

use super::is_interactive;

/// Handle history list command
pub fn handle_history_list(limit: usize) -> Result<()> {
    let history = history::OperationHistory::load().context("Failed to load operation history")?;

    if history.is_empty() {
        println!("{}", "No operations in history.".yellow());
        return Ok(());
    }

    println!("{}", "Operation History".cyan().bold());
    println!("{}", "=".repeat(80).cyan());

    let operations = history.list_operations();
    let display_count = operations.len().min(limit);

    for (idx, op) in operations.iter().take(display_count).enumerate() {
        let num = format!("{}.", idx + 1);
        let op_type = match op.operation_type {
            OperationType::Pull => "PULL".green(),
            OperationType::Push => "PUSH".blue(),
            OperationType::Restore => "RESTORE".magenta(),
        };
        let status = if op.success { op.action.normal() } else { op.action.red() };

        println!("\n{} {} {}", num.bold(), op_type.bold(), status);
        println!(
            "   {} {}",
            "Time:".dimmed(),
            op.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("   {} {}", "Server:".dimmed(), op.endpoint);
        println!("   {} {}", "Result:".dimmed(), op.message);
        if op.bookmark_count > 0 {
            println!("   {} {}", "Bookmarks:".dimmed(), op.bookmark_count);
        }
        if let Some(snapshot_id) = &op.snapshot_id {
            println!("   {} {}", "Snapshot:".dimmed(), snapshot_id.green());
        }
    }

    if operations.len() > display_count {
        println!(
            "\n{} Showing {} of {} operations",
            "Note:".yellow(),
            display_count,
            operations.len()
        );
    }

    Ok(())
}

/// Handle history clear command
pub fn handle_history_clear(yes: bool) -> Result<()> {
    let mut history =
        history::OperationHistory::load().context("Failed to load operation history")?;

    if history.is_empty() {
        println!("{}", "History is already empty.".dimmed());
        return Ok(());
    }

    if !yes && is_interactive() {
        let confirm = Confirm::new(&format!("Clear {} history entries?", history.len()))
            .with_default(false)
            .prompt()
            .context("Failed to get confirmation")?;
        if !confirm {
            println!("{}", "History unchanged.".yellow());
            return Ok(());
        }
    }

    let count = history.len();
    history.clear().context("Failed to clear operation history")?;
    println!("{} Cleared {} history entries", "✓".green(), count);

    Ok(())
}
