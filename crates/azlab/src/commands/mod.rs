pub mod auth;
pub mod lifecycle;
pub mod storage;
pub mod vm;

use colored::Colorize;

/// Print the outcome of a lifecycle command and turn failure into an error
pub fn report_status(what: &str, status: i32) -> anyhow::Result<()> {
    if status == 0 {
        println!("{}", format!("✓ {}", what).green().bold());
        Ok(())
    } else {
        println!("{}", format!("✗ {} (exit status {})", what, status).red().bold());
        anyhow::bail!("{} failed with exit status {}", what, status)
    }
}
