//! Environment check command.

use std::path::Path;

use console::style;

use crate::config::Settings;

/// Verify the external tools and workspace layout are usable.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    let mut problems = 0;

    problems += check_command("classifier", &settings.classifier_command);
    problems += check_command("upload script", &settings.upload_command);
    problems += check_dir("classifier workspace", &settings.classifier_workspace);
    problems += check_dir("data directory", &settings.data_dir);

    if settings.has_store() {
        println!("{} hosted store configured", style("✓").green());
    } else {
        println!(
            "{} no hosted store configured (records stay in memory)",
            style("!").yellow()
        );
    }

    if problems > 0 {
        anyhow::bail!("{} problem(s) found", problems);
    }
    println!("{} Everything looks good", style("✓").green());
    Ok(())
}

fn check_command(label: &str, command: &[String]) -> usize {
    let Some(program) = command.first() else {
        println!("{} {} command is empty", style("✗").red(), label);
        return 1;
    };

    // Absolute or relative paths are checked directly; bare names via PATH
    let found = if program.contains('/') {
        Path::new(program).exists()
    } else {
        which::which(program).is_ok()
    };

    if found {
        println!("{} {} command: {}", style("✓").green(), label, program);
        0
    } else {
        println!(
            "{} {} command not found: {}",
            style("✗").red(),
            label,
            program
        );
        1
    }
}

fn check_dir(label: &str, path: &Path) -> usize {
    if path.is_dir() {
        println!("{} {}: {}", style("✓").green(), label, path.display());
        0
    } else {
        println!(
            "{} {} missing: {} (run `fir init`)",
            style("✗").red(),
            label,
            path.display()
        );
        1
    }
}
