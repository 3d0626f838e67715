//! Initialize command.

use console::style;

use crate::config::Settings;

/// Initialize the data directories.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    println!(
        "{} Initialized firdesk in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!(
        "  uploads:   {}",
        settings.uploads_dir().display()
    );
    println!(
        "  working:   {}",
        settings.working_dir().display()
    );
    println!(
        "  workspace: {}",
        settings.classifier_workspace.display()
    );

    if !settings.classifier_workspace.exists() {
        println!(
            "{} Classifier workspace does not exist yet; point `classifier_workspace` at it in firdesk.toml",
            style("!").yellow()
        );
    }

    Ok(())
}
