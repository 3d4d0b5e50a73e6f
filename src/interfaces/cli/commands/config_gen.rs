//! Generate config command

use std::path::Path;

use colored::Colorize;

use crate::config::StaticConfig;
use crate::interfaces::cli::CliError;

/// Generate example configuration file
pub fn config_generate(output_path: Option<String>, force: bool) -> Result<(), CliError> {
    let path = output_path.unwrap_or_else(|| "config.example.toml".to_string());

    if !force && Path::new(&path).exists() {
        return Err(CliError::CommandError(format!(
            "{} already exists, use --force to overwrite",
            path
        )));
    }

    StaticConfig::default()
        .save_to_file(&path)
        .map_err(|e| CliError::CommandError(format!("failed to write {}: {}", path, e)))?;

    println!(
        "{} {}",
        "Configuration file generated:".green(),
        path.blue()
    );
    println!(
        "  {}",
        "Environment variables override file values, e.g. VP__ANALYTICS__DEDUP_TTL_SECS=600"
            .dimmed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_string_lossy().to_string();

        config_generate(Some(path_str.clone()), false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[analytics]"));

        assert!(config_generate(Some(path_str.clone()), false).is_err());
        assert!(config_generate(Some(path_str), true).is_ok());
    }
}
