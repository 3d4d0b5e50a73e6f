//! CLI interface module
//!
//! 一次性命令：聚合、内容目录维护、配置生成。直接连接存储执行，不经过 HTTP。

pub mod commands;

use std::fmt;

use crate::cli::{Commands, ConfigCommands, ContentCommands};
use crate::runtime::lifetime::startup::prepare_components;

#[derive(Debug)]
pub enum CliError {
    StorageError(String),
    ParseError(String),
    CommandError(String),
}

impl CliError {
    /// Format as simple output
    pub fn format_simple(&self) -> String {
        match self {
            CliError::StorageError(msg) => format!("Storage error: {}", msg),
            CliError::ParseError(msg) => format!("Parse error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    /// Format as colored output
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::StorageError(msg) => {
                format!("{} {}", "Storage error:".red().bold(), msg.white())
            }
            CliError::ParseError(msg) => {
                format!("{} {}", "Parse error:".yellow().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<crate::errors::ViewPulseError> for CliError {
    fn from(err: crate::errors::ViewPulseError) -> Self {
        match err {
            crate::errors::ViewPulseError::Validation(msg)
            | crate::errors::ViewPulseError::DateParse(msg) => CliError::ParseError(msg),
            crate::errors::ViewPulseError::NotFound(msg) => CliError::CommandError(msg),
            other => CliError::StorageError(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::StorageError(format!("{:#}", err))
    }
}

/// Run a CLI command from clap-parsed input
pub async fn run_cli_command(cmd: Commands) -> Result<(), CliError> {
    // 生成配置不需要连接数据库
    if let Commands::Config {
        action: ConfigCommands::Generate { output_path, force },
    } = cmd
    {
        return commands::config_generate(output_path, force);
    }

    let ctx = prepare_components().await?;

    match cmd {
        Commands::Aggregate {
            date,
            from,
            to,
            repair_scores,
            export_keywords,
        } => {
            commands::run_aggregate(&ctx, date, from, to, repair_scores, export_keywords).await
        }

        Commands::Content { action } => match action {
            ContentCommands::Add {
                content_ref,
                title,
                unpublished,
            } => commands::add_content(&ctx, &content_ref, &title, !unpublished).await,
            ContentCommands::Publish { content_ref } => {
                commands::set_visibility(&ctx, &content_ref, true).await
            }
            ContentCommands::Hide { content_ref } => {
                commands::set_visibility(&ctx, &content_ref, false).await
            }
            ContentCommands::Show { content_ref } => commands::show_content(&ctx, &content_ref).await,
        },

        Commands::Config { .. } => unreachable!("handled above"),
        Commands::Serve => unreachable!("serve handled in main"),
    }
}
