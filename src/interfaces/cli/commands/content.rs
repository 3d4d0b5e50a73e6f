//! Content directory commands

use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::runtime::lifetime::startup::StartupContext;

pub async fn add_content(
    ctx: &StartupContext,
    content_ref: &str,
    title: &str,
    published: bool,
) -> Result<(), CliError> {
    let item = ctx.content.register(content_ref, title, published).await?;
    println!(
        "{} Registered content: {} ({}) {}",
        "✓".bold().green(),
        item.content_ref.cyan(),
        item.title,
        if item.is_published {
            "published".green()
        } else {
            "unpublished".yellow()
        }
    );
    Ok(())
}

pub async fn set_visibility(
    ctx: &StartupContext,
    content_ref: &str,
    published: bool,
) -> Result<(), CliError> {
    ctx.content.set_published(content_ref, published).await?;
    println!(
        "{} {} is now {}",
        "✓".bold().green(),
        content_ref.cyan(),
        if published { "published" } else { "hidden" }
    );
    Ok(())
}

pub async fn show_content(ctx: &StartupContext, content_ref: &str) -> Result<(), CliError> {
    let item = ctx.content.find(content_ref).await?;
    println!("{} {}", item.content_ref.cyan().bold(), item.title);
    println!("  published:      {}", item.is_published);
    println!("  views:          {}", item.views_count);
    println!("  likes:          {}", item.likes_count);
    println!("  comments:       {}", item.comments_count);
    println!("  trending score: {:.1}", item.trending_score);
    println!(
        "  updated:        {}",
        item.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
