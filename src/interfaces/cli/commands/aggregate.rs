//! Aggregate command

use std::path::PathBuf;

use chrono::NaiveDate;
use colored::Colorize;

use crate::analytics::DailySummary;
use crate::interfaces::cli::CliError;
use crate::runtime::lifetime::startup::StartupContext;

fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| CliError::ParseError(format!("invalid date '{}': {}", raw, e)))
}

fn print_summary(summary: &DailySummary) {
    let status = if summary.metrics_written {
        "✓".bold().green()
    } else {
        "✗".bold().red()
    };
    println!(
        "{} {}  views: {}  visitors: {}  searches: {}  purged: {} views / {} searches",
        status,
        summary.date.to_string().cyan(),
        summary.total_views.to_string().yellow(),
        summary.unique_visitors,
        summary.total_searches,
        summary.deleted_views,
        summary.deleted_searches
    );
    if summary.retention_failed {
        println!(
            "  {} retention sweep failed, old events were kept (see logs)",
            "⚠".bold().yellow()
        );
    }
}

pub async fn run_aggregate(
    ctx: &StartupContext,
    date: Option<String>,
    from: Option<String>,
    to: Option<String>,
    repair_scores: bool,
    export_keywords: Option<PathBuf>,
) -> Result<(), CliError> {
    if repair_scores {
        let updated = ctx.ingestion.counters().recompute_trending_scores().await?;
        println!(
            "{} Recomputed trending scores for {} content items",
            "✓".bold().green(),
            updated.to_string().cyan()
        );
        return Ok(());
    }

    match (date, from, to) {
        (Some(date), _, _) => {
            let summary = ctx
                .aggregation
                .run_daily_aggregation(parse_date(&date)?)
                .await?;
            print_summary(&summary);
        }
        (None, Some(from), Some(to)) => {
            let (from, to) = (parse_date(&from)?, parse_date(&to)?);
            if from > to {
                return Err(CliError::ParseError(format!(
                    "--from {} is after --to {}",
                    from, to
                )));
            }
            let summaries = ctx.aggregation.backfill(from, to).await?;
            for summary in &summaries {
                print_summary(summary);
            }
            println!(
                "{} Backfilled {} days",
                "ℹ".bold().blue(),
                summaries.len()
            );
        }
        (None, None, None) => {
            let summary = ctx.aggregation.run_for_yesterday().await?;
            print_summary(&summary);
        }
        _ => {
            return Err(CliError::ParseError(
                "--from and --to must be given together".to_string(),
            ));
        }
    }

    if let Some(path) = export_keywords {
        let export = ctx.query.trending_keywords().await?;
        export.write_to(&path)?;
        println!(
            "{} Exported {} keywords to {}",
            "✓".bold().green(),
            export.keywords.len().to_string().cyan(),
            path.display()
        );
    }

    Ok(())
}
