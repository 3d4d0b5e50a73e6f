//! Panic hook
//!
//! panic 信息同时写入 tracing（进入日志文件）和 crash.log。
//! server 模式在终端打印完整回溯，CLI 模式只打印一行提示。

use std::fs::OpenOptions;
use std::io::Write;
use std::panic;

use chrono::Utc;

const CRASH_LOG: &str = "crash.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Server,
    Cli,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

pub fn install_panic_hook(mode: RunMode) {
    panic::set_hook(Box::new(move |panic_info| {
        let message = panic_message(panic_info.payload());
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "Unknown location".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();

        tracing::error!(%location, "panic: {}", message);

        if let Err(e) = write_crash_log(&message, &location, &backtrace) {
            eprintln!("Failed to write crash log: {}", e);
        }

        match mode {
            RunMode::Server => display_server_panic(&message, &location, &backtrace),
            RunMode::Cli => {
                eprintln!("Program panicked: {}", message);
                eprintln!("Details saved to {}", CRASH_LOG);
            }
        }
    }));
}

fn display_server_panic(message: &str, location: &str, backtrace: &std::backtrace::Backtrace) {
    use colored::Colorize;

    let rule = "═══════════════════════════════════════════════════".red().bold();
    eprintln!();
    eprintln!("{}", rule);
    eprintln!("{}", "PANIC".red().bold());
    eprintln!("{} {}", "Reason:".yellow().bold(), message.white());
    eprintln!("{} {}", "Location:".yellow().bold(), location.white());
    eprintln!("{}", "Backtrace:".yellow().bold());
    eprintln!("{}", format!("{:?}", backtrace).dimmed());
    eprintln!("{}", format!("Details saved to {}", CRASH_LOG).cyan());
    eprintln!("{}", rule);
}

fn write_crash_log(
    message: &str,
    location: &str,
    backtrace: &std::backtrace::Backtrace,
) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(CRASH_LOG)?;

    writeln!(file, "==========================================")?;
    writeln!(
        file,
        "Crash Report - {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(file, "Message: {}", message)?;
    writeln!(file, "Location: {}", location)?;
    writeln!(file, "\nBacktrace:\n{:?}", backtrace)?;
    writeln!(file, "==========================================\n")?;
    Ok(())
}
