use crate::common_scraper::ScrapingResult;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io;
use std::path::Path;

/// Postal code progress, e.g. `[██████░░░░] 3/5 zip codes`.
fn progress_bar_text(done: usize, total: usize) -> String {
    let bar_width = 30;
    let filled = (done.min(total) * bar_width) / total.max(1);
    format!(
        "[{}{}] {}/{} zip codes",
        "█".repeat(filled),
        "░".repeat(bar_width - filled),
        done,
        total
    )
}

/// Prints the colored end-of-run summary.
pub fn show_final_summary(
    result: &ScrapingResult,
    total_postal_codes: usize,
    output: &Path,
    rows_in_file: usize,
) -> io::Result<()> {
    let done = total_postal_codes.saturating_sub(result.remaining.len());

    execute!(
        io::stdout(),
        Print("─".repeat(80)),
        Print("\n"),
        SetForegroundColor(Color::White),
        Print(progress_bar_text(done, total_postal_codes)),
        Print("\n"),
        SetForegroundColor(Color::Green),
        Print(format!(
            "✅ {} agents from {} pages",
            result.records.len(),
            result.pages_fetched
        )),
        ResetColor
    )?;

    if !result.blocked_hosts.is_empty() {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Red),
            Print(format!(", {} proxy IPs blocked", result.blocked_hosts.len())),
            ResetColor
        )?;
    }

    if result.sink_failures > 0 {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Red),
            Print(format!(", {} pages not saved", result.sink_failures)),
            ResetColor
        )?;
    }

    execute!(
        io::stdout(),
        SetForegroundColor(Color::DarkGrey),
        Print(format!(" | {}: {} rows\n", output.display(), rows_in_file)),
        ResetColor
    )?;

    if result.halted {
        let stopped_at = result.last_postal_code.as_deref().unwrap_or("-");
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Red),
            Print(format!(
                "❌ All proxy IPs blocked. Process stopped at zip code {} ({} zip codes left)\n",
                stopped_at,
                result.remaining.len()
            )),
            ResetColor
        )?;
    }

    Ok(())
}
