use std::time::Duration;

use colored::*;
use indicatif::HumanDuration;
use tracing::info;

use cmover_common::migration::{AggregateReport, MigrationResult, Outcome};
use cmover_common::network::host::HostSpec;

use crate::terminal::colors;

pub const TOTAL_WIDTH: usize = 64;
pub const PRINT_TARGET: &str = "cmover::print";
pub const PRINT_FIELD: &str = "raw_msg";

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = console::measure_text_width(&formatted);

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: String = format!(
        "{}{}{}",
        "─".repeat(left).color(colors::SEPARATOR),
        formatted.to_uppercase().color(colors::PRIMARY),
        "─".repeat(right).color(colors::SEPARATOR)
    );
    print(&line);
}

pub fn fat_separator() {
    let sep: ColoredString = "═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR);
    print(&format!("{}", sep));
}

pub fn centerln(msg: &str) {
    let space: String = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{}{}", space, msg));
}

/// One line per finished task.
pub fn result_line(result: &MigrationResult) -> String {
    let task = &result.task;
    let elapsed: String = format!("{:#}", HumanDuration(result.elapsed));
    let route: String = format!("{} -> {}", task.source, task.destination);

    match &result.outcome {
        Outcome::Success { identity } => format!(
            "{} {} {} {} {} {}",
            "[+]".green().bold(),
            task.image.color(colors::PRIMARY),
            route.color(colors::SEPARATOR),
            task.target().color(colors::HOST),
            format!("({})", identity).color(colors::TEXT_DEFAULT),
            elapsed.color(colors::SEPARATOR)
        ),
        Outcome::Failure(err) => format!(
            "{} {} {} {} {} {}",
            "[-]".red().bold(),
            task.image.color(colors::PRIMARY),
            route.color(colors::SEPARATOR),
            task.target().color(colors::HOST),
            err.to_string().red(),
            elapsed.color(colors::SEPARATOR)
        ),
    }
}

pub fn report(report: &AggregateReport, total_time: Duration) {
    header("migration results");
    for result in report.results() {
        print(&result_line(result));
    }

    let succeeded: usize = report.successes().count();
    let failed: usize = report.failures().count();
    let failed_text: ColoredString = if failed == 0 {
        format!("{failed} failed").bold().green()
    } else {
        format!("{failed} failed").bold().red()
    };
    let summary: String = format!(
        "{} migrated, {} in {}",
        succeeded.to_string().bold().green(),
        failed_text,
        format!("{:.2}s", total_time.as_secs_f64()).bold().yellow()
    );

    fat_separator();
    centerln(&summary);
}

pub fn hosts(hosts: &[HostSpec]) {
    header("resolved hosts");
    for (idx, host) in hosts.iter().enumerate() {
        let idx_str: String = format!("[{}]", idx.to_string().color(colors::ACCENT));
        print(&format!("{} {}", idx_str.color(colors::SEPARATOR), host.to_string().color(colors::HOST)));
    }
    fat_separator();
    centerln(&format!("{} hosts", hosts.len().to_string().bold().green()));
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
