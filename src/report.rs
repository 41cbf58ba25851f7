//! Rendering of alert messages and the status dashboard.
//!
//! Everything in here is a pure function over already-computed state, so
//! the wording and the Ukrainian pluralization rules are testable without
//! any running actors.

use chrono::{DateTime, Duration, Local, Utc};

use crate::registry::SiteSnapshot;

/// Pick the grammatical form for a Ukrainian cardinal.
///
/// Three classes: one (1, 21, 31...), few (2-4, 22-24...), many
/// (0, 5-20, 25-30...). The teens 11-14 are always "many".
fn plural<'a>(n: i64, one: &'a str, few: &'a str, many: &'a str) -> &'a str {
    let n = n.abs();
    if (11..=14).contains(&(n % 100)) {
        return many;
    }
    match n % 10 {
        1 => one,
        2..=4 => few,
        _ => many,
    }
}

/// Render a duration as days/hours/minutes with correct plural forms,
/// e.g. "1 день 2 години 3 хвилини". Sub-minute durations render as
/// "менше хвилини".
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = total_minutes % (24 * 60) / 60;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} {}", plural(days, "день", "дні", "днів")));
    }
    if hours > 0 {
        parts.push(format!(
            "{hours} {}",
            plural(hours, "година", "години", "годин")
        ));
    }
    if minutes > 0 {
        parts.push(format!(
            "{minutes} {}",
            plural(minutes, "хвилина", "хвилини", "хвилин")
        ));
    }

    if parts.is_empty() {
        return "менше хвилини".to_string();
    }
    parts.join(" ")
}

/// Message sent when a site crosses the fail-ratio threshold.
pub fn outage_message(
    site: &str,
    down: usize,
    total: usize,
    healthy_for: Duration,
    at: DateTime<Local>,
) -> String {
    format!(
        "⚠️ Зникло світло: {site}\n🔴 Впало {down} з {total} пристроїв.\n🟢 Світло було: {}\n🕑 {}",
        format_duration(healthy_for),
        at.format("%H:%M:%S")
    )
}

/// Message sent when an alerting site drops back below the threshold.
pub fn recovery_message(
    site: &str,
    up: usize,
    total: usize,
    down_for: Duration,
    at: DateTime<Local>,
) -> String {
    format!(
        "💡 Світло з'явилося: {site}\n✅ Доступно {up} з {total} пристроїв.\n⏳ Світла не було: {}\n🕑 {}",
        format_duration(down_for),
        at.format("%H:%M:%S")
    )
}

/// Render the pinned dashboard: alerting sites first, then healthy ones,
/// alphabetical within each group, with the time spent in the current state.
pub fn render_dashboard(sites: &[SiteSnapshot], now: DateTime<Utc>, at: DateTime<Local>) -> String {
    let mut ordered: Vec<&SiteSnapshot> = sites.iter().collect();
    ordered.sort_by(|a, b| {
        b.alert_active
            .cmp(&a.alert_active)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut lines = vec!["📊 Стан будинків".to_string(), String::new()];
    for site in ordered {
        let since = format_duration(now - site.last_change);
        if site.alert_active {
            lines.push(format!(
                "🔴 {}: впало {} з {} ({})",
                site.name, site.down, site.total, since
            ));
        } else {
            lines.push(format!(
                "🟢 {}: доступно {} з {} ({})",
                site.name,
                site.total - site.down,
                site.total,
                since
            ));
        }
    }
    lines.push(String::new());
    lines.push(format!("🕑 Оновлено: {}", at.format("%H:%M:%S")));
    lines.join("\n")
}
