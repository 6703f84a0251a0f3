//! Terminal rendering of scan results.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use bssidcast_core::DisplayView;

/// SSIDs longer than this are cut for display.
pub const SSID_DISPLAY_WIDTH: usize = 31;

#[derive(Tabled)]
struct NetworkRow {
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "Signal")]
    signal: String,
    #[tabled(rename = "Channel")]
    channel: String,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Render a display view as a table, strongest network first.
#[must_use]
pub fn format_display_view(view: &DisplayView) -> String {
    if view.is_empty() {
        return "No WiFi networks found.\n".to_string();
    }

    let rows: Vec<NetworkRow> = view
        .entries()
        .iter()
        .map(|entry| NetworkRow {
            ssid: truncate_chars(&entry.ssid, SSID_DISPLAY_WIDTH),
            bssid: entry.bssid.clone(),
            signal: format!("{}%", entry.signal),
            channel: match entry.channel {
                0 => "N/A".to_string(),
                ch => ch.to_string(),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());

    let mut output = format!("{}\n", table);
    if let Some(summary) = view.omitted_summary() {
        output.push_str(&summary);
        output.push('\n');
    }
    output.push_str(&format!("\nTotal: {} access point(s)\n", view.total()));
    output
}
