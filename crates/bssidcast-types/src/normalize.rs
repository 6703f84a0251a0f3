//! Signal normalization.
//!
//! Converts raw radio measurements into the canonical form consumed
//! downstream. Every function here is pure and total.
//!
//! The signal curve and the channel tables are part of the wire contract:
//! existing consumers rely on these exact numbers.

use crate::types::{NormalizedObservation, Observation};

/// Placeholder used in place of an empty SSID.
pub const HIDDEN_SSID: &str = "<Hidden>";

/// RSSI at or above which signal strength is reported as 100%.
pub const RSSI_CEILING_DBM: i32 = -30;

/// RSSI at or below which signal strength is reported as 0%.
pub const RSSI_FLOOR_DBM: i32 = -90;

/// First and last center frequencies of the 2.4 GHz table.
const BAND_2G4: (u32, u32) = (2412, 2484);

/// First and last center frequencies of the 5 GHz table.
const BAND_5G: (u32, u32) = (5170, 5825);

/// Channel number of the first 5 GHz table entry.
const BAND_5G_FIRST_CHANNEL: u32 = 34;

/// Convert an RSSI in dBm to a signal percentage.
///
/// Linear between -90 dBm (0%) and -30 dBm (100%), clamped outside that
/// range, truncating toward zero.
///
/// # Examples
///
/// ```
/// use bssidcast_types::normalize::signal_percent;
///
/// assert_eq!(signal_percent(-20), 100);
/// assert_eq!(signal_percent(-60), 50);
/// assert_eq!(signal_percent(-89), 1);
/// assert_eq!(signal_percent(-100), 0);
/// ```
#[must_use]
pub fn signal_percent(rssi_dbm: i32) -> u8 {
    if rssi_dbm >= RSSI_CEILING_DBM {
        100
    } else if rssi_dbm <= RSSI_FLOOR_DBM {
        0
    } else {
        // Strictly between the breakpoints, so the quotient is in 1..=98.
        (((rssi_dbm - RSSI_FLOOR_DBM) * 100) / 60) as u8
    }
}

/// Convert a center frequency in MHz to a channel number.
///
/// Returns 0 for frequencies outside the 2.4 GHz and 5 GHz tables.
///
/// # Examples
///
/// ```
/// use bssidcast_types::normalize::channel;
///
/// assert_eq!(channel(2412), 1);
/// assert_eq!(channel(2437), 6);
/// assert_eq!(channel(5180), 36);
/// assert_eq!(channel(6115), 0);
/// ```
#[must_use]
pub fn channel(frequency_mhz: u32) -> u32 {
    let f = frequency_mhz;
    if (BAND_2G4.0..=BAND_2G4.1).contains(&f) {
        (f - BAND_2G4.0) / 5 + 1
    } else if (BAND_5G.0..=BAND_5G.1).contains(&f) {
        (f - BAND_5G.0) / 5 + BAND_5G_FIRST_CHANNEL
    } else {
        0
    }
}

/// Center frequency in MHz for a channel number, the inverse of [`channel`].
///
/// For scanners that report channels instead of frequencies. Channels 1-14
/// map into the 2.4 GHz table and 34-165 into the 5 GHz table; anything else
/// returns 0, which [`channel`] maps back to 0.
///
/// # Examples
///
/// ```
/// use bssidcast_types::normalize::{channel, channel_frequency};
///
/// assert_eq!(channel_frequency(6), 2437);
/// assert_eq!(channel_frequency(36), 5180);
/// assert_eq!(channel(channel_frequency(14)), 14);
/// assert_eq!(channel_frequency(200), 0);
/// ```
#[must_use]
pub fn channel_frequency(channel_number: u32) -> u32 {
    match channel_number {
        1..=14 => BAND_2G4.0 + (channel_number - 1) * 5,
        34..=165 => BAND_5G.0 + (channel_number - BAND_5G_FIRST_CHANNEL) * 5,
        _ => 0,
    }
}

/// SSID as shown to users and published: empty becomes [`HIDDEN_SSID`].
#[must_use]
pub fn ssid_display(ssid: &str) -> &str {
    if ssid.is_empty() { HIDDEN_SSID } else { ssid }
}

/// Normalize a single observation for publishing.
#[must_use]
pub fn normalize(obs: &Observation) -> NormalizedObservation {
    NormalizedObservation {
        ssid: ssid_display(&obs.ssid).to_string(),
        bssid: obs.bssid.to_lowercase(),
        signal: signal_percent(obs.rssi_dbm),
        channel: channel(obs.frequency_mhz),
        rssi_dbm: obs.rssi_dbm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_frequency_inverts_channel() {
        for ch in (1..=14).chain(34..=165) {
            assert_eq!(channel(channel_frequency(ch)), ch, "channel {}", ch);
        }
        assert_eq!(channel_frequency(1), 2412);
        assert_eq!(channel_frequency(165), 5825);
        assert_eq!(channel_frequency(0), 0);
        assert_eq!(channel_frequency(15), 0);
        assert_eq!(channel_frequency(33), 0);
        assert_eq!(channel_frequency(166), 0);
    }

    #[test]
    fn test_signal_percent_breakpoints() {
        assert_eq!(signal_percent(-30), 100);
        assert_eq!(signal_percent(-31), 98);
        assert_eq!(signal_percent(-90), 0);
        assert_eq!(signal_percent(-91), 0);
    }

    #[test]
    fn test_signal_percent_truncates() {
        // (-75 + 90) * 100 / 60 = 25
        assert_eq!(signal_percent(-75), 25);
        // (-70 + 90) * 100 / 60 = 33.33 -> 33
        assert_eq!(signal_percent(-70), 33);
        // (-40 + 90) * 100 / 60 = 83.33 -> 83
        assert_eq!(signal_percent(-40), 83);
    }

    #[test]
    fn test_signal_percent_extremes() {
        assert_eq!(signal_percent(0), 100);
        assert_eq!(signal_percent(40), 100);
        assert_eq!(signal_percent(i32::MAX), 100);
        assert_eq!(signal_percent(i32::MIN), 0);
    }

    #[test]
    fn test_channel_2g4_table() {
        assert_eq!(channel(2412), 1);
        assert_eq!(channel(2417), 2);
        assert_eq!(channel(2462), 11);
        assert_eq!(channel(2472), 13);
        // Channel 14 sits off the 5 MHz grid; the table formula is kept as-is.
        assert_eq!(channel(2484), 15);
    }

    #[test]
    fn test_channel_5g_table() {
        assert_eq!(channel(5170), 34);
        assert_eq!(channel(5180), 36);
        assert_eq!(channel(5500), 100);
        assert_eq!(channel(5745), 149);
        assert_eq!(channel(5825), 165);
    }

    #[test]
    fn test_channel_unknown_band() {
        assert_eq!(channel(0), 0);
        assert_eq!(channel(2411), 0);
        assert_eq!(channel(2485), 0);
        assert_eq!(channel(5169), 0);
        assert_eq!(channel(5826), 0);
        assert_eq!(channel(5955), 0);
    }

    #[test]
    fn test_ssid_display() {
        assert_eq!(ssid_display(""), "<Hidden>");
        assert_eq!(ssid_display("HomeNet"), "HomeNet");
        assert_eq!(ssid_display(" "), " ");
    }

    #[test]
    fn test_normalize_lowercases_bssid() {
        let obs = Observation::new("Cafe", "AA:BB:CC:11:22:33", -60, 2437);
        let normalized = normalize(&obs);
        assert_eq!(normalized.bssid, "aa:bb:cc:11:22:33");
        assert_eq!(normalized.ssid, "Cafe");
        assert_eq!(normalized.signal, 50);
        assert_eq!(normalized.channel, 6);
        assert_eq!(normalized.rssi_dbm, -60);
    }

    #[test]
    fn test_normalize_hidden_ssid() {
        let obs = Observation::new("", "00:11:22:33:44:55", -95, 5180);
        let normalized = normalize(&obs);
        assert_eq!(normalized.ssid, HIDDEN_SSID);
        assert_eq!(normalized.signal, 0);
        assert_eq!(normalized.channel, 36);
    }
}
