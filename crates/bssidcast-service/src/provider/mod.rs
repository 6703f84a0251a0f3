//! Command-line scan providers.
//!
//! - [`TermuxProvider`]: `termux-wifi-scaninfo` from the Termux:API add-on (Android).
//! - [`NmcliProvider`]: NetworkManager's `nmcli` (Linux).
//! - [`IwlistProvider`]: wireless-tools' `iwlist` (Linux, usually root).
//! - [`NetshProvider`]: `netsh wlan` (Windows).
//!
//! [`ProviderKind::Auto`] picks Termux when its scan binary is on `PATH`,
//! netsh on Windows, then nmcli, then iwlist. An nmcli provider built by
//! [`create`] retries through iwlist when that is installed.

pub mod iwlist;
pub mod netsh;
pub mod nmcli;
pub mod termux;

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use bssidcast_core::ScanProvider;

pub use iwlist::{IWLIST_SOURCE_LABEL, IwlistProvider, parse_iwlist_output};
pub use netsh::{NETSH_SOURCE_LABEL, NetshProvider, parse_netsh_output};
pub use nmcli::{NMCLI_SOURCE_LABEL, NmcliProvider, parse_nmcli_output, percent_to_dbm};
pub use termux::{TERMUX_SCAN_BINARY, TERMUX_SOURCE_LABEL, TermuxProvider, parse_scan_info};

/// Which scanning tool to use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Best tool available on this host.
    #[default]
    Auto,
    /// Android via Termux:API.
    Termux,
    /// Linux via NetworkManager.
    Nmcli,
    /// Linux via wireless-tools.
    Iwlist,
    /// Windows via `netsh wlan`.
    Netsh,
}

impl ProviderKind {
    /// Resolve [`ProviderKind::Auto`] against the tools installed on this host.
    pub fn resolve(self) -> Self {
        self.resolve_with(|binary| find_in_path(binary).is_some(), cfg!(windows))
    }

    fn resolve_with(self, installed: impl Fn(&str) -> bool, windows: bool) -> Self {
        match self {
            Self::Auto if installed(TERMUX_SCAN_BINARY) => Self::Termux,
            Self::Auto if windows => Self::Netsh,
            Self::Auto if !installed("nmcli") && installed("iwlist") => Self::Iwlist,
            Self::Auto => Self::Nmcli,
            other => other,
        }
    }

    /// Label written to the `device` field of published snapshots.
    pub fn source_label(self) -> &'static str {
        match self.resolve() {
            Self::Termux | Self::Auto => TERMUX_SOURCE_LABEL,
            Self::Nmcli => NMCLI_SOURCE_LABEL,
            Self::Iwlist => IWLIST_SOURCE_LABEL,
            Self::Netsh => NETSH_SOURCE_LABEL,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Termux => "termux",
            Self::Nmcli => "nmcli",
            Self::Iwlist => "iwlist",
            Self::Netsh => "netsh",
        };
        f.write_str(name)
    }
}

/// Build the scan provider for `kind`.
///
/// `interface` restricts nmcli and iwlist to one wireless interface; Termux
/// and netsh ignore it.
pub fn create(kind: ProviderKind, interface: Option<String>) -> Arc<dyn ScanProvider> {
    match kind.resolve() {
        ProviderKind::Termux | ProviderKind::Auto => Arc::new(TermuxProvider::new()),
        ProviderKind::Nmcli => Arc::new(nmcli_provider(interface, find_in_path("iwlist").is_some())),
        ProviderKind::Iwlist => Arc::new(IwlistProvider::new(interface)),
        ProviderKind::Netsh => Arc::new(NetshProvider::new()),
    }
}

fn nmcli_provider(interface: Option<String>, iwlist_installed: bool) -> NmcliProvider {
    let provider = NmcliProvider::new(interface.clone());
    if iwlist_installed {
        provider.with_fallback(IwlistProvider::new(interface))
    } else {
        provider
    }
}

/// Locate an executable on `PATH`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Run a command to completion, killing it if it outlives `limit`.
///
/// A timeout surfaces as [`std::io::ErrorKind::TimedOut`].
pub(crate) async fn run_command<I, S>(
    program: &str,
    args: I,
    limit: Duration,
) -> std::io::Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(limit, child).await {
        Ok(output) => output,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{} timed out after {}s", program, limit.as_secs()),
        )),
    }
}
