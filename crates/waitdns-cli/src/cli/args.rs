//! Command-line argument definitions using clap.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use waitdns::{RecordType, WaitConfig};

/// Wait until a DNS record is served by every authoritative name server.
///
/// Finds the zone enclosing NAME, resolves all of its NS records and queries
/// each server directly until all of them return EXPECTED.
#[derive(Parser, Debug)]
#[command(name = "waitdns")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Name to check (e.g., _acme-challenge.example.com)
    pub name: String,

    /// Value every authoritative server must return
    pub expected: String,

    /// Record type to query
    #[arg(short = 't', long = "type", default_value = "TXT", value_parser = parse_record_type)]
    pub record_type: RecordType,

    /// TOML file with propagation settings
    #[arg(short, long, env = "WAITDNS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds to wait before re-checking a server
    #[arg(long)]
    pub propagation_seconds: Option<u64>,

    /// Retries per server before giving up (negative: retry forever)
    #[arg(long, allow_negative_numbers = true)]
    pub propagation_retry: Option<i64>,

    /// Grow the delay exponentially with each retry
    #[arg(long)]
    pub exponential_backoff_retry: bool,

    /// Base of the exponential backoff in seconds
    #[arg(long)]
    pub exponential_backoff_seconds: Option<u64>,

    /// Upper bound for a single delay in seconds
    #[arg(long)]
    pub max_delay_time: Option<u64>,

    /// Seconds before a single query is considered lost
    #[arg(long)]
    pub query_timeout: Option<u64>,

    /// Port the authoritative servers listen on
    #[arg(long)]
    pub dns_port: Option<u16>,

    /// Also check the IPv6 addresses of each name server
    #[arg(long)]
    pub ipv6: bool,

    /// Keep checking after the first server gives up and report all failures
    #[arg(long)]
    pub check_all: bool,

    /// Increase verbosity
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Override file settings with the flags given on the command line.
    pub fn apply(&self, config: &mut WaitConfig) {
        if let Some(seconds) = self.propagation_seconds {
            config.propagation_seconds = seconds;
        }
        if let Some(retry) = self.propagation_retry {
            config.propagation_retry = retry;
        }
        if self.exponential_backoff_retry {
            config.exponential_backoff_retry = true;
        }
        if let Some(seconds) = self.exponential_backoff_seconds {
            config.exponential_backoff_seconds = seconds;
        }
        if let Some(seconds) = self.max_delay_time {
            config.max_delay_time = Some(seconds);
        }
        if let Some(seconds) = self.query_timeout {
            config.query_timeout = seconds;
        }
        if let Some(port) = self.dns_port {
            config.dns_port = port;
        }
        if self.ipv6 {
            config.ipv6 = true;
        }
        if self.check_all {
            config.check_all = true;
        }
    }
}

fn parse_record_type(s: &str) -> Result<RecordType, String> {
    RecordType::from_str(&s.to_ascii_uppercase())
        .map_err(|e| format!("unknown record type {s:?}: {e}"))
}
