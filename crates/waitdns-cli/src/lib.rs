//! # waitdns-cli
//!
//! Command-line front end for the `waitdns` propagation checker.
//!
//! Typical use is from a certificate client hook, right after the challenge
//! record was submitted:
//!
//! ```text
//! waitdns _acme-challenge.example.com "$CERTBOT_VALIDATION" \
//!     --propagation-seconds 10 --propagation-retry 30
//! ```
//!
//! The exit status is non-zero unless every authoritative server serves the
//! expected value.

pub mod cli;

pub use cli::run;
