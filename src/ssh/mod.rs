// ABOUTME: SSH provisioning client for installing public keys on remote hosts.
// ABOUTME: Password and keyboard-interactive auth only, delegated to an Authenticator.

mod client;
mod error;
mod install;

pub use client::{ClientSettings, CommandOutput, provision};
pub use error::{Error, Result};
pub use install::{
    InstallOutcome, install_command, interpret_install_output, shell_quote, truncate_excerpt,
};
