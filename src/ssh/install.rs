// ABOUTME: Idempotent authorized_keys installation command and output parsing.
// ABOUTME: The remote side distinguishes a fresh install from an already-present key.

use super::client::CommandOutput;
use crate::types::PublicKeyLine;

const ADDED_SENTINEL: &str = "Key added";
const EXISTS_SENTINEL: &str = "Key exists";
const STDERR_EXCERPT_CHARS: usize = 200;

/// Result of running the install command on the target host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The key line was appended to authorized_keys.
    Added,
    /// The exact key line was already present; nothing changed.
    AlreadyPresent,
    /// The command exited non-zero; carries a bounded stderr excerpt.
    RemoteCommandFailed(String),
}

/// POSIX shell single-quoting. Safe to embed in a remote command line.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Build the idempotent install command for one public key line: ensure
/// `~/.ssh` exists at mode 700, append the key and set authorized_keys to
/// mode 600 only when the exact line is not already present, and emit a
/// sentinel telling the two cases apart.
pub fn install_command(key: &PublicKeyLine) -> String {
    let quoted = shell_quote(key.as_str());
    format!(
        "mkdir -p ~/.ssh && chmod 700 ~/.ssh && \
         if ! grep -qF {quoted} ~/.ssh/authorized_keys 2>/dev/null; then \
         echo {quoted} >> ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys && \
         echo \"{ADDED_SENTINEL}\"; else echo \"{EXISTS_SENTINEL}\"; fi"
    )
}

/// Interpret the remote command output into an install outcome.
pub fn interpret_install_output(output: &CommandOutput) -> InstallOutcome {
    if !output.success() {
        return InstallOutcome::RemoteCommandFailed(truncate_chars(
            output.stderr.trim(),
            STDERR_EXCERPT_CHARS,
        ));
    }

    if output.stdout.to_lowercase().contains("exists") {
        InstallOutcome::AlreadyPresent
    } else {
        InstallOutcome::Added
    }
}

/// Truncate to a bounded number of characters, respecting UTF-8 boundaries.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Bounded excerpt of an unexpected error message shown to the user.
pub fn truncate_excerpt(value: &str) -> String {
    truncate_chars(value, 100)
}
