// ABOUTME: Error types for key generation and serialization.
// ABOUTME: Covers generation, encoding, and cross-crate key conversion failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key generation failed: {0}")]
    Generate(#[source] ssh_key::Error),

    #[error("private key serialization failed: {0}")]
    Serialize(#[source] ssh_key::Error),

    #[error("key conversion failed: {0}")]
    Convert(#[source] ssh_key::Error),

    #[error("PKCS#8 serialization failed: {0}")]
    Pkcs8(#[source] pkcs8::Error),

    #[error("generated key data has no supported serialization")]
    UnsupportedKeyData,
}

pub type Result<T> = std::result::Result<T, Error>;
