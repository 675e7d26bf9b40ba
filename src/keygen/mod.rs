// ABOUTME: Keypair generation and serialization for SSH provisioning.
// ABOUTME: Produces OpenSSH and PKCS#8 private encodings plus the OpenSSH public line.

mod error;

pub use error::{Error, Result};

use ed25519_dalek::SigningKey;
use pkcs8::EncodePrivateKey;
use rand::rngs::ThreadRng;
use ssh_key::private::{Ed25519Keypair, KeypairData, RsaKeypair};
use ssh_key::{LineEnding, PrivateKey};
use zeroize::Zeroizing;

/// Supported key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA with a 4096-bit modulus and public exponent 65537.
    Rsa4096,
    /// Ed25519 (fixed parameters).
    Ed25519,
}

impl KeyKind {
    pub fn label(&self) -> &'static str {
        match self {
            KeyKind::Rsa4096 => "RSA (4096-bit)",
            KeyKind::Ed25519 => "Ed25519",
        }
    }

    /// Filename stem used when delivering the private key documents.
    pub fn file_stem(&self) -> &'static str {
        match self {
            KeyKind::Rsa4096 => "id_rsa_4096",
            KeyKind::Ed25519 => "id_ed25519",
        }
    }
}

/// The three canonical serializations of a freshly generated keypair.
///
/// Private material lives only inside this value; dropping it is the
/// intended way to discard the key after delivery.
pub struct GeneratedKey {
    pub private_openssh: Zeroizing<String>,
    pub private_pkcs8: Zeroizing<String>,
    pub public_openssh: String,
    /// True when a passphrase was supplied but the encryption layer refused
    /// it and the private encodings fell back to plaintext.
    pub weak_encryption: bool,
}

/// Generate a keypair and serialize it.
///
/// A non-empty `passphrase` encrypts both private encodings. If the
/// underlying encryption primitive fails, the key is serialized unencrypted
/// and `weak_encryption` is set so the caller can warn the user.
///
/// CPU-bound (RSA-4096 notably so); callers on an async runtime should wrap
/// this in `spawn_blocking`.
pub fn generate(kind: KeyKind, passphrase: Option<&str>) -> Result<GeneratedKey> {
    let mut rng = rand::thread_rng();

    let keypair = match kind {
        KeyKind::Rsa4096 => {
            KeypairData::from(RsaKeypair::random(&mut rng, 4096).map_err(Error::Generate)?)
        }
        KeyKind::Ed25519 => KeypairData::from(Ed25519Keypair::random(&mut rng)),
    };
    let private = PrivateKey::new(keypair, "").map_err(Error::Generate)?;

    let public_openssh = private
        .public_key()
        .to_openssh()
        .map_err(Error::Serialize)?;

    let passphrase = passphrase.filter(|p| !p.is_empty());
    let mut weak_encryption = false;

    let private_openssh = match passphrase {
        Some(phrase) => match private.encrypt(&mut rng, phrase) {
            Ok(encrypted) => encrypted.to_openssh(LineEnding::LF).map_err(Error::Serialize)?,
            Err(err) => {
                tracing::warn!("OpenSSH private key encryption unavailable: {err}");
                weak_encryption = true;
                private.to_openssh(LineEnding::LF).map_err(Error::Serialize)?
            }
        },
        None => private.to_openssh(LineEnding::LF).map_err(Error::Serialize)?,
    };

    // Keep both encodings consistent: once the OpenSSH side fell back to
    // plaintext, do not emit an encrypted PKCS#8 the user cannot pair with it.
    let effective = if weak_encryption { None } else { passphrase };
    let (private_pkcs8, pkcs8_fell_back) = pkcs8_pem(&private, effective, &mut rng)?;
    weak_encryption = weak_encryption || pkcs8_fell_back;

    Ok(GeneratedKey {
        private_openssh,
        private_pkcs8,
        public_openssh,
        weak_encryption,
    })
}

/// PKCS#8 PEM encoding of the private key, optionally passphrase-encrypted.
/// Returns the PEM and whether encryption fell back to plaintext.
fn pkcs8_pem(
    private: &PrivateKey,
    passphrase: Option<&str>,
    rng: &mut ThreadRng,
) -> Result<(Zeroizing<String>, bool)> {
    match private.key_data() {
        KeypairData::Rsa(keypair) => {
            let key = rsa::RsaPrivateKey::try_from(keypair).map_err(Error::Convert)?;
            encode_pkcs8(&key, passphrase, rng)
        }
        KeypairData::Ed25519(keypair) => {
            let key = SigningKey::from_bytes(&keypair.private.to_bytes());
            encode_pkcs8(&key, passphrase, rng)
        }
        _ => Err(Error::UnsupportedKeyData),
    }
}

fn encode_pkcs8<K: EncodePrivateKey>(
    key: &K,
    passphrase: Option<&str>,
    rng: &mut ThreadRng,
) -> Result<(Zeroizing<String>, bool)> {
    if let Some(phrase) = passphrase {
        match key.to_pkcs8_encrypted_pem(&mut *rng, phrase.as_bytes(), pkcs8::LineEnding::LF) {
            Ok(pem) => return Ok((pem, false)),
            Err(err) => {
                tracing::warn!("PKCS#8 private key encryption unavailable: {err}");
            }
        }
    }

    let pem = key
        .to_pkcs8_pem(pkcs8::LineEnding::LF)
        .map_err(Error::Pkcs8)?;
    Ok((pem, passphrase.is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_public_line_has_algorithm_prefix() {
        let generated = generate(KeyKind::Ed25519, None).unwrap();
        assert!(generated.public_openssh.starts_with("ssh-ed25519 "));
        assert!(!generated.weak_encryption);
    }

    #[test]
    fn empty_passphrase_means_no_encryption() {
        let generated = generate(KeyKind::Ed25519, Some("")).unwrap();
        let parsed = PrivateKey::from_openssh(generated.private_openssh.as_str()).unwrap();
        assert!(!parsed.is_encrypted());
        assert!(!generated.weak_encryption);
    }

    #[test]
    fn labels_and_file_stems() {
        assert_eq!(KeyKind::Rsa4096.label(), "RSA (4096-bit)");
        assert_eq!(KeyKind::Ed25519.file_stem(), "id_ed25519");
    }
}
