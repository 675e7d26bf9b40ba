// ABOUTME: Prompt strings shown by the flow.
// ABOUTME: Plain text only; transports own all presentation and markup.

use crate::digest::HashAlgorithm;
use crate::types::Target;

pub const WELCOME: &str =
    "Crypto key generator. I generate SSH keys and deploy them to your servers.";

pub const HELP: &str = "What I can do:\n\
     - generate RSA-4096 or Ed25519 SSH keypairs, optionally passphrase-encrypted,\n\
       delivered in OpenSSH and PKCS#8 formats\n\
     - deploy a public key to a server over SSH (password and 2FA supported);\n\
       the key is appended to ~/.ssh/authorized_keys with the right permissions\n\
     - compute text digests: MD5, SHA-1, SHA-256, SHA-512, BLAKE2b\n\
     Private keys are never stored; messages with secrets are deleted.";

pub const MAIN_MENU: &str = "Main menu: /ssh - SSH keys, /hash - digests, /help - help.";

pub const SSH_MENU: &str = "SSH keys: /generate - new keypair, \
     /export - deploy an existing public key, /menu - main menu.";

pub const CHOOSE_KEY_TYPE: &str =
    "Choose a key type: /rsa - RSA (4096-bit), /ed25519 - Ed25519, /ssh - back.";

pub const ASK_PASSPHRASE: &str = "Enter a passphrase to encrypt the private key (recommended), \
     or /nopass to generate without one.";

pub const GENERATING: &str = "Generating the keypair...";

pub const GENERATION_FAILED: &str = "Key generation failed. Nothing was stored; try again.";

pub const WEAK_ENCRYPTION_WARNING: &str = "Warning: passphrase encryption is unavailable; \
     the private key is delivered unencrypted.";

pub const PASSPHRASE_NOTICE: &str =
    "The private key is protected by your passphrase. Don't lose it.";

pub const UNENCRYPTED_NOTICE: &str =
    "The private key is NOT encrypted. Store it somewhere safe.";

pub const SEND_PUBLIC_KEY: &str = "Send your public SSH key \
     (the contents of the .pub file, starting with ssh-rsa or ssh-ed25519).";

pub const PUBLIC_KEY_ACCEPTED: &str = "Public key accepted. \
     Now send the server to deploy to, as user@host (for example root@192.168.1.100).";

pub const PUBLIC_KEY_REJECTED: &str = "That does not look like a public SSH key. \
     Make sure you copied the .pub file contents (ssh-rsa or ssh-ed25519). Try again.";

pub const SEND_SERVER_INFO: &str =
    "Send the server to deploy to, as user@host (for example root@192.168.1.100).";

pub const TARGET_REJECTED: &str =
    "Invalid format. Use user@host, for example root@192.168.1.100 or ubuntu@server.com.";

pub const SESSION_LOST: &str = "Session data was lost; starting over.";

pub const CANCELLED: &str = "Cancelled.";

pub const UNEXPECTED_FAILURE: &str = "Something went wrong. The flow was reset; try again.";

pub const HASH_MENU: &str =
    "Digests: /calc - compute a hash, /info - algorithm notes, /menu - main menu.";

pub const CHOOSE_HASH_ALGORITHM: &str = "Choose an algorithm: \
     /md5, /sha1, /sha256, /sha512, /blake2b - or /hash to go back.";

pub const HASH_INFO: &str = "Algorithm notes:\n\
     MD5: 128-bit, legacy, integrity checks only\n\
     SHA-1: 160-bit, legacy, not for cryptography\n\
     SHA-256: 256-bit, the usual default\n\
     SHA-512: 512-bit\n\
     BLAKE2b: 512-bit, fast and modern\n\
     Recommended: SHA-256 or BLAKE2b.";

pub fn keys_ready(label: &str) -> String {
    format!("Export the {label} key to a server? /server - deploy it, /ssh - back to the SSH menu.")
}

pub fn hash_input(algorithm: HashAlgorithm) -> String {
    format!(
        "Send the text to hash with {}. The digest is lowercase hex.",
        algorithm.name()
    )
}

pub fn hash_result(algorithm: HashAlgorithm, digest: &str, input_chars: usize) -> String {
    format!(
        "{}: {digest}\nInput length: {input_chars} characters.",
        algorithm.name()
    )
}

pub fn connecting(target: &Target) -> String {
    format!(
        "Connecting to {target}. Check the server fingerprint if this is the first connection."
    )
}

pub fn ask_password(target: &Target) -> String {
    format!(
        "Password for {target} (this message and your reply will be deleted; \
         reply 'cancel' to abort):"
    )
}

pub fn authenticating(target: &Target) -> String {
    format!("Authenticating to {target}...")
}
