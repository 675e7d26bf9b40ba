// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Validation happens at construction so the rest of the code trusts the values.

mod public_key;
mod session_id;
mod target;

pub use public_key::{PublicKeyError, PublicKeyLine};
pub use session_id::SessionId;
pub use target::{Target, TargetError};
