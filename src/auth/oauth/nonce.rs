//! Handshake nonces.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;

/// Single-use random token carried as the OAuth `state` parameter.
///
/// The value is secret until the callback consumes it, so it has no
/// `Display` implementation and `Debug` masks it. Use [`AsRef::as_ref`] to
/// place it in the authorization URL or a store key.
///
/// # Example
///
/// ```rust
/// use vat_exempt::auth::oauth::Nonce;
///
/// let nonce = Nonce::generate();
/// assert_eq!(nonce.as_ref().len(), 32);
/// assert_eq!(format!("{nonce:?}"), "Nonce(*****)");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    const LENGTH: usize = 32;

    /// Generates a fresh nonce from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let value = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::LENGTH)
            .map(char::from)
            .collect();
        Self(value)
    }
}

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(*****)")
    }
}

// Verify Nonce is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Nonce>();
};
