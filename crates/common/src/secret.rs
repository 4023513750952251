//! Wrapper for transient plaintext credential material
//!
//! Decrypted wallet payloads and derived keys live inside `Secret` between
//! decryption and use. The wrapper redacts itself in logs and zeroizes the
//! buffer when dropped, so plaintext never outlives the caller's scope.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value, redacted in Debug/Display and zeroized on drop
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the plaintext (keep the borrow short)
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn expose_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Zeroize> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let secret = Secret::new(String::from("abandon abandon about"));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn exposes_plaintext_bytes() {
        let secret: Secret<Vec<u8>> = b"wallet material".to_vec().into();
        assert_eq!(secret.expose().as_slice(), b"wallet material");
    }

    #[test]
    fn expose_mut_allows_in_place_edits() {
        let mut key = Secret::new([0u8; 32]);
        key.expose_mut()[0] = 7;
        assert_eq!(key.expose()[0], 7);
    }

    #[test]
    fn clone_is_independent_and_redacted() {
        let original = Secret::new(vec![1u8, 2, 3]);
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.expose(), &vec![1u8, 2, 3]);
        assert_eq!(format!("{copy:?}"), "[REDACTED]");
    }
}
