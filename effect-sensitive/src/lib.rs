//! A value whose contents must never reach a log line, an error message, or
//! a serialized payload.
//!
//! `Sensitive<T>` has exactly one way out: [`Sensitive::reveal`]. Every other
//! trait impl (`Debug`, `Display`) is written by hand to print a fixed
//! placeholder, so adding a field to `T` can never make it accidentally
//! loggable, and formatting a sensitive value is never a type error you can
//! silently work around with `#[derive(Debug)]`.

use std::fmt;

/// Placeholder text shown wherever a `Sensitive<T>` would otherwise be
/// formatted.
const REDACTED: &str = "<sensitive>";

/// Opaque container for secret material (tokens, decrypted secret data).
///
/// `T` is never exposed except through [`reveal`](Sensitive::reveal),
/// [`map`](Sensitive::map), or the free function [`pivot_option`].
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    /// Wrap a value as sensitive. The only legitimate entry point.
    pub fn wrap(value: T) -> Self {
        Sensitive(value)
    }

    /// Extract the inner value. Callers take on the obligation not to let it
    /// escape into logs, errors, or serialized output.
    pub fn reveal(self) -> T {
        self.0
    }

    /// Borrow the inner value without consuming the wrapper.
    pub fn reveal_ref(&self) -> &T {
        &self.0
    }

    /// Apply `f` to the revealed value, re-wrapping the result.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sensitive<U> {
        Sensitive(f(self.0))
    }

    /// Fallible variant of [`map`](Sensitive::map).
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Sensitive<U>, E> {
        Ok(Sensitive(f(self.0)?))
    }
}

impl<T: Clone> Clone for Sensitive<T> {
    fn clone(&self) -> Self {
        Sensitive(self.0.clone())
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> Sensitive<Option<T>> {
    /// Turn a `Sensitive<Option<T>>` into an `Option<Sensitive<T>>`.
    ///
    /// `None` carries no secret material, so it is fine for the absence
    /// itself to be visible; only a present value stays wrapped.
    pub fn pivot_option(self) -> Option<Sensitive<T>> {
        self.0.map(Sensitive)
    }
}

#[cfg(feature = "serde")]
impl<T> serde::Serialize for Sensitive<T> {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(serde::ser::Error::custom(
            "refusing to serialize a Sensitive value",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_roundtrips_the_value() {
        let s = Sensitive::wrap("top-secret".to_string());
        assert_eq!(s.reveal(), "top-secret");
    }

    #[test]
    fn debug_and_display_never_print_contents() {
        let s = Sensitive::wrap("top-secret".to_string());
        assert_eq!(format!("{s:?}"), REDACTED);
        assert_eq!(format!("{s}"), REDACTED);
    }

    #[test]
    fn map_transforms_the_wrapped_value() {
        let s = Sensitive::wrap(40);
        let mapped = s.map(|n| n + 2);
        assert_eq!(mapped.reveal(), 42);
    }

    #[test]
    fn pivot_option_distributes_the_wrapper() {
        let some: Sensitive<Option<i32>> = Sensitive::wrap(Some(42));
        let none: Sensitive<Option<i32>> = Sensitive::wrap(None);

        assert_eq!(some.pivot_option().map(Sensitive::reveal), Some(42));
        assert!(none.pivot_option().is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializing_a_sensitive_value_fails() {
        let s = Sensitive::wrap("top-secret".to_string());
        let err = serde_json::to_string(&s).unwrap_err();
        assert!(err.to_string().contains("refusing"));
    }
}
