use std::fmt;

use zeroize::Zeroizing;

/// The master password as typed into the unlock form.
///
/// Backing memory is zeroed whenever the value is cleared or dropped, and
/// `Debug` never prints the contents.
#[derive(Default)]
pub struct Secret {
    value: Zeroizing<String>,
}

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
        }
    }

    /// Replaces the field contents, zeroing the previous buffer.
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = Zeroizing::new(value.into());
    }

    /// Appends typed input. The value moves to a fresh buffer so the old one
    /// is zeroed on drop rather than freed by a reallocation.
    pub fn push_str(&mut self, input: &str) {
        let mut grown = Zeroizing::new(String::with_capacity(self.value.len() + input.len()));
        grown.push_str(&self.value);
        grown.push_str(input);
        self.value = grown;
    }

    pub fn clear(&mut self) {
        self.value = Zeroizing::new(String::new());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// True for empty or whitespace-only input.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub(crate) fn expose(&self) -> &str {
        self.value.as_str()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Clears the borrowed secret when dropped, so every exit from an unlock
/// attempt (return, `?`, panic, or the future being dropped) wipes it.
pub(crate) struct ClearOnDrop<'a>(pub(crate) &'a mut Secret);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}
