//! Current-language source consumed by the query client.

use std::sync::RwLock;

/// Supplies the language used to pick the synopsis column.
pub trait LocaleSource: Send + Sync {
    /// Lower-case ISO 639-1 code, e.g. "en".
    fn language(&self) -> String;
}

/// In-memory language setting that can be swapped at runtime.
#[derive(Debug)]
pub struct StaticLocale {
    language: RwLock<String>,
}

impl StaticLocale {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: RwLock::new(language.into()),
        }
    }

    /// Replace the current language.
    pub fn set(&self, language: impl Into<String>) {
        match self.language.write() {
            Ok(mut guard) => *guard = language.into(),
            Err(poisoned) => *poisoned.into_inner() = language.into(),
        }
    }
}

impl Default for StaticLocale {
    fn default() -> Self {
        Self::new("en")
    }
}

impl LocaleSource for StaticLocale {
    fn language(&self) -> String {
        match self.language.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_english() {
        assert_eq!(StaticLocale::default().language(), "en");
    }

    #[test]
    fn test_set_language() {
        let locale = StaticLocale::new("en");
        locale.set("es");
        assert_eq!(locale.language(), "es");
    }
}
