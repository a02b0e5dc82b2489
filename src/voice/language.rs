//! Supported vocabulary languages

use std::fmt;
use std::str::FromStr;

use super::ErrorKind;

/// Language the trainer speaks and listens in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// English (`en-US`)
    #[default]
    English,
    /// Spanish (`es-ES`)
    Spanish,
}

impl Language {
    /// Every supported language
    pub const ALL: [Self; 2] = [Self::English, Self::Spanish];

    /// Short language code
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
        }
    }

    /// Locale tag handed to the engines
    #[must_use]
    pub const fn locale(self) -> &'static str {
        match self {
            Self::English => "en-US",
            Self::Spanish => "es-ES",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ErrorKind;

    /// Accepts `en`, `es` and region-qualified tags such as `en-US` or `es_mx`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match primary.as_str() {
            "en" => Ok(Self::English),
            "es" => Ok(Self::Spanish),
            _ => Err(ErrorKind::LanguageUnsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codes_and_tags() {
        assert_eq!("en".parse::<Language>(), Ok(Language::English));
        assert_eq!("EN-us".parse::<Language>(), Ok(Language::English));
        assert_eq!(" es_MX ".parse::<Language>(), Ok(Language::Spanish));
        assert_eq!("es-ES".parse::<Language>(), Ok(Language::Spanish));
    }

    #[test]
    fn test_parse_rejects_other_languages() {
        assert_eq!("fr".parse::<Language>(), Err(ErrorKind::LanguageUnsupported));
        assert_eq!("".parse::<Language>(), Err(ErrorKind::LanguageUnsupported));
        assert_eq!("english".parse::<Language>(), Err(ErrorKind::LanguageUnsupported));
    }

    #[test]
    fn test_locale_tags() {
        assert_eq!(Language::English.locale(), "en-US");
        assert_eq!(Language::Spanish.locale(), "es-ES");
        assert_eq!(Language::Spanish.to_string(), "es");
    }
}
