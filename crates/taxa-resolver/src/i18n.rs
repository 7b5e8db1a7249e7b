//! User-facing messages
//!
//! Every string shown to a user is a [`Message`] rendered against a [`Locale`]
//! that the caller passes in explicitly.

use std::path::PathBuf;

use crate::index::TaxonId;
use crate::service::Stage;

/// Languages with a message catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    German,
}

/// Locale used to render messages and numbers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Locale {
    tag: String,
    language: Language,
}

impl Locale {
    /// Parse a language tag such as `en`, `en-US`, `de_DE` or `de_DE.UTF-8`
    ///
    /// Unsupported languages fall back to English but keep their tag.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let language = match primary.as_str() {
            "de" => Language::German,
            _ => Language::English,
        };
        Self {
            tag: tag.to_string(),
            language,
        }
    }

    pub fn english() -> Self {
        Self::from_tag("en")
    }

    pub fn german() -> Self {
        Self::from_tag("de")
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Format an integer with the locale's thousands separator
    pub fn format_count(&self, value: u64) -> String {
        let separator = match self.language {
            Language::English => ',',
            Language::German => '.',
        };
        let digits = value.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(separator);
            }
            out.push(ch);
        }
        out
    }
}

/// Status messages emitted while resolving
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Connecting { host: String },
    UsingCache { path: PathBuf },
    Downloading { path: String },
    DownloadProgress { received: u64, total: Option<u64> },
    Retrying { attempt: u32, max: u32 },
    Extracting { entry: String },
    Parsing { entry: String },
    IndexReady { taxa: usize },
    Querying { taxon: TaxonId },
    Done { taxon: TaxonId, count: usize },
    Failed { stage: Stage },
    Cancelled,
}

impl Message {
    pub fn render(&self, locale: &Locale) -> String {
        match locale.language() {
            Language::English => self.render_english(locale),
            Language::German => self.render_german(locale),
        }
    }

    fn render_english(&self, locale: &Locale) -> String {
        match self {
            Message::Connecting { host } => format!("Connecting to {}", host),
            Message::UsingCache { path } => format!("Using cached archive {}", path.display()),
            Message::Downloading { path } => format!("Downloading {}", path),
            Message::DownloadProgress { received, total: Some(total) } => format!(
                "Downloaded {} of {} bytes",
                locale.format_count(*received),
                locale.format_count(*total)
            ),
            Message::DownloadProgress { received, total: None } => {
                format!("Downloaded {} bytes", locale.format_count(*received))
            },
            Message::Retrying { attempt, max } => {
                format!("Attempt {} of {} failed, retrying", attempt, max)
            },
            Message::Extracting { entry } => format!("Extracting {}", entry),
            Message::Parsing { entry } => format!("Reading taxonomy from {}", entry),
            Message::IndexReady { taxa } => {
                format!("Indexed {} taxa", locale.format_count(*taxa as u64))
            },
            Message::Querying { taxon } => format!("Collecting descendants of taxon {}", taxon),
            Message::Done { taxon, count } => format!(
                "Taxon {} has {} descendants",
                taxon,
                locale.format_count(*count as u64)
            ),
            Message::Failed { stage } => format!("Failed while {}", stage),
            Message::Cancelled => "Cancelled".to_string(),
        }
    }

    fn render_german(&self, locale: &Locale) -> String {
        match self {
            Message::Connecting { host } => format!("Verbinde mit {}", host),
            Message::UsingCache { path } => {
                format!("Verwende zwischengespeichertes Archiv {}", path.display())
            },
            Message::Downloading { path } => format!("Lade {} herunter", path),
            Message::DownloadProgress { received, total: Some(total) } => format!(
                "{} von {} Bytes heruntergeladen",
                locale.format_count(*received),
                locale.format_count(*total)
            ),
            Message::DownloadProgress { received, total: None } => {
                format!("{} Bytes heruntergeladen", locale.format_count(*received))
            },
            Message::Retrying { attempt, max } => {
                format!("Versuch {} von {} fehlgeschlagen, neuer Versuch", attempt, max)
            },
            Message::Extracting { entry } => format!("Entpacke {}", entry),
            Message::Parsing { entry } => format!("Lese Taxonomie aus {}", entry),
            Message::IndexReady { taxa } => {
                format!("{} Taxa indiziert", locale.format_count(*taxa as u64))
            },
            Message::Querying { taxon } => format!("Sammle Nachfahren von Taxon {}", taxon),
            Message::Done { taxon, count } => format!(
                "Taxon {} hat {} Nachfahren",
                taxon,
                locale.format_count(*count as u64)
            ),
            Message::Failed { stage } => format!("Fehlgeschlagen {}", german_stage(*stage)),
            Message::Cancelled => "Abgebrochen".to_string(),
        }
    }
}

/// Stage as the object of "Fehlgeschlagen ..."
fn german_stage(stage: Stage) -> &'static str {
    match stage {
        Stage::Idle => "vor dem Start",
        Stage::Connecting => "beim Verbinden",
        Stage::Downloading => "beim Herunterladen",
        Stage::Extracting => "beim Entpacken",
        Stage::Parsing => "beim Einlesen",
        Stage::Ready => "nach dem Indizieren",
        Stage::Querying => "bei der Abfrage",
        Stage::Done => "nach dem Abschluss",
        Stage::Failed => "nach einem Fehler",
    }
}
