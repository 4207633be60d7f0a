use whatlang::{Lang, detect};

use crate::extractor::model::Classification;

/// One entry of a classifier's ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    pub language: String,
    pub probability: f64,
}

/// Language identification capability consumed by the extractor.
#[cfg_attr(test, mockall::automock)]
pub trait LanguageClassifier: Send + Sync {
    /// Guesses ordered by descending probability; empty when nothing fits.
    fn classify(&self, text: &str) -> Vec<LanguageGuess>;
}

/// Top-ranked guess of `classifier`, if any. Lower ranks are never consulted.
pub fn top_classification(classifier: &dyn LanguageClassifier, text: &str) -> Option<Classification> {
    classifier
        .classify(text)
        .into_iter()
        .next()
        .map(|guess| Classification {
            language: guess.language,
            confidence: guess.probability,
        })
}

/// Trigram classifier backed by `whatlang`. Reports ISO 639-1 codes where
/// one exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangClassifier;

impl LanguageClassifier for WhatlangClassifier {
    fn classify(&self, text: &str) -> Vec<LanguageGuess> {
        match detect(text) {
            Some(info) => vec![LanguageGuess {
                language: lang_to_code(info.lang()),
                probability: info.confidence(),
            }],
            None => Vec::new(),
        }
    }
}

fn lang_to_code(lang: Lang) -> String {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Ces => "cs",
        Lang::Slk => "sk",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        Lang::Hun => "hu",
        Lang::Ron => "ro",
        Lang::Bul => "bg",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Slv => "sl",
        Lang::Tur => "tr",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Nob => "nb",
        Lang::Fin => "fi",
        Lang::Est => "et",
        Lang::Lav => "lv",
        Lang::Lit => "lt",
        Lang::Ell => "el",
        Lang::Heb => "he",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Tha => "th",
        Lang::Vie => "vi",
        other => return other.code().to_string(),
    };
    code.to_string()
}
