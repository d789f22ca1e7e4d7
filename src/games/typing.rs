//! Typing-practice content: per-band prompts for the text generator, the
//! cleanup applied to its reply, and canned texts for when it fails.

use rand_core::{OsRng, RngCore};
use serde::Serialize;
use tracing::warn;

use super::difficulty::{AgeBand, Level};
use crate::llm::LlmProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypingText {
    pub text: String,
    pub level: Level,
    pub source: TextSource,
}

pub fn fallback_texts(level: Level) -> &'static [&'static str] {
    match level {
        Level::Letters => &["A B C 1 2 3", "X Y Z 4 5 6", "M N O 7 8 9"],
        Level::Simple => &["The cat sat on the mat.", "I like to play outside.", "My dog is very happy."],
        Level::Poems => &[
            "Twinkle twinkle little star",
            "Mary had a little lamb",
            "Humpty Dumpty sat on a wall",
        ],
        Level::Intermediate => &[
            "The quick brown fox jumps over the lazy dog.",
            "Pack my box with five dozen liquor jugs.",
        ],
        Level::Advanced => &["The juxtaposition of complex ideas creates cognitive dissonance in many readers."],
    }
}

/// Generator instruction for `level` in `band`. Levels a band does not use
/// get that band's general-purpose prompt.
pub fn prompt(band: AgeBand, level: Level) -> &'static str {
    match (band, level) {
        (AgeBand::FiveToSeven, Level::Letters) => {
            "Output exactly three uppercase letters and three digits, all separated by spaces, \
             like \"A B C 1 2 3\". Output nothing else."
        }
        (AgeBand::FiveToSeven, Level::Simple) => {
            "Output five to seven short, simple words separated by spaces, like \
             \"cat dog run jump sun\". Output nothing else."
        }
        (AgeBand::FiveToSeven, _) => {
            "Output alternating letters and digits separated by spaces, like \"A 1 B 2 C 3\". \
             No explanation."
        }
        (AgeBand::EightToTen, Level::Simple) => {
            "Write one new riddle sentence for typing practice for 8-10 year olds. Use simple \
             words, stay under 10 words and return only the sentence without numbering."
        }
        (AgeBand::EightToTen, Level::Intermediate) => {
            "Write one meaningful typing-practice sentence of 10-15 words for 8-10 year olds \
             with slightly richer vocabulary, for example: 'Children enjoy playing outside when \
             the weather is nice and sunny.'"
        }
        (AgeBand::EightToTen, _) => {
            "Write a typing exercise of 10-15 words for 8-10 year olds, for example: 'My \
             favorite subjects in school are math and science because they are interesting.'"
        }
        (AgeBand::ElevenToTwelve, Level::Poems) => {
            "Give one short line of 10-15 words from a children's poem or rhyme suitable for \
             typing practice for 11-12 year olds, for example: 'Twinkle twinkle little star how \
             I wonder what you are'"
        }
        (AgeBand::ElevenToTwelve, Level::Intermediate) => {
            "Give one interesting fact of 15-20 words for 11-12 year olds to type, with slightly \
             complex vocabulary, for example: 'The solar system consists of eight planets that \
             orbit around the sun in elliptical paths.'"
        }
        (AgeBand::ElevenToTwelve, Level::Advanced) => {
            "Write one challenging sentence of more than 20 words for 11-12 year olds to type, \
             using complex vocabulary and ideas, for example: 'Quantum mechanics demonstrates \
             that particles can exist in multiple states simultaneously until they are observed.'"
        }
        (AgeBand::ElevenToTwelve, _) => {
            "Write a typing exercise of 15-20 words for 11-12 year olds, for example: \
             'Photosynthesis is the process by which plants convert sunlight into energy.'"
        }
    }
}

/// Drop double quotes, turn newlines into spaces, collapse whitespace.
pub fn clean_generated_text(raw: &str) -> String {
    raw.replace('"', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A random canned text for `level`.
pub fn random_fallback(level: Level) -> &'static str {
    let texts = fallback_texts(level);
    let idx = OsRng.next_u32() as usize % texts.len();
    texts[idx]
}

/// Ask `llm` for a text; any failure or an empty reply yields a fallback.
pub async fn generate(llm: &LlmProvider, band: AgeBand, level: Level) -> TypingText {
    match llm.complete(prompt(band, level)).await {
        Ok(raw) => {
            let text = clean_generated_text(&raw);
            if !text.is_empty() {
                return TypingText { text, level, source: TextSource::Generated };
            }
            warn!(band = %band, level = %level, "text generator returned nothing usable");
        }
        Err(e) => warn!(band = %band, level = %level, error = %e, "text generation failed"),
    }
    TypingText { text: random_fallback(level).to_string(), level, source: TextSource::Fallback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;

    #[test]
    fn cleanup_strips_quotes_and_whitespace() {
        assert_eq!(clean_generated_text("  \"Hello\n  world\"\t! "), "Hello world !");
        assert_eq!(clean_generated_text("\"\"\n"), "");
    }

    #[test]
    fn every_level_has_fallbacks() {
        for level in [Level::Letters, Level::Simple, Level::Poems, Level::Intermediate, Level::Advanced] {
            let text = random_fallback(level);
            assert!(fallback_texts(level).contains(&text));
        }
    }

    #[test]
    fn bands_have_distinct_prompts() {
        assert_ne!(
            prompt(AgeBand::FiveToSeven, Level::Letters),
            prompt(AgeBand::FiveToSeven, Level::Simple)
        );
        assert_eq!(
            prompt(AgeBand::EightToTen, Level::Poems),
            prompt(AgeBand::EightToTen, Level::Advanced)
        );
    }

    #[tokio::test]
    async fn generated_text_is_cleaned() {
        let llm = LlmProvider::Dummy(DummyProvider);
        let out = generate(&llm, AgeBand::EightToTen, Level::Simple).await;
        assert_eq!(out.source, TextSource::Generated);
        assert!(!out.text.contains('"'));
        assert_eq!(out.level, Level::Simple);
    }
}
