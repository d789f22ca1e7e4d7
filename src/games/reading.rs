//! Reading-aloud scoring: how closely a transcript matches the sentence the
//! child was asked to read.

use serde::Serialize;

use super::round_half_up;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResult {
    pub sentence: String,
    pub user_speech: String,
    pub accuracy: u32,
    pub suggestion: &'static str,
    pub status: ReadingStatus,
}

const HIGH_DIFFICULTY: &str = "Reading was difficult. A higher likelihood of dyslexia; consider a specialist assessment.";
const MILD_DIFFICULTY: &str = "Mild difficulty. Further checking is advisable.";
const READING_FINE: &str = "Reading is fine. Low likelihood of dyslexia.";
const NOT_UNDERSTOOD: &str = "The recording could not be understood. Please record again.";

/// Lowercase, split on anything that is not alphanumeric, sort, rejoin.
fn sorted_tokens(s: &str) -> Vec<char> {
    let lowered = s.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ").chars().collect()
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { cur[j].max(prev[j + 1]) };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Word-order-insensitive similarity in `0..=100`.
pub fn token_sort_ratio(a: &str, b: &str) -> u32 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    let total = a.len() + b.len();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let matched = lcs_len(&a, &b);
    round_half_up(2.0 * matched as f64 / total as f64 * 100.0) as u32
}

pub fn suggestion(accuracy: u32) -> &'static str {
    if accuracy < 70 {
        HIGH_DIFFICULTY
    } else if accuracy < 85 {
        MILD_DIFFICULTY
    } else {
        READING_FINE
    }
}

/// Score `transcript` against `sentence`. An empty transcript is an error
/// result rather than a zero score.
pub fn assess(sentence: &str, transcript: &str) -> ReadingResult {
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return ReadingResult {
            sentence: sentence.to_string(),
            user_speech: String::new(),
            accuracy: 0,
            suggestion: NOT_UNDERSTOOD,
            status: ReadingStatus::Error,
        };
    }
    let accuracy = token_sort_ratio(sentence, transcript);
    ReadingResult {
        sentence: sentence.to_string(),
        user_speech: transcript.to_string(),
        accuracy,
        suggestion: suggestion(accuracy),
        status: ReadingStatus::Success,
    }
}
