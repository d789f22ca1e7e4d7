//! Adaptive difficulty for the typing game.
//!
//! Each age band has its own tiers, starting tier and timer. After every
//! finished text the tracker folds the segment's accuracy and speed into a
//! running mean and moves between tiers on fixed thresholds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "5-7")]
    FiveToSeven,
    #[serde(rename = "8-10")]
    EightToTen,
    #[serde(rename = "11-12")]
    ElevenToTwelve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Letters,
    Simple,
    Poems,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Letters => "letters",
            Level::Simple => "simple",
            Level::Poems => "poems",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "letters" => Ok(Level::Letters),
            "simple" => Ok(Level::Simple),
            "poems" => Ok(Level::Poems),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            other => Err(ParseError { kind: "level", value: other.to_string() }),
        }
    }
}

/// Thresholds a session must beat for the countdown to speed up.
#[derive(Debug, Clone, Copy)]
struct Acceleration {
    accuracy: f64,
    wpm: f64,
}

impl AgeBand {
    pub fn as_str(self) -> &'static str {
        match self {
            AgeBand::FiveToSeven => "5-7",
            AgeBand::EightToTen => "8-10",
            AgeBand::ElevenToTwelve => "11-12",
        }
    }

    pub fn initial_level(self) -> Level {
        match self {
            AgeBand::FiveToSeven => Level::Letters,
            AgeBand::EightToTen => Level::Simple,
            AgeBand::ElevenToTwelve => Level::Poems,
        }
    }

    /// Starting countdown in seconds.
    pub fn initial_timer(self) -> u32 {
        match self {
            AgeBand::FiveToSeven => 150,
            AgeBand::EightToTen => 120,
            AgeBand::ElevenToTwelve => 90,
        }
    }

    /// Acceleration never takes the countdown below this.
    pub fn min_timer(self) -> u32 {
        match self {
            AgeBand::FiveToSeven => 120,
            AgeBand::EightToTen => 90,
            AgeBand::ElevenToTwelve => 60,
        }
    }

    fn acceleration(self) -> Acceleration {
        match self {
            AgeBand::FiveToSeven => Acceleration { accuracy: 85.0, wpm: 10.0 },
            AgeBand::EightToTen => Acceleration { accuracy: 80.0, wpm: 20.0 },
            AgeBand::ElevenToTwelve => Acceleration { accuracy: 75.0, wpm: 30.0 },
        }
    }

    /// Next tier given the running averages.
    pub fn next_level(self, current: Level, avg_accuracy: f64, avg_wpm: f64) -> Level {
        match self {
            AgeBand::FiveToSeven => {
                if avg_accuracy > 90.0 && avg_wpm > 10.0 && current == Level::Letters {
                    Level::Simple
                } else if avg_accuracy < 80.0 && current == Level::Simple {
                    Level::Letters
                } else {
                    current
                }
            }
            AgeBand::EightToTen => {
                if avg_accuracy > 85.0 && avg_wpm > 20.0 && current == Level::Simple {
                    Level::Intermediate
                } else if avg_accuracy < 70.0 || avg_wpm < 15.0 {
                    Level::Simple
                } else {
                    current
                }
            }
            AgeBand::ElevenToTwelve => {
                if avg_accuracy > 80.0 && avg_wpm > 30.0 && current == Level::Poems {
                    Level::Intermediate
                } else if avg_accuracy > 85.0 && avg_wpm > 35.0 && current == Level::Intermediate {
                    Level::Advanced
                } else if (avg_accuracy < 65.0 || avg_wpm < 20.0) && current != Level::Poems {
                    if current == Level::Advanced { Level::Intermediate } else { Level::Poems }
                } else {
                    current
                }
            }
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgeBand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5-7" => Ok(AgeBand::FiveToSeven),
            "8-10" => Ok(AgeBand::EightToTen),
            "11-12" => Ok(AgeBand::ElevenToTwelve),
            other => Err(ParseError { kind: "age group", value: other.to_string() }),
        }
    }
}

/// One finished text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub accuracy: f64,
    pub wpm: f64,
}

#[derive(Debug, Clone)]
pub struct DifficultyTracker {
    band: AgeBand,
    level: Level,
    samples: Vec<Sample>,
}

impl DifficultyTracker {
    pub fn new(band: AgeBand) -> Self {
        Self::starting_at(band, band.initial_level())
    }

    pub fn starting_at(band: AgeBand, level: Level) -> Self {
        Self { band, level, samples: Vec::new() }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Running means over every recorded sample; zero before the first.
    pub fn averages(&self) -> (f64, f64) {
        if self.samples.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.samples.len() as f64;
        let acc = self.samples.iter().map(|s| s.accuracy).sum::<f64>() / n;
        let wpm = self.samples.iter().map(|s| s.wpm).sum::<f64>() / n;
        (acc, wpm)
    }

    /// Record a finished text and return the (possibly new) level.
    pub fn record(&mut self, sample: Sample) -> Level {
        self.samples.push(sample);
        let (acc, wpm) = self.averages();
        self.level = self.band.next_level(self.level, acc, wpm);
        self.level
    }
}

/// Remaining seconds after one countdown tick, before the normal one-second
/// decrement. Strong sessions lose two extra seconds, floored at the band's
/// minimum.
pub fn accelerate(band: AgeBand, time_left: u32, accuracy: f64, wpm: f64) -> u32 {
    let min = band.min_timer();
    if time_left <= min {
        return time_left;
    }
    let t = band.acceleration();
    if accuracy > t.accuracy && wpm > t.wpm {
        time_left.saturating_sub(2).max(min)
    } else {
        time_left
    }
}

/// Words per minute with five characters per word, rounded.
pub fn wpm(chars: usize, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    super::round_half_up((chars as f64 / 5.0) / (seconds / 60.0))
}

pub fn accuracy_percentage(errors: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let errors = errors.min(total);
    ((total - errors) as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Position-wise mismatches, counting every position past the shorter string.
pub fn count_errors(typed: &str, expected: &str) -> usize {
    let typed: Vec<char> = typed.chars().collect();
    let expected: Vec<char> = expected.chars().collect();
    let len = typed.len().max(expected.len());
    (0..len).filter(|&i| typed.get(i) != expected.get(i)).count()
}
