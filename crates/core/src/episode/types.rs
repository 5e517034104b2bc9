//! Types for the episode module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Episode number within a season.
///
/// Stored as an exact count of thousandths so that specials such as `12.5`
/// compare and hash exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    const SCALE: u32 = 1000;

    /// Creates a whole episode number.
    pub const fn whole(number: u32) -> Self {
        Self(number.saturating_mul(Self::SCALE))
    }

    /// Creates a sequence number from a decimal value, rounded to thousandths.
    ///
    /// Negative and non-finite values clamp to zero.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self(0);
        }
        let scaled = (value * Self::SCALE as f64).round();
        Self(scaled.min(u32::MAX as f64) as u32)
    }

    /// Returns the value as a float.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Integer part of the number.
    pub fn integer_part(self) -> u32 {
        self.0 / Self::SCALE
    }

    /// Whether the number has no fractional part.
    pub fn is_whole(self) -> bool {
        self.0 % Self::SCALE == 0
    }

    /// Fractional digits without trailing zeros, e.g. `"5"` for `12.5`.
    fn fraction_digits(self) -> Option<String> {
        let fraction = self.0 % Self::SCALE;
        if fraction == 0 {
            return None;
        }
        let digits = format!("{:03}", fraction);
        Some(digits.trim_end_matches('0').to_string())
    }

    /// Zero-padded rendering used in file prefixes (`02`, `12.5`).
    pub fn padded(self) -> String {
        match self.fraction_digits() {
            Some(fraction) => format!("{:02}.{}", self.integer_part(), fraction),
            None => format!("{:02}", self.integer_part()),
        }
    }
}

impl From<f64> for SequenceNumber {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<SequenceNumber> for f64 {
    fn from(value: SequenceNumber) -> Self {
        value.as_f64()
    }
}

impl From<u32> for SequenceNumber {
    fn from(value: u32) -> Self {
        Self::whole(value)
    }
}

impl FromStr for SequenceNumber {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<f64>().map(Self::from_f64)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fraction_digits() {
            Some(fraction) => write!(f, "{}.{}", self.integer_part(), fraction),
            None => write!(f, "{}", self.integer_part()),
        }
    }
}

/// Identity of an episode: two descriptors are the same episode iff their
/// ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeId {
    pub season: Option<u32>,
    pub sequence: SequenceNumber,
}

impl EpisodeId {
    pub fn new(season: Option<u32>, sequence: impl Into<SequenceNumber>) -> Self {
        Self {
            season,
            sequence: sequence.into(),
        }
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(season) = self.season {
            write!(f, "S{:02}", season)?;
        }
        write!(f, "E{}", self.sequence.padded())
    }
}

/// Kind of stream referenced by an [`EpisodeInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Video,
    Audio,
    Subtitle,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Video => "video",
            InputKind::Audio => "audio",
            InputKind::Subtitle => "subtitle",
        }
    }
}

/// A named input reference of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInput {
    /// Stream URL.
    pub url: String,
    /// Language tag (e.g. `ja-JP`, `en-US`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Stream kind.
    pub kind: InputKind,
}

impl EpisodeInput {
    pub fn new(url: impl Into<String>, language: Option<&str>, kind: InputKind) -> Self {
        Self {
            url: url.into(),
            language: language.map(str::to_string),
            kind,
        }
    }
}

/// Identifying and metadata record for one episode to download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDescriptor {
    /// Series name.
    pub series: String,
    /// Season number, absent for flat playlists.
    #[serde(default)]
    pub season: Option<u32>,
    /// Episode number within the season.
    pub sequence: SequenceNumber,
    /// Episode title.
    pub title: String,
    /// Episode page URL handed to the acquisition collaborator.
    pub url: String,
    /// Whether this is a dubbed variant.
    #[serde(default)]
    pub dubbed: bool,
    /// Dub language when `dubbed` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dub_language: Option<String>,
    /// Whether subtitles are available.
    #[serde(default)]
    pub subbed: bool,
    /// Whether the episode requires a premium entitlement.
    #[serde(default)]
    pub premium: bool,
    /// Stream inputs.
    #[serde(default)]
    pub inputs: Vec<EpisodeInput>,
    /// Audio of dubbed variants merged into this episode. Each track points
    /// at the dubbed variant's page and is acquired on its own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dub_tracks: Vec<EpisodeInput>,
    /// Duration in seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl EpisodeDescriptor {
    /// Creates a descriptor with no inputs and all flags cleared.
    pub fn new(
        series: impl Into<String>,
        season: Option<u32>,
        sequence: impl Into<SequenceNumber>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            series: series.into(),
            season,
            sequence: sequence.into(),
            title: title.into(),
            url: url.into(),
            dubbed: false,
            dub_language: None,
            subbed: false,
            premium: false,
            inputs: Vec::new(),
            dub_tracks: Vec::new(),
            duration_secs: None,
        }
    }

    pub fn with_premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }

    pub fn with_dub(mut self, language: impl Into<String>) -> Self {
        self.dubbed = true;
        self.dub_language = Some(language.into());
        self
    }

    pub fn with_input(mut self, input: EpisodeInput) -> Self {
        if input.kind == InputKind::Subtitle {
            self.subbed = true;
        }
        self.inputs.push(input);
        self
    }

    /// Adds the audio of `variant` as a dub track, once per page URL.
    pub fn merge_dub(&mut self, variant: &EpisodeDescriptor) -> bool {
        let known = variant.url == self.url || self.dub_tracks.iter().any(|t| t.url == variant.url);
        if known {
            return false;
        }
        self.dub_tracks.push(EpisodeInput::new(
            variant.url.clone(),
            variant.dub_language.as_deref(),
            InputKind::Audio,
        ));
        true
    }

    pub fn id(&self) -> EpisodeId {
        EpisodeId {
            season: self.season,
            sequence: self.sequence,
        }
    }

    /// `S01E02`-style prefix used in final file names.
    pub fn file_prefix(&self) -> String {
        self.id().to_string()
    }

    /// Inputs of the given kind.
    pub fn inputs_of(&self, kind: InputKind) -> impl Iterator<Item = &EpisodeInput> {
        self.inputs.iter().filter(move |i| i.kind == kind)
    }
}
