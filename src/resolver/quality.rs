use std::{cmp::Ordering, fmt::Display};

use serde::Serialize;

/// Canonical resolution token, ordered by resolution (`Max` is the greatest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Max,
    P4320,
    P2160,
    P1440,
    P1080,
    P720,
    P480,
    P360,
    P240,
    P144,
}

impl Quality {
    /// Every token, highest resolution first
    pub const ALL: [Self; 10] = [
        Self::Max,
        Self::P4320,
        Self::P2160,
        Self::P1440,
        Self::P1080,
        Self::P720,
        Self::P480,
        Self::P360,
        Self::P240,
        Self::P144,
    ];

    pub const DEFAULT: Self = Self::P1080;

    pub const fn height(self) -> Option<u32> {
        match self {
            Self::Max => None,
            Self::P4320 => Some(4320),
            Self::P2160 => Some(2160),
            Self::P1440 => Some(1440),
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
            Self::P240 => Some(240),
            Self::P144 => Some(144),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::P4320 => "4320",
            Self::P2160 => "2160",
            Self::P1440 => "1440",
            Self::P1080 => "1080",
            Self::P720 => "720",
            Self::P480 => "480",
            Self::P360 => "360",
            Self::P240 => "240",
            Self::P144 => "144",
        }
    }

    pub fn from_height(height: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.height() == Some(height))
    }

    /// Height used when measuring distance to format entries. `Max` sits
    /// above every real resolution.
    pub fn target_height(self) -> u32 {
        self.height().unwrap_or(u32::MAX)
    }
}

impl Ord for Quality {
    fn cmp(&self, other: &Self) -> Ordering {
        self.target_height().cmp(&other.target_height())
    }
}

impl PartialOrd for Quality {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Quality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Non-empty set of tokens a provider accepts, kept highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySet {
    tokens: Vec<Quality>,
}

impl QualitySet {
    pub fn new<I: IntoIterator<Item = Quality>>(tokens: I) -> Option<Self> {
        let mut tokens = tokens.into_iter().collect::<Vec<_>>();
        tokens.sort_by(|a, b| b.cmp(a));
        tokens.dedup();

        if tokens.is_empty() {
            return None;
        }

        Some(Self { tokens })
    }

    pub fn all() -> Self {
        Self {
            tokens: Quality::ALL.to_vec(),
        }
    }

    /// Every token with a concrete resolution
    pub fn numeric() -> Self {
        Self {
            tokens: Quality::ALL
                .into_iter()
                .filter(|q| q.height().is_some())
                .collect(),
        }
    }

    pub fn highest(&self) -> Quality {
        self.tokens[0]
    }

    pub fn contains(&self, quality: Quality) -> bool {
        self.tokens.contains(&quality)
    }

    pub fn iter(&self) -> impl Iterator<Item = Quality> + '_ {
        self.tokens.iter().copied()
    }

    fn fallback(&self) -> Quality {
        if self.contains(Quality::DEFAULT) {
            Quality::DEFAULT
        } else {
            self.highest()
        }
    }
}

/// Pick the item whose height is closest to `target`. Ties go to the higher
/// resolution; among equal heights the first one seen wins.
pub fn nearest_by_height<T>(target: u32, candidates: impl IntoIterator<Item = (u32, T)>) -> Option<T> {
    let mut best: Option<(u32, u32, T)> = None;

    for (height, item) in candidates {
        let distance = height.abs_diff(target);
        let is_better = match &best {
            None => true,
            Some((best_distance, best_height, _)) => {
                distance < *best_distance || (distance == *best_distance && height > *best_height)
            }
        };

        if is_better {
            best = Some((distance, height, item));
        }
    }

    best.map(|(_, _, item)| item)
}

/// Map a freeform quality request ("1080p", " MAX ", "900", ...) onto a member
/// of `allowed`. Never fails.
pub fn normalize(requested: Option<&str>, allowed: &QualitySet) -> Quality {
    let Some(requested) = requested else {
        return allowed.fallback();
    };

    let lowered = requested.trim().to_lowercase();
    let cleaned = lowered.strip_suffix('p').unwrap_or(&lowered).trim();

    match cleaned {
        "" => allowed.fallback(),
        "max" | "best" => {
            if allowed.contains(Quality::Max) {
                Quality::Max
            } else {
                allowed.highest()
            }
        }
        other => {
            let height = match other.parse::<u32>() {
                Ok(h) => h,
                // Digit strings past u32 are still "as tall as possible"
                Err(_) if other.bytes().all(|b| b.is_ascii_digit()) => u32::MAX,
                Err(_) => return allowed.fallback(),
            };

            if let Some(exact) = Quality::from_height(height).filter(|q| allowed.contains(*q)) {
                return exact;
            }

            nearest_by_height(
                height,
                allowed.iter().filter_map(|q| q.height().map(|h| (h, q))),
            )
            .unwrap_or_else(|| allowed.highest())
        }
    }
}
