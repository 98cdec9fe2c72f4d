//! Nearest-palette-entry color classification
//!
//! Classification is total: every [`Rgb`] maps to exactly one label. The
//! only way to get [`OTHER_LABEL`] is an empty palette or a configured
//! `max_distance` that the nearest entry exceeds.

use std::str::FromStr;

use crate::color::Rgb;
use crate::error::{Error, Result};

/// Label for colors with no acceptable palette match.
pub const OTHER_LABEL: &str = "other";

/// Ordered list of named reference colors. Order matters for ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<(String, Rgb)>,
}

impl Palette {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry; later entries lose ties under
    /// [`TieBreak::FirstDeclared`].
    pub fn with(mut self, name: impl Into<String>, color: Rgb) -> Self {
        self.entries.push((name.into(), color));
        self
    }

    pub fn entries(&self) -> &[(String, Rgb)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `name=RRGGBB[,name=RRGGBB...]`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut palette = Self::empty();
        for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, hex) = item
                .split_once('=')
                .ok_or_else(|| Error::InvalidPalette(format!("'{item}' is not name=RRGGBB")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidPalette(format!("'{item}' has no name")));
            }
            if palette.entries.iter().any(|(n, _)| n == name) {
                return Err(Error::InvalidPalette(format!("'{name}' declared twice")));
            }
            let color = Rgb::from_hex(hex)
                .ok_or_else(|| Error::InvalidPalette(format!("'{item}': bad color '{hex}'")))?;
            palette.entries.push((name.to_string(), color));
        }
        if palette.is_empty() {
            return Err(Error::InvalidPalette("no entries".into()));
        }
        Ok(palette)
    }
}

impl Default for Palette {
    /// black, white, red, green, blue, yellow, cyan, magenta, orange,
    /// purple, gray.
    fn default() -> Self {
        Self::empty()
            .with("black", Rgb::BLACK)
            .with("white", Rgb::WHITE)
            .with("red", Rgb::new(255, 0, 0))
            .with("green", Rgb::new(0, 255, 0))
            .with("blue", Rgb::new(0, 0, 255))
            .with("yellow", Rgb::new(255, 255, 0))
            .with("cyan", Rgb::new(0, 255, 255))
            .with("magenta", Rgb::new(255, 0, 255))
            .with("orange", Rgb::new(255, 165, 0))
            .with("purple", Rgb::new(128, 0, 128))
            .with("gray", Rgb::new(128, 128, 128))
    }
}

impl FromStr for Palette {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Distance between two colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Sum of squared channel differences.
    #[default]
    SquaredEuclidean,
    /// Sum of absolute channel differences.
    Manhattan,
}

impl Metric {
    pub fn distance(self, a: Rgb, b: Rgb) -> u32 {
        let diffs = [
            u32::from(a.r.abs_diff(b.r)),
            u32::from(a.g.abs_diff(b.g)),
            u32::from(a.b.abs_diff(b.b)),
        ];
        match self {
            Metric::SquaredEuclidean => diffs.iter().map(|d| d * d).sum(),
            Metric::Manhattan => diffs.iter().sum(),
        }
    }
}

/// Which of several equidistant entries wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    FirstDeclared,
    LastDeclared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassifierConfig {
    pub metric: Metric,
    pub tie_break: TieBreak,
    /// Nearest distances above this classify as [`OTHER_LABEL`].
    pub max_distance: Option<u32>,
}

/// Maps colors to palette names.
#[derive(Debug, Clone)]
pub struct Classifier {
    palette: Palette,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(palette: Palette, config: ClassifierConfig) -> Self {
        Self { palette, config }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn config(&self) -> ClassifierConfig {
        self.config
    }

    /// Closest palette entry and its distance, ignoring `max_distance`.
    pub fn nearest(&self, color: Rgb) -> Option<(&str, u32)> {
        let mut best: Option<(&str, u32)> = None;
        for (name, reference) in &self.palette.entries {
            let d = self.config.metric.distance(color, *reference);
            let better = match best {
                None => true,
                Some((_, best_d)) => match self.config.tie_break {
                    TieBreak::FirstDeclared => d < best_d,
                    TieBreak::LastDeclared => d <= best_d,
                },
            };
            if better {
                best = Some((name.as_str(), d));
            }
        }
        best
    }

    pub fn classify(&self, color: Rgb) -> &str {
        match self.nearest(color) {
            Some((_, d)) if self.config.max_distance.is_some_and(|max| d > max) => OTHER_LABEL,
            Some((name, _)) => name,
            None => OTHER_LABEL,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Palette::default(), ClassifierConfig::default())
    }
}
