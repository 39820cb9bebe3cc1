//! Input line classification against the configured group markers.

use contracts::GroupMarkers;
use observability::LineKind;

/// A raw input line, routed by the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    GroupStart,
    GroupEnd,
    Command(&'a str),
}

impl<'a> Line<'a> {
    /// Markers match the whole line exactly; anything else is a command.
    pub fn classify(raw: &'a str, markers: &GroupMarkers) -> Self {
        if raw == markers.start {
            Self::GroupStart
        } else if raw == markers.end {
            Self::GroupEnd
        } else {
            Self::Command(raw)
        }
    }

    pub fn kind(&self) -> LineKind {
        match self {
            Self::GroupStart => LineKind::GroupStart,
            Self::GroupEnd => LineKind::GroupEnd,
            Self::Command(_) => LineKind::Command,
        }
    }
}
