//! The fallback chain.
//!
//! Decoding is an ordered list of tiers tried until one reports `Done`. A tier
//! that cannot handle the input returns `Fallthrough` with a reason, and the
//! next tier runs. Each tier is attempted at most once per call.

use std::fmt;

use super::result::DecodeResult;

/// One decode strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// In-process parse, window and encode
    Native,

    /// Out-of-process decoder
    External,

    /// Return the input unrendered
    Passthrough,
}

impl Tier {
    /// Tiers in the order they are attempted.
    pub const CHAIN: [Tier; 3] = [Tier::Native, Tier::External, Tier::Passthrough];

    pub const fn name(&self) -> &'static str {
        match self {
            Tier::Native => "native",
            Tier::External => "external",
            Tier::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a tier produced.
#[derive(Debug)]
pub enum TierOutcome {
    /// Stop here
    Done(DecodeResult),

    /// Try the next tier
    Fallthrough(String),
}

/// Reasons collected from tiers that fell through, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallthroughLog {
    entries: Vec<(Tier, String)>,
}

impl FallthroughLog {
    pub fn push(&mut self, tier: Tier, reason: String) {
        self.entries.push((tier, reason));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.entries.iter().map(|(tier, _)| *tier)
    }

    /// `tier: reason; tier: reason`
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|(tier, reason)| format!("{}: {}", tier, reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
