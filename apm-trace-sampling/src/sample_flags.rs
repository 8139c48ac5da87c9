// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt,
    ops::{BitAnd, BitOr},
    str::FromStr,
};

use apm_trace::apm_debug;

/// Set of directives attached to a remote setting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFlags {
    bits: u8,
}

impl SampleFlags {
    /// Remote rate may lower a locally configured rate
    pub const OVERRIDE: SampleFlags = SampleFlags::from_bits(1);
    /// New traces may be started
    pub const SAMPLE_START: SampleFlags = SampleFlags::from_bits(1 << 1);
    /// Requests already traced upstream are continued
    pub const SAMPLE_THROUGH: SampleFlags = SampleFlags::from_bits(1 << 2);
    pub const SAMPLE_THROUGH_ALWAYS: SampleFlags = SampleFlags::from_bits(1 << 3);
    /// Trigger trace requests are honored
    pub const TRIGGER_TRACE: SampleFlags = SampleFlags::from_bits(1 << 4);

    const NAMED: [(&'static str, SampleFlags); 5] = [
        ("OVERRIDE", Self::OVERRIDE),
        ("SAMPLE_START", Self::SAMPLE_START),
        ("SAMPLE_THROUGH", Self::SAMPLE_THROUGH),
        ("SAMPLE_THROUGH_ALWAYS", Self::SAMPLE_THROUGH_ALWAYS),
        ("TRIGGER_TRACE", Self::TRIGGER_TRACE),
    ];

    const fn from_bits(bits: u8) -> Self {
        Self { bits }
    }

    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Whether every flag of `other` is set
    pub fn contains(&self, other: SampleFlags) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Whether any flag of `other` is set
    pub fn intersects(&self, other: SampleFlags) -> bool {
        self.bits & other.bits != 0
    }

    pub fn insert(&mut self, other: SampleFlags) {
        self.bits |= other.bits;
    }

    /// Parses the comma separated flag list sent by the collector, e.g.
    /// `SAMPLE_START,SAMPLE_THROUGH_ALWAYS,TRIGGER_TRACE`.
    ///
    /// Unknown flags are ignored.
    pub fn parse(s: &str) -> Self {
        let mut flags = SampleFlags::empty();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match Self::NAMED.iter().find(|(n, _)| *n == name) {
                Some((_, flag)) => flags.insert(*flag),
                None => apm_debug!("Ignoring unknown sample flag {:?}", name),
            }
        }
        flags
    }
}

impl BitOr for SampleFlags {
    type Output = SampleFlags;

    fn bitor(self, rhs: SampleFlags) -> SampleFlags {
        SampleFlags::from_bits(self.bits | rhs.bits)
    }
}

impl BitAnd for SampleFlags {
    type Output = SampleFlags;

    fn bitand(self, rhs: SampleFlags) -> SampleFlags {
        SampleFlags::from_bits(self.bits & rhs.bits)
    }
}

impl FromStr for SampleFlags {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SampleFlags::parse(s))
    }
}

impl fmt::Display for SampleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, flag) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
