// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;

use rand::{Rng, SeedableRng};

use crate::constants::MAX_SAMPLE_RATE;

/// Source of the uniform draw compared against the sample rate
pub trait SampleDraw: Send + Sync {
    /// Returns a value in `0..1_000_000`
    fn draw(&self) -> u32;
}

thread_local! {
    static RNG: RefCell<rand::rngs::SmallRng> = RefCell::new(rand::rngs::SmallRng::from_entropy());
}

/// Draws from a per thread `SmallRng`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngDraw;

impl SampleDraw for ThreadRngDraw {
    fn draw(&self) -> u32 {
        RNG.with(|rng| rng.borrow_mut().gen_range(0..MAX_SAMPLE_RATE))
    }
}

/// Always returns the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedDraw(pub u32);

impl SampleDraw for FixedDraw {
    fn draw(&self) -> u32 {
        self.0.min(MAX_SAMPLE_RATE - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_rng_draw_range() {
        let draw = ThreadRngDraw;
        assert!((0..10_000).all(|_| draw.draw() < MAX_SAMPLE_RATE));
    }

    #[test]
    fn test_thread_rng_draw_spreads() {
        let draw = ThreadRngDraw;
        let below_half = (0..10_000).filter(|_| draw.draw() < 500_000).count();
        assert!((4_000..6_000).contains(&below_half), "{below_half}");
    }

    #[test]
    fn test_fixed_draw_stays_in_range() {
        assert_eq!(FixedDraw(42).draw(), 42);
        assert_eq!(FixedDraw(u32::MAX).draw(), 999_999);
    }
}
