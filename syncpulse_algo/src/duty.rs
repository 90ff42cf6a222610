// Converts requested duty percentages into compare ticks.

// Key Features:
// - Clamps every request into [DUTY_MIN_PCT..DUTY_MAX_PCT]
// - Truncating integer math (floor), never rounds to nearest
// - Pure functions, usable in const context

// 0% and 100% are never produced: some gate drivers flag an always-on or always-off
// phase as a fault.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Lowest duty the engine will ever apply, in percent
pub const DUTY_MIN_PCT: u8 = 10;
/// Highest duty the engine will ever apply, in percent
pub const DUTY_MAX_PCT: u8 = 90;
/// Power-on duty of every phase, in percent
pub const DUTY_DEFAULT_PCT: u8 = 50;

/// Clamps a raw percentage into `[DUTY_MIN_PCT, DUTY_MAX_PCT]`.
#[inline(always)]
pub const fn clamp_pct(pct: u8) -> u8 {
    if pct < DUTY_MIN_PCT {
        DUTY_MIN_PCT
    } else if pct > DUTY_MAX_PCT {
        DUTY_MAX_PCT
    } else {
        pct
    }
}

/// Compare ticks for `pct` percent of `period_ticks`, after clamping.
///
/// `floor(period_ticks * pct / 100)`; the product is widened so large HRTIM-style
/// periods cannot overflow.
#[inline(always)]
pub const fn to_ticks(period_ticks: u32, pct: u8) -> u32 {
    let pct = clamp_pct(pct) as u64;
    ((period_ticks as u64 * pct) / 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_stays_in_window_and_is_idempotent() {
        for pct in 0..=u8::MAX {
            let clamped = clamp_pct(pct);
            assert!((DUTY_MIN_PCT..=DUTY_MAX_PCT).contains(&clamped), "pct {pct}");
            assert_eq!(clamp_pct(clamped), clamped, "pct {pct}");
        }
    }

    #[test]
    fn clamp_keeps_in_range_values() {
        assert_eq!(clamp_pct(0), 10);
        assert_eq!(clamp_pct(9), 10);
        assert_eq!(clamp_pct(10), 10);
        assert_eq!(clamp_pct(55), 55);
        assert_eq!(clamp_pct(90), 90);
        assert_eq!(clamp_pct(91), 90);
        assert_eq!(clamp_pct(255), 90);
    }

    #[test]
    fn hrtim_period_reference_points() {
        assert_eq!(to_ticks(17_000, 50), 8_500);
        assert_eq!(to_ticks(17_000, 10), 1_700);
        assert_eq!(to_ticks(17_000, 90), 15_300);
    }

    #[test]
    fn truncates_instead_of_rounding() {
        // 999 * 33 / 100 = 329.67
        assert_eq!(to_ticks(999, 33), 329);
        // 7 * 15 / 100 = 1.05
        assert_eq!(to_ticks(7, 15), 1);
    }

    #[test]
    fn out_of_window_requests_map_to_the_limits() {
        assert_eq!(to_ticks(17_000, 0), to_ticks(17_000, DUTY_MIN_PCT));
        assert_eq!(to_ticks(17_000, 100), to_ticks(17_000, DUTY_MAX_PCT));
        assert_eq!(to_ticks(17_000, 200), 15_300);
    }

    #[test]
    fn monotonic_and_bounded_over_clamped_domain() {
        for period in [1u32, 2, 3, 99, 100, 101, 1_000, 17_000, 65_535, u32::MAX] {
            let mut prev = 0;
            for pct in DUTY_MIN_PCT..=DUTY_MAX_PCT {
                let ticks = to_ticks(period, pct);
                assert!(ticks <= period, "period {period} pct {pct}");
                assert!(ticks >= prev, "period {period} pct {pct}");
                prev = ticks;
            }
        }
    }
}
