//! Simulated option flow.
//!
//! `SimulatedFlowGenerator` produces plausible-looking but entirely synthetic
//! flow events for demo purposes. All randomness comes from the injected
//! `Rng`, so a seeded generator replays the same sequence of events.

use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::Builder;

use flowcast_core::generator::FlowGenerator;
use flowcast_types::flow::{FlowEvent, OptionType};

/// Simulated underlyings and their approximate reference prices.
const UNDERLYINGS: [(&str, f64); 4] = [
    ("NVDA", 500.0),
    ("AMD", 150.0),
    ("TSLA", 250.0),
    ("SPY", 450.0),
];

const CONVICTION_RANGE: std::ops::RangeInclusive<u8> = 55..=95;
const EXPIRY_DAYS: std::ops::RangeInclusive<u64> = 1..=45;
const VOLUME_RANGE: std::ops::RangeInclusive<u64> = 10..=10_000;
const MIN_OPEN_INTEREST: u64 = 50;
const MAX_OPEN_INTEREST: u64 = 50_000;
const SWEEP_PROBABILITY: f64 = 0.3;
const BLOCK_PROBABILITY: f64 = 0.1;

/// `FlowGenerator` backed by a random number generator.
pub struct SimulatedFlowGenerator<R> {
    rng: R,
    min_interval: Duration,
    max_interval: Duration,
}

impl<R: Rng + Send> SimulatedFlowGenerator<R> {
    /// Wrap an existing RNG. The interval bounds are swapped if inverted.
    pub fn new(rng: R, min_interval: Duration, max_interval: Duration) -> Self {
        let (min_interval, max_interval) = if min_interval <= max_interval {
            (min_interval, max_interval)
        } else {
            (max_interval, min_interval)
        };
        Self {
            rng,
            min_interval,
            max_interval,
        }
    }
}

impl SimulatedFlowGenerator<StdRng> {
    /// Reproducible generator for a given seed.
    pub fn seeded(seed: u64, min_interval: Duration, max_interval: Duration) -> Self {
        Self::new(StdRng::seed_from_u64(seed), min_interval, max_interval)
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy(min_interval: Duration, max_interval: Duration) -> Self {
        Self::new(StdRng::from_entropy(), min_interval, max_interval)
    }
}

impl<R: Rng + Send> FlowGenerator for SimulatedFlowGenerator<R> {
    fn next_event(&mut self, now: DateTime<Utc>) -> FlowEvent {
        let rng = &mut self.rng;

        let (ticker, base_price) = UNDERLYINGS[rng.gen_range(0..UNDERLYINGS.len())];
        let option_type = if rng.gen_bool(0.5) {
            OptionType::Call
        } else {
            OptionType::Put
        };
        let conviction_score = rng.gen_range(CONVICTION_RANGE);

        // Strike within +/-20% of the reference price. SPY lists whole-dollar
        // strikes, the single names half-dollar ones.
        let raw_strike = base_price * (1.0 + rng.gen_range(-0.20..=0.20));
        let strike = if ticker == "SPY" {
            raw_strike.round()
        } else {
            (raw_strike * 2.0).round() / 2.0
        };

        let days_to_expiry = rng.gen_range(EXPIRY_DAYS);
        let expiry = now
            .date_naive()
            .checked_add_days(Days::new(days_to_expiry))
            .unwrap_or_else(|| now.date_naive());

        // Premium per print: 0.5%-5% of strike, 100 shares per contract.
        let premium_ratio = rng.gen_range(0.005..=0.05);
        let premium_spent = (strike * premium_ratio * 100.0 * 100.0).round() / 100.0;

        let volume = rng.gen_range(VOLUME_RANGE);
        let open_interest = rng.gen_range(volume.max(MIN_OPEN_INTEREST)..=MAX_OPEN_INTEREST);
        let is_sweep = rng.gen_bool(SWEEP_PROBABILITY);
        let is_block = rng.gen_bool(BLOCK_PROBABILITY);

        let relative = if strike > base_price { "above" } else { "below" };
        let outlook = match option_type {
            OptionType::Call => "optimistic",
            OptionType::Put => "pessimistic",
        };
        let reasons = [
            format!(
                "Unusual volume spike: {} contracts traded vs {} open interest",
                with_thousands(volume),
                with_thousands(open_interest)
            ),
            format!(
                "Large premium spent: ${} on {option_type} options",
                dollars(premium_spent)
            ),
            format!("Strike price {strike} is {relative} current market price"),
            format!("Expiry date {expiry} is within {days_to_expiry} days"),
            format!("High conviction {option_type} activity detected"),
            format!(
                "Significant {option_type} flow suggests {} sentiment",
                option_type.sentiment()
            ),
            format!(
                "Open interest of {} indicates strong market interest",
                with_thousands(open_interest)
            ),
            format!(
                "Premium-to-strike ratio of {:.2}% suggests {outlook} outlook",
                premium_ratio * 100.0
            ),
        ];
        let reason_count = rng.gen_range(2..=3);
        let why_unusual = reasons
            .choose_multiple(&mut *rng, reason_count)
            .cloned()
            .collect();

        let id = Builder::from_random_bytes(rng.r#gen()).into_uuid().to_string();

        FlowEvent {
            id,
            timestamp: now,
            ticker: ticker.to_string(),
            option_type,
            strike,
            expiry,
            premium_spent,
            volume,
            open_interest,
            is_sweep,
            is_block,
            conviction_score,
            why_unusual,
        }
    }

    fn next_delay(&mut self) -> Duration {
        if self.min_interval == self.max_interval {
            return self.min_interval;
        }
        self.rng.gen_range(self.min_interval..=self.max_interval)
    }
}

/// `1234567` -> `"1,234,567"`.
fn with_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `12345.6` -> `"12,345.60"`.
fn dollars(amount: f64) -> String {
    let cents = (amount * 100.0).round() as u64;
    format!("{}.{:02}", with_thousands(cents / 100), cents % 100)
}
