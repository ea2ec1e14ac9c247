//! Bidding calculator
//!
//! Pure functions over numeric amounts and wall-clock time: the tiered
//! minimum-increment table, bid acceptability, the auction countdown, and
//! the time-driven auction state. Callers supply `now` (normally from
//! [`common::clock::Clock`]) so everything here is deterministic.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Increment required on top of the current bid, by tier
pub fn bid_increment(current_bid: f64) -> f64 {
    if current_bid < 1_000.0 {
        50.0
    } else if current_bid < 5_000.0 {
        100.0
    } else if current_bid < 10_000.0 {
        250.0
    } else if current_bid < 25_000.0 {
        500.0
    } else if current_bid < 50_000.0 {
        1_000.0
    } else {
        2_500.0
    }
}

/// Minimum acceptable next bid for the given current bid
pub fn minimum_next_bid(current_bid: f64) -> f64 {
    current_bid + bid_increment(current_bid)
}

/// A bid is acceptable iff it meets the minimum and is positive
pub fn is_valid_bid(amount: f64, minimum: f64) -> bool {
    amount >= minimum && amount > 0.0
}

/// Highest bid the given buyer has placed on this history, if any
pub fn user_highest_bid(pujas: &[crate::models::Puja], comprador_id: &str) -> Option<f64> {
    pujas
        .iter()
        .filter(|p| p.comprador_id == comprador_id)
        .map(|p| p.monto)
        .max_by(f64::total_cmp)
}

/// Price formatted for display: `$` plus thousands-separated amount
pub fn format_price(price: f64) -> String {
    let negative = price < 0.0;
    // round to cents before splitting, so 1250.999 carries into 1251
    let cents = (price.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('$');
    out.push_str(&grouped);
    if fraction > 0 {
        out.push_str(&format!(".{fraction:02}"));
    }
    out
}

/// Remaining time until an auction end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub is_expired: bool,
}

impl TimeRemaining {
    const EXPIRED: TimeRemaining = TimeRemaining {
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
        is_expired: true,
    };
}

/// Parse an API timestamp: RFC 3339, or a naive datetime taken as UTC
fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Break down the time left before `end_date`.
///
/// An absent or unparseable end date counts as already expired; this never
/// fails.
pub fn time_remaining(end_date: Option<&str>, now: DateTime<Utc>) -> TimeRemaining {
    let Some(end) = end_date.and_then(parse_end_date) else {
        return TimeRemaining::EXPIRED;
    };

    let diff = end - now;
    let total_secs = diff.num_seconds();
    if total_secs <= 0 {
        return TimeRemaining::EXPIRED;
    }

    TimeRemaining {
        days: total_secs / 86_400,
        hours: (total_secs % 86_400) / 3_600,
        minutes: (total_secs % 3_600) / 60,
        seconds: total_secs % 60,
        is_expired: false,
    }
}

/// Countdown string for display, `None` once expired.
///
/// The UI suppresses the timer entirely after expiry rather than showing a
/// zeroed one.
pub fn countdown_display(remaining: &TimeRemaining) -> Option<String> {
    if remaining.is_expired {
        return None;
    }

    if remaining.days > 0 {
        Some(format!(
            "{}d {:02}:{:02}:{:02}",
            remaining.days, remaining.hours, remaining.minutes, remaining.seconds
        ))
    } else {
        Some(format!(
            "{:02}:{:02}:{:02}",
            remaining.hours, remaining.minutes, remaining.seconds
        ))
    }
}

/// Auction state from the client's viewpoint; the only transition observed
/// locally is `Active -> Ended`, driven by time. Adjudication outcomes
/// arrive as fresh fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionState {
    Scheduled,
    Active,
    Ended,
    Inactive,
}

impl AuctionState {
    pub fn is_active(self) -> bool {
        self == AuctionState::Active
    }
}

/// Derive the auction state from the article's dates and flags.
///
/// With an end date present the state is purely time-driven; without one
/// the `activo` flag decides between active and inactive.
pub fn auction_state(
    fecha_inicio: Option<&str>,
    fecha_fin: Option<&str>,
    activo: Option<bool>,
    now: DateTime<Utc>,
) -> AuctionState {
    if let Some(end) = fecha_fin.and_then(parse_end_date) {
        if end <= now {
            return AuctionState::Ended;
        }
        if let Some(start) = fecha_inicio.and_then(parse_end_date) {
            if now < start {
                return AuctionState::Scheduled;
            }
        }
        return AuctionState::Active;
    }

    match activo {
        Some(true) => AuctionState::Active,
        _ => AuctionState::Inactive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Puja;

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn increment_tiers_match_table() {
        assert_eq!(minimum_next_bid(999.0), 1_049.0);
        assert_eq!(minimum_next_bid(1_000.0), 1_100.0);
        assert_eq!(minimum_next_bid(4_999.0), 5_099.0);
        assert_eq!(minimum_next_bid(5_000.0), 5_250.0);
        assert_eq!(minimum_next_bid(9_999.0), 10_249.0);
        assert_eq!(minimum_next_bid(10_000.0), 10_500.0);
        assert_eq!(minimum_next_bid(25_000.0), 26_000.0);
        assert_eq!(minimum_next_bid(50_000.0), 52_500.0);
    }

    #[test]
    fn bid_of_1200_requires_1300() {
        let minimum = minimum_next_bid(1_200.0);
        assert_eq!(minimum, 1_300.0);
        assert!(!is_valid_bid(1_250.0, minimum));
        assert!(is_valid_bid(1_300.0, minimum));
    }

    #[test]
    fn bid_at_exact_minimum_is_valid() {
        assert!(is_valid_bid(100.0, 100.0));
        assert!(!is_valid_bid(99.0, 100.0));
        assert!(!is_valid_bid(0.0, 0.0));
        assert!(!is_valid_bid(-5.0, -10.0));
    }

    #[test]
    fn past_end_date_is_expired_with_no_display() {
        let now = at("2026-08-25T12:00:00Z");
        let remaining = time_remaining(Some("2020-01-01T00:00:00Z"), now);

        assert!(remaining.is_expired);
        assert_eq!(countdown_display(&remaining), None);
    }

    #[test]
    fn unparseable_end_date_counts_as_expired() {
        let now = at("2026-08-25T12:00:00Z");
        assert!(time_remaining(Some("not-a-date"), now).is_expired);
        assert!(time_remaining(None, now).is_expired);
    }

    #[test]
    fn remaining_breakdown_and_display() {
        let now = at("2026-08-25T12:00:00Z");
        let remaining = time_remaining(Some("2026-08-27T14:03:05Z"), now);

        assert_eq!(
            remaining,
            TimeRemaining {
                days: 2,
                hours: 2,
                minutes: 3,
                seconds: 5,
                is_expired: false
            }
        );
        assert_eq!(countdown_display(&remaining).unwrap(), "2d 02:03:05");

        let short = time_remaining(Some("2026-08-25T13:30:00Z"), now);
        assert_eq!(countdown_display(&short).unwrap(), "01:30:00");
    }

    #[test]
    fn naive_timestamps_are_taken_as_utc() {
        let now = at("2026-08-25T12:00:00Z");
        let remaining = time_remaining(Some("2026-08-25T12:00:30"), now);
        assert_eq!(remaining.seconds, 30);
    }

    #[test]
    fn state_is_time_driven_when_end_date_present() {
        let now = at("2026-08-25T12:00:00Z");

        assert_eq!(
            auction_state(None, Some("2020-01-01T00:00:00Z"), Some(true), now),
            AuctionState::Ended
        );
        assert_eq!(
            auction_state(None, Some("2026-09-01T00:00:00Z"), None, now),
            AuctionState::Active
        );
        assert_eq!(
            auction_state(
                Some("2026-08-30T00:00:00Z"),
                Some("2026-09-01T00:00:00Z"),
                None,
                now
            ),
            AuctionState::Scheduled
        );
    }

    #[test]
    fn state_falls_back_to_activo_flag() {
        let now = at("2026-08-25T12:00:00Z");
        assert_eq!(auction_state(None, None, Some(true), now), AuctionState::Active);
        assert_eq!(auction_state(None, None, Some(false), now), AuctionState::Inactive);
        assert_eq!(auction_state(None, None, None, now), AuctionState::Inactive);
    }

    #[test]
    fn format_price_groups_thousands() {
        assert_eq!(format_price(0.0), "$0");
        assert_eq!(format_price(1_234_567.0), "$1,234,567");
        assert_eq!(format_price(1_250.5), "$1,250.50");
    }

    #[test]
    fn format_price_rounds_fraction_into_whole() {
        assert_eq!(format_price(1_250.999), "$1,251");
        assert_eq!(format_price(1_250.994), "$1,250.99");
        assert_eq!(format_price(999.999), "$1,000");
    }

    #[test]
    fn user_highest_bid_filters_by_buyer() {
        let pujas = vec![
            Puja {
                puja_id: "1".into(),
                torre_id: "t".into(),
                comprador_id: "me".into(),
                monto: 1_000.0,
                fecha_puja: String::new(),
                es_ganadora: false,
            },
            Puja {
                puja_id: "2".into(),
                torre_id: "t".into(),
                comprador_id: "other".into(),
                monto: 2_000.0,
                fecha_puja: String::new(),
                es_ganadora: false,
            },
            Puja {
                puja_id: "3".into(),
                torre_id: "t".into(),
                comprador_id: "me".into(),
                monto: 1_500.0,
                fecha_puja: String::new(),
                es_ganadora: false,
            },
        ];

        assert_eq!(user_highest_bid(&pujas, "me"), Some(1_500.0));
        assert_eq!(user_highest_bid(&pujas, "nobody"), None);
    }
}
