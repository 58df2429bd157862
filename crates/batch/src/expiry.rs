//! Expiry severity classification and the FEFO sort key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockline_core::BinId;

/// Days-until-expiry bound of the Critical tier (inclusive).
pub const CRITICAL_DAYS: i64 = 7;

/// Days-until-expiry bound of the Warning tier (inclusive).
pub const WARNING_DAYS: i64 = 30;

/// Expiry severity tier, ordered most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryTier {
    Expired,
    Critical,
    Warning,
    Ok,
}

impl ExpiryTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpiryTier::Expired => "expired",
            ExpiryTier::Critical => "critical",
            ExpiryTier::Warning => "warning",
            ExpiryTier::Ok => "ok",
        }
    }
}

/// Signed days from `as_of` to `expiry` (negative once expired).
pub fn days_until(expiry: NaiveDate, as_of: NaiveDate) -> i64 {
    (expiry - as_of).num_days()
}

/// Classify a batch expiry date relative to `as_of`.
///
/// - expired: expiry strictly before `as_of`
/// - critical: 0..=7 days left
/// - warning: 8..=30 days left
/// - ok: later than that, or no expiry date at all
pub fn classify(expiry: Option<NaiveDate>, as_of: NaiveDate) -> ExpiryTier {
    let Some(expiry) = expiry else {
        return ExpiryTier::Ok;
    };

    let days = days_until(expiry, as_of);
    if days < 0 {
        ExpiryTier::Expired
    } else if days <= CRITICAL_DAYS {
        ExpiryTier::Critical
    } else if days <= WARNING_DAYS {
        ExpiryTier::Warning
    } else {
        ExpiryTier::Ok
    }
}

/// Sort key for first-expiry-first-out allocation.
///
/// Orders by expiry ascending with no-expiry batches last; bin id is the
/// deterministic tiebreak so concurrent reservations touch bins in one
/// fixed order.
pub fn fefo_key(expiry: Option<NaiveDate>, bin_id: BinId) -> (bool, NaiveDate, [u8; 16]) {
    (
        expiry.is_none(),
        expiry.unwrap_or(NaiveDate::MAX),
        *bin_id.as_uuid().as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn plus_days(base: NaiveDate, days: u64) -> NaiveDate {
        base.checked_add_days(Days::new(days)).unwrap()
    }

    #[test]
    fn classify_matches_tier_boundaries() {
        let t = today();

        assert_eq!(classify(Some(t.pred_opt().unwrap()), t), ExpiryTier::Expired);
        assert_eq!(classify(Some(t), t), ExpiryTier::Critical);
        assert_eq!(classify(Some(plus_days(t, 5)), t), ExpiryTier::Critical);
        assert_eq!(classify(Some(plus_days(t, 7)), t), ExpiryTier::Critical);
        assert_eq!(classify(Some(plus_days(t, 8)), t), ExpiryTier::Warning);
        assert_eq!(classify(Some(plus_days(t, 10)), t), ExpiryTier::Warning);
        assert_eq!(classify(Some(plus_days(t, 30)), t), ExpiryTier::Warning);
        assert_eq!(classify(Some(plus_days(t, 31)), t), ExpiryTier::Ok);
    }

    #[test]
    fn no_expiry_date_is_ok() {
        assert_eq!(classify(None, today()), ExpiryTier::Ok);
    }

    #[test]
    fn fefo_orders_by_expiry_with_nulls_last() {
        let t = today();
        let bin_a = BinId::new();
        let bin_b = BinId::new();

        let mut keys = vec![
            fefo_key(None, bin_a),
            fefo_key(Some(plus_days(t, 30)), bin_b),
            fefo_key(Some(plus_days(t, 2)), bin_a),
        ];
        keys.sort();

        assert_eq!(keys[0].1, plus_days(t, 2));
        assert_eq!(keys[1].1, plus_days(t, 30));
        assert!(keys[2].0, "no-expiry key must sort last");
    }

    proptest! {
        /// Property: severity never decreases as the expiry date moves
        /// earlier (tier order is Expired < Critical < Warning < Ok).
        #[test]
        fn classify_is_monotone_in_expiry(a in 0u64..400, b in 0u64..400) {
            let t = today();
            let (earlier, later) = if a <= b { (a, b) } else { (b, a) };

            let tier_earlier = classify(Some(plus_days(t, earlier)), t);
            let tier_later = classify(Some(plus_days(t, later)), t);

            prop_assert!(tier_earlier <= tier_later);
        }

        /// Property: a date strictly before `as_of` is always Expired, and
        /// anything on or after `as_of` never is.
        #[test]
        fn expired_exactly_when_in_the_past(offset in -400i64..400) {
            let t = today();
            let date = if offset < 0 {
                t.checked_sub_days(Days::new(offset.unsigned_abs())).unwrap()
            } else {
                plus_days(t, offset as u64)
            };

            let tier = classify(Some(date), t);
            if offset < 0 {
                prop_assert_eq!(tier, ExpiryTier::Expired);
            } else {
                prop_assert!(tier != ExpiryTier::Expired);
            }
        }
    }
}
