//! Pure pricing computation: zone tariff + tuning knobs + ride context in,
//! (price_per_minute, price_unlock, deposit) out. No I/O, no clock.

/// Everything the calculation needs, snapshotted by the caller.
#[derive(Debug, Clone, Copy)]
pub struct PricingInputs {
    pub zone_price_per_minute: i64,
    pub zone_price_unlock: i64,
    pub zone_default_deposit: i64,

    pub surge: f64,
    pub low_charge_discount: f64,
    pub low_charge_threshold_percent: i32,

    pub scooter_charge_percent: i32,
    pub has_subscription: bool,
    pub trusted: bool,
}

/// Computed pricing values to be placed into an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingOutput {
    pub price_per_minute: i64,
    pub price_unlock: i64,
    pub deposit: i64,
}

/// Computes price per minute, unlock price and deposit from:
/// - zone tariff (base),
/// - surge multiplier,
/// - low charge discount below threshold,
/// - subscription (free unlock),
/// - trust (no deposit).
pub fn calculate(inputs: PricingInputs) -> PricingOutput {
    // price per minute: base * surge, then optional low-battery discount
    let mut ppm = inputs.zone_price_per_minute as f64 * clamp_pos(inputs.surge, 1.0);
    if inputs.scooter_charge_percent >= 0
        && inputs.low_charge_threshold_percent > 0
        && inputs.scooter_charge_percent < inputs.low_charge_threshold_percent
    {
        ppm *= clamp_pos(inputs.low_charge_discount, 1.0);
    }
    // f64::round ties away from zero, which is the contract here
    let price_per_minute = (ppm.round() as i64).max(0);

    // unlock price: 0 if subscription
    let price_unlock = if inputs.has_subscription {
        0
    } else {
        inputs.zone_price_unlock.max(0)
    };

    // deposit: 0 if trusted
    let deposit = if inputs.trusted {
        0
    } else {
        inputs.zone_default_deposit.max(0)
    };

    PricingOutput {
        price_per_minute,
        price_unlock,
        deposit,
    }
}

/// Guards against upstream noise: non-positive multipliers fall back to
/// the default.
fn clamp_pos(v: f64, default: f64) -> f64 {
    if v > 0.0 {
        v
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> PricingInputs {
        PricingInputs {
            zone_price_per_minute: 10,
            zone_price_unlock: 20,
            zone_default_deposit: 100,
            surge: 1.0,
            low_charge_discount: 1.0,
            low_charge_threshold_percent: 0,
            scooter_charge_percent: 80,
            has_subscription: false,
            trusted: false,
        }
    }

    #[test]
    fn plain_tariff_passes_through() {
        let out = calculate(base_inputs());
        assert_eq!(
            out,
            PricingOutput {
                price_per_minute: 10,
                price_unlock: 20,
                deposit: 100,
            }
        );
    }

    #[test]
    fn subscription_trust_and_low_charge() {
        let out = calculate(PricingInputs {
            zone_default_deposit: 200,
            surge: 1.2,
            low_charge_discount: 0.5,
            low_charge_threshold_percent: 30,
            scooter_charge_percent: 10,
            has_subscription: true,
            trusted: true,
            ..base_inputs()
        });
        // 10 * 1.2 * 0.5 = 6
        assert_eq!(out.price_per_minute, 6);
        assert_eq!(out.price_unlock, 0);
        assert_eq!(out.deposit, 0);
    }

    #[test]
    fn charge_at_threshold_gets_no_discount() {
        let out = calculate(PricingInputs {
            low_charge_discount: 0.5,
            low_charge_threshold_percent: 30,
            scooter_charge_percent: 30,
            ..base_inputs()
        });
        assert_eq!(out.price_per_minute, 10);
    }

    #[test]
    fn zero_threshold_disables_discount() {
        let out = calculate(PricingInputs {
            low_charge_discount: 0.5,
            low_charge_threshold_percent: 0,
            scooter_charge_percent: 5,
            ..base_inputs()
        });
        assert_eq!(out.price_per_minute, 10);
    }

    #[test]
    fn negative_charge_reading_gets_no_discount() {
        let out = calculate(PricingInputs {
            low_charge_discount: 0.5,
            low_charge_threshold_percent: 30,
            scooter_charge_percent: -1,
            ..base_inputs()
        });
        assert_eq!(out.price_per_minute, 10);
    }

    #[test]
    fn non_positive_multipliers_fall_back_to_one() {
        let out = calculate(PricingInputs {
            surge: 0.0,
            low_charge_discount: -2.5,
            low_charge_threshold_percent: 30,
            scooter_charge_percent: 10,
            ..base_inputs()
        });
        assert_eq!(out.price_per_minute, 10);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let out = calculate(PricingInputs {
            zone_price_per_minute: 5,
            low_charge_discount: 0.5,
            low_charge_threshold_percent: 30,
            scooter_charge_percent: 10,
            ..base_inputs()
        });
        // 5 * 0.5 = 2.5 rounds up
        assert_eq!(out.price_per_minute, 3);
    }

    #[test]
    fn negative_tariff_values_clamp_to_zero() {
        let out = calculate(PricingInputs {
            zone_price_per_minute: -10,
            zone_price_unlock: -20,
            zone_default_deposit: -100,
            ..base_inputs()
        });
        assert_eq!(
            out,
            PricingOutput {
                price_per_minute: 0,
                price_unlock: 0,
                deposit: 0,
            }
        );
    }
}
