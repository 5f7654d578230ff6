use crate::error::{Error, Result};

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};
use rand_core::RngCore;
use rand_distr::{Distribution, Uniform};

pub const CURVE_SAMPLES: usize = 25;

/// Daily activity profile, one sample per hour.
/// Sample 0 is 11PM of the previous day and sample 1 is midnight, so the
/// curve is read one hour ahead. The last sample closes the day since the
/// array is not circular.
#[derive(Debug, Clone, PartialEq)]
pub struct DiurnalCurve(pub [f64; CURVE_SAMPLES]);

// Crude hand-tuned points: quiet nights, busy mornings and afternoons
#[rustfmt::skip]
pub static WEEKDAY_CURVE: DiurnalCurve = DiurnalCurve([
    0.0,  // 11PM
    0.4,  // 12AM
    0.0,  // 01AM
    0.0,  // 02AM
    0.0,  // 03AM
    0.0,  // 04AM
    0.0,  // 05AM
    0.1,  // 06AM
    0.2,  // 07AM
    0.4,  // 08AM
    0.95, // 09AM
    0.9,  // 10AM
    0.9,  // 11AM
    0.95, // 12PM
    0.9,  // 01PM
    0.9,  // 02PM
    0.9,  // 03PM
    0.9,  // 04PM
    0.95, // 05PM
    0.4,  // 06PM
    0.1,  // 07PM
    0.0,  // 08PM
    0.0,  // 09PM
    0.0,  // 10PM
    0.0,  // 11PM
]);

#[rustfmt::skip]
pub static WEEKEND_CURVE: DiurnalCurve = DiurnalCurve([
    0.0,  // 11PM
    0.4,  // 12AM
    0.0,  // 01AM
    0.0,  // 02AM
    0.0,  // 03AM
    0.0,  // 04AM
    0.0,  // 05AM
    0.0,  // 06AM
    0.1,  // 07AM
    0.2,  // 08AM
    0.5,  // 09AM
    0.45, // 10AM
    0.45, // 11AM
    0.5,  // 12PM
    0.45, // 01PM
    0.45, // 02PM
    0.45, // 03PM
    0.45, // 04PM
    0.5,  // 05PM
    0.2,  // 06PM
    0.0,  // 07PM
    0.0,  // 08PM
    0.0,  // 09PM
    0.0,  // 10PM
    0.0,  // 11PM
]);

pub fn activity_curve(weekend: bool) -> &'static DiurnalCurve {
    if weekend {
        &WEEKEND_CURVE
    } else {
        &WEEKDAY_CURVE
    }
}

fn sign(x: f64) -> i8 {
    if x > 0. {
        1
    } else if x < 0. {
        -1
    } else {
        0
    }
}

/// One-sided three-point derivative at an end of the curve, limited so the
/// interpolant stays shape-preserving
fn edge_derivative(delta_edge: f64, delta_next: f64) -> f64 {
    let d = (3. * delta_edge - delta_next) / 2.;
    if sign(d) != sign(delta_edge) {
        0.
    } else if sign(delta_edge) != sign(delta_next) && d.abs() > 3. * delta_edge.abs() {
        3. * delta_edge
    } else {
        d
    }
}

impl DiurnalCurve {
    /// Derivatives at the samples of the monotone piecewise cubic Hermite
    /// interpolant (Fritsch-Carlson), with unit spacing
    fn derivatives(&self) -> [f64; CURVE_SAMPLES] {
        let y = &self.0;
        let mut delta = [0.; CURVE_SAMPLES - 1];
        for k in 0..CURVE_SAMPLES - 1 {
            delta[k] = y[k + 1] - y[k];
        }
        let mut d = [0.; CURVE_SAMPLES];
        for k in 1..CURVE_SAMPLES - 1 {
            let (before, after) = (delta[k - 1], delta[k]);
            // local extrema and flat segments get a zero slope
            d[k] = if sign(before) * sign(after) <= 0 {
                0.
            } else {
                2. / (1. / before + 1. / after)
            };
        }
        d[0] = edge_derivative(delta[0], delta[1]);
        d[CURVE_SAMPLES - 1] = edge_derivative(delta[CURVE_SAMPLES - 2], delta[CURVE_SAMPLES - 3]);
        d
    }

    /// Interpolated activity at `x`, in samples. `x` is clamped to the curve.
    pub fn interpolate(&self, x: f64) -> f64 {
        let x = x.clamp(0., (CURVE_SAMPLES - 1) as f64);
        let d = self.derivatives();
        let k = (x.floor() as usize).min(CURVE_SAMPLES - 2);
        let t = x - k as f64;
        let (t2, t3) = (t * t, t * t * t);
        let h00 = 2. * t3 - 3. * t2 + 1.;
        let h10 = t3 - 2. * t2 + t;
        let h01 = -2. * t3 + 3. * t2;
        let h11 = t3 - t2;
        h00 * self.0[k] + h10 * d[k] + h01 * self.0[k + 1] + h11 * d[k + 1]
    }
}

/// Scalar in [0,1] used to scale a duration: quiet hours yield high values
/// (longer durations) and busy hours low values.
///
/// `hour` is the local time of day in [0,24), fractions allowed (12.5 is
/// 12:30).
pub fn duration_scalar(hour: f64, weekend: bool) -> Result<f64> {
    if !(0. ..24.).contains(&hour) {
        return Err(Error::Domain(format!(
            "hour must be in [0,24), value given was {hour}"
        )));
    }
    let x = (hour + 1.) % 24.;
    let activity = activity_curve(weekend).interpolate(x);
    Ok((1. - activity).clamp(0., 1.))
}

/// Random gap before the next packet: uniform in [0, remaining / count]
pub fn inter_packet_delay_micros(
    remaining_micros: u64,
    remaining_packets: u64,
    rng: &mut impl RngCore,
) -> Result<u64> {
    if remaining_packets == 0 {
        return Err(Error::Configuration(
            "cannot spread a delay over zero remaining packets".into(),
        ));
    }
    let avg_gap = remaining_micros / remaining_packets;
    Ok(Uniform::new_inclusive(0, avg_gap).sample(rng))
}

/// Local time of day and day kind of a Unix timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOfDay {
    pub hour: f64,
    pub weekend: bool,
}

pub fn time_of_day(epoch_seconds: u64, offset: FixedOffset) -> Result<TimeOfDay> {
    let date = i64::try_from(epoch_seconds)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            Error::Configuration(format!("timestamp {epoch_seconds} is out of range"))
        })?
        .with_timezone(&offset);
    Ok(TimeOfDay {
        hour: date.time().num_seconds_from_midnight() as f64 / 3600.,
        weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
    })
}

/// Duration scalar at a given Unix time
pub fn duration_scalar_at(epoch_seconds: u64, offset: FixedOffset) -> Result<f64> {
    let t = time_of_day(epoch_seconds, offset)?;
    duration_scalar(t.hour, t.weekend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn interpolation_goes_through_samples() {
        for curve in [&WEEKDAY_CURVE, &WEEKEND_CURVE] {
            for (k, y) in curve.0.iter().enumerate() {
                assert!((curve.interpolate(k as f64) - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn interpolation_preserves_shape() {
        // a flat stretch stays flat and a plateau is never overshot
        for i in 0..100 {
            let x = 2. + 4. * (i as f64) / 100.;
            assert!(WEEKDAY_CURVE.interpolate(x).abs() < 1e-12);
        }
        for i in 0..=1000 {
            let x = 24. * (i as f64) / 1000.;
            let v = WEEKDAY_CURVE.interpolate(x);
            assert!((-1e-12..=0.95 + 1e-12).contains(&v), "{x} -> {v}");
        }
    }

    #[test]
    fn scalar_in_unit_interval() {
        for weekend in [false, true] {
            for i in 0..2400 {
                let s = duration_scalar(i as f64 / 100., weekend).unwrap();
                assert!((0. ..=1.).contains(&s));
            }
        }
    }

    #[test]
    fn scalar_domain() {
        for hour in [24., -0.001, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                duration_scalar(hour, false),
                Err(Error::Domain(_))
            ));
        }
        assert!(duration_scalar(0., true).is_ok());
        assert!(duration_scalar(23.999, true).is_ok());
    }

    #[test]
    fn busy_morning_is_below_quiet_night() {
        let morning = duration_scalar(9., false).unwrap();
        let night = duration_scalar(2., false).unwrap();
        assert!((morning - 0.05).abs() < 1e-9);
        assert!((night - 1.).abs() < 1e-9);
        assert!(morning < night - 0.5);
        // weekends are quieter
        assert!(duration_scalar(9., true).unwrap() > morning);
    }

    #[test]
    fn delay_bounds() {
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..1000 {
            let d = inter_packet_delay_micros(500_000, 1, &mut rng).unwrap();
            assert!(d <= 500_000);
            let d = inter_packet_delay_micros(1_000, 10, &mut rng).unwrap();
            assert!(d <= 100);
        }
        assert_eq!(inter_packet_delay_micros(5, 10, &mut rng).unwrap(), 0);
        assert!(matches!(
            inter_packet_delay_micros(500_000, 0, &mut rng),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn local_time() {
        let utc = FixedOffset::east_opt(0).unwrap();
        // 2024-05-01 09:30:00 UTC, a Wednesday
        let t = time_of_day(1_714_555_800, utc).unwrap();
        assert!((t.hour - 9.5).abs() < 1e-9);
        assert!(!t.weekend);
        // 2024-05-04 23:00:00 UTC is a Saturday, but already Sunday in UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let t = time_of_day(1_714_863_600, plus_two).unwrap();
        assert!((t.hour - 1.).abs() < 1e-9);
        assert!(t.weekend);
        assert!(time_of_day(u64::MAX, utc).is_err());
    }
}
