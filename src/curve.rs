//! Temperature to speed curves.
//!
//! A curve is a short list of `(temperature, speed)` points with strictly
//! ascending temperatures. Speeds between two points are linearly
//! interpolated, outside the curve the nearest endpoint's speed is used.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::{
    consts::{FULL_SPEED, MAX_CURVE_POINTS},
    Error, Result,
};

/// A single control point: at `temp` degrees Celsius run at `speed` percent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedCurvePoint {
    pub temp: i16,
    pub speed: u8,
}

impl SpeedCurvePoint {
    pub const fn new(temp: i16, speed: u8) -> Self {
        Self { temp, speed }
    }
}

/// Validated speed curve.
///
/// Deserializing goes through [`SpeedCurve::new`], so a curve built by host
/// tooling is checked the same way as one declared in firmware.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    try_from = "Vec<SpeedCurvePoint, MAX_CURVE_POINTS>",
    into = "Vec<SpeedCurvePoint, MAX_CURVE_POINTS>"
)]
pub struct SpeedCurve {
    points: Vec<SpeedCurvePoint, MAX_CURVE_POINTS>,
}

/// Quietest and loudest speeds a curve uses, excluding off and full.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FanBounds {
    pub min_speed: u8,
    pub max_speed: u8,
}

impl SpeedCurve {
    /// Builds a curve, rejecting empty or oversized point lists, speeds
    /// above 100 and temperatures that are not strictly ascending.
    pub fn new(points: &[SpeedCurvePoint]) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyCurve);
        }
        let points: Vec<SpeedCurvePoint, MAX_CURVE_POINTS> =
            Vec::from_slice(points).map_err(|_| Error::TooManyPoints)?;

        for (index, point) in points.iter().enumerate() {
            if point.speed > FULL_SPEED {
                return Err(Error::SpeedOutOfRange { index });
            }
        }
        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].temp <= pair[0].temp)
        {
            return Err(Error::UnsortedCurve { index: index + 1 });
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[SpeedCurvePoint] {
        &self.points
    }

    /// Speed in percent for the given temperature.
    pub fn interpolate(&self, temp: f32) -> u8 {
        let mut start = None;
        let mut end = None;

        for point in self.points.iter() {
            if f32::from(point.temp) > temp {
                end = Some(point);
                break;
            }
            start = Some(point);
        }

        match (start, end) {
            (Some(start), Some(end)) => {
                let start_speed = f32::from(start.speed);
                let start_temp = f32::from(start.temp);
                let speed = start_speed
                    + (f32::from(end.speed) - start_speed) * (temp - start_temp)
                        / (f32::from(end.temp) - start_temp);

                // `as` truncates toward zero and saturates at 0
                (speed as u8).min(FULL_SPEED)
            }
            (Some(point), None) | (None, Some(point)) => point.speed,
            // `new` never builds an empty curve
            (None, None) => FULL_SPEED,
        }
    }

    /// Lowest non-zero speed below 100 and highest speed below 100, or
    /// `None` when the curve has no such points.
    pub fn bounds(&self) -> Option<FanBounds> {
        let below_full = || self.points.iter().map(|p| p.speed).filter(|s| *s < FULL_SPEED);

        let min_speed = below_full().filter(|s| *s > 0).min()?;
        let max_speed = below_full().max()?;

        Some(FanBounds {
            min_speed,
            max_speed,
        })
    }
}

impl TryFrom<Vec<SpeedCurvePoint, MAX_CURVE_POINTS>> for SpeedCurve {
    type Error = Error;

    fn try_from(points: Vec<SpeedCurvePoint, MAX_CURVE_POINTS>) -> Result<Self> {
        Self::new(&points)
    }
}

impl From<SpeedCurve> for Vec<SpeedCurvePoint, MAX_CURVE_POINTS> {
    fn from(curve: SpeedCurve) -> Self {
        curve.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: &[(i16, u8)]) -> SpeedCurve {
        let points: std::vec::Vec<_> = points
            .iter()
            .map(|(t, s)| SpeedCurvePoint::new(*t, *s))
            .collect();
        SpeedCurve::new(&points).unwrap()
    }

    #[test]
    fn single_point_is_flat() {
        let c = curve(&[(40, 35)]);
        for temp in [-40.0, 0.0, 39.9, 40.0, 40.1, 120.0] {
            assert_eq!(c.interpolate(temp), 35);
        }
    }

    #[test]
    fn interpolates_between_points() {
        let c = curve(&[(0, 20), (50, 60), (100, 100)]);
        assert_eq!(c.interpolate(25.0), 40);
        assert_eq!(c.interpolate(75.0), 80);
    }

    #[test]
    fn extrapolates_flat() {
        let c = curve(&[(0, 20), (50, 60), (100, 100)]);
        assert_eq!(c.interpolate(-10.0), 20);
        assert_eq!(c.interpolate(150.0), 100);
    }

    #[test]
    fn exact_points() {
        let c = curve(&[(0, 20), (50, 60), (100, 100)]);
        assert_eq!(c.interpolate(0.0), 20);
        assert_eq!(c.interpolate(50.0), 60);
        assert_eq!(c.interpolate(100.0), 100);
    }

    #[test]
    fn truncates_fractional_speeds() {
        let c = curve(&[(0, 0), (3, 10)]);
        assert_eq!(c.interpolate(1.0), 3);
        assert_eq!(c.interpolate(2.0), 6);
    }

    #[test]
    fn falling_segment() {
        let c = curve(&[(0, 80), (10, 40)]);
        assert_eq!(c.interpolate(5.0), 60);
    }

    #[test]
    fn negative_temperatures() {
        let c = curve(&[(-20, 10), (20, 50)]);
        assert_eq!(c.interpolate(0.0), 30);
        assert_eq!(c.interpolate(-30.0), 10);
    }

    #[test]
    fn nan_runs_hottest_point() {
        let c = curve(&[(20, 30), (60, 90)]);
        assert_eq!(c.interpolate(f32::NAN), 90);
    }

    #[test]
    fn interpolate_is_pure() {
        let c = curve(&[(0, 20), (50, 60), (100, 100)]);
        let first = c.interpolate(33.3);
        for _ in 0..10 {
            assert_eq!(c.interpolate(33.3), first);
        }
        assert_eq!(c, curve(&[(0, 20), (50, 60), (100, 100)]));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(SpeedCurve::new(&[]), Err(Error::EmptyCurve));
    }

    #[test]
    fn rejects_too_many_points() {
        let points: std::vec::Vec<_> = (0..=MAX_CURVE_POINTS as i16)
            .map(|t| SpeedCurvePoint::new(t * 10, 50))
            .collect();
        assert_eq!(SpeedCurve::new(&points), Err(Error::TooManyPoints));
    }

    #[test]
    fn rejects_speed_above_full() {
        let points = [SpeedCurvePoint::new(0, 20), SpeedCurvePoint::new(10, 101)];
        assert_eq!(
            SpeedCurve::new(&points),
            Err(Error::SpeedOutOfRange { index: 1 })
        );
    }

    #[test]
    fn rejects_unsorted_and_duplicate_temperatures() {
        let unsorted = [
            SpeedCurvePoint::new(0, 20),
            SpeedCurvePoint::new(50, 60),
            SpeedCurvePoint::new(40, 70),
        ];
        assert_eq!(
            SpeedCurve::new(&unsorted),
            Err(Error::UnsortedCurve { index: 2 })
        );

        let duplicate = [SpeedCurvePoint::new(30, 20), SpeedCurvePoint::new(30, 60)];
        assert_eq!(
            SpeedCurve::new(&duplicate),
            Err(Error::UnsortedCurve { index: 1 })
        );
    }

    #[test]
    fn bounds_exclude_off_and_full() {
        let c = curve(&[(0, 20), (50, 60), (100, 100)]);
        assert_eq!(
            c.bounds(),
            Some(FanBounds {
                min_speed: 20,
                max_speed: 60
            })
        );

        let c = curve(&[(20, 0), (30, 25), (40, 70), (60, 100)]);
        assert_eq!(
            c.bounds(),
            Some(FanBounds {
                min_speed: 25,
                max_speed: 70
            })
        );
    }

    #[test]
    fn bounds_missing_for_off_or_full_only() {
        assert_eq!(curve(&[(0, 0), (50, 100)]).bounds(), None);
        assert_eq!(curve(&[(0, 100)]).bounds(), None);
        assert_eq!(curve(&[(0, 0)]).bounds(), None);
    }

    #[test]
    fn deserializing_validates() {
        let points = [SpeedCurvePoint::new(20, 30), SpeedCurvePoint::new(60, 90)];
        let bytes = postcard::to_vec::<_, 32>(&points[..]).unwrap();
        let c: SpeedCurve = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.points(), &points);

        let unsorted = [SpeedCurvePoint::new(60, 30), SpeedCurvePoint::new(20, 90)];
        let bytes = postcard::to_vec::<_, 32>(&unsorted[..]).unwrap();
        assert!(postcard::from_bytes::<SpeedCurve>(&bytes).is_err());
    }
}
