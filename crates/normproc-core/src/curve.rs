//! Response curves used to reshape grayscale intensity before blurring.
//!
//! A [`ResponseCurve`] is a list of keyframes evaluated with cubic Hermite
//! interpolation. Outside the key range the curve is flat: it returns the
//! value of the first or last key. Key values themselves are not bounded,
//! so evaluated output may leave `[0, 1]`.
//!
//! # Example
//!
//! ```rust
//! use normproc_core::ResponseCurve;
//!
//! let curve = ResponseCurve::linear(0.0, 0.0, 1.0, 1.0);
//! assert!((curve.evaluate(0.25) - 0.25).abs() < 1e-6);
//! assert_eq!(curve.evaluate(2.0), 1.0); // clamped extrapolation
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single curve key with Hermite tangents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Input position.
    pub time: f32,
    /// Output value at `time`.
    pub value: f32,
    /// Slope arriving at this key.
    pub in_tangent: f32,
    /// Slope leaving this key.
    pub out_tangent: f32,
}

impl Keyframe {
    /// Creates a key with explicit tangents.
    #[inline]
    pub const fn new(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }
}

/// Keyframed response curve.
///
/// Keys are kept sorted by time with strictly increasing times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    keys: Vec<Keyframe>,
}

impl ResponseCurve {
    /// Straight line from `(t0, v0)` to `(t1, v1)`.
    ///
    /// Both tangents equal the line's slope, so Hermite evaluation is exact.
    pub fn linear(t0: f32, v0: f32, t1: f32, v1: f32) -> Self {
        if (t1 - t0).abs() <= f32::EPSILON {
            return Self::constant(v1);
        }
        let slope = (v1 - v0) / (t1 - t0);
        Self {
            keys: vec![
                Keyframe::new(t0, v0, slope, slope),
                Keyframe::new(t1, v1, slope, slope),
            ],
        }
    }

    /// Curve returning `value` everywhere.
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, value, 0.0, 0.0)],
        }
    }

    /// Builds a curve from explicit keys.
    ///
    /// Keys are sorted by time; duplicate times and non-finite values are rejected.
    pub fn from_keys(mut keys: Vec<Keyframe>) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::invalid_curve("curve needs at least one key"));
        }
        if keys.iter().any(|k| !k.time.is_finite() || !k.value.is_finite()) {
            return Err(Error::invalid_curve("key time and value must be finite"));
        }
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        if keys.windows(2).any(|w| w[0].time == w[1].time) {
            return Err(Error::invalid_curve("duplicate key time"));
        }
        Ok(Self { keys })
    }

    /// Builds a smooth curve through `(time, value)` points.
    ///
    /// Interior tangents use the slope between neighbours; end tangents use
    /// the slope of the adjacent segment.
    pub fn from_points(points: &[(f32, f32)]) -> Result<Self> {
        let mut pts = points.to_vec();
        pts.sort_by(|a, b| a.0.total_cmp(&b.0));
        let n = pts.len();
        let slope = |a: (f32, f32), b: (f32, f32)| {
            let dt = b.0 - a.0;
            if dt.abs() <= f32::EPSILON { 0.0 } else { (b.1 - a.1) / dt }
        };
        let keys = (0..n)
            .map(|i| {
                let m = match (i, n) {
                    (_, 1) => 0.0,
                    (0, _) => slope(pts[0], pts[1]),
                    (i, n) if i == n - 1 => slope(pts[n - 2], pts[n - 1]),
                    (i, _) => slope(pts[i - 1], pts[i + 1]),
                };
                Keyframe::new(pts[i].0, pts[i].1, m, m)
            })
            .collect();
        Self::from_keys(keys)
    }

    /// Keys sorted by time.
    #[inline]
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// True when the curve maps `[0, 1]` onto itself unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluates the curve at `t`.
    ///
    /// Flat extrapolation before the first and after the last key. A
    /// non-finite tangent makes the segment stepped (holds the left key).
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 0.0,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First key strictly after t; always in 1..len here.
        let i = self.keys.partition_point(|k| k.time <= t);
        let k0 = &self.keys[i - 1];
        let k1 = &self.keys[i];

        if !k0.out_tangent.is_finite() || !k1.in_tangent.is_finite() {
            return k0.value;
        }

        let dt = k1.time - k0.time;
        let s = (t - k0.time) / dt;
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * k0.value + h10 * dt * k0.out_tangent + h01 * k1.value + h11 * dt * k1.in_tangent
    }
}

impl Default for ResponseCurve {
    /// Identity line `(0, 0) - (1, 1)`.
    fn default() -> Self {
        Self::linear(0.0, 0.0, 1.0, 1.0)
    }
}

impl std::str::FromStr for ResponseCurve {
    type Err = Error;

    /// Parses `"t:v,t:v,..."` control points, e.g. `"0:0,0.5:0.8,1:1"`.
    ///
    /// Two points build a straight line; more points build a smooth curve.
    fn from_str(s: &str) -> Result<Self> {
        let points = s
            .split(',')
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                let (t, v) = p
                    .split_once(':')
                    .ok_or_else(|| Error::invalid_curve(format!("expected t:v, got '{p}'")))?;
                let t = t.trim().parse::<f32>().map_err(|e| Error::invalid_curve(format!("'{t}': {e}")))?;
                let v = v.trim().parse::<f32>().map_err(|e| Error::invalid_curve(format!("'{v}': {e}")))?;
                Ok((t, v))
            })
            .collect::<Result<Vec<_>>>()?;

        match points.as_slice() {
            [] => Err(Error::invalid_curve("no control points")),
            [(_, v)] => Ok(Self::constant(*v)),
            [a, b] => {
                let (a, b) = if a.0 <= b.0 { (a, b) } else { (b, a) };
                if a.0 == b.0 {
                    return Err(Error::invalid_curve("duplicate key time"));
                }
                Ok(Self::linear(a.0, a.1, b.0, b.1))
            }
            _ => Self::from_points(&points),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linear_is_exact() {
        let c = ResponseCurve::default();
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            assert_abs_diff_eq!(c.evaluate(t), t, epsilon = 1e-6);
        }
        assert!(c.is_identity());
    }

    #[test]
    fn test_flat_extrapolation() {
        let c = ResponseCurve::linear(0.2, 0.1, 0.8, 0.9);
        assert_eq!(c.evaluate(-1.0), 0.1);
        assert_eq!(c.evaluate(0.0), 0.1);
        assert_eq!(c.evaluate(1.0), 0.9);
        assert_eq!(c.evaluate(5.0), 0.9);
    }

    #[test]
    fn test_values_outside_unit_range() {
        let c = ResponseCurve::linear(0.0, -0.5, 1.0, 2.0);
        assert_eq!(c.evaluate(0.0), -0.5);
        assert_eq!(c.evaluate(1.0), 2.0);
    }

    #[test]
    fn test_from_points_passes_through_keys() {
        let c = ResponseCurve::from_points(&[(0.0, 0.0), (0.5, 0.8), (1.0, 1.0)]).unwrap();
        assert_abs_diff_eq!(c.evaluate(0.5), 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(c.evaluate(1.0), 1.0, epsilon = 1e-6);
        let mid = c.evaluate(0.25);
        assert!(mid > 0.0 && mid < 0.8);
    }

    #[test]
    fn test_stepped_tangent() {
        let c = ResponseCurve::from_keys(vec![
            Keyframe::new(0.0, 0.2, 0.0, f32::INFINITY),
            Keyframe::new(1.0, 0.9, 0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(c.evaluate(0.7), 0.2);
    }

    #[test]
    fn test_from_keys_rejects_bad_input() {
        assert!(ResponseCurve::from_keys(vec![]).is_err());
        assert!(ResponseCurve::from_keys(vec![
            Keyframe::new(0.5, 0.0, 0.0, 0.0),
            Keyframe::new(0.5, 1.0, 0.0, 0.0),
        ])
        .is_err());
    }

    #[test]
    fn test_parse() {
        let c: ResponseCurve = "0:0,1:1".parse().unwrap();
        assert!(c.is_identity());
        let c: ResponseCurve = "1:0, 0:1".parse().unwrap();
        assert_abs_diff_eq!(c.evaluate(0.25), 0.75, epsilon = 1e-6);
        assert_eq!(c.keys().len(), 2);
        assert!("0.5".parse::<ResponseCurve>().is_err());
        assert!("".parse::<ResponseCurve>().is_err());
        assert!("0:a".parse::<ResponseCurve>().is_err());
        let k: ResponseCurve = "0:0.3".parse().unwrap();
        assert_eq!(k.evaluate(0.9), 0.3);
    }
}
