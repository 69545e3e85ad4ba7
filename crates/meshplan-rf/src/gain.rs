//! Antenna gain as a function of angular deviation from boresight. A
//! pre-loaded table is the expected production source; [`ParabolicGain`] is
//! the closed-form fallback used in tests and wherever no table is supplied.

use crate::error::{Result, RfError};

/// Gain in dB at a combined (horizontal, vertical) deviation from boresight.
pub trait GainTable: Send + Sync {
    fn gain_db(&self, horizontal_dev_deg: f64, vertical_dev_deg: f64) -> f64;
}

/// Piecewise-linear interpolation over (deviation_deg, gain_db) control
/// points, sorted ascending by deviation. Horizontal and vertical deviation
/// are combined into one angular distance before lookup, matching a
/// rotationally symmetric antenna pattern.
#[derive(Debug, Clone)]
pub struct PiecewiseGainTable {
    points: Vec<(f64, f64)>,
}

impl PiecewiseGainTable {
    pub fn new(mut points: Vec<(f64, f64)>) -> Result<Self> {
        if points.is_empty() {
            return Err(RfError::EmptyGainTable);
        }
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        Ok(Self { points })
    }

    fn interpolate(&self, angle_deg: f64) -> f64 {
        let angle_deg = angle_deg.abs();
        if angle_deg <= self.points[0].0 {
            return self.points[0].1;
        }
        let last = self.points.len() - 1;
        if angle_deg >= self.points[last].0 {
            return self.points[last].1;
        }
        for w in self.points.windows(2) {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if angle_deg >= x0 && angle_deg <= x1 {
                if (x1 - x0).abs() < f64::EPSILON {
                    return y0;
                }
                let t = (angle_deg - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        self.points[last].1
    }
}

impl GainTable for PiecewiseGainTable {
    fn gain_db(&self, horizontal_dev_deg: f64, vertical_dev_deg: f64) -> f64 {
        let combined = (horizontal_dev_deg.powi(2) + vertical_dev_deg.powi(2)).sqrt();
        self.interpolate(combined)
    }
}

/// Closed-form 3-dB-beamwidth parabolic approximation:
/// `gain = boresight_gain_db - 12 * (angle / beamwidth_3db_deg)^2`, floored at
/// `floor_db` so the model does not produce implausibly deep nulls.
#[derive(Debug, Clone, Copy)]
pub struct ParabolicGain {
    pub boresight_gain_db: f64,
    pub beamwidth_3db_deg: f64,
    pub floor_db: f64,
}

impl ParabolicGain {
    pub fn new(boresight_gain_db: f64, beamwidth_3db_deg: f64) -> Self {
        Self {
            boresight_gain_db,
            beamwidth_3db_deg,
            floor_db: -30.0,
        }
    }
}

impl GainTable for ParabolicGain {
    fn gain_db(&self, horizontal_dev_deg: f64, vertical_dev_deg: f64) -> f64 {
        let combined = (horizontal_dev_deg.powi(2) + vertical_dev_deg.powi(2)).sqrt();
        let beamwidth = self.beamwidth_3db_deg.max(1e-6);
        let gain = self.boresight_gain_db - 12.0 * (combined / beamwidth).powi(2);
        gain.max(self.floor_db)
    }
}
