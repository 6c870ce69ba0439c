use libm::{log10f, powf};

/// A straight-line fit of the sensor's response on the datasheet's log-log chart.
///
/// The line passes through (x<sub>0</sub>, y<sub>0</sub>) = (log<sub>10</sub>(ppm),
/// log<sub>10</sub>(R<sub>s</sub>/R<sub>o</sub>)) with the given slope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GasCurve {
    pub x0: f32,
    pub y0: f32,
    pub slope: f32,
}

/// Hydrogen, read off the MQ-8 datasheet between 200ppm and 10000ppm.
pub const H2_CURVE: GasCurve = GasCurve::new(2.3, 0.93, -1.44);

/// A single-slope hydrogen approximation that treats R<sub>s</sub> = R<sub>o</sub> as 1ppm.
///
/// Cruder than [`H2_CURVE`]. Useful when matching readings from boards that ship with this
/// simpler model.
pub const H2_SIMPLE_CURVE: GasCurve = GasCurve::new(0.0, 0.0, -0.6);

impl GasCurve {
    pub const fn new(x0: f32, y0: f32, slope: f32) -> GasCurve {
        GasCurve { x0, y0, slope }
    }

    /// A curve is usable if all points are finite and the line is not flat.
    pub fn is_valid(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.slope.is_finite() && self.slope != 0.0
    }
}

/// Estimates the gas concentration in ppm from the sensor resistance.
///
/// ppm = 10<sup>(log<sub>10</sub>(R<sub>s</sub>/R<sub>o</sub>) - y<sub>0</sub>) / slope +
/// x<sub>0</sub></sup>
///
/// Returns 0 if either resistance is not positive, or if the result would not be finite.
pub fn resistance_to_ppm(rs: f32, ro: f32, curve: &GasCurve) -> f32 {
    // Negated comparisons also catch NaN.
    if !(rs > 0.0) || !(ro > 0.0) {
        return 0.0;
    }
    let exponent = (log10f(rs / ro) - curve.y0) / curve.slope + curve.x0;
    let ppm = powf(10.0, exponent);
    if ppm.is_finite() {
        ppm
    } else {
        0.0
    }
}
