/// The largest reading of a 10-bit ADC, such as the MCP3008 or an Arduino analog pin.
pub const ADC_MAX_10_BIT: u16 = 1023;
/// The largest reading of a 12-bit ADC, such as the ESP32 oneshot driver.
pub const ADC_MAX_12_BIT: u16 = 4095;

/// How the sensor resistance is derived from a raw reading.
///
/// The sensor (R<sub>s</sub>) and the load resistor (R<sub>L</sub>) form a voltage divider
/// across V<sub>c</sub>, and the ADC samples the voltage over R<sub>L</sub>. Both variants
/// describe that circuit. They agree whenever the ADC reference equals V<sub>c</sub>.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Divider {
    /// Converts the reading to V<sub>out</sub> = raw * V<sub>c</sub> / adc_max first, then
    /// R<sub>s</sub> = R<sub>L</sub> * (V<sub>c</sub> - V<sub>out</sub>) / V<sub>out</sub>.
    Voltage,
    /// Works on the reading directly: R<sub>s</sub> = R<sub>L</sub> * (adc_max - raw) / raw.
    ///
    /// V<sub>c</sub> is ignored.
    AdcRatio,
}

/// The electrical setup of the sensor board.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircuitConfig {
    /// The load resistance R<sub>L</sub>, in ohms.
    pub load_resistance: f32,
    /// The supply voltage V<sub>c</sub> across the divider, in volts.
    pub supply_voltage: f32,
    /// The reading that corresponds to V<sub>c</sub> at the ADC.
    pub adc_max: u16,
    pub divider: Divider,
}

/// A 10kΩ load on a 5V supply, sampled by a 10-bit ADC.
pub const DEFAULT_CIRCUIT_CONFIG: CircuitConfig = CircuitConfig {
    load_resistance: 10_000.0,
    supply_voltage: 5.0,
    adc_max: ADC_MAX_10_BIT,
    divider: Divider::Voltage,
};

impl CircuitConfig {
    /// Whether every value can be used without producing NaN or infinities downstream.
    pub fn is_valid(&self) -> bool {
        is_positive(self.load_resistance) && is_positive(self.supply_voltage) && self.adc_max > 0
    }
}

pub(crate) fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// Converts a raw ADC reading into the sensor resistance R<sub>s</sub>, in ohms.
///
/// Readings that cannot describe a real resistance return 0 rather than an error: a zero
/// reading (no voltage over R<sub>L</sub>), a reading above `adc_max`, or anything that would
/// otherwise be negative or non-finite. A reading of exactly `adc_max` means the sensor has no
/// resistance left and also returns 0.
pub fn raw_to_resistance(raw: u16, config: &CircuitConfig) -> f32 {
    if raw >= config.adc_max {
        return 0.0;
    }
    let resistance = match config.divider {
        Divider::Voltage => {
            let v_out = raw as f32 * (config.supply_voltage / config.adc_max as f32);
            if v_out <= 0.0 {
                return 0.0;
            }
            config.load_resistance * (config.supply_voltage - v_out) / v_out
        }
        Divider::AdcRatio => {
            if raw == 0 {
                return 0.0;
            }
            config.load_resistance * (config.adc_max as f32 - raw as f32) / raw as f32
        }
    };
    if is_positive(resistance) {
        resistance
    } else {
        0.0
    }
}
