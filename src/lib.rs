#![no_std]

/// Gas response curves and the resistance-to-concentration model.
pub mod curve;
/// Voltage-divider math for turning raw ADC readings into sensor resistance.
pub mod divider;
/// Driver for MQ-8 hydrogen gas sensors.
///
/// Refer to [this datasheet](https://www.sparkfun.com/datasheets/Sensors/Biometric/MQ-8.pdf) for
/// more information about the sensor.
pub mod mq8;
/// Sources of raw analog samples.
pub mod source;
