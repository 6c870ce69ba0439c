pub mod adc;
pub mod delay;
