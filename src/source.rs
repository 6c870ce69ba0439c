use core::marker::PhantomData;
use embedded_hal::adc::{Channel, OneShot};

/// Something that produces one raw ADC reading per call.
///
/// Readings are expected in the range \[0, adc_max\] of the configured
/// [`CircuitConfig`](crate::divider::CircuitConfig). Returning `nb::Error::WouldBlock` is fine;
/// the driver waits for the reading to complete.
pub trait SampleSource {
    type Error;

    fn read_raw(&mut self) -> nb::Result<u16, Self::Error>;
}

/// Reads samples from a single analog channel of an embedded-hal ADC.
pub struct AnalogInput<'a, TAdc, TAdcKind, TPin> {
    adc: &'a mut TAdc,
    pin: &'a mut TPin,
    _adc_kind: PhantomData<TAdcKind>,
}

impl<'a, TAdc, TAdcKind, TPin> AnalogInput<'a, TAdc, TAdcKind, TPin>
where
    TAdc: OneShot<TAdcKind, u16, TPin>,
    TPin: Channel<TAdcKind>,
{
    /// Binds the ADC to the pin the sensor's analog output is wired to.
    ///
    /// The ADC's reference voltage should match the sensor's supply voltage, or the configured
    /// `adc_max` should be scaled to account for the difference.
    pub fn new(adc: &'a mut TAdc, pin: &'a mut TPin) -> AnalogInput<'a, TAdc, TAdcKind, TPin> {
        AnalogInput {
            adc,
            pin,
            _adc_kind: PhantomData,
        }
    }
}

impl<'a, TAdc, TAdcKind, TPin> SampleSource for AnalogInput<'a, TAdc, TAdcKind, TPin>
where
    TAdc: OneShot<TAdcKind, u16, TPin>,
    TPin: Channel<TAdcKind>,
{
    type Error = TAdc::Error;

    fn read_raw(&mut self) -> nb::Result<u16, Self::Error> {
        self.adc.read(&mut *self.pin)
    }
}
