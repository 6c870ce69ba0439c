use embedded_hal::adc::{Channel, OneShot};
use nb;

#[derive(Debug, PartialEq)]
pub struct AdcError();

pub enum FakeRead {
    Success(u16),
    Error(),
    AsyncSuccess(u16),
}

/// Marker type for the fake ADC peripheral.
pub struct Adc1;

pub struct Pin0;

impl Channel<Adc1> for Pin0 {
    type ID = u8;

    fn channel() -> u8 {
        0
    }
}

pub struct ADC {
    reads: Vec<FakeRead>,
    default_read: Option<u16>,
    pending: bool,
    read_count: usize,
}

impl ADC {
    /// An ADC that returns each read in order, then fails.
    pub fn new(reads: Vec<FakeRead>) -> ADC {
        ADC {
            reads: reads,
            default_read: None,
            pending: false,
            read_count: 0,
        }
    }

    /// An ADC that always returns the same value.
    pub fn constant(value: u16) -> ADC {
        ADC {
            reads: Vec::new(),
            default_read: Some(value),
            pending: false,
            read_count: 0,
        }
    }

    /// The number of completed reads, successful or not.
    pub fn get_read_count(&self) -> usize {
        self.read_count
    }
}

impl OneShot<Adc1, u16, Pin0> for ADC {
    type Error = AdcError;

    fn read(&mut self, _pin: &mut Pin0) -> nb::Result<u16, AdcError> {
        if self.reads.is_empty() {
            self.read_count += 1;
            return match self.default_read {
                Some(value) => Ok(value),
                None => Err(nb::Error::Other(AdcError())),
            };
        }
        if let FakeRead::AsyncSuccess(_) = self.reads[0] {
            if !self.pending {
                self.pending = true;
                return Err(nb::Error::WouldBlock);
            }
        }
        self.pending = false;
        self.read_count += 1;
        match self.reads.remove(0) {
            FakeRead::Success(value) => Ok(value),
            FakeRead::AsyncSuccess(value) => Ok(value),
            FakeRead::Error() => Err(nb::Error::Other(AdcError())),
        }
    }
}
