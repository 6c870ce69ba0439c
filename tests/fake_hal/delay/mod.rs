use embedded_hal::blocking::delay::DelayMs;
use std::thread;
use std::time::Duration;

/// Records each requested delay without waiting.
#[derive(Debug, Default)]
pub struct Delay {
    requested: Vec<u32>,
}

impl Delay {
    pub fn new() -> Delay {
        Delay::default()
    }

    pub fn get_requested(&self) -> &[u32] {
        self.requested.as_slice()
    }
}

impl DelayMs<u32> for Delay {
    fn delay_ms(&mut self, ms: u32) {
        self.requested.push(ms);
    }
}

/// Blocks the current thread for each requested delay.
#[derive(Debug)]
pub struct SleepingDelay;

impl DelayMs<u32> for SleepingDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}
