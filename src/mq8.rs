use core::fmt;
use core::future::Future;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use embedded_hal::blocking::delay::DelayMs;
use log::{debug, trace, warn};

pub use crate::curve::{GasCurve, H2_CURVE};
pub use crate::divider::{CircuitConfig, Divider, DEFAULT_CIRCUIT_CONFIG};

use crate::curve::resistance_to_ppm;
use crate::divider::{is_positive, raw_to_resistance};
use crate::source::SampleSource;

/// R<sub>s</sub>/R<sub>o</sub> of an MQ-8 in clean air, per the datasheet.
pub const CLEAN_AIR_FACTOR: f32 = 9.21;

/// The baseline resistance used until the sensor is calibrated.
pub const DEFAULT_BASELINE_RESISTANCE: f32 = 10_000.0;

#[derive(Debug, PartialEq)]
pub enum Error<TIoError> {
    /// Wrapped error from the sample source.
    Wrapped(TIoError),
    /// A sample count of zero was requested.
    Configuration,
    /// Calibration did not produce a usable baseline. Check the wiring and try again.
    BadData,
    /// The operation was cancelled before all samples were taken.
    Cancelled,
}

impl<TIoError> From<TIoError> for Error<TIoError> {
    fn from(error: TIoError) -> Error<TIoError> {
        Error::Wrapped(error)
    }
}

impl<TIoError> fmt::Display for Error<TIoError>
where
    TIoError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Wrapped(err) => write!(f, "IO error: {:?}", err),
            Error::Configuration => write!(f, "Invalid configuration"),
            Error::BadData => write!(f, "Calibration produced no usable baseline resistance"),
            Error::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A configuration value was rejected. Nothing was changed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigurationError;

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid configuration")
    }
}

/// Sample counts and intervals used by [`Mq8::calibrate`] and [`Mq8::read_resistance`].
///
/// Each batch takes roughly `samples * interval_ms` milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Options {
    pub calibration_samples: u32,
    pub calibration_interval_ms: u32,
    pub read_samples: u32,
    pub read_interval_ms: u32,
}

/// 50 calibration samples over 25 seconds, and 5 read samples over 250ms.
pub const DEFAULT_OPTIONS: Options = Options {
    calibration_samples: 50,
    calibration_interval_ms: 500,
    read_samples: 5,
    read_interval_ms: 50,
};

impl Options {
    pub fn is_valid(&self) -> bool {
        self.calibration_samples > 0 && self.read_samples > 0
    }
}

/// The result of a full read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Averaged sensor resistance R<sub>s</sub>, in ohms.
    pub resistance: f32,
    /// R<sub>s</sub>/R<sub>o</sub>. Zero if no sample produced a resistance.
    pub ratio: f32,
    /// Estimated concentration, in ppm.
    pub ppm: f32,
}

/// Running mean of the resistances of one batch of samples.
///
/// The sum is kept in `f64`; only the mean is narrowed to `f32`.
struct Batch {
    total: f64,
    taken: u32,
}

impl Batch {
    fn new() -> Batch {
        Batch {
            total: 0.0,
            taken: 0,
        }
    }

    fn push(&mut self, raw: u16, config: &CircuitConfig) {
        let resistance = raw_to_resistance(raw, config);
        trace!("sample {}: raw {} -> {} ohms", self.taken, raw, resistance);
        self.total += resistance as f64;
        self.taken += 1;
    }

    fn mean(&self) -> f32 {
        (self.total / self.taken as f64) as f32
    }
}

/// A driver that estimates hydrogen concentration from an MQ-8's analog output.
///
/// The driver holds the board's circuit configuration and the sensor's calibrated baseline
/// resistance (R<sub>o</sub>). Samples come from any [`SampleSource`], which is passed to each
/// read so that one ADC can be shared between several sensors. Each sensor needs its own `Mq8`.
pub struct Mq8<TDelay> {
    delay: TDelay,
    config: CircuitConfig,
    options: Options,
    baseline_resistance: f32,
    curve: GasCurve,
}

impl<TDelay> Mq8<TDelay> {
    /// Constructs an MQ-8 driver that waits between samples using the given delay.
    ///
    /// If `config` or `options` is `None`, then [`DEFAULT_CIRCUIT_CONFIG`] or
    /// [`DEFAULT_OPTIONS`] is used. The baseline resistance starts at
    /// [`DEFAULT_BASELINE_RESISTANCE`]; either [`calibrate`](Mq8::calibrate) the sensor in clean
    /// air or set a known value with [`set_baseline_resistance`](Mq8::set_baseline_resistance).
    pub fn new(
        delay: TDelay,
        config: Option<CircuitConfig>,
        options: Option<Options>,
    ) -> Result<Mq8<TDelay>, ConfigurationError> {
        let config = config.unwrap_or(DEFAULT_CIRCUIT_CONFIG);
        let options = options.unwrap_or(DEFAULT_OPTIONS);
        if !config.is_valid() || !options.is_valid() {
            warn!("rejected MQ-8 configuration {:?} {:?}", config, options);
            return Err(ConfigurationError);
        }
        Ok(Mq8 {
            delay,
            config,
            options,
            baseline_resistance: DEFAULT_BASELINE_RESISTANCE,
            curve: H2_CURVE,
        })
    }

    /// Releases the delay.
    pub fn release(self) -> TDelay {
        self.delay
    }

    pub fn circuit_config(&self) -> CircuitConfig {
        self.config
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn load_resistance(&self) -> f32 {
        self.config.load_resistance
    }

    /// The current R<sub>o</sub>, in ohms.
    pub fn baseline_resistance(&self) -> f32 {
        self.baseline_resistance
    }

    pub fn curve(&self) -> GasCurve {
        self.curve
    }

    /// Sets R<sub>L</sub>. Must be positive and finite.
    pub fn set_load_resistance(&mut self, ohms: f32) -> Result<(), ConfigurationError> {
        self.set_circuit_config(CircuitConfig {
            load_resistance: ohms,
            ..self.config
        })
    }

    /// Sets R<sub>o</sub> to a previously calibrated value. Must be positive and finite.
    pub fn set_baseline_resistance(&mut self, ohms: f32) -> Result<(), ConfigurationError> {
        if !is_positive(ohms) {
            warn!("rejected baseline resistance {}", ohms);
            return Err(ConfigurationError);
        }
        self.baseline_resistance = ohms;
        debug!("baseline resistance set to {} ohms", ohms);
        Ok(())
    }

    pub fn set_circuit_config(&mut self, config: CircuitConfig) -> Result<(), ConfigurationError> {
        if !config.is_valid() {
            warn!("rejected circuit configuration {:?}", config);
            return Err(ConfigurationError);
        }
        self.config = config;
        debug!("circuit configuration set to {:?}", config);
        Ok(())
    }

    pub fn set_options(&mut self, options: Options) -> Result<(), ConfigurationError> {
        if !options.is_valid() {
            warn!("rejected sampling options {:?}", options);
            return Err(ConfigurationError);
        }
        self.options = options;
        debug!("sampling options set to {:?}", options);
        Ok(())
    }

    /// Replaces all four sampling parameters at once. Neither count may be zero.
    pub fn set_sampling_parameters(
        &mut self,
        calibration_samples: u32,
        calibration_interval_ms: u32,
        read_samples: u32,
        read_interval_ms: u32,
    ) -> Result<(), ConfigurationError> {
        self.set_options(Options {
            calibration_samples,
            calibration_interval_ms,
            read_samples,
            read_interval_ms,
        })
    }

    /// Selects the gas response curve used for ppm estimates. Defaults to [`H2_CURVE`].
    pub fn set_curve(&mut self, curve: GasCurve) -> Result<(), ConfigurationError> {
        if !curve.is_valid() {
            warn!("rejected gas curve {:?}", curve);
            return Err(ConfigurationError);
        }
        self.curve = curve;
        Ok(())
    }

    /// Converts an averaged resistance into a full reading using the current calibration.
    pub fn reading_from_resistance(&self, resistance: f32) -> Reading {
        Reading {
            resistance,
            ratio: if resistance > 0.0 {
                resistance / self.baseline_resistance
            } else {
                0.0
            },
            ppm: resistance_to_ppm(resistance, self.baseline_resistance, &self.curve),
        }
    }

    /// Same as [`read_resistance_with`](Mq8::read_resistance_with), but awaits `delay_fn`
    /// between samples instead of blocking. Dropping the future cancels the read.
    pub async fn read_resistance_async<TSource, TIoError, DelayFn, EmptyFuture>(
        &mut self,
        source: &mut TSource,
        sample_count: u32,
        interval_ms: u32,
        delay_fn: DelayFn,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
        DelayFn: Fn(Duration) -> EmptyFuture,
        EmptyFuture: Future<Output = ()>,
    {
        if sample_count == 0 {
            warn!("rejected read of zero samples");
            return Err(Error::Configuration);
        }
        let mut batch = Batch::new();
        for _ in 0..sample_count {
            let raw = nb::block!(source.read_raw())?;
            batch.push(raw, &self.config);
            delay_fn(Duration::from_millis(interval_ms as u64)).await;
        }
        Ok(batch.mean())
    }

    /// Reads the concentration using the configured read options, awaiting `delay_fn` between
    /// samples.
    pub async fn read_async<TSource, TIoError, DelayFn, EmptyFuture>(
        &mut self,
        source: &mut TSource,
        delay_fn: DelayFn,
    ) -> Result<Reading, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
        DelayFn: Fn(Duration) -> EmptyFuture,
        EmptyFuture: Future<Output = ()>,
    {
        let Options {
            read_samples,
            read_interval_ms,
            ..
        } = self.options;
        let resistance = self
            .read_resistance_async(source, read_samples, read_interval_ms, delay_fn)
            .await?;
        Ok(self.reading_from_resistance(resistance))
    }

    /// Estimates the concentration in ppm, awaiting `delay_fn` between samples.
    pub async fn read_concentration_async<TSource, TIoError, DelayFn, EmptyFuture>(
        &mut self,
        source: &mut TSource,
        delay_fn: DelayFn,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
        DelayFn: Fn(Duration) -> EmptyFuture,
        EmptyFuture: Future<Output = ()>,
    {
        Ok(self.read_async(source, delay_fn).await?.ppm)
    }

    /// Calibrates using the configured calibration options, awaiting `delay_fn` between
    /// samples.
    pub async fn calibrate_async<TSource, TIoError, DelayFn, EmptyFuture>(
        &mut self,
        source: &mut TSource,
        delay_fn: DelayFn,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
        DelayFn: Fn(Duration) -> EmptyFuture,
        EmptyFuture: Future<Output = ()>,
    {
        let Options {
            calibration_samples,
            calibration_interval_ms,
            ..
        } = self.options;
        let clean_air_resistance = self
            .read_resistance_async(
                source,
                calibration_samples,
                calibration_interval_ms,
                delay_fn,
            )
            .await?;
        self.finish_calibration(clean_air_resistance, calibration_samples)
    }

    fn finish_calibration<TIoError>(
        &mut self,
        clean_air_resistance: f32,
        samples: u32,
    ) -> Result<f32, Error<TIoError>> {
        let baseline = clean_air_resistance / CLEAN_AIR_FACTOR;
        if !is_positive(baseline) {
            warn!(
                "calibration over {} samples gave no usable baseline (mean R_s {})",
                samples, clean_air_resistance
            );
            return Err(Error::BadData);
        }
        self.baseline_resistance = baseline;
        debug!(
            "calibrated over {} samples: R_o = {} ohms",
            samples, baseline
        );
        Ok(baseline)
    }
}

impl<TDelay> Mq8<TDelay>
where
    TDelay: DelayMs<u32>,
{
    /// Establishes R<sub>o</sub> from samples taken in clean air, using the configured
    /// calibration options. Returns the new R<sub>o</sub>.
    ///
    /// Keep the sensor in clean air, after its warm-up period, for the whole calibration. With
    /// [`DEFAULT_OPTIONS`] this blocks for about 25 seconds.
    ///
    /// If every sample was degenerate, [`Error::BadData`] is returned and R<sub>o</sub> is left
    /// unchanged.
    pub fn calibrate<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        let Options {
            calibration_samples,
            calibration_interval_ms,
            ..
        } = self.options;
        self.calibrate_with(source, calibration_samples, calibration_interval_ms)
    }

    /// Calibrates over `sample_count` samples taken `interval_ms` apart.
    pub fn calibrate_with<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
        sample_count: u32,
        interval_ms: u32,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        let clean_air_resistance = self.sample(source, sample_count, interval_ms, None)?;
        self.finish_calibration(clean_air_resistance, sample_count)
    }

    /// Like [`calibrate`](Mq8::calibrate), but stops with [`Error::Cancelled`] once `cancel`
    /// is set. The flag is checked before each sample. A cancelled calibration leaves
    /// R<sub>o</sub> unchanged.
    pub fn calibrate_cancellable<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
        cancel: &AtomicBool,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        let Options {
            calibration_samples,
            calibration_interval_ms,
            ..
        } = self.options;
        let clean_air_resistance = self.sample(
            source,
            calibration_samples,
            calibration_interval_ms,
            Some(cancel),
        )?;
        self.finish_calibration(clean_air_resistance, calibration_samples)
    }

    /// Reads the averaged sensor resistance R<sub>s</sub>, in ohms, using the configured read
    /// options.
    pub fn read_resistance<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        let Options {
            read_samples,
            read_interval_ms,
            ..
        } = self.options;
        self.sample(source, read_samples, read_interval_ms, None)
    }

    /// Takes `sample_count` samples, waiting `interval_ms` after each one, and returns the mean
    /// resistance.
    ///
    /// Each call is an independent batch. Degenerate samples count as 0Ω rather than failing
    /// the batch, but any error from the source aborts it.
    pub fn read_resistance_with<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
        sample_count: u32,
        interval_ms: u32,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        self.sample(source, sample_count, interval_ms, None)
    }

    /// Like [`read_resistance_with`](Mq8::read_resistance_with), but stops with
    /// [`Error::Cancelled`] once `cancel` is set.
    pub fn read_resistance_cancellable<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
        sample_count: u32,
        interval_ms: u32,
        cancel: &AtomicBool,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        self.sample(source, sample_count, interval_ms, Some(cancel))
    }

    /// Reads R<sub>s</sub> and converts it into a full [`Reading`].
    pub fn read<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
    ) -> Result<Reading, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        let resistance = self.read_resistance(source)?;
        Ok(self.reading_from_resistance(resistance))
    }

    /// Estimates the gas concentration in ppm.
    pub fn read_concentration<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        Ok(self.read(source)?.ppm)
    }

    fn sample<TSource, TIoError>(
        &mut self,
        source: &mut TSource,
        sample_count: u32,
        interval_ms: u32,
        cancel: Option<&AtomicBool>,
    ) -> Result<f32, Error<TIoError>>
    where
        TSource: SampleSource<Error = TIoError>,
    {
        if sample_count == 0 {
            warn!("rejected read of zero samples");
            return Err(Error::Configuration);
        }
        let mut batch = Batch::new();
        for _ in 0..sample_count {
            if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                debug!("cancelled after {} of {} samples", batch.taken, sample_count);
                return Err(Error::Cancelled);
            }
            let raw = nb::block!(source.read_raw())?;
            batch.push(raw, &self.config);
            self.delay.delay_ms(interval_ms);
        }
        Ok(batch.mean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDelay;

    impl DelayMs<u32> for NoDelay {
        fn delay_ms(&mut self, _ms: u32) {}
    }

    struct Constant(u16);

    impl SampleSource for Constant {
        type Error = ();

        fn read_raw(&mut self) -> nb::Result<u16, ()> {
            Ok(self.0)
        }
    }

    #[test]
    fn reading_at_baseline() {
        let mq8 = Mq8::new(NoDelay, None, None).unwrap();
        let reading = mq8.reading_from_resistance(DEFAULT_BASELINE_RESISTANCE);
        assert_eq!(reading.ratio, 1.0);
        assert!((reading.ppm - 882.7).abs() < 0.5);
    }

    #[test]
    fn reading_without_resistance() {
        let mq8 = Mq8::new(NoDelay, None, None).unwrap();
        assert_eq!(
            mq8.reading_from_resistance(0.0),
            Reading {
                resistance: 0.0,
                ratio: 0.0,
                ppm: 0.0,
            }
        );
    }

    #[test]
    fn failed_calibration_keeps_baseline() {
        let mut mq8 = Mq8::new(NoDelay, None, None).unwrap();
        mq8.set_baseline_resistance(1234.0).unwrap();

        let result = mq8.calibrate_with(&mut Constant(0), 3, 0);

        assert_eq!(result, Err(Error::BadData));
        assert_eq!(mq8.baseline_resistance(), 1234.0);
    }

    #[test]
    fn zero_samples_rejected() {
        let mut mq8 = Mq8::new(NoDelay, None, None).unwrap();
        assert_eq!(
            mq8.read_resistance_with(&mut Constant(500), 0, 10),
            Err(Error::Configuration)
        );
    }

    #[test]
    fn invalid_curve_rejected() {
        let mut mq8 = Mq8::new(NoDelay, None, None).unwrap();
        assert_eq!(
            mq8.set_curve(GasCurve::new(1.0, 1.0, 0.0)),
            Err(ConfigurationError)
        );
        assert_eq!(mq8.curve(), H2_CURVE);
    }

    #[test]
    fn error_display() {
        extern crate std;
        use std::string::ToString;

        assert_eq!(Error::Wrapped(7).to_string(), "IO error: 7");
        assert_eq!(Error::<()>::Cancelled.to_string(), "Cancelled");
        assert_eq!(ConfigurationError.to_string(), "Invalid configuration");
    }
}
