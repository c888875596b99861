// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sdr-scanner project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tunable IQ sample source
//!
//! `SdrSource` is the thin seam between the scanner and the hardware driver.
//! The production implementation sits on SoapySDR (behind the `soapysdr`
//! feature, since it links the native library); `driver: mock` selects the
//! synthetic source used for development and tests.

use super::mock::MockSource;
use super::Frequency;
use crate::config::DeviceConfig;
use num_complex::Complex32;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Fatal at startup: wrong driver name or serial
    #[error("failed to open SDR device (driver: {driver}, serial: {serial}): {message}")]
    Open {
        driver: String,
        serial: String,
        message: String,
    },
    /// Fatal at startup
    #[error("device configuration failed: {message}")]
    Configure { message: String },
    /// Transient; the caller retries
    #[error("failed to tune to {frequency} Hz: {message}")]
    Tune {
        frequency: Frequency,
        message: String,
    },
    /// Overruns and stream hiccups; samples are dropped by the driver
    #[error("stream read failed: {message}")]
    Read { message: String },
}

/// A tunable stream of complex IQ samples
pub trait SdrSource: Send {
    fn set_gain(&mut self, name: &str, value: f64) -> Result<(), SourceError>;
    fn set_sample_rate(&mut self, sample_rate: Frequency) -> Result<(), SourceError>;
    fn set_frequency(&mut self, frequency: Frequency) -> Result<(), SourceError>;
    /// Read into `buffer`, returning the number of samples written
    fn read(&mut self, buffer: &mut [Complex32]) -> Result<usize, SourceError>;
}

/// Open the source selected by the device configuration
pub fn open_source(config: &DeviceConfig) -> Result<Box<dyn SdrSource>, SourceError> {
    if config.driver == "mock" {
        return Ok(Box::new(MockSource::new(config.sample_rate)));
    }
    #[cfg(feature = "soapysdr")]
    {
        return Ok(Box::new(soapy::SoapySource::open(
            &config.driver,
            &config.serial,
        )?));
    }
    #[cfg(not(feature = "soapysdr"))]
    Err(SourceError::Open {
        driver: config.driver.clone(),
        serial: config.serial.clone(),
        message: "built without SoapySDR support (enable the `soapysdr` feature)".to_string(),
    })
}

#[cfg(feature = "soapysdr")]
mod soapy {
    use super::{Frequency, SdrSource, SourceError};
    use num_complex::Complex32;
    use soapysdr::Direction::Rx;

    const CHANNEL: usize = 0;
    const READ_TIMEOUT_US: i64 = 1_000_000;

    /// SoapySDR-backed source
    pub struct SoapySource {
        device: soapysdr::Device,
        stream: Option<soapysdr::RxStream<Complex32>>,
    }

    impl SoapySource {
        pub fn open(driver: &str, serial: &str) -> Result<Self, SourceError> {
            let args = format!("driver={},serial={}", driver, serial);
            let device = soapysdr::Device::new(args.as_str()).map_err(|err| SourceError::Open {
                driver: driver.to_string(),
                serial: serial.to_string(),
                message: err.to_string(),
            })?;
            Ok(Self {
                device,
                stream: None,
            })
        }

        fn activate(&mut self) -> Result<(), SourceError> {
            if self.stream.is_none() {
                let mut stream = self
                    .device
                    .rx_stream::<Complex32>(&[CHANNEL])
                    .map_err(|err| SourceError::Configure {
                        message: err.to_string(),
                    })?;
                stream.activate(None).map_err(|err| SourceError::Configure {
                    message: err.to_string(),
                })?;
                self.stream = Some(stream);
            }
            Ok(())
        }
    }

    impl SdrSource for SoapySource {
        fn set_gain(&mut self, name: &str, value: f64) -> Result<(), SourceError> {
            self.device
                .set_gain_element(Rx, CHANNEL, name, value)
                .map_err(|err| SourceError::Configure {
                    message: err.to_string(),
                })
        }

        fn set_sample_rate(&mut self, sample_rate: Frequency) -> Result<(), SourceError> {
            self.device
                .set_sample_rate(Rx, CHANNEL, sample_rate as f64)
                .map_err(|err| SourceError::Configure {
                    message: err.to_string(),
                })
        }

        fn set_frequency(&mut self, frequency: Frequency) -> Result<(), SourceError> {
            self.device
                .set_frequency(Rx, CHANNEL, frequency as f64, ())
                .map_err(|err| SourceError::Tune {
                    frequency,
                    message: err.to_string(),
                })
        }

        fn read(&mut self, buffer: &mut [Complex32]) -> Result<usize, SourceError> {
            self.activate()?;
            let stream = self.stream.as_mut().ok_or_else(|| SourceError::Read {
                message: "stream not active".to_string(),
            })?;
            stream
                .read(&mut [buffer], READ_TIMEOUT_US)
                .map_err(|err| SourceError::Read {
                    message: err.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_driver_always_opens() {
        let config = DeviceConfig::default();
        assert_eq!(config.driver, "mock");
        assert!(open_source(&config).is_ok());
    }

    #[cfg(not(feature = "soapysdr"))]
    #[test]
    fn test_hardware_driver_needs_the_feature() {
        let config = DeviceConfig {
            driver: "rtlsdr".to_string(),
            ..DeviceConfig::default()
        };
        match open_source(&config) {
            Err(err) => assert!(matches!(err, SourceError::Open { .. })),
            Ok(_) => panic!("expected an error"),
        }
    }
}
