//! MAX31855 thermocouple-to-digital converter
//!
//! The converter streams a 32-bit frame on every chip-select cycle:
//!
//! | Bits   | Content                                            |
//! |--------|----------------------------------------------------|
//! | 31..18 | Thermocouple temperature, 14-bit signed, 0.25 °C   |
//! | 17     | Reserved, always 0                                 |
//! | 16     | Fault flag                                         |
//! | 15..4  | Cold-junction temperature, 12-bit signed, 0.0625 °C|
//! | 3      | Reserved, always 0                                 |
//! | 2..0   | Short to VCC, short to GND, open circuit           |

use embedded_hal::spi::SpiDevice;
use toaster_core::traits::{SensorFault, TemperatureSensor};

const FAULT_FLAG: u32 = 1 << 16;
const OPEN_CIRCUIT: u32 = 1 << 0;
const SHORT_TO_GROUND: u32 = 1 << 1;
const SHORT_TO_VCC: u32 = 1 << 2;
const RESERVED: u32 = (1 << 17) | (1 << 3);

const THERMOCOUPLE_LSB: f64 = 0.25;
const REFERENCE_LSB: f64 = 0.0625;

/// Temperatures decoded from one frame, in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Max31855Reading {
    pub thermocouple: f64,
    pub reference: f64,
}

/// Decode a raw conversion frame
pub fn decode_frame(frame: u32) -> Result<Max31855Reading, SensorFault> {
    if frame & FAULT_FLAG != 0 {
        return Err(if frame & OPEN_CIRCUIT != 0 {
            SensorFault::NoThermocouple
        } else if frame & SHORT_TO_GROUND != 0 {
            SensorFault::ShortToGround
        } else if frame & SHORT_TO_VCC != 0 {
            SensorFault::ShortToVcc
        } else {
            SensorFault::InvalidFrame
        });
    }
    if frame & RESERVED != 0 {
        return Err(SensorFault::InvalidFrame);
    }

    // Arithmetic shifts sign-extend both fields
    let thermocouple = (frame as i32) >> 18;
    let reference = ((frame << 16) as i32) >> 20;

    Ok(Max31855Reading {
        thermocouple: thermocouple as f64 * THERMOCOUPLE_LSB,
        reference: reference as f64 * REFERENCE_LSB,
    })
}

/// MAX31855 on an SPI bus
///
/// The SPI device must be configured for mode 0 at no more than 5 MHz.
/// A failed read keeps the last good temperatures.
pub struct Max31855<SPI> {
    spi: SPI,
    temperature: f64,
    reference: f64,
    log_target: String,
}

impl<SPI: SpiDevice> Max31855<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            temperature: 0.0,
            reference: 0.0,
            log_target: "toaster::max31855".into(),
        }
    }

    /// Use a custom log target
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    /// Last good thermocouple temperature
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Release the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }

    fn read_frame(&mut self) -> Result<u32, SensorFault> {
        let mut buf = [0u8; 4];
        self.spi.read(&mut buf).map_err(|e| {
            log::debug!(target: self.log_target.as_str(), "SPI read failed: {e:?}");
            SensorFault::Bus
        })?;
        Ok(u32::from_be_bytes(buf))
    }
}

impl<SPI: SpiDevice> TemperatureSensor for Max31855<SPI> {
    fn read(&mut self) -> Result<f64, SensorFault> {
        let frame = self.read_frame()?;
        let reading = decode_frame(frame).inspect_err(|fault| {
            log::debug!(target: self.log_target.as_str(), "Frame {frame:#010x}: {fault}");
        })?;
        self.temperature = reading.thermocouple;
        self.reference = reading.reference;
        Ok(self.temperature)
    }

    fn reference_temperature(&self) -> f64 {
        self.reference
    }

    fn cleanup(&mut self) {
        log::debug!(target: self.log_target.as_str(), "SPI shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{self, ErrorKind, ErrorType, Operation};
    use proptest::prelude::*;

    #[derive(Debug)]
    struct MockSpiError;

    impl spi::Error for MockSpiError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Mock SPI device returning queued frames
    struct MockSpi {
        frames: Vec<u32>,
        fail: bool,
    }

    impl MockSpi {
        fn new(frames: &[u32]) -> Self {
            Self {
                frames: frames.iter().rev().copied().collect(),
                fail: false,
            }
        }
    }

    impl ErrorType for MockSpi {
        type Error = MockSpiError;
    }

    impl SpiDevice for MockSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), MockSpiError> {
            if self.fail {
                return Err(MockSpiError);
            }
            for op in operations {
                if let Operation::Read(buf) = op {
                    let frame = self.frames.pop().ok_or(MockSpiError)?;
                    buf.copy_from_slice(&frame.to_be_bytes());
                }
            }
            Ok(())
        }
    }

    fn frame(thermocouple_raw: u32, reference_raw: u32) -> u32 {
        ((thermocouple_raw & 0x3FFF) << 18) | ((reference_raw & 0xFFF) << 4)
    }

    #[test]
    fn test_decode_positive() {
        // 1600 C thermocouple, 127 C cold junction
        let reading = decode_frame(0x6400_7F00).unwrap();
        assert_eq!(reading.thermocouple, 1600.0);
        assert_eq!(reading.reference, 127.0);
    }

    #[test]
    fn test_decode_negative() {
        // -250 C thermocouple, -55 C cold junction
        let reading = decode_frame(0xF060_C900).unwrap();
        assert_eq!(reading.thermocouple, -250.0);
        assert_eq!(reading.reference, -55.0);
    }

    #[test]
    fn test_decode_faults() {
        assert_eq!(
            decode_frame(FAULT_FLAG | OPEN_CIRCUIT),
            Err(SensorFault::NoThermocouple)
        );
        assert_eq!(
            decode_frame(FAULT_FLAG | SHORT_TO_GROUND),
            Err(SensorFault::ShortToGround)
        );
        assert_eq!(
            decode_frame(FAULT_FLAG | SHORT_TO_VCC),
            Err(SensorFault::ShortToVcc)
        );
        assert_eq!(decode_frame(FAULT_FLAG), Err(SensorFault::InvalidFrame));
        assert_eq!(decode_frame(1 << 3), Err(SensorFault::InvalidFrame));
        assert_eq!(decode_frame(1 << 17), Err(SensorFault::InvalidFrame));
    }

    #[test]
    fn test_read_keeps_last_good_value() {
        let spi = MockSpi::new(&[frame(100, 400), FAULT_FLAG | OPEN_CIRCUIT]);
        let mut sensor = Max31855::new(spi);

        assert_eq!(sensor.read(), Ok(25.0));
        assert_eq!(sensor.reference_temperature(), 25.0);

        assert_eq!(sensor.read(), Err(SensorFault::NoThermocouple));
        assert_eq!(sensor.temperature(), 25.0);
        assert_eq!(sensor.reference_temperature(), 25.0);
    }

    #[test]
    fn test_bus_error() {
        let mut spi = MockSpi::new(&[]);
        spi.fail = true;
        let mut sensor = Max31855::new(spi);
        assert_eq!(sensor.read(), Err(SensorFault::Bus));
    }

    proptest! {
        #[test]
        fn prop_clean_frames_decode_to_field_values(
            tc in -8192i32..8192,
            reference in -2048i32..2048,
        ) {
            let raw = frame(tc as u32, reference as u32);
            let reading = decode_frame(raw).unwrap();
            prop_assert_eq!(reading.thermocouple, tc as f64 * 0.25);
            prop_assert_eq!(reading.reference, reference as f64 * 0.0625);
        }
    }
}
