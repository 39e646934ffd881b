//! Linux hardware backend
//!
//! MAX31855 on a spidev node and the heating relay on a gpiochip line, both
//! taken from the `[pins]` section. The device drivers are only built with
//! the `hardware` feature; without it [`open`] reports what is missing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use toaster_core::config::{PinConfig, ToasterConfig};
use toaster_core::traits::BinaryActuator;
use toaster_drivers::sensor::TimeoutSensor;

/// SPI bus carrying the thermocouple converter
pub const SPI_BUS: u8 = 0;

/// GPIO chip carrying the relay line
pub const GPIO_CHIP: &str = "/dev/gpiochip0";

/// MAX31855 maximum serial clock
#[cfg(feature = "hardware")]
pub const SPI_MAX_SPEED_HZ: u32 = 5_000_000;

/// Relay behind a trait object so both builds share one signature
pub type Relay = Box<dyn BinaryActuator>;

/// spidev node for the configured chip select
pub fn spi_device_path(pins: &PinConfig) -> PathBuf {
    PathBuf::from(format!("/dev/spidev{SPI_BUS}.{}", pins.spi_cs))
}

/// Sensor read timeout for a tick of `period` seconds
///
/// Half a period, so a stuck transfer never delays the next tick.
pub fn sensor_timeout(period: f64) -> Duration {
    Duration::from_secs_f64(period / 2.0)
}

/// Open the thermocouple and relay described by `config.pins`
#[cfg(feature = "hardware")]
pub fn open(config: &ToasterConfig) -> Result<(TimeoutSensor, Relay)> {
    use anyhow::{anyhow, Context};
    use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
    use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
    use linux_embedded_hal::{CdevPin, SpidevDevice};
    use toaster_drivers::actuator::GpioRelay;
    use toaster_drivers::sensor::Max31855;

    let pins = &config.pins;

    let path = spi_device_path(pins);
    let mut spi = SpidevDevice::open(&path)
        .map_err(|e| anyhow!("failed to open {}: {e:?}", path.display()))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(SPI_MAX_SPEED_HZ)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .with_context(|| format!("failed to configure {}", path.display()))?;

    let mut chip = Chip::new(GPIO_CHIP).map_err(|e| anyhow!("failed to open {GPIO_CHIP}: {e:?}"))?;
    let line = chip
        .get_line(u32::from(pins.relay))
        .map_err(|e| anyhow!("failed to get relay line {}: {e:?}", pins.relay))?;
    // Request the line already at its off level
    let off_level = u8::from(!pins.relay_active_high);
    let handle = line
        .request(LineRequestFlags::OUTPUT, off_level, "toaster")
        .map_err(|e| anyhow!("failed to request relay line {}: {e:?}", pins.relay))?;
    let pin = CdevPin::new(handle).map_err(|e| anyhow!("failed to set up relay pin: {e:?}"))?;
    let relay = GpioRelay::new(pin, pins.relay_active_high).context("failed to drive the relay off")?;

    let timeout = sensor_timeout(config.tuning.timer_period);
    let sensor = TimeoutSensor::spawn(Max31855::new(spi), timeout)
        .context("failed to start the sensor worker")?;

    log::info!(
        "Thermocouple on {}, relay on {GPIO_CHIP} line {} (active {})",
        path.display(),
        pins.relay,
        if pins.relay_active_high { "high" } else { "low" }
    );
    Ok((sensor, Box::new(relay)))
}

/// Open the thermocouple and relay described by `config.pins`
#[cfg(not(feature = "hardware"))]
pub fn open(config: &ToasterConfig) -> Result<(TimeoutSensor, Relay)> {
    anyhow::bail!(
        "built without the `hardware` feature, cannot open {} or {GPIO_CHIP} line {}",
        spi_device_path(&config.pins).display(),
        config.pins.relay
    )
}
