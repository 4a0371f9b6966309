// blink.rs - Lights an LED on header pin 7 of an Orange Pi 5, then blinks it.
//
// Wire the LED (with a series resistor) between pin 7 and ground. Set
// OPI_BLINK_PIN to use another header pin, and RUST_LOG=debug to see the
// sysfs traffic.

use std::{env, thread, time::Duration};

use anyhow::{Context, Result};
use opi5_gpio::{Direction, Level, Mode, GPIO};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pin: u32 = match env::var("OPI_BLINK_PIN") {
        Ok(pin) => pin.parse().context("OPI_BLINK_PIN must be a header pin number")?,
        Err(_) => 7,
    };

    let mut gpio = GPIO::new()?;
    tracing::info!("{} ({}), blinking pin {}", gpio.model, gpio.board_info.processor, pin);

    gpio.setmode(Mode::BOARD)?;
    gpio.setup(vec![pin], Direction::OUT, None)?;
    gpio.output(vec![pin], vec![Level::HIGH])?;

    for _ in 0..5 {
        thread::sleep(Duration::from_millis(500));
        gpio.output(vec![pin], vec![Level::LOW])?;
        thread::sleep(Duration::from_millis(500));
        gpio.output(vec![pin], vec![Level::HIGH])?;
    }

    gpio.cleanup(None)
}
