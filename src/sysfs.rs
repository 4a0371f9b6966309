//! Thin wrappers over the `/sys/class/gpio` and `/sys/class/pwm` attribute files.

use anyhow::{Context, Error, Result};
use std::{
    fs,
    io::{self, Write},
    path::Path,
    thread,
    time::Duration,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::event::Edge;
use crate::gpio::{Direction, Level};

const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const EXPORT_POLL_ATTEMPTS: u32 = 100;

fn write_raw(path: &Path, value: &str) -> io::Result<()> {
    let mut f = fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)?;
    f.write_all(value.as_bytes())
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    write_raw(path, value).with_context(|| format!("Failed to write '{}' to {}", value, path.display()))
}

fn read_attr(path: &Path) -> Result<String> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(contents.trim().to_string())
}

fn is_busy(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EBUSY)
}

fn wait_for(path: &Path) -> Result<()> {
    for _ in 0..EXPORT_POLL_ATTEMPTS {
        if path.exists() {
            return Ok(());
        }
        thread::sleep(EXPORT_POLL_INTERVAL);
    }

    Err(Error::msg(format!("Timed out waiting for {} to appear", path.display())))
}

pub(crate) fn check_write_access(config: &Config) -> Result<()> {
    for name in ["export", "unexport"] {
        let path = config.gpio_root.join(name);
        let metadata = fs::metadata(&path)
            .with_context(|| format!("The GPIO sysfs interface {} is missing", path.display()))?;
        if metadata.permissions().readonly() {
            return Err(Error::msg("You do not have write access to the GPIO sysfs interface."));
        }
    }

    Ok(())
}

/// Exports a GPIO. A pin that is already exported is unexported and exported
/// again.
pub(crate) fn export(config: &Config, gpio: u32, warnings: bool) -> Result<()> {
    let export_path = config.gpio_root.join("export");
    debug!("exporting gpio{}", gpio);

    if let Err(e) = write_raw(&export_path, &gpio.to_string()) {
        if !is_busy(&e) {
            return Err(Error::new(e).context(format!("Failed to export gpio{}", gpio)));
        }
        if warnings {
            warn!("gpio{} is already in use, continuing anyway. Use GPIO.setwarnings(false) to disable warnings.", gpio);
        }
        write_attr(&config.gpio_root.join("unexport"), &gpio.to_string())?;
        write_attr(&export_path, &gpio.to_string())?;
    }

    wait_for(&config.gpio_dir(gpio).join("value"))
}

pub(crate) fn unexport(config: &Config, gpio: u32) -> Result<()> {
    if config.gpio_dir(gpio).exists() {
        debug!("unexporting gpio{}", gpio);
        write_attr(&config.gpio_root.join("unexport"), &gpio.to_string())?;
    }

    Ok(())
}

pub(crate) fn direction(config: &Config, gpio: u32, direction: &Direction) -> Result<()> {
    let value = match direction {
        Direction::IN => "in",
        Direction::OUT => "out",
        _ => return Err(Error::msg("Only IN and OUT can be written to a GPIO direction")),
    };

    write_attr(&config.gpio_dir(gpio).join("direction"), value)
}

/// Returns the direction sysfs reports for a GPIO, or `None` if it is not
/// exported.
pub(crate) fn read_direction(config: &Config, gpio: u32) -> Option<Direction> {
    let gpio_dir = config.gpio_dir(gpio);
    if !gpio_dir.exists() {
        return None;
    }

    match read_attr(&gpio_dir.join("direction")).ok()?.as_str() {
        "in" => Some(Direction::IN),
        "out" | "low" | "high" => Some(Direction::OUT),
        _ => Some(Direction::UNKNOWN),
    }
}

pub(crate) fn output(config: &Config, gpio: u32, value: &Level) -> Result<()> {
    let value = match value {
        Level::HIGH => "1",
        Level::LOW => "0",
    };

    write_attr(&config.gpio_dir(gpio).join("value"), value)
}

pub(crate) fn input(config: &Config, gpio: u32) -> Result<Level> {
    match read_attr(&config.gpio_dir(gpio).join("value"))?.as_str() {
        "0" => Ok(Level::LOW),
        _ => Ok(Level::HIGH),
    }
}

pub(crate) fn edge(config: &Config, gpio: u32, edge: Edge) -> Result<()> {
    write_attr(&config.gpio_dir(gpio).join("edge"), edge.to_str())
}

pub(crate) fn pwm_export(config: &Config, chip: u32, pin: u32, warnings: bool) -> Result<()> {
    let chip_dir = config.pwm_chip_dir(chip);
    let export_path = chip_dir.join("export");
    debug!("exporting pwmchip{}/pwm{}", chip, pin);

    if let Err(e) = write_raw(&export_path, &pin.to_string()) {
        if !is_busy(&e) {
            return Err(Error::new(e).context(format!("Failed to export pwmchip{}/pwm{}", chip, pin)));
        }
        if warnings {
            warn!("Pin {} is already in use, continuing anyway.", pin);
        }
        write_attr(&chip_dir.join("unexport"), &pin.to_string())?;
        write_attr(&export_path, &pin.to_string())?;
    }

    wait_for(&config.pwm_dir(chip, pin).join("period"))
}

pub(crate) fn pwm_unexport(config: &Config, chip: u32, pin: u32) -> Result<()> {
    if config.pwm_dir(chip, pin).exists() {
        debug!("unexporting pwmchip{}/pwm{}", chip, pin);
        write_attr(&config.pwm_chip_dir(chip).join("unexport"), &pin.to_string())?;
    }

    Ok(())
}

pub(crate) fn pwm_enable(config: &Config, chip: u32, pin: u32) -> Result<()> {
    write_attr(&config.pwm_dir(chip, pin).join("enable"), "1")
}

pub(crate) fn pwm_disable(config: &Config, chip: u32, pin: u32) -> Result<()> {
    write_attr(&config.pwm_dir(chip, pin).join("enable"), "0")
}

pub(crate) fn pwm_polarity(config: &Config, chip: u32, pin: u32, invert: bool) -> Result<()> {
    let polarity = if invert { "inversed" } else { "normal" };
    write_attr(&config.pwm_dir(chip, pin).join("polarity"), polarity)
}

pub(crate) fn pwm_period(config: &Config, chip: u32, pin: u32, period_ns: u64) -> Result<()> {
    write_attr(&config.pwm_dir(chip, pin).join("period"), &period_ns.to_string())
}

pub(crate) fn pwm_duty_cycle(config: &Config, chip: u32, pin: u32, duty_ns: u64) -> Result<()> {
    write_attr(&config.pwm_dir(chip, pin).join("duty_cycle"), &duty_ns.to_string())
}

/// Period in nanoseconds for a frequency in hertz.
pub(crate) fn period_ns(frequency_hz: f64) -> u64 {
    (1e9 / frequency_hz).round() as u64
}

pub(crate) fn pwm_frequency(config: &Config, chip: u32, pin: u32, frequency_hz: f64) -> Result<()> {
    pwm_period(config, chip, pin, period_ns(frequency_hz))
}

pub(crate) fn pwm_duty_cycle_percent(config: &Config, chip: u32, pin: u32, percent: f64) -> Result<()> {
    let period_path = config.pwm_dir(chip, pin).join("period");
    let period: u64 = read_attr(&period_path)?
        .parse()
        .with_context(|| format!("Invalid PWM period in {}", period_path.display()))?;
    let duty_ns = (percent / 100.0 * period as f64).round() as u64;

    pwm_duty_cycle(config, chip, pin, duty_ns)
}
