use anyhow::{bail, Error};

use crate::config::Config;
use crate::sysfs;

fn check_duty_cycle(duty_cycle_percent: f64) -> Result<(), Error> {
    if !(0.0..=100.0).contains(&duty_cycle_percent) {
        bail!(
            "Duty cycle must be between 0 and 100. Current value: {} is out of bounds",
            duty_cycle_percent
        );
    }

    Ok(())
}

fn check_frequency(frequency: f64) -> Result<(), Error> {
    if !frequency.is_finite() || frequency <= 0.0 {
        bail!("Frequency must be greater than 0. Current value: {}", frequency);
    }

    Ok(())
}

/// A hardware PWM channel driven through `/sys/class/pwm`.
///
/// The channel is addressed by its PWM chip and the pin (channel index) within
/// that chip, not by a header pin number.
///
/// # Example
///
/// ```rust,no_run
/// use opi5_gpio::{Config, PWM};
///
/// // 1 kHz at 50% duty cycle on pwmchip0/pwm0
/// let mut pwm = PWM::new(Config::from_env(), 0, 0, 1000.0, 50.0, false).unwrap();
/// pwm.start_pwm().unwrap();
/// pwm.duty_cycle(75.0).unwrap();
/// pwm.stop_pwm().unwrap();
/// pwm.pwm_close().unwrap();
/// ```
#[derive(Debug)]
pub struct PWM {
    pub chip: u32,
    pub pin: u32,
    pub frequency: f64,
    pub duty_cycle_percent: f64,
    pub invert_polarity: bool,
    config: Config,
}

impl PWM {
    /// Exports and enables the PWM channel at `frequency` hertz. The output
    /// stays at 0% duty cycle until [`PWM::start_pwm`] is called.
    pub fn new(
        config: Config,
        chip: u32,
        pin: u32,
        frequency: f64,
        duty_cycle_percent: f64,
        invert_polarity: bool,
    ) -> Result<Self, Error> {
        check_frequency(frequency)?;
        check_duty_cycle(duty_cycle_percent)?;

        sysfs::pwm_export(&config, chip, pin, true)?;
        sysfs::pwm_polarity(&config, chip, pin, invert_polarity)?;
        sysfs::pwm_enable(&config, chip, pin)?;
        sysfs::pwm_frequency(&config, chip, pin, frequency)?;

        Ok(PWM {
            chip,
            pin,
            frequency,
            duty_cycle_percent,
            invert_polarity,
            config,
        })
    }

    /// Start PWM Signal at the configured duty cycle.
    pub fn start_pwm(&self) -> Result<(), Error> {
        sysfs::pwm_duty_cycle_percent(&self.config, self.chip, self.pin, self.duty_cycle_percent)
    }

    /// Stop PWM Signal by dropping the duty cycle to 0.
    pub fn stop_pwm(&self) -> Result<(), Error> {
        sysfs::pwm_duty_cycle_percent(&self.config, self.chip, self.pin, 0.0)
    }

    /// Change the frequency of the signal, keeping the duty cycle percentage.
    pub fn change_frequency(&mut self, new_frequency: f64) -> Result<(), Error> {
        check_frequency(new_frequency)?;

        let period = sysfs::period_ns(new_frequency);
        let duty_cycle = (self.duty_cycle_percent / 100.0 * period as f64).round() as u64;
        let old_period = sysfs::period_ns(self.frequency);

        // sysfs requires period >= duty_cycle at every step
        if period > old_period {
            sysfs::pwm_period(&self.config, self.chip, self.pin, period)?;
            sysfs::pwm_duty_cycle(&self.config, self.chip, self.pin, duty_cycle)?;
        } else {
            sysfs::pwm_duty_cycle(&self.config, self.chip, self.pin, duty_cycle)?;
            sysfs::pwm_period(&self.config, self.chip, self.pin, period)?;
        }

        self.frequency = new_frequency;
        Ok(())
    }

    /// Change the duty cycle of the signal, as a percentage (0-100).
    pub fn duty_cycle(&mut self, duty_cycle_percent: f64) -> Result<(), Error> {
        check_duty_cycle(duty_cycle_percent)?;

        self.duty_cycle_percent = duty_cycle_percent;
        sysfs::pwm_duty_cycle_percent(&self.config, self.chip, self.pin, duty_cycle_percent)
    }

    /// Invert the signal. The channel is briefly disabled while the polarity
    /// changes.
    pub fn pwm_polarity(&mut self) -> Result<(), Error> {
        sysfs::pwm_disable(&self.config, self.chip, self.pin)?;
        sysfs::pwm_polarity(&self.config, self.chip, self.pin, !self.invert_polarity)?;
        sysfs::pwm_enable(&self.config, self.chip, self.pin)?;

        self.invert_polarity = !self.invert_polarity;
        Ok(())
    }

    /// Remove the channel from sysfs.
    pub fn pwm_close(self) -> Result<(), Error> {
        sysfs::pwm_unexport(&self.config, self.chip, self.pin)
    }
}
