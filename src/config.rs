use std::{env, path::PathBuf};

static DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";
static DEFAULT_PWM_ROOT: &str = "/sys/class/pwm";
static DEFAULT_COMPATIBLE_PATH: &str = "/proc/device-tree/compatible";

/// Where the library looks for the kernel interfaces it drives.
///
/// The defaults point at the real sysfs and device-tree locations. Each one can
/// be overridden through the environment:
///
/// * `OPI_GPIO_SYSFS_ROOT` - replaces `/sys/class/gpio`
/// * `OPI_PWM_SYSFS_ROOT` - replaces `/sys/class/pwm`
/// * `OPI_MODEL_NAME` - skips device-tree detection and forces a board model
///
/// # Example
///
/// ```rust
/// use opi5_gpio::Config;
///
/// let config = Config::default().with_gpio_root("/tmp/fake-gpio");
/// assert_eq!(config.gpio_root.to_str().unwrap(), "/tmp/fake-gpio");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub gpio_root: PathBuf,
    pub pwm_root: PathBuf,
    pub compatible_path: PathBuf,
    pub model_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
            pwm_root: PathBuf::from(DEFAULT_PWM_ROOT),
            compatible_path: PathBuf::from(DEFAULT_COMPATIBLE_PATH),
            model_override: None,
        }
    }
}

impl Config {
    /// Builds a configuration from the defaults, applying any `OPI_*`
    /// environment overrides.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(root) = env::var("OPI_GPIO_SYSFS_ROOT") {
            config.gpio_root = PathBuf::from(root);
        }
        if let Ok(root) = env::var("OPI_PWM_SYSFS_ROOT") {
            config.pwm_root = PathBuf::from(root);
        }
        if let Ok(model) = env::var("OPI_MODEL_NAME") {
            config.model_override = Some(model);
        }

        config
    }

    pub fn with_gpio_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.gpio_root = root.into();
        self
    }

    pub fn with_pwm_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.pwm_root = root.into();
        self
    }

    pub fn with_compatible_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.compatible_path = path.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Directory of an exported GPIO, e.g. `/sys/class/gpio/gpio47`.
    pub(crate) fn gpio_dir(&self, gpio: u32) -> PathBuf {
        self.gpio_root.join(format!("gpio{}", gpio))
    }

    /// Directory of a PWM chip, e.g. `/sys/class/pwm/pwmchip0`.
    pub(crate) fn pwm_chip_dir(&self, chip: u32) -> PathBuf {
        self.pwm_root.join(format!("pwmchip{}", chip))
    }

    /// Directory of an exported PWM channel, e.g. `/sys/class/pwm/pwmchip0/pwm1`.
    pub(crate) fn pwm_dir(&self, chip: u32, pin: u32) -> PathBuf {
        self.pwm_chip_dir(chip).join(format!("pwm{}", pin))
    }
}
