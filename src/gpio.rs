use anyhow::Error;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tracing::warn;

use crate::config::Config;
use crate::event::{Callback, Edge, EventRegistry};
use crate::gpio_pin_data::{custom_channel_data, get_data, BoardInfo, ChannelDataByMode, ChannelInfo, Mode};
use crate::sysfs;

/// Specifies the GPIO pin value in output mode.
///
/// * `LOW` - 0
/// * `HIGH` - 1
///
/// # Example
///
/// When writing to a GPIO pin, you must specify the value. For example, to set
/// header pin 7 to HIGH and pin 11 to LOW:
///
/// ```rust,no_run
/// use opi5_gpio::{GPIO, Level, Direction, Mode};
///
/// let mut gpio = GPIO::new().unwrap();
/// gpio.setmode(Mode::BOARD).unwrap();
///
/// gpio.setup(vec![7, 11], Direction::OUT, None).unwrap();
/// gpio.output(vec![7, 11], vec![Level::HIGH, Level::LOW]).unwrap();
/// ```
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Level {
    LOW = 0,
    HIGH = 1,
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value {
            Level::HIGH
        } else {
            Level::LOW
        }
    }
}

/// Specifies the GPIO pin direction.
///
/// * `IN` - Input
/// * `OUT` - Output
/// * `HARD_PWM` - Hardware PWM output
/// * `UNKNOWN` - Unknown direction for GPIOs that are not yet setup
///
/// # Example
///
/// When setting up a GPIO pin, you must specify the direction. For example, to
/// set up header pin 7 as an output:
///
/// ```rust,no_run
/// use opi5_gpio::{GPIO, Direction, Mode};
///
/// let mut gpio = GPIO::new().unwrap();
/// gpio.setmode(Mode::BOARD).unwrap();
/// gpio.setup(vec![7], Direction::OUT, None).unwrap();
/// ```
#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Direction {
    UNKNOWN = -1,
    OUT = 0,
    IN = 1,
    HARD_PWM = 43,
}

impl Direction {
    pub fn is_valid(&self) -> bool {
        matches!(self, Direction::OUT | Direction::IN)
    }

    fn describe(&self) -> &str {
        match self {
            Direction::IN => "input",
            Direction::OUT => "output",
            Direction::HARD_PWM => "PWM",
            Direction::UNKNOWN => "unknown",
        }
    }
}

/// Pull resistor setting requested for an input.
///
/// The sysfs interface cannot change pull resistors, so anything other than
/// `OFF` only produces a warning.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PullUpDown {
    OFF,
    UP,
    DOWN,
}

/// A public struct that holds state information about the GPIO pins.
///
/// Public fields:
/// * `model` - The model of the Orange Pi board
/// * `board_info` - A `BoardInfo` struct that holds information about the board
///
/// # Example
///
/// ```rust,no_run
/// use opi5_gpio::GPIO;
///
/// let gpio = GPIO::new().unwrap();
/// println!("running on {}", gpio.model);
/// ```
pub struct GPIO {
    pub model: String,
    pub board_info: BoardInfo,
    config: Config,
    channel_data_by_mode: ChannelDataByMode,

    // lookup table for the active mode, channel to linux gpio
    channel_data: HashMap<u32, ChannelInfo>,

    gpio_warnings: bool,
    gpio_mode: Option<Mode>,
    channel_configuration: HashMap<u32, Direction>,
    events: EventRegistry,
}

impl GPIO {
    /// Creates a new `GPIO` object using [`Config::from_env`].
    ///
    /// Calling this function will automatically populate the `model` and `board_info` fields.
    pub fn new() -> Result<Self, Error> {
        GPIO::with_config(Config::from_env())
    }

    /// Creates a new `GPIO` object that drives the sysfs trees named in `config`.
    pub fn with_config(config: Config) -> Result<Self, Error> {
        let (model, board_info, channel_data_by_mode) = get_data(&config)?;

        Ok(GPIO {
            model,
            board_info,
            config,
            channel_data_by_mode,

            channel_data: HashMap::new(),

            gpio_warnings: true,
            gpio_mode: None,
            channel_configuration: HashMap::new(),
            events: EventRegistry::new(),
        })
    }

    /// Enable or disable warnings during setup and cleanup.
    ///
    /// # Arguments
    ///
    /// * `warnings` - `true` to enable warnings, `false` to disable warnings
    pub fn setwarnings(&mut self, warnings: bool) {
        self.gpio_warnings = warnings;
    }

    /// Sets the pin numbering mode.
    ///
    /// Possible mode values are
    /// * `Mode::BOARD`
    /// * `Mode::SOC`
    ///
    /// `Mode::CUSTOM` needs a mapping and is set through [`GPIO::setmode_custom`].
    ///
    /// # Arguments
    ///
    /// * `mode` - The pin numbering mode to use
    pub fn setmode(&mut self, mode: Mode) -> Result<(), Error> {
        // check if a different mode has been set already
        if let Some(current_mode) = self.gpio_mode {
            if current_mode != mode {
                return Err(Error::msg("A different mode has already been set!"));
            }
        }

        if mode == Mode::CUSTOM {
            return Err(Error::msg("Use setmode_custom() to pass a custom pin mapping"));
        }

        self.channel_data = self
            .channel_data_by_mode
            .get(&mode)
            .cloned()
            .ok_or_else(|| Error::msg(format!("No pin data for mode {}", mode.to_str())))?;
        self.gpio_mode = Some(mode);

        Ok(())
    }

    /// Sets a user defined pin numbering, mapping each channel to a Linux
    /// global GPIO number.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::collections::HashMap;
    /// use opi5_gpio::{GPIO, Mode};
    ///
    /// let mut gpio = GPIO::new().unwrap();
    /// gpio.setmode_custom(HashMap::from([(1, 47), (2, 46)])).unwrap();
    /// assert_eq!(gpio.getmode(), Some(Mode::CUSTOM));
    /// ```
    pub fn setmode_custom(&mut self, mapping: HashMap<u32, u32>) -> Result<(), Error> {
        if let Some(current_mode) = self.gpio_mode {
            if current_mode != Mode::CUSTOM {
                return Err(Error::msg("A different mode has already been set!"));
            }
        }

        let data = custom_channel_data(&mapping);
        self.channel_data_by_mode.insert(Mode::CUSTOM, data.clone());
        self.channel_data = data;
        self.gpio_mode = Some(Mode::CUSTOM);

        Ok(())
    }

    /// Returns the currently set pin numbering mode.
    pub fn getmode(&self) -> Option<Mode> {
        self.gpio_mode
    }

    fn validate_mode_set(&self) -> Result<(), Error> {
        match self.gpio_mode {
            Some(_) => Ok(()),
            None => Err(Error::msg("Mode has not been set. Please call setmode(Mode::BOARD), setmode(Mode::SOC) or setmode_custom()")),
        }
    }

    fn channel_to_info(&self, channel: u32) -> Result<ChannelInfo, Error> {
        self.validate_mode_set()?;
        self.channel_data
            .get(&channel)
            .cloned()
            .ok_or_else(|| Error::msg(format!("The channel sent is invalid: {}", channel)))
    }

    fn channels_to_infos(&self, channels: Vec<u32>) -> Result<Vec<ChannelInfo>, Error> {
        self.validate_mode_set()?;
        channels
            .into_iter()
            .map(|channel| self.channel_to_info(channel))
            .collect()
    }

    /// Looks up a channel that this process has configured, optionally
    /// requiring a particular direction.
    fn check_configured(&self, channel: u32, direction: Option<Direction>) -> Result<ChannelInfo, Error> {
        let ch_info = self.channel_to_info(channel)?;

        let configured = self
            .channel_configuration
            .get(&channel)
            .ok_or_else(|| Error::msg(format!("Channel {} is not configured", channel)))?;

        if let Some(direction) = direction {
            if direction != *configured {
                return Err(Error::msg(format!(
                    "Channel {} is configured for {}",
                    channel,
                    configured.describe()
                )));
            }
        }

        Ok(ch_info)
    }

    fn cleanup_one(&mut self, ch_info: &ChannelInfo) -> Result<(), Error> {
        self.events.cleanup(&self.config, ch_info.global_gpio)?;
        sysfs::unexport(&self.config, ch_info.global_gpio)?;
        self.channel_configuration.remove(&ch_info.channel);

        Ok(())
    }

    fn cleanup_all(&mut self) -> Result<(), Error> {
        let mut channels: Vec<u32> = self.channel_configuration.keys().copied().collect();
        channels.sort_unstable();
        for channel in channels {
            let ch_info = self.channel_to_info(channel)?;
            self.cleanup_one(&ch_info)?;
        }

        self.gpio_warnings = true;
        self.gpio_mode = None;
        self.channel_data.clear();

        Ok(())
    }

    fn setup_single(&mut self, ch_info: &ChannelInfo, direction: Direction, initial: Option<Level>) -> Result<(), Error> {
        sysfs::export(&self.config, ch_info.global_gpio, self.gpio_warnings)?;
        sysfs::direction(&self.config, ch_info.global_gpio, &direction)?;

        if let Some(initial) = initial {
            sysfs::output(&self.config, ch_info.global_gpio, &initial)?;
        }

        self.channel_configuration.insert(ch_info.channel, direction);

        Ok(())
    }

    /// Setup a channel or list of channels with a direction and an (optional)
    /// initial value. Equivalent to [`GPIO::setup_with_pull`] with
    /// `PullUpDown::OFF`.
    ///
    /// # Arguments
    ///
    /// * `channels` - A list of channels to setup.
    /// * `direction` - `Direction::IN` or `Direction::OUT`
    /// * `initial` - An optional initial level for an output channel.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use opi5_gpio::{GPIO, Direction, Mode};
    ///
    /// let mut gpio = GPIO::new().unwrap();
    /// gpio.setmode(Mode::BOARD).unwrap();
    /// gpio.setup(vec![7], Direction::OUT, None).unwrap();
    /// ```
    pub fn setup(&mut self, channels: Vec<u32>, direction: Direction, initial: Option<Level>) -> Result<(), Error> {
        self.setup_with_pull(channels, direction, initial, PullUpDown::OFF)
    }

    /// Setup a channel or list of channels with a direction, an (optional)
    /// initial value and pull up/down control.
    ///
    /// Pull resistors cannot be set through sysfs. Asking for one on an input
    /// logs a warning and continues; asking for one on an output is an error.
    pub fn setup_with_pull(
        &mut self,
        channels: Vec<u32>,
        direction: Direction,
        initial: Option<Level>,
        pull_up_down: PullUpDown,
    ) -> Result<(), Error> {
        let ch_infos = self.channels_to_infos(channels)?;

        // check direction is valid
        if !direction.is_valid() {
            return Err(Error::msg("An invalid direction was passed to setup()"));
        }

        match direction {
            Direction::OUT => {
                if pull_up_down != PullUpDown::OFF {
                    return Err(Error::msg("pull_up_down parameter is not valid for outputs"));
                }
            }
            _ => {
                if initial.is_some() {
                    return Err(Error::msg("initial parameter is not valid for inputs"));
                }
                if pull_up_down != PullUpDown::OFF && self.gpio_warnings {
                    warn!("Pull up/down setting are not (yet) fully supported, continuing anyway. Use GPIO.setwarnings(false) to disable warnings.");
                }
            }
        }

        // a channel repeated in this call counts as already configured
        let mut seen = HashSet::new();
        for ch_info in ch_infos.iter() {
            if self.channel_configuration.contains_key(&ch_info.channel)
                || !seen.insert(ch_info.channel)
            {
                return Err(Error::msg(format!(
                    "Channel {} is already configured",
                    ch_info.channel
                )));
            }
        }

        sysfs::check_write_access(&self.config)?;

        if self.gpio_warnings {
            for ch_info in ch_infos.iter() {
                // warn if channel has been setup external to current program
                if sysfs::read_direction(&self.config, ch_info.global_gpio).is_some() {
                    warn!("Channel {} is already in use, continuing anyway. Use GPIO.setwarnings(false) to disable warnings.", ch_info.channel);
                }
            }
        }

        for ch_info in ch_infos.iter() {
            self.setup_single(ch_info, direction, initial)?;
        }

        Ok(())
    }

    /// Cleans up channels at the end of the program.
    ///
    /// Cleaning everything also clears the numbering mode and turns warnings
    /// back on.
    ///
    /// # Arguments
    ///
    /// * `channels` - An optional list of channels to cleanup. If no channel is provided, all channels are cleaned.
    pub fn cleanup(&mut self, channels: Option<Vec<u32>>) -> Result<(), Error> {
        // warn if no channel is setup
        if self.gpio_mode.is_none() {
            if self.gpio_warnings {
                warn!("No channels have been set up yet - nothing to clean up! Try cleaning up at the end of your program instead!");
            }
            return Ok(());
        }

        // clean all channels if no channel param provided
        let channels = match channels {
            Some(channels) => channels,
            None => return self.cleanup_all(),
        };

        for channel in channels {
            let ch_info = self.check_configured(channel, None)?;
            self.cleanup_one(&ch_info)?;
        }

        Ok(())
    }

    /// Returns the current value of the specified channel.
    ///
    /// Return either `Level::HIGH` or `Level::LOW`. Channels configured as
    /// outputs can be read too.
    ///
    /// # Arguments
    ///
    /// * `channel` - The channel to read from.
    pub fn input(&self, channel: u32) -> Result<Level, Error> {
        let ch_info = self.check_configured(channel, None)?;
        sysfs::input(&self.config, ch_info.global_gpio)
    }

    /// Writes a value to channels.
    ///
    /// # Arguments
    ///
    /// * `channels` - A list of channels to write to.
    /// * `values` - One value per channel, or a single value written to all of them.
    ///
    /// # Example
    /// ```rust,no_run
    /// use opi5_gpio::{GPIO, Direction, Level, Mode};
    ///
    /// let mut gpio = GPIO::new().unwrap();
    /// gpio.setmode(Mode::BOARD).unwrap();
    /// gpio.setup(vec![7, 11], Direction::OUT, None).unwrap();
    /// gpio.output(vec![7, 11], vec![Level::HIGH]).unwrap();
    /// ```
    pub fn output(&self, channels: Vec<u32>, values: Vec<Level>) -> Result<(), Error> {
        let ch_infos = channels
            .iter()
            .map(|&channel| self.check_configured(channel, Some(Direction::OUT)))
            .collect::<Result<Vec<_>, _>>()?;

        let values = match values.len() {
            1 => vec![values[0]; ch_infos.len()],
            n if n == ch_infos.len() => values,
            _ => return Err(Error::msg("Number of values != number of channels")),
        };

        for (ch_info, value) in ch_infos.iter().zip(values.iter()) {
            sysfs::output(&self.config, ch_info.global_gpio, value)?;
        }

        Ok(())
    }

    /// Blocks until `edge` is seen on an input channel.
    ///
    /// Returns the channel when an edge arrived, or `None` once `timeout`
    /// expires. A `timeout` of `None` waits forever.
    ///
    /// ```rust,no_run
    /// use std::time::Duration;
    /// use opi5_gpio::{GPIO, Direction, Edge, Mode};
    ///
    /// let mut gpio = GPIO::new().unwrap();
    /// gpio.setmode(Mode::BOARD).unwrap();
    /// gpio.setup(vec![16], Direction::IN, None).unwrap();
    /// match gpio.wait_for_edge(16, Edge::RISING, Some(Duration::from_secs(5))).unwrap() {
    ///     Some(channel) => println!("Edge detected on channel {}", channel),
    ///     None => println!("Timeout occurred"),
    /// }
    /// ```
    pub fn wait_for_edge(&self, channel: u32, edge: Edge, timeout: Option<Duration>) -> Result<Option<u32>, Error> {
        let ch_info = self.check_configured(channel, Some(Direction::IN))?;
        let ret = self
            .events
            .blocking_wait_for_edge(&self.config, ch_info.global_gpio, edge, timeout)?;

        Ok(ret.map(|_| channel))
    }

    /// Starts watching an input channel for `edge` in the background.
    ///
    /// Poll the result with [`GPIO::event_detected`], or pass a callback that
    /// receives the channel number. `bouncetime` drops edges that follow the
    /// previous one too closely.
    pub fn add_event_detect<F>(
        &mut self,
        channel: u32,
        edge: Edge,
        callback: Option<F>,
        bouncetime: Option<Duration>,
    ) -> Result<(), Error>
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let ch_info = self.check_configured(channel, Some(Direction::IN))?;
        let callback = callback.map(|f| Arc::new(f) as Callback);

        self.events.add_edge_detect(
            &self.config,
            ch_info.global_gpio,
            channel,
            edge,
            callback,
            bouncetime,
        )
    }

    /// Adds another callback to a channel that already has event detection.
    pub fn add_event_callback<F>(&mut self, channel: u32, callback: F) -> Result<(), Error>
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let ch_info = self.check_configured(channel, Some(Direction::IN))?;
        self.events.add_edge_callback(ch_info.global_gpio, Arc::new(callback))
    }

    pub fn remove_event_detect(&mut self, channel: u32) -> Result<(), Error> {
        let ch_info = self.check_configured(channel, Some(Direction::IN))?;
        self.events.remove_edge_detect(&self.config, ch_info.global_gpio)
    }

    /// Returns `true` if an edge was seen since the last call.
    ///
    /// ```rust,no_run
    /// use opi5_gpio::{GPIO, Direction, Edge, Mode};
    ///
    /// let mut gpio = GPIO::new().unwrap();
    /// gpio.setmode(Mode::BOARD).unwrap();
    /// gpio.setup(vec![16], Direction::IN, None).unwrap();
    /// gpio.add_event_detect(16, Edge::RISING, None::<fn(u32)>, None).unwrap();
    /// if gpio.event_detected(16).unwrap() {
    ///     println!("Button pressed");
    /// }
    /// ```
    pub fn event_detected(&self, channel: u32) -> Result<bool, Error> {
        let ch_info = self.check_configured(channel, Some(Direction::IN))?;
        Ok(self.events.edge_detected(ch_info.global_gpio))
    }

    /// Returns the configuration of `channel`, as set up by this process.
    pub fn gpio_function(&self, channel: u32) -> Result<Direction, Error> {
        let ch_info = self.channel_to_info(channel)?;
        Ok(self
            .channel_configuration
            .get(&channel)
            .copied()
            .or_else(|| sysfs::read_direction(&self.config, ch_info.global_gpio))
            .unwrap_or(Direction::UNKNOWN))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_gpio() -> GPIO {
        let config = Config::default()
            .with_gpio_root("/nonexistent/gpio")
            .with_model("ORANGE_PI_5");
        GPIO::with_config(config).unwrap()
    }

    #[test]
    fn level_from_bool() {
        assert_eq!(Level::from(true), Level::HIGH);
        assert_eq!(Level::from(false), Level::LOW);
    }

    #[test]
    fn only_in_and_out_are_valid() {
        assert!(Direction::IN.is_valid());
        assert!(Direction::OUT.is_valid());
        assert!(!Direction::HARD_PWM.is_valid());
        assert!(!Direction::UNKNOWN.is_valid());
    }

    #[test]
    fn setmode_rejects_a_second_mode() {
        let mut gpio = offline_gpio();
        assert_eq!(gpio.getmode(), None);
        gpio.setmode(Mode::BOARD).unwrap();
        gpio.setmode(Mode::BOARD).unwrap();
        assert!(gpio.setmode(Mode::SOC).is_err());
        assert!(gpio.setmode_custom(HashMap::new()).is_err());
        assert_eq!(gpio.getmode(), Some(Mode::BOARD));
    }

    #[test]
    fn custom_mode_needs_a_mapping() {
        let mut gpio = offline_gpio();
        assert!(gpio.setmode(Mode::CUSTOM).is_err());
        gpio.setmode_custom(HashMap::from([(100, 47)])).unwrap();
        assert_eq!(gpio.channel_to_info(100).unwrap().global_gpio, 47);
        assert!(gpio.channel_to_info(3).is_err());
    }

    #[test]
    fn setup_requires_mode() {
        let mut gpio = offline_gpio();
        let err = gpio.setup(vec![7], Direction::OUT, None).unwrap_err();
        assert!(err.to_string().starts_with("Mode has not been set"));
    }

    #[test]
    fn setup_validates_arguments_before_touching_sysfs() {
        let mut gpio = offline_gpio();
        gpio.setmode(Mode::BOARD).unwrap();

        assert!(gpio.setup(vec![1], Direction::OUT, None).is_err());
        assert!(gpio.setup(vec![7], Direction::HARD_PWM, None).is_err());
        assert!(gpio.setup(vec![7], Direction::IN, Some(Level::HIGH)).is_err());
        assert!(gpio
            .setup_with_pull(vec![7], Direction::OUT, None, PullUpDown::UP)
            .is_err());
        // all arguments valid, but there is no sysfs to write to
        assert!(gpio.setup(vec![7], Direction::OUT, None).is_err());
        assert!(gpio.channel_configuration.is_empty());
    }

    #[test]
    fn unconfigured_channels_are_rejected() {
        let mut gpio = offline_gpio();
        gpio.setmode(Mode::BOARD).unwrap();

        let err = gpio.input(7).unwrap_err();
        assert_eq!(err.to_string(), "Channel 7 is not configured");
        assert!(gpio.output(vec![7], vec![Level::HIGH]).is_err());
        assert!(gpio.event_detected(7).is_err());
        assert!(gpio.cleanup(Some(vec![7])).is_err());
        assert_eq!(gpio.gpio_function(7).unwrap(), Direction::UNKNOWN);
    }

    #[test]
    fn cleanup_without_mode_is_noop() {
        let mut gpio = offline_gpio();
        gpio.cleanup(None).unwrap();
        gpio.cleanup(Some(vec![7])).unwrap();
    }
}
