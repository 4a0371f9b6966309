use anyhow::{anyhow, bail, Result};
use std::{collections::HashMap, fs};
use tracing::{debug, warn};

use crate::config::Config;

/// Specifies the pin numbering mode.
///
/// The pin numbering mode is used to determine the mapping between the pin numbers
/// and the GPIO channels. The pin numbering mode can be one of the following:
///
/// * `BOARD` - The pin numbers are the physical pin numbers on the 26-pin header.
/// * `SOC` - The pin numbers are the Linux global GPIO numbers of the RK3588S
///   (`bank * 32 + group * 8 + index`).
/// * `CUSTOM` - The pin numbers come from a user supplied mapping, see
///   [`GPIO::setmode_custom`](crate::GPIO::setmode_custom).
///
/// # Example
///
/// ```rust,no_run
/// use opi5_gpio::{GPIO, Mode};
///
/// let mut gpio = GPIO::new().unwrap();
/// gpio.setmode(Mode::BOARD).unwrap();
/// ```
#[derive(Debug, Eq, Hash, PartialEq, Clone, Copy)]
pub enum Mode {
    BOARD,
    SOC,
    CUSTOM,
}

impl Mode {
    /// Converts a string to a `Mode` enum.
    ///
    /// Valid strings are `"BOARD"`, `"SOC"` and `"CUSTOM"`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use opi5_gpio::Mode;
    ///
    /// assert_eq!(Mode::from_str("BOARD").unwrap(), Mode::BOARD);
    /// assert!(Mode::from_str("BCM").is_err());
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Mode> {
        match s {
            "BOARD" => Ok(Mode::BOARD),
            "SOC" => Ok(Mode::SOC),
            "CUSTOM" => Ok(Mode::CUSTOM),
            _ => Err(anyhow!("Invalid mode: {}", s)),
        }
    }

    /// Converts a `Mode` enum to a string.
    ///
    /// # Example
    ///
    /// ```rust
    /// use opi5_gpio::Mode;
    ///
    /// assert_eq!(Mode::SOC.to_str(), "SOC");
    /// ```
    pub fn to_str(&self) -> &str {
        match self {
            Mode::BOARD => "BOARD",
            Mode::SOC => "SOC",
            Mode::CUSTOM => "CUSTOM",
        }
    }
}

pub static ORANGE_PI_5: &str = "ORANGE_PI_5";
pub static ORANGE_PI_5B: &str = "ORANGE_PI_5B";

static OPI_MODELS: [&str; 2] = [ORANGE_PI_5, ORANGE_PI_5B];

/// Physical header pin to Linux global GPIO number. The 5 and 5B share the
/// same 26-pin header wiring.
static OPI5_PIN_DEFS: [PinDefinition; 17] = [
    PinDefinition { board: 3, gpio: 47 },
    PinDefinition { board: 5, gpio: 46 },
    PinDefinition { board: 7, gpio: 54 },
    PinDefinition { board: 8, gpio: 131 },
    PinDefinition { board: 10, gpio: 132 },
    PinDefinition { board: 11, gpio: 138 },
    PinDefinition { board: 12, gpio: 29 },
    PinDefinition { board: 13, gpio: 139 },
    PinDefinition { board: 15, gpio: 28 },
    PinDefinition { board: 16, gpio: 59 },
    PinDefinition { board: 18, gpio: 58 },
    PinDefinition { board: 19, gpio: 49 },
    PinDefinition { board: 21, gpio: 48 },
    PinDefinition { board: 22, gpio: 92 },
    PinDefinition { board: 23, gpio: 50 },
    PinDefinition { board: 24, gpio: 52 },
    PinDefinition { board: 26, gpio: 35 },
];

#[derive(Clone, Copy, Debug)]
struct PinDefinition {
    board: u32,
    gpio: u32,
}

/// Contains information about a single GPIO channel.
///
/// The fields are:
/// * `channel`: Channel number in the active numbering mode
/// * `global_gpio`: Linux exported GPIO number (global)
/// * `global_gpio_name`: Linux exported GPIO name, e.g. `gpio47`
/// * `soc_name`: Rockchip pin name, e.g. `GPIO1_B7`, or empty when unknown
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub channel: u32,
    pub global_gpio: u32,
    pub global_gpio_name: String,
    pub soc_name: String,
}

impl ChannelInfo {
    fn new(channel: u32, global_gpio: u32) -> Self {
        ChannelInfo {
            channel,
            global_gpio,
            global_gpio_name: format!("gpio{}", global_gpio),
            soc_name: rockchip_gpio_name(global_gpio).unwrap_or_default(),
        }
    }
}

/// Contains information about the Orange Pi board.
///
/// The fields are:
/// * `model`: Board model, one of `ORANGE_PI_5` or `ORANGE_PI_5B`
/// * `header_pins`: Number of pins on the GPIO header
/// * `manufacturer`: Board manufacturer
/// * `processor`: Processor type
#[derive(Debug, Clone, PartialEq)]
pub struct BoardInfo {
    pub model: String,
    pub header_pins: u32,
    pub manufacturer: String,
    pub processor: String,
}

/// Converts a Rockchip pin name such as `GPIO1_B7` to its Linux global GPIO
/// number (`bank * 32 + group * 8 + index`).
///
/// # Example
///
/// ```rust
/// use opi5_gpio::gpio_pin_data::rockchip_gpio_number;
///
/// assert_eq!(rockchip_gpio_number("GPIO1_B7").unwrap(), 47);
/// assert_eq!(rockchip_gpio_number("GPIO4_A3").unwrap(), 131);
/// ```
pub fn rockchip_gpio_number(name: &str) -> Result<u32> {
    let invalid = || anyhow!("Invalid Rockchip pin name: {}", name);

    let rest = name.strip_prefix("GPIO").ok_or_else(invalid)?;
    let (bank, group, index) = match rest.as_bytes() {
        [bank @ b'0'..=b'4', b'_', group @ b'A'..=b'D', index @ b'0'..=b'7'] => {
            (*bank, *group, *index)
        }
        _ => return Err(invalid()),
    };

    Ok((bank - b'0') as u32 * 32 + (group - b'A') as u32 * 8 + (index - b'0') as u32)
}

/// Converts a Linux global GPIO number back to its Rockchip pin name, or
/// `None` if the number lies past the last bank.
pub fn rockchip_gpio_name(gpio: u32) -> Option<String> {
    let bank = gpio / 32;
    if bank > 4 {
        return None;
    }
    let group = (b'A' + ((gpio % 32) / 8) as u8) as char;
    let index = gpio % 8;
    Some(format!("GPIO{}_{}{}", bank, group, index))
}

fn get_model(config: &Config) -> Result<String> {
    if let Some(model_name) = &config.model_override {
        if !OPI_MODELS.contains(&model_name.as_str()) {
            bail!("Environment variable OPI_MODEL_NAME={} is invalid", model_name);
        }
        return Ok(model_name.clone());
    }

    let compats_opi5 = ["rockchip,rk3588s-orangepi-5", "xunlong,orangepi-5"];
    let compats_opi5b = ["rockchip,rk3588s-orangepi-5b", "xunlong,orangepi-5b"];

    match fs::read(&config.compatible_path) {
        Ok(contents) => {
            let contents = String::from_utf8_lossy(&contents);
            let compats: Vec<&str> = contents.split('\x00').collect();

            let matches = |vals: &[&str]| vals.iter().any(|v| compats.contains(v));

            // 5B first: its compatible list may also name the plain 5
            if matches(&compats_opi5b) {
                return Ok(String::from(ORANGE_PI_5B));
            } else if matches(&compats_opi5) {
                return Ok(String::from(ORANGE_PI_5));
            }

            warn!(
                "Board is not an Orange Pi 5 (compatible: {}); assuming {} pinout",
                compats.join(" "),
                ORANGE_PI_5
            );
        }
        Err(e) => {
            warn!(
                "Could not read {}: {}; assuming {} pinout",
                config.compatible_path.display(),
                e,
                ORANGE_PI_5
            );
        }
    }

    Ok(String::from(ORANGE_PI_5))
}

fn get_board_info(model: &str) -> Result<BoardInfo> {
    let (processor, header_pins) = match model {
        m if m == ORANGE_PI_5 || m == ORANGE_PI_5B => ("RK3588S", 26),
        _ => bail!("Unsupported board model: {}", model),
    };

    Ok(BoardInfo {
        model: model.to_string(),
        header_pins,
        manufacturer: String::from("Shenzhen Xunlong Software"),
        processor: String::from(processor),
    })
}

/// Builds channel data for a user supplied mapping of channel to global GPIO
/// number.
pub(crate) fn custom_channel_data(mapping: &HashMap<u32, u32>) -> HashMap<u32, ChannelInfo> {
    mapping
        .iter()
        .map(|(&channel, &gpio)| (channel, ChannelInfo::new(channel, gpio)))
        .collect()
}

pub(crate) type ChannelDataByMode = HashMap<Mode, HashMap<u32, ChannelInfo>>;

pub(crate) fn get_data(config: &Config) -> Result<(String, BoardInfo, ChannelDataByMode)> {
    let model = get_model(config)?;
    let board_info = get_board_info(&model)?;
    debug!("detected board {}", model);

    let mut board_data: HashMap<u32, ChannelInfo> = HashMap::new();
    let mut soc_data: HashMap<u32, ChannelInfo> = HashMap::new();
    for pin_def in OPI5_PIN_DEFS.iter() {
        board_data.insert(pin_def.board, ChannelInfo::new(pin_def.board, pin_def.gpio));
        soc_data.insert(pin_def.gpio, ChannelInfo::new(pin_def.gpio, pin_def.gpio));
    }

    let mut channel_data: ChannelDataByMode = HashMap::new();
    channel_data.insert(Mode::BOARD, board_data);
    channel_data.insert(Mode::SOC, soc_data);
    channel_data.insert(Mode::CUSTOM, HashMap::new());

    Ok((model, board_info, channel_data))
}
