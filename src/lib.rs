//! Control the 26-pin GPIO header of the Orange Pi 5 from Rust, with an
//! interface modelled on RPi.GPIO.
//!
//! ```rust,no_run
//! use opi5_gpio::{GPIO, Direction, Level, Mode};
//!
//! let mut gpio = GPIO::new().unwrap();
//! gpio.setmode(Mode::BOARD).unwrap();
//! gpio.setup(vec![7], Direction::OUT, None).unwrap();
//! gpio.output(vec![7], vec![Level::HIGH]).unwrap();
//! ```

pub mod config;
pub mod event;
pub mod gpio;
pub mod gpio_pin_data;
pub mod pwm;
mod sysfs;

pub use config::Config;
pub use event::Edge;
pub use gpio::{Direction, Level, PullUpDown, GPIO};
pub use gpio_pin_data::{BoardInfo, ChannelInfo, Mode};
pub use pwm::PWM;
