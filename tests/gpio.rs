mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::FakeSysfs;
use opi5_gpio::{Direction, Edge, Level, Mode, PullUpDown, GPIO};

#[test]
fn blink_pin_7() {
    let sysfs = FakeSysfs::new().with_gpios(&[54]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    assert_eq!(gpio.config().gpio_root, sysfs.gpio_root());
    assert_eq!(gpio.board_info.model, "ORANGE_PI_5");

    gpio.setmode(Mode::BOARD).unwrap();
    gpio.setup(vec![7], Direction::OUT, None).unwrap();
    assert_eq!(sysfs.read("gpio/export"), "54");
    assert_eq!(sysfs.read("gpio/gpio54/direction"), "out");

    gpio.output(vec![7], vec![Level::HIGH]).unwrap();
    assert_eq!(sysfs.read("gpio/gpio54/value"), "1");
    assert_eq!(gpio.input(7).unwrap(), Level::HIGH);

    gpio.cleanup(None).unwrap();
    assert_eq!(sysfs.read("gpio/unexport"), "54");
    assert_eq!(gpio.getmode(), None);
}

#[test]
fn setup_outputs_with_initial_level() {
    let sysfs = FakeSysfs::new().with_gpios(&[54, 138]);
    sysfs.write("gpio/gpio54/value", "1");
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();

    gpio.setup(vec![7, 11], Direction::OUT, Some(Level::LOW)).unwrap();
    assert_eq!(sysfs.read("gpio/gpio54/value"), "0");
    assert_eq!(sysfs.read("gpio/gpio138/direction"), "out");
    assert_eq!(gpio.gpio_function(11).unwrap(), Direction::OUT);

    gpio.output(vec![7, 11], vec![Level::HIGH, Level::LOW]).unwrap();
    assert_eq!(sysfs.read("gpio/gpio54/value"), "1");
    assert_eq!(sysfs.read("gpio/gpio138/value"), "0");

    // a single value applies to every channel
    gpio.output(vec![7, 11], vec![Level::HIGH]).unwrap();
    assert_eq!(sysfs.read("gpio/gpio138/value"), "1");

    let err = gpio
        .output(vec![7, 11], vec![Level::HIGH, Level::LOW, Level::HIGH])
        .unwrap_err();
    assert_eq!(err.to_string(), "Number of values != number of channels");

    let err = gpio.setup(vec![7], Direction::OUT, None).unwrap_err();
    assert_eq!(err.to_string(), "Channel 7 is already configured");
}

#[test]
fn repeated_channel_in_one_setup() {
    let sysfs = FakeSysfs::new().with_gpios(&[54, 138]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();

    let err = gpio.setup(vec![7, 11, 7], Direction::OUT, None).unwrap_err();
    assert_eq!(err.to_string(), "Channel 7 is already configured");

    // nothing was exported or recorded
    assert_eq!(sysfs.read("gpio/export"), "");
    assert!(gpio.input(7).is_err());
    assert!(gpio.input(11).is_err());

    gpio.setup(vec![7, 11], Direction::OUT, None).unwrap();
    gpio.cleanup(None).unwrap();
}

#[test]
fn inputs_reject_output() {
    let sysfs = FakeSysfs::new().with_gpios(&[29]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();

    gpio.setup_with_pull(vec![12], Direction::IN, None, PullUpDown::UP)
        .unwrap();
    assert_eq!(sysfs.read("gpio/gpio29/direction"), "in");

    sysfs.write("gpio/gpio29/value", "1\n");
    assert_eq!(gpio.input(12).unwrap(), Level::HIGH);

    let err = gpio.output(vec![12], vec![Level::LOW]).unwrap_err();
    assert_eq!(err.to_string(), "Channel 12 is configured for input");
}

#[test]
fn cleanup_selected_channels() {
    let sysfs = FakeSysfs::new().with_gpios(&[54, 138]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();
    gpio.setwarnings(false);
    gpio.setup(vec![7, 11], Direction::OUT, None).unwrap();

    gpio.cleanup(Some(vec![11])).unwrap();
    assert_eq!(sysfs.read("gpio/unexport"), "138");
    assert!(gpio.output(vec![11], vec![Level::HIGH]).is_err());
    gpio.output(vec![7], vec![Level::HIGH]).unwrap();
    assert_eq!(gpio.getmode(), Some(Mode::BOARD));

    // cleaning a channel twice fails, like any unconfigured channel
    assert!(gpio.cleanup(Some(vec![11])).is_err());

    // channel 11 can be set up again
    gpio.setup(vec![11], Direction::IN, None).unwrap();
    gpio.cleanup(None).unwrap();
    assert_eq!(gpio.getmode(), None);
}

#[test]
fn soc_numbering() {
    let sysfs = FakeSysfs::new().with_gpios(&[47]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::SOC).unwrap();

    // header pin numbers are not valid here
    assert!(gpio.setup(vec![3], Direction::OUT, None).is_err());

    let pin = opi5_gpio::gpio_pin_data::rockchip_gpio_number("GPIO1_B7").unwrap();
    gpio.setup(vec![pin], Direction::OUT, Some(Level::HIGH)).unwrap();
    assert_eq!(sysfs.read("gpio/gpio47/value"), "1");
    gpio.cleanup(None).unwrap();
}

#[test]
fn custom_numbering() {
    let sysfs = FakeSysfs::new().with_gpios(&[46]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode_custom(HashMap::from([(1, 46)])).unwrap();

    gpio.setup(vec![1], Direction::OUT, None).unwrap();
    gpio.output(vec![1], vec![Level::HIGH]).unwrap();
    assert_eq!(sysfs.read("gpio/gpio46/value"), "1");
    gpio.cleanup(None).unwrap();
}

#[test]
fn missing_export_directory_times_out() {
    // gpio54 never appears after export
    let sysfs = FakeSysfs::new();
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();

    assert!(gpio.setup(vec![7], Direction::OUT, None).is_err());
    assert!(gpio.input(7).is_err());
}

#[test]
fn wait_for_edge_timeout() {
    let sysfs = FakeSysfs::new().with_gpios(&[59, 54]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();
    gpio.setup(vec![16], Direction::IN, None).unwrap();
    gpio.setup(vec![7], Direction::OUT, None).unwrap();

    let ret = gpio
        .wait_for_edge(16, Edge::FALLING, Some(Duration::from_millis(20)))
        .unwrap();
    assert_eq!(ret, None);
    assert_eq!(sysfs.read("gpio/gpio59/edge"), "falling");

    // edges are only watched on inputs
    assert!(gpio
        .wait_for_edge(7, Edge::RISING, Some(Duration::ZERO))
        .is_err());
}

#[test]
fn event_detection() {
    let sysfs = FakeSysfs::new().with_gpios(&[59]);
    let mut gpio = GPIO::with_config(sysfs.config()).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();
    gpio.setup(vec![16], Direction::IN, None).unwrap();

    assert!(gpio.add_event_callback(16, |_| {}).is_err());

    gpio.add_event_detect(
        16,
        Edge::BOTH,
        Some(|channel: u32| println!("edge on {}", channel)),
        Some(Duration::from_millis(200)),
    )
    .unwrap();
    assert_eq!(sysfs.read("gpio/gpio59/edge"), "both");
    gpio.add_event_callback(16, |_| {}).unwrap();
    assert!(!gpio.event_detected(16).unwrap());

    // a blocking wait would race the detector thread
    assert!(gpio
        .wait_for_edge(16, Edge::RISING, Some(Duration::ZERO))
        .is_err());

    gpio.remove_event_detect(16).unwrap();
    assert_eq!(sysfs.read("gpio/gpio59/edge"), "none");
    assert!(gpio.remove_event_detect(16).is_err());

    // cleanup stops a running detector too
    gpio.add_event_detect(16, Edge::RISING, None::<fn(u32)>, None)
        .unwrap();
    gpio.cleanup(None).unwrap();
    assert_eq!(sysfs.read("gpio/gpio59/edge"), "none");
    assert_eq!(sysfs.read("gpio/unexport"), "59");
}
