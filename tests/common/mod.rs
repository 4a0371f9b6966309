// A fake sysfs tree in a temporary directory. Exporting does not create
// directories here, so every GPIO and PWM channel a test touches is created
// up front as if the kernel had already exported it.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use opi5_gpio::Config;
use tempdir::TempDir;

pub struct FakeSysfs {
    dir: TempDir,
}

impl FakeSysfs {
    pub fn new() -> FakeSysfs {
        let dir = TempDir::new("opi5_gpio_sysfs").unwrap();
        let gpio_root = dir.path().join("gpio");
        fs::create_dir_all(&gpio_root).unwrap();
        fs::write(gpio_root.join("export"), "").unwrap();
        fs::write(gpio_root.join("unexport"), "").unwrap();
        fs::create_dir_all(dir.path().join("pwm")).unwrap();
        FakeSysfs { dir }
    }

    pub fn with_gpios(self, gpios: &[u32]) -> FakeSysfs {
        for gpio in gpios {
            let gpio_dir = self.gpio_root().join(format!("gpio{}", gpio));
            fs::create_dir_all(&gpio_dir).unwrap();
            for (name, value) in [("value", "0"), ("direction", "in"), ("edge", "none")] {
                fs::write(gpio_dir.join(name), value).unwrap();
            }
        }
        self
    }

    pub fn with_pwm(self, chip: u32, pin: u32) -> FakeSysfs {
        let chip_dir = self.pwm_root().join(format!("pwmchip{}", chip));
        let pwm_dir = chip_dir.join(format!("pwm{}", pin));
        fs::create_dir_all(&pwm_dir).unwrap();
        fs::write(chip_dir.join("export"), "").unwrap();
        fs::write(chip_dir.join("unexport"), "").unwrap();
        for (name, value) in [
            ("period", "0"),
            ("duty_cycle", "0"),
            ("enable", "0"),
            ("polarity", "normal"),
        ] {
            fs::write(pwm_dir.join(name), value).unwrap();
        }
        self
    }

    pub fn gpio_root(&self) -> PathBuf {
        self.dir.path().join("gpio")
    }

    pub fn pwm_root(&self) -> PathBuf {
        self.dir.path().join("pwm")
    }

    pub fn config(&self) -> Config {
        Config::default()
            .with_gpio_root(self.gpio_root())
            .with_pwm_root(self.pwm_root())
            .with_model("ORANGE_PI_5")
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> String {
        fs::read_to_string(self.dir.path().join(rel)).unwrap()
    }

    pub fn write(&self, rel: impl AsRef<Path>, value: &str) {
        fs::write(self.dir.path().join(rel), value).unwrap();
    }
}
