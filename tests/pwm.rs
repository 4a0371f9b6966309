mod common;

use common::FakeSysfs;
use opi5_gpio::PWM;

#[test]
fn pwm_lifecycle() {
    let sysfs = FakeSysfs::new().with_pwm(0, 1);

    let mut pwm = PWM::new(sysfs.config(), 0, 1, 1000.0, 50.0, false).unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip0/export"), "1");
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm1/period"), "1000000");
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm1/enable"), "1");
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm1/polarity"), "normal");
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm1/duty_cycle"), "0");

    pwm.start_pwm().unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm1/duty_cycle"), "500000");

    pwm.duty_cycle(25.0).unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm1/duty_cycle"), "250000");
    assert!(pwm.duty_cycle(101.0).is_err());
    assert_eq!(pwm.duty_cycle_percent, 25.0);

    pwm.stop_pwm().unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm1/duty_cycle"), "0");

    pwm.pwm_close().unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip0/unexport"), "1");
}

#[test]
fn change_frequency_keeps_duty_cycle_ratio() {
    let sysfs = FakeSysfs::new().with_pwm(2, 0);
    let mut pwm = PWM::new(sysfs.config(), 2, 0, 1000.0, 40.0, false).unwrap();

    pwm.change_frequency(500.0).unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip2/pwm0/period"), "2000000");
    assert_eq!(sysfs.read("pwm/pwmchip2/pwm0/duty_cycle"), "800000");

    pwm.change_frequency(2000.0).unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip2/pwm0/period"), "500000");
    assert_eq!(sysfs.read("pwm/pwmchip2/pwm0/duty_cycle"), "200000");
    assert_eq!(pwm.frequency, 2000.0);

    assert!(pwm.change_frequency(0.0).is_err());
    assert_eq!(pwm.frequency, 2000.0);
}

#[test]
fn inverted_polarity() {
    let sysfs = FakeSysfs::new().with_pwm(0, 0);
    let mut pwm = PWM::new(sysfs.config(), 0, 0, 50.0, 10.0, true).unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm0/polarity"), "inversed");

    pwm.pwm_polarity().unwrap();
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm0/polarity"), "normal");
    assert_eq!(sysfs.read("pwm/pwmchip0/pwm0/enable"), "1");
    assert!(!pwm.invert_polarity);
}

#[test]
fn invalid_arguments_are_rejected_before_export() {
    let sysfs = FakeSysfs::new().with_pwm(0, 0);
    assert!(PWM::new(sysfs.config(), 0, 0, 1000.0, 120.0, false).is_err());
    assert!(PWM::new(sysfs.config(), 0, 0, -5.0, 50.0, false).is_err());
    assert_eq!(sysfs.read("pwm/pwmchip0/export"), "");
}
