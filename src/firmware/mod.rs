//! RP2040 firmware for the Waveshare PhotoPainter.
//!
//! Pin mapping:
//! - E-paper (SPI1): CLK=GPIO10, MOSI=GPIO11, CS=GPIO9, DC=GPIO8, RST=GPIO12,
//!   BUSY=GPIO13, power enable=GPIO16
//! - SD card (SPI0): SCK=GPIO2, MOSI=GPIO3, MISO=GPIO4, CS=GPIO5
//! - Battery divider: GPIO29 (ADC3)
//! - VBUS/battery sense: GPIO24
//! - Charger status: GPIO17 (low = charging)
//! - Battery latch: GPIO18 (low = power off)
//! - Next-image button: GPIO23 (falling edge)
//! - LEDs: activity=GPIO6, power=GPIO7

mod board;
mod epd7in3e;
mod error;
mod logger;
mod rosc;
mod sdcard;
mod tasks;

use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::spi::Spi;
use embassy_rp::watchdog::Watchdog;
use embassy_time::{Delay, Timer};
use photo_frame::shutdown::Watchdog as _;
use photo_frame::{Controller, FrameConfig, Outcome};

use self::board::PhotoPainter;
use self::epd7in3e::{Epd7in3e, panel_spi_config};
use self::rosc::Rosc;
use self::sdcard::{SdSlot, card_spi_config};
use self::tasks::{BUTTONS, CHARGE, POWER_LED, button_task, charge_task};

/// Bring up the board, run the control loop and park once it ends.
pub async fn run(spawner: Spawner) -> ! {
    logger::init();
    log::info!("Start");

    let p = embassy_rp::init(Default::default());

    // Keep battery power latched on until shutdown
    let bat_off = Output::new(p.PIN_18, Level::High);

    // Power LED on during startup
    let power_led = Output::new(p.PIN_7, Level::High);
    POWER_LED.lock(|led| *led.borrow_mut() = Some(power_led));
    let _activity_led = Output::new(p.PIN_6, Level::Low);

    let charge_state = Input::new(p.PIN_17, Pull::Up);
    CHARGE.set_charging(charge_state.is_low());
    let key = Input::new(p.PIN_23, Pull::Up);

    let sd_spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_4, card_spi_config());
    let sd_cs = Output::new(p.PIN_5, Level::High);

    let epd_spi = Spi::new_blocking_txonly(p.SPI1, p.PIN_10, p.PIN_11, panel_spi_config());
    let epd = Epd7in3e::new(
        epd_spi,
        Output::new(p.PIN_9, Level::High),
        Output::new(p.PIN_8, Level::Low),
        Output::new(p.PIN_12, Level::High),
        Input::new(p.PIN_13, Pull::None),
        Output::new(p.PIN_16, Level::Low),
    );

    let board = PhotoPainter {
        adc: Adc::new_blocking(p.ADC, adc::Config::default()),
        vbat: adc::Channel::new_pin(p.PIN_29, Pull::None),
        vbus: Input::new(p.PIN_24, Pull::None),
        bat_off,
        sd: SdSlot::new(sd_spi, sd_cs),
        epd,
        watchdog: Watchdog::new(p.WATCHDOG),
        watchdog_armed: false,
        rng: Rosc,
    };

    let (Ok(button), Ok(charge)) = (button_task(key), charge_task(charge_state)) else {
        return init_failed("could not spawn edge tasks").await;
    };
    spawner.spawn(button);
    spawner.spawn(charge);

    let mut controller = match Controller::new(board, FrameConfig::SELECTED, &BUTTONS) {
        Ok(controller) => controller,
        Err(e) => {
            log::error!("Invalid frame configuration: {}", e);
            return init_failed("configuration").await;
        }
    };

    let outcome = controller.run(&mut Delay).await;
    match outcome.fault() {
        Some(fault) => log::info!("Control loop ended: {} (exit code {})", fault, outcome.exit_code()),
        None => log::info!("Control loop ended: restart armed (exit code {})", outcome.exit_code()),
    }

    match outcome {
        // Still alive on USB power: keep the run-loop watchdog from firing
        Outcome::PoweredOff(_) => loop {
            controller.board_mut().feed();
            Timer::after_secs(1).await;
        },
        Outcome::RestartArmed | Outcome::InitFailed => park().await,
    }
}

async fn init_failed(what: &str) -> ! {
    let outcome = Outcome::InitFailed;
    if let Some(fault) = outcome.fault() {
        log::error!("{}: {}", fault, what);
    }
    log::info!("Exit code {}", outcome.exit_code());
    park().await
}

/// Wait for the watchdog reset, or forever.
async fn park() -> ! {
    loop {
        core::future::pending::<()>().await;
    }
}
