//! Edge handlers for the next-image button and the charger status line.
//!
//! Both run as embassy tasks woken by GPIO edge interrupts. They only touch
//! the shared tally, the charge line and the power LED; the control loop
//! observes their effects on its next iteration.

use core::cell::RefCell;

use embassy_rp::gpio::{Input, Level, Output};
use embassy_time::{Instant, Timer};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use photo_frame::cadence::DEBOUNCE_MS;
use photo_frame::{ButtonTally, ChargeLine, Debouncer};

/// Presses of the next-image button.
pub static BUTTONS: ButtonTally = ButtonTally::new();

/// Charger status shared with the board adapter.
pub static CHARGE: ChargeLine = ChargeLine::new();

/// Power LED, driven by both the charge handler and the control loop.
pub static POWER_LED: Mutex<CriticalSectionRawMutex, RefCell<Option<Output<'static>>>> =
    Mutex::new(RefCell::new(None));

/// Set the power LED if it has been installed.
pub fn set_power_led(on: bool) {
    POWER_LED.lock(|led| {
        if let Some(led) = led.borrow_mut().as_mut() {
            led.set_level(Level::from(on));
        }
    });
}

/// Count debounced presses of the next-image button (active low).
#[embassy_executor::task]
pub async fn button_task(mut key: Input<'static>) {
    let mut debouncer = Debouncer::new();
    loop {
        key.wait_for_any_edge().await;
        accept_level(&mut debouncer, &key);
        // Re-read after the bounce window so a rejected final edge is not lost
        Timer::after_millis(DEBOUNCE_MS).await;
        accept_level(&mut debouncer, &key);
    }
}

fn accept_level(
    debouncer: &mut Debouncer,
    key: &Input<'static>,
) {
    if debouncer.just_pressed(key.is_low(), Instant::now().as_millis()) {
        log::info!("Next button pressed");
        BUTTONS.press();
    }
}

/// Follow the charger status (active low) and mirror it on the power LED.
#[embassy_executor::task]
pub async fn charge_task(mut charge_state: Input<'static>) {
    loop {
        charge_state.wait_for_any_edge().await;
        if let Some(on) = CHARGE.on_edge(charge_state.is_low()) {
            set_power_led(on);
        }
    }
}
