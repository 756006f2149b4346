//! Button and anemometer inputs for ESP32.
//!
//! # Wiring
//!
//! - Button → GPIO0 (PRG, active low, internal pull-up)
//! - Anemometer → GPIO34 (input-only, external pull-up via optocoupler)

use core::ffi::c_void;

use esp_idf_hal::gpio::{Input, InputPin, OutputPin, PinDriver, Pull};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::sys::{self, esp, EspError};

use super::clock::Esp32Clock;
use crate::isr::{wind_speed, EdgeRecorder, PulseCounter};

/// Polled push button feeding an [`EdgeRecorder`].
///
/// Call [`poll()`](Self::poll) every loop iteration (or from a timer); the
/// recorder applies the debounce and hands edges to the loop-side
/// `PressTracker`.
///
/// # Example
///
/// ```ignore
/// use heapless::spsc::Queue;
/// use allsky_node::hal::esp32::Esp32Button;
/// use allsky_node::isr::{PressTracker, EDGE_QUEUE_LEN};
///
/// let mut queue: Queue<_, EDGE_QUEUE_LEN> = Queue::new();
/// let (producer, consumer) = queue.split();
/// let mut button = Esp32Button::new(peripherals.pins.gpio0, producer, 50)?;
/// let mut presses = PressTracker::new(consumer);
///
/// loop {
///     button.poll();
///     if let Some(press) = presses.poll() {
///         println!("held {} ms", press.duration_ms);
///     }
/// }
/// ```
pub struct Esp32Button<'d, 'q, P, const N: usize>
where
    P: InputPin + OutputPin,
{
    pin: PinDriver<'d, P, Input>,
    recorder: EdgeRecorder<'q, N>,
}

impl<'d, 'q, P, const N: usize> Esp32Button<'d, 'q, P, N>
where
    P: InputPin + OutputPin,
{
    /// Configures `pin` as an input with pull-up.
    ///
    /// # Errors
    ///
    /// Returns an error if GPIO initialization fails.
    pub fn new(
        pin: impl Peripheral<P = P> + 'd,
        producer: heapless::spsc::Producer<'q, crate::isr::ButtonEdge, N>,
        debounce_ms: u32,
    ) -> Result<Self, EspError> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        Ok(Self {
            pin,
            recorder: EdgeRecorder::new(producer, debounce_ms),
        })
    }

    /// Sample the pin and record an edge if the level changed.
    pub fn poll(&mut self) {
        let pressed = self.pin.is_low();
        self.recorder.on_edge(pressed, Esp32Clock::now_ms32());
    }

    /// Edges lost because the loop fell behind.
    pub fn dropped(&self) -> u32 {
        self.recorder.dropped()
    }
}

/// Interrupt-counted anemometer.
///
/// Pulses are counted by a raw GPIO ISR into a `'static` [`PulseCounter`];
/// the ISR stays armed across pulses, unlike the one-shot HAL subscription.
pub struct Esp32Anemometer {
    gpio: i32,
    counter: &'static PulseCounter,
    window_start_ms: u64,
}

unsafe extern "C" fn on_wind_pulse(arg: *mut c_void) {
    let counter = &*(arg as *const PulseCounter);
    counter.on_pulse(Esp32Clock::now_ms32());
}

impl Esp32Anemometer {
    /// Install the falling-edge ISR on `gpio`.
    ///
    /// # Errors
    ///
    /// Returns an error if the GPIO or ISR service cannot be configured.
    pub fn new(gpio: i32, counter: &'static PulseCounter, now_ms: u64) -> Result<Self, EspError> {
        // Safe: configures a pin we own; the handler argument is 'static
        unsafe {
            esp!(sys::gpio_set_direction(gpio, sys::gpio_mode_t_GPIO_MODE_INPUT))?;
            esp!(sys::gpio_set_intr_type(
                gpio,
                sys::gpio_int_type_t_GPIO_INTR_NEGEDGE
            ))?;
            let installed = sys::gpio_install_isr_service(0);
            if installed != sys::ESP_OK as i32 && installed != sys::ESP_ERR_INVALID_STATE as i32 {
                esp!(installed)?;
            }
            esp!(sys::gpio_isr_handler_add(
                gpio,
                Some(on_wind_pulse),
                counter as *const PulseCounter as *mut c_void,
            ))?;
            esp!(sys::gpio_intr_enable(gpio))?;
        }

        Ok(Self {
            gpio,
            counter,
            window_start_ms: now_ms,
        })
    }

    /// Read and clear the pulse count, returning the mean speed since the
    /// last sample. `None` marks the reading invalid.
    pub fn sample(&mut self, now_ms: u64) -> Option<f32> {
        let pulses = self.counter.take();
        let window = now_ms.saturating_sub(self.window_start_ms);
        self.window_start_ms = now_ms;
        wind_speed(pulses, u32::try_from(window).unwrap_or(u32::MAX))
    }
}

impl Drop for Esp32Anemometer {
    fn drop(&mut self) {
        // Safe: removes the handler installed in `new`
        unsafe {
            sys::gpio_isr_handler_remove(self.gpio);
        }
    }
}
