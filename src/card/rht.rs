//! Asynchronous I²C relative-humidity/temperature card: the driver lives
//! on a background thread and samples at its own
//! interval (>= 100ms), delivering the latest reading to the chassis
//! thread through a mutex-protected double-buffer. A scan that finds no
//! new sample since the last one is not an error — the virtual points
//! simply keep their previous value, tolerating the sensor's own pace
//! being slower than the chassis's.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::card::{apply_setters, Card, ChannelPoints};
use crate::driver_itc::{DoubleBuffer, SequenceCoalescer};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub const MIN_DRIVER_INTERVAL_US: u64 = 100_000;

/// The physical sensor, abstracted so tests can supply canned readings.
/// Returns `(relative_humidity_pct, temperature_c)`.
pub trait RhtSensor: Send + 'static {
    fn sample(&mut self) -> Result<(f32, f32), FxtError>;
}

/// Lets a type-erased sensor satisfy the `impl RhtSensor` bound `spawn`
/// takes, so the node factory can hand a `Box<dyn RhtSensor + Send>` in
/// without this card ever being generic over the sensor type (unlike
/// `GpioCard`/`CompositeCard`, this card has no type parameter to erase —
/// the sensor only ever exists behind the background thread's closure).
impl RhtSensor for Box<dyn RhtSensor + Send> {
    fn sample(&mut self) -> Result<(f32, f32), FxtError> {
        (**self).sample()
    }
}

struct Shared {
    // A mutex-protected double-buffer for ITC-attached cards: the driver
    // thread publishes the latest reading here, the chassis thread reads
    // it on `scan_inputs`, and neither ever blocks the other beyond the
    // short critical section a single lock/unlock takes.
    latest: DoubleBuffer<Option<(f32, f32)>>,
    // Coalesces the driver-thread -> chassis-thread IoScan direction: the
    // driver thread `publish()`es a sequence number each time it writes a
    // fresh reading into `latest`; the chassis thread `on_response()`s with
    // whatever sequence it last consumed on `scan_inputs`. Stands in for
    // an `io_scan_request`/`io_scan_response` pair without an actual
    // message queue, same as `DoubleBuffer` stands in for the message body.
    coalescer: Mutex<SequenceCoalescer>,
    stop: AtomicBool,
}

pub struct RhtCard {
    slot: u32,
    driver_interval_us: u64,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    humidity: ChannelPoints,
    temperature: ChannelPoints,
    started: bool,
    error: FxtError,
    pending_sensor: Option<Box<dyn RhtSensor + Send>>,
}

impl RhtCard {
    pub fn new(slot: u32, driver_interval_us: u64, humidity: ChannelPoints, temperature: ChannelPoints) -> Result<Self, FxtError> {
        if driver_interval_us < MIN_DRIVER_INTERVAL_US {
            return Err(FxtError::card(1, 5)); // CARD:PARSE:DRIVER_INTERVAL_TOO_SMALL
        }
        Ok(RhtCard {
            slot,
            driver_interval_us,
            shared: Arc::new(Shared {
                latest: DoubleBuffer::new(None),
                coalescer: Mutex::new(SequenceCoalescer::new()),
                stop: AtomicBool::new(false),
            }),
            handle: None,
            humidity,
            temperature,
            started: false,
            error: FxtError::SUCCESS,
            pending_sensor: None,
        })
    }

    /// Builds a card with a hardware sensor attached up front. Used by the
    /// node factory, which erases the concrete sensor type at config-load
    /// time — long before `Card::start` (the trait method the scanner
    /// actually calls) runs on the chassis thread.
    pub fn with_sensor(
        slot: u32,
        driver_interval_us: u64,
        humidity: ChannelPoints,
        temperature: ChannelPoints,
        sensor: Box<dyn RhtSensor + Send>,
    ) -> Result<Self, FxtError> {
        let mut card = Self::new(slot, driver_interval_us, humidity, temperature)?;
        card.pending_sensor = Some(sensor);
        Ok(card)
    }

    fn spawn(&mut self, mut sensor: impl RhtSensor) {
        let shared = Arc::clone(&self.shared);
        let interval = Duration::from_micros(self.driver_interval_us);
        // Poll the stop flag in small slices so `stop` observes completion
        // promptly instead of waiting out a full driver interval.
        let poll_slice = Duration::from_millis(5).min(interval);
        self.handle = Some(thread::spawn(move || {
            let mut waited = Duration::ZERO;
            loop {
                if shared.stop.load(Ordering::Acquire) {
                    return;
                }
                if waited >= interval {
                    waited = Duration::ZERO;
                    if let Ok(reading) = sensor.sample() {
                        shared.latest.write(Some(reading));
                        shared.coalescer.lock().expect("rht coalescer mutex poisoned").publish();
                    }
                }
                thread::sleep(poll_slice);
                waited += poll_slice;
            }
        }));
    }

    pub fn start_with_sensor(&mut self, point_db: &mut PointDatabase, sensor: impl RhtSensor) -> bool {
        self.error = FxtError::SUCCESS;
        apply_setters(&[self.humidity, self.temperature], point_db);
        if self.handle.is_none() {
            self.spawn(sensor);
        }
        self.started = true;
        true
    }
}

impl Card for RhtCard {
    /// `Card::start` cannot take a sensor parameter (the trait is shared
    /// with synchronous cards). If a sensor was attached at construction
    /// time (`with_sensor`, what the node factory uses) this spawns the
    /// background driver thread on first start; otherwise (or on a
    /// restart, where the thread is already running) it only re-applies
    /// setters.
    fn start(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        self.error = FxtError::SUCCESS;
        apply_setters(&[self.humidity, self.temperature], point_db);
        if self.handle.is_none() {
            if let Some(sensor) = self.pending_sensor.take() {
                self.spawn(sensor);
            }
        }
        self.started = true;
        true
    }

    fn stop(&mut self, _point_db: &mut PointDatabase) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.started = false;
    }

    fn scan_inputs(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        let mut coalescer = self.shared.coalescer.lock().expect("rht coalescer mutex poisoned");
        if !coalescer.request_owed() {
            return true; // no new sample yet; not an error
        }
        let seq = coalescer.current_seq();
        coalescer.on_response(seq);
        drop(coalescer);
        let reading = self.shared.latest.read();
        if let Some((rh, temp)) = reading {
            if let Some(p) = point_db.get_mut(self.humidity.io_register_id) {
                p.write(PointValue::F32(rh), LockRequest::NoRequest);
            }
            if let Some(p) = point_db.get_mut(self.temperature.io_register_id) {
                p.write(PointValue::F32(temp), LockRequest::NoRequest);
            }
            crate::card::copy_registers_to_virtual(&[self.humidity, self.temperature], point_db);
        }
        true
    }

    fn flush_outputs(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        true // input-only card
    }

    fn type_guid(&self) -> &'static str {
        guid::card::RHT_I2C
    }

    fn type_name(&self) -> &'static str {
        "rht_i2c"
    }

    fn slot_number(&self) -> u32 {
        self.slot
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn error_code(&self) -> FxtError {
        self.error
    }
}

impl Drop for RhtCard {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
