//! Bus shared between a periodic emitter and command callers
//!
//! The emitter must never wait: if a registry update or command exchange
//! holds the bus when the tick fires, that broadcast period is skipped.
//!
//! ```ignore
//! static BUS: SharedXBus<CriticalSectionRawMutex, Uart1> = SharedXBus::new(bus);
//!
//! // ticker task, every 14 ms
//! BUS.emit()?;
//!
//! // application task
//! BUS.lock().await.set_servo(1, SERVO_2100_US)?;
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use xbus_hal::{DirectionPin, NoDirectionPin, Uart};

use crate::engine::Emission;
use crate::error::Result;
use crate::servo::XBusServo;

/// [`XBusServo`] behind an `embassy-sync` mutex
pub struct SharedXBus<M: RawMutex, S, D = NoDirectionPin> {
    inner: Mutex<M, XBusServo<S, D>>,
}

impl<M: RawMutex, S, D> SharedXBus<M, S, D> {
    pub const fn new(bus: XBusServo<S, D>) -> Self {
        Self {
            inner: Mutex::new(bus),
        }
    }

    /// Wait for exclusive access
    pub async fn lock(&self) -> MutexGuard<'_, M, XBusServo<S, D>> {
        self.inner.lock().await
    }

    /// Exclusive access if nobody else holds the bus
    pub fn try_lock(&self) -> Option<MutexGuard<'_, M, XBusServo<S, D>>> {
        self.inner.try_lock().ok()
    }

    pub fn into_inner(self) -> XBusServo<S, D> {
        self.inner.into_inner()
    }
}

impl<M: RawMutex, S: Uart, D: DirectionPin> SharedXBus<M, S, D> {
    /// Write one broadcast unless the bus is in use
    pub fn emit(&self) -> Result<Emission> {
        match self.inner.try_lock() {
            Ok(mut bus) => bus.emit(),
            Err(_) => {
                trace!("bus busy, broadcast skipped");
                Ok(Emission::Busy)
            }
        }
    }
}
