//! Radio hardware: the HAL boundary, the RFM69 driver and its register map,
//! and the session that arbitrates half-duplex access to it.

pub mod hal;
pub mod registers;
pub mod rfm69;
pub mod session;

pub use hal::{Hal, HalError, MockHal};
pub use rfm69::{Modulation, RadioPins, Rfm69, Rfm69Mode};
pub use session::{RadioSession, SessionConfig, SessionState};
