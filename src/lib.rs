//! Serial driver for Toshiba/Carrier split air conditioners.
//!
//! The unit speaks a framed binary protocol over a 9600 baud 8E1 link. This
//! crate performs the connection handshake, decodes status and settings
//! reports, and pushes requested setting changes back one field at a time.
//!
//! ```no_run
//! # #[cfg(feature = "serial")]
//! # fn main() -> toshiba_hvac::Result<()> {
//! use toshiba_hvac::{open_serial, Hvac, Mode};
//!
//! let port = open_serial("/dev/ttyUSB0")?;
//! let mut hvac = Hvac::builder(port)
//!     .on_settings(|s| println!("settings: {s:?}"))
//!     .build()?;
//! hvac.set_mode(Mode::Cool);
//! loop {
//!     hvac.service()?;
//! }
//! # }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```

#[macro_use]
mod table;

mod client;
pub mod coalesce;
pub mod codec;
mod dispatch;
mod error;
pub mod handshake;
mod logger;
mod reconcile;
pub mod sync;
mod transport;
mod types;

pub use client::{Hvac, HvacBuilder, Timing, RX_MAX_BYTES};
pub use error::{Error, Result};
pub use handshake::LinkState;
pub use logger::FrameLogMode;
pub use table::UNKNOWN;
#[cfg(feature = "serial")]
pub use transport::{open_serial, BAUD_RATE};
pub use transport::{Clock, SystemClock, Transport};
pub use types::*;
