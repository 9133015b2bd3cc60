use std::io;
use std::time::{Duration, Instant};

/// Byte channel to the unit, already configured for 9600 8E1.
pub trait Transport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Next byte, or `None` if nothing is buffered.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

/// Monotonic time source. `now` is measured from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
}

#[cfg(feature = "serial")]
mod serial {
    use std::io::{self, Read, Write};
    use std::time::Duration;

    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

    use super::Transport;

    pub const BAUD_RATE: u32 = 9600;
    const READ_TIMEOUT: Duration = Duration::from_millis(10);

    /// Open `path` with the unit's line settings.
    pub fn open_serial(path: &str) -> crate::Result<Box<dyn SerialPort>> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::Even)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(port)
    }

    impl Transport for Box<dyn SerialPort> {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            Write::write_all(self, bytes)?;
            self.flush()
        }

        fn bytes_available(&mut self) -> io::Result<usize> {
            let n = self.bytes_to_read().map_err(io::Error::from)?;
            Ok(n as usize)
        }

        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            let mut byte = [0u8; 1];
            match self.read(&mut byte) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
                Err(e) => Err(e),
            }
        }
    }
}

#[cfg(feature = "serial")]
pub use serial::{open_serial, BAUD_RATE};
