use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    PayloadTooLarge { len: usize, max: usize },
    InvalidFrameLength(usize),
    Log(std::io::Error),
    #[cfg(feature = "serial")]
    Serial(serialport::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::PayloadTooLarge { len, max } => {
                write!(f, "payload too large: {len} bytes (max {max})")
            }
            Error::InvalidFrameLength(len) => write!(f, "invalid frame length: {len}"),
            Error::Log(e) => write!(f, "frame log error: {e}"),
            #[cfg(feature = "serial")]
            Error::Serial(e) => write!(f, "serial port error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Log(e) => Some(e),
            #[cfg(feature = "serial")]
            Error::Serial(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(feature = "serial")]
impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        Error::Serial(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
