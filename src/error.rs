#[derive(Debug)]
pub enum Error {
    InvalidData(String),
    ModelLoad(String),
    DetectorUnavailable(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Error::ModelLoad(msg) => write!(f, "Failed to load model: {}", msg),
            Error::DetectorUnavailable(msg) => write!(f, "Detector unavailable: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidData(_) => None,
            Error::ModelLoad(_) => None,
            Error::DetectorUnavailable(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
