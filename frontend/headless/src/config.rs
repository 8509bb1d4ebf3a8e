use dust_wifi::Config;
use std::{fmt, fs, io, path::Path};

pub enum Error {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::Json(err) => write!(f, "JSON deserialization error: {err}"),
        }
    }
}

/// Reads a JSON configuration file; a missing file yields the default configuration.
pub fn read(path: &Path) -> Result<Config, Error> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(err) => return Err(Error::Io(err)),
    };
    serde_json::from_str(&content).map_err(Error::Json)
}
