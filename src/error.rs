use thiserror::Error;

#[derive(Debug, Error)]
pub enum PenroseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown grammar preset '{0}'")]
    UnknownPreset(String),

    #[error("window error: {0}")]
    Window(String),

    #[error("image export error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<minifb::Error> for PenroseError {
    fn from(err: minifb::Error) -> Self {
        PenroseError::Window(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PenroseError>;
