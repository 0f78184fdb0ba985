use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatCtxError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No input found in {0}")]
    NoInput(String),
}
