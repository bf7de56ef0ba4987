//! Simulator errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up the simulator
#[derive(Debug, Error)]
pub enum SimError {
    /// Reading or writing a file failed
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`SimConfig`](crate::SimConfig)
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration is well formed but unusable
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// An image file does not fit the simulated array
    #[error("image is {len} bytes but the flash holds {size}")]
    ImageTooLarge {
        /// Image length
        len: usize,
        /// Array size
        size: usize,
    },
}
