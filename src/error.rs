use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Directory {} does not exist.", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to list {}: {source}", path.display())]
    ListingFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not open or process image {name}: {source}")]
    EntryOpenFailed {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("{0}")]
    DeviceConfigFailed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_not_found_names_the_path() {
        let err = Error::DirectoryNotFound(PathBuf::from("/app/training_images"));
        assert_eq!(
            err.to_string(),
            "Directory /app/training_images does not exist."
        );
    }

    #[test]
    fn entry_open_failed_keeps_its_cause() {
        let err = Error::EntryOpenFailed {
            name: "cat.png".to_string(),
            source: image::ImageError::IoError(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad header",
            )),
        };

        assert!(err
            .to_string()
            .starts_with("Could not open or process image cat.png: "));
        assert!(std::error::Error::source(&err).is_some());
    }
}
