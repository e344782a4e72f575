use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};
use tracing::debug;

/// Serializes `value` as pretty-printed JSON to `path`, creating parent directories as needed.
pub fn save_json<T>(path: impl AsRef<Path>, value: &T) -> Result<()>
where
    T: ?Sized + Serialize,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| Error::io(err, format!("failed to create directory {parent:?}")))?;
    }
    let file =
        File::create(path).map_err(|err| Error::io(err, format!("failed to create {path:?}")))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|err| Error::SerializationFailed(err.to_string()))?;
    writer
        .flush()
        .map_err(|err| Error::io(err, format!("failed to save {path:?}")))?;
    debug!("saved {path:?}");
    Ok(())
}

/// Deserializes JSON from `path`.
pub fn load_json<T>(path: impl AsRef<Path>) -> Result<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|err| Error::io(err, format!("failed to open {path:?}")))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| Error::InvalidConfig {
        path: path.to_path_buf(),
        error: err.to_string(),
    })
}
