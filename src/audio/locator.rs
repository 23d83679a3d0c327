use std::path::PathBuf;

use crate::error::DeviceError;

/// Turn a track locator into a local path. Accepts bare paths and `file://` URLs.
pub(crate) fn resolve_locator(url: &str) -> Result<PathBuf, DeviceError> {
    if let Some(rest) = url.strip_prefix("file://") {
        if rest.is_empty() {
            return Err(unreadable(url, "empty path"));
        }
        return Ok(PathBuf::from(rest));
    }

    match url.split_once("://") {
        Some((scheme, _)) => Err(unreadable(url, &format!("unsupported scheme `{scheme}`"))),
        None if url.trim().is_empty() => Err(unreadable(url, "empty locator")),
        None => Ok(PathBuf::from(url)),
    }
}

pub(crate) fn unreadable(url: &str, reason: &str) -> DeviceError {
    DeviceError::Unreadable {
        locator: url.to_string(),
        reason: reason.to_string(),
    }
}
