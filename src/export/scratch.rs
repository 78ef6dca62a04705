//! Temporary HTML page handed to the browser.

use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

/// An HTML file inside its own temporary directory.
///
/// Both are deleted when the value is dropped, on success and error paths
/// alike.
pub struct ScratchPage {
    // Drop order: the file goes first, then the directory
    file: NamedTempFile,
    dir: TempDir,
}

impl ScratchPage {
    pub fn write(html: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("tablesnap-").tempdir()?;
        let mut file = tempfile::Builder::new()
            .prefix("table-")
            .suffix(".html")
            .tempfile_in(dir.path())?;
        file.write_all(html.as_bytes())?;
        file.flush()?;
        Ok(Self { file, dir })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// `file://` URL of the page
    pub fn url(&self) -> Result<String> {
        url::Url::from_file_path(self.path())
            .map(String::from)
            .map_err(|_| {
                Error::ConfigError(format!(
                    "Cannot build a file URL for {}",
                    self.path().display()
                ))
            })
    }
}
