//! Versioned log filename codec.
//!
//! Log files are named `<20-digit-zero-padded-version>.json`. The version is
//! the authoritative ordering key of the log, so parsing is strict: a name
//! must have a purely numeric stem at least twenty digits wide.

use super::error::DeltaError;

const FILE_EXTENSION: &str = ".json";
const VERSION_DIGITS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName {
    file_name: String,
    version: i64,
}

impl LogFileName {
    /// Builds the filename for a version.
    pub fn from_version(version: i64) -> Result<Self, DeltaError> {
        if version < 0 {
            return Err(DeltaError::NegativeVersion(version));
        }
        Ok(Self {
            file_name: format!("{:0width$}{}", version, FILE_EXTENSION, width = VERSION_DIGITS),
            version,
        })
    }

    /// Parses a filename or path into its version.
    ///
    /// Only the basename after the last `/` is considered.
    pub fn parse(path: &str) -> Result<Self, DeltaError> {
        let base_name = match path.rfind('/') {
            Some(idx) => &path[idx + 1..],
            None => path,
        };
        let invalid = || DeltaError::InvalidLogFileName(base_name.to_string());

        let stem = base_name.strip_suffix(FILE_EXTENSION).ok_or_else(invalid)?;
        if stem.len() < VERSION_DIGITS || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let version: i64 = stem.parse().map_err(|_| invalid())?;
        Ok(Self {
            file_name: base_name.to_string(),
            version,
        })
    }

    /// Non-failing variant of [`parse`] for directory scans: returns -1 for
    /// anything that is not a valid log filename.
    ///
    /// [`parse`]: LogFileName::parse
    pub fn version_from_name(path: &str) -> i64 {
        Self::parse(path).map(|name| name.version).unwrap_or(-1)
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Joins this filename onto a directory path with `/` separators.
    pub fn path_in(&self, directory: &str) -> String {
        if directory.ends_with('/') {
            format!("{}{}", directory, self.file_name)
        } else {
            format!("{}/{}", directory, self.file_name)
        }
    }
}
