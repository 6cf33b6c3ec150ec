use std::{
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::Result;

/// Inserted between the file stem and the extension of the default output path.
pub const FIXED_SUFFIX: &str = "-fixed";

/// A file read fully into memory, or about to be written.
pub struct Asset {
    pub bytes: Vec<u8>,
    path: PathBuf,
}

impl Asset {
    pub fn new(bytes: Vec<u8>, path: impl Into<PathBuf>) -> Self {
        Self {
            bytes,
            path: path.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::new(fs::read(path)?, path))
    }

    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }

    /// The default output path: `model.dae` becomes `model-fixed.dae`, next to the input.
    pub fn fixed_path(&self) -> PathBuf {
        let mut file_name = OsString::from(self.path.file_stem().unwrap_or_default());
        file_name.push(FIXED_SUFFIX);
        if let Some(extension) = self.path.extension() {
            file_name.push(".");
            file_name.push(extension);
        }

        self.path.with_file_name(file_name)
    }

    pub fn text(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.bytes)?)
    }

    /// Writes the asset through a temporary file in the target directory, so the target is
    /// either left untouched or fully written.
    pub fn write(&self) -> Result<()> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(directory)?;
        file.write_all(&self.bytes)?;
        file.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fixed_path() {
        let asset = Asset::new(Vec::new(), "models/avatar.dae");

        assert_eq!("avatar", asset.name());
        assert_eq!(PathBuf::from("models/avatar-fixed.dae"), asset.fixed_path());
        assert_eq!(
            PathBuf::from("avatar-fixed"),
            Asset::new(Vec::new(), "avatar").fixed_path()
        );
    }

    #[test]
    fn text_must_be_utf8() {
        assert_eq!("<COLLADA/>", Asset::new(b"<COLLADA/>".to_vec(), "a.dae").text().unwrap());
        assert!(Asset::new(vec![0xff, 0xfe], "a.dae").text().is_err());
    }

    #[test]
    fn write_replaces_the_target() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("out.dae");
        fs::write(&path, "old").unwrap();

        Asset::new(b"new".to_vec(), &path).write().unwrap();

        assert_eq!("new", fs::read_to_string(&path).unwrap());
        assert_eq!(1, fs::read_dir(directory.path()).unwrap().count());
    }
}
