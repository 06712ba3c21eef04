use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::{Builder, NamedTempFile};
use tracing::trace;

use crate::config::BodyConfig;

/// Lazily created temporary file accumulating body bytes.
///
/// Disposition is fixed at creation: the default file is unlinked when the
/// request is torn down (drop), a persistent file stays on disk, and a clean
/// file is unlinked right after open so it exists only through the
/// descriptor.
pub struct SpillFile {
    handle: Handle,
    offset: u64,
}

enum Handle {
    Named(NamedTempFile),
    Persistent { file: File, path: PathBuf },
    Clean(File),
}

impl SpillFile {
    pub(crate) fn create(config: &BodyConfig) -> io::Result<Self> {
        let mut builder = Builder::new();
        builder.prefix("client-body-");

        let handle = if config.body_in_clean_file {
            let (file, path) = builder
                .tempfile_in(&config.client_body_temp_path)?
                .into_parts();
            trace!(target: "h1_body", "clean client body file {:?}", &*path);
            drop(path);
            Handle::Clean(file)
        } else if config.body_in_persistent_file {
            let (file, path) = builder
                .tempfile_in(&config.client_body_temp_path)?
                .keep()
                .map_err(|e| e.error)?;
            trace!(target: "h1_body", "persistent client body file {:?}", path);
            Handle::Persistent { file, path }
        } else {
            let named = builder.tempfile_in(&config.client_body_temp_path)?;
            trace!(target: "h1_body", "client body file {:?}", named.path());
            Handle::Named(named)
        };

        let spill = Self { handle, offset: 0 };

        #[cfg(unix)]
        {
            if config.body_file_group_access {
                use std::os::unix::fs::PermissionsExt;
                spill
                    .file()
                    .set_permissions(std::fs::Permissions::from_mode(0o660))?;
            }
        }

        config
            .body_file_log_level
            .emit("a client request body is buffered to a temporary file");

        Ok(spill)
    }

    /// Append a live byte range. Short and zero length writes are reported
    /// as errors by the underlying `write_all`.
    pub(crate) fn append(&mut self, slice: &[u8]) -> io::Result<()> {
        self.file_mut().write_all(slice)?;
        self.offset += slice.len() as u64;
        Ok(())
    }

    /// Bytes written so far, which is also the exclusive end of the file
    /// segment exposed on completion.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn file(&self) -> &File {
        match self.handle {
            Handle::Named(ref named) => named.as_file(),
            Handle::Persistent { ref file, .. } => file,
            Handle::Clean(ref file) => file,
        }
    }

    fn file_mut(&mut self) -> &mut File {
        match self.handle {
            Handle::Named(ref mut named) => named.as_file_mut(),
            Handle::Persistent { ref mut file, .. } => file,
            Handle::Clean(ref mut file) => file,
        }
    }

    /// On-disk path, if the file still has one.
    pub fn path(&self) -> Option<&Path> {
        match self.handle {
            Handle::Named(ref named) => Some(named.path()),
            Handle::Persistent { ref path, .. } => Some(path),
            Handle::Clean(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Read;

    use super::*;

    fn config_in(dir: &Path) -> BodyConfig {
        BodyConfig::new().client_body_temp_path(dir)
    }

    #[test]
    fn append_tracks_offset() {
        let dir = tempfile::tempdir().unwrap();
        let mut spill = SpillFile::create(&config_in(dir.path())).unwrap();

        spill.append(b"hello ").unwrap();
        spill.append(b"world").unwrap();
        assert_eq!(spill.offset(), 11);

        let mut contents = String::new();
        let mut f = spill.file().try_clone().unwrap();
        use std::io::Seek;
        f.seek(io::SeekFrom::Start(0)).unwrap();
        f.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello world");
    }

    #[test]
    fn default_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let spill = SpillFile::create(&config_in(dir.path())).unwrap();
        let path = spill.path().unwrap().to_path_buf();
        assert!(path.exists());

        drop(spill);
        assert!(!path.exists());
    }

    #[test]
    fn persistent_file_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path()).body_in_persistent_file(true);
        let mut spill = SpillFile::create(&config).unwrap();
        spill.append(b"keep me").unwrap();
        let path = spill.path().unwrap().to_path_buf();

        drop(spill);
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn clean_file_has_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path()).body_in_clean_file(true);
        let mut spill = SpillFile::create(&config).unwrap();

        assert!(spill.path().is_none());
        spill.append(b"ghost").unwrap();
        assert_eq!(spill.offset(), 5);

        // the directory holds nothing; the file lives only through the fd
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn group_access_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path()).body_file_group_access(true);
        let spill = SpillFile::create(&config).unwrap();

        let mode = spill.file().metadata().unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o660);
    }
}
