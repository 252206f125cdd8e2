use std::io::Write;
use std::path::PathBuf;

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn metadata(&self, ident: &str) -> std::io::Result<std::fs::Metadata>;
}

/// Files in a single local directory.
#[derive(Clone, Debug)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &str) -> std::io::Result<Self> {
        let path = PathBuf::from(storage_dir);
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.base_dir.join(ident)).is_ok()
    }

    fn metadata(&self, ident: &str) -> std::io::Result<std::fs::Metadata> {
        std::fs::metadata(self.base_dir.join(ident))
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.base_dir.join(ident))
    }

    /// Write through a temp file in the same directory, then rename over
    /// the target so readers never see a partial file.
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let mut temp = tempfile::NamedTempFile::new_in(&self.base_dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(self.base_dir.join(ident))
            .map_err(|e| e.error)?;
        Ok(())
    }
}
