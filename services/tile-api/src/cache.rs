//! Path-keyed disk cache for composited tiles.
//!
//! Layout on disk is `<root>/<zoom>/<x>/<y>.png`. Entries are created on
//! first successful composition and never invalidated by this service.
//! Writes go through a temporary file and an atomic rename so a concurrent
//! reader never sees a partially written tile; concurrent writers for the
//! same key race benignly (last writer wins).

use std::fs;
use std::path::PathBuf;

use bytes::Bytes;
use tracing::debug;

use tile_common::{TileAddress, TileError, TileResult};

/// File extension of cached tiles.
pub const TILE_EXT: &str = "png";

/// Cache key mapping a tile address to its on-disk path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl CacheKey {
    pub fn from_address(address: &TileAddress) -> Self {
        Self {
            z: address.z,
            x: address.x,
            y: address.y,
        }
    }

    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(format!("{}/{}/{}.{}", self.z, self.x, self.y, TILE_EXT))
    }
}

/// A simple path-keyed blob store rooted at the request's cache directory.
pub struct DiskTileCache {
    root: PathBuf,
}

impl DiskTileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Read a cached tile. Any read failure is treated as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Some(Bytes::from(data)),
            Err(_) => None,
        }
    }

    /// Store a tile, creating intermediate directories as needed.
    pub fn put(&self, key: &CacheKey, data: &[u8]) -> TileResult<()> {
        let path = self.path_for(key);
        let parent = path
            .parent()
            .ok_or_else(|| TileError::CacheError("cache path has no parent".into()))?;
        fs::create_dir_all(parent)
            .map_err(|e| TileError::CacheError(format!("create {}: {}", parent.display(), e)))?;

        let tmp = path.with_extension(format!("{}.tmp{}", TILE_EXT, std::process::id()));
        fs::write(&tmp, data)
            .map_err(|e| TileError::CacheError(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            TileError::CacheError(format!("rename to {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), bytes = data.len(), "cached tile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_path_layout() {
        let key = CacheKey::from_address(&TileAddress::new(5, 10, 3));
        assert_eq!(key.relative_path(), PathBuf::from("5/10/3.png"));
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());
        let key = CacheKey { z: 2, x: 1, y: 3 };

        assert!(cache.get(&key).is_none());
        cache.put(&key, b"tile-bytes").unwrap();
        assert_eq!(cache.get(&key).unwrap().as_ref(), b"tile-bytes");
        assert!(dir.path().join("2/1/3.png").exists());
    }

    #[test]
    fn test_overwrite_wins() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());
        let key = CacheKey { z: 0, x: 0, y: 0 };
        cache.put(&key, b"first").unwrap();
        cache.put(&key, b"second").unwrap();
        assert_eq!(cache.get(&key).unwrap().as_ref(), b"second");
    }

    #[test]
    fn test_no_leftover_temp_files() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());
        cache.put(&CacheKey { z: 1, x: 0, y: 0 }, b"x").unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path().join("1/0"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["0.png"]);
    }
}
