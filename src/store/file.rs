//! File-backed [`AuthTicketCache`] so application tickets survive process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::AppAuthTicket,
	store::{AuthTicketCache, CacheError, CacheFuture, CacheKey},
};

/// Persists cached tickets to a JSON file after each write.
///
/// The file holds bearer credentials; place it somewhere only the service user can read.
#[derive(Clone, Debug)]
pub struct FileTicketCache {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<CacheKey, AppAuthTicket>>>,
}
impl FileTicketCache {
	/// Opens (or creates) a cache at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the backing file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<CacheKey, AppAuthTicket>, CacheError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| CacheError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(HashMap::new());
		}

		let entries: Vec<(CacheKey, AppAuthTicket)> =
			serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), CacheError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| CacheError::Backend {
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<CacheKey, AppAuthTicket>) -> Result<(), CacheError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut snapshot: Vec<_> = contents.iter().collect();

		snapshot.sort_by(|a, b| a.0.cmp(b.0));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| CacheError::Serialization {
				message: format!("Failed to serialize cache snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| CacheError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| CacheError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| CacheError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| CacheError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl AuthTicketCache for FileTicketCache {
	fn get_auth_ticket<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<AppAuthTicket>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn set_auth_ticket<'a>(
		&'a self,
		key: &'a CacheKey,
		ticket: AppAuthTicket,
	) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.insert(key.clone(), ticket);
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}
}
