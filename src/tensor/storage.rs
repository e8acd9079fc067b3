use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Shared byte buffer behind a tensor
pub type StorageHandle = Arc<RwLock<Vec<u8>>>;

/// Whether a tensor owns its storage or borrows another tensor's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    View,
}

/// Tensor storage: exactly one owner holds the strong reference, views hold
/// weak ones and never keep the bytes alive.
///
/// A view must not outlive its owner. Violations are detected on the next
/// access through the view and reported as a contract violation.
#[derive(Debug)]
pub enum TensorStorage {
    Owned(StorageHandle),
    View(Weak<RwLock<Vec<u8>>>),
}

impl TensorStorage {
    pub fn zeroed(size: usize) -> Self {
        Self::from_vec(vec![0u8; size])
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        TensorStorage::Owned(Arc::new(RwLock::new(data)))
    }

    /// Non-owning reference to the same bytes.
    pub fn view(&self) -> Self {
        match self {
            TensorStorage::Owned(data) => TensorStorage::View(Arc::downgrade(data)),
            TensorStorage::View(data) => TensorStorage::View(data.clone()),
        }
    }

    pub fn ownership(&self) -> Ownership {
        match self {
            TensorStorage::Owned(_) => Ownership::Owned,
            TensorStorage::View(_) => Ownership::View,
        }
    }

    /// False once a view's owner has released the storage.
    pub fn is_alive(&self) -> bool {
        match self {
            TensorStorage::Owned(_) => true,
            TensorStorage::View(data) => data.strong_count() > 0,
        }
    }

    /// Strong handle for the duration of one operation.
    pub fn handle(&self) -> StorageHandle {
        match self {
            TensorStorage::Owned(data) => data.clone(),
            TensorStorage::View(data) => data.upgrade().unwrap_or_else(|| {
                panic!("contract violation: tensor view accessed after its owner released the storage")
            }),
        }
    }

    /// Hand the bytes back to the caller. Views have nothing to hand back.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            TensorStorage::Owned(data) => Some(match Arc::try_unwrap(data) {
                Ok(lock) => lock.into_inner(),
                // A handle is still in flight elsewhere; the caller gets a copy
                Err(shared) => shared.read_recursive().clone(),
            }),
            TensorStorage::View(_) => None,
        }
    }

    pub fn size(&self) -> usize {
        self.handle().read_recursive().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_storage() {
        let storage = TensorStorage::zeroed(16);
        assert_eq!(storage.size(), 16);
        assert_eq!(storage.ownership(), Ownership::Owned);
        assert!(storage.handle().read().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_view_shares_bytes() {
        let owner = TensorStorage::from_vec(vec![1, 2, 3]);
        let view = owner.view();
        assert_eq!(view.ownership(), Ownership::View);

        owner.handle().write()[0] = 9;
        assert_eq!(view.handle().read()[0], 9);
    }

    #[test]
    fn test_size_while_read_guard_held() {
        let owner = TensorStorage::from_vec(vec![1, 2, 3, 4]);
        let handle = owner.handle();
        let _guard = handle.read_recursive();
        assert_eq!(owner.view().size(), 4);
    }

    #[test]
    fn test_view_release_keeps_owner() {
        let owner = TensorStorage::from_vec(vec![4, 5]);
        let view = owner.view();
        assert_eq!(view.into_bytes(), None);
        assert_eq!(owner.into_bytes(), Some(vec![4, 5]));
    }

    #[test]
    fn test_view_detects_released_owner() {
        let owner = TensorStorage::from_vec(vec![1]);
        let view = owner.view();
        drop(owner);
        assert!(!view.is_alive());
    }

    #[test]
    #[should_panic(expected = "released the storage")]
    fn test_view_access_after_release_panics() {
        let owner = TensorStorage::from_vec(vec![1]);
        let view = owner.view();
        drop(owner);
        let _ = view.handle();
    }
}
