use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::buffer::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::error::{QuillHashError, QuillHashResult};

static EMPTY_PAGE: [u8; PAGE_SIZE] = [0; PAGE_SIZE];

/// File-backed page store. Page `n` lives at byte offset `n * PAGE_SIZE`;
/// page 0 is reserved so that `INVALID_PAGE_ID` never names real data.
#[derive(Debug)]
pub struct DiskManager {
    next_page_id: AtomicU32,
    db_file: Mutex<File>,
    free_pages: Mutex<Vec<PageId>>,
}

impl DiskManager {
    pub fn try_new(db_path: impl AsRef<Path>) -> QuillHashResult<Self> {
        let db_path = db_path.as_ref();
        let mut db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(db_path)?;

        let file_len = db_file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            warn!(
                "database file {:?} has a trailing partial page ({} bytes)",
                db_path,
                file_len % PAGE_SIZE as u64
            );
        }
        let mut next_page_id = (file_len / PAGE_SIZE as u64) as PageId;
        if next_page_id == 0 {
            db_file.write_all(&EMPTY_PAGE)?;
            db_file.flush()?;
            next_page_id = 1;
        }
        debug!(
            "Initialized disk_manager for {:?}, next_page_id: {}",
            db_path, next_page_id
        );

        Ok(Self {
            next_page_id: AtomicU32::new(next_page_id),
            db_file: Mutex::new(db_file),
            free_pages: Mutex::new(Vec::new()),
        })
    }

    pub fn allocate_page(&self) -> QuillHashResult<PageId> {
        if let Some(page_id) = self.free_pages.lock().pop() {
            debug!("reusing deallocated page {}", page_id);
            return Ok(page_id);
        }
        let page_id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        self.write_page(page_id, &EMPTY_PAGE)?;
        Ok(page_id)
    }

    pub fn deallocate_page(&self, page_id: PageId) -> QuillHashResult<()> {
        Self::check_page_id(page_id)?;
        self.write_page(page_id, &EMPTY_PAGE)?;
        let mut free_pages = self.free_pages.lock();
        if !free_pages.contains(&page_id) {
            free_pages.push(page_id);
        }
        Ok(())
    }

    pub fn read_page(&self, page_id: PageId) -> QuillHashResult<BytesMut> {
        Self::check_page_id(page_id)?;
        let mut buf = BytesMut::zeroed(PAGE_SIZE);
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                // Past EOF: the rest of the page stays zeroed.
                break;
            }
            filled += n;
        }
        Ok(buf)
    }

    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> QuillHashResult<()> {
        Self::check_page_id(page_id)?;
        if data.len() != PAGE_SIZE {
            return Err(QuillHashError::Storage(format!(
                "page data size {} is not equal to PAGE_SIZE {}",
                data.len(),
                PAGE_SIZE
            )));
        }
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    pub fn write_page_bytes(&self, page_id: PageId, data: Bytes) -> QuillHashResult<()> {
        self.write_page(page_id, data.as_ref())
    }

    pub fn sync(&self) -> QuillHashResult<()> {
        self.db_file.lock().sync_all()?;
        Ok(())
    }

    pub fn free_page_count(&self) -> usize {
        self.free_pages.lock().len()
    }

    fn offset_of(page_id: PageId) -> u64 {
        page_id as u64 * PAGE_SIZE as u64
    }

    fn check_page_id(page_id: PageId) -> QuillHashResult<()> {
        if page_id == INVALID_PAGE_ID {
            return Err(QuillHashError::Storage(
                "page id 0 is reserved and cannot be accessed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn allocate_starts_after_reserved_page() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();

        assert_eq!(disk_manager.allocate_page().unwrap(), 1);
        assert_eq!(disk_manager.allocate_page().unwrap(), 2);
    }

    #[test]
    fn write_then_read_page() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();
        let page_id = disk_manager.allocate_page().unwrap();

        let mut data = vec![0u8; PAGE_SIZE];
        data[0] = 1;
        data[PAGE_SIZE - 1] = 9;
        disk_manager.write_page(page_id, &data).unwrap();

        let read_back = disk_manager.read_page(page_id).unwrap();
        assert_eq!(read_back.as_ref(), data.as_slice());
    }

    #[test]
    fn read_past_end_of_file_is_zeroed() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();

        let data = disk_manager.read_page(42).unwrap();
        assert!(data.iter().all(|b| *b == 0));
    }

    #[test]
    fn deallocated_pages_are_reused() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();
        let first = disk_manager.allocate_page().unwrap();
        let second = disk_manager.allocate_page().unwrap();

        disk_manager.write_page(first, &[7u8; PAGE_SIZE]).unwrap();
        disk_manager.deallocate_page(first).unwrap();
        assert_eq!(disk_manager.free_page_count(), 1);

        let reused = disk_manager.allocate_page().unwrap();
        assert_eq!(reused, first);
        assert_ne!(reused, second);
        assert!(disk_manager.read_page(reused).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn reopen_continues_page_ids() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        {
            let disk_manager = DiskManager::try_new(&path).unwrap();
            disk_manager.allocate_page().unwrap();
            disk_manager.allocate_page().unwrap();
        }
        let disk_manager = DiskManager::try_new(&path).unwrap();
        assert_eq!(disk_manager.allocate_page().unwrap(), 3);
    }

    #[test]
    fn reserved_page_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let disk_manager = DiskManager::try_new(temp_dir.path().join("test.db")).unwrap();

        assert!(disk_manager.read_page(INVALID_PAGE_ID).is_err());
        assert!(disk_manager
            .write_page(INVALID_PAGE_ID, &[0u8; PAGE_SIZE])
            .is_err());
        assert!(disk_manager.write_page(1, &[0u8; 16]).is_err());
    }
}
