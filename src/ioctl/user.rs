/*!
 * Caller Memory
 *
 * The engine never dereferences caller addresses directly: every payload
 * crosses the boundary through `UserSpace`, which copies bytes in or out and
 * reports a transfer fault when any byte of the requested range is not
 * mapped.
 */

use super::request::UserPtr;
use crate::core::errors::{DictError, DictResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Copy primitives between a caller address space and engine memory
pub trait UserSpace: Send + Sync {
    /// Fill `dst` with `dst.len()` bytes read from `src`
    fn copy_from_user(&self, src: UserPtr, dst: &mut [u8]) -> DictResult<()>;

    /// Write all of `src` starting at `dst`
    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> DictResult<()>;
}

const PAGE_SIZE: u64 = 4096;

/// First address handed out; page 0 stays unmapped so null always faults
const BASE_ADDRESS: u64 = 0x1000_0000;

/// Simulated caller address space made of independently mapped regions
///
/// Regions are separated by an unmapped guard page, so a copy that runs past
/// the end of one region faults instead of spilling into the next.
pub struct AddressSpace {
    regions: RwLock<BTreeMap<u64, Vec<u8>>>,
    next_addr: AtomicU64,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(BTreeMap::new()),
            next_addr: AtomicU64::new(BASE_ADDRESS),
        }
    }

    /// Map a copy of `bytes` and return its address
    pub fn map(&self, bytes: &[u8]) -> UserPtr {
        let addr = self.reserve(bytes.len());
        self.regions.write().insert(addr, bytes.to_vec());
        UserPtr::new(addr)
    }

    /// Map `len` zeroed bytes (a receive buffer)
    pub fn alloc(&self, len: usize) -> UserPtr {
        let addr = self.reserve(len);
        self.regions.write().insert(addr, vec![0; len]);
        UserPtr::new(addr)
    }

    /// Read `len` bytes back out of the space
    pub fn read(&self, ptr: UserPtr, len: usize) -> DictResult<Vec<u8>> {
        let mut out = vec![0; len];
        self.copy_from_user(ptr, &mut out)?;
        Ok(out)
    }

    /// Unmap the region starting at `ptr`; `false` if nothing starts there
    pub fn unmap(&self, ptr: UserPtr) -> bool {
        self.regions.write().remove(&ptr.addr()).is_some()
    }

    /// Number of currently mapped regions
    pub fn mapped_regions(&self) -> usize {
        self.regions.read().len()
    }

    fn reserve(&self, len: usize) -> u64 {
        let pages = (len as u64).div_ceil(PAGE_SIZE).max(1);
        self.next_addr
            .fetch_add((pages + 1) * PAGE_SIZE, Ordering::Relaxed)
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate `[addr, addr + len)` inside a single region: (region base, offset)
fn locate(regions: &BTreeMap<u64, Vec<u8>>, ptr: UserPtr, len: usize) -> DictResult<(u64, usize)> {
    let addr = ptr.addr();
    let fault = || DictError::transfer_fault(format!("{} bytes at {:?} not mapped", len, ptr));

    let (&base, region) = regions.range(..=addr).next_back().ok_or_else(fault)?;
    let offset = usize::try_from(addr - base).map_err(|_| fault())?;
    match offset.checked_add(len) {
        Some(end) if end <= region.len() => Ok((base, offset)),
        _ => Err(fault()),
    }
}

impl UserSpace for AddressSpace {
    fn copy_from_user(&self, src: UserPtr, dst: &mut [u8]) -> DictResult<()> {
        let regions = self.regions.read();
        let (base, offset) = locate(&regions, src, dst.len())?;
        let region = &regions[&base];
        dst.copy_from_slice(&region[offset..offset + dst.len()]);
        Ok(())
    }

    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> DictResult<()> {
        let mut regions = self.regions.write();
        let (base, offset) = locate(&regions, dst, src.len())?;
        if let Some(region) = regions.get_mut(&base) {
            region[offset..offset + src.len()].copy_from_slice(src);
        }
        Ok(())
    }
}
