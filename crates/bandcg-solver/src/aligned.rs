//! SIMD-aligned numeric buffers.
//!
//! [`AlignedVec`] owns a fixed-length, zero-initialised run of `f64` values
//! whose first element sits on an [`ALIGNMENT`]-byte boundary, so that every
//! block of [`LANES`](crate::kernels::LANES) values starting at a multiple of
//! the lane width maps onto one vector register. The buffer is released when
//! the value is dropped, on every exit path of a solve.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use serde::{Serialize, Serializer};

use crate::kernels::LANES;

/// Byte alignment of every [`AlignedVec`]: one full lane group of `f64`.
pub const ALIGNMENT: usize = LANES * std::mem::size_of::<f64>();

/// Zero-sized-allocation stand-in with the buffer alignment, used only to
/// produce a well-aligned dangling pointer for empty buffers.
#[repr(C, align(32))]
struct LaneBlock([f64; LANES]);

const _: () = assert!(std::mem::align_of::<LaneBlock>() == ALIGNMENT);

/// Fixed-length `f64` buffer aligned to [`ALIGNMENT`] bytes.
///
/// Dereferences to `[f64]`, so every slice method and every kernel in
/// [`crate::kernels`] works on it directly.
///
/// # Example
///
/// ```
/// use bandcg_solver::aligned::{AlignedVec, ALIGNMENT};
///
/// let mut v = AlignedVec::zeroed(10);
/// v[3] = 1.5;
/// assert_eq!(v.len(), 10);
/// assert_eq!(v.as_ptr() as usize % ALIGNMENT, 0);
/// assert_eq!(v.iter().sum::<f64>(), 1.5);
/// ```
pub struct AlignedVec {
    ptr: NonNull<f64>,
    len: usize,
}

impl AlignedVec {
    /// Allocate `len` zeroed values.
    ///
    /// Allocation failure aborts through [`handle_alloc_error`]; the workload
    /// is a single in-memory pass with nothing to degrade to.
    ///
    /// # Panics
    ///
    /// Panics if `len * size_of::<f64>()` overflows `isize`.
    pub fn zeroed(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::<LaneBlock>::dangling().cast(),
                len: 0,
            };
        }

        let layout = Self::layout(len);
        // SAFETY: `layout` has non-zero size because `len > 0`.
        let raw = unsafe { alloc_zeroed(layout) } as *mut f64;
        let ptr = match NonNull::new(raw) {
            Some(p) => p,
            None => handle_alloc_error(layout),
        };

        Self { ptr, len }
    }

    /// Allocate a buffer holding `value` in every slot.
    pub fn filled(len: usize, value: f64) -> Self {
        let mut v = Self::zeroed(len);
        v.fill(value);
        v
    }

    /// Allocate a buffer holding a copy of `values`.
    pub fn from_slice(values: &[f64]) -> Self {
        let mut v = Self::zeroed(values.len());
        v.copy_from_slice(values);
        v
    }

    /// Number of values in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the buffer holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the buffer as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        // SAFETY: `ptr` is valid for `len` initialised values (zeroed at
        // allocation) or dangling-but-aligned with `len == 0`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Borrow the buffer as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        // SAFETY: as in `as_slice`; `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Copy the contents into an ordinary `Vec`.
    pub fn to_vec(&self) -> Vec<f64> {
        self.as_slice().to_vec()
    }

    fn layout(len: usize) -> Layout {
        let bytes = len
            .checked_mul(std::mem::size_of::<f64>())
            .expect("AlignedVec: len * size_of::<f64>() overflowed usize");
        Layout::from_size_align(bytes, ALIGNMENT)
            .expect("AlignedVec: allocation size exceeds isize::MAX")
    }
}

impl Drop for AlignedVec {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        // SAFETY: non-empty buffers were allocated in `zeroed` with exactly
        // this layout and are freed only here.
        unsafe { dealloc(self.ptr.as_ptr() as *mut u8, Self::layout(self.len)) }
    }
}

impl Deref for AlignedVec {
    type Target = [f64];

    #[inline]
    fn deref(&self) -> &[f64] {
        self.as_slice()
    }
}

impl DerefMut for AlignedVec {
    #[inline]
    fn deref_mut(&mut self) -> &mut [f64] {
        self.as_mut_slice()
    }
}

impl Clone for AlignedVec {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl PartialEq for AlignedVec {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl fmt::Debug for AlignedVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl From<&[f64]> for AlignedVec {
    fn from(values: &[f64]) -> Self {
        Self::from_slice(values)
    }
}

impl From<Vec<f64>> for AlignedVec {
    fn from(values: Vec<f64>) -> Self {
        Self::from_slice(&values)
    }
}

impl Serialize for AlignedVec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.as_slice())
    }
}

// SAFETY: `AlignedVec` exclusively owns its allocation, like `Vec<f64>`.
// Shared references only hand out `&[f64]`, which is `Sync`.
unsafe impl Send for AlignedVec {}
unsafe impl Sync for AlignedVec {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_holds_for_many_lengths() {
        for len in [1, 2, 3, 4, 5, 7, 8, 17, 1023] {
            let v = AlignedVec::zeroed(len);
            assert_eq!(v.as_ptr() as usize % ALIGNMENT, 0, "len={len}");
            assert!(v.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn empty_buffer_is_aligned_and_usable() {
        let v = AlignedVec::zeroed(0);
        assert!(v.is_empty());
        assert_eq!(v.as_ptr() as usize % ALIGNMENT, 0);
        assert_eq!(v.iter().count(), 0);
        let c = v.clone();
        assert_eq!(c, v);
    }

    #[test]
    fn clone_is_deep() {
        let mut a = AlignedVec::from_slice(&[1.0, 2.0, 3.0]);
        let b = a.clone();
        a[0] = 9.0;
        assert_eq!(b.as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(a.to_vec(), vec![9.0, 2.0, 3.0]);
    }

    #[test]
    fn filled_and_serialize() {
        let v = AlignedVec::filled(3, 0.5);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[0.5,0.5,0.5]");
    }
}
