//! Page-bounded write windows

use core::ops::Range;

use crate::error::Result;
use crate::qspi::{check_range, PAGE_SIZE};

/// Splits a write range into windows that never cross a page boundary
///
/// The first window ends at the next page boundary, interior windows are
/// whole pages and the last one ends at the end of the range. An empty
/// range yields nothing.
///
/// ```ignore
/// let sizes: Vec<u32> = PageWindows::new(0xF0, 300)?.map(|w| w.len() as u32).collect();
/// assert_eq!(sizes, [16, 256, 28]);
/// ```
#[derive(Debug, Clone)]
pub struct PageWindows {
    next: u32,
    end: u32,
}

impl PageWindows {
    /// Windows covering `[base, base + len)`
    ///
    /// Fails with `AddressOutOfBounds` if the range leaves the 24-bit
    /// address space.
    pub fn new(base: u32, len: usize) -> Result<Self> {
        check_range(base, len)?;
        Ok(Self {
            next: base,
            end: base + len as u32,
        })
    }
}

impl Iterator for PageWindows {
    type Item = Range<u32>;

    fn next(&mut self) -> Option<Range<u32>> {
        if self.next >= self.end {
            return None;
        }
        let page_end = (self.next / PAGE_SIZE + 1) * PAGE_SIZE;
        let stop = page_end.min(self.end);
        let window = self.next..stop;
        self.next = stop;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.next >= self.end {
            return (0, Some(0));
        }
        let first_page = self.next / PAGE_SIZE;
        let last_page = (self.end - 1) / PAGE_SIZE;
        let n = (last_page - first_page + 1) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for PageWindows {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::qspi::ADDRESS_SPACE;
    use alloc::vec::Vec;

    fn sizes(base: u32, len: usize) -> Vec<usize> {
        PageWindows::new(base, len).unwrap().map(|w| w.len()).collect()
    }

    #[test]
    fn test_unaligned_start() {
        let windows: Vec<_> = PageWindows::new(0xF0, 300).unwrap().collect();
        assert_eq!(windows, [0xF0..0x100, 0x100..0x200, 0x200..0x21C]);
        assert_eq!(sizes(0xF0, 300), [16, 256, 28]);
    }

    #[test]
    fn test_aligned_and_short() {
        assert_eq!(sizes(0x1000, 512), [256, 256]);
        assert_eq!(sizes(0x1010, 16), [16]);
        assert_eq!(sizes(0x10FF, 2), [1, 1]);
        assert!(sizes(0x1000, 0).is_empty());
    }

    #[test]
    fn test_partition_properties() {
        let cases = [
            (0u32, 1usize),
            (0xFF, 258),
            (0x1234, 4096),
            (ADDRESS_SPACE - 300, 300),
            (ADDRESS_SPACE - 1, 1),
        ];
        for (base, len) in cases {
            let windows: Vec<_> = PageWindows::new(base, len).unwrap().collect();
            assert_eq!(windows.len(), PageWindows::new(base, len).unwrap().len());
            assert_eq!(windows.first().unwrap().start, base);
            assert_eq!(windows.last().unwrap().end as u64, base as u64 + len as u64);
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
            for (i, w) in windows.iter().enumerate() {
                assert_eq!(w.start / PAGE_SIZE, (w.end - 1) / PAGE_SIZE);
                if i != 0 && i != windows.len() - 1 {
                    assert_eq!(w.len(), PAGE_SIZE as usize);
                }
            }
        }
    }

    #[test]
    fn test_rejects_overflow() {
        assert_eq!(
            PageWindows::new(ADDRESS_SPACE - 16, 17).unwrap_err(),
            Error::AddressOutOfBounds
        );
        assert_eq!(
            PageWindows::new(0x100, usize::MAX).unwrap_err(),
            Error::AddressOutOfBounds
        );
    }
}
