//! Progress reporting for long programs

/// Counters for one program call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramStats {
    /// Page windows programmed
    pub windows: usize,
    /// Page-program transactions issued for whole data
    pub transfers: usize,
    /// Separate padded tail transfers (0 or 1)
    pub tail_transfers: usize,
    /// Bytes written to flash, padding included
    pub bytes_programmed: usize,
}

/// Progress callback for [`FlashController::program_page_with_progress`]
///
/// [`FlashController::program_page_with_progress`]: super::FlashController::program_page_with_progress
pub trait ProgramProgress {
    /// Called before the first window with the number of bytes to program
    fn programming(&mut self, total_bytes: usize);

    /// Called after each window with the running byte count
    fn programmed(&mut self, bytes_done: usize);

    /// Called when the operation is complete
    fn complete(&mut self, stats: &ProgramStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ProgramProgress for NoProgress {
    fn programming(&mut self, _total_bytes: usize) {}
    fn programmed(&mut self, _bytes_done: usize) {}
    fn complete(&mut self, _stats: &ProgramStats) {}
}
