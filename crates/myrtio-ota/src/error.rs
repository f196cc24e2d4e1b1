/// Failure causes of the update core.
///
/// The update callback only reports a boolean, the cause of the last failed
/// session is kept by [`crate::OtaEngine::last_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// A buffer or transport handle could not be obtained
    AllocationFailure,
    /// Another update session is already in progress
    ConcurrentUpdateRejected,
    /// The update host could not be resolved
    ResolutionFailure,
    /// The transport could not connect or send the request
    ConnectFailure,
    /// The connect or receive timer expired
    Timeout,
    /// Malformed or unexpected HTTP response
    ProtocolError,
    /// Announced image does not fit the target slot
    ImageTooLarge,
    /// The connection closed before the whole image arrived
    ShortTransfer,
    /// Programming flash failed
    FlashWrite,
    /// Erasing a flash sector failed
    FlashErase,
    /// Reading flash failed
    FlashRead,
    /// Slot index is out of the configured slot range
    SlotIndexInvalid,
    /// Stored RTC record failed its checksum or magic check
    ChecksumMismatch,
    /// RTC memory could not be read or written
    MemoryAccess,
}
