use myrtio_ota::boot::rtc::RtcMemory;

const RTC_SCRATCH_SIZE: usize = 32;

/// Kept across software and watchdog resets, garbage after power on.
#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut RTC_SCRATCH: [u8; RTC_SCRATCH_SIZE] = [0; RTC_SCRATCH_SIZE];

#[derive(Debug)]
pub(crate) struct RtcOutOfRange;

/// Byte access to the persistent RTC fast memory area.
pub(crate) struct RtcScratch;

fn check_range(offset: usize, len: usize) -> Result<(), RtcOutOfRange> {
    match offset.checked_add(len) {
        Some(end) if end <= RTC_SCRATCH_SIZE => Ok(()),
        _ => Err(RtcOutOfRange),
    }
}

impl RtcMemory for RtcScratch {
    type Error = RtcOutOfRange;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        check_range(offset, buf.len())?;
        critical_section::with(|_| {
            let base = (&raw const RTC_SCRATCH).cast::<u8>();
            for (index, byte) in buf.iter_mut().enumerate() {
                // SAFETY: range checked above, access serialized by the critical section
                *byte = unsafe { base.add(offset + index).read_volatile() };
            }
        });
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        check_range(offset, data.len())?;
        critical_section::with(|_| {
            let base = (&raw mut RTC_SCRATCH).cast::<u8>();
            for (index, byte) in data.iter().enumerate() {
                // SAFETY: range checked above, access serialized by the critical section
                unsafe { base.add(offset + index).write_volatile(*byte) };
            }
        });
        Ok(())
    }
}
