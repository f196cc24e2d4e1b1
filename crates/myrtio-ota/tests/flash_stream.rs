mod common;

use common::FakeFlash;
use embedded_storage::nor_flash::NorFlash;
use myrtio_ota::OtaError;
use myrtio_ota::flash::{EraseLedger, FlashWriteStream};

const START: u32 = 0x2000;
const SECTOR: u32 = FakeFlash::ERASE_SIZE as u32;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

fn stream_chunks(flash: &mut FakeFlash, data: &[u8], sizes: &[usize]) -> FlashWriteStream {
    let mut stream = FlashWriteStream::init(START, SECTOR);
    let mut rest = data;
    for size in sizes.iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let take = (*size).min(rest.len());
        stream.write(flash, &rest[..take]).unwrap();
        rest = &rest[take..];
    }
    stream.finalize(flash).unwrap();
    stream
}

// ---------------------------------------------------------------------------
// Alignment and contents
// ---------------------------------------------------------------------------

#[test]
fn test_contents_match_input_for_odd_chunking() {
    for len in [1, 3, 4, 5, 8, 13, 4095, 4097, 9001] {
        for sizes in [&[1][..], &[3], &[5, 2, 7], &[4096], &[1000, 1]] {
            let mut flash = FakeFlash::new();
            let data = pattern(len);
            let stream = stream_chunks(&mut flash, &data, sizes);

            let words = len.div_ceil(4);
            assert_eq!(stream.written() as usize, words * 4, "len {len} sizes {sizes:?}");
            assert_eq!(flash.bytes(START, len), data.as_slice());
            assert!(
                flash.bytes(START + len as u32, words * 4 - len).iter().all(|b| *b == 0xFF),
                "padding must be 0xFF"
            );
            assert!(flash.writes.iter().all(|(offset, n)| offset % 4 == 0 && n % 4 == 0));
        }
    }
}

#[test]
fn test_carry_is_kept_between_writes() {
    let mut flash = FakeFlash::new();
    let mut stream = FlashWriteStream::init(START, SECTOR);

    stream.write(&mut flash, b"AB").unwrap();
    assert!(flash.writes.is_empty());
    assert_eq!(stream.pending(), b"AB");

    stream.write(&mut flash, b"CDEFGH").unwrap();
    assert_eq!(flash.writes, vec![(START, 8)]);
    assert_eq!(stream.pending(), b"");
    assert_eq!(stream.address(), START + 8);

    stream.write(&mut flash, b"I").unwrap();
    assert_eq!(stream.pending(), b"I");
}

#[test]
fn test_carry_and_large_chunk_are_staged() {
    let mut flash = FakeFlash::new();
    let mut stream = FlashWriteStream::init(START, SECTOR);
    let data = pattern(3000);

    stream.write(&mut flash, &data[..1]).unwrap();
    stream.write(&mut flash, &data[1..]).unwrap();
    stream.finalize(&mut flash).unwrap();

    assert_eq!(flash.writes, vec![(START, 1024), (START + 1024, 1976)]);
    assert_eq!(flash.bytes(START, 3000), data.as_slice());
}

#[test]
fn test_finalize_once() {
    let mut flash = FakeFlash::new();
    let mut stream = FlashWriteStream::init(START, SECTOR);
    stream.write(&mut flash, b"ABCDEF").unwrap();

    stream.finalize(&mut flash).unwrap();
    stream.finalize(&mut flash).unwrap();

    assert_eq!(flash.writes.len(), 2);
    assert_eq!(flash.bytes(START, 8), b"ABCDEF\xFF\xFF");
}

#[test]
fn test_finalize_without_carry_writes_nothing() {
    let mut flash = FakeFlash::new();
    let mut stream = FlashWriteStream::init(START, SECTOR);
    stream.write(&mut flash, b"ABCD").unwrap();
    stream.finalize(&mut flash).unwrap();
    assert_eq!(flash.writes, vec![(START, 4)]);
}

// ---------------------------------------------------------------------------
// Erasing
// ---------------------------------------------------------------------------

#[test]
fn test_each_sector_erased_once_before_first_write() {
    let mut flash = FakeFlash::new();
    let data = pattern(3 * SECTOR as usize + 10);
    stream_chunks(&mut flash, &data, &[333]);

    let first = START / SECTOR;
    for sector in first..first + 4 {
        assert_eq!(flash.erase_count(sector), 1, "sector {sector}");
    }
    assert_eq!(flash.erases.len(), 4);
    let erase_starts: Vec<u32> = flash.erases.iter().map(|(from, _)| *from).collect();
    assert!(erase_starts.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_write_spanning_sector_boundary_erases_both() {
    let mut flash = FakeFlash::new();
    // Start two words before the end of a sector
    let start = START + SECTOR - 8;
    let mut stream = FlashWriteStream::init(start, SECTOR);
    stream.write(&mut flash, &[0x11; 16]).unwrap();

    assert_eq!(flash.erases, vec![(START, START + SECTOR), (START + SECTOR, START + 2 * SECTOR)]);
    assert_eq!(stream.ledger().last_erased(), Some(START / SECTOR + 1));
}

#[test]
fn test_stale_contents_are_erased() {
    let mut flash = FakeFlash::new();
    flash.memory[START as usize..START as usize + 8].fill(0x00);
    stream_chunks(&mut flash, b"ABCDEFGH", &[8]);
    assert_eq!(flash.bytes(START, 8), b"ABCDEFGH");
}

#[test]
fn test_ledger_standalone() {
    let mut flash = FakeFlash::new();
    let mut ledger = EraseLedger::new(2, SECTOR);

    ledger.erase_through(&mut flash, 3).unwrap();
    ledger.erase_through(&mut flash, 2).unwrap();
    ledger.erase_through(&mut flash, 3).unwrap();

    assert_eq!(flash.erases.len(), 2);
    assert_eq!(ledger.last_erased(), Some(3));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_write_failure_keeps_earlier_chunks() {
    let mut flash = FakeFlash::new();
    flash.fail_write_at = Some(START + 4);
    let mut stream = FlashWriteStream::init(START, SECTOR);

    stream.write(&mut flash, b"ABCD").unwrap();
    assert_eq!(stream.write(&mut flash, b"EFGH"), Err(OtaError::FlashWrite));
    assert_eq!(flash.bytes(START, 4), b"ABCD");
    assert_eq!(stream.address(), START + 4);
}

#[test]
fn test_erase_failure() {
    let mut flash = FakeFlash::new();
    flash.fail_erase = true;
    let mut stream = FlashWriteStream::init(START, SECTOR);

    assert_eq!(stream.write(&mut flash, b"ABCD"), Err(OtaError::FlashErase));
    assert!(flash.writes.is_empty());
    assert_eq!(stream.ledger().last_erased(), None);
}
