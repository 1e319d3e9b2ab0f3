use super::*;
use nandflash_core::chip::ChipDescriptor;
use nandflash_core::config::DriverOptions;
use nandflash_core::error::Error;
use nandflash_core::flash::{
    BlockDevice, BlockGeometry, ControlCommand, ControlResponse, MergeStats, NandContext,
    NandDevice, OpenFlags,
};
use nandflash_core::protocol;

fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
        .collect()
}

fn device_for(chip: ChipDescriptor) -> NandDevice<SimController> {
    let ctrl = SimController::from_descriptor(&chip);
    let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
    let mut dev = NandDevice::new(ctrl, ctx);
    dev.init().unwrap();
    dev.open(OpenFlags::RDWR).unwrap();
    dev
}

fn small_device() -> NandDevice<SimController> {
    device_for(SimConfig::small_chip())
}

const PS: usize = 2048;
const SPARE: usize = 64;

fn read_data(dev: &mut NandDevice<SimController>, block: u32, page: u32) -> Vec<u8> {
    let mut buf = vec![0u8; dev.context().page_size()];
    dev.read_page(PageAddr::new(block, page), Some(&mut buf), None)
        .unwrap();
    buf
}

fn marker(dev: &mut NandDevice<SimController>, block: u32, page: u32) -> u8 {
    let mut oob = vec![0u8; dev.context().spare_size()];
    dev.read_page(PageAddr::new(block, page), None, Some(&mut oob))
        .unwrap();
    oob[0]
}

// ---------------------------------------------------------------------------
// Page primitives
// ---------------------------------------------------------------------------

#[test]
fn test_init_programs_controller() {
    let dev = small_device();
    let ctrl = dev.controller();
    assert_eq!(ctrl.config_register(), dev.context().cfg_image());
    assert_eq!(ctrl.control_register(), 0);
    assert_eq!(ctrl.stats().resets, 1);
    assert_eq!(dev.context().selected(), Some(0));
}

#[test]
fn test_init_rejects_foreign_id() {
    let chip = SimConfig::small_chip();
    let mut config = SimConfig::from_descriptor(&chip);
    config.id = [0xec, 0xd3, 0x51, 0x95, 0x58, 0x00];
    let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
    let mut dev = NandDevice::new(SimController::new(config), ctx);

    assert_eq!(dev.init(), Err(Error::UnrecognizedDevice));
    // Reset once at init and once after the mismatch
    assert_eq!(dev.controller().stats().resets, 2);
}

#[test]
fn test_init_times_out_when_never_ready() {
    let chip = SimConfig::small_chip();
    let mut ctrl = SimController::from_descriptor(&chip);
    ctrl.inject(Fault::NeverReady(0));
    let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
    let mut dev = NandDevice::new(ctrl, ctx);
    assert_eq!(dev.init(), Err(Error::InitTimeout));
}

#[test]
fn test_reset_times_out_when_stuck_busy() {
    let chip = SimConfig::small_chip();
    let mut ctrl = SimController::from_descriptor(&chip);
    ctrl.inject(Fault::StuckBusy);
    let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
    let mut dev = NandDevice::new(ctrl, ctx);
    assert_eq!(dev.init(), Err(Error::InitTimeout));
}

#[test]
fn test_read_id() {
    let mut dev = device_for(ChipDescriptor::hynix_h27ubg8t2a());
    assert_eq!(dev.read_id().unwrap(), [0xad, 0xd7, 0x94, 0x9a, 0x74, 0x42]);
    assert_eq!(
        protocol::read_id_raw(dev.controller_mut()),
        [0xad, 0xd7, 0x94, 0x9a, 0x74, 0x42]
    );
}

#[test]
fn test_write_then_read_round_trip() {
    let mut dev = small_device();
    let data = pattern(3, PS);
    dev.erase_block(2).unwrap();
    dev.write_page(PageAddr::new(2, 7), &data).unwrap();

    let mut back = vec![0u8; PS];
    let mut oob = vec![0xaa; SPARE];
    dev.read_page(PageAddr::new(2, 7), Some(&mut back), Some(&mut oob))
        .unwrap();
    assert_eq!(back, data);
    assert!(oob.iter().all(|&b| b == 0x00));
    assert_eq!(marker(&mut dev, 2, 7), 0x00);
    assert_eq!(marker(&mut dev, 2, 8), 0xff);
}

#[test]
fn test_erased_page_reads_ff() {
    let mut dev = small_device();
    assert!(read_data(&mut dev, 10, 3).iter().all(|&b| b == 0xff));
    assert_eq!(marker(&mut dev, 10, 3), 0xff);
}

#[test]
fn test_erase_twice_leaves_pages_erased() {
    let mut dev = small_device();
    for page in 0..16 {
        dev.write_page(PageAddr::new(4, page), &pattern(page as u8, PS))
            .unwrap();
    }
    dev.erase_block(4).unwrap();
    dev.erase_block(4).unwrap();
    for page in 0..16 {
        assert_eq!(marker(&mut dev, 4, page), 0xff);
    }
    assert_eq!(dev.controller().programmed_pages(), 0);
}

#[test]
fn test_erase_out_of_range() {
    let mut dev = small_device();
    assert_eq!(dev.erase_block(64), Err(Error::AddressOutOfBounds));
    assert_eq!(
        dev.write_page(PageAddr::new(0, 16), &pattern(0, PS)),
        Err(Error::AddressOutOfBounds)
    );
}

#[test]
fn test_program_failure_poisons_until_erase() {
    let mut dev = small_device();
    let addr = PageAddr::new(1, 3);
    dev.controller_mut().inject(Fault::FailProgram(addr));
    let resets = dev.controller().stats().resets;

    assert_eq!(
        dev.write_page(addr, &pattern(1, PS)),
        Err(Error::ProgramFailure(addr))
    );
    assert_eq!(dev.controller().stats().resets, resets + 1);
    assert!(dev.context().is_poisoned(1));
    assert_eq!(
        dev.write_page(PageAddr::new(1, 4), &pattern(1, PS)),
        Err(Error::BlockNeedsErase { block: 1 })
    );

    dev.erase_block(1).unwrap();
    assert!(!dev.context().is_poisoned(1));
    dev.write_page(addr, &pattern(1, PS)).unwrap();
    assert_eq!(read_data(&mut dev, 1, 3), pattern(1, PS));
}

#[test]
fn test_verify_mismatch() {
    let mut dev = small_device();
    let addr = PageAddr::new(6, 0);
    dev.controller_mut().inject(Fault::CorruptProgram(addr));
    assert_eq!(
        dev.write_page(addr, &pattern(9, PS)),
        Err(Error::VerifyMismatch {
            page: addr,
            offset: 0
        })
    );
    assert!(dev.context().is_poisoned(6));
}

#[test]
fn test_erase_failure_resets_chip() {
    let mut dev = small_device();
    dev.write_page(PageAddr::new(8, 0), &pattern(2, PS)).unwrap();
    dev.controller_mut().inject(Fault::FailErase(8));
    let resets = dev.controller().stats().resets;

    assert_eq!(dev.erase_block(8), Err(Error::EraseFailure { block: 8 }));
    assert_eq!(dev.controller().stats().resets, resets + 1);
    assert_eq!(marker(&mut dev, 8, 0), 0x00);

    // One-shot: the next erase goes through
    dev.erase_block(8).unwrap();
    assert_eq!(marker(&mut dev, 8, 0), 0xff);
}

#[test]
fn test_program_timeout_when_busy() {
    let mut dev = small_device();
    dev.controller_mut().inject(Fault::StuckBusy);
    assert_eq!(
        dev.write_page(PageAddr::new(0, 0), &pattern(0, PS)),
        Err(Error::Timeout)
    );
    assert!(dev.context().is_poisoned(0));
    assert_eq!(dev.erase_block(1), Err(Error::Timeout));
}

// ---------------------------------------------------------------------------
// Block-merge writer
// ---------------------------------------------------------------------------

#[test]
fn test_single_erased_page_is_written_directly() {
    let mut dev = small_device();
    let data = pattern(5, PS);
    assert_eq!(dev.write(3, &data, 1), Ok(1));

    let stats = dev.stats();
    assert_eq!(stats.direct_writes, 1);
    assert_eq!(stats.merges, 0);
    assert_eq!(dev.controller().stats().erases, 0);
    assert_eq!(read_data(&mut dev, 0, 3), data);
}

#[test]
fn test_merge_preserves_neighbours() {
    let mut dev = small_device();
    for page in 0..5u32 {
        dev.write(16 + page, &pattern(page as u8, PS), 1).unwrap();
    }

    // Page 5 is erased: written in place
    dev.write(16 + 5, &pattern(0x55, PS), 1).unwrap();
    assert_eq!(dev.stats().merges, 0);
    for page in 0..5u32 {
        assert_eq!(read_data(&mut dev, 1, page), pattern(page as u8, PS));
    }
    assert_eq!(read_data(&mut dev, 1, 5), pattern(0x55, PS));

    // Page 2 holds data: the block is merged
    dev.write(16 + 2, &pattern(0xee, PS), 1).unwrap();
    assert_eq!(dev.stats().merges, 1);
    for page in [0u32, 1, 3, 4] {
        assert_eq!(read_data(&mut dev, 1, page), pattern(page as u8, PS));
    }
    assert_eq!(read_data(&mut dev, 1, 2), pattern(0xee, PS));
    assert_eq!(read_data(&mut dev, 1, 5), pattern(0x55, PS));
    for page in 6..16 {
        assert_eq!(marker(&mut dev, 1, page), 0xff);
    }
    assert_eq!(dev.controller().stats().double_programs, 0);
}

#[test]
fn test_multi_page_write_goes_through_merge() {
    let mut dev = small_device();
    let data = pattern(1, 3 * PS);
    assert_eq!(dev.write(2 * 16 + 4, &data, 3), Ok(3));

    let stats = dev.stats();
    assert_eq!(stats.direct_writes, 0);
    assert_eq!(stats.merges, 1);
    assert_eq!(stats.erases, 1);
    assert_eq!(stats.pages_programmed, 3);
    for i in 0..3 {
        assert_eq!(
            read_data(&mut dev, 2, 4 + i as u32),
            data[i * PS..(i + 1) * PS]
        );
    }
}

#[test]
fn test_overwrites_never_double_program() {
    let mut dev = small_device();
    let mut expected = vec![None; 48];
    let writes: [(u32, usize, u8); 7] = [
        (0, 3, 1),
        (2, 1, 2),
        (14, 4, 3),
        (15, 1, 4),
        (1, 20, 5),
        (30, 1, 6),
        (30, 1, 7),
    ];
    for (pos, count, seed) in writes {
        let data = pattern(seed, count * PS);
        dev.write(pos, &data, count).unwrap();
        for i in 0..count {
            expected[pos as usize + i] = Some(data[i * PS..(i + 1) * PS].to_vec());
        }
    }

    assert_eq!(dev.controller().stats().double_programs, 0);
    let mut buf = vec![0u8; PS];
    for (pos, want) in expected.iter().enumerate() {
        dev.read(pos as u32, &mut buf, 1).unwrap();
        match want {
            Some(data) => assert_eq!(&buf, data, "sector {}", pos),
            None => assert!(buf.iter().all(|&b| b == 0xff), "sector {}", pos),
        }
    }
}

#[test]
fn test_merge_recovers_poisoned_block() {
    let mut dev = small_device();
    dev.write(5 * 16, &pattern(1, PS), 1).unwrap();
    let failing = PageAddr::new(5, 1);
    dev.controller_mut().inject(Fault::FailProgram(failing));
    assert_eq!(
        dev.write(5 * 16 + 1, &pattern(2, PS), 1),
        Err(Error::ProgramFailure(failing))
    );
    assert!(dev.context().is_poisoned(5));

    // Retry by the caller: the poisoned block forces a merge, which erases it
    dev.write(5 * 16 + 1, &pattern(2, PS), 1).unwrap();
    assert!(!dev.context().is_poisoned(5));
    assert_eq!(read_data(&mut dev, 5, 0), pattern(1, PS));
    assert_eq!(read_data(&mut dev, 5, 1), pattern(2, PS));
}

#[test]
fn test_merge_drops_failed_page() {
    let mut dev = small_device();
    dev.write(5 * 16, &pattern(1, PS), 1).unwrap();
    let failing = PageAddr::new(5, 1);
    dev.controller_mut().inject(Fault::CorruptProgram(failing));
    assert_eq!(
        dev.write(5 * 16 + 1, &pattern(2, PS), 1),
        Err(Error::VerifyMismatch {
            page: failing,
            offset: 0
        })
    );
    assert_ne!(marker(&mut dev, 5, 1), 0xff);

    // Another page of the block: the merge must not carry the garbage over
    assert_eq!(dev.write(5 * 16 + 3, &pattern(3, PS), 1), Ok(1));
    assert!(!dev.context().is_poisoned(5));
    assert_eq!(marker(&mut dev, 5, 1), 0xff);
    assert!(read_data(&mut dev, 5, 1).iter().all(|&b| b == 0xff));
    assert_eq!(read_data(&mut dev, 5, 0), pattern(1, PS));
    assert_eq!(read_data(&mut dev, 5, 3), pattern(3, PS));
    assert_eq!(dev.controller().stats().double_programs, 0);
}

#[test]
fn test_failed_chunk_aborts_write() {
    let mut dev = small_device();
    dev.write(16, &pattern(1, PS), 1).unwrap();
    dev.controller_mut().inject(Fault::FailErase(1));

    // Chunk in block 0 succeeds, the merge of block 1 fails, block 2 is never reached
    let data = pattern(2, 34 * PS);
    assert_eq!(
        dev.write(15, &data, 34),
        Err(Error::EraseFailure { block: 1 })
    );
    assert_eq!(read_data(&mut dev, 0, 15), data[..PS]);
    assert_eq!(read_data(&mut dev, 1, 0), pattern(1, PS));
    assert_eq!(marker(&mut dev, 2, 0), 0xff);
}

#[test]
fn test_hynix_boundary_chunking() {
    let mut dev = device_for(ChipDescriptor::hynix_h27ubg8t2a());
    let ps = 8192;
    let count = 300;
    let mut data = vec![0u8; count * ps];
    for (i, page) in data.chunks_mut(ps).enumerate() {
        page.fill(i as u8);
        page[..4].copy_from_slice(&(i as u32).to_le_bytes());
    }

    assert_eq!(dev.write(200, &data, count), Ok(count));
    assert_eq!(dev.stats().merges, 2);

    let sim = dev.controller();
    assert_eq!(sim.programmed_pages(), 300);
    for i in 0..56u32 {
        let page = sim.page(PageAddr::new(0, 200 + i)).unwrap();
        assert_eq!(&page[..4], &i.to_le_bytes());
    }
    for i in 0..244u32 {
        let page = sim.page(PageAddr::new(1, i)).unwrap();
        assert_eq!(&page[..4], &(56 + i).to_le_bytes());
    }
    assert!(sim.is_erased(PageAddr::new(0, 199)));
    assert!(sim.is_erased(PageAddr::new(1, 244)));
}

// ---------------------------------------------------------------------------
// Device adapter
// ---------------------------------------------------------------------------

#[test]
fn test_read_crosses_block_boundary() {
    let mut dev = small_device();
    dev.write(15, &pattern(1, PS), 1).unwrap();
    dev.write(16, &pattern(2, PS), 1).unwrap();
    dev.write(17, &pattern(3, PS), 1).unwrap();

    let mut buf = vec![0u8; 3 * PS];
    assert_eq!(dev.read(15, &mut buf, 3), Ok(3));
    assert_eq!(buf[..PS], pattern(1, PS)[..]);
    assert_eq!(buf[PS..2 * PS], pattern(2, PS)[..]);
    assert_eq!(buf[2 * PS..], pattern(3, PS)[..]);
}

#[test]
fn test_geometry_control() {
    let mut dev = small_device();
    let expected = BlockGeometry {
        bytes_per_sector: 2048,
        block_size: 2048 * 16,
        sector_count: 64 * 16,
    };
    assert_eq!(
        dev.control(ControlCommand::GetGeometry),
        Ok(ControlResponse::Geometry(expected))
    );
    assert_eq!(
        dev.control(ControlCommand::Other(0x42)),
        Err(Error::NotSupported)
    );

    let hynix = device_for(ChipDescriptor::hynix_h27ubg8t2a());
    let g = hynix.geometry();
    assert_eq!(g.bytes_per_sector, 8192);
    assert_eq!(g.block_size, 2 * 1024 * 1024);
    assert_eq!(g.sector_count, 262_144);
}

#[test]
fn test_requests_checked() {
    let mut dev = small_device();
    let mut buf = vec![0u8; 2 * PS];
    assert_eq!(dev.read(1023, &mut buf, 2), Err(Error::AddressOutOfBounds));
    assert_eq!(dev.read(0, &mut buf, 3), Err(Error::BufferTooSmall));
    assert_eq!(dev.write(1024, &buf, 1), Err(Error::AddressOutOfBounds));
    assert_eq!(dev.read(0, &mut buf, 0), Ok(0));
}

#[test]
fn test_empty_requests_at_end() {
    let mut dev = small_device();
    let mut buf = vec![0u8; PS];
    assert_eq!(dev.read(1024, &mut buf, 0), Ok(0));
    assert_eq!(dev.write(1024, &buf, 0), Ok(0));
    assert_eq!(dev.write(3, &buf, 0), Ok(0));
    assert_eq!(dev.stats(), MergeStats::default());
    assert_eq!(dev.controller().stats().programs, 0);
}

#[test]
fn test_open_flags_enforced() {
    let chip = SimConfig::small_chip();
    let ctrl = SimController::from_descriptor(&chip);
    let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
    let mut dev = NandDevice::new(ctrl, ctx);
    dev.init().unwrap();

    let mut buf = vec![0u8; PS];
    assert_eq!(dev.read(0, &mut buf, 1), Err(Error::NotOpen));

    dev.open(OpenFlags::RDONLY).unwrap();
    assert_eq!(dev.read(0, &mut buf, 1), Ok(1));
    assert_eq!(dev.write(0, &buf, 1), Err(Error::NotOpen));

    dev.close().unwrap();
    assert!(!dev.is_open());
    assert_eq!(dev.read(0, &mut buf, 1), Err(Error::NotOpen));
}

#[test]
fn test_staging_buffer_is_one_block() {
    let chip = ChipDescriptor::hynix_h27ubg8t2a();
    let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
    let writer = nandflash_core::flash::MergeWriter::new(&ctx);
    assert_eq!(writer.staging_capacity(), 8192 * 256);
}
