//! Parallel NAND command sequences
//!
//! Every function takes the controller and the shared [`NandContext`] and
//! runs one complete command/address/data/poll sequence. Nothing is
//! retried here: when the chip reports a failure it is reset and the error
//! is handed back to the caller.

use crate::chip::ID_READ_LEN;
use crate::controller::{NandController, Register};
use crate::error::{Error, Result};
use crate::flash::{NandContext, PageAddr};
use crate::protocol::opcodes;

/// Bytes compared per transfer when verifying a programmed page
const VERIFY_CHUNK: usize = 64;

/// Program the controller with the derived configuration
///
/// Clears the configuration register, disables controller interrupts (the
/// driver polls) and writes the configuration image with chip 0 selected.
pub fn init_controller<C: NandController + ?Sized>(ctrl: &mut C, ctx: &mut NandContext) {
    ctrl.write_reg(Register::Config, 0);
    ctrl.write_reg(Register::Control, 0);
    let image = ctx.set_chip_select(0);
    ctrl.write_reg(Register::Config, image);
    log::debug!("Controller configured: cfg={:#010x}", image);
}

/// Select a chip and wait for the controller to report it ready
pub fn select_chip<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &mut NandContext,
    cs: u8,
) -> Result<()> {
    if cs >= ctx.config.chip_selects {
        return Err(Error::AddressOutOfBounds);
    }

    let image = ctx.set_chip_select(cs);
    ctrl.write_reg(Register::Config, image);

    for _ in 0..ctx.limits.ready_polls {
        if ctrl.read_reg(Register::Status) & (1 << cs) != 0 {
            log::trace!("Chip {} selected", cs);
            return Ok(());
        }
        ctrl.delay_us(ctx.limits.poll_delay_us);
    }

    log::error!("Chip {} never reported ready", cs);
    Err(Error::InitTimeout)
}

/// Read the chip status byte
pub fn read_status<C: NandController + ?Sized>(ctrl: &mut C) -> u8 {
    ctrl.command(opcodes::STATUS);
    ctrl.read_byte()
}

/// Reset a chip
pub fn reset<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &mut NandContext,
    cs: u8,
) -> Result<()> {
    select_chip(ctrl, ctx, cs)?;
    ctrl.command(opcodes::RESET);
    ctrl.delay_us(ctx.limits.reset_settle_us);

    for _ in 0..ctx.limits.reset_retries {
        if read_status(ctrl) & opcodes::STATUS_READY != 0 {
            log::debug!("Chip {} reset", cs);
            return Ok(());
        }
        ctrl.delay_us(ctx.limits.reset_settle_us);
    }

    log::error!("Chip {} reset timed out", cs);
    Err(Error::InitTimeout)
}

/// Reset the selected chip after a failed operation
fn recover<C: NandController + ?Sized>(ctrl: &mut C, ctx: &mut NandContext) {
    let cs = ctx.selected().unwrap_or(0);
    if let Err(e) = reset(ctrl, ctx, cs) {
        log::warn!("Reset after failure did not complete: {}", e);
    }
}

/// Poll the status byte until the chip is ready
fn wait_ready<C: NandController + ?Sized>(ctrl: &mut C, polls: u32, delay_us: u32) -> Result<u8> {
    for _ in 0..polls {
        let status = read_status(ctrl);
        if status & opcodes::STATUS_READY != 0 {
            return Ok(status);
        }
        ctrl.delay_us(delay_us);
    }
    Err(Error::Timeout)
}

fn send_address<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &NandContext,
    column: Option<u32>,
    row: u32,
) {
    if let Some(column) = column {
        for i in 0..ctx.geometry().col_cycles {
            ctrl.address((column >> (8 * i)) as u8);
        }
    }
    for i in 0..ctx.geometry().row_cycles {
        ctrl.address((row >> (8 * i)) as u8);
    }
}

/// Read the identification bytes without checking them
pub fn read_id_raw<C: NandController + ?Sized>(ctrl: &mut C) -> [u8; ID_READ_LEN] {
    let mut id = [0u8; ID_READ_LEN];
    ctrl.command(opcodes::READID);
    ctrl.address(0x00);
    ctrl.read_data(&mut id);
    id
}

/// Read the identification bytes and check them against the expected chip
pub fn read_id<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &mut NandContext,
) -> Result<[u8; ID_READ_LEN]> {
    let id = read_id_raw(ctrl);
    log::debug!("Read ID: {:02x?}", id);

    if !ctx.chip.matches_id(&id) {
        log::warn!(
            "ID {:02x?} does not match {} {} ({:02x?})",
            id,
            ctx.chip.vendor,
            ctx.chip.name,
            &ctx.chip.id[..]
        );
        recover(ctrl, ctx);
        return Err(Error::UnrecognizedDevice);
    }
    Ok(id)
}

/// Read a page
///
/// With `data`, the whole page is transferred and the spare bytes go to
/// `oob` or are discarded. With only `oob`, just the spare area is read.
pub fn read_page<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &NandContext,
    addr: PageAddr,
    data: Option<&mut [u8]>,
    oob: Option<&mut [u8]>,
) -> Result<()> {
    let row = ctx.row_address(addr)?;
    let page_size = ctx.page_size();
    let spare_size = ctx.spare_size();

    if data.as_ref().is_some_and(|d| d.len() < page_size)
        || oob.as_ref().is_some_and(|o| o.len() < spare_size)
    {
        return Err(Error::BufferTooSmall);
    }

    match (data, oob) {
        (Some(data), oob) => {
            ctrl.command(opcodes::READ0);
            send_address(ctrl, ctx, Some(0), row);
            ctrl.command(opcodes::READSTART);
            ctrl.delay_us(ctx.limits.read_settle_us);
            ctrl.read_data(&mut data[..page_size]);
            match oob {
                Some(oob) => ctrl.read_data(&mut oob[..spare_size]),
                None => ctrl.skip_data(spare_size),
            }
        }
        (None, Some(oob)) => {
            ctrl.command(opcodes::READOOB);
            send_address(ctrl, ctx, Some(0), row);
            ctrl.command(opcodes::READSTART);
            ctrl.delay_us(ctx.limits.read_settle_us);
            ctrl.read_data(&mut oob[..spare_size]);
        }
        (None, None) => {}
    }

    log::trace!("Read {}", addr);
    Ok(())
}

/// Read the presence marker of a page (first spare byte)
///
/// Returns `true` when the page is erased.
pub fn page_is_erased<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &NandContext,
    addr: PageAddr,
    oob: &mut [u8],
) -> Result<bool> {
    read_page(ctrl, ctx, addr, None, Some(oob))?;
    Ok(oob[0] == 0xff)
}

/// Program a page and verify it
///
/// The caller must make sure the page is erased. The spare area is
/// programmed with zeros, which marks the page as holding data. A program
/// failure, timeout or verify mismatch resets the chip and leaves the block
/// unusable until [`erase_block`] succeeds on it.
pub fn write_page<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &mut NandContext,
    addr: PageAddr,
    data: &[u8],
) -> Result<()> {
    let row = ctx.row_address(addr)?;
    let page_size = ctx.page_size();
    let spare_size = ctx.spare_size();

    if data.len() < page_size {
        return Err(Error::BufferTooSmall);
    }
    if ctx.is_poisoned(addr.block) {
        return Err(Error::BlockNeedsErase { block: addr.block });
    }
    let data = &data[..page_size];

    ctrl.command(opcodes::SEQIN);
    send_address(ctrl, ctx, Some(0), row);
    ctrl.write_data(data);
    ctrl.fill_data(0x00, spare_size);
    ctrl.command(opcodes::PAGEPROG);

    let status = match wait_ready(ctrl, ctx.limits.program_polls, ctx.limits.poll_delay_us) {
        Ok(status) => status,
        Err(e) => {
            log::error!("Program of {} timed out", addr);
            ctx.poison(addr);
            recover(ctrl, ctx);
            return Err(e);
        }
    };
    if status & opcodes::STATUS_FAIL != 0 {
        log::error!("Program of {} failed (status {:#04x})", addr, status);
        ctx.poison(addr);
        recover(ctrl, ctx);
        return Err(Error::ProgramFailure(addr));
    }

    if let Some(offset) = verify_page(ctrl, ctx, row, data) {
        log::error!("Verify of {} failed at offset {}", addr, offset);
        ctx.poison(addr);
        recover(ctrl, ctx);
        return Err(Error::VerifyMismatch { page: addr, offset });
    }

    log::trace!("Programmed {}", addr);
    Ok(())
}

/// Read a page back and compare it with what was programmed
///
/// Returns the offset of the first differing byte; spare bytes are counted
/// after the data region.
fn verify_page<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &NandContext,
    row: u32,
    data: &[u8],
) -> Option<usize> {
    ctrl.command(opcodes::READ0);
    send_address(ctrl, ctx, Some(0), row);
    ctrl.command(opcodes::READSTART);
    ctrl.delay_us(ctx.limits.read_settle_us);

    let mut chunk = [0u8; VERIFY_CHUNK];
    for (i, expected) in data.chunks(VERIFY_CHUNK).enumerate() {
        let got = &mut chunk[..expected.len()];
        ctrl.read_data(got);
        if let Some(pos) = got.iter().zip(expected).position(|(a, b)| a != b) {
            return Some(i * VERIFY_CHUNK + pos);
        }
    }

    let mut offset = data.len();
    let mut remaining = ctx.spare_size();
    while remaining > 0 {
        let n = remaining.min(VERIFY_CHUNK);
        let got = &mut chunk[..n];
        ctrl.read_data(got);
        if let Some(pos) = got.iter().position(|&b| b != 0x00) {
            return Some(offset + pos);
        }
        offset += n;
        remaining -= n;
    }
    None
}

/// Erase a block
///
/// A successful erase also makes a block that a failed program left
/// unusable writable again.
pub fn erase_block<C: NandController + ?Sized>(
    ctrl: &mut C,
    ctx: &mut NandContext,
    block: u32,
) -> Result<()> {
    let row = ctx.row_address(PageAddr::new(block, 0))?;

    ctrl.command(opcodes::ERASE1);
    send_address(ctrl, ctx, None, row);
    ctrl.command(opcodes::ERASE2);

    let status = match wait_ready(ctrl, ctx.limits.erase_polls, ctx.limits.poll_delay_us) {
        Ok(status) => status,
        Err(e) => {
            log::error!("Erase of block {} timed out", block);
            recover(ctrl, ctx);
            return Err(e);
        }
    };
    if status & opcodes::STATUS_FAIL != 0 {
        log::error!("Erase of block {} failed (status {:#04x})", block, status);
        recover(ctrl, ctx);
        return Err(Error::EraseFailure { block });
    }

    ctx.clear_poison(block);
    log::debug!("Erased block {}", block);
    Ok(())
}
