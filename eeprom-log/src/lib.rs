#![no_std]
#![deny(missing_docs)]
//! # eeprom-log
//! Log-structured file store emulating a small EEPROM on top of a
//! page-erased data flash.
//!
//! Flash cells wear out per erase cycle, so records are never rewritten
//! in place. The device is divided into erase pages and every page into
//! fixed-size sectors of `DATA` payload bytes behind a two-byte header
//! (a flag byte carrying the file number and a tombstone bit, and a CRC8
//! over flag and payload). Writing a file appends a sector at the current
//! write position; the directory simply remembers the newest valid sector
//! per file. One page is always kept erased, and when the log runs into
//! it, live sectors of the following page are salvaged into the log
//! before that page is erased in turn. Writes thereby spread over the
//! whole device no matter how few files are hot, and older revisions of a
//! file stay readable until their page is recycled.
//!
//! The store holds up to `DIR` files (127 at most, the flag byte keeps
//! 7 bits for the file number). Any type that implements the `zerocopy`
//! byte-conversion traits and fits the sector payload can be stored; the
//! payload behind the stored bytes is left erased.
//!
//! No assumption is made about the flash beyond the `embedded-storage`
//! NOR traits with byte-granular reads and writes. The `mem` feature adds
//! a RAM-backed device for tests and host-side tooling.

mod error;
mod sector;

#[cfg(feature = "mem")]
pub mod mem;

pub use error::{EepromError, EepromResult};

use embedded_storage::nor_flash::NorFlash;
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::sector::{RawSector, SectorFlag, SectorImage, sector_crc};

/// Log-structured file store over a page-erased flash device.
///
/// `DATA` is the payload size of one sector and `DIR` the number of file
/// slots. Geometry is checked in [`new`](Eeprom::new); afterwards every
/// operation only fails on flash errors or, for writes, on an invalid
/// file number.
///
/// Call [`begin`](Eeprom::begin) before the first file operation.
pub struct Eeprom<F, const DATA: usize, const DIR: usize> {
    flash: F,
    directory: [Option<u16>; DIR],
    write_pos: u16,
    free_page: u16,
    page_count: u16,
    crc_errors: u32,
}

impl<F: NorFlash, const DATA: usize, const DIR: usize> Eeprom<F, DATA, DIR> {
    /// Size of one sector on flash, payload plus header.
    pub const SECTOR_SIZE: usize = DATA + 2;

    /// Sectors that fit one erase page.
    pub const SECTORS_PER_PAGE: usize = F::ERASE_SIZE / Self::SECTOR_SIZE;

    /// Wraps a flash device.
    ///
    /// The store is not usable until [`begin`](Eeprom::begin) has scanned
    /// the device.
    ///
    /// # Panics
    /// Panics when the geometry cannot work: the flash is not byte
    /// granular, its capacity is not a whole number of erase pages, the
    /// device addresses more sectors than fit a 16-bit index, or fewer
    /// than `DIR` sectors remain once two pages are reserved for wear
    /// leveling.
    pub fn new(flash: F) -> Self {
        const {
            assert!(DATA > 0, "sector payload must not be empty");
            assert!(
                DIR > 0 && DIR < 128,
                "the flag byte keeps 7 bits for the file number"
            );
            assert!(
                F::READ_SIZE == 1 && F::WRITE_SIZE == 1,
                "store requires byte-granular flash access"
            );
            assert!(
                F::ERASE_SIZE >= DATA + 2,
                "a sector must fit one erase page"
            );
        }
        assert!(
            flash.capacity() % F::ERASE_SIZE == 0,
            "capacity must be a whole number of erase pages"
        );
        let page_count = flash.capacity() / F::ERASE_SIZE;
        let total_sectors = page_count * Self::SECTORS_PER_PAGE;
        assert!(
            total_sectors <= u16::MAX as usize,
            "sector indices are 16 bit"
        );
        assert!(
            total_sectors >= 2 * Self::SECTORS_PER_PAGE + DIR,
            "two pages are reserved for wear leveling"
        );
        Self {
            flash,
            directory: [None; DIR],
            write_pos: 0,
            free_page: 0,
            page_count: page_count as u16,
            crc_errors: 0,
        }
    }

    /// Scans the flash and builds the directory.
    pub fn begin(&mut self) -> EepromResult<(), F::Error> {
        self.rescan()
    }

    /// Rebuilds the directory from what is on flash.
    ///
    /// Sectors are laid down oldest to newest, wrapping at the device
    /// end, so the scan tracks which half of the log it is in and lets a
    /// newer occurrence of a file number override an older one. Sectors
    /// with a bad CRC only bump the error counter. The scan ends by
    /// locating the reserved page and erasing it again, which makes a
    /// write interrupted by a power failure disappear.
    pub fn rescan(&mut self) -> EepromResult<(), F::Error> {
        let spp = Self::SECTORS_PER_PAGE as u16;
        let total = self.total_sectors();

        // probe the first header byte of each page for an erased page
        let mut free_page = self.page_count;
        for page in 0..self.page_count {
            let mut probe = [0u8; 1];
            self.flash.read(Self::sector_addr(page * spp), &mut probe)?;
            if probe[0] == SectorFlag::FREE {
                free_page = page;
                break;
            }
        }

        // age class per file: lower is newer, 0xff is unseen
        let mut file_area = [0xffu8; DIR];
        self.directory = [None; DIR];

        let mut head = total;
        // first sector of the run of data reaching the device end
        let mut second_head = 0u16;
        let mut area = 1u8;

        for idx in 0..total {
            let sector = self.read_sector(idx)?;
            if sector.flag.is_free() {
                if head == total {
                    head = idx;
                    area += 1;
                }
            } else {
                second_head = idx + 1;
                if sector.is_valid() {
                    let file = sector.flag.file_nr() as usize;
                    if file < DIR && file_area[file] >= area {
                        file_area[file] = area;
                        self.directory[file] = if sector.flag.tombstone() {
                            None
                        } else {
                            Some(idx)
                        };
                    }
                } else {
                    self.crc_errors += 1;
                }
            }
        }

        if head == total {
            // no free sector anywhere, reclaim a page without live files
            let page = self.select_unused_page();
            head = page * spp;
            free_page = page;
        } else if free_page == self.page_count {
            // the reserved page was lost to a power failure; it is the
            // page after the head, wrapping when the head sits last
            free_page = Self::sector_page(Self::write_stop(head)) % self.page_count;
        } else if free_page == 0 && second_head != total {
            // log wrapped past the device end, the head continues there
            head = second_head;
        }

        self.erase_page(free_page)?;
        self.write_pos = head;
        self.free_page = free_page;
        Ok(())
    }

    /// Reads the newest revision of a file.
    ///
    /// Returns `Ok(None)` when the file does not exist. A sector that no
    /// longer matches its CRC triggers a rescan and one more attempt
    /// before the file is reported missing.
    pub fn read_file<T: FromBytes>(&mut self, id: u8) -> EepromResult<Option<T>, F::Error> {
        const { assert!(size_of::<T>() <= DATA, "type must fit the sector payload") }
        let mut data = [0u8; DATA];
        if !self.read_file_raw(id, &mut data)? {
            return Ok(None);
        }
        Ok(T::read_from_prefix(&data).ok().map(|(value, _)| value))
    }

    /// Reads the newest revision of a file into a payload buffer.
    ///
    /// Returns `Ok(false)` when the file does not exist.
    pub fn read_file_raw(&mut self, id: u8, out: &mut [u8; DATA]) -> EepromResult<bool, F::Error> {
        if id as usize >= DIR {
            return Ok(false);
        }
        for _ in 0..2 {
            let Some(idx) = self.directory[id as usize] else {
                return Ok(false);
            };
            let sector = self.read_sector(idx)?;
            if sector.is_valid() {
                *out = sector.data;
                return Ok(true);
            }
            // flash decayed under us, rebuild the directory and retry
            self.crc_errors += 1;
            self.rescan()?;
        }
        Ok(false)
    }

    /// Writes a new revision of a file.
    ///
    /// The payload behind the stored bytes is left erased.
    pub fn write_file<T: IntoBytes + Immutable>(
        &mut self,
        id: u8,
        data: &T,
    ) -> EepromResult<(), F::Error> {
        const { assert!(size_of::<T>() <= DATA, "type must fit the sector payload") }
        self.write_file_raw(id, data.as_bytes())
    }

    /// Writes a new revision of a file from raw bytes.
    ///
    /// # Panics
    /// Panics when `data` is longer than the sector payload.
    pub fn write_file_raw(&mut self, id: u8, data: &[u8]) -> EepromResult<(), F::Error> {
        let mut payload = [0xffu8; DATA];
        payload[..data.len()].copy_from_slice(data);
        let flag = SectorFlag::new().with_file_nr(id & 0x7f);
        if flag.file_nr() != id {
            return Err(EepromError::InvalidFileNumber);
        }
        self.write_file_sector(flag, &payload)
    }

    /// Writes a file only when its stored bytes differ.
    ///
    /// Reads the current revision first, which trades time for flash
    /// wear. Returns whether a new revision was written.
    pub fn update_file<T: IntoBytes + Immutable>(
        &mut self,
        id: u8,
        data: &T,
    ) -> EepromResult<bool, F::Error> {
        const { assert!(size_of::<T>() <= DATA, "type must fit the sector payload") }
        if id as usize >= DIR {
            return Err(EepromError::InvalidFileNumber);
        }
        if let Some(idx) = self.directory[id as usize] {
            let sector = self.read_sector(idx)?;
            if sector.is_valid() && data.as_bytes() == &sector.data[..size_of::<T>()] {
                return Ok(false);
            }
        }
        self.write_file(id, data)?;
        Ok(true)
    }

    /// Erases a file.
    ///
    /// A live file is erased by appending a tombstone sector; the old
    /// revisions physically disappear once wear leveling recycles their
    /// pages. Erasing an absent file does nothing.
    pub fn erase_file(&mut self, id: u8) -> EepromResult<(), F::Error> {
        if id as usize >= DIR {
            return Err(EepromError::InvalidFileNumber);
        }
        if self.directory[id as usize].is_some() {
            let flag = SectorFlag::new().with_file_nr(id).with_tombstone(true);
            self.write_file_sector(flag, &[0xff; DATA])?;
        }
        Ok(())
    }

    /// Visits every surviving revision of a file, oldest first.
    ///
    /// Revisions survive until wear leveling recycles their page, so this
    /// walks the whole device and is slow. Tombstones and sectors with a
    /// bad CRC are skipped.
    pub fn list_revisions<V>(&mut self, id: u8, mut visit: V) -> EepromResult<(), F::Error>
    where
        V: FnMut(&[u8; DATA]),
    {
        let start = Self::write_stop(self.write_pos);
        for idx in (start..self.total_sectors()).chain(0..self.write_pos) {
            let sector = self.read_sector(idx)?;
            if !sector.flag.is_free()
                && !sector.flag.tombstone()
                && sector.is_valid()
                && sector.flag.file_nr() == id
            {
                visit(&sector.data);
            }
        }
        Ok(())
    }

    /// Erases the whole device and empties the directory.
    pub fn erase_all(&mut self) -> EepromResult<(), F::Error> {
        for page in 0..self.page_count {
            self.erase_page(page)?;
        }
        self.directory = [None; DIR];
        self.write_pos = 0;
        self.free_page = 0;
        Ok(())
    }

    /// Number of live files.
    pub fn file_count(&self) -> usize {
        self.directory.iter().filter(|slot| slot.is_some()).count()
    }

    /// Bytes occupied by live files, headers included.
    pub fn size(&self) -> usize {
        self.file_count() * Self::SECTOR_SIZE
    }

    /// Payload bytes held by live files.
    pub fn data_size(&self) -> usize {
        self.file_count() * DATA
    }

    /// Whether no file is live.
    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    /// Number of CRC failures seen so far.
    ///
    /// A nonzero value means sectors decayed or writes were torn; the
    /// device is nearing the end of its life when this keeps growing.
    pub fn crc_error_counter(&self) -> u32 {
        self.crc_errors
    }

    /// Borrows the flash device.
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Borrows the flash device mutably.
    ///
    /// Changes made behind the store's back are only picked up by
    /// [`rescan`](Eeprom::rescan) or the read retry path.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Gives the flash device back.
    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Appends a prepared sector, wear leveling when the log catches up
    /// with the reserved page.
    ///
    /// On a page boundary the next reserved page is chosen first: the
    /// candidate must have room left once live sectors of other files on
    /// it are counted, and those sectors are salvaged into the log right
    /// after the new revision. The geometry guarantee of two reserved
    /// pages makes the candidate search succeed before it wraps around;
    /// [`StorageFull`](EepromError::StorageFull) guards the loop all the
    /// same.
    fn write_file_sector(
        &mut self,
        flag: SectorFlag,
        data: &[u8; DATA],
    ) -> EepromResult<(), F::Error> {
        let id = flag.file_nr() as usize;
        if id >= DIR {
            return Err(EepromError::InvalidFileNumber);
        }
        let crc = sector_crc(flag.into_bits(), data);

        if self.write_pos == Self::write_stop(self.write_pos) {
            let spp = Self::SECTORS_PER_PAGE as u16;
            let mut next_page = self.free_page;
            let (mut begin, mut end);
            let mut live_on_page;
            loop {
                next_page = (next_page + 1) % self.page_count;
                if next_page == self.free_page {
                    return Err(EepromError::StorageFull);
                }
                begin = next_page * spp;
                end = begin + spp;
                live_on_page = self
                    .directory
                    .iter()
                    .enumerate()
                    .filter(|&(file, slot)| {
                        file != id && slot.is_some_and(|idx| idx >= begin && idx < end)
                    })
                    .count();
                if live_on_page < Self::SECTORS_PER_PAGE {
                    break;
                }
            }

            self.write_pos = self.free_page * spp;
            let written = self.append_sector(flag, crc, data)?;
            self.directory[id] = Some(written);

            if live_on_page > 0 {
                for file in 0..DIR {
                    if file == id {
                        continue;
                    }
                    let Some(idx) = self.directory[file] else {
                        continue;
                    };
                    if idx < begin || idx >= end {
                        continue;
                    }
                    let sector = self.read_sector(idx)?;
                    if sector.is_valid() {
                        let moved = self.append_sector(sector.flag, sector.crc, &sector.data)?;
                        self.directory[file] = Some(moved);
                    } else {
                        self.crc_errors += 1;
                    }
                }
            }

            self.free_page = next_page;
            self.erase_page(next_page)?;
        } else {
            let written = self.append_sector(flag, crc, data)?;
            self.directory[id] = Some(written);
        }

        if flag.tombstone() {
            self.directory[id] = None;
        }
        Ok(())
    }

    /// A page no live file points into, for recovery when the whole
    /// device looks written. Falls back to the last page.
    fn select_unused_page(&self) -> u16 {
        let spp = Self::SECTORS_PER_PAGE as u16;
        for page in 0..self.page_count {
            let begin = page * spp;
            let end = begin + spp;
            let used = self
                .directory
                .iter()
                .any(|slot| slot.is_some_and(|idx| idx >= begin && idx < end));
            if !used {
                return page;
            }
        }
        self.page_count - 1
    }

    fn read_sector(&mut self, idx: u16) -> EepromResult<RawSector<DATA>, F::Error> {
        let addr = Self::sector_addr(idx);
        let mut header = [0u8; 2];
        self.flash.read(addr, &mut header)?;
        let mut data = [0u8; DATA];
        self.flash.read(addr + 2, &mut data)?;
        Ok(RawSector {
            flag: SectorFlag::from_bits(header[0]),
            crc: header[1],
            data,
        })
    }

    /// Programs header and payload as one contiguous image in a single
    /// flash operation, so an append cut short by a power loss cannot
    /// leave a header over an unwritten payload.
    fn append_sector(
        &mut self,
        flag: SectorFlag,
        crc: u8,
        data: &[u8; DATA],
    ) -> EepromResult<u16, F::Error> {
        let idx = self.write_pos;
        self.write_pos += 1;
        let image = SectorImage {
            flag: flag.into_bits(),
            crc,
            data: *data,
        };
        self.flash.write(Self::sector_addr(idx), image.as_bytes())?;
        Ok(idx)
    }

    fn erase_page(&mut self, page: u16) -> EepromResult<(), F::Error> {
        let from = page as u32 * F::ERASE_SIZE as u32;
        self.flash.erase(from, from + F::ERASE_SIZE as u32)?;
        Ok(())
    }

    fn total_sectors(&self) -> u16 {
        (self.page_count as usize * Self::SECTORS_PER_PAGE) as u16
    }

    /// Byte address of a sector; slack at the end of a page stays unused.
    fn sector_addr(idx: u16) -> u32 {
        let page = idx as u32 / Self::SECTORS_PER_PAGE as u32;
        let in_page = idx as u32 % Self::SECTORS_PER_PAGE as u32;
        page * F::ERASE_SIZE as u32 + in_page * Self::SECTOR_SIZE as u32
    }

    /// First sector index past the page `idx` lies in.
    fn write_stop(idx: u16) -> u16 {
        let spp = Self::SECTORS_PER_PAGE as u16;
        idx.div_ceil(spp) * spp
    }

    fn sector_page(idx: u16) -> u16 {
        idx / Self::SECTORS_PER_PAGE as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemFlash;

    type Store = Eeprom<MemFlash<8192, 1024>, 22, 15>;

    #[test]
    fn geometry() {
        // 24-byte sectors, 42 per kilobyte page, 16 bytes page slack
        assert_eq!(Store::SECTOR_SIZE, 24);
        assert_eq!(Store::SECTORS_PER_PAGE, 42);
        assert_eq!(Store::sector_addr(0), 0);
        assert_eq!(Store::sector_addr(41), 41 * 24);
        assert_eq!(Store::sector_addr(42), 1024);
        assert_eq!(Store::sector_addr(43), 1024 + 24);
    }

    #[test]
    fn write_stop_rounds_up_to_a_page_boundary() {
        assert_eq!(Store::write_stop(0), 0);
        assert_eq!(Store::write_stop(1), 42);
        assert_eq!(Store::write_stop(42), 42);
        assert_eq!(Store::write_stop(43), 84);
    }
}
