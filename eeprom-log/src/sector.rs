use bitfield_struct::bitfield;
use crc::{CRC_8_MAXIM_DOW, Crc};
use zerocopy::{Immutable, IntoBytes};

/// CRC algorithm shared by every sector, run over the flag byte followed
/// by the full payload.
const SECTOR_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// Flag byte of a sector header.
///
/// An erased flash byte (0xff) doubles as the free-sector marker, which
/// is why file numbers stop at 126: file 127 with the tombstone bit set
/// would be indistinguishable from an erased sector.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub(crate) struct SectorFlag {
    /// File number the sector belongs to.
    #[bits(7)]
    pub file_nr: u8,
    /// The sector marks its file as erased.
    pub tombstone: bool,
}

impl SectorFlag {
    /// Raw value of an erased header byte.
    pub(crate) const FREE: u8 = 0xff;

    /// Whether the sector was never written.
    pub(crate) fn is_free(self) -> bool {
        self.into_bits() == Self::FREE
    }
}

/// CRC8 of a sector as stored on flash.
pub(crate) fn sector_crc(flag: u8, data: &[u8]) -> u8 {
    let mut digest = SECTOR_CRC.digest();
    digest.update(&[flag]);
    digest.update(data);
    digest.finalize()
}

/// On-flash image of one sector, header bytes first.
///
/// Appends program the whole image with a single flash operation; an
/// interrupted write must never leave a header without its payload.
#[derive(IntoBytes, Immutable)]
#[repr(C)]
pub(crate) struct SectorImage<const DATA: usize> {
    pub flag: u8,
    pub crc: u8,
    pub data: [u8; DATA],
}

/// One sector read back from flash.
pub(crate) struct RawSector<const DATA: usize> {
    pub flag: SectorFlag,
    pub crc: u8,
    pub data: [u8; DATA],
}

impl<const DATA: usize> RawSector<DATA> {
    /// Whether the stored CRC matches the stored bytes.
    pub(crate) fn is_valid(&self) -> bool {
        self.crc == sector_crc(self.flag.into_bits(), &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_packs_file_nr_and_tombstone() {
        let flag = SectorFlag::new().with_file_nr(5).with_tombstone(true);
        assert_eq!(flag.into_bits(), 0x85);
        assert_eq!(flag.file_nr(), 5);
        assert!(flag.tombstone());
        assert!(!flag.is_free());
    }

    #[test]
    fn erased_byte_reads_as_free() {
        let flag = SectorFlag::from_bits(0xff);
        assert!(flag.is_free());
        assert!(!SectorFlag::from_bits(0x7f).is_free());
    }

    #[test]
    fn crc_covers_flag_and_payload() {
        let data = [0xde, 0xad, 0xbe, 0xef];
        let crc = sector_crc(0x02, &data);
        assert_ne!(crc, sector_crc(0x03, &data));
        assert_ne!(crc, sector_crc(0x02, &[0xde, 0xad, 0xbe, 0xee]));

        let sector = RawSector::<4> {
            flag: SectorFlag::from_bits(0x02),
            crc,
            data,
        };
        assert!(sector.is_valid());
        let corrupt = RawSector::<4> {
            crc: crc ^ 0x40,
            ..sector
        };
        assert!(!corrupt.is_valid());
    }

    #[test]
    fn crc_matches_the_maxim_check_value() {
        assert_eq!(SECTOR_CRC.checksum(b"123456789"), 0xa1);
    }
}
