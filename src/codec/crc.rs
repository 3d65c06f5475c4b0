// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame checksum (CRC-16/MODBUS)

use byteorder::{ByteOrder, LittleEndian};

/// Length of the trailing checksum.
pub const CRC_LEN: usize = 2;

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// The value is appended to a frame in little endian byte order.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            // if we followed clippy's suggestion to move out the crc >>= 1, the condition may not be met any more
            // the recommended action therefore makes no sense and it is better to allow this lint
            #[allow(clippy::branches_sharing_code)]
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Read the trailing checksum of a frame.
///
/// Returns `None` for frames too short to carry one.
#[must_use]
pub fn trailing_crc(frame: &[u8]) -> Option<u16> {
    let split = frame.len().checked_sub(CRC_LEN)?;
    Some(LittleEndian::read_u16(&frame[split..]))
}

/// Check the trailing checksum of a frame.
#[must_use]
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() <= CRC_LEN {
        return false;
    }
    let (data, _) = frame.split_at(frame.len() - CRC_LEN);
    trailing_crc(frame) == Some(crc16(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_crc16() {
        let msg = &[0x00, 0x08, 0x05];
        assert_eq!(crc16(msg), 0x03B6);

        let msg = &[0x00, 0x05, 0x00, 0x00];
        assert_eq!(crc16(msg), 0x2510);

        let msg = &[0x00, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02];
        assert_eq!(crc16(msg), 0x07B0);

        let msg = &[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02];
        assert_eq!(crc16(msg), 0x63B6);
    }

    #[test]
    fn verify_reference_frames() {
        assert!(verify(&[0x00, 0x08, 0x05, 0xB6, 0x03]));
        assert!(verify(&[0x00, 0x08, 0x11, 0x11, 0x4D, 0xBA]));
        assert!(verify(&[0x00, 0x08, 0x16, 0x30, 0x8F, 0x92]));
        assert!(verify(&[0x00, 0x08, 0x11, 0x40, 0x8C, 0x46]));
        // swapped checksum bytes
        assert!(!verify(&[0x00, 0x08, 0x05, 0x03, 0xB6]));
    }

    #[test]
    fn verify_short_frames() {
        assert!(!verify(&[]));
        assert!(!verify(&[0xFF]));
        assert!(!verify(&[0xFF, 0xFF]));
        assert_eq!(trailing_crc(&[0x01]), None);
        assert_eq!(trailing_crc(&[0xB6, 0x03]), Some(0x03B6));
    }

    #[test]
    fn reject_single_bit_errors() {
        let frames: [&[u8]; 4] = [
            &[0x00, 0x08, 0x05, 0xB6, 0x03],
            &[0x00, 0x05, 0x00, 0x00, 0x10, 0x25],
            &[0x00, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0xB0, 0x07],
            &[0x00, 0x08, 0x11, 0x21, 0x4D, 0xAE],
        ];
        for frame in frames {
            assert!(verify(frame));
            let mut buf = [0u8; 16];
            let buf = &mut buf[..frame.len()];
            for byte in 0..frame.len() {
                for bit in 0..8 {
                    buf.copy_from_slice(frame);
                    buf[byte] ^= 1 << bit;
                    assert!(!verify(buf), "bit {bit} of byte {byte} in {frame:02X?}");
                }
            }
        }
    }
}
