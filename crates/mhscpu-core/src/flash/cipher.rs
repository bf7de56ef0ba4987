//! Inline block transform applied to page payloads
//!
//! The controller can scramble program data in 32-byte blocks before it
//! reaches the flash. The two modes here are placeholder transforms with
//! fixed key material; they are invertible but offer no security.
//!
//! Only whole blocks can be transformed. [`encipher`] therefore returns the
//! whole-block part of a payload and, if the length is not a multiple of
//! 32, a separate padded tail block. The caller programs the two parts as
//! distinct bus transfers.

use alloc::vec::Vec;

/// Size of one cipher block in bytes
pub const CIPHER_BLOCK_SIZE: usize = 32;

/// Fill value for the unused part of a tail block
pub const TAIL_PAD: u8 = 0xFF;

const HALF: usize = CIPHER_BLOCK_SIZE / 2;

const KEY_A: [u8; HALF] = [
    0x3C, 0xA1, 0x5E, 0x07, 0x92, 0x4B, 0xD8, 0x61, 0x1F, 0xE4, 0x7A, 0x36, 0xC5, 0x08, 0xBB, 0x54,
];
const KEY_B: [u8; HALF] = [
    0x8D, 0x12, 0x6F, 0xF0, 0x25, 0x9A, 0x43, 0xCE, 0x71, 0x0C, 0xB7, 0x58, 0xE9, 0x34, 0x86, 0x2B,
];

/// Transform applied by the controller while programming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CipherMode {
    /// Program data as-is
    #[default]
    None,
    /// First block transform (AES slot on the controller)
    ModeA,
    /// Second block transform (SM4 slot on the controller)
    ModeB,
}

/// Result of transforming a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enciphered {
    /// Transformed whole blocks, `payload.len() / 32 * 32` bytes
    pub body: Vec<u8>,
    /// Transformed, padded final partial block
    pub tail: Option<[u8; CIPHER_BLOCK_SIZE]>,
}

impl Enciphered {
    /// Number of bytes that end up on the flash, padding included
    pub fn programmed_len(&self) -> usize {
        self.body.len() + self.tail.map_or(0, |t| t.len())
    }

    /// Body and tail as one contiguous image
    pub fn to_image(&self) -> Vec<u8> {
        let mut image = self.body.clone();
        if let Some(tail) = &self.tail {
            image.extend_from_slice(tail);
        }
        image
    }
}

/// Number of bytes programmed for `len` payload bytes in `mode`
pub fn padded_len(len: usize, mode: CipherMode) -> usize {
    match mode {
        CipherMode::None => len,
        _ => len.div_ceil(CIPHER_BLOCK_SIZE) * CIPHER_BLOCK_SIZE,
    }
}

/// Transform `payload` into whole blocks plus an optional padded tail
///
/// With [`CipherMode::None`] the body is a copy of the payload and there is
/// never a tail.
pub fn encipher(payload: &[u8], mode: CipherMode) -> Enciphered {
    if mode == CipherMode::None {
        return Enciphered {
            body: payload.to_vec(),
            tail: None,
        };
    }

    let whole = payload.len() / CIPHER_BLOCK_SIZE * CIPHER_BLOCK_SIZE;
    let mut body = payload[..whole].to_vec();
    for (index, block) in body.chunks_exact_mut(CIPHER_BLOCK_SIZE).enumerate() {
        encipher_block(block, mode, index as u32);
    }

    let rest = &payload[whole..];
    let tail = if rest.is_empty() {
        None
    } else {
        let mut block = [TAIL_PAD; CIPHER_BLOCK_SIZE];
        block[..rest.len()].copy_from_slice(rest);
        encipher_block(&mut block, mode, (whole / CIPHER_BLOCK_SIZE) as u32);
        Some(block)
    };

    Enciphered { body, tail }
}

/// Undo [`encipher`] on an image read back from flash
///
/// `image` holds whole blocks, padding included.
pub fn decipher(image: &[u8], mode: CipherMode) -> Vec<u8> {
    let mut out = image.to_vec();
    if mode != CipherMode::None {
        for (index, block) in out.chunks_exact_mut(CIPHER_BLOCK_SIZE).enumerate() {
            decipher_block(block, mode, index as u32);
        }
    }
    out
}

// Each block is handled as two 16-byte halves in reversed byte order.
fn reverse_halves(block: &mut [u8]) {
    block[..HALF].reverse();
    block[HALF..].reverse();
}

fn tweak(index: u32) -> u8 {
    (index as u8).wrapping_mul(0x1D) ^ (index >> 8) as u8
}

fn encipher_block(block: &mut [u8], mode: CipherMode, index: u32) {
    debug_assert_eq!(block.len(), CIPHER_BLOCK_SIZE);
    let t = tweak(index);
    match mode {
        CipherMode::None => {}
        CipherMode::ModeA => {
            reverse_halves(block);
            for (i, b) in block.iter_mut().enumerate() {
                *b ^= KEY_A[i % HALF] ^ t;
            }
        }
        CipherMode::ModeB => {
            reverse_halves(block);
            for (i, b) in block.iter_mut().enumerate() {
                *b = b.rotate_left(3) ^ KEY_B[i % HALF] ^ t;
            }
            block.rotate_left(HALF);
        }
    }
}

fn decipher_block(block: &mut [u8], mode: CipherMode, index: u32) {
    debug_assert_eq!(block.len(), CIPHER_BLOCK_SIZE);
    let t = tweak(index);
    match mode {
        CipherMode::None => {}
        CipherMode::ModeA => {
            for (i, b) in block.iter_mut().enumerate() {
                *b ^= KEY_A[i % HALF] ^ t;
            }
            reverse_halves(block);
        }
        CipherMode::ModeB => {
            block.rotate_left(HALF);
            for (i, b) in block.iter_mut().enumerate() {
                *b = (*b ^ KEY_B[i % HALF] ^ t).rotate_right(3);
            }
            reverse_halves(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_whole_blocks_have_no_tail() {
        let out = encipher(&pattern(96), CipherMode::ModeA);
        assert_eq!(out.body.len(), 96);
        assert!(out.tail.is_none());
        assert_eq!(out.programmed_len(), 96);
    }

    #[test]
    fn test_partial_block_goes_to_tail() {
        let payload = pattern(70);
        let out = encipher(&payload, CipherMode::ModeB);
        assert_eq!(out.body.len(), 64);
        assert!(out.tail.is_some());
        assert_eq!(out.programmed_len(), padded_len(70, CipherMode::ModeB));

        let plain = decipher(&out.to_image(), CipherMode::ModeB);
        assert_eq!(&plain[..70], &payload[..]);
        assert!(plain[70..].iter().all(|&b| b == TAIL_PAD));
    }

    #[test]
    fn test_modes_differ() {
        let payload = pattern(32);
        let a = encipher(&payload, CipherMode::ModeA);
        let b = encipher(&payload, CipherMode::ModeB);
        assert_ne!(a.body, payload);
        assert_ne!(b.body, payload);
        assert_ne!(a.body, b.body);
        assert_eq!(decipher(&a.body, CipherMode::ModeA), payload);
    }

    #[test]
    fn test_none_is_identity() {
        let payload = pattern(45);
        let out = encipher(&payload, CipherMode::None);
        assert_eq!(out.body, payload);
        assert!(out.tail.is_none());
        assert_eq!(padded_len(45, CipherMode::None), 45);
    }

    #[test]
    fn test_block_position_matters() {
        let payload = [0x5Au8; 64];
        let out = encipher(&payload, CipherMode::ModeA);
        assert_ne!(out.body[..32], out.body[32..]);
    }
}
