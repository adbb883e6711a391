//! Extension register encryption
//!
//! Hosts that talk to extensions first write a key into the extension
//! register's key window, then set the encryption byte to 0xAA. From then on
//! every read of the extension register is scrambled with a position-keyed
//! byte transform:
//!
//! ```text
//! encrypted[i] = (plain[i] - ft[addr % 8]) ^ sb[addr % 8]
//! plain[i]     = (encrypted[i] ^ sb[addr % 8]) + ft[addr % 8]
//! ```
//!
//! The two 8-byte tables are derived from the key window contents. An
//! all-zero key yields 0x17 in every table slot, which is the key most
//! homebrew hosts use.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::wiimote::constants::{EXT_ENCRYPTION_KEY, EXT_KEY_WINDOW_LEN};

/// Table value produced by an all-zero key
const ZERO_KEY_TABLE: u8 = 0x17;

/// Offsets (inside the extension register) of the key window
pub const KEY_WINDOW: Range<usize> = EXT_ENCRYPTION_KEY..EXT_ENCRYPTION_KEY + EXT_KEY_WINDOW_LEN;

const FULL_WINDOW_MASK: u16 = (1 << EXT_KEY_WINDOW_LEN) - 1;

#[inline]
fn ror8(value: u8, amount: u8) -> u8 {
    value.rotate_right(u32::from(amount & 7))
}

/// Multiply in GF(2^8) with the 0x11B reduction polynomial
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80 != 0;
        a <<= 1;
        if carry {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse in GF(2^8) (a^254); zero maps to zero
fn gf_inverse(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exponent = 254u8;
    while exponent != 0 {
        if exponent & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exponent >>= 1;
    }
    if a == 0 {
        0
    } else {
        result
    }
}

/// Derived transform tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionKey {
    pub ft: [u8; 8],
    pub sb: [u8; 8],
}

impl Default for ExtensionKey {
    fn default() -> Self {
        Self::generate(&[0; EXT_KEY_WINDOW_LEN])
    }
}

impl ExtensionKey {
    /// Derive the tables from the key window bytes.
    ///
    /// Deterministic, and every mixing step maps zero to zero, so the
    /// all-zero window lands on the 0x17 tables.
    pub fn generate(window: &[u8; EXT_KEY_WINDOW_LEN]) -> Self {
        let n = EXT_KEY_WINDOW_LEN;
        let mut t = [0u8; EXT_KEY_WINDOW_LEN];
        for (slot, &byte) in t.iter_mut().zip(window.iter().rev()) {
            *slot = gf_inverse(byte);
        }

        let mut ft = [0u8; 8];
        let mut sb = [0u8; 8];
        for j in 0..8 {
            let mixed = ror8(t[j] ^ t[(j + 4) % n], t[(j + 7) % n]).wrapping_sub(t[(j + 10) % n]);
            ft[j] = ZERO_KEY_TABLE ^ mixed;
            sb[j] = ZERO_KEY_TABLE ^ ror8(t[(j + 2) % n] ^ mixed, t[(j + 11) % n]) ^ t[(j + 6) % n];
        }

        Self { ft, sb }
    }

    /// Scramble `data` as read from extension address `address` onward
    pub fn encrypt(&self, data: &mut [u8], address: usize) {
        for (i, byte) in data.iter_mut().enumerate() {
            let slot = (address + i) % 8;
            *byte = byte.wrapping_sub(self.ft[slot]) ^ self.sb[slot];
        }
    }

    /// Undo [`encrypt`](Self::encrypt), as the host does on receipt
    pub fn decrypt(&self, data: &mut [u8], address: usize) {
        for (i, byte) in data.iter_mut().enumerate() {
            let slot = (address + i) % 8;
            *byte = (*byte ^ self.sb[slot]).wrapping_add(self.ft[slot]);
        }
    }
}

/// Key state of the extension register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionEncryption {
    key: ExtensionKey,
    /// One bit per key window byte written since the last regeneration
    pending: u16,
    /// Number of times the key was regenerated
    generation: u32,
}

impl ExtensionEncryption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> &ExtensionKey {
        &self.key
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Record an extension register write covering `range`.
    ///
    /// The part of the write that overlaps the key window is marked written.
    /// Once every window byte has been (re)written the key is regenerated
    /// from `extension_key` (the window contents). Returns true on
    /// regeneration.
    pub fn on_write(&mut self, range: Range<usize>, extension_key: &[u8]) -> bool {
        let overlap = range.start.max(KEY_WINDOW.start)..range.end.min(KEY_WINDOW.end);
        if overlap.is_empty() {
            return false;
        }

        for offset in overlap {
            self.pending |= 1 << (offset - KEY_WINDOW.start);
        }
        if self.pending != FULL_WINDOW_MASK {
            return false;
        }

        let mut window = [0u8; EXT_KEY_WINDOW_LEN];
        window.copy_from_slice(&extension_key[..EXT_KEY_WINDOW_LEN]);
        self.key = ExtensionKey::generate(&window);
        self.pending = 0;
        self.generation = self.generation.wrapping_add(1);
        true
    }

    /// Encrypt a block read from the extension register at `offset`
    pub fn transform(&self, data: &mut [u8], offset: usize) {
        self.key.encrypt(data, offset);
    }
}
