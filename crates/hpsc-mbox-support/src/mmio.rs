// Copyright 2024 The HPSC Mailbox Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Word-stride copies between a 64-byte envelope and a 16-word MMIO data
//! window (§4.1, §9). The mailbox DATA registers must be written and read
//! 32 bits at a time; a byte-wise `memcpy` is not portable across this
//! peripheral, so every caller goes through these two functions instead of
//! rolling its own loop.

use crate::{ENVELOPE_WORDS, RawEnvelope};

/// Copies `envelope` into the 16 DATA words at `mmio`, one `write_volatile`
/// 32-bit store per word, least-significant byte first per the wire format
/// (§6).
///
/// # Safety
/// `mmio` must point at `ENVELOPE_WORDS` consecutive, writable 32-bit MMIO
/// registers.
pub unsafe fn write_envelope(mmio: *mut u32, envelope: &RawEnvelope) {
    for i in 0..ENVELOPE_WORDS {
        let word = u32::from_le_bytes([
            envelope[i * 4],
            envelope[i * 4 + 1],
            envelope[i * 4 + 2],
            envelope[i * 4 + 3],
        ]);
        mmio.add(i).write_volatile(word);
    }
}

/// Reads the 16 DATA words at `mmio` into a fresh envelope, one
/// `read_volatile` 32-bit load per word.
///
/// # Safety
/// `mmio` must point at `ENVELOPE_WORDS` consecutive, readable 32-bit MMIO
/// registers.
pub unsafe fn read_envelope(mmio: *const u32) -> RawEnvelope {
    let mut envelope = [0u8; crate::ENVELOPE_LEN];
    for i in 0..ENVELOPE_WORDS {
        let word = mmio.add(i).read_volatile();
        envelope[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_fake_register_window() {
        let mut regs = [0u32; ENVELOPE_WORDS];
        let mut envelope = [0u8; 64];
        for (i, b) in envelope.iter_mut().enumerate() {
            *b = i as u8;
        }
        unsafe {
            write_envelope(regs.as_mut_ptr(), &envelope);
        }
        assert_eq!(regs[0], u32::from_le_bytes([0, 1, 2, 3]));
        let back = unsafe { read_envelope(regs.as_ptr()) };
        assert_eq!(back, envelope);
        let _ = &mut envelope;
    }
}
