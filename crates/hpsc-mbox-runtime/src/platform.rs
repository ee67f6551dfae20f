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

//! Per-link memory map: the bank's MMIO base and the two shared-memory
//! regions SHMem-Transport polls, plus the allocation-table names this
//! link's user-facing devices claim. The addresses below are placeholders —
//! a concrete platform integration supplies its own memory map, the same
//! way `hpsc-mbox-alloc`'s own `BANK`/`CLIENTS` tables are meant to be
//! replaced or extended per board.

pub use hpsc_mbox_alloc::platform::{BANK, CLIENTS, KERNEL_INBOUND, KERNEL_OUTBOUND};

cfg_if::cfg_if! {
    if #[cfg(feature = "trch_rtps")] {
        pub const MMIO_BASE: usize = 0x3000_0000;
        pub const SHMEM_OUT_MESSAGE: usize = 0x3010_0000;
        pub const SHMEM_OUT_STATUS: usize = 0x3010_0040;
        pub const SHMEM_IN_MESSAGE: usize = 0x3010_0044;
        pub const SHMEM_IN_STATUS: usize = 0x3010_0084;

        /// Names this link's user-facing devices claim from `CLIENTS`
        /// (§6). Count and names vary per platform, so the `trch_hpps`
        /// branch below declares its own array rather than padding to a
        /// shared length.
        pub const USER_DEVICE_COUNT: usize = 2;
        pub const USER_DEVICE_NAMES: [&str; USER_DEVICE_COUNT] = ["mbox-user-0", "mbox-user-1"];
    } else if #[cfg(feature = "trch_hpps")] {
        pub const MMIO_BASE: usize = 0x3400_0000;
        pub const SHMEM_OUT_MESSAGE: usize = 0x3410_0000;
        pub const SHMEM_OUT_STATUS: usize = 0x3410_0040;
        pub const SHMEM_IN_MESSAGE: usize = 0x3410_0044;
        pub const SHMEM_IN_STATUS: usize = 0x3410_0084;

        pub const USER_DEVICE_COUNT: usize = 1;
        pub const USER_DEVICE_NAMES: [&str; USER_DEVICE_COUNT] = ["mbox-user-0"];
    }
}

pub const SHMEM_POLL_INTERVAL_MS: u32 = 5;
