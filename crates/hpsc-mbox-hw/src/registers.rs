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

//! Register layout for one mailbox instance (§4.1). Offsets are from the
//! instance base; EVENT-CAUSE/EVENT-CLEAR and EVENT-STATUS/EVENT-SET share
//! an address each, read meaning one thing and write meaning another.

use modular_bitfield::prelude::*;

pub const INSTANCE_STRIDE_BYTES: usize = 0x50;
pub const INSTANCE_STRIDE_WORDS: usize = INSTANCE_STRIDE_BYTES / 4;
pub const INSTANCES_PER_BLOCK: usize = 32;

const CONFIG_OFFSET: usize = 0x00 / 4;
const EVENT_CAUSE_OFFSET: usize = 0x04 / 4;
const EVENT_STATUS_OFFSET: usize = 0x08 / 4;
const INT_ENABLE_OFFSET: usize = 0x0C / 4;
const DATA_OFFSET: usize = 0x10 / 4;

pub const EVENT_A: u32 = 0x1;
pub const EVENT_B: u32 = 0x2;

/// CONFIG register: `owner[15:8]`, `src[23:16]`, `dst[31:24]`, unsecure
/// flag at bit 0 (§4.1).
#[bitfield]
#[derive(Copy, Clone)]
pub struct Config {
    pub unsecure: bool,
    #[skip]
    __: B7,
    pub owner: u8,
    pub src: u8,
    pub dst: u8,
}

/// Raw register access for one instance window.
#[derive(Copy, Clone)]
pub struct InstanceRegs {
    base: *mut u32,
}

impl InstanceRegs {
    /// # Safety
    /// `base` must point at the start of a live, writable instance register
    /// window (CONFIG first, DATA last).
    pub const unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }

    pub unsafe fn read_config(&self) -> Config {
        Config::from_bytes(self.base.add(CONFIG_OFFSET).read_volatile().to_ne_bytes())
    }

    pub unsafe fn write_config(&self, config: Config) {
        self.base.add(CONFIG_OFFSET).write_volatile(u32::from_ne_bytes(config.into_bytes()))
    }

    pub unsafe fn event_cause(&self) -> u32 {
        self.base.add(EVENT_CAUSE_OFFSET).read_volatile()
    }

    pub unsafe fn event_status(&self) -> u32 {
        self.base.add(EVENT_STATUS_OFFSET).read_volatile()
    }

    /// Clears the named event(s). CAUSE and STATUS mirror the same
    /// underlying flags (§4.1: "whose EVENT-CAUSE (or STATUS) shows the
    /// event"), so both views are updated together.
    pub unsafe fn event_clear(&self, bits: u32) {
        let cause = self.base.add(EVENT_CAUSE_OFFSET);
        let status = self.base.add(EVENT_STATUS_OFFSET);
        cause.write_volatile(cause.read_volatile() & !bits);
        status.write_volatile(status.read_volatile() & !bits);
    }

    /// Pulses the named event(s), visible through either CAUSE or STATUS.
    pub unsafe fn event_set(&self, bits: u32) {
        let cause = self.base.add(EVENT_CAUSE_OFFSET);
        let status = self.base.add(EVENT_STATUS_OFFSET);
        cause.write_volatile(cause.read_volatile() | bits);
        status.write_volatile(status.read_volatile() | bits);
    }

    pub unsafe fn int_enable(&self) -> u32 {
        self.base.add(INT_ENABLE_OFFSET).read_volatile()
    }

    pub unsafe fn set_int_enable(&self, bits: u32) {
        self.base.add(INT_ENABLE_OFFSET).write_volatile(bits)
    }

    pub unsafe fn or_int_enable(&self, bits: u32) {
        self.set_int_enable(self.int_enable() | bits)
    }

    pub unsafe fn and_not_int_enable(&self, bits: u32) {
        self.set_int_enable(self.int_enable() & !bits)
    }

    pub unsafe fn data_ptr(&self) -> *mut u32 {
        self.base.add(DATA_OFFSET)
    }
}
