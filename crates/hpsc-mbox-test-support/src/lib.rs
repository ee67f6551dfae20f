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

//! Shared test fakes for the end-to-end scenarios in §8: a fake MMIO bank
//! backed by a leaked host-memory register window, a fake clock that
//! records simulated delays instead of sleeping, and a pair of fake
//! shared-memory regions for `SHMem-Transport`.

use std::cell::Cell;

use hpsc_mbox_hw::registers::{InstanceRegs, EVENT_A, EVENT_B, INSTANCES_PER_BLOCK, INSTANCE_STRIDE_WORDS};
use hpsc_mbox_hw::Bank;
use hpsc_mbox_support::ENVELOPE_LEN;
use hpsc_shmem_transport::{STATUS_ACK, STATUS_NEW};

/// A bank backed by a leaked, zeroed register window, plus raw access to
/// individual instances for poking the remote side of the protocol the way
/// a real peer would (setting event bits directly, reading DATA words).
pub struct FakeBank {
    pub bank: &'static Bank,
    regs_ptr: *mut u32,
}

impl FakeBank {
    pub fn new() -> Self {
        let regs: &'static mut [u32; INSTANCES_PER_BLOCK * INSTANCE_STRIDE_WORDS] =
            Box::leak(Box::new([0u32; INSTANCES_PER_BLOCK * INSTANCE_STRIDE_WORDS]));
        let regs_ptr = regs.as_mut_ptr();
        let bank = Box::leak(Box::new(unsafe { Bank::new(regs_ptr) }));
        Self { bank, regs_ptr }
    }

    /// Raw register access for instance `index`, for simulating what the
    /// remote end of the wire would do (pulsing event A/B, reading DATA).
    pub fn instance_regs(&self, index: u8) -> InstanceRegs {
        unsafe { InstanceRegs::new(self.regs_ptr.add(index as usize * INSTANCE_STRIDE_WORDS)) }
    }

    /// Simulates the remote side delivering a message on `index`: writes
    /// `payload` to DATA and pulses event A, then runs the bank's IRQ
    /// handler for `irq_idx` as real hardware would.
    pub fn simulate_incoming(&self, index: u8, irq_idx: u8, payload: &[u8; ENVELOPE_LEN]) {
        let regs = self.instance_regs(index);
        unsafe {
            hpsc_mbox_support::mmio::write_envelope(regs.data_ptr(), payload);
            regs.event_set(EVENT_A);
        }
        self.bank.handle_irq(irq_idx);
    }

    /// Simulates the remote side acking/nacking a send on `index`.
    pub fn simulate_ack(&self, index: u8, irq_idx: u8) {
        unsafe { self.instance_regs(index).event_set(EVENT_B) };
        self.bank.handle_irq(irq_idx);
    }
}

impl Default for FakeBank {
    fn default() -> Self { Self::new() }
}

/// Records simulated delays instead of sleeping, so retry-loop and
/// poll-loop tests can assert on elapsed time without a real clock or real
/// wall-clock waits (§8 scenario 5).
#[derive(Default)]
pub struct FakeClock {
    elapsed_us: Cell<u64>,
}

impl FakeClock {
    pub fn new() -> Self { Self { elapsed_us: Cell::new(0) } }

    pub fn delay_us(&self, us: u32) { self.elapsed_us.set(self.elapsed_us.get() + us as u64); }

    pub fn sleep_ms(&self, ms: u32) { self.elapsed_us.set(self.elapsed_us.get() + ms as u64 * 1000); }

    pub fn elapsed_us(&self) -> u64 { self.elapsed_us.get() }
}

/// A leaked pair of fake shared-memory regions wired into a
/// `hpsc_shmem_transport::SharedRegion`-compatible layout, plus raw access
/// for simulating the remote side of the `in` region.
pub struct FakeShmemRegions {
    pub out_message: &'static mut [u8; ENVELOPE_LEN],
    pub out_status: &'static mut u32,
    pub in_message: &'static mut [u8; ENVELOPE_LEN],
    pub in_status: &'static mut u32,
}

impl FakeShmemRegions {
    pub fn new() -> Self {
        Self {
            out_message: Box::leak(Box::new([0u8; ENVELOPE_LEN])),
            out_status: Box::leak(Box::new(0u32)),
            in_message: Box::leak(Box::new([0u8; ENVELOPE_LEN])),
            in_status: Box::leak(Box::new(0u32)),
        }
    }

    /// Raw pointers suitable for `hpsc_shmem_transport::ShmemTransport::new`.
    pub fn out_ptrs(&mut self) -> (*mut u8, *mut u32) {
        (self.out_message.as_mut_ptr(), self.out_status as *mut u32)
    }

    /// Raw pointers suitable for `hpsc_shmem_transport::ShmemTransport::new`.
    pub fn in_ptrs(&mut self) -> (*mut u8, *mut u32) {
        (self.in_message.as_mut_ptr(), self.in_status as *mut u32)
    }

    /// Simulates the remote side delivering a message on the `in` region.
    pub fn simulate_incoming(&mut self, payload: &[u8; ENVELOPE_LEN]) {
        *self.in_message = *payload;
        *self.in_status = STATUS_NEW;
    }

    pub fn out_new_is_set(&self) -> bool { *self.out_status & STATUS_NEW != 0 }
    pub fn in_ack_is_set(&self) -> bool { *self.in_status & STATUS_ACK != 0 }
}

impl Default for FakeShmemRegions {
    fn default() -> Self { Self::new() }
}
