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

//! Shared-memory transport (§4.5): two fixed-length regions, `in` and
//! `out`, each a 64-byte message slot plus a status word carrying `NEW` and
//! `ACK` bits (§3, §6). Registered with the notification bus at
//! `Priority::Shmem`, above `Priority::Mailbox`.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicBool, Ordering};

use hpsc_mbox_support::{MboxError, RawEnvelope, ENVELOPE_LEN};
use hpsc_notification_bus::{NotificationBus, Priority, Transport};

pub const STATUS_NEW: u32 = 0x1;
pub const STATUS_ACK: u32 = 0x2;

/// One direction's worth of shared-memory state: a 64-byte message slot
/// immediately followed by a 32-bit status word (§6). Plain memory, not a
/// 32-bit-only peripheral register window, so byte-wise volatile access is
/// fine here — unlike MBox-HW's DATA registers (§9), nothing requires
/// 32-bit-stride access to this layout.
pub struct SharedRegion {
    message: *mut u8,
    status: *mut u32,
}

// SAFETY-relevant: the region is shared memory the platform maps once at
// init and hands to exactly one `ShmemTransport`; all access is volatile.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// # Safety
    /// `message` must point at `ENVELOPE_LEN` live, aligned bytes, and
    /// `status` at a live 32-bit status word immediately following it, both
    /// outliving the `SharedRegion`.
    pub const unsafe fn new(message: *mut u8, status: *mut u32) -> Self { Self { message, status } }

    unsafe fn status(&self) -> u32 { self.status.read_volatile() }
    unsafe fn set_status(&self, bits: u32) { self.status.write_volatile(bits) }

    unsafe fn read_message(&self) -> RawEnvelope {
        let mut buf = [0u8; ENVELOPE_LEN];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.message.add(i).read_volatile();
        }
        buf
    }

    unsafe fn write_message(&self, msg: &RawEnvelope) {
        for (i, b) in msg.iter().enumerate() {
            self.message.add(i).write_volatile(*b);
        }
    }
}

/// The shared-memory transport: an `out` region this side writes, an `in`
/// region a background poll task drains (§4.5, §9).
pub struct ShmemTransport {
    out: SharedRegion,
    in_: SharedRegion,
    bus: &'static NotificationBus,
    poll_interval_ms: u32,
    stop: AtomicBool,
}

impl ShmemTransport {
    /// # Safety
    /// See `SharedRegion::new`; `out_*` and `in_*` must not alias each
    /// other or any other live object.
    pub const unsafe fn new(
        out_message: *mut u8,
        out_status: *mut u32,
        in_message: *mut u8,
        in_status: *mut u32,
        bus: &'static NotificationBus,
        poll_interval_ms: u32,
    ) -> Self {
        Self {
            out: SharedRegion::new(out_message, out_status),
            in_: SharedRegion::new(in_message, in_status),
            bus,
            poll_interval_ms,
            stop: AtomicBool::new(false),
        }
    }

    /// Registers this transport with the bus at `Priority::Shmem`.
    pub fn register(&'static self) -> Result<(), MboxError> { self.bus.register(Priority::Shmem, self) }

    /// One iteration of the receive poll (§4.5): if `NEW` is set on the
    /// `in` region, hands the payload to the bus, then clears `NEW` and
    /// sets `ACK`. Returns whether a message was drained, so a caller
    /// driving this deterministically (tests, or a scheduler that wants to
    /// back off when idle) can tell.
    pub fn poll_once(&self) -> bool {
        unsafe {
            let status = self.in_.status();
            if status & STATUS_NEW == 0 {
                return false;
            }
            let msg = self.in_.read_message();
            let _ = self.bus.recv(&msg);
            self.in_.set_status((status & !STATUS_NEW) | STATUS_ACK);
        }
        true
    }

    /// Requests that `run_poll_loop` exit at its next wake boundary (§5,
    /// §9: a cooperative stop flag, not a hard cancellation).
    pub fn request_stop(&self) { self.stop.store(true, Ordering::Relaxed); }

    pub fn stop_requested(&self) -> bool { self.stop.load(Ordering::Relaxed) }

    /// The long-lived receive task (§4.5, §9): wakes every
    /// `poll_interval_ms`, checked via the injected `sleep_ms`, and checks
    /// the cooperative stop flag at each wake boundary rather than busy
    /// looping.
    pub fn run_poll_loop(&self, sleep_ms: impl Fn(u32)) {
        while !self.stop_requested() {
            self.poll_once();
            sleep_ms(self.poll_interval_ms);
        }
    }
}

impl Transport for ShmemTransport {
    fn name(&self) -> &'static str { "shmem" }

    /// Sender protocol on the `out` region (§4.5): `TryAgain` if `NEW` is
    /// already set, otherwise copy the payload and set `NEW` (§8 scenario:
    /// must not overwrite the slot when busy).
    fn send(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
        unsafe {
            let status = self.out.status();
            if status & STATUS_NEW != 0 {
                return Err(MboxError::TryAgain);
            }
            self.out.write_message(msg);
            self.out.set_status(status | STATUS_NEW);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;
    use hpsc_notification_bus::InboundSink;

    struct Region {
        message: [u8; ENVELOPE_LEN],
        status: u32,
    }

    fn fixture(bus: &'static NotificationBus) -> (&'static mut Region, &'static mut Region, ShmemTransport) {
        let out: &'static mut Region =
            std::boxed::Box::leak(std::boxed::Box::new(Region { message: [0u8; ENVELOPE_LEN], status: 0 }));
        let in_: &'static mut Region =
            std::boxed::Box::leak(std::boxed::Box::new(Region { message: [0u8; ENVELOPE_LEN], status: 0 }));
        let transport = unsafe {
            ShmemTransport::new(
                out.message.as_mut_ptr(),
                &mut out.status as *mut u32,
                in_.message.as_mut_ptr(),
                &mut in_.status as *mut u32,
                bus,
                5,
            )
        };
        (out, in_, transport)
    }

    #[test]
    fn send_sets_new_and_writes_the_payload() {
        static BUS: NotificationBus = NotificationBus::new();
        let (out, _in, transport) = fixture(&BUS);
        transport.send(&[9u8; 64]).unwrap();
        assert_eq!(out.status & STATUS_NEW, STATUS_NEW);
        assert_eq!(out.message, [9u8; 64]);
    }

    #[test]
    fn send_on_a_busy_region_is_try_again_and_does_not_overwrite() {
        static BUS: NotificationBus = NotificationBus::new();
        let (out, _in, transport) = fixture(&BUS);
        transport.send(&[1u8; 64]).unwrap();
        assert_eq!(transport.send(&[2u8; 64]), Err(MboxError::TryAgain));
        assert_eq!(out.message, [1u8; 64]);
    }

    struct RecordingSink(AtomicUsize, spin::Mutex<RawEnvelope>);
    impl InboundSink for RecordingSink {
        fn recv(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            *self.1.lock() = *msg;
            Ok(())
        }
    }

    #[test]
    fn poll_once_drains_a_new_message_and_sets_ack() {
        static BUS: NotificationBus = NotificationBus::new();
        static SINK: RecordingSink = RecordingSink(AtomicUsize::new(0), spin::Mutex::new([0u8; 64]));
        BUS.set_sink(&SINK);
        let (_out, in_, transport) = fixture(&BUS);
        in_.message = [7u8; 64];
        in_.status = STATUS_NEW;

        assert!(transport.poll_once());
        assert_eq!(SINK.0.load(Ordering::SeqCst), 1);
        assert_eq!(*SINK.1.lock(), [7u8; 64]);
        assert_eq!(in_.status, STATUS_ACK);
        assert!(!transport.poll_once());
    }

    #[test]
    fn run_poll_loop_stops_at_the_next_wake_after_a_stop_request() {
        static BUS: NotificationBus = NotificationBus::new();
        let (_out, _in, transport) = fixture(&BUS);
        let wakes = std::cell::Cell::new(0);
        transport.request_stop();
        transport.run_poll_loop(|_ms| wakes.set(wakes.get() + 1));
        assert_eq!(wakes.get(), 0);
    }
}
