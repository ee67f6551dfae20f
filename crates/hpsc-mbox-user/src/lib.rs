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

//! Character-device façade over a mailbox channel (§4.3, §6): one device
//! per instance, a one-message rx slot, a one-slot tx-ack status, and
//! non-blocking `read`/`write`/`poll` — readiness is reported through
//! `poll` rather than by blocking inside `read`, matching the back-pressure
//! scenario in §8 where an unready `read` returns `TryAgain` rather than
//! parking the caller.

#![cfg_attr(not(test), no_std)]

use core::fmt::Write as _;

use hpsc_mbox_alloc::{ChannelConfig, Direction};
use hpsc_mbox_channel::ChannelHandle;
use hpsc_mbox_hw::Bank;
use hpsc_mbox_support::{MboxError, RawEnvelope, RxCap, SendRequest, TxCap, TxOutcome, ENVELOPE_LEN};
use log::warn;
use spin::Mutex;

/// Notified when a device's rx or tx-ack flag transitions, so a poll loop
/// elsewhere can wake within one scheduling quantum (§8) instead of
/// busy-polling. Analogous to the UART driver's RX_NONEMPTY semaphore, but
/// expressed as a capability rather than a hardwired global.
pub trait Waker: Sync {
    fn wake(&self);
}

/// Readiness bits a poll loop checks (§6: "`poll` reports readable when a
/// payload or ack is pending and writable when no ack is outstanding").
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct PollStatus {
    pub readable: bool,
    pub writable: bool,
}

struct Inner {
    channel: Option<ChannelHandle<'static>>,
    direction: Option<Direction>,
    rx: Option<RawEnvelope>,
    tx_status: Option<u32>,
    tx_armed: bool,
    waker: Option<&'static dyn Waker>,
}

impl Inner {
    const fn closed() -> Self {
        Self { channel: None, direction: None, rx: None, tx_status: None, tx_armed: false, waker: None }
    }
}

/// One device file's worth of state: the rx slot, the tx-ack slot, and the
/// direction fixed at open (§3). `&'static` instances of this type double
/// as the `RxCap`/`TxCap` capability the underlying channel up-calls into.
pub struct MboxDevice {
    inner: Mutex<Inner>,
}

impl MboxDevice {
    pub const fn new() -> Self {
        Self { inner: Mutex::new(Inner::closed()) }
    }

    /// Opens the device over `bank`'s `instance`, claiming it in `direction`
    /// (§4.1's `open`, specialized: a receive callback is wired for
    /// `Incoming`, a tx-done callback for `Outgoing`).
    pub fn open(
        &'static self,
        bank: &'static Bank,
        instance: u8,
        cfg: ChannelConfig,
        direction: Direction,
    ) -> Result<(), MboxError> {
        let mut inner = self.inner.lock();
        if inner.direction.is_some() {
            return Err(MboxError::Busy);
        }
        let (rx_cap, tx_cap): (Option<&'static dyn RxCap>, Option<&'static dyn TxCap>) = match direction {
            Direction::Incoming => (Some(self), None),
            Direction::Outgoing => (None, Some(self)),
        };
        let handle = ChannelHandle::open(bank, instance, cfg, rx_cap, tx_cap)?;
        inner.channel = Some(handle);
        inner.direction = Some(direction);
        inner.rx = None;
        inner.tx_status = None;
        inner.tx_armed = false;
        Ok(())
    }

    /// Registers the waker to notify on the next readiness transition.
    /// There is only ever one current waiter per device file, matching the
    /// single-reader-per-fd model character devices present to user space.
    pub fn register_waker(&self, waker: &'static dyn Waker) {
        self.inner.lock().waker = Some(waker);
    }

    /// Writes up to 64 bytes to an outgoing device, issuing the payload
    /// send immediately (§6). Fails `Busy` if a previous send's ack hasn't
    /// arrived yet (at most one outstanding message per channel, §1).
    pub fn write(&self, buf: &[u8]) -> Result<usize, MboxError> {
        if buf.len() > ENVELOPE_LEN {
            return Err(MboxError::InvalidArgument);
        }
        let mut inner = self.inner.lock();
        match inner.direction {
            Some(Direction::Outgoing) => {
                if inner.tx_armed {
                    return Err(MboxError::Busy);
                }
                let mut payload = [0u8; ENVELOPE_LEN];
                payload[..buf.len()].copy_from_slice(buf);
                let channel = inner.channel.as_ref().ok_or(MboxError::NoDevice)?;
                channel.send(SendRequest::Send { payload })?;
                inner.tx_armed = true;
                inner.tx_status = None;
                Ok(buf.len())
            }
            Some(Direction::Incoming) => Err(MboxError::InvalidArgument),
            None => Err(MboxError::NoDevice),
        }
    }

    /// Reads the pending payload (incoming) or the pending 4-byte ack/nack
    /// status (outgoing). Non-blocking: returns `TryAgain` if nothing is
    /// ready yet (§8 scenario 2). The status is cleared on read: a second
    /// read before the next send sees `TryAgain` (§9 open question,
    /// resolved — see the design ledger).
    pub fn read(&self, out: &mut [u8]) -> Result<usize, MboxError> {
        let mut inner = self.inner.lock();
        match inner.direction {
            Some(Direction::Incoming) => {
                let payload = inner.rx.take().ok_or(MboxError::TryAgain)?;
                let channel = inner.channel.as_ref().ok_or(MboxError::NoDevice)?;
                channel.drain_rx_complete()?;
                let n = out.len().min(ENVELOPE_LEN);
                out[..n].copy_from_slice(&payload[..n]);
                Ok(n)
            }
            Some(Direction::Outgoing) => {
                if inner.tx_armed {
                    return Err(MboxError::TryAgain);
                }
                let status = inner.tx_status.take().ok_or(MboxError::TryAgain)?;
                let bytes = status.to_le_bytes();
                let n = out.len().min(bytes.len());
                out[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            None => Err(MboxError::NoDevice),
        }
    }

    /// Readiness snapshot (§6, §8's poll law).
    pub fn poll(&self) -> PollStatus {
        let inner = self.inner.lock();
        match inner.direction {
            Some(Direction::Incoming) => PollStatus { readable: inner.rx.is_some(), writable: false },
            Some(Direction::Outgoing) => {
                PollStatus { readable: inner.tx_status.is_some(), writable: !inner.tx_armed }
            }
            None => PollStatus::default(),
        }
    }

    /// Closes the device. If an incoming message arrived but was never
    /// drained, the channel layer nacks it before detaching (§8 scenario
    /// 3) — handled inside `ChannelHandle::close`, not duplicated here.
    pub fn close(&self) -> Result<(), MboxError> {
        let mut inner = self.inner.lock();
        let channel = inner.channel.take().ok_or(MboxError::NoDevice)?;
        inner.direction = None;
        inner.rx = None;
        inner.tx_status = None;
        inner.tx_armed = false;
        drop(inner);
        channel.close()
    }
}

impl Default for MboxDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RxCap for MboxDevice {
    fn received(&self, payload: &RawEnvelope) {
        let mut inner = self.inner.lock();
        if inner.rx.is_some() {
            warn!("mbox device got a new message before the previous one was drained");
        }
        inner.rx = Some(*payload);
        let waker = inner.waker;
        drop(inner);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl TxCap for MboxDevice {
    fn tx_done(&self, outcome: TxOutcome) {
        let mut inner = self.inner.lock();
        inner.tx_armed = false;
        let code: usize = match outcome {
            TxOutcome::Ack => 0,
            TxOutcome::Nack(reason) => reason.into(),
        };
        inner.tx_status = Some(code as u32);
        let waker = inner.waker;
        drop(inner);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Derives a device file's name: an explicit per-instance name if the
/// bank's table has one, otherwise the `<bank_id>-mbox<N>` fallback
/// pattern (§6).
pub fn device_name<'buf>(bank_id: &str, instance: u8, explicit: &[(u8, &str)], buf: &'buf mut [u8]) -> &'buf str {
    if let Some((_, name)) = explicit.iter().find(|(idx, _)| *idx == instance) {
        return name;
    }
    let mut cursor = core2::io::Cursor::new(&mut buf[..]);
    let _ = write!(cursor, "{bank_id}-mbox{instance}");
    let len = cursor.position() as usize;
    core::str::from_utf8(&cursor.into_inner()[..len]).unwrap_or("mbox")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpsc_mbox_alloc::{channel_config, BankIrqConfig, ClientConfig};
    use hpsc_mbox_hw::registers::INSTANCE_STRIDE_WORDS;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BANK_IRQ: BankIrqConfig = BankIrqConfig { interrupt_idx_rcv: 0, interrupt_idx_ack: 1 };

    // Each test gets its own leaked register window and the raw pointer into
    // it, so a test can poke a remote party's side of the protocol (e.g. the
    // ack that a real peer would send back) without reaching into `Bank`'s
    // private fields.
    fn leaked_bank() -> (*mut u32, &'static Bank) {
        let regs: &'static mut [u32; 32 * INSTANCE_STRIDE_WORDS] =
            std::boxed::Box::leak(std::boxed::Box::new([0u32; 32 * INSTANCE_STRIDE_WORDS]));
        let ptr = regs.as_mut_ptr();
        let bank = std::boxed::Box::leak(std::boxed::Box::new(unsafe { Bank::new(ptr) }));
        (ptr, bank)
    }

    #[test]
    fn outgoing_write_then_read_follows_the_back_pressure_scenario() {
        let (regs_ptr, bank) = leaked_bank();
        static DEVICE: MboxDevice = MboxDevice::new();
        let client = ClientConfig { instance: 0, owner: 1, src: 1, dst: 2 };
        let cfg = channel_config(BANK_IRQ, client, false, true);
        DEVICE.open(bank, 0, cfg, Direction::Outgoing).unwrap();

        DEVICE.write(&[9u8; 64]).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(DEVICE.read(&mut out), Err(MboxError::TryAgain));

        // Simulate the remote side draining and acking the delivery.
        let regs = unsafe { hpsc_mbox_hw::registers::InstanceRegs::new(regs_ptr) };
        unsafe { regs.event_set(hpsc_mbox_hw::registers::EVENT_B) };
        bank.handle_irq(BANK_IRQ.interrupt_idx_ack);

        let n = DEVICE.read(&mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(u32::from_le_bytes(out), 0);

        assert_eq!(DEVICE.read(&mut out), Err(MboxError::TryAgain));
    }

    #[test]
    fn incoming_close_with_pending_rx_allows_a_fresh_open() {
        let (regs_ptr, bank) = leaked_bank();
        static DEVICE: MboxDevice = MboxDevice::new();
        let client = ClientConfig { instance: 1, owner: 1, src: 2, dst: 1 };
        let cfg = channel_config(BANK_IRQ, client, true, false);
        DEVICE.open(bank, 1, cfg, Direction::Incoming).unwrap();

        let regs = unsafe {
            hpsc_mbox_hw::registers::InstanceRegs::new(regs_ptr.add(INSTANCE_STRIDE_WORDS))
        };
        unsafe { regs.event_set(hpsc_mbox_hw::registers::EVENT_A) };
        bank.handle_irq(BANK_IRQ.interrupt_idx_rcv);

        assert!(DEVICE.poll().readable);
        DEVICE.close().unwrap();

        let cfg = channel_config(BANK_IRQ, client, true, false);
        DEVICE.open(bank, 1, cfg, Direction::Incoming).unwrap();
    }

    struct CountingWaker(AtomicUsize);
    impl Waker for CountingWaker {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn arrival_wakes_the_registered_waker() {
        let (regs_ptr, bank) = leaked_bank();
        static DEVICE: MboxDevice = MboxDevice::new();
        static WAKER: CountingWaker = CountingWaker(AtomicUsize::new(0));
        let client = ClientConfig { instance: 2, owner: 1, src: 2, dst: 1 };
        let cfg = channel_config(BANK_IRQ, client, true, false);
        DEVICE.open(bank, 2, cfg, Direction::Incoming).unwrap();
        DEVICE.register_waker(&WAKER);

        let regs = unsafe {
            hpsc_mbox_hw::registers::InstanceRegs::new(regs_ptr.add(2 * INSTANCE_STRIDE_WORDS))
        };
        unsafe { regs.event_set(hpsc_mbox_hw::registers::EVENT_A) };
        bank.handle_irq(BANK_IRQ.interrupt_idx_rcv);

        assert_eq!(WAKER.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn device_name_prefers_the_explicit_table() {
        let mut buf = [0u8; 32];
        assert_eq!(device_name("trch-rtps", 0, &[(0, "ctrl")], &mut buf), "ctrl");
        let mut buf = [0u8; 32];
        assert_eq!(device_name("trch-rtps", 3, &[], &mut buf), "trch-rtps-mbox3");
    }
}
