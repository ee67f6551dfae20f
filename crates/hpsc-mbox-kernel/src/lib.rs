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

//! Pairs exactly two mailbox channels — outbound index 0, inbound index 1 —
//! and exposes them as a single bidirectional `Transport` on the
//! notification bus, at `Priority::Mailbox` (§4.4).

#![cfg_attr(not(test), no_std)]

use hpsc_mbox_alloc::ChannelConfig;
use hpsc_mbox_channel::ChannelHandle;
use hpsc_mbox_hw::Bank;
use hpsc_mbox_support::{MboxError, RawEnvelope, RxCap, SendRequest, TxCap, TxOutcome};
use hpsc_notification_bus::{NotificationBus, Priority, Transport};
use spin::Mutex;

struct State {
    outbound: Option<ChannelHandle<'static>>,
    inbound: Option<ChannelHandle<'static>>,
    bus: Option<&'static NotificationBus>,
    tx_armed: bool,
}

impl State {
    const fn closed() -> Self { Self { outbound: None, inbound: None, bus: None, tx_armed: false } }
}

/// The kernel-client mailbox transport. A `'static` singleton, the same
/// shape as `hpsc_mbox_user::MboxDevice`: its own up-call capability,
/// opened once at init and torn down at most once.
pub struct MboxKernelTransport {
    state: Mutex<State>,
}

impl MboxKernelTransport {
    pub const fn new() -> Self { Self { state: Mutex::new(State::closed()) } }

    /// Opens the outbound channel, registers with `bus` at `Priority::Mailbox`,
    /// and only then opens the inbound channel — the ordering §4.4 requires,
    /// since an inbound message arriving during inbound-open may synthesize a
    /// synchronous reply that needs a viable outbound path.
    pub fn open(
        &'static self,
        bank: &'static Bank,
        outbound_instance: u8,
        outbound_cfg: ChannelConfig,
        inbound_instance: u8,
        inbound_cfg: ChannelConfig,
        bus: &'static NotificationBus,
    ) -> Result<(), MboxError> {
        let outbound = ChannelHandle::open(bank, outbound_instance, outbound_cfg, None, Some(self))?;
        {
            let mut state = self.state.lock();
            state.outbound = Some(outbound);
        }
        bus.register(Priority::Mailbox, self)?;
        {
            let mut state = self.state.lock();
            state.bus = Some(bus);
        }
        let inbound = ChannelHandle::open(bank, inbound_instance, inbound_cfg, Some(self), None)?;
        let mut state = self.state.lock();
        state.inbound = Some(inbound);
        Ok(())
    }

    /// Detaches both channels and unregisters from the bus.
    pub fn close(&self) -> Result<(), MboxError> {
        let mut state = self.state.lock();
        let bus = state.bus.take();
        let outbound = state.outbound.take();
        let inbound = state.inbound.take();
        drop(state);
        if let Some(bus) = bus {
            bus.unregister(Priority::Mailbox);
        }
        let out_result = outbound.map(|h| h.close()).unwrap_or(Ok(()));
        let in_result = inbound.map(|h| h.close()).unwrap_or(Ok(()));
        out_result.and(in_result)
    }
}

impl Default for MboxKernelTransport {
    fn default() -> Self { Self::new() }
}

impl Transport for MboxKernelTransport {
    fn name(&self) -> &'static str { "mailbox" }

    /// Fails `TryAgain` if the previous outgoing message has not yet been
    /// acked (§4.4): at most one outstanding message per direction (§1).
    fn send(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
        let mut state = self.state.lock();
        if state.tx_armed {
            return Err(MboxError::TryAgain);
        }
        let outbound = state.outbound.as_ref().ok_or(MboxError::NoDevice)?;
        outbound.send(SendRequest::Send { payload: *msg })?;
        state.tx_armed = true;
        Ok(())
    }
}

impl RxCap for MboxKernelTransport {
    /// Hands the buffer to the bus's `recv`, then pulses rx-ack so the
    /// remote's send flow is ready when this call returns (§4.4). The bus
    /// reference is copied out before calling `recv` so a synchronous reply
    /// composed by the dispatcher — which may call back into `send` above —
    /// never contends with this lock.
    fn received(&self, payload: &RawEnvelope) {
        let bus = self.state.lock().bus;
        if let Some(bus) = bus {
            let _ = bus.recv(payload);
        }
        let state = self.state.lock();
        if let Some(inbound) = state.inbound.as_ref() {
            let _ = inbound.drain_rx_complete();
        }
    }
}

impl TxCap for MboxKernelTransport {
    fn tx_done(&self, _outcome: TxOutcome) {
        self.state.lock().tx_armed = false;
    }
}
