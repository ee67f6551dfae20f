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

//! The abstract contract between MBox-HW and its clients (§4.2): `open`,
//! `send`, `drain_rx_complete`/`peek_rx`, `close`, typed as a handle rather
//! than a bare `(bank, instance)` pair so MBox-User and MBox-Kernel can't
//! call an operation on an instance they haven't opened.

#![cfg_attr(not(test), no_std)]

use hpsc_mbox_alloc::ChannelConfig;
use hpsc_mbox_hw::Bank;
pub use hpsc_mbox_support::{MboxError, RxCap, SendRequest, TxCap, TxOutcome};

/// A successfully opened channel. Borrows the bank it was opened on, so it
/// cannot outlive the hardware it controls. Consuming `close` statically
/// prevents use of a handle after detach; a handle dropped without calling
/// `close` leaves the instance open (matching §4.1: lifecycle is
/// claim/release on open/close, not on scope exit).
pub struct ChannelHandle<'bank> {
    bank: &'bank Bank,
    instance: u8,
}

impl<'bank> ChannelHandle<'bank> {
    /// Opens `instance` on `bank` with the given allocation-derived
    /// configuration and up-call capabilities (§4.1, §4.2, §9).
    pub fn open(
        bank: &'bank Bank,
        instance: u8,
        cfg: ChannelConfig,
        rx: Option<&'static dyn RxCap>,
        tx: Option<&'static dyn TxCap>,
    ) -> Result<Self, MboxError> {
        bank.open(instance, cfg, rx, tx)?;
        Ok(Self { bank, instance })
    }

    /// Sends a payload or pulses a nack (§4.2, §9's tagged `SendRequest`).
    pub fn send(&self, request: SendRequest) -> Result<(), MboxError> {
        self.bank.send(self.instance, request)
    }

    /// Client→controller acknowledgement that a received message has been
    /// drained, pulsing the rx-ack event (§9 split of the source's
    /// overloaded `peek_data`).
    pub fn drain_rx_complete(&self) -> Result<(), MboxError> {
        self.bank.drain_rx_complete(self.instance)
    }

    /// Pure query: is a received message waiting to be drained?
    pub fn peek_rx(&self) -> bool {
        self.bank.peek_rx(self.instance)
    }

    /// Atomically detaches the client and performs §4.1 shutdown.
    pub fn close(self) -> Result<(), MboxError> {
        self.bank.close(self.instance)
    }
}
