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

//! Priority-ordered registry of transports (§4.6): `send` walks the table
//! from the highest priority down until one accepts; `recv` is an up-call
//! from whichever transport delivered a message into the system-message
//! dispatcher. The bus itself never retries a `send` and never holds its
//! lock across a transport or dispatcher call, so a handler invoked from
//! `recv` may originate an outbound message synchronously (§4.6, §4.7).

#![cfg_attr(not(test), no_std)]

use hpsc_mbox_support::{MboxError, RawEnvelope};
use spin::Mutex;

/// Total order over registered transports (§3, §4.4, §4.5): `Shmem` is
/// tried before `Mailbox`. Priority is the registration key — at most one
/// transport may occupy a given priority at a time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum Priority {
    Mailbox = 0,
    Shmem = 1,
}

const PRIORITY_COUNT: usize = 2;

impl Priority {
    const fn ordinal(self) -> usize { self as usize }
}

/// A registered handler capable of sending a system-message envelope out of
/// the cluster (§3 "Transport handler"). `send`'s return value drives the
/// bus's walk: `Ok(())` means accepted and done, `Err(TryAgain)` means
/// retry later (the bus stops walking lower priorities for this call), any
/// other error means try the next slot.
pub trait Transport: Sync {
    fn name(&self) -> &'static str;
    fn send(&self, msg: &RawEnvelope) -> Result<(), MboxError>;
}

/// The system-message dispatcher's up-call contract. Registered once with
/// `set_sink`; every transport's inbound path calls `NotificationBus::recv`
/// rather than holding its own pointer to the dispatcher.
pub trait InboundSink: Sync {
    fn recv(&self, msg: &RawEnvelope) -> Result<(), MboxError>;
}

type Table = [Option<&'static dyn Transport>; PRIORITY_COUNT];

pub struct NotificationBus {
    table: Mutex<Table>,
    sink: Mutex<Option<&'static dyn InboundSink>>,
}

impl NotificationBus {
    pub const fn new() -> Self {
        Self { table: Mutex::new([None; PRIORITY_COUNT]), sink: Mutex::new(None) }
    }

    /// Installs the dispatcher that `recv` forwards to. Call once, before
    /// any transport can plausibly receive a message.
    pub fn set_sink(&self, sink: &'static dyn InboundSink) {
        *self.sink.lock() = Some(sink);
    }

    /// Registers `transport` at `priority`, failing `Busy` if the slot is
    /// already occupied (§4.6).
    pub fn register(&self, priority: Priority, transport: &'static dyn Transport) -> Result<(), MboxError> {
        let mut table = self.table.lock();
        let slot = &mut table[priority.ordinal()];
        if slot.is_some() {
            return Err(MboxError::Busy);
        }
        *slot = Some(transport);
        Ok(())
    }

    /// Clears a priority slot. A receive callback for the unregistered
    /// transport may still fire up until this call returns (§3).
    pub fn unregister(&self, priority: Priority) {
        self.table.lock()[priority.ordinal()] = None;
    }

    /// Walks the table from `Shmem` down to `Mailbox`, per §4.6's rule set.
    pub fn send(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
        let table = *self.table.lock();
        let mut last_err = None;
        for slot in table.iter().rev() {
            let Some(transport) = slot else { continue };
            match transport.send(msg) {
                Ok(()) => return Ok(()),
                Err(MboxError::TryAgain) => return Err(MboxError::TryAgain),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or(MboxError::NoDevice))
    }

    /// Up-call from a transport's receive path into the dispatcher. No bus
    /// lock is held across this call (§4.6, §5).
    pub fn recv(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
        let sink = *self.sink.lock();
        match sink {
            Some(sink) => sink.recv(msg),
            None => Err(MboxError::NoDevice),
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self { Self::new() }
}
