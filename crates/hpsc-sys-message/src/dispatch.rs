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

//! Dispatches inbound envelopes to per-type handlers and composes outbound
//! lifecycle/watchdog messages (§4.7, §4.8). Registers as the notification
//! bus's `InboundSink`, so every transport's receive path ends up here
//! regardless of which transport delivered the message.

use hpsc_mbox_support::{MboxError, RawEnvelope};
use hpsc_notification_bus::{InboundSink, NotificationBus};
use log::warn;

use crate::envelope::{pong_echo, LifecycleStatus, MessageType, MESSAGE_TYPE_COUNT};
use crate::retry::{with_retry, RetryConfig};
use crate::{lifecycle, watchdog_timeout};

/// The System-Message layer's dispatcher (§4.7). Holds a reference to the
/// bus it both receives from and replies through.
pub struct Dispatcher {
    bus: &'static NotificationBus,
}

impl Dispatcher {
    pub const fn new(bus: &'static NotificationBus) -> Self { Self { bus } }

    /// Validates and dispatches one inbound envelope (§4.7, §8's dispatch
    /// table law). `msg` is always exactly 64 bytes by construction
    /// (`RawEnvelope`'s size is fixed at compile time), so the size check
    /// §4.7 calls for is a property of the type, not a runtime branch.
    pub fn process(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
        let tag = msg[0];
        if tag >= MESSAGE_TYPE_COUNT {
            return Err(MboxError::InvalidArgument);
        }
        match MessageType::try_from(tag) {
            Ok(MessageType::Nop) => Ok(()),
            Ok(MessageType::Ping) => self.handle_ping(msg),
            Ok(MessageType::Pong) => Ok(()),
            Ok(other) => {
                warn!("sys-message: dropping unhandled message type {other:?}, reserved for future extension");
                Ok(())
            }
            Err(_) => Err(MboxError::InvalidArgument),
        }
    }

    fn handle_ping(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
        let pong = pong_echo(msg);
        self.bus.send(&pong)
    }

    /// Composes and sends a LIFECYCLE message, retrying `TryAgain` per
    /// `cfg` (§4.8, §6, §7). `delay_us` performs the actual wait between
    /// attempts; platform init code supplies a real sleep, tests supply a
    /// counting no-op.
    pub fn send_lifecycle(
        &self,
        status: LifecycleStatus,
        info: Option<&str>,
        cfg: RetryConfig,
        mut delay_us: impl FnMut(u32),
    ) -> Result<(), MboxError> {
        let env = lifecycle(status, info);
        with_retry(|| self.bus.send(&env), cfg, &mut delay_us)
    }

    /// Composes and sends a WATCHDOG_TIMEOUT message (§4.8).
    pub fn send_watchdog_timeout(
        &self,
        cpu_id: u32,
        cfg: RetryConfig,
        mut delay_us: impl FnMut(u32),
    ) -> Result<(), MboxError> {
        let env = watchdog_timeout(cpu_id);
        with_retry(|| self.bus.send(&env), cfg, &mut delay_us)
    }
}

impl InboundSink for Dispatcher {
    fn recv(&self, msg: &RawEnvelope) -> Result<(), MboxError> { self.process(msg) }
}
