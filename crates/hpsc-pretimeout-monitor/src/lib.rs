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

//! Bridges local fault and lifecycle signals into the system-message
//! protocol (§4.8): die/oops, panic, and shutdown/restart all become
//! LIFECYCLE(DOWN); a watchdog pretimeout becomes WATCHDOG_TIMEOUT followed
//! by an orderly poweroff, initiated at most once.
//!
//! Registering this monitor's handler methods with the kernel's actual
//! die/oops, panic, shutdown/restart, and watchdog-pretimeout notifier
//! chains is a platform/probe concern (§1's device-tree and probe/remove
//! wrappers are out of scope); this crate only supplies the handlers and
//! the single-shot poweroff guard.

#![cfg_attr(not(test), no_std)]

use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, Ordering};

use core2::io::Cursor;
use hpsc_mbox_support::MboxError;
use hpsc_sys_message::{Dispatcher, LifecycleStatus, RetryConfig};
use log::warn;

/// Capability that triggers an orderly poweroff (§4.8). The actual
/// mechanism (a kernel `kernel_power_off` call, a PMIC command, ...) is a
/// platform concern; the monitor only guarantees it is invoked at most once.
pub trait PoweroffAction: Sync {
    fn initiate(&self);
}

const DIE_MSG_LEN: usize = 56;

/// Formats `"<action>|<desc>|<err>|<trap>|<signal>"` into a fixed buffer
/// (§4.8), truncating rather than allocating if it doesn't fit — this may
/// run from a die/oops handler where allocation is unsafe.
fn format_die<'buf>(buf: &'buf mut [u8; DIE_MSG_LEN], action: &str, desc: &str, err: i32, trap: i32, signal: i32) -> &'buf str {
    let mut cursor = Cursor::new(&mut buf[..]);
    let _ = write!(cursor, "{action}|{desc}|{err}|{trap}|{signal}");
    let len = cursor.position() as usize;
    core::str::from_utf8(&cursor.into_inner()[..len]).unwrap_or("")
}

/// Pretimeout monitor (§4.8). A `'static` singleton wired up at platform
/// init with the dispatcher it reports through and the poweroff capability
/// it drives.
pub struct PretimeoutMonitor {
    dispatcher: &'static Dispatcher,
    poweroff: &'static dyn PoweroffAction,
    poweroff_started: AtomicBool,
    retry_cfg: RetryConfig,
}

impl PretimeoutMonitor {
    pub const fn new(dispatcher: &'static Dispatcher, poweroff: &'static dyn PoweroffAction, retry_cfg: RetryConfig) -> Self {
        Self { dispatcher, poweroff, poweroff_started: AtomicBool::new(false), retry_cfg }
    }

    /// Sends LIFECYCLE(UP). Call once at module init, after the platform
    /// has wired this monitor's `on_*` methods into the kernel's notifier
    /// chains (§4.8).
    pub fn init(&self, delay_us: impl FnMut(u32)) -> Result<(), MboxError> {
        self.dispatcher.send_lifecycle(LifecycleStatus::Up, None, self.retry_cfg, delay_us)
    }

    /// Die/oops notifier (§4.8): `LIFECYCLE(DOWN, "<action>|<desc>|<err>|<trap>|<signal>")`.
    pub fn on_die(
        &self,
        action: &str,
        desc: &str,
        err: i32,
        trap: i32,
        signal: i32,
        delay_us: impl FnMut(u32),
    ) -> Result<(), MboxError> {
        let mut buf = [0u8; DIE_MSG_LEN];
        let msg = format_die(&mut buf, action, desc, err, trap, signal);
        self.dispatcher.send_lifecycle(LifecycleStatus::Down, Some(msg), self.retry_cfg, delay_us)
    }

    /// Panic notifier (§4.8): `LIFECYCLE(DOWN, <panic string>)`.
    pub fn on_panic(&self, panic_msg: &str, delay_us: impl FnMut(u32)) -> Result<(), MboxError> {
        self.dispatcher.send_lifecycle(LifecycleStatus::Down, Some(panic_msg), self.retry_cfg, delay_us)
    }

    /// Shutdown/restart notifier (§4.8): `LIFECYCLE(DOWN, <action>)`.
    pub fn on_shutdown(&self, action: &str, delay_us: impl FnMut(u32)) -> Result<(), MboxError> {
        self.dispatcher.send_lifecycle(LifecycleStatus::Down, Some(action), self.retry_cfg, delay_us)
    }

    /// Watchdog pretimeout notifier (§4.8, §8 scenario 6): sends
    /// `WATCHDOG_TIMEOUT(cpu)`, then initiates poweroff exactly once. A
    /// pretimeout that fires while poweroff is already underway is logged
    /// but does not re-initiate (single-shot guard).
    pub fn on_watchdog_pretimeout(&self, cpu_id: u32, delay_us: impl FnMut(u32)) -> Result<(), MboxError> {
        let result = self.dispatcher.send_watchdog_timeout(cpu_id, self.retry_cfg, delay_us);
        if self.poweroff_started.swap(true, Ordering::SeqCst) {
            warn!("watchdog pretimeout on cpu {cpu_id} while poweroff already in progress, ignoring");
        } else {
            self.poweroff.initiate();
        }
        result
    }
}
