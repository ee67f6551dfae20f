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

//! Wires one cluster link's worth of components together (§4, §6): the
//! mailbox bank, the kernel-client and shared-memory transports registered
//! on a shared notification bus, the system-message dispatcher, the
//! pretimeout monitor, and this link's user-facing mailbox devices.
//!
//! Everything below is a top-level `static`, in the spirit of the
//! reference component's `run.rs`: most of these types hold `&'static`
//! references to each other (`Dispatcher` to the bus, the pretimeout
//! monitor to the dispatcher), so they need to already be at their final
//! address before `init` wires them together — a struct threading `&self`
//! fields through a constructor can't express that.

#![cfg_attr(not(test), no_std)]

use hpsc_mbox_alloc::{channel_config, lookup, Direction};
use hpsc_mbox_hw::Bank;
use hpsc_mbox_kernel::MboxKernelTransport;
use hpsc_mbox_support::MboxError;
use hpsc_mbox_user::MboxDevice;
use hpsc_notification_bus::NotificationBus;
use hpsc_pretimeout_monitor::{PoweroffAction, PretimeoutMonitor};
use hpsc_shmem_transport::ShmemTransport;
use hpsc_sys_message::{Dispatcher, RetryConfig};

pub mod platform;

/// Default retry policy for lifecycle/watchdog sends (§7): ten attempts,
/// 100us apart.
pub const DEFAULT_RETRY: RetryConfig = RetryConfig { retries: 10, retry_delay_us: 100 };

pub static BANK: Bank = unsafe { Bank::new(platform::MMIO_BASE as *mut u32) };

pub static BUS: NotificationBus = NotificationBus::new();

pub static DISPATCHER: Dispatcher = Dispatcher::new(&BUS);

pub static KERNEL_TRANSPORT: MboxKernelTransport = MboxKernelTransport::new();

pub static SHMEM_TRANSPORT: ShmemTransport = unsafe {
    ShmemTransport::new(
        platform::SHMEM_OUT_MESSAGE as *mut u8,
        platform::SHMEM_OUT_STATUS as *mut u32,
        platform::SHMEM_IN_MESSAGE as *mut u8,
        platform::SHMEM_IN_STATUS as *mut u32,
        &BUS,
        platform::SHMEM_POLL_INTERVAL_MS,
    )
};

cfg_if::cfg_if! {
    if #[cfg(feature = "trch_rtps")] {
        pub static USER_DEVICES: [MboxDevice; platform::USER_DEVICE_COUNT] =
            [MboxDevice::new(), MboxDevice::new()];
    } else if #[cfg(feature = "trch_hpps")] {
        pub static USER_DEVICES: [MboxDevice; platform::USER_DEVICE_COUNT] = [MboxDevice::new()];
    }
}

/// Orderly-poweroff capability (§4.8). The mechanism (a PMIC command, a
/// kernel `kernel_power_off` call, ...) is a platform concern; this crate
/// only needs something implementing `PoweroffAction` at a `'static`
/// address.
pub struct PlatformPoweroff;

impl PoweroffAction for PlatformPoweroff {
    fn initiate(&self) {
        log::warn!("pretimeout monitor initiating orderly poweroff");
    }
}

pub static POWEROFF: PlatformPoweroff = PlatformPoweroff;

pub static PRETIMEOUT_MONITOR: PretimeoutMonitor = PretimeoutMonitor::new(&DISPATCHER, &POWEROFF, DEFAULT_RETRY);

/// Brings up the whole link in the order §4.4 and §4.8 require:
///
/// 1. Install the dispatcher as the bus's inbound sink.
/// 2. Register the shared-memory transport (`Priority::Shmem`).
/// 3. Open the kernel-client mailbox transport — outbound open, then bus
///    registration at `Priority::Mailbox`, then inbound open, enforced
///    inside `MboxKernelTransport::open` itself.
/// 4. Open this link's user-facing devices.
/// 5. Announce `LIFECYCLE(UP)`.
pub fn init(mut delay_us: impl FnMut(u32)) -> Result<(), MboxError> {
    BUS.set_sink(&DISPATCHER);
    SHMEM_TRANSPORT.register()?;

    let out_cfg = channel_config(platform::BANK, platform::KERNEL_OUTBOUND, false, true);
    let in_cfg = channel_config(platform::BANK, platform::KERNEL_INBOUND, true, false);
    KERNEL_TRANSPORT.open(
        &BANK,
        platform::KERNEL_OUTBOUND.instance,
        out_cfg,
        platform::KERNEL_INBOUND.instance,
        in_cfg,
        &BUS,
    )?;

    for (device, name) in USER_DEVICES.iter().zip(platform::USER_DEVICE_NAMES.iter()) {
        let cfg = lookup(platform::CLIENTS, platform::BANK, name, true, true)?;
        device.open(&BANK, cfg.instance, cfg, Direction::Incoming)?;
    }

    PRETIMEOUT_MONITOR.init(&mut delay_us)
}

/// Tears the link down: closes the kernel-client transport (unregistering
/// it from the bus), closes each user device, and asks the shared-memory
/// poll loop to stop at its next wake boundary.
pub fn shutdown() -> Result<(), MboxError> {
    SHMEM_TRANSPORT.request_stop();
    let mut result = KERNEL_TRANSPORT.close();
    for device in USER_DEVICES.iter() {
        result = result.and(device.close());
    }
    result
}

/// Runs the shared-memory receive poll loop (§4.5, §9) until `shutdown`
/// requests a stop. `sleep_ms` performs the actual wait between polls;
/// platform init code supplies a real sleep, tests supply a counting no-op.
pub fn run_shmem_poll_loop(sleep_ms: impl Fn(u32)) {
    SHMEM_TRANSPORT.run_poll_loop(sleep_ms);
}
