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

//! End-to-end scenarios spanning the whole stack: a mailbox bank and a
//! shared-memory region feeding one notification bus, one system-message
//! dispatcher on top, and one pretimeout monitor driving both. Each test
//! wires its own bank/bus/dispatcher rather than going through
//! `hpsc_mbox_runtime`'s `static`s, since those are bound to placeholder
//! hardware addresses no host process can read or write.

use core::sync::atomic::{AtomicUsize, Ordering};

use hpsc_mbox_alloc::{channel_config, BankIrqConfig, ClientConfig, Direction};
use hpsc_mbox_hw::registers::EVENT_B;
use hpsc_mbox_kernel::MboxKernelTransport;
use hpsc_mbox_support::{mmio::read_envelope, MboxError, RawEnvelope};
use hpsc_mbox_test_support::{FakeBank, FakeClock, FakeShmemRegions};
use hpsc_mbox_user::MboxDevice;
use hpsc_notification_bus::{NotificationBus, Priority, Transport};
use hpsc_pretimeout_monitor::{PoweroffAction, PretimeoutMonitor};
use hpsc_shmem_transport::ShmemTransport;
use hpsc_sys_message::{decode_lifecycle, decode_watchdog_timeout, Dispatcher, MessageType, RetryConfig};

const BANK_IRQ: BankIrqConfig = BankIrqConfig { interrupt_idx_rcv: 0, interrupt_idx_ack: 1 };

/// Scenario 1: a PING arriving on the inbound mailbox channel produces
/// exactly one PONG on the outbound channel, echoing every byte but the tag.
#[test]
fn ping_round_trip_over_mailbox() {
    let fake = FakeBank::new();
    static BUS: NotificationBus = NotificationBus::new();
    static DISPATCHER: Dispatcher = Dispatcher::new(&BUS);
    BUS.set_sink(&DISPATCHER);
    static KERNEL: MboxKernelTransport = MboxKernelTransport::new();

    let out_client = ClientConfig { instance: 0, owner: 1, src: 1, dst: 2 };
    let in_client = ClientConfig { instance: 1, owner: 1, src: 2, dst: 1 };
    let out_cfg = channel_config(BANK_IRQ, out_client, false, true);
    let in_cfg = channel_config(BANK_IRQ, in_client, true, false);
    KERNEL.open(fake.bank, 0, out_cfg, 1, in_cfg, &BUS).unwrap();

    let mut ping = [0u8; 64];
    ping[0] = MessageType::Ping.into();
    for (i, b) in ping.iter_mut().enumerate().skip(1) {
        *b = i as u8;
    }
    fake.simulate_incoming(1, BANK_IRQ.interrupt_idx_rcv, &ping);

    let sent = unsafe { read_envelope(fake.instance_regs(0).data_ptr()) };
    assert_eq!(sent[0], u8::from(MessageType::Pong));
    assert_eq!(sent[1..], ping[1..]);
}

/// Scenario 2: back-pressure. A non-blocking `read` on a device with
/// nothing ready returns `TryAgain` rather than parking the caller; once
/// the remote side acks the outstanding send, the same `read` succeeds.
#[test]
fn back_pressure_on_an_unacked_outgoing_device() {
    let fake = FakeBank::new();
    static DEVICE: MboxDevice = MboxDevice::new();
    let client = ClientConfig { instance: 5, owner: 1, src: 1, dst: 2 };
    let cfg = channel_config(BANK_IRQ, client, false, true);
    DEVICE.open(fake.bank, 5, cfg, Direction::Outgoing).unwrap();

    DEVICE.write(&[1u8; 8]).unwrap();
    let mut out = [0u8; 4];
    assert_eq!(DEVICE.read(&mut out), Err(MboxError::TryAgain));
    // A second write while one is outstanding is also rejected, not queued.
    assert_eq!(DEVICE.write(&[2u8; 8]), Err(MboxError::Busy));

    fake.simulate_ack(5, BANK_IRQ.interrupt_idx_ack);
    assert_eq!(DEVICE.read(&mut out).unwrap(), 4);
}

/// Scenario 3: a device closed with an undrained inbound message nacks it
/// first, so the remote sender is never left stalled, and the instance is
/// immediately reusable.
#[test]
fn close_with_a_pending_receive_nacks_before_detaching() {
    let fake = FakeBank::new();
    static DEVICE: MboxDevice = MboxDevice::new();
    let client = ClientConfig { instance: 6, owner: 1, src: 2, dst: 1 };
    let cfg = channel_config(BANK_IRQ, client, true, false);
    DEVICE.open(fake.bank, 6, cfg, Direction::Incoming).unwrap();

    fake.simulate_incoming(6, BANK_IRQ.interrupt_idx_rcv, &[3u8; 64]);
    assert!(DEVICE.poll().readable);

    DEVICE.close().unwrap();
    let regs = fake.instance_regs(6);
    assert_eq!(unsafe { regs.event_status() } & EVENT_B, EVENT_B);

    let cfg = channel_config(BANK_IRQ, client, true, false);
    DEVICE.open(fake.bank, 6, cfg, Direction::Incoming).unwrap();
}

/// Scenario 4: the bus always prefers Shmem over Mailbox when both are
/// registered and Shmem is not busy; a `TryAgain` from Shmem does not fall
/// through to Mailbox for that call.
#[test]
fn shmem_is_preferred_and_try_again_does_not_fall_through() {
    let fake = FakeBank::new();
    static BUS: NotificationBus = NotificationBus::new();
    let mut regions = FakeShmemRegions::new();
    let (out_message, out_status) = regions.out_ptrs();
    let (in_message, in_status) = regions.in_ptrs();
    let shmem: &'static ShmemTransport = Box::leak(Box::new(unsafe {
        ShmemTransport::new(out_message, out_status, in_message, in_status, &BUS, 5)
    }));
    shmem.register().unwrap();

    static KERNEL: MboxKernelTransport = MboxKernelTransport::new();
    let out_client = ClientConfig { instance: 7, owner: 1, src: 1, dst: 2 };
    let in_client = ClientConfig { instance: 8, owner: 1, src: 2, dst: 1 };
    let out_cfg = channel_config(BANK_IRQ, out_client, false, true);
    let in_cfg = channel_config(BANK_IRQ, in_client, true, false);
    KERNEL.open(fake.bank, 7, out_cfg, 8, in_cfg, &BUS).unwrap();

    BUS.send(&[4u8; 64]).unwrap();
    assert!(regions.out_new_is_set());
    // Confirm the mailbox side never saw a DATA write for that send: the
    // instance's outbound DATA register is still all zero.
    let mailbox_data = unsafe { read_envelope(fake.instance_regs(7).data_ptr()) };
    assert_eq!(mailbox_data, [0u8; 64]);

    // Shmem's out slot is now busy (NEW still set, nothing has drained it),
    // so the next send gets TryAgain from Shmem and must not fall through.
    assert_eq!(BUS.send(&[5u8; 64]), Err(MboxError::TryAgain));
    assert_eq!(unsafe { read_envelope(fake.instance_regs(7).data_ptr()) }, [0u8; 64]);
}

/// Scenario 5: a transport that returns `TryAgain` twice before succeeding
/// drives exactly three send attempts and at least two retry delays.
#[test]
fn retry_loop_matches_the_configured_retry_count() {
    struct FlakyTransport(AtomicUsize);
    impl Transport for FlakyTransport {
        fn name(&self) -> &'static str { "flaky" }
        fn send(&self, _msg: &RawEnvelope) -> Result<(), MboxError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(MboxError::TryAgain) } else { Ok(()) }
        }
    }

    static BUS: NotificationBus = NotificationBus::new();
    static TRANSPORT: FlakyTransport = FlakyTransport(AtomicUsize::new(0));
    BUS.register(Priority::Mailbox, &TRANSPORT).unwrap();
    let dispatcher = Dispatcher::new(&BUS);
    let clock = FakeClock::new();
    let cfg = RetryConfig { retries: 2, retry_delay_us: 1 };

    dispatcher.send_lifecycle(hpsc_sys_message::LifecycleStatus::Up, None, cfg, |us| clock.delay_us(us)).unwrap();

    assert_eq!(TRANSPORT.0.load(Ordering::SeqCst), 3);
    assert!(clock.elapsed_us() >= 2);
}

/// Scenario 6: a watchdog pretimeout sends `WATCHDOG_TIMEOUT` with the
/// firing cpu's id and initiates poweroff exactly once, even if the
/// pretimeout fires again before the system goes down.
#[test]
fn watchdog_pretimeout_drives_one_watchdog_message_and_one_poweroff() {
    struct RecordingTransport(spin::Mutex<RawEnvelope>);
    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str { "test" }
        fn send(&self, msg: &RawEnvelope) -> Result<(), MboxError> {
            *self.0.lock() = *msg;
            Ok(())
        }
    }

    struct CountingPoweroff(AtomicUsize);
    impl PoweroffAction for CountingPoweroff {
        fn initiate(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
    }

    static BUS: NotificationBus = NotificationBus::new();
    static TRANSPORT: RecordingTransport = RecordingTransport(spin::Mutex::new([0u8; 64]));
    BUS.register(Priority::Mailbox, &TRANSPORT).unwrap();
    static DISPATCHER: Dispatcher = Dispatcher::new(&BUS);
    static POWEROFF: CountingPoweroff = CountingPoweroff(AtomicUsize::new(0));
    let monitor = PretimeoutMonitor::new(&DISPATCHER, &POWEROFF, RetryConfig::default());

    monitor.init(|_| {}).unwrap();
    let (status, _) = decode_lifecycle(&TRANSPORT.0.lock());
    assert_eq!(status, hpsc_sys_message::LifecycleStatus::Up);

    monitor.on_watchdog_pretimeout(2, |_| {}).unwrap();
    assert_eq!(decode_watchdog_timeout(&TRANSPORT.0.lock()), 2);
    assert_eq!(POWEROFF.0.load(Ordering::SeqCst), 1);

    monitor.on_watchdog_pretimeout(2, |_| {}).unwrap();
    assert_eq!(POWEROFF.0.load(Ordering::SeqCst), 1);
}
