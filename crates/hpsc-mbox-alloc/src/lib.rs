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

//! The cluster-wide allocation table: which instance and IRQ index each
//! software component owns, and the const-evaluable arithmetic that turns
//! that allocation into the `INT-ENABLE` bitmask MBox-HW needs at open time
//! (§4.1, §4.8, §6). Nothing here touches hardware; it is pure bit math over
//! build-time tables, one per platform, selected with `cfg-if`.

#![no_std]

use hpsc_mbox_support::MboxError;

/// Which of the bank's two shared IRQ lines carries each event, per §6:
/// "each mailbox bank's configuration provides two unsigned integers,
/// `interrupt-idx-rcv` and `interrupt-idx-ack`".
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BankIrqConfig {
    pub interrupt_idx_rcv: u8,
    pub interrupt_idx_ack: u8,
}

/// The 4-tuple a client's configuration supplies per §6.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    pub instance: u8,
    pub owner: u8,
    pub src: u8,
    pub dst: u8,
}

/// Direction of a kernel-client transport cell (§6: "a second per-cell
/// integer indicates direction (0 = outgoing, 1 = incoming)").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Outgoing = 0,
    Incoming = 1,
}

/// One cell of the kernel-client transport's fixed two-channel binding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KernelCellConfig {
    pub client: ClientConfig,
    pub direction: Direction,
}

/// Everything MBox-HW's `open` needs for one channel: where it lives, and
/// the `INT-ENABLE` bits to OR in for the callbacks the caller is
/// registering (§4.1: "OR into INT-ENABLE the bit corresponding to event A
/// at the RX-IRQ index if the client has a receive callback and/or event B
/// at the ACK-IRQ index if the client has a tx-done callback").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelConfig {
    pub instance: u8,
    pub owner: u8,
    pub src: u8,
    pub dst: u8,
    pub int_enable: u32,
}

/// For IRQ index `i`, event A enables bit `2i`, event B enables bit `2i+1`
/// (§4.1). Public so `hpsc-mbox-hw` can test an `INT-ENABLE` value against a
/// firing IRQ index without re-deriving the formula.
pub const fn event_a_bit(irq_idx: u8) -> u32 {
    1 << (2 * irq_idx as u32)
}

pub const fn event_b_bit(irq_idx: u8) -> u32 {
    1 << (2 * irq_idx as u32 + 1)
}

/// Derives the `INT-ENABLE` bitmask for a channel open with the given
/// callback subscriptions.
pub const fn int_enable_bits(bank: BankIrqConfig, has_rx_callback: bool, has_tx_callback: bool) -> u32 {
    let mut bits = 0u32;
    if has_rx_callback {
        bits |= event_a_bit(bank.interrupt_idx_rcv);
    }
    if has_tx_callback {
        bits |= event_b_bit(bank.interrupt_idx_ack);
    }
    bits
}

/// Derives the full `ChannelConfig` MBox-HW's `open` consumes.
pub const fn channel_config(
    bank: BankIrqConfig,
    client: ClientConfig,
    has_rx_callback: bool,
    has_tx_callback: bool,
) -> ChannelConfig {
    ChannelConfig {
        instance: client.instance,
        owner: client.owner,
        src: client.src,
        dst: client.dst,
        int_enable: int_enable_bits(bank, has_rx_callback, has_tx_callback),
    }
}

/// Looks up a named client's allocation in a platform table and derives its
/// `ChannelConfig`. Returns `NoDevice` if the name isn't in the table (a
/// build-time misconfiguration, surfaced as a runtime error rather than a
/// panic since the table may be populated by an integrator, not us).
pub fn lookup(
    table: &[(&str, ClientConfig)],
    bank: BankIrqConfig,
    name: &str,
    has_rx_callback: bool,
    has_tx_callback: bool,
) -> Result<ChannelConfig, MboxError> {
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, client)| channel_config(bank, *client, has_rx_callback, has_tx_callback))
        .ok_or(MboxError::NoDevice)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "trch_rtps")] {
        pub mod platform {
            //! TRCH-to-RTPS link: the trust cluster's view of the bank shared
            //! with the first realtime cluster.
            use super::{BankIrqConfig, ClientConfig};

            pub const BANK: BankIrqConfig = BankIrqConfig { interrupt_idx_rcv: 0, interrupt_idx_ack: 1 };

            /// `mbox-kernel`'s two cells: outbound (index 0, to RTPS) and
            /// inbound (index 1, from RTPS), per §6's {outgoing, incoming}
            /// ordering requirement.
            pub const KERNEL_OUTBOUND: ClientConfig = ClientConfig { instance: 0, owner: 1, src: 1, dst: 2 };
            pub const KERNEL_INBOUND: ClientConfig = ClientConfig { instance: 1, owner: 1, src: 2, dst: 1 };

            pub const CLIENTS: &[(&str, ClientConfig)] = &[
                ("mbox-kernel-outbound", KERNEL_OUTBOUND),
                ("mbox-kernel-inbound", KERNEL_INBOUND),
                ("mbox-user-0", ClientConfig { instance: 2, owner: 1, src: 1, dst: 2 }),
                ("mbox-user-1", ClientConfig { instance: 3, owner: 1, src: 1, dst: 2 }),
            ];
        }
    } else if #[cfg(feature = "trch_hpps")] {
        pub mod platform {
            //! TRCH-to-HPPS link: the trust cluster's view of the bank shared
            //! with the high-performance cluster.
            use super::{BankIrqConfig, ClientConfig};

            pub const BANK: BankIrqConfig = BankIrqConfig { interrupt_idx_rcv: 0, interrupt_idx_ack: 1 };

            pub const KERNEL_OUTBOUND: ClientConfig = ClientConfig { instance: 0, owner: 1, src: 1, dst: 3 };
            pub const KERNEL_INBOUND: ClientConfig = ClientConfig { instance: 1, owner: 1, src: 3, dst: 1 };

            pub const CLIENTS: &[(&str, ClientConfig)] = &[
                ("mbox-kernel-outbound", KERNEL_OUTBOUND),
                ("mbox-kernel-inbound", KERNEL_INBOUND),
                ("mbox-user-0", ClientConfig { instance: 2, owner: 1, src: 1, dst: 3 }),
            ];
        }
    }
}
