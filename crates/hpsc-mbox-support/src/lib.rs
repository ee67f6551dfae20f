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

//! Shared error type and MMIO copy helpers used across the mailbox stack.

#![no_std]

pub mod mmio;

use num_enum::{FromPrimitive, IntoPrimitive};

/// The error kinds used by every public operation in the mailbox core (§7).
#[repr(usize)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum MboxError {
    Success = 0,
    /// Resource already claimed (an instance or device is already open).
    Busy,
    /// Transient condition; the caller may retry.
    TryAgain,
    /// Malformed input (oversize write, unknown message type).
    InvalidArgument,
    /// No transport registered, or the channel/device has been closed.
    NoDevice,
    /// The hardware returned a mismatch or timed out.
    IoFailure,
    /// Read-back src/dst differs from what the client expected.
    ConfigMismatch,
    /// The receive slot was already full when a message arrived.
    NoBufferSpace,
    /// Message dropped because the owning channel was closed.
    Pipe,
    #[default]
    UnknownError,
}

impl From<MboxError> for Result<(), MboxError> {
    fn from(err: MboxError) -> Result<(), MboxError> {
        if err == MboxError::Success {
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// A 64-byte message envelope, the unit of exchange for every transport
/// (§3, §6). Stored as plain bytes; `hpsc-sys-message` interprets the
/// type tag and payload.
pub type RawEnvelope = [u8; 64];

pub const ENVELOPE_LEN: usize = 64;
pub const ENVELOPE_WORDS: usize = ENVELOPE_LEN / 4;

/// Capability a client hands to a channel at `open` so the channel's
/// interrupt-context up-call can reach it without holding a pointer back to
/// the owning struct (§9, "callback-based up-calls from ISR to client").
pub trait RxCap: Sync {
    fn received(&self, payload: &RawEnvelope);
}

/// Counterpart capability for the send-completion up-call.
pub trait TxCap: Sync {
    fn tx_done(&self, outcome: TxOutcome);
}

/// What a tx-done up-call reported. The hardware has only one completion
/// event for both outcomes (§4.1); today it always resolves to `Ack`, but
/// the shape leaves room for a future revision with a distinct nack event
/// (§9 open question) without changing every caller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TxOutcome {
    Ack,
    Nack(MboxError),
}

/// The capability a channel slot holds once its client has detached.
/// Swapping a slot to this sentinel is the "atomic replace" §9 asks for:
/// any up-call racing the detach lands here instead of on freed state.
pub struct ClosedCap;

impl RxCap for ClosedCap {
    fn received(&self, _payload: &RawEnvelope) {}
}

impl TxCap for ClosedCap {
    fn tx_done(&self, _outcome: TxOutcome) {}
}

pub static CLOSED_CAP: ClosedCap = ClosedCap;

/// Replaces the pointer-typed "payload or error" argument to `send` (§9)
/// with a tagged variant: a real payload goes out as event A, a `Nack`
/// pulses event B carrying a reason that exists only in local state (the
/// wire has no side channel for it).
#[derive(Copy, Clone, Debug)]
pub enum SendRequest {
    Send { payload: RawEnvelope },
    Nack { reason: MboxError },
}
