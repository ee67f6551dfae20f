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

//! The 64-byte message envelope (§4.7, §6): byte 0 is the type tag, bytes
//! 1-3 are reserved and zero, bytes 4-63 are the type-specific payload.

use hpsc_mbox_support::{RawEnvelope, ENVELOPE_LEN};
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// The type tags enumerated in §6. Values are the wire encoding (byte 0).
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum MessageType {
    Nop = 0,
    Ping = 1,
    Pong = 2,
    ReadValue = 3,
    WriteStatus = 4,
    ReadFile = 5,
    WriteFile = 6,
    ReadProp = 7,
    WriteProp = 8,
    ReadAddr = 9,
    WriteAddr = 10,
    WatchdogTimeout = 11,
    Fault = 12,
    Lifecycle = 13,
    Action = 14,
}

/// Count of legal type tags; `process(envelope_with_tag(t))` must return
/// `InvalidArgument` for every `t >= MESSAGE_TYPE_COUNT` (§4.7, §8).
pub const MESSAGE_TYPE_COUNT: u8 = 15;

/// LIFECYCLE payload status (§6): `UP` at boot completion, `DOWN` at
/// shutdown initiation or on a fatal local event (§4.8).
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, FromPrimitive, IntoPrimitive)]
pub enum LifecycleStatus {
    #[default]
    Up = 0,
    Down = 1,
}

const LIFECYCLE_STATUS_OFFSET: usize = 4;
const LIFECYCLE_INFO_OFFSET: usize = 8;
const LIFECYCLE_INFO_MAX: usize = ENVELOPE_LEN - LIFECYCLE_INFO_OFFSET;

/// Encodes a LIFECYCLE envelope: a u32 status followed by up to
/// `LIFECYCLE_INFO_MAX` bytes of nul-terminated informational text (§6).
/// `info` is silently truncated to fit; callers that need the full text
/// delivered should keep it under that bound.
pub fn lifecycle(status: LifecycleStatus, info: Option<&str>) -> RawEnvelope {
    let mut env = [0u8; ENVELOPE_LEN];
    env[0] = MessageType::Lifecycle.into();
    env[LIFECYCLE_STATUS_OFFSET..LIFECYCLE_STATUS_OFFSET + 4]
        .copy_from_slice(&u32::from(status).to_le_bytes());
    if let Some(info) = info {
        let bytes = info.as_bytes();
        let n = bytes.len().min(LIFECYCLE_INFO_MAX - 1);
        env[LIFECYCLE_INFO_OFFSET..LIFECYCLE_INFO_OFFSET + n].copy_from_slice(&bytes[..n]);
        // The remaining bytes are already zero, which is the nul terminator.
    }
    env
}

/// Decodes a LIFECYCLE envelope's status and informational text. Returns
/// `None` for the text if it contains no nul-terminated content.
pub fn decode_lifecycle(env: &RawEnvelope) -> (LifecycleStatus, Option<&str>) {
    let status_word = u32::from_le_bytes(
        env[LIFECYCLE_STATUS_OFFSET..LIFECYCLE_STATUS_OFFSET + 4].try_into().unwrap(),
    );
    let status = LifecycleStatus::from(status_word);
    let info_bytes = &env[LIFECYCLE_INFO_OFFSET..];
    let len = info_bytes.iter().position(|&b| b == 0).unwrap_or(info_bytes.len());
    let info = if len == 0 { None } else { core::str::from_utf8(&info_bytes[..len]).ok() };
    (status, info)
}

const WATCHDOG_CPU_OFFSET: usize = 4;

/// Encodes a WATCHDOG_TIMEOUT envelope: the 4-byte cpu id (§4.8, §6).
pub fn watchdog_timeout(cpu_id: u32) -> RawEnvelope {
    let mut env = [0u8; ENVELOPE_LEN];
    env[0] = MessageType::WatchdogTimeout.into();
    env[WATCHDOG_CPU_OFFSET..WATCHDOG_CPU_OFFSET + 4].copy_from_slice(&cpu_id.to_le_bytes());
    env
}

/// Decodes a WATCHDOG_TIMEOUT envelope's cpu id.
pub fn decode_watchdog_timeout(env: &RawEnvelope) -> u32 {
    u32::from_le_bytes(env[WATCHDOG_CPU_OFFSET..WATCHDOG_CPU_OFFSET + 4].try_into().unwrap())
}

/// Composes a PONG that mirrors a PING's bytes 1..63 verbatim (§4.7, §8's
/// echo law). The source envelope has already been copied off any MMIO
/// DATA register via `hpsc_mbox_support::mmio::read_envelope` by the time
/// it reaches this layer, so a plain slice copy here does not reintroduce
/// the byte-wise-MMIO-access bug §9 warns about — it is RAM to RAM.
pub fn pong_echo(ping: &RawEnvelope) -> RawEnvelope {
    let mut pong = *ping;
    pong[0] = MessageType::Pong.into();
    pong
}
