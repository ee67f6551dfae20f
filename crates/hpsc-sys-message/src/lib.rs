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

//! The system-message protocol layered on the notification bus (§4.7):
//! envelope encoders/decoders, the per-type dispatch table, and the
//! caller-side retry helper for outbound sends.

#![cfg_attr(not(test), no_std)]

mod dispatch;
mod envelope;
mod retry;

pub use dispatch::Dispatcher;
pub use envelope::{
    decode_lifecycle, decode_watchdog_timeout, lifecycle, pong_echo, watchdog_timeout, LifecycleStatus,
    MessageType, MESSAGE_TYPE_COUNT,
};
pub use retry::{with_retry, RetryConfig};
