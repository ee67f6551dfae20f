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

//! Ambient stack shared by every mailbox-core crate: logging, a panic hook,
//! and (optionally) a global heap. Nothing here is specific to the mailbox
//! protocol; it is the equivalent of what `cantrip-os-common` provides to
//! the CAmkES components it supports.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod allocator;
pub mod logger;
pub mod panic;
