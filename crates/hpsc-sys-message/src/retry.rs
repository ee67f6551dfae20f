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

//! The caller-side retry loop for the System-Message send path (§6, §7):
//! `TryAgain` is retried up to `retries` times with `retry_delay_us`
//! between attempts, then surfaced. `with_retry` takes the delay as an
//! injected closure so tests can run the loop against a fake clock instead
//! of sleeping for real (§9's "bounded sleep primitive" spirit, applied
//! here to a caller-side retry rather than the SHMem poll loop).

use hpsc_mbox_support::MboxError;

/// The two process-wide retry knobs (§6): `retries` (default 10) and
/// `retry_delay_us` (default 100).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RetryConfig {
    pub retries: u32,
    pub retry_delay_us: u32,
}

impl Default for RetryConfig {
    fn default() -> Self { Self { retries: 10, retry_delay_us: 100 } }
}

/// Calls `send` until it returns something other than `TryAgain`, or until
/// `cfg.retries` attempts beyond the first have been made. `delay_us` is
/// invoked between attempts with `cfg.retry_delay_us`.
pub fn with_retry<S, D>(mut send: S, cfg: RetryConfig, mut delay_us: D) -> Result<(), MboxError>
where
    S: FnMut() -> Result<(), MboxError>,
    D: FnMut(u32),
{
    let mut attempts = 0;
    loop {
        match send() {
            Ok(()) => return Ok(()),
            Err(MboxError::TryAgain) if attempts < cfg.retries => {
                attempts += 1;
                delay_us(cfg.retry_delay_us);
            }
            Err(e) => return Err(e),
        }
    }
}
