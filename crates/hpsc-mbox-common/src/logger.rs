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

//! A `log::Log` implementation that never allocates on the hot path: it
//! formats into a fixed stack buffer and hands the result to an injected
//! byte sink. The sink is whatever the platform init code wires up (a UART
//! driver, a ring buffer drained by the management cluster, `stderr` in
//! host-side tests); wiring that up is a platform concern, not this crate's.

use core::str::from_utf8_unchecked;
use core2::io::{Cursor, Write};
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

pub const MAX_MSG_LEN: usize = 512;

/// A destination for formatted log lines. Implementors must not block for
/// unbounded time; the mailbox IRQ paths may log from interrupt context.
pub trait LogSink: Sync {
    fn write_line(&self, level: Level, line: &str);
}

pub struct MboxLogger<'a> {
    sink: Mutex<&'a dyn LogSink>,
}

impl<'a> MboxLogger<'a> {
    pub const fn new(sink: &'a dyn LogSink) -> Self { Self { sink: Mutex::new(sink) } }

    /// Installs this logger as the global `log` sink. Call once at init.
    pub fn install(&'static self, level: LevelFilter) {
        log::set_logger(self).unwrap_or(());
        log::set_max_level(level);
    }
}

impl<'a> Log for MboxLogger<'a> {
    fn enabled(&self, _metadata: &Metadata) -> bool { true }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut buf = [0u8; MAX_MSG_LEN];
        let mut cur = Cursor::new(&mut buf[..]);
        if write!(&mut cur, "{}::{}", record.target(), record.args()).is_err() {
            cur.set_position((MAX_MSG_LEN - 3) as u64);
            let _ = cur.write(b"...");
        }
        let pos = cur.position() as usize;
        // SAFETY: everything written above came from `core::fmt` formatting
        // of `&str`/numeric arguments, so the buffer is valid UTF-8.
        let line = unsafe { from_utf8_unchecked(&buf[..pos]) };
        self.sink.lock().write_line(record.level(), line);
    }

    fn flush(&self) {}
}
