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

//! A small bump-free heap for the no_std binaries that embed this core.
//! Nothing in this workspace's own crates needs heap allocation today — the
//! notification bus sizes its registry as a fixed array, not a `Vec` — but a
//! downstream binary's own platform glue (device-tree parsing, a
//! `alloc::string::String` for a formatted device name, ...) may need one,
//! so the allocator is exposed behind this feature rather than assumed.

#![cfg(feature = "global_allocator")]

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use linked_list_allocator::Heap;
use spin::Mutex;

pub struct MboxHeap {
    heap: Mutex<Heap>,
}

impl MboxHeap {
    pub const fn empty() -> Self { Self { heap: Mutex::new(Heap::empty()) } }

    /// # Safety
    /// Must be called exactly once, before any allocation, with a region
    /// that is not aliased by anything else.
    pub unsafe fn init(&self, start_addr: *mut u8, size: usize) {
        self.heap.lock().init(start_addr, size);
    }

    pub fn used(&self) -> usize { self.heap.lock().used() }
    pub fn free(&self) -> usize { self.heap.lock().free() }
}

unsafe impl GlobalAlloc for MboxHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.heap
            .lock()
            .allocate_first_fit(layout)
            .map_or(ptr::null_mut(), |a| a.as_ptr())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.heap.lock().deallocate(NonNull::new_unchecked(ptr), layout)
    }
}

#[cfg(not(test))]
#[global_allocator]
pub static ALLOCATOR: MboxHeap = MboxHeap::empty();
