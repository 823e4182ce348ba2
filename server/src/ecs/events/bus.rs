//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Event bus shared by every landblock group
//!
//! Groups tick on separate tokio tasks and all publish into one queue.
//! Subscribers only ever run from [`EventBus::dispatch`], called by whoever
//! owns the tick loop once the groups are done, so a handler never sees a
//! half-finished tick.

use super::types::GameEvent;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub type EventHandler = Box<dyn Fn(&GameEvent) + Send + Sync>;

#[derive(Default)]
struct Shared {
    queue: Mutex<Vec<GameEvent>>,
    handlers: RwLock<Vec<EventHandler>>,
}

/// Cloneable handle to the shared event queue
#[derive(Clone, Default)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler run for every dispatched event
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&GameEvent) + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Queue an event. Never runs handlers.
    pub fn publish(&self, event: GameEvent) {
        self.lock_queue().push(event);
    }

    /// Take every queued event without running handlers
    pub fn drain(&self) -> Vec<GameEvent> {
        std::mem::take(&mut *self.lock_queue())
    }

    /// Run the handlers over everything queued so far
    ///
    /// The queue is released before any handler runs, so handlers may
    /// publish. Those events wait for the next dispatch. Returns the number
    /// of events dispatched.
    pub fn dispatch(&self) -> usize {
        let events = self.drain();
        let handlers = self.shared.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for event in &events {
            for handler in handlers.iter() {
                handler(event);
            }
        }
        events.len()
    }

    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Vec<GameEvent>> {
        self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("pending", &self.pending()).finish()
    }
}
