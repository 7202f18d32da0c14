use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::domain::types::QueueSnapshot;

#[derive(Debug)]
pub struct CommandQueue<T> {
    pending: Mutex<VecDeque<T>>,
}

impl<T> CommandQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, value: T) {
        self.pending.lock().push_back(value);
    }

    pub fn drain(&self) -> Vec<T> {
        self.pending.lock().drain(..).collect()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            pending: self.pending.lock().len(),
        }
    }
}
