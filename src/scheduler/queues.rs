//! The three task queues of spec §4.5: ready, time-delayed (a wake-at
//! min-heap), and suspended (keyed by task id, resumed only by `resume()`
//! or explicit connection input).

use super::task::{DelayedTask, Task, TaskId};
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::time::Instant;

#[derive(Default)]
pub struct Queues {
    pub ready: VecDeque<Task>,
    pub time_delayed: BinaryHeap<DelayedTask>,
    pub suspended: HashMap<TaskId, Task>,
}

impl Queues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every time-delayed task whose wake time has passed into ready,
    /// in wake-time order.
    pub fn wake_due(&mut self, now: Instant) {
        while let Some(top) = self.time_delayed.peek() {
            if top.wake_at > now {
                break;
            }
            let delayed = self.time_delayed.pop().unwrap();
            self.ready.push_back(delayed.task);
        }
    }

    pub fn next_wake_at(&self) -> Option<Instant> {
        self.time_delayed.peek().map(|d| d.wake_at)
    }

    /// Removes a task from whichever queue holds it. Used by `kill_task`
    /// for tasks that are not currently the one being executed.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        if let Some(pos) = self.ready.iter().position(|t| t.id == id) {
            return self.ready.remove(pos);
        }
        if let Some(task) = self.suspended.remove(&id) {
            return Some(task);
        }
        if self.time_delayed.iter().any(|d| d.task.id == id) {
            let mut rest = Vec::new();
            let mut found = None;
            for d in self.time_delayed.drain() {
                if d.task.id == id {
                    found = Some(d.task);
                } else {
                    rest.push(d);
                }
            }
            self.time_delayed.extend(rest);
            return found;
        }
        None
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.ready.iter().any(|t| t.id == id)
            || self.suspended.contains_key(&id)
            || self.time_delayed.iter().any(|d| d.task.id == id)
    }
}
