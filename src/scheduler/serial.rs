//! Serializes concurrently-resolving async work back into arrival order.
//!
//! Async-capable transforms (`ops::map`, `ops::filter`) hand every upstream
//! value to a task future. Tasks start immediately and run concurrently, but
//! a task's resolved values are withheld until every earlier task has
//! emitted or been abandoned, so downstream always observes results in the
//! order the inputs arrived — regardless of per-task latency.

use std::{collections::VecDeque, future::Future};

use smallvec::SmallVec;

use crate::{
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler,
  subscription::SubscriptionObserver,
};

/// Values a single task releases downstream. Almost always exactly one.
pub type TaskOutput<Item> = SmallVec<[Item; 1]>;

enum Slot<Item> {
  Pending,
  Resolved(TaskOutput<Item>),
}

struct SerialState<Item, Err> {
  downstream: SubscriptionObserver<Item, Err>,
  slots: VecDeque<Slot<Item>>,
  /// Sequence number of `slots.front()`.
  head: u64,
  /// Sequence number handed to the next scheduled task.
  tail: u64,
  source_done: bool,
  stopped: bool,
}

/// One serializer per transforming subscription.
pub struct SerialScheduler<Item, Err> {
  state: MutRc<SerialState<Item, Err>>,
}

impl<Item, Err> Clone for SerialScheduler<Item, Err> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<Item: 'static, Err: 'static> SerialScheduler<Item, Err> {
  pub fn new(downstream: SubscriptionObserver<Item, Err>) -> Self {
    Self {
      state: MutRc::own(SerialState {
        downstream,
        slots: VecDeque::new(),
        head: 0,
        tail: 0,
        source_done: false,
        stopped: false,
      }),
    }
  }

  /// Starts `task` immediately; releases its values downstream only once
  /// every earlier task has emitted or been abandoned. A task resolving
  /// `Err` forwards the error downstream right away.
  pub fn schedule<F>(&self, task: F)
  where
    F: Future<Output = Result<TaskOutput<Item>, Err>> + 'static,
  {
    let seq = {
      let mut state = self.state.rc_deref_mut();
      if state.stopped {
        return;
      }
      state.slots.push_back(Slot::Pending);
      let seq = state.tail;
      state.tail += 1;
      seq
    };

    let state = self.state.clone();
    scheduler::spawn(async move {
      let result = task.await;
      resolve(&state, seq, result);
    });
  }

  /// Marks that no further input arrives. The terminal completion is
  /// forwarded once every outstanding task has resolved.
  pub fn complete(&self) {
    let finished = {
      let mut state = self.state.rc_deref_mut();
      if state.stopped {
        return;
      }
      state.source_done = true;
      state.slots.is_empty()
    };
    if finished {
      finish(&self.state);
    }
  }

  /// Forwards `err` downstream immediately, discarding the results of every
  /// still-pending task.
  pub fn error(&self, err: Err) { fail(&self.state, err); }
}

fn resolve<Item: 'static, Err: 'static>(
  state: &MutRc<SerialState<Item, Err>>, seq: u64, result: Result<TaskOutput<Item>, Err>,
) {
  {
    let mut guard = state.rc_deref_mut();
    // Abandoned work: the downstream was unsubscribed or an error already
    // went out while this task was in flight.
    if guard.stopped || guard.downstream.is_closed() {
      return;
    }
    match result {
      Ok(values) => {
        let index = (seq - guard.head) as usize;
        guard.slots[index] = Slot::Resolved(values);
      }
      Err(err) => {
        drop(guard);
        fail(state, err);
        return;
      }
    }
  }
  drain(state);
}

fn drain<Item: 'static, Err: 'static>(state: &MutRc<SerialState<Item, Err>>) {
  loop {
    let ready = {
      let mut guard = state.rc_deref_mut();
      if guard.stopped {
        return;
      }
      match guard.slots.front() {
        Some(Slot::Resolved(_)) => match guard.slots.pop_front() {
          Some(Slot::Resolved(values)) => {
            guard.head += 1;
            Some((values, guard.downstream.clone()))
          }
          _ => None,
        },
        _ => None,
      }
    };

    match ready {
      Some((values, downstream)) => {
        for value in values {
          if downstream.is_closed() {
            return;
          }
          downstream.next(value);
        }
      }
      None => break,
    }
  }

  let finished = {
    let guard = state.rc_deref();
    !guard.stopped && guard.source_done && guard.slots.is_empty()
  };
  if finished {
    finish(state);
  }
}

fn finish<Item: 'static, Err: 'static>(state: &MutRc<SerialState<Item, Err>>) {
  let downstream = {
    let mut guard = state.rc_deref_mut();
    guard.stopped = true;
    guard.downstream.clone()
  };
  downstream.complete();
}

fn fail<Item: 'static, Err: 'static>(state: &MutRc<SerialState<Item, Err>>, err: Err) {
  let downstream = {
    let mut guard = state.rc_deref_mut();
    if guard.stopped {
      return;
    }
    guard.stopped = true;
    guard.slots.clear();
    guard.downstream.clone()
  };
  downstream.error(err);
}
