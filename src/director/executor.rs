//! Single-threaded cooperative executor for slide scripts.
//!
//! Nothing here wakes tasks: the owner polls after every frame update and
//! after every input event, and tasks re-check their condition when polled.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    task::{Context, Waker},
};

type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// Upper bound on back-to-back polls in one `run_until_stalled` call.
const MAX_PASSES: usize = 1000;

#[derive(Default)]
pub(crate) struct LocalExecutor {
    tasks: RefCell<Vec<LocalTask>>,
    incoming: RefCell<Vec<LocalTask>>,
    nudged: Cell<bool>,
    polling: Cell<bool>,
}

impl LocalExecutor {
    pub(crate) fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        self.incoming.borrow_mut().push(Box::pin(task));
        self.nudged.set(true);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.borrow().len() + self.incoming.borrow().len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.len() == 0
    }

    /// Polls every task once. Returns whether another pass could make progress.
    pub(crate) fn poll_once(&self) -> bool {
        if self.polling.get() {
            // Re-entrant call from inside a task; the outer pass picks the work up.
            self.nudged.set(true);
            return false;
        }
        self.polling.set(true);
        self.nudged.set(false);

        let mut running = std::mem::take(&mut *self.tasks.borrow_mut());
        running.append(&mut self.incoming.borrow_mut());
        let before = running.len();

        let mut cx = Context::from_waker(Waker::noop());
        running.retain_mut(|task| task.as_mut().poll(&mut cx).is_pending());
        let completed = before - running.len();

        self.tasks.borrow_mut().extend(running);
        self.polling.set(false);
        completed > 0 || self.nudged.get() || !self.incoming.borrow().is_empty()
    }

    pub(crate) fn run_until_stalled(&self) {
        for _ in 0..MAX_PASSES {
            if !self.poll_once() {
                return;
            }
        }
        tracing::warn!(tasks = self.len(), "slide scripts are still busy after {MAX_PASSES} passes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{rc::Rc, task::Poll};

    struct Countdown(Rc<Cell<u32>>);

    impl Future for Countdown {
        type Output = ();

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
            if self.0.get() == 0 {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        }
    }

    #[test]
    fn pending_tasks_resume_when_polled_again() {
        let ex = LocalExecutor::default();
        let gate = Rc::new(Cell::new(1));
        let done = Rc::new(Cell::new(false));
        let (g, d) = (gate.clone(), done.clone());
        ex.spawn(async move {
            Countdown(g).await;
            d.set(true);
        });
        ex.run_until_stalled();
        assert!(!done.get());
        assert_eq!(ex.len(), 1);

        gate.set(0);
        ex.run_until_stalled();
        assert!(done.get());
        assert!(ex.is_idle());
    }

    #[test]
    fn tasks_spawned_by_tasks_run_in_the_same_stall_loop() {
        let ex = Rc::new(LocalExecutor::default());
        let hits = Rc::new(Cell::new(0));
        let (inner_ex, h) = (ex.clone(), hits.clone());
        ex.spawn(async move {
            let h2 = h.clone();
            inner_ex.spawn(async move { h2.set(h2.get() + 10) });
            h.set(h.get() + 1);
        });
        ex.run_until_stalled();
        assert_eq!(hits.get(), 11);
    }
}
