//! Explicit per-frame clock that replaces an ambient animation-frame global.
//!
//! Hosts call [`RenderLoop::step`] once per displayed frame. Listeners may
//! register or remove listeners (including themselves) while being dispatched;
//! such changes take effect from the next dispatch.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt,
    rc::{Rc, Weak},
};

use crate::anim::AnimationState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopEvent {
    Update,
    Render,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameEvent {
    /// Seconds since the loop started.
    pub t: f64,
    /// Seconds since the previous frame.
    pub delta: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listen {
    Continue,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback = Box<dyn FnMut(&FrameEvent) -> Listen>;

struct Listener {
    id: ListenerId,
    event: LoopEvent,
    callback: Callback,
    alive: bool,
}

/// `(target address, property)` pairs currently driven by an animation.
pub(crate) type ClaimKey = (usize, String);

#[derive(Default)]
struct LoopState {
    t: f64,
    frame: u64,
    next_id: u64,
    listeners: Vec<Listener>,
    removed: HashSet<ListenerId>,
    dispatching: bool,
    claims: HashMap<ClaimKey, Weak<RefCell<AnimationState>>>,
}

#[derive(Clone, Default)]
pub struct RenderLoop {
    state: Rc<RefCell<LoopState>>,
}

impl fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("RenderLoop")
            .field("t", &s.t)
            .field("frame", &s.frame)
            .field("listeners", &s.listeners.len())
            .finish()
    }
}

/// Non-owning loop handle for listeners that must not keep the loop alive.
#[derive(Clone)]
pub(crate) struct WeakRenderLoop(Weak<RefCell<LoopState>>);

impl WeakRenderLoop {
    pub(crate) fn upgrade(&self) -> Option<RenderLoop> {
        self.0.upgrade().map(|state| RenderLoop { state })
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> WeakRenderLoop {
        WeakRenderLoop(Rc::downgrade(&self.state))
    }

    pub fn time(&self) -> f64 {
        self.state.borrow().t
    }

    pub fn frame(&self) -> u64 {
        self.state.borrow().frame
    }

    pub fn on(
        &self,
        event: LoopEvent,
        callback: impl FnMut(&FrameEvent) -> Listen + 'static,
    ) -> ListenerId {
        let mut s = self.state.borrow_mut();
        s.next_id += 1;
        let id = ListenerId(s.next_id);
        s.listeners.push(Listener {
            id,
            event,
            callback: Box::new(callback),
            alive: true,
        });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut s = self.state.borrow_mut();
        if let Some(pos) = s.listeners.iter().position(|l| l.id == id) {
            s.listeners.remove(pos);
            return true;
        }
        if s.dispatching {
            return s.removed.insert(id);
        }
        false
    }

    /// Registered listeners for either event. Only meaningful outside a dispatch.
    pub fn listener_count(&self) -> usize {
        let s = self.state.borrow();
        s.listeners.len()
    }

    /// Advances the clock by `delta` seconds and dispatches `Update` then `Render`.
    pub fn step(&self, delta: f64) {
        let frame = {
            let mut s = self.state.borrow_mut();
            if s.dispatching {
                tracing::warn!("RenderLoop::step called from inside a listener; ignoring");
                return;
            }
            s.t += delta;
            s.frame += 1;
            FrameEvent { t: s.t, delta }
        };
        self.dispatch(LoopEvent::Update, &frame);
        self.dispatch(LoopEvent::Render, &frame);
    }

    /// Steps `frames` times with a fixed `delta`.
    pub fn run_frames(&self, frames: u64, delta: f64) {
        for _ in 0..frames {
            self.step(delta);
        }
    }

    fn dispatch(&self, event: LoopEvent, frame: &FrameEvent) {
        let mut running = {
            let mut s = self.state.borrow_mut();
            s.dispatching = true;
            std::mem::take(&mut s.listeners)
        };

        for listener in running.iter_mut().filter(|l| l.event == event) {
            if self.state.borrow().removed.contains(&listener.id) {
                listener.alive = false;
                continue;
            }
            if (listener.callback)(frame) == Listen::Stop {
                listener.alive = false;
            }
        }

        let mut s = self.state.borrow_mut();
        let added = std::mem::take(&mut s.listeners);
        let removed = std::mem::take(&mut s.removed);
        running.retain(|l| l.alive && !removed.contains(&l.id));
        running.extend(added.into_iter().filter(|l| !removed.contains(&l.id)));
        s.listeners = running;
        s.dispatching = false;
    }

    pub(crate) fn claim(
        &self,
        key: ClaimKey,
        animation: &Rc<RefCell<AnimationState>>,
    ) -> Option<Rc<RefCell<AnimationState>>> {
        let mut s = self.state.borrow_mut();
        let previous = s
            .claims
            .insert(key, Rc::downgrade(animation))
            .and_then(|w| w.upgrade());
        previous.filter(|p| !Rc::ptr_eq(p, animation))
    }

    /// Drops the claim on `key`, returning the animation that held it.
    pub(crate) fn take_claim(&self, key: &ClaimKey) -> Option<Rc<RefCell<AnimationState>>> {
        let mut s = self.state.borrow_mut();
        s.claims.remove(key).and_then(|w| w.upgrade())
    }

    pub(crate) fn release_claim(&self, key: &ClaimKey, animation: &Rc<RefCell<AnimationState>>) {
        let mut s = self.state.borrow_mut();
        let owned = s
            .claims
            .get(key)
            .and_then(Weak::upgrade)
            .is_some_and(|current| Rc::ptr_eq(&current, animation));
        if owned {
            s.claims.remove(key);
        }
    }
}
