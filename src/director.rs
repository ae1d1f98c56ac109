//! Slide sequencing with undo/redo on top of [`Animation`].
//!
//! A slide script is an `async` block that calls [`Director::transition_to`],
//! [`Director::delay`] and [`Director::next_slide`]. Every call is recorded on
//! an append-only undo stack; backward presses walk the stack and reverse
//! entries up to the previous slide marker, forward presses replay them.

pub mod deck;
mod executor;
pub mod undo;

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, Poll},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    anim::{
        AnimTarget, Animatable, Animation, AnimationOptions, Value, Values, cancel_properties,
        target_key, values,
    },
    foundation::error::{ExpError, ExpResult},
    render_loop::{Listen, ListenerId, LoopEvent, RenderLoop},
};

use self::{
    deck::{ArrowVisibility, NavKey, SlideDeck},
    executor::LocalExecutor,
    undo::UndoItem,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Undo replays delays and transitions this many times faster.
    pub undo_speedup: f64,
    /// Executor passes `dispose` spends finishing suspended scripts.
    pub dispose_iterations: usize,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            undo_speedup: 5.0,
            dispose_iterations: 300,
        }
    }
}

impl DirectorConfig {
    fn validate(&self) -> ExpResult<()> {
        if !(self.undo_speedup.is_finite() && self.undo_speedup > 0.0) {
            return Err(ExpError::validation(format!(
                "undo_speedup must be positive, got {}",
                self.undo_speedup
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Replay {
    Forwards,
    Backwards,
    Idle,
}

struct CachedProps {
    target: Weak<RefCell<dyn Animatable>>,
    values: Values,
}

struct DirectorState {
    initialized: bool,
    disposed: bool,
    current_slide_index: usize,
    furthest_slide_index: usize,
    /// `next_slide` calls so far.
    num_slides: usize,
    undo_stack: Vec<UndoItem>,
    /// Entry that reflects where the presentation logically is; `None` before the first.
    undo_stack_index: Option<usize>,
    replay: Replay,
    num_arrow_presses: u64,
    waiter: Option<u64>,
    released_upto: u64,
    next_token: u64,
    props_cache: HashMap<usize, CachedProps>,
    listener: Option<ListenerId>,
}

impl Default for DirectorState {
    fn default() -> Self {
        Self {
            initialized: false,
            disposed: false,
            current_slide_index: 0,
            furthest_slide_index: 0,
            num_slides: 0,
            undo_stack: Vec::new(),
            undo_stack_index: None,
            replay: Replay::Idle,
            num_arrow_presses: 0,
            waiter: None,
            released_upto: 0,
            next_token: 0,
            props_cache: HashMap::new(),
            listener: None,
        }
    }
}

impl DirectorState {
    fn is_caught_up(&self) -> bool {
        self.undo_stack_index == self.undo_stack.len().checked_sub(1)
    }

    /// Appends `item` if nothing is waiting to be redone.
    fn record(&mut self, item: UndoItem) -> bool {
        if !self.is_caught_up() {
            return false;
        }
        self.undo_stack.push(item);
        self.undo_stack_index = Some(self.undo_stack.len() - 1);
        true
    }

    fn register_waiter(&mut self) -> u64 {
        self.next_token += 1;
        if self.waiter.replace(self.next_token).is_some() {
            tracing::warn!("a previous suspension was still waiting; it now waits for the next release");
        }
        self.next_token
    }

    fn release(&mut self) {
        if let Some(token) = self.waiter.take() {
            self.released_upto = self.released_upto.max(token);
        }
    }

    fn preempted(&self, direction: Replay, presses: u64) -> bool {
        self.replay != direction || self.num_arrow_presses != presses
    }
}

struct Inner {
    config: DirectorConfig,
    render_loop: RenderLoop,
    state: RefCell<DirectorState>,
    deck: RefCell<Option<Rc<RefCell<dyn SlideDeck>>>>,
    executor: LocalExecutor,
}

/// Cheap, clonable handle; slide scripts hold their own clone.
#[derive(Clone)]
pub struct Director {
    inner: Rc<Inner>,
}

impl fmt::Debug for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.inner.state.borrow();
        f.debug_struct("Director")
            .field("current_slide_index", &s.current_slide_index)
            .field("num_slides", &s.num_slides)
            .field("undo_stack", &s.undo_stack.len())
            .field("undo_stack_index", &s.undo_stack_index)
            .finish()
    }
}

/// Resolves once the director releases `token` (or is disposed).
struct WaitForRelease {
    inner: Weak<Inner>,
    token: u64,
}

impl Future for WaitForRelease {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Poll::Ready(());
        };
        let s = inner.state.borrow();
        if s.disposed || s.released_upto >= self.token {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Resolves once the render loop's clock passes `deadline` (or on dispose).
struct Sleep {
    inner: Weak<Inner>,
    deadline: f64,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Poll::Ready(());
        };
        if inner.state.borrow().disposed || inner.render_loop.time() >= self.deadline {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Director {
    pub fn new(render_loop: &RenderLoop, config: DirectorConfig) -> ExpResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Rc::new(Inner {
                config,
                render_loop: render_loop.clone(),
                state: RefCell::new(DirectorState::default()),
                deck: RefCell::new(None),
                executor: LocalExecutor::default(),
            }),
        })
    }

    /// Shows the first slide and starts polling scripts on every frame update.
    #[tracing::instrument(skip_all)]
    pub fn begin(&self, deck: Rc<RefCell<dyn SlideDeck>>) -> ExpResult<()> {
        {
            let s = self.inner.state.borrow();
            if s.initialized {
                return Err(ExpError::director("begin() was already called"));
            }
            if s.disposed {
                return Err(ExpError::director("director was disposed"));
            }
        }
        let slides = deck.borrow().num_slides();
        if slides == 0 {
            return Err(ExpError::director("the slide deck has no slides"));
        }
        deck.borrow_mut().show_slide(0);
        *self.inner.deck.borrow_mut() = Some(deck);

        let weak = Rc::downgrade(&self.inner);
        let listener = self
            .inner
            .render_loop
            .on(LoopEvent::Update, move |_| match weak.upgrade() {
                Some(inner) => {
                    inner.executor.run_until_stalled();
                    Listen::Continue
                }
                None => Listen::Stop,
            });
        {
            let mut s = self.inner.state.borrow_mut();
            s.initialized = true;
            s.listener = Some(listener);
        }
        self.show_arrows();
        tracing::debug!(slides, "director started");
        Ok(())
    }

    /// Spawns a slide script. Errors it returns are logged.
    pub fn run<F, Fut>(&self, script: F) -> ExpResult<()>
    where
        F: FnOnce(Director) -> Fut,
        Fut: Future<Output = ExpResult<()>> + 'static,
    {
        self.ensure_initialized()?;
        let task = script(self.clone());
        self.inner.executor.spawn(async move {
            if let Err(err) = task.await {
                tracing::error!(%err, "slide script failed");
            }
        });
        self.inner.executor.run_until_stalled();
        Ok(())
    }

    /// Marks a slide boundary and suspends until the viewer moves forward.
    pub async fn next_slide(&self) -> ExpResult<()> {
        self.ensure_initialized()?;
        if self.is_disposed() {
            return Ok(());
        }
        let token = {
            let mut s = self.inner.state.borrow_mut();
            s.num_slides += 1;
            let slide_index = s.current_slide_index;
            if !s.record(UndoItem::NewSlide { slide_index }) {
                tracing::warn!("next_slide() called while replaying; not recorded for undo");
            }
            s.register_waiter()
        };
        self.show_arrows();
        tracing::debug!(token, "waiting for the next slide");
        self.wait_for_release(token).await;
        Ok(())
    }

    /// Sleeps for `wait` of render-loop time.
    ///
    /// If the viewer undoes past this point meanwhile, the script stays
    /// suspended until forward replay catches up again.
    pub async fn delay(&self, wait: Duration) -> ExpResult<()> {
        self.ensure_initialized()?;
        if self.is_disposed() {
            return Ok(());
        }
        if !self.inner.state.borrow_mut().record(UndoItem::Delay { wait }) {
            tracing::warn!("delay() called while replaying; not recorded for undo");
        }
        self.sleep(wait).await;

        if !self.is_caught_up() && !self.is_disposed() {
            tracing::warn!("viewer went back during delay(); waiting for replay to catch up");
            let token = self.inner.state.borrow_mut().register_waiter();
            self.wait_for_release(token).await;
        }
        Ok(())
    }

    /// Tweens `target`, recording the step for undo.
    ///
    /// Start values come from the last values this director set on the
    /// target, so outside edits between slides do not corrupt the undo path.
    pub fn transition_to<K, V>(
        &self,
        target: AnimTarget,
        to_values: impl IntoIterator<Item = (K, V)>,
        duration: Duration,
        options: AnimationOptions,
    ) -> ExpResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.ensure_initialized()?;
        options.validate()?;
        let to_values = values(to_values);
        let from_values = self.from_values(&target, &to_values)?;

        if self.is_disposed() {
            self.apply_values(&target, &to_values);
            self.remember(&target, &to_values);
            return Ok(());
        }
        Animation::start_from(
            &self.inner.render_loop,
            target.clone(),
            to_values.clone(),
            from_values.clone(),
            duration,
            options,
        )?;
        // Only values that actually started become the next undo baseline.
        self.remember(&target, &to_values);

        let recorded = self.inner.state.borrow_mut().record(UndoItem::Transition {
            target,
            to_values,
            from_values,
            duration,
            options,
        });
        if !recorded {
            tracing::warn!("transition_to() called while replaying; it will not be undoable");
        }
        Ok(())
    }

    /// Sets values immediately, recording the step for undo.
    pub fn transition_instantly<K, V>(
        &self,
        target: AnimTarget,
        to_values: impl IntoIterator<Item = (K, V)>,
    ) -> ExpResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.ensure_initialized()?;
        let to_values = values(to_values);
        let from_values = self.from_values(&target, &to_values)?;
        self.remember(&target, &to_values);
        self.apply_values(&target, &to_values);

        let recorded = self.inner.state.borrow_mut().record(UndoItem::Instant {
            target,
            to_values,
            from_values,
        });
        if !recorded {
            tracing::warn!("transition_instantly() called while replaying; it will not be undoable");
        }
        Ok(())
    }

    pub fn handle_key(&self, key: NavKey, repeat: bool) {
        if repeat {
            return;
        }
        if key.is_forward() {
            self.press_forward();
        } else {
            self.press_backward();
        }
    }

    pub fn press_forward(&self) {
        if self.accepting_input() {
            self.inner
                .executor
                .spawn(self.clone().handle_forwards_press());
            self.inner.executor.run_until_stalled();
        }
    }

    pub fn press_backward(&self) {
        if self.accepting_input() {
            self.inner
                .executor
                .spawn(self.clone().handle_backwards_press());
            self.inner.executor.run_until_stalled();
        }
    }

    /// Fast-forwards suspended scripts, then detaches from the render loop.
    #[tracing::instrument(skip_all)]
    pub fn dispose(&self) {
        {
            let mut s = self.inner.state.borrow_mut();
            if s.disposed {
                return;
            }
            s.disposed = true;
            s.waiter = None;
        }
        let executor = &self.inner.executor;
        for _ in 0..self.inner.config.dispose_iterations {
            if executor.is_idle() {
                break;
            }
            executor.poll_once();
        }
        if !executor.is_idle() {
            tracing::warn!(tasks = executor.len(), "slide scripts still pending after dispose");
        }
        let listener = self.inner.state.borrow_mut().listener.take();
        if let Some(id) = listener {
            self.inner.render_loop.remove_listener(id);
        }
        self.with_deck(|deck| deck.set_arrows(ArrowVisibility::default()));
        tracing::debug!("director disposed");
    }

    pub fn current_slide_index(&self) -> usize {
        self.inner.state.borrow().current_slide_index
    }

    pub fn furthest_slide_index(&self) -> usize {
        self.inner.state.borrow().furthest_slide_index
    }

    /// `next_slide` calls made by scripts so far.
    pub fn num_slides(&self) -> usize {
        self.inner.state.borrow().num_slides
    }

    pub fn undo_stack_len(&self) -> usize {
        self.inner.state.borrow().undo_stack.len()
    }

    pub fn undo_stack_index(&self) -> Option<usize> {
        self.inner.state.borrow().undo_stack_index
    }

    pub fn undo_stack_kinds(&self) -> Vec<&'static str> {
        self.inner.state.borrow().undo_stack.iter().map(UndoItem::kind).collect()
    }

    /// No recorded step is waiting to be redone.
    pub fn is_caught_up(&self) -> bool {
        self.inner.state.borrow().is_caught_up()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Scripts and replays that are still suspended.
    pub fn pending_tasks(&self) -> usize {
        self.inner.executor.len()
    }

    fn ensure_initialized(&self) -> ExpResult<()> {
        if self.inner.state.borrow().initialized {
            Ok(())
        } else {
            Err(ExpError::director("call begin() before using the director"))
        }
    }

    fn accepting_input(&self) -> bool {
        let s = self.inner.state.borrow();
        s.initialized && !s.disposed
    }

    fn wait_for_release(&self, token: u64) -> WaitForRelease {
        WaitForRelease {
            inner: Rc::downgrade(&self.inner),
            token,
        }
    }

    fn sleep(&self, wait: Duration) -> Sleep {
        Sleep {
            inner: Rc::downgrade(&self.inner),
            deadline: self.inner.render_loop.time() + wait.as_secs_f64(),
        }
    }

    fn with_deck(&self, f: impl FnOnce(&mut dyn SlideDeck)) {
        if let Some(deck) = self.inner.deck.borrow().as_ref() {
            f(&mut *deck.borrow_mut());
        }
    }

    fn deck_len(&self) -> usize {
        self.inner
            .deck
            .borrow()
            .as_ref()
            .map_or(0, |deck| deck.borrow().num_slides())
    }

    fn show_arrows(&self) {
        let arrows = {
            let s = self.inner.state.borrow();
            ArrowVisibility {
                back: s.current_slide_index > 0,
                forward: s.current_slide_index < s.num_slides,
            }
        };
        self.with_deck(|deck| deck.set_arrows(arrows));
    }

    fn hide_arrows(&self) {
        self.with_deck(|deck| deck.set_arrows(ArrowVisibility::default()));
    }

    fn switch_slide(&self, index: usize) {
        let index = index.min(self.deck_len().saturating_sub(1));
        {
            let mut s = self.inner.state.borrow_mut();
            s.current_slide_index = index;
            s.furthest_slide_index = s.furthest_slide_index.max(index);
        }
        self.with_deck(|deck| deck.show_slide(index));
        tracing::debug!(slide = index, "slide changed");
    }

    /// Sets values now, stopping any tween still driving them.
    fn apply_values(&self, target: &AnimTarget, values: &Values) {
        cancel_properties(&self.inner.render_loop, target, values.keys());
        let Ok(mut t) = target.try_borrow_mut() else {
            tracing::warn!("director target is busy; values not applied");
            return;
        };
        for (name, value) in values {
            if let Err(err) = t.set_property(name, value.clone()) {
                tracing::error!(property = %name, %err, "director could not set property");
            }
        }
    }

    fn from_values(&self, target: &AnimTarget, to_values: &Values) -> ExpResult<Values> {
        let s = self.inner.state.borrow();
        let cached = s
            .props_cache
            .get(&target_key(target))
            .filter(|c| c.target.upgrade().is_some_and(|t| Rc::ptr_eq(&t, target)));
        let live = target.borrow();
        to_values
            .keys()
            .map(|name| {
                cached
                    .and_then(|c| c.values.get(name).cloned())
                    .or_else(|| live.get_property(name))
                    .map(|v| (name.clone(), v))
                    .ok_or_else(|| {
                        ExpError::director(format!("transition target has no property '{name}'"))
                    })
            })
            .collect()
    }

    fn remember(&self, target: &AnimTarget, to_values: &Values) {
        let mut s = self.inner.state.borrow_mut();
        let entry = s
            .props_cache
            .entry(target_key(target))
            .or_insert_with(|| CachedProps {
                target: Rc::downgrade(target),
                values: Values::new(),
            });
        if !entry.target.upgrade().is_some_and(|t| Rc::ptr_eq(&t, target)) {
            // Address reused by a new target.
            entry.target = Rc::downgrade(target);
            entry.values.clear();
        }
        entry
            .values
            .extend(to_values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn move_further(&self) {
        let deck_len = self.deck_len();
        let (current, declared) = {
            let s = self.inner.state.borrow();
            (s.current_slide_index, s.num_slides)
        };
        if current >= declared {
            tracing::debug!(current, "no further slide has been declared yet");
            return;
        }
        if current + 1 >= deck_len {
            tracing::warn!(
                deck_len,
                "presentation calls next_slide() more often than there are slides"
            );
            return;
        }
        self.switch_slide(current + 1);
        self.inner.state.borrow_mut().release();
        self.show_arrows();
    }

    fn redo(&self, item: &UndoItem) -> Option<Sleep> {
        match item {
            UndoItem::NewSlide { .. } => None,
            UndoItem::Delay { wait } => Some(self.sleep(*wait)),
            UndoItem::Transition {
                target,
                to_values,
                from_values,
                duration,
                options,
            } => {
                if let Err(err) = Animation::start_from(
                    &self.inner.render_loop,
                    target.clone(),
                    to_values.clone(),
                    from_values.clone(),
                    *duration,
                    *options,
                ) {
                    tracing::error!(%err, "redo transition failed");
                }
                None
            }
            UndoItem::Instant {
                target, to_values, ..
            } => {
                self.apply_values(target, to_values);
                None
            }
        }
    }

    fn undo(&self, item: &UndoItem) -> Option<Sleep> {
        let speedup = self.inner.config.undo_speedup;
        match item {
            UndoItem::NewSlide { .. } => None,
            UndoItem::Delay { wait } => Some(self.sleep(wait.div_f64(speedup))),
            UndoItem::Transition {
                target,
                to_values,
                from_values,
                duration,
                options,
            } => {
                if let Err(err) = Animation::start_from(
                    &self.inner.render_loop,
                    target.clone(),
                    from_values.clone(),
                    to_values.clone(),
                    duration.div_f64(speedup),
                    *options,
                ) {
                    tracing::error!(%err, "undo transition failed");
                }
                None
            }
            UndoItem::Instant {
                target,
                from_values,
                ..
            } => {
                self.apply_values(target, from_values);
                None
            }
        }
    }

    fn item_at(&self, idx: usize) -> Option<UndoItem> {
        self.inner.state.borrow().undo_stack.get(idx).cloned()
    }

    async fn handle_forwards_press(self) {
        if self.is_caught_up() {
            self.move_further();
            return;
        }
        let (presses, mut idx) = {
            let mut s = self.inner.state.borrow_mut();
            if s.replay == Replay::Forwards {
                return;
            }
            s.replay = Replay::Forwards;
            s.num_arrow_presses += 1;
            let mut idx = s.undo_stack_index.unwrap_or(0);
            if s.undo_stack.get(idx).is_some_and(UndoItem::is_new_slide) {
                idx += 1;
            }
            (s.num_arrow_presses, idx)
        };
        self.hide_arrows();
        self.switch_slide(self.current_slide_index() + 1);
        tracing::debug!(from = idx, "replaying forwards");

        while let Some(item) = self.item_at(idx) {
            self.inner.state.borrow_mut().undo_stack_index = Some(idx);
            if item.is_new_slide() {
                break;
            }
            if let Some(sleep) = self.redo(&item) {
                sleep.await;
            }
            let caught_up = {
                let s = self.inner.state.borrow();
                if s.preempted(Replay::Forwards, presses) {
                    return;
                }
                s.is_caught_up()
            };
            if caught_up {
                self.inner.state.borrow_mut().release();
                break;
            }
            idx += 1;
        }

        self.inner.state.borrow_mut().replay = Replay::Idle;
        self.show_arrows();
    }

    async fn handle_backwards_press(self) {
        let (presses, mut idx) = {
            let mut s = self.inner.state.borrow_mut();
            let Some(mut idx) = s.undo_stack_index else {
                return;
            };
            if idx == 0 || s.current_slide_index == 0 || s.replay == Replay::Backwards {
                return;
            }
            s.replay = Replay::Backwards;
            s.num_arrow_presses += 1;
            if s.undo_stack.get(idx).is_some_and(UndoItem::is_new_slide) {
                idx -= 1;
            }
            s.undo_stack_index = Some(idx);
            (s.num_arrow_presses, idx)
        };
        self.hide_arrows();
        self.switch_slide(self.current_slide_index().saturating_sub(1));
        tracing::debug!(from = idx, "replaying backwards");

        while let Some(item) = self.item_at(idx) {
            if item.is_new_slide() {
                break;
            }
            if let Some(sleep) = self.undo(&item) {
                sleep.await;
            }
            if self.inner.state.borrow().preempted(Replay::Backwards, presses) {
                return;
            }
            if idx == 0 {
                break;
            }
            idx -= 1;
            self.inner.state.borrow_mut().undo_stack_index = Some(idx);
        }

        self.inner.state.borrow_mut().replay = Replay::Idle;
        self.show_arrows();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{anim::PropertyMap, director::deck::HeadlessDeck, node::shared};

    fn setup(slides: usize) -> (RenderLoop, Director, Rc<RefCell<HeadlessDeck>>) {
        let lp = RenderLoop::new();
        let director = Director::new(&lp, DirectorConfig::default()).unwrap();
        let deck = Rc::new(RefCell::new(HeadlessDeck::new(slides)));
        director.begin(deck.clone()).unwrap();
        (lp, director, deck)
    }

    #[test]
    fn methods_require_begin() {
        let lp = RenderLoop::new();
        let director = Director::new(&lp, DirectorConfig::default()).unwrap();
        let obj = shared(PropertyMap::new().with("x", 0.0));
        let err = director
            .transition_to(obj, [("x", 1.0)], Duration::from_secs(1), Default::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("director error:"));
        assert!(director.run(|_| async { Ok(()) }).is_err());
    }

    #[test]
    fn begin_shows_first_slide_only_once() {
        let (_lp, director, deck) = setup(3);
        assert_eq!(deck.borrow().visible_slide(), Some(0));
        assert!(director.begin(deck.clone()).is_err());
    }

    #[test]
    fn next_slide_waits_for_a_forward_press() {
        let (_lp, director, deck) = setup(3);
        let reached = Rc::new(RefCell::new(false));
        let flag = reached.clone();
        director
            .run(move |d| async move {
                d.next_slide().await?;
                *flag.borrow_mut() = true;
                Ok(())
            })
            .unwrap();
        assert!(!*reached.borrow());
        director.handle_key(NavKey::Right, true);
        assert!(!*reached.borrow());
        director.handle_key(NavKey::Right, false);
        assert!(*reached.borrow());
        assert_eq!(deck.borrow().visible_slide(), Some(1));
        assert_eq!(director.pending_tasks(), 0);
    }

    #[test]
    fn back_at_first_slide_is_a_no_op() {
        let (_lp, director, _deck) = setup(2);
        director.run(|d| async move { d.next_slide().await }).unwrap();
        director.press_backward();
        assert_eq!(director.current_slide_index(), 0);
        assert_eq!(director.undo_stack_index(), Some(0));
    }

    #[test]
    fn delay_resumes_on_the_clock() {
        let (lp, director, _deck) = setup(2);
        let done = Rc::new(RefCell::new(false));
        let flag = done.clone();
        director
            .run(move |d| async move {
                d.delay(Duration::from_millis(500)).await?;
                *flag.borrow_mut() = true;
                Ok(())
            })
            .unwrap();
        lp.run_frames(4, 0.1);
        assert!(!*done.borrow());
        lp.run_frames(2, 0.1);
        assert!(*done.borrow());
        assert_eq!(director.undo_stack_kinds(), vec!["delay"]);
    }

    #[test]
    fn dispose_finishes_suspended_scripts() {
        let (lp, director, deck) = setup(2);
        director
            .run(|d| async move {
                d.next_slide().await?;
                d.next_slide().await?;
                d.delay(Duration::from_secs(100)).await
            })
            .unwrap();
        assert_eq!(director.pending_tasks(), 1);
        director.dispose();
        assert_eq!(director.pending_tasks(), 0);
        assert_eq!(lp.listener_count(), 0);
        assert_eq!(deck.borrow().arrows(), ArrowVisibility::default());
    }

    #[test]
    fn instant_transitions_undo_and_redo() {
        let (_lp, director, _deck) = setup(3);
        let obj = shared(PropertyMap::new().with("on", false));
        let target: AnimTarget = obj.clone();
        director
            .run(move |d| async move {
                d.next_slide().await?;
                d.transition_instantly(target, [("on", true)])?;
                d.next_slide().await
            })
            .unwrap();
        director.press_forward();
        assert_eq!(obj.borrow().get("on"), Some(&Value::Flag(true)));
        director.press_backward();
        assert_eq!(obj.borrow().get("on"), Some(&Value::Flag(false)));
        assert_eq!(director.current_slide_index(), 0);
        director.press_forward();
        assert_eq!(obj.borrow().get("on"), Some(&Value::Flag(true)));
        assert!(director.is_caught_up());
    }
}
