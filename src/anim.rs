//! Property tweening driven by the render loop's update event.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc, time::Duration};

use crate::{
    anim_ease::Ease,
    foundation::{
        color::Rgb,
        error::{ExpError, ExpResult},
        math::{clamp01, lerp_vectors},
    },
    render_loop::{ClaimKey, Listen, ListenerId, LoopEvent, RenderLoop, WeakRenderLoop},
    transformation::{Coords, Expr},
};

/// An animatable property value.
#[derive(Clone, Debug)]
pub enum Value {
    Number(f64),
    Vector(Vec<f64>),
    Function(Expr),
    Flag(bool),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Vector(_) => "vector",
            Self::Function(_) => "function",
            Self::Flag(_) => "flag",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Vector(a), Self::Vector(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Flag(a), Self::Flag(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(v)
    }
}

impl<const N: usize> From<[f64; N]> for Value {
    fn from(v: [f64; N]) -> Self {
        Self::Vector(v.to_vec())
    }
}

impl From<Expr> for Value {
    fn from(v: Expr) -> Self {
        Self::Function(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<Rgb> for Value {
    fn from(c: Rgb) -> Self {
        Self::Vector(c.to_array().to_vec())
    }
}

/// Property name to value, in a stable order.
pub type Values = BTreeMap<String, Value>;

pub fn values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Values
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Anything whose named properties an [`Animation`] may drive.
pub trait Animatable {
    fn get_property(&self, name: &str) -> Option<Value>;
    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()>;

    /// Calls per activation used to normalize staggered function transitions.
    fn stagger_basis(&self) -> Option<usize> {
        None
    }
}

pub type AnimTarget = Rc<RefCell<dyn Animatable>>;

pub(crate) fn target_key(target: &AnimTarget) -> usize {
    Rc::as_ptr(target) as *const () as usize
}

/// Free-form animatable bag for host objects (cameras, labels, test fixtures).
#[derive(Clone, Debug, Default)]
pub struct PropertyMap {
    values: Values,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_number)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }
}

impl Animatable for PropertyMap {
    fn get_property(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()> {
        if let Some(existing) = self.values.get(name)
            && existing.kind() != value.kind()
        {
            return Err(ExpError::animation(format!(
                "property '{name}' holds a {}, cannot assign a {}",
                existing.kind(),
                value.kind()
            )));
        }
        self.values.insert(name.to_owned(), value);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    /// Portion of the duration over which per-index starts are spread, in `[0, 1)`.
    pub stagger_fraction: f64,
    pub ease: Ease,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            stagger_fraction: 0.0,
            ease: Ease::Cosine,
        }
    }
}

impl AnimationOptions {
    pub fn staggered(stagger_fraction: f64) -> Self {
        Self {
            stagger_fraction,
            ..Self::default()
        }
    }

    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    pub fn validate(&self) -> ExpResult<()> {
        if !(0.0..1.0).contains(&self.stagger_fraction) {
            return Err(ExpError::validation(format!(
                "stagger_fraction must be in [0, 1), got {}",
                self.stagger_fraction
            )));
        }
        Ok(())
    }
}

/// Per-index local progress of a staggered transition, clamped to `[0, 1]`.
pub fn stagger_progress(
    percentage: f64,
    index: usize,
    stagger_fraction: f64,
    total_calls: usize,
) -> f64 {
    if stagger_fraction <= 0.0 || total_calls == 0 {
        return clamp01(percentage);
    }
    let offset = index as f64 * stagger_fraction / total_calls as f64;
    clamp01(percentage / (1.0 - stagger_fraction) - offset)
}

#[derive(Debug)]
struct Track {
    name: String,
    from: Value,
    to: Value,
    /// Cleared when another animation takes the property over.
    active: bool,
    /// Unsupported pairings only snap at the end.
    tweenable: bool,
}

pub(crate) struct AnimationState {
    target: AnimTarget,
    target_key: usize,
    tracks: Vec<Track>,
    duration: f64,
    elapsed: f64,
    stagger: f64,
    ease: Ease,
    basis: usize,
    finished: bool,
}

impl fmt::Debug for AnimationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationState")
            .field("tracks", &self.tracks.len())
            .field("duration", &self.duration)
            .field("elapsed", &self.elapsed)
            .field("finished", &self.finished)
            .finish()
    }
}

impl AnimationState {
    fn release(&mut self, name: &str) {
        for track in self.tracks.iter_mut().filter(|t| t.name == name) {
            track.active = false;
        }
        if self.tracks.iter().all(|t| !t.active) {
            self.finished = true;
        }
    }

    fn apply(&self, name: &str, value: Value) {
        match self.target.try_borrow_mut() {
            Ok(mut target) => {
                if let Err(err) = target.set_property(name, value) {
                    tracing::error!(property = name, %err, "animation could not set property");
                }
            }
            Err(_) => tracing::warn!(property = name, "animation target is busy; skipping frame"),
        }
    }

    fn interpolate(&self, track: &Track, percentage: f64) -> Option<Value> {
        let ease = self.ease;
        match (&track.from, &track.to) {
            (Value::Number(from), Value::Number(to)) => {
                let t = ease.apply(percentage);
                Some(Value::Number(t * to + (1.0 - t) * from))
            }
            (Value::Vector(from), Value::Vector(to)) => {
                Some(Value::Vector(lerp_vectors(from, to, ease.apply(percentage))))
            }
            (Value::Function(from), Value::Function(to)) => {
                let (from, to) = (from.clone(), to.clone());
                let (stagger, basis) = (self.stagger, self.basis);
                Some(Value::Function(Expr::new(move |i, t, x: &[f64]| {
                    let local = ease.apply(stagger_progress(percentage, i, stagger, basis));
                    let a = from.call(i, t, x);
                    let b = to.call(i, t, x);
                    Coords(lerp_vectors(&a, &b, local))
                })))
            }
            _ => None,
        }
    }

    fn snap(&mut self) {
        self.finished = true;
        for track in self.tracks.iter().filter(|t| t.active) {
            self.apply(&track.name, track.to.clone());
        }
    }

    fn step(&mut self, delta: f64) -> Listen {
        if self.finished {
            return Listen::Stop;
        }
        self.elapsed += delta;
        if self.elapsed >= self.duration {
            self.snap();
            return Listen::Stop;
        }
        let percentage = self.elapsed / self.duration;
        for track in self.tracks.iter().filter(|t| t.active && t.tweenable) {
            if let Some(value) = self.interpolate(track, percentage) {
                self.apply(&track.name, value);
            }
        }
        Listen::Continue
    }
}

fn tweenable(from: &Value, to: &Value) -> bool {
    match (from, to) {
        (Value::Number(_), Value::Number(_)) | (Value::Function(_), Value::Function(_)) => true,
        (Value::Vector(a), Value::Vector(b)) => a.len() == b.len(),
        _ => false,
    }
}

/// Handle to a running (or finished) tween.
///
/// Dropping the handle does not stop the animation; it keeps itself
/// registered with the render loop until it completes.
#[derive(Debug)]
pub struct Animation {
    state: Rc<RefCell<AnimationState>>,
    listener: Option<ListenerId>,
}

impl Animation {
    /// Tweens from the target's current values.
    pub fn start(
        render_loop: &RenderLoop,
        target: AnimTarget,
        to_values: Values,
        duration: Duration,
        options: AnimationOptions,
    ) -> ExpResult<Self> {
        Self::start_from(render_loop, target, to_values, Values::new(), duration, options)
    }

    /// Tweens from `from_values`, falling back to the live value for keys it lacks.
    #[tracing::instrument(skip_all, fields(props = to_values.len(), secs = duration.as_secs_f64()))]
    pub fn start_from(
        render_loop: &RenderLoop,
        target: AnimTarget,
        to_values: Values,
        mut from_values: Values,
        duration: Duration,
        options: AnimationOptions,
    ) -> ExpResult<Self> {
        options.validate()?;

        let (tracks, basis) = {
            let live = target.borrow();
            let mut tracks = Vec::with_capacity(to_values.len());
            for (name, to) in to_values {
                let Some(from) = from_values.remove(&name).or_else(|| live.get_property(&name))
                else {
                    tracing::warn!(property = %name, "animation target has no such property; skipping");
                    continue;
                };
                let tweenable = tweenable(&from, &to);
                if !tweenable {
                    tracing::error!(
                        property = %name,
                        from = from.kind(),
                        to = to.kind(),
                        "cannot interpolate between these values; will snap at the end"
                    );
                }
                tracks.push(Track {
                    name,
                    from,
                    to,
                    active: true,
                    tweenable,
                });
            }
            (tracks, live.stagger_basis())
        };

        let mut stagger = options.stagger_fraction;
        if stagger > 0.0 && basis.is_none() {
            tracing::warn!("stagger needs a target attached beneath a domain; ignoring stagger");
            stagger = 0.0;
        }

        let key = target_key(&target);
        let state = Rc::new(RefCell::new(AnimationState {
            target,
            target_key: key,
            tracks,
            duration: duration.as_secs_f64(),
            elapsed: 0.0,
            stagger,
            ease: options.ease,
            basis: basis.unwrap_or(0),
            finished: false,
        }));

        let names: Vec<String> = state.borrow().tracks.iter().map(|t| t.name.clone()).collect();
        for name in &names {
            if let Some(previous) = render_loop.claim((key, name.clone()), &state) {
                match previous.try_borrow_mut() {
                    Ok(mut prev) => prev.release(name),
                    Err(_) => tracing::warn!(property = %name, "could not release a busy animation"),
                }
            }
        }

        if names.is_empty() {
            state.borrow_mut().finished = true;
            return Ok(Self {
                state,
                listener: None,
            });
        }

        let weak_loop = render_loop.downgrade();
        let ticking = state.clone();
        let listener = render_loop.on(LoopEvent::Update, move |frame| {
            let done = ticking.borrow_mut().step(frame.delta);
            if done == Listen::Stop {
                release_all(&weak_loop, &ticking);
            }
            done
        });

        Ok(Self {
            state,
            listener: Some(listener),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.state.borrow().elapsed)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.state.borrow().duration)
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.listener
    }
}

fn release_all(weak_loop: &WeakRenderLoop, state: &Rc<RefCell<AnimationState>>) {
    let Some(render_loop) = weak_loop.upgrade() else {
        return;
    };
    let keys: Vec<ClaimKey> = {
        let s = state.borrow();
        s.tracks
            .iter()
            .map(|t| (s.target_key, t.name.clone()))
            .collect()
    };
    for key in &keys {
        render_loop.release_claim(key, state);
    }
}

/// Stops whatever animation drives `names` on `target`, leaving the rest of it running.
pub(crate) fn cancel_properties<'a>(
    render_loop: &RenderLoop,
    target: &AnimTarget,
    names: impl IntoIterator<Item = &'a String>,
) {
    let key = target_key(target);
    for name in names {
        let Some(previous) = render_loop.take_claim(&(key, name.clone())) else {
            continue;
        };
        match previous.try_borrow_mut() {
            Ok(mut prev) => prev.release(name),
            Err(_) => tracing::warn!(property = %name, "could not release a busy animation"),
        }
    }
}

/// Starts a tween of `target`'s properties towards `to_values`.
pub fn transition_to<K, V>(
    render_loop: &RenderLoop,
    target: AnimTarget,
    to_values: impl IntoIterator<Item = (K, V)>,
    duration: Duration,
    options: AnimationOptions,
) -> ExpResult<Animation>
where
    K: Into<String>,
    V: Into<Value>,
{
    Animation::start(render_loop, target, values(to_values), duration, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::shared;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn number_tween_snaps_exactly() {
        let lp = RenderLoop::new();
        let obj = shared(PropertyMap::new().with("x", 0.0));
        let anim = transition_to(&lp, obj.clone(), [("x", 10.0)], secs(1.0), Default::default())
            .unwrap();
        lp.run_frames(3, 0.3);
        let mid = obj.borrow().number("x").unwrap();
        assert!(mid > 0.0 && mid < 10.0);
        lp.step(0.3);
        assert_eq!(obj.borrow().number("x"), Some(10.0));
        assert!(anim.is_finished());
        assert_eq!(lp.listener_count(), 0);
    }

    #[test]
    fn missing_property_is_skipped() {
        let lp = RenderLoop::new();
        let obj = shared(PropertyMap::new());
        let anim = transition_to(&lp, obj.clone(), [("y", 1.0)], secs(1.0), Default::default())
            .unwrap();
        assert!(anim.is_finished());
        assert!(obj.borrow().get("y").is_none());
    }

    #[test]
    fn unsupported_pairings_snap_at_the_end() {
        let lp = RenderLoop::new();
        let obj = shared(PropertyMap::new().with("on", false));
        transition_to(&lp, obj.clone(), [("on", true)], secs(0.5), Default::default()).unwrap();
        lp.step(0.25);
        assert_eq!(obj.borrow().get("on"), Some(&Value::Flag(false)));
        lp.step(0.25);
        assert_eq!(obj.borrow().get("on"), Some(&Value::Flag(true)));
    }

    #[test]
    fn vector_tween_interpolates_componentwise() {
        let lp = RenderLoop::new();
        let obj = shared(PropertyMap::new().with("pos", [0.0, 0.0, 0.0]));
        let opts = AnimationOptions::default().ease(Ease::Linear);
        transition_to(&lp, obj.clone(), [("pos", [2.0, 4.0, 6.0])], secs(1.0), opts).unwrap();
        lp.step(0.5);
        assert_eq!(
            obj.borrow().get("pos").and_then(Value::as_vector),
            Some(&[1.0, 2.0, 3.0][..])
        );
    }

    #[test]
    fn newer_animation_takes_over_the_property() {
        let lp = RenderLoop::new();
        let obj = shared(PropertyMap::new().with("x", 0.0));
        let first = transition_to(&lp, obj.clone(), [("x", 10.0)], secs(1.0), Default::default())
            .unwrap();
        lp.step(0.1);
        let second =
            transition_to(&lp, obj.clone(), [("x", -5.0)], secs(0.2), Default::default()).unwrap();
        assert!(first.is_finished());
        lp.run_frames(10, 0.1);
        assert!(second.is_finished());
        assert_eq!(obj.borrow().number("x"), Some(-5.0));
    }

    #[test]
    fn stagger_progress_offsets_later_indices() {
        assert_eq!(stagger_progress(0.5, 0, 0.5, 2), 1.0);
        assert!(stagger_progress(0.5, 1, 0.5, 2) < 1.0);
        assert_eq!(stagger_progress(0.3, 7, 0.0, 10), 0.3);
    }

    #[test]
    fn options_validate_stagger_range() {
        assert!(AnimationOptions::staggered(1.0).validate().is_err());
        assert!(AnimationOptions::staggered(-0.1).validate().is_err());
        assert!(AnimationOptions::staggered(0.99).validate().is_ok());
        let parsed: AnimationOptions = serde_json::from_str(r#"{"stagger_fraction": 0.25}"#).unwrap();
        assert_eq!(parsed.ease, Ease::Cosine);
    }

    #[test]
    fn property_map_rejects_kind_changes() {
        let mut map = PropertyMap::new().with("x", 1.0);
        assert!(map.set_property("x", Value::Flag(true)).is_err());
        assert!(map.set_property("x", Value::Number(2.0)).is_ok());
        assert!(map.set_property("fresh", Value::Flag(true)).is_ok());
    }
}
