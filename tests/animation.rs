use std::{cell::RefCell, rc::Rc, time::Duration};

use explanaria::{
    Animation, AnimationOptions, ArrayConfig, ArrayDomain, Domain as _, Ease, Expr,
    FlatArrayOutput, LineOutput, Material, NodeExt as _, PropertyMap, RenderLoop, Rgb,
    Transformation, Value,
    anim::{stagger_progress, transition_to, values},
};

const FRAME: f64 = 1.0 / 60.0;

fn object(x: f64) -> Rc<RefCell<PropertyMap>> {
    Rc::new(RefCell::new(PropertyMap::new().with("x", x)))
}

#[test]
fn tween_is_monotonic_and_snaps_to_the_target() {
    let lp = RenderLoop::new();
    let obj = object(0.0);
    let anim = transition_to(
        &lp,
        obj.clone(),
        [("x", 10.0)],
        Duration::from_secs(1),
        AnimationOptions::default(),
    )
    .unwrap();

    let mut last = 0.0;
    for _ in 0..59 {
        lp.step(FRAME);
        let x = obj.borrow().number("x").unwrap();
        assert!(x >= last, "{x} < {last}");
        assert!((0.0..=10.0).contains(&x));
        last = x;
    }
    assert!(!anim.is_finished());
    lp.run_frames(5, FRAME);
    assert_eq!(obj.borrow().number("x"), Some(10.0));
    assert!(anim.is_finished());
    assert_eq!(lp.listener_count(), 0);
}

#[test]
fn overshooting_delta_still_lands_exactly() {
    let lp = RenderLoop::new();
    let obj = object(-3.0);
    transition_to(
        &lp,
        obj.clone(),
        [("x", 7.25)],
        Duration::from_millis(100),
        AnimationOptions::default().ease(Ease::InOutCubic),
    )
    .unwrap();
    lp.step(5.0);
    assert_eq!(obj.borrow().number("x"), Some(7.25));
}

#[test]
fn vectors_and_colors_interpolate_componentwise() {
    let lp = RenderLoop::new();
    let line = LineOutput::new(Material::default());
    let obj = Rc::new(RefCell::new(PropertyMap::new().with("position", [0.0, 0.0, 0.0])));
    transition_to(
        &lp,
        obj.clone(),
        [("position", [2.0, 4.0, 6.0])],
        Duration::from_secs(1),
        AnimationOptions::default().ease(Ease::Linear),
    )
    .unwrap();
    transition_to(
        &lp,
        line.clone(),
        [("color", Rgb::new(1.0, 0.0, 0.0))],
        Duration::from_secs(1),
        AnimationOptions::default(),
    )
    .unwrap();

    lp.run_frames(30, FRAME);
    let Some(Value::Vector(mid)) = obj.borrow().get("position").cloned() else {
        panic!("position is not a vector");
    };
    assert!((mid[0] - 1.0).abs() < 0.05 && (mid[2] - 3.0).abs() < 0.15);

    lp.run_frames(40, FRAME);
    assert_eq!(line.borrow().material().color, Rgb::new(1.0, 0.0, 0.0));
}

#[test]
fn newer_animation_takes_over_the_property() {
    let lp = RenderLoop::new();
    let obj = object(0.0);
    let first = transition_to(
        &lp,
        obj.clone(),
        [("x", 100.0)],
        Duration::from_secs(10),
        AnimationOptions::default(),
    )
    .unwrap();
    lp.run_frames(10, FRAME);
    let second = transition_to(
        &lp,
        obj.clone(),
        [("x", -1.0)],
        Duration::from_millis(500),
        AnimationOptions::default(),
    )
    .unwrap();
    lp.run_frames(60, FRAME);

    assert!(first.is_finished());
    assert!(second.is_finished());
    assert_eq!(obj.borrow().number("x"), Some(-1.0));
}

#[test]
fn mismatched_kinds_snap_at_the_end() {
    let lp = RenderLoop::new();
    let obj = Rc::new(RefCell::new(PropertyMap::new().with("visible", false)));
    transition_to(
        &lp,
        obj.clone(),
        [("visible", true)],
        Duration::from_millis(200),
        AnimationOptions::default(),
    )
    .unwrap();
    lp.run_frames(6, FRAME);
    assert_eq!(obj.borrow().get("visible"), Some(&Value::Flag(false)));
    lp.run_frames(10, FRAME);
    assert_eq!(obj.borrow().get("visible"), Some(&Value::Flag(true)));
}

#[test]
fn earlier_indices_finish_first_when_staggered() {
    for p in [0.3, 0.5, 0.55, 0.6] {
        let a = stagger_progress(p, 0, 0.5, 2);
        let b = stagger_progress(p, 1, 0.5, 2);
        assert!(a >= b);
    }
    assert_eq!(stagger_progress(0.55, 0, 0.5, 2), 1.0);
    assert!(stagger_progress(0.55, 1, 0.5, 2) < 1.0);
    assert_eq!(stagger_progress(1.0, 1, 0.5, 2), 1.0);
}

#[test]
fn staggered_expr_animation_cascades_across_the_domain() {
    let lp = RenderLoop::new();
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([1.0, 1.0])).unwrap();
    let tf = domain.add(Transformation::new(|_, _, _: &[f64]| 0.0));
    let sink = tf.add(FlatArrayOutput::new());
    domain.borrow_mut().build().unwrap();

    let anim = Animation::start(
        &lp,
        tf.clone(),
        values([("expr", Expr::new(|_, _, x: &[f64]| x[0]))]),
        Duration::from_secs(1),
        AnimationOptions::staggered(0.5).ease(Ease::Linear),
    )
    .unwrap();

    lp.run_frames(33, FRAME);
    domain.borrow_mut().activate(lp.time());
    let mid = sink.borrow().values();
    assert_eq!(mid[0], 1.0);
    assert!(mid[1] < 1.0 && mid[1] > 0.0, "{mid:?}");

    lp.run_frames(40, FRAME);
    assert!(anim.is_finished());
    domain.borrow_mut().activate(lp.time());
    assert_eq!(sink.borrow().values(), vec![1.0, 1.0]);
}

#[test]
fn invalid_options_are_rejected_up_front() {
    let lp = RenderLoop::new();
    let obj = object(0.0);
    let err = transition_to(
        &lp,
        obj.clone(),
        [("x", 1.0)],
        Duration::from_secs(1),
        AnimationOptions::staggered(1.0),
    )
    .unwrap_err();
    assert!(err.to_string().starts_with("validation error:"));
    assert_eq!(lp.listener_count(), 0);

    // Unknown properties are skipped, leaving nothing to animate.
    let empty = transition_to(
        &lp,
        obj,
        [("missing", 1.0)],
        Duration::from_secs(1),
        AnimationOptions::default(),
    )
    .unwrap();
    assert!(empty.is_finished());
    assert_eq!(lp.listener_count(), 0);
}
