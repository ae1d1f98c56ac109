use std::{cell::RefCell, rc::Rc};

use explanaria::{
    Area, AreaConfig, ArrayConfig, ArrayDomain, Domain as _, Expr, FlatArrayOutput,
    HistoryConfig, HistoryRecorder, LineOutput, Material, Node, NodeCore, NodeExt as _, OutputState,
    Sample,
    SurfaceConfig, SurfaceOutput, Transformation, node::shared,
};

type Seen = Rc<RefCell<Vec<(usize, f64, Vec<f64>)>>>;

/// Leaf that records every call it receives.
#[derive(Default)]
struct Recorder {
    core: NodeCore,
    seen: Seen,
}

impl Node for Recorder {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "Recorder"
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        self.seen
            .borrow_mut()
            .push((sample.index, sample.time, sample.payload.to_vec()));
    }
}

fn recorder() -> (explanaria::Shared<Recorder>, Seen) {
    let seen = Seen::default();
    let node = shared(Recorder {
        core: NodeCore::default(),
        seen: seen.clone(),
    });
    (node, seen)
}

#[test]
fn activation_fans_out_once_per_index() {
    let area = Area::new(
        AreaConfig::new(vec![[0.0, 1.0], [0.0, 1.0], [0.0, 1.0]]).item_dimensions(vec![2, 3, 4]),
    )
    .unwrap();
    let (tap, seen) = recorder();
    area.add(tap);
    area.borrow_mut().activate(0.5);

    let k = area.borrow().num_calls_per_activation();
    assert_eq!(k, 24);
    let mut indices: Vec<usize> = seen.borrow().iter().map(|(i, _, _)| *i).collect();
    assert_eq!(indices.len(), k);
    indices.sort_unstable();
    assert_eq!(indices, (0..k).collect::<Vec<_>>());
    assert!(seen.borrow().iter().all(|(_, t, _)| *t == 0.5));
}

#[test]
fn grid_indices_are_row_major() {
    let area = Area::new(
        AreaConfig::new(vec![[0.0, 2.0], [0.0, 3.0]]).item_dimensions(vec![3, 4]),
    )
    .unwrap();
    let (tap, seen) = recorder();
    area.add(tap);
    area.borrow_mut().activate(0.0);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 12);
    for (k, (index, _, coords)) in seen.iter().enumerate() {
        // Integer bounds make each coordinate equal to its axis index.
        let (i, j) = (coords[0].round() as usize, coords[1].round() as usize);
        assert_eq!(*index, k);
        assert_eq!(*index, i * 4 + j);
    }
}

#[test]
fn scalar_results_are_forwarded_as_singletons() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([5.0])).unwrap();
    let double = domain.add(Transformation::new(|_, _, x: &[f64]| x[0] * 2.0));
    let (tap, seen) = recorder();
    double.add(tap);
    domain.borrow_mut().activate(3.0);

    assert_eq!(*seen.borrow(), vec![(0, 3.0, vec![10.0])]);
}

#[test]
fn siblings_run_in_child_order() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([1.0, 2.0])).unwrap();
    let log = Seen::default();
    for _ in 0..2 {
        domain.add(shared(Recorder {
            core: NodeCore::default(),
            seen: log.clone(),
        }));
    }
    domain.borrow_mut().activate(0.0);
    let order: Vec<usize> = log.borrow().iter().map(|(i, _, _)| *i).collect();
    assert_eq!(order, vec![0, 0, 1, 1]);
}

#[test]
fn linked_transformation_follows_the_original() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([5.0])).unwrap();
    let original = Transformation::new(|_, _, x: &[f64]| x[0] + 1.0);
    let link = domain.add(original.borrow().make_link());
    let (tap, seen) = recorder();
    link.add(tap);

    domain.borrow_mut().activate(0.0);
    original
        .borrow_mut()
        .set_expr(Expr::new(|_, _, x: &[f64]| x[0] * 10.0));
    domain.borrow_mut().activate(0.0);

    let payloads: Vec<Vec<f64>> = seen.borrow().iter().map(|(_, _, p)| p.clone()).collect();
    assert_eq!(payloads, vec![vec![6.0], vec![50.0]]);
}

#[test]
fn parabola_flows_into_a_flat_array() {
    let area = Area::new(AreaConfig::new(vec![[0.0, 10.0]]).num_items(11)).unwrap();
    let square = area.add(Transformation::new(|_, _, x: &[f64]| [x[0], x[0] * x[0]]));
    let sink = square.add(FlatArrayOutput::new());
    area.borrow_mut().activate(0.0);

    let expected: Vec<f64> = (0..=10)
        .flat_map(|x| [f64::from(x), f64::from(x * x)])
        .collect();
    assert_eq!(expected.len(), 22);
    assert_eq!(sink.borrow().values(), expected);
}

#[test]
fn history_starts_empty_and_wraps_around() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([0.0])).unwrap();
    let clock = domain.add(Transformation::new(|_, t, _: &[f64]| [t, 0.0, 0.0]));
    let history = clock.add(
        HistoryRecorder::new(
            HistoryConfig::default()
                .memory_length(3)
                .record_frame_interval(1),
        )
        .unwrap(),
    );
    let (tap, seen) = recorder();
    history.add(tap);
    domain.borrow_mut().build().unwrap();

    assert_eq!(history.borrow().buffer().len(), 9);
    assert!(history.borrow().buffer().iter().all(|v| v.is_nan()));

    let mut cycle = Vec::new();
    for t in 1..=4 {
        domain.borrow_mut().activate(f64::from(t));
        cycle.push(history.borrow().current_history_index());
    }
    assert_eq!(cycle, vec![1, 2, 0, 1]);

    let h = history.borrow();
    assert_eq!(h.slot(0, 0).unwrap()[0], 4.0);
    assert_eq!(h.slot(0, 1).unwrap()[0], 2.0);
    assert_eq!(h.slot(0, 2).unwrap()[0], 3.0);

    // Each activation fans out once per slot, oldest first.
    let seen = seen.borrow();
    assert_eq!(seen.len(), 12);
    let first: Vec<f64> = seen[..3].iter().map(|(_, _, p)| p[0]).collect();
    assert!(first[0].is_nan() && first[1].is_nan());
    assert_eq!(first[2], 1.0);
    let last: Vec<f64> = seen[9..].iter().map(|(_, _, p)| p[0]).collect();
    assert_eq!(last, vec![2.0, 3.0, 4.0]);
}

#[test]
fn history_feeds_a_line_per_upstream_index() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([0.0, 1.0])).unwrap();
    let history = domain.add(
        HistoryRecorder::new(HistoryConfig::default().memory_length(4)).unwrap(),
    );
    let line = history.add(LineOutput::new(Material::default()));
    domain.borrow_mut().build().unwrap();

    assert_eq!(history.borrow().num_calls_per_activation(), 8);
    let l = line.borrow();
    assert_eq!(l.scanline_length(), 4);
    // Two scanlines of four samples, three segments each.
    assert_eq!(l.positions().count(), 2 * 2 * 3);
}

#[test]
fn flat_surface_normals_point_along_z() {
    let area = Area::new(AreaConfig::new(vec![[-1.0, 1.0], [-2.0, 2.0]]).num_items(5)).unwrap();
    let plane = area.add(Transformation::new(|_, _, p: &[f64]| [p[0], p[1], 0.0]));
    let surface = plane.add(SurfaceOutput::new(SurfaceConfig::default()));
    area.borrow_mut().activate(0.0);

    let s = surface.borrow();
    assert_eq!(s.grid_size(), (5, 5));
    let normals = s.normals().data();
    assert_eq!(normals.len(), 25 * 3);
    for n in normals.chunks(3) {
        assert!(n[0].abs() < 1e-6 && n[1].abs() < 1e-6, "{n:?}");
        assert!((n[2].abs() - 1.0).abs() < 1e-6, "{n:?}");
    }
}

#[test]
fn reported_finalize_errors_leave_siblings_working() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([1.0, 2.0])).unwrap();
    // A 2-D surface cannot hang off a 1-D domain.
    domain.add(SurfaceOutput::new(SurfaceConfig::default()));
    let sink = domain.add(FlatArrayOutput::new());
    assert!(domain.borrow_mut().build().is_err());

    domain.borrow_mut().activate(0.0);
    assert_eq!(sink.borrow().values(), vec![1.0, 2.0]);
}

#[test]
fn outputs_attached_after_a_build_are_sized_on_the_next_activation() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([1.0, 2.0, 3.0])).unwrap();
    let lift = domain.add(Transformation::new(|_, _, x: &[f64]| [x[0], x[0] * x[0], 0.0]));
    domain.borrow_mut().activate(0.0);
    assert!(domain.borrow().is_built());

    let line = lift.add(LineOutput::new(Material::default()));
    assert!(!domain.borrow().is_built());
    domain.borrow_mut().activate(0.0);

    let l = line.borrow();
    assert_eq!(l.state(), OutputState::Ready);
    // Three samples on one scanline: two segments.
    assert_eq!(l.positions().count(), 4);
    assert_eq!(l.positions().item(3), Some(&[3.0, 9.0, 0.0][..]));
}

#[test]
fn history_attached_after_a_build_records_on_the_next_activation() {
    let domain = ArrayDomain::new(ArrayConfig::from_scalars([0.0, 1.0])).unwrap();
    domain.borrow_mut().build().unwrap();
    let history = domain.add(
        HistoryRecorder::new(
            HistoryConfig::default()
                .memory_length(2)
                .record_frame_interval(1),
        )
        .unwrap(),
    );
    domain.borrow_mut().activate(0.0);

    let h = history.borrow();
    assert_eq!(h.buffer().len(), 2 * 2 * 3);
    assert_eq!(h.slot(1, 0).unwrap()[0], 1.0);
}
