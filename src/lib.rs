#![forbid(unsafe_code)]
//! Parametric scene evaluation for mathematical visualizations.
//!
//! A scene is a tree of [`node::Node`]s rooted at a [`domain::Domain`]. Each
//! activation the domain samples its parameter space and pushes every sample
//! down the tree; [`transformation::Transformation`]s map coordinates and
//! outputs collect the results into vertex buffers. [`anim::Animation`]s tween
//! node properties over [`render_loop::RenderLoop`] time, and a
//! [`director::Director`] sequences them into slides that can be undone.

pub mod anim;
pub mod anim_ease;
pub mod director;
pub mod domain;
pub mod foundation;
pub mod history;
pub mod node;
pub mod output;
pub mod render_loop;
pub mod transformation;

pub use anim::{AnimTarget, Animatable, Animation, AnimationOptions, PropertyMap, Value, Values};
pub use anim_ease::Ease;
pub use director::{
    Director, DirectorConfig,
    deck::{ArrowVisibility, HeadlessDeck, NavKey, SlideDeck},
    undo::UndoItem,
};
pub use domain::{
    Domain,
    area::{Area, AreaConfig},
    array::{ArrayConfig, ArrayDomain},
};
pub use foundation::{
    color::Rgb,
    error::{ExpError, ExpResult},
};
pub use history::{HistoryConfig, HistoryRecorder};
pub use node::{Node, NodeCore, NodeExt, NodeRef, Sample, Shared, TreeShape};
pub use output::{
    BufferAttribute, Material, OutputState,
    array_sink::{ArrayOfArraysOutput, FlatArrayOutput},
    line::{LineConfig, LineOutput},
    point::{PointConfig, PointOutput},
    polygon::{ClosedPolygonOutput, PolygonConfig},
    surface::{SurfaceConfig, SurfaceOutput},
    vector::{VectorConfig, VectorOutput},
};
pub use render_loop::{FrameEvent, Listen, ListenerId, LoopEvent, RenderLoop};
pub use transformation::{Coords, Expr, LinkedTransformation, Transformation};
