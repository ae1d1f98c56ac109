//! Interior nodes that map each incoming payload through a user expression.

use std::{cell::RefCell, fmt, ops::Deref, rc::Rc};

use crate::{
    anim::{Animatable, Value},
    foundation::error::{ExpError, ExpResult},
    node::{Node, NodeCore, Sample, Shared, shared},
};

/// Payload forwarded to children. Scalars become one-element sequences.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Coords(pub Vec<f64>);

impl Deref for Coords {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<f64> for Coords {
    fn from(v: f64) -> Self {
        Self(vec![v])
    }
}

impl From<Vec<f64>> for Coords {
    fn from(v: Vec<f64>) -> Self {
        Self(v)
    }
}

impl From<&[f64]> for Coords {
    fn from(v: &[f64]) -> Self {
        Self(v.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Coords {
    fn from(v: [f64; N]) -> Self {
        Self(v.to_vec())
    }
}

/// `(index, time, coords) -> coords'`, called identically at every index.
#[derive(Clone)]
pub struct Expr(Rc<dyn Fn(usize, f64, &[f64]) -> Coords>);

impl Expr {
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(usize, f64, &[f64]) -> R + 'static,
        R: Into<Coords>,
    {
        Self(Rc::new(move |i, t, x| f(i, t, x).into()))
    }

    /// Forwards the incoming payload unchanged.
    pub fn identity() -> Self {
        Self::new(|_, _, x| Coords::from(x))
    }

    pub fn call(&self, index: usize, time: f64, coords: &[f64]) -> Coords {
        (self.0)(index, time, coords)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({:p})", Rc::as_ptr(&self.0))
    }
}

type ExprCell = Rc<RefCell<Expr>>;

fn forward(core: &NodeCore, expr: &ExprCell, sample: Sample<'_>) {
    let expr = expr.borrow().clone();
    let result = expr.call(sample.index, sample.time, sample.payload);
    core.evaluate_children(sample.with_payload(&result));
}

#[derive(Debug)]
pub struct Transformation {
    core: NodeCore,
    expr: ExprCell,
}

impl Transformation {
    pub fn new<F, R>(f: F) -> Shared<Self>
    where
        F: Fn(usize, f64, &[f64]) -> R + 'static,
        R: Into<Coords>,
    {
        Self::from_expr(Expr::new(f))
    }

    pub fn from_expr(expr: Expr) -> Shared<Self> {
        shared(Self {
            core: NodeCore::default(),
            expr: Rc::new(RefCell::new(expr)),
        })
    }

    pub fn expr(&self) -> Expr {
        self.expr.borrow().clone()
    }

    pub fn set_expr(&mut self, expr: Expr) {
        *self.expr.borrow_mut() = expr;
    }

    /// A node that evaluates this transformation's current expression.
    ///
    /// The link shares the expression cell, so later `set_expr` calls (and
    /// animations of `"expr"`) are visible through it.
    pub fn make_link(&self) -> Shared<LinkedTransformation> {
        shared(LinkedTransformation {
            core: NodeCore::default(),
            expr: self.expr.clone(),
        })
    }

    pub fn num_calls_per_activation(&self) -> Option<usize> {
        self.core
            .resolve_shape()
            .map(|shape| shape.num_calls_per_activation)
    }
}

impl Node for Transformation {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "Transformation"
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        forward(&self.core, &self.expr, sample);
    }
}

impl Animatable for Transformation {
    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "expr" => Some(Value::Function(self.expr())),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: Value) -> ExpResult<()> {
        match (name, value) {
            ("expr", Value::Function(expr)) => {
                self.set_expr(expr);
                Ok(())
            }
            ("expr", other) => Err(ExpError::animation(format!(
                "Transformation.expr must be a function, got {}",
                other.kind()
            ))),
            (other, _) => Err(ExpError::animation(format!(
                "Transformation has no property '{other}'"
            ))),
        }
    }

    fn stagger_basis(&self) -> Option<usize> {
        self.num_calls_per_activation()
    }
}

/// Evaluates another transformation's expression without owning one.
#[derive(Debug)]
pub struct LinkedTransformation {
    core: NodeCore,
    expr: ExprCell,
}

impl Node for LinkedTransformation {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "LinkedTransformation"
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        forward(&self.core, &self.expr, sample);
    }
}
