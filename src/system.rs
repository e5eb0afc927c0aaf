//! The two operations the integrator needs from the physics
//!
//! The integrator never sees a concrete physical model. It asks a [`System`]
//! for the derivative of the state and, after every accepted step, gives it
//! the chance to project the state back onto its constraint.

/// Right-hand side `dy/dt = f(y, t)` plus an optional post-step projection.
///
/// # Buffer validity
///
/// [`derivative`](System::derivative) returns a slice borrowed from the
/// system. Implementations are free to hand out the same pooled buffer on
/// every call; the borrow checker guarantees the caller copies anything it
/// needs before calling again.
///
/// # Example
///
/// ```
/// use heun::System;
///
/// struct Decay {
///     rate: f64,
///     dy: Vec<f64>,
/// }
///
/// impl System for Decay {
///     fn derivative(&mut self, y: &[f64], _t: f64) -> &[f64] {
///         for (d, v) in self.dy.iter_mut().zip(y) {
///             *d = -self.rate * v;
///         }
///         &self.dy
///     }
/// }
/// ```
pub trait System {
    /// Evaluate the derivative of `y` at time `t`.
    ///
    /// The returned slice must have the length of `y`.
    fn derivative(&mut self, y: &[f64], t: f64) -> &[f64];

    /// Enforce an invariant the update formula does not preserve, e.g. unit
    /// length of every magnetization vector. Called only after an accepted
    /// step. The default leaves `y` untouched.
    fn normalize(&mut self, _y: &mut [f64]) {}
}

impl<S: System + ?Sized> System for &mut S {
    fn derivative(&mut self, y: &[f64], t: f64) -> &[f64] {
        (**self).derivative(y, t)
    }

    fn normalize(&mut self, y: &mut [f64]) {
        (**self).normalize(y)
    }
}

impl<S: System + ?Sized> System for Box<S> {
    fn derivative(&mut self, y: &[f64], t: f64) -> &[f64] {
        (**self).derivative(y, t)
    }

    fn normalize(&mut self, y: &mut [f64]) {
        (**self).normalize(y)
    }
}

/// Post-step projection that leaves the state unchanged
pub fn identity(_y: &mut [f64]) {}

/// [`System`] built from closures.
///
/// The derivative closure writes into a buffer owned by the adapter, so
/// plain functions can be used without managing storage.
///
/// ```
/// use heun::FnSystem;
///
/// let sys = FnSystem::new(2, |y: &[f64], _t: f64, dy: &mut [f64]| {
///     dy[0] = y[1];
///     dy[1] = -y[0];
/// });
/// ```
pub struct FnSystem<F, N = fn(&mut [f64])> {
    rhs: F,
    norm: N,
    out: Vec<f64>,
}

impl<F> FnSystem<F>
where
    F: FnMut(&[f64], f64, &mut [f64]),
{
    /// Wrap `rhs` for states of length `len`, with no projection.
    pub fn new(len: usize, rhs: F) -> Self {
        Self {
            rhs,
            norm: identity,
            out: vec![0.0; len],
        }
    }
}

impl<F, N> FnSystem<F, N> {
    /// Replace the post-step projection
    pub fn with_normalize<M>(self, norm: M) -> FnSystem<F, M>
    where
        M: FnMut(&mut [f64]),
    {
        FnSystem {
            rhs: self.rhs,
            norm,
            out: self.out,
        }
    }
}

impl<F, N> System for FnSystem<F, N>
where
    F: FnMut(&[f64], f64, &mut [f64]),
    N: FnMut(&mut [f64]),
{
    fn derivative(&mut self, y: &[f64], t: f64) -> &[f64] {
        (self.rhs)(y, t, &mut self.out);
        &self.out
    }

    fn normalize(&mut self, y: &mut [f64]) {
        (self.norm)(y)
    }
}

/// Rescale every `components`-vector of `y` to unit length.
///
/// Zero vectors are left as they are. A trailing partial vector is ignored.
pub fn normalize_vectors(y: &mut [f64], components: usize) {
    if components == 0 {
        return;
    }
    for v in y.chunks_exact_mut(components) {
        let len = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if len > 0.0 {
            v.iter_mut().for_each(|x| *x /= len);
        }
    }
}
