use crate::dimred::vbpca::VBPCA;
use crate::error::VbpcaError;
use ndarray::{Array2, ArrayView2};
use parking_lot::Mutex;

/// Thread-safe handle around a [`VBPCA`] engine.
///
/// Every operation holds the lock for its whole duration, so a sweep is never observed half-way
/// by a concurrent projection.
pub struct SharedVBPCA {
    inner: Mutex<VBPCA>,
}

impl SharedVBPCA {
    pub fn new(engine: VBPCA) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }

    pub fn update(&self) -> Result<(), VbpcaError> {
        self.inner.lock().update()
    }

    pub fn fit_transform(&self, iterations: usize) -> Result<Array2<f64>, VbpcaError> {
        self.inner.lock().fit_transform(iterations)
    }

    pub fn transform(&self) -> Array2<f64> {
        self.inner.lock().transform()
    }

    pub fn transform_new(&self, y: ArrayView2<f64>) -> Result<Array2<f64>, VbpcaError> {
        self.inner.lock().transform_new(y)
    }

    /// Runs `f` with shared access to the engine while holding the lock.
    pub fn with_engine<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&VBPCA) -> T,
    {
        let guard = self.inner.lock();
        f(&*guard)
    }

    pub fn into_inner(self) -> VBPCA {
        self.inner.into_inner()
    }
}

impl From<VBPCA> for SharedVBPCA {
    fn from(engine: VBPCA) -> Self {
        Self::new(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimred::vbpca::VBPCABuilder;
    use crate::utils::AllFinite;

    fn observations() -> Array2<f64> {
        Array2::from_shape_fn((4, 30), |(i, j)| {
            let t = j as f64 / 30.0;
            (i as f64 + 1.0) * t + ((i * j) % 7) as f64 * 0.01
        })
    }

    #[test]
    fn test_concurrent_updates_and_projections() {
        let y = observations();
        let engine = VBPCABuilder::new().random_seed(1).build(y.clone()).unwrap();
        let shared = SharedVBPCA::new(engine);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        shared.update().unwrap();
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..10 {
                    let projected = shared.transform_new(y.view()).unwrap();
                    assert_eq!(projected.dim(), (3, 30));
                    assert!(projected.all_finite());
                }
            });
        });

        assert_eq!(shared.with_engine(|engine| engine.sweeps()), 20);
        let engine = shared.into_inner();
        assert_eq!(engine.transform().dim(), (3, 30));
    }

    #[test]
    fn test_shared_matches_plain_engine() {
        let y = observations();
        let mut plain = VBPCABuilder::new().random_seed(2).build(y.clone()).unwrap();
        let shared: SharedVBPCA = VBPCABuilder::new().random_seed(2).build(y).unwrap().into();

        let expected = plain.fit_transform(6).unwrap();
        assert_eq!(shared.fit_transform(6).unwrap(), expected);
        assert_eq!(shared.transform(), expected);
    }
}
