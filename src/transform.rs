//! Per-item transforms applied on read

use ndarray::ArrayD;

/// Maps one feature or target tensor to another.
///
/// Any `Fn(ArrayD<f32>) -> ArrayD<f32>` closure is a transform.
pub trait Transform: Send + Sync {
    /// Apply the transform.
    fn apply(&self, value: ArrayD<f32>) -> ArrayD<f32>;
}

impl<F> Transform for F
where
    F: Fn(ArrayD<f32>) -> ArrayD<f32> + Send + Sync,
{
    fn apply(&self, value: ArrayD<f32>) -> ArrayD<f32> {
        self(value)
    }
}

/// Runs transforms in insertion order.
#[derive(Default)]
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    /// Empty composition (identity)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform.
    #[must_use]
    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    /// Number of composed transforms
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// True for the identity composition
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&self, value: ArrayD<f32>) -> ArrayD<f32> {
        self.transforms
            .iter()
            .fold(value, |acc, transform| transform.apply(acc))
    }
}
