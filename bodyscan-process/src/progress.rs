//! Progress notifications for per-point passes.

use rayon::prelude::*;

/// Callback receiving `(processed, total)` point counts.
pub type ProgressCallback<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Invokes a callback every `every` processed points and once at the end.
///
/// A cadence of zero, or no callback, disables reporting.
pub struct Progress<'a> {
    every: usize,
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> Progress<'a> {
    pub fn new(every: usize, callback: impl FnMut(usize, usize) + 'a) -> Self {
        Self {
            every,
            callback: Some(Box::new(callback)),
        }
    }

    /// A reporter that never calls back.
    pub fn none() -> Self {
        Self {
            every: 0,
            callback: None,
        }
    }

    fn enabled(&self) -> bool {
        self.every > 0 && self.callback.is_some()
    }

    /// Record that `processed` of `total` points are done.
    pub fn tick(&mut self, processed: usize, total: usize) {
        if !self.enabled() {
            return;
        }
        if processed % self.every == 0 || processed == total {
            if let Some(callback) = self.callback.as_mut() {
                callback(processed, total);
            }
        }
    }

    /// Evaluate `f` for every index in `0..total` in parallel, preserving
    /// index order in the result and reporting after each chunk of
    /// `every` points.
    pub(crate) fn map_indexed<T, F>(&mut self, total: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        let chunk = if self.enabled() { self.every } else { total.max(1) };
        let mut out = Vec::with_capacity(total);
        let mut start = 0;
        while start < total {
            let end = (start + chunk).min(total);
            out.par_extend((start..end).into_par_iter().map(&f));
            self.tick(end, total);
            start = end;
        }
        out
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::none()
    }
}
