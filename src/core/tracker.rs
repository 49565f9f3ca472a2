use crate::io::engine::Product;
use crate::logging::RunLogger;
use crate::types::{PipelineError, PipelineResult};

/// Handle to a product owned by a [`ResourceTracker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductId(usize);

impl ProductId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Outcome of a release pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub attempted: usize,
    pub failed: usize,
}

/// Owns every product created during one run and releases them all.
///
/// Products are released in registration order. A failing release is logged
/// and the pass continues; `release_all` never returns an error. Anything
/// still registered when the tracker is dropped is released then.
pub struct ResourceTracker<P: Product> {
    slots: Vec<Option<P>>,
    log: RunLogger,
}

impl<P: Product> ResourceTracker<P> {
    pub fn new(log: RunLogger) -> Self {
        Self {
            slots: Vec::new(),
            log,
        }
    }

    pub fn register(&mut self, product: P) -> ProductId {
        self.slots.push(Some(product));
        ProductId(self.slots.len() - 1)
    }

    pub fn get(&self, id: ProductId) -> PipelineResult<&P> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(PipelineError::UnknownProduct(id.0))
    }

    /// First live product matching `predicate`
    pub fn find(&self, mut predicate: impl FnMut(&P) -> bool) -> Option<ProductId> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(false, &mut predicate))
            .map(ProductId)
    }

    /// Number of products still awaiting release
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn release_all(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(product) = slot.take() else {
                continue;
            };
            report.attempted += 1;
            if let Err(e) = product.release() {
                report.failed += 1;
                self.log
                    .warn(format_args!("Failed to release product #{}: {}", index, e));
            }
        }

        if report.attempted > 0 {
            self.log.debug(format_args!(
                "Released {} products ({} failures)",
                report.attempted, report.failed
            ));
        }
        report
    }
}

impl<P: Product> Drop for ResourceTracker<P> {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.release_all();
        }
    }
}
