//! Named fetch stages with declared dependencies.
//!
//! A [`FetchPlan`] is a list of stages; each stage names the earlier stages
//! it depends on and receives their outputs. Stages are grouped into levels
//! (a stage's level is one past its deepest dependency) and every stage of a
//! level runs concurrently.
//!
//! ```rust
//! # tokio_test_block(async {
//! use chainevents_core::FetchPlan;
//!
//! let outputs = FetchPlan::new()
//!     .stage("proposals", &[], |_| async { Ok(vec![1u64, 2]) })
//!     .stage("referenda", &[], |_| async { Ok(vec![3u64]) })
//!     .stage("preimages", &["proposals", "referenda"], |inputs| async move {
//!         let hashes: Vec<u64> = inputs.iter().flat_map(|(_, v)| v.iter().copied()).collect();
//!         Ok(hashes)
//!     })
//!     .run()
//!     .await
//!     .unwrap();
//! assert_eq!(outputs.last().unwrap().1.len(), 3);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};

use crate::error::{Error, Result};

type StageFn<T> = Box<dyn FnOnce(StageInputs<T>) -> BoxFuture<'static, Result<T>> + Send>;

struct Stage<T> {
    name: &'static str,
    deps: Vec<&'static str>,
    run: StageFn<T>,
}

/// Outputs of a stage's dependencies, in declared dependency order.
pub struct StageInputs<T> {
    outputs: Vec<(&'static str, Arc<T>)>,
}

impl<T> StageInputs<T> {
    /// Output of the dependency named `name`.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.outputs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &T)> {
        self.outputs.iter().map(|(n, v)| (*n, v.as_ref()))
    }
}

/// An ordered list of dependent fetch stages.
pub struct FetchPlan<T> {
    stages: Vec<Stage<T>>,
}

impl<T> Default for FetchPlan<T> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<T: Clone + Send + Sync + 'static> FetchPlan<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. `deps` must name stages added before this one.
    pub fn stage<F, Fut>(mut self, name: &'static str, deps: &[&'static str], run: F) -> Self
    where
        F: FnOnce(StageInputs<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.stages.push(Stage {
            name,
            deps: deps.to_vec(),
            run: Box::new(move |inputs| run(inputs).boxed()),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Compute each stage's level, rejecting unknown, forward or duplicate names.
    fn levels(&self) -> Result<Vec<usize>> {
        let mut level_of: HashMap<&'static str, usize> = HashMap::new();
        let mut levels = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            if level_of.contains_key(stage.name) {
                return Err(Error::Config(format!("duplicate fetch stage '{}'", stage.name)));
            }
            let mut level = 0;
            for dep in &stage.deps {
                let dep_level = level_of.get(dep).ok_or_else(|| {
                    Error::Config(format!(
                        "fetch stage '{}' depends on unknown or later stage '{dep}'",
                        stage.name
                    ))
                })?;
                level = level.max(dep_level + 1);
            }
            level_of.insert(stage.name, level);
            levels.push(level);
        }
        Ok(levels)
    }

    /// Run every stage and return `(name, output)` in declaration order.
    ///
    /// The first failing stage fails the plan.
    pub async fn run(self) -> Result<Vec<(&'static str, T)>> {
        let levels = self.levels()?;
        let names: Vec<&'static str> = self.stages.iter().map(|s| s.name).collect();
        let depth = levels.iter().copied().max().map_or(0, |m| m + 1);

        let mut pending: Vec<Option<Stage<T>>> = self.stages.into_iter().map(Some).collect();
        let mut outputs: HashMap<&'static str, Arc<T>> = HashMap::new();

        for level in 0..depth {
            let mut names_in_level = Vec::new();
            let mut futures = Vec::new();
            for (idx, slot) in pending.iter_mut().enumerate() {
                if levels[idx] != level {
                    continue;
                }
                let Some(stage) = slot.take() else { continue };
                let inputs = StageInputs {
                    outputs: stage
                        .deps
                        .iter()
                        .filter_map(|d| outputs.get(d).map(|v| (*d, v.clone())))
                        .collect(),
                };
                tracing::trace!(stage = stage.name, level, "Running fetch stage");
                names_in_level.push(stage.name);
                futures.push((stage.run)(inputs));
            }
            for (name, result) in names_in_level.into_iter().zip(join_all(futures).await) {
                outputs.insert(name, Arc::new(result?));
            }
        }

        Ok(names
            .into_iter()
            .filter_map(|name| {
                outputs
                    .remove(name)
                    .map(|v| (name, Arc::try_unwrap(v).unwrap_or_else(|shared| (*shared).clone())))
            })
            .collect())
    }
}
