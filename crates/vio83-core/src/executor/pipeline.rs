//! Pipeline DAG
//!
//! Named stages with declared dependencies, each running on its chosen
//! pool. Acyclicity is enforced eagerly at `add_stage` time by running the
//! topological sort; `run` executes stages in that order, feeding each
//! stage its dependencies' outputs (or the initial items for roots). The
//! process-wide stop flag short-circuits between stages.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cancel::CancelToken;

use super::pool::{CpuPool, ThreadPool};
use super::{BatchProgress, ExecutorError, ProgressTracker, Result};

/// Which pool a stage runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolKind {
    /// CPU-bound: rayon pool
    #[default]
    Cpu,
    /// I/O-bound: OS-thread pool
    Thread,
}

/// Per-stage configuration.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Stage name, unique in the pipeline
    pub name: String,
    /// Names of stages whose outputs feed this one; empty = root
    pub depends_on: Vec<String>,
    /// Pool kind
    pub pool: PoolKind,
    /// Worker override for this stage
    pub max_workers: Option<usize>,
    /// Per-item retry budget
    pub retry_count: usize,
}

impl StageConfig {
    /// Root stage on the CPU pool with no retries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            pool: PoolKind::Cpu,
            max_workers: None,
            retry_count: 0,
        }
    }

    /// Declare dependencies.
    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| (*d).to_string()).collect();
        self
    }

    /// Choose the pool kind.
    pub fn pool(mut self, pool: PoolKind) -> Self {
        self.pool = pool;
        self
    }

    /// Set the per-item retry budget.
    pub fn retries(mut self, count: usize) -> Self {
        self.retry_count = count;
        self
    }
}

type StageFn<T> = Arc<dyn Fn(&T) -> std::result::Result<T, String> + Send + Sync>;

struct Stage<T> {
    config: StageConfig,
    f: StageFn<T>,
}

/// Callback invoked per stage with its name and final progress.
pub type StageCallback = Arc<dyn Fn(&str, &BatchProgress) + Send + Sync>;

/// A DAG of map stages over one item type.
pub struct Pipeline<T> {
    stages: Vec<Stage<T>>,
    order: Vec<usize>,
    cancel: CancelToken,
}

impl<T: Send + Sync + Clone> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + Clone> Pipeline<T> {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            order: Vec::new(),
            cancel: CancelToken::global(),
        }
    }

    /// Replace the cancellation watch (scoped runs, tests).
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register a stage. Fails eagerly on duplicate names, unknown
    /// dependencies, or a dependency cycle.
    pub fn add_stage<F>(&mut self, config: StageConfig, f: F) -> Result<()>
    where
        F: Fn(&T) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        if self.stages.iter().any(|s| s.config.name == config.name) {
            return Err(ExecutorError::DuplicateStage(config.name));
        }
        for dependency in &config.depends_on {
            if !self.stages.iter().any(|s| &s.config.name == dependency) {
                return Err(ExecutorError::UnknownDependency {
                    stage: config.name,
                    dependency: dependency.clone(),
                });
            }
        }

        self.stages.push(Stage {
            config,
            f: Arc::new(f),
        });

        // Re-run the sort now so a cycle is rejected at add time
        match self.topological_order() {
            Ok(order) => {
                self.order = order;
                Ok(())
            }
            Err(_) => {
                let stage = self.stages.pop().map(|s| s.config.name).unwrap_or_default();
                Err(ExecutorError::Cycle(stage))
            }
        }
    }

    /// Stage names in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.stages[i].config.name.as_str())
            .collect()
    }

    fn topological_order(&self) -> Result<Vec<usize>> {
        let index_of: HashMap<&str, usize> = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.config.name.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; self.stages.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.stages.len()];
        for (i, stage) in self.stages.iter().enumerate() {
            for dependency in &stage.config.depends_on {
                let d = index_of[dependency.as_str()];
                in_degree[i] += 1;
                dependents[d].push(i);
            }
        }

        let mut queue: Vec<usize> = (0..self.stages.len()).filter(|&i| in_degree[i] == 0).collect();
        queue.sort_unstable();
        let mut order = Vec::with_capacity(self.stages.len());
        while let Some(node) = queue.pop() {
            order.push(node);
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if order.len() != self.stages.len() {
            return Err(ExecutorError::Cycle("pipeline".to_string()));
        }
        Ok(order)
    }

    /// Execute the pipeline over `items`.
    ///
    /// Every stage maps over the concatenated outputs of its dependencies
    /// (or `items` for roots) on its configured pool; outputs keep input
    /// order. Returns the outputs of the last stage in execution order.
    pub fn run(&self, items: Vec<T>, on_stage: Option<StageCallback>) -> Result<Vec<T>> {
        let mut outputs: HashMap<&str, Vec<T>> = HashMap::new();
        let mut last: Vec<T> = items.clone();

        for &index in &self.order {
            if self.cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }

            let stage = &self.stages[index];
            let input: Vec<T> = if stage.config.depends_on.is_empty() {
                items.clone()
            } else {
                stage
                    .config
                    .depends_on
                    .iter()
                    .flat_map(|d| outputs.get(d.as_str()).cloned().unwrap_or_default())
                    .collect()
            };

            let tracker = ProgressTracker::new(input.len());
            let f = Arc::clone(&stage.f);
            let stage_results = match stage.config.pool {
                PoolKind::Cpu => {
                    let pool = CpuPool::new(stage.config.max_workers);
                    pool.map(
                        move |item: &T| f(item),
                        &input,
                        Some(&tracker),
                        stage.config.retry_count,
                    )
                }
                PoolKind::Thread => {
                    let pool = ThreadPool::new(stage.config.max_workers);
                    pool.map(
                        move |item: &T| f(item),
                        &input,
                        Some(&tracker),
                        stage.config.retry_count,
                    )
                }
            };

            if let Some(callback) = &on_stage {
                callback(&stage.config.name, &tracker.snapshot());
            }

            tracing::debug!(
                stage = %stage.config.name,
                input = input.len(),
                output = stage_results.len(),
                "pipeline stage finished"
            );
            last = stage_results.clone();
            outputs.insert(stage.config.name.as_str(), stage_results);
        }

        Ok(last)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_pipeline() {
        let mut pipeline: Pipeline<i64> = Pipeline::new().with_cancel_token(CancelToken::local());
        pipeline
            .add_stage(StageConfig::new("double"), |&x| Ok(x * 2))
            .unwrap();
        pipeline
            .add_stage(StageConfig::new("inc").depends_on(&["double"]), |&x| Ok(x + 1))
            .unwrap();

        let out = pipeline.run(vec![1, 2, 3], None).unwrap();
        assert_eq!(out, vec![3, 5, 7]);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut pipeline: Pipeline<i64> = Pipeline::new();
        let err = pipeline
            .add_stage(StageConfig::new("a").depends_on(&["ghost"]), |&x| Ok(x))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownDependency { .. }));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let mut pipeline: Pipeline<i64> = Pipeline::new();
        pipeline.add_stage(StageConfig::new("a"), |&x| Ok(x)).unwrap();
        let err = pipeline
            .add_stage(StageConfig::new("a"), |&x| Ok(x))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::DuplicateStage(_)));
    }

    #[test]
    fn test_stage_failures_drop_items() {
        let mut pipeline: Pipeline<i64> = Pipeline::new().with_cancel_token(CancelToken::local());
        pipeline
            .add_stage(StageConfig::new("filter"), |&x| {
                if x % 2 == 0 {
                    Err("even".to_string())
                } else {
                    Ok(x)
                }
            })
            .unwrap();

        let out = pipeline.run(vec![1, 2, 3, 4, 5], None).unwrap();
        assert_eq!(out, vec![1, 3, 5]);
    }

    #[test]
    fn test_cancellation_short_circuits() {
        let token = CancelToken::local();
        let mut pipeline: Pipeline<i64> = Pipeline::new().with_cancel_token(token.clone());
        pipeline.add_stage(StageConfig::new("a"), |&x| Ok(x)).unwrap();

        token.request_stop();
        let err = pipeline.run(vec![1], None).unwrap_err();
        assert!(matches!(err, ExecutorError::Cancelled));
    }

    #[test]
    fn test_diamond_order() {
        let mut pipeline: Pipeline<i64> = Pipeline::new().with_cancel_token(CancelToken::local());
        pipeline.add_stage(StageConfig::new("root"), |&x| Ok(x)).unwrap();
        pipeline
            .add_stage(StageConfig::new("left").depends_on(&["root"]), |&x| Ok(x + 1))
            .unwrap();
        pipeline
            .add_stage(StageConfig::new("right").depends_on(&["root"]), |&x| Ok(x + 2))
            .unwrap();
        pipeline
            .add_stage(
                StageConfig::new("join").depends_on(&["left", "right"]),
                |&x| Ok(x * 10),
            )
            .unwrap();

        let order = pipeline.execution_order();
        let pos = |name: &str| order.iter().position(|&s| s == name).unwrap();
        assert!(pos("root") < pos("left"));
        assert!(pos("root") < pos("right"));
        assert!(pos("left") < pos("join"));
        assert!(pos("right") < pos("join"));

        // join sees left's and right's outputs concatenated
        let out = pipeline.run(vec![1], None).unwrap();
        assert_eq!(out, vec![20, 30]);
    }

    #[test]
    fn test_stage_callback() {
        let mut pipeline: Pipeline<i64> = Pipeline::new().with_cancel_token(CancelToken::local());
        pipeline.add_stage(StageConfig::new("only"), |&x| Ok(x)).unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_ref = Arc::clone(&seen);
        pipeline
            .run(
                vec![1, 2],
                Some(Arc::new(move |name: &str, progress: &BatchProgress| {
                    seen_ref.lock().unwrap().push((name.to_string(), progress.completed));
                })),
            )
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("only".to_string(), 2));
    }
}
