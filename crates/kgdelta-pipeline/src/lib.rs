//! DAG scheduler for comparison plans.
//!
//! A plan is a set of steps with explicit input edges. Steps are appended
//! in reference order (an input must already exist when a step is added),
//! so the graph is acyclic by construction. At run time every step becomes
//! a tokio task that first awaits the completion of all its inputs over
//! watch channels, then executes its synchronous body on the blocking pool.
//! The join barrier is the only synchronization between steps: a step that
//! writes shared state must be declared an input of every step reading it.
//!
//! There are no retries and no explicit cancellation. A failed step flips
//! its channel to `Failed`, which aborts all transitive dependents; steps
//! on independent branches still run to completion, and the first recorded
//! failure is reported with the failing step's identity and cause.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// One unit of plan execution. `run` is synchronous; the scheduler moves it
/// to the blocking pool.
pub trait Step: Send + Sync + 'static {
    fn id(&self) -> &str;
    fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step \"{step}\" failed: {cause}")]
    StepFailure {
        step: String,
        #[source]
        cause: anyhow::Error,
    },
    #[error("step \"{step}\" references input index {input}, which is not defined before it")]
    UnknownInput { step: String, input: usize },
}

struct Node {
    step: Arc<dyn Step>,
    inputs: Vec<usize>,
}

#[derive(Default)]
pub struct Pipeline {
    nodes: Vec<Node>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step whose inputs are indices of previously added steps,
    /// and returns its own index.
    pub fn add_step(
        &mut self,
        step: Arc<dyn Step>,
        inputs: impl IntoIterator<Item = usize>,
    ) -> Result<usize, PipelineError> {
        let index = self.nodes.len();
        let inputs: Vec<usize> = inputs.into_iter().collect();
        for &input in &inputs {
            if input >= index {
                return Err(PipelineError::UnknownInput {
                    step: step.id().to_string(),
                    input,
                });
            }
        }
        self.nodes.push(Node { step, inputs });
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of transitive predecessors per step. Only seeds the spawn
    /// order; correctness comes from the join barriers.
    fn transitive_predecessor_counts(&self) -> Vec<usize> {
        let mut predecessors: Vec<BTreeSet<usize>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut set = BTreeSet::new();
            for &input in &node.inputs {
                set.insert(input);
                set.extend(predecessors[input].iter().copied());
            }
            predecessors.push(set);
        }
        predecessors.iter().map(BTreeSet::len).collect()
    }

    pub async fn run(&self) -> Result<(), PipelineError> {
        let mut senders = Vec::with_capacity(self.nodes.len());
        let mut receivers = Vec::with_capacity(self.nodes.len());
        for _ in &self.nodes {
            let (tx, rx) = watch::channel(StepState::NotStarted);
            senders.push(Some(tx));
            receivers.push(rx);
        }

        let counts = self.transitive_predecessor_counts();
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by_key(|&i| (counts[i], i));

        let first_failure: Arc<Mutex<Option<PipelineError>>> = Arc::new(Mutex::new(None));
        let mut handles = Vec::with_capacity(order.len());
        for index in order {
            let node = &self.nodes[index];
            let step = Arc::clone(&node.step);
            let tx = senders[index].take().expect("each step spawned once");
            let input_receivers: Vec<watch::Receiver<StepState>> = node
                .inputs
                .iter()
                .map(|&input| receivers[input].clone())
                .collect();
            let first_failure = Arc::clone(&first_failure);

            handles.push(tokio::spawn(async move {
                for mut receiver in input_receivers {
                    loop {
                        // copy the state out so no watch guard is held
                        // across the await below
                        let state = *receiver.borrow_and_update();
                        match state {
                            StepState::Succeeded => break,
                            StepState::Failed => {
                                debug!(step = step.id(), "step aborted: input failed");
                                let _ = tx.send(StepState::Failed);
                                return;
                            }
                            _ => {
                                if receiver.changed().await.is_err() {
                                    let _ = tx.send(StepState::Failed);
                                    return;
                                }
                            }
                        }
                    }
                }

                let _ = tx.send(StepState::Running);
                debug!(step = step.id(), "step started");
                let body = Arc::clone(&step);
                match tokio::task::spawn_blocking(move || body.run()).await {
                    Ok(Ok(())) => {
                        debug!(step = step.id(), "step succeeded");
                        let _ = tx.send(StepState::Succeeded);
                    }
                    Ok(Err(cause)) => {
                        error!(step = step.id(), %cause, "step failed");
                        record_failure(&first_failure, step.id(), cause);
                        let _ = tx.send(StepState::Failed);
                    }
                    Err(join_error) => {
                        error!(step = step.id(), %join_error, "step panicked");
                        record_failure(&first_failure, step.id(), anyhow::Error::new(join_error));
                        let _ = tx.send(StepState::Failed);
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        let failure = first_failure.lock().take();
        match failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

fn record_failure(slot: &Mutex<Option<PipelineError>>, step: &str, cause: anyhow::Error) {
    let mut slot = slot.lock();
    if slot.is_none() {
        *slot = Some(PipelineError::StepFailure {
            step: step.to_string(),
            cause,
        });
    }
}
