//! Actors driving the interactive flows.
//!
//! Every flow runs as a single task that owns its state. Callers send
//! intents over a channel and observe [`FlowModel`] snapshots on a watch
//! channel. Network work runs in a [`CancellableOperation`] so that the
//! actor keeps reacting to intents and balance changes while it waits.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, trace};

use crate::{balance::BalanceProjection, error::EngineError};

pub mod auth;
pub mod error;
mod operation;
pub mod pay;
pub mod scan;
pub mod withdraw;

pub use operation::CancellableOperation;

/// Coarse progress shared by all flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowPhase {
    Idle,
    FetchingTerms,
    AwaitingUserAmount,
    Submitting,
    Succeeded,
    Failed,
}

pub trait FlowState: BalanceProjection + Clone + Debug + Send + Sync + 'static {
    fn phase(&self) -> FlowPhase;
}

/// Snapshot published after every event handled by a flow.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowModel<S> {
    /// Epoch of the flow's operation when the snapshot was taken.
    pub epoch: u64,
    pub state: S,
}

/// Event handlers of a flow. Handlers never block: anything that waits is
/// handed to the operation, and its output comes back through
/// [`FlowActor::handle_completed`].
pub(crate) trait FlowActor: Send + 'static {
    type Intent: Debug + Send + 'static;
    type State: FlowState;
    type Output: Send + 'static;

    fn state(&self) -> &Self::State;

    fn state_mut(&mut self) -> &mut Self::State;

    fn handle_intent(
        &mut self,
        intent: Self::Intent,
        operation: &mut CancellableOperation<Self::Output>,
    );

    fn handle_completed(
        &mut self,
        output: Self::Output,
        operation: &mut CancellableOperation<Self::Output>,
    );
}

/// Caller side of a running flow. Dropping it stops the flow.
pub struct FlowHandle<I, S> {
    intent_tx: mpsc::UnboundedSender<I>,
    model_rx: watch::Receiver<FlowModel<S>>,
    task: JoinHandle<()>,
}

impl<I, S: Clone> FlowHandle<I, S> {
    pub fn send(&self, intent: I) -> Result<(), EngineError> {
        self.intent_tx
            .send(intent)
            .map_err(|_| EngineError::FlowClosed)
    }

    /// The latest snapshot.
    pub fn model(&self) -> FlowModel<S> {
        self.model_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowModel<S>> {
        self.model_rx.clone()
    }

    /// Waits for the first snapshot, the current one included, matching
    /// `condition`.
    pub async fn wait_for(
        &self,
        condition: impl FnMut(&FlowModel<S>) -> bool,
    ) -> Result<FlowModel<S>, EngineError> {
        let mut model_rx = self.model_rx.clone();
        let model = model_rx
            .wait_for(condition)
            .await
            .map_err(|_| EngineError::FlowClosed)?;
        Ok(model.clone())
    }
}

impl<I, S> Drop for FlowHandle<I, S> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Event<I, O> {
    Intent(I),
    Completed(O),
    Balance(u64),
}

pub(crate) fn spawn_flow<A: FlowActor>(
    mut actor: A,
    mut balance: watch::Receiver<u64>,
) -> FlowHandle<A::Intent, A::State> {
    let initial_balance = *balance.borrow_and_update();
    actor.state_mut().project_balance(initial_balance);

    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let (model_tx, model_rx) = watch::channel(FlowModel {
        epoch: 0,
        state: actor.state().clone(),
    });
    let task = tokio::spawn(run_flow(actor, intent_rx, model_tx, balance));
    FlowHandle {
        intent_tx,
        model_rx,
        task,
    }
}

async fn run_flow<A: FlowActor>(
    mut actor: A,
    mut intent_rx: mpsc::UnboundedReceiver<A::Intent>,
    model_tx: watch::Sender<FlowModel<A::State>>,
    mut balance: watch::Receiver<u64>,
) {
    let mut operation = CancellableOperation::new();
    let mut balance_open = true;

    loop {
        // Intents win over completions that arrived in the meantime, so a
        // cancel already sent is applied before a late result.
        let event = tokio::select! {
            biased;

            intent = intent_rx.recv() => match intent {
                Some(intent) => Event::Intent(intent),
                None => break,
            },
            output = operation.next_completed() => Event::Completed(output),
            changed = balance.changed(), if balance_open => match changed {
                Ok(()) => Event::Balance(*balance.borrow_and_update()),
                Err(_) => {
                    debug!("Balance channel closed");
                    balance_open = false;
                    continue;
                }
            },
        };

        match event {
            Event::Intent(intent) => {
                debug!("Handling intent {intent:?}");
                actor.handle_intent(intent, &mut operation);
            }
            Event::Completed(output) => actor.handle_completed(output, &mut operation),
            Event::Balance(balance_msat) => {
                trace!("Balance changed to {balance_msat} msat");
                actor.state_mut().project_balance(balance_msat);
            }
        }

        model_tx.send_replace(FlowModel {
            epoch: operation.epoch(),
            state: actor.state().clone(),
        });
    }
    debug!("Flow stopped, all handles dropped");
}
