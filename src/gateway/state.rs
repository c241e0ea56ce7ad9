use std::sync::Arc;

use crate::external::EvaluationProvider;
use crate::router::Orchestrator;

pub struct HandlerState<P: EvaluationProvider> {
    pub orchestrator: Arc<Orchestrator<P>>,
}

impl<P: EvaluationProvider> HandlerState<P> {
    pub fn new(orchestrator: Arc<Orchestrator<P>>) -> Self {
        Self { orchestrator }
    }
}

impl<P: EvaluationProvider> Clone for HandlerState<P> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}
