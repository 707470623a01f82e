use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    ClassifierLoading,
    FrameExtracting,
    Classifying,
    Aggregating,
    Fallback,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Completed,
    Failed,
}

impl PipelineState {
    pub fn transition(&self, event: StageEvent) -> Option<PipelineState> {
        use PipelineState::*;

        match (self, event) {
            (Init, StageEvent::Completed) => Some(ClassifierLoading),
            (ClassifierLoading, StageEvent::Completed) => Some(FrameExtracting),
            (FrameExtracting, StageEvent::Completed) => Some(Classifying),
            (Classifying, StageEvent::Completed) => Some(Aggregating),
            (Aggregating, StageEvent::Completed) => Some(Done),
            (Fallback, StageEvent::Completed) => Some(Done),

            (Init | ClassifierLoading | FrameExtracting | Classifying | Aggregating, StageEvent::Failed) => {
                Some(Fallback)
            }

            // 降级路径失败或已结束：没有后续状态
            (Fallback, StageEvent::Failed) | (Done, _) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done)
    }
}

/// Tracks one run through the pipeline stages and keeps the visited path.
pub struct PipelineStateMachine {
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl PipelineStateMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Init,
            history: vec![PipelineState::Init],
        }
    }

    pub fn advance(&mut self) -> PipelineState {
        self.apply(StageEvent::Completed)
    }

    pub fn fail(&mut self) -> PipelineState {
        self.apply(StageEvent::Failed)
    }

    fn apply(&mut self, event: StageEvent) -> PipelineState {
        match self.state.transition(event) {
            Some(next) => {
                debug!("pipeline {:?} -> {:?}", self.state, next);
                self.state = next;
                self.history.push(next);
            }
            None => warn!("ignored {:?} in state {:?}", event, self.state),
        }
        self.state
    }

    pub fn current_state(&self) -> PipelineState {
        self.state
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut sm = PipelineStateMachine::new();
        for _ in 0..5 {
            sm.advance();
        }

        assert!(sm.current_state().is_terminal());
        assert_eq!(
            sm.history(),
            &[
                PipelineState::Init,
                PipelineState::ClassifierLoading,
                PipelineState::FrameExtracting,
                PipelineState::Classifying,
                PipelineState::Aggregating,
                PipelineState::Done,
            ]
        );
    }

    #[test]
    fn test_failure_routes_through_fallback() {
        let mut sm = PipelineStateMachine::new();
        sm.advance();
        sm.advance();
        assert_eq!(sm.fail(), PipelineState::Fallback);
        assert_eq!(sm.advance(), PipelineState::Done);
    }

    #[test]
    fn test_every_active_stage_can_fail() {
        for state in [
            PipelineState::Init,
            PipelineState::ClassifierLoading,
            PipelineState::FrameExtracting,
            PipelineState::Classifying,
        ] {
            assert_eq!(
                state.transition(StageEvent::Failed),
                Some(PipelineState::Fallback)
            );
        }
    }

    #[test]
    fn test_terminal_and_fallback_failure_have_no_successor() {
        assert_eq!(PipelineState::Fallback.transition(StageEvent::Failed), None);
        assert_eq!(PipelineState::Done.transition(StageEvent::Completed), None);

        let mut sm = PipelineStateMachine::new();
        sm.fail();
        sm.advance();
        assert_eq!(sm.advance(), PipelineState::Done);
        assert_eq!(sm.history().len(), 3);
    }
}
