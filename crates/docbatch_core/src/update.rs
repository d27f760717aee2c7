use crate::{AppState, Effect, Msg, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::DestinationSelected(path) => {
            if state.session() != SessionState::Idle {
                return (state, Vec::new());
            }
            state.set_destination(path);
            vec![persist_settings(&state)]
        }
        Msg::ModeSelected(mode) => {
            if state.session() != SessionState::Idle || state.mode() == mode {
                return (state, Vec::new());
            }
            state.set_mode(mode);
            vec![persist_settings(&state)]
        }
        Msg::StartClicked => {
            if state.session() != SessionState::Idle {
                return (state, Vec::new());
            }
            match state.destination().map(|p| p.to_path_buf()) {
                Some(destination) => {
                    state.clear_log();
                    state.set_session(SessionState::Validating);
                    vec![Effect::StartRun {
                        destination,
                        mode: state.mode(),
                    }]
                }
                None => {
                    state.push_log("ERROR: select a destination folder first.");
                    Vec::new()
                }
            }
        }
        Msg::ValidationFinished { clean } => {
            if state.session() == SessionState::Validating {
                let next = if clean {
                    SessionState::Running
                } else {
                    SessionState::AwaitingConfirmation
                };
                state.set_session(next);
            }
            Vec::new()
        }
        Msg::ContinueClicked => {
            if state.session() == SessionState::AwaitingConfirmation {
                state.set_session(SessionState::Running);
                vec![Effect::ConfirmRun]
            } else {
                Vec::new()
            }
        }
        Msg::CancelClicked => match state.session() {
            SessionState::Validating
            | SessionState::AwaitingConfirmation
            | SessionState::Running => {
                state.push_log("Cancellation requested. Waiting for current tasks.");
                state.set_session(SessionState::Cancelling);
                vec![Effect::CancelRun]
            }
            SessionState::Idle | SessionState::Cancelling => Vec::new(),
        },
        Msg::LogLine(line) => {
            state.push_log(line);
            Vec::new()
        }
        Msg::RunFinished(summary) => {
            // Always hand control back to the operator, whatever the session state.
            state.finish(summary);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn persist_settings(state: &AppState) -> Effect {
    Effect::PersistSettings {
        destination: state.destination().map(|p| p.to_path_buf()),
        mode: state.mode(),
    }
}
