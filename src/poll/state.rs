//! §4.7's state machine: `NEW → OPEN → HALF_CLOSED`, with `close` / idle
//! timeout / error reachable as a terminal `CLOSED` from any state.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    New,
    Open,
    HalfClosed,
    Closed,
}

impl Phase {
    pub fn on_session_created(&mut self) {
        if *self == Phase::New {
            *self = Phase::Open;
        }
    }

    pub fn on_fin(&mut self) {
        if *self == Phase::Open {
            *self = Phase::HalfClosed;
        }
    }

    pub fn on_close(&mut self) {
        *self = Phase::Closed;
    }

    pub fn is_closed(&self) -> bool {
        *self == Phase::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_then_fin_then_close_follows_the_documented_path() {
        let mut phase = Phase::New;
        phase.on_session_created();
        assert_eq!(phase, Phase::Open);
        phase.on_fin();
        assert_eq!(phase, Phase::HalfClosed);
        phase.on_close();
        assert_eq!(phase, Phase::Closed);
    }

    #[test]
    fn close_is_reachable_from_any_state() {
        for mut phase in [Phase::New, Phase::Open, Phase::HalfClosed] {
            phase.on_close();
            assert!(phase.is_closed());
        }
    }

    #[test]
    fn fin_is_a_no_op_outside_open() {
        let mut phase = Phase::New;
        phase.on_fin();
        assert_eq!(phase, Phase::New);
    }
}
