//! Property-based tests for the state machine primitive.
//!
//! A small turnstile machine is driven by arbitrary operation sequences and
//! compared against a plain model: the observed stream must equal the
//! sequence of states the model accepted, starting with the initial state.

use proptest::prelude::*;
use rideflow_core::{StateMachine, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turnstile {
    Locked { coins: u8 },
    Unlocked,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Coin,
    Push,
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Coin),
        3 => Just(Op::Push),
        1 => Just(Op::Reset),
    ]
}

/// Reference model. `None` means the operation is invalid.
fn model_step(state: Turnstile, op: Op) -> Option<Turnstile> {
    match (state, op) {
        (Turnstile::Locked { coins }, Op::Coin) if coins >= 1 => Some(Turnstile::Unlocked),
        (Turnstile::Locked { coins }, Op::Coin) => Some(Turnstile::Locked { coins: coins + 1 }),
        (Turnstile::Unlocked, Op::Push) => Some(Turnstile::Locked { coins: 0 }),
        (_, Op::Reset) => Some(Turnstile::Locked { coins: 0 }),
        _ => None,
    }
}

fn apply(machine: &StateMachine<Turnstile>, op: Op) -> Result<Turnstile, TransitionError> {
    machine.transition("op", |state| {
        model_step(*state, op).ok_or_else(|| TransitionError::invalid(state, "op"))
    })
}

proptest! {
    #[test]
    fn prop_stream_matches_accepted_transitions(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let initial = Turnstile::Locked { coins: 0 };
        let machine = StateMachine::new("turnstile", initial);
        let mut stream = machine.observe_state();

        let mut model = initial;
        let mut expected = vec![initial];
        for op in ops {
            let result = apply(&machine, op);
            match model_step(model, op) {
                Some(next) => {
                    prop_assert_eq!(result, Ok(next));
                    model = next;
                    expected.push(next);
                },
                None => prop_assert!(result.unwrap_err().is_invalid_transition()),
            }
            prop_assert_eq!(machine.current_state(), model);
        }

        prop_assert_eq!(stream.drain(), expected);
    }

    #[test]
    fn prop_late_subscriber_starts_at_current(
        before in prop::collection::vec(op_strategy(), 0..32),
        after in prop::collection::vec(op_strategy(), 0..32),
    ) {
        let machine = StateMachine::new("turnstile", Turnstile::Locked { coins: 0 });
        for op in before {
            let _ = apply(&machine, op);
        }

        let current = machine.current_state();
        let mut stream = machine.observe_state();
        let mut expected = vec![current];
        for op in after {
            if let Ok(next) = apply(&machine, op) {
                expected.push(next);
            }
        }

        prop_assert_eq!(stream.drain(), expected);
    }
}

#[test]
fn rejected_transition_message_names_state() {
    let machine = StateMachine::new("turnstile", Turnstile::Unlocked);

    let err = apply(&machine, Op::Coin).unwrap_err();

    insta::assert_snapshot!(err.to_string(), @"invalid state transition: cannot op from Unlocked");
}
