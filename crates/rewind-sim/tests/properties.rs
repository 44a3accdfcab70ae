//! Randomized operation sequences checked against a replay from power-on.

mod common;

use common::*;
use proptest::prelude::*;
use rewind::{CheckpointId, Engine, Frame, InputLog, TickBudget};
use rewind_sim::SimInput;

const LEN: u64 = 400;

#[derive(Debug, Clone)]
enum Op {
    Seek(u64),
    Edit(u64, u16),
    Invalidate(u64),
    Tick,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..LEN).prop_map(Op::Seek),
        2 => (0..LEN, any::<u16>()).prop_map(|(frame, buttons)| Op::Edit(frame, buttons)),
        1 => (0..=LEN).prop_map(Op::Invalidate),
        3 => Just(Op::Tick),
    ]
}

fn small_config() -> rewind::SaveSystemConfig {
    config()
        .with_global_budget(16 * STATE_LEN as u64)
        .with_block_budget(8 * STATE_LEN as u64)
        .with_block_len(100)
        .with_tick_budget(TickBudget::Steps(60))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn playhead_state_matches_fresh_replay(
        seed in any::<u64>(),
        ops in prop::collection::vec(op(), 1..24),
    ) {
        let mut system = system_with(random_inputs(seed, LEN), small_config());

        for op in ops {
            match op {
                Op::Seek(frame) => system.set_current_frame(Frame::new(frame)).unwrap(),
                Op::Edit(frame, buttons) => {
                    let frame = Frame::new(frame);
                    let input = SimInput { buttons, ..*system.inputs().get(frame).unwrap() };
                    system.set_input(frame, input).unwrap();
                }
                Op::Invalidate(start) => {
                    let start = Frame::new(start);
                    let playhead_before_start = system.current_frame() < start;
                    system.invalidate_frames(start).unwrap();
                    for (id, checkpoint) in system.checkpoints() {
                        if let Some(frame) = checkpoint.frame() {
                            prop_assert!(
                                frame < start || frame <= system.current_frame(),
                                "{:?} kept frame {} past invalidation at {}", id, frame, start
                            );
                        }
                    }
                    if playhead_before_start {
                        prop_assert!(system.last_valid_frame() < Some(start));
                    }
                }
                Op::Tick => {
                    system.tick().unwrap();
                }
            }

            let playhead = system.current_frame();
            let expected = oracle(system.inputs(), playhead);
            let current = system.checkpoint(CheckpointId::Current);
            prop_assert_eq!(current.frame(), Some(playhead));
            prop_assert_eq!(current.state().as_slice(), expected.image());
            prop_assert_eq!(system.frame_summary(playhead), Some(&expected.summarize()));
            if let Some(previous) = system.previous_frame() {
                prop_assert_eq!(previous.next(), playhead);
            }
            assert_region_invariant(&system);
        }
    }

    #[test]
    fn every_valid_summary_matches_fresh_replay(
        seed in any::<u64>(),
        seek in 0..LEN,
        edit in 0..LEN,
        ticks in 0usize..6,
    ) {
        let mut system = system_with(random_inputs(seed, LEN), small_config());
        system.set_current_frame(Frame::new(seek)).unwrap();
        let edit = Frame::new(edit);
        let input = *system.inputs().get(edit).unwrap();
        system
            .set_input(edit, SimInput { stick_y: input.stick_y.wrapping_sub(3), ..input })
            .unwrap();
        for _ in 0..ticks {
            system.tick().unwrap();
        }

        let mut engine = rewind_sim::SimEngine::power_on(SEED, STATE_LEN).unwrap();
        for frame in 0..system.inputs().len() {
            let frame = Frame::new(frame);
            if let Some(summary) = system.frame_summary(frame) {
                prop_assert_eq!(summary, &engine.summarize(), "summary diverged at {}", frame);
            }
            let input = system.inputs().input(frame).unwrap();
            engine.step(input).unwrap();
        }
    }
}
