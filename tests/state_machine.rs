mod common;

use common::{drain, fixture, fixture_with, keyed, run_cycles, send};
use reflex::prelude::*;

#[test]
fn startup_lands_in_stopped_and_announces_it() {
    let mut f = fixture(0);
    f.agent.on_start().unwrap();

    assert_eq!(f.agent.state(), AgentState::Stopped);
    for s in [
        AgentState::Root,
        AgentState::Startup,
        AgentState::Top,
        AgentState::Ready,
        AgentState::Stopped,
    ] {
        assert_eq!(f.agent.entry_count(s), 1, "{s:?}");
    }
    assert_eq!(f.agent.exit_count(AgentState::Startup), 1);

    let status = drain(&mut f.status);
    let changes = keyed(&status, "StateChange");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].1, Value::Str("Stopped".to_string()));
}

#[test]
fn play_from_stopped_enters_playing_through_processing() {
    let mut f = fixture(0);
    f.agent.on_start().unwrap();
    drain(&mut f.status);

    let ready_exits = f.agent.exit_count(AgentState::Ready);
    f.agent.dispatch_named(sym::PLAY);

    assert_eq!(f.agent.state(), AgentState::Playing);
    assert_eq!(f.agent.exit_count(AgentState::Stopped), 1);
    // Playing is a descendant of Ready: Ready does not exit
    assert_eq!(f.agent.exit_count(AgentState::Ready), ready_exits);
    assert_eq!(f.agent.entry_count(AgentState::Processing), 1);
    assert_eq!(f.agent.entry_count(AgentState::Playing), 1);
    // Processing's initial child is not entered when targeting Playing
    assert_eq!(f.agent.entry_count(AgentState::Paused), 0);

    let changes = keyed(&drain(&mut f.status), "StateChange")
        .iter()
        .map(|(_, v, ..)| v.clone())
        .collect::<Vec<_>>();
    assert_eq!(changes, vec![Value::Str("Playing".to_string())]);
}

#[test]
fn pause_stop_reset_walk_the_tree() {
    let mut f = fixture(0);
    f.agent.on_start().unwrap();

    f.agent.dispatch_named(sym::PLAY);
    f.agent.dispatch_named(sym::PAUSE);
    assert_eq!(f.agent.state(), AgentState::Paused);

    f.agent.dispatch_named(sym::PLAY);
    assert_eq!(f.agent.state(), AgentState::Playing);

    f.agent.dispatch_named(sym::STOP);
    assert_eq!(f.agent.state(), AgentState::Stopped);

    // Pause is also accepted from Stopped
    f.agent.dispatch_named(sym::PAUSE);
    assert_eq!(f.agent.state(), AgentState::Paused);

    // Reset re-enters Ready and lands on its initial child
    let ready_entries = f.agent.entry_count(AgentState::Ready);
    f.agent.dispatch_named(sym::RESET);
    assert_eq!(f.agent.state(), AgentState::Stopped);
    assert_eq!(f.agent.entry_count(AgentState::Ready), ready_entries + 1);
}

#[test]
fn heartbeat_fires_on_schedule_and_reports_the_leaf() {
    let mut f = fixture_with(|cfg| cfg.heartbeat_period_ns = 1_000_000);
    f.agent.on_start().unwrap();

    // t=0 heartbeat, then every 1 ms while cycling at 0.5 ms
    f.agent.do_work();
    run_cycles(&mut f.agent, 4, 500_000);

    let status = drain(&mut f.status);
    let beats = keyed(&status, "Heartbeat");
    assert_eq!(beats.len(), 3);
    assert_eq!(beats[0].2, 0);
    assert_eq!(beats[1].2, 1_000_000);
    assert_eq!(beats[2].2, 2_000_000);
    for beat in beats {
        assert_eq!(beat.1, Value::Str("Stopped".to_string()));
    }
}

#[test]
fn state_request_echoes_leaf_and_correlation_id() {
    let mut f = fixture(0);
    f.agent.on_start().unwrap();
    drain(&mut f.status);

    send(
        &mut f.transport,
        "mem:control",
        1,
        "State",
        Value::Nothing,
        0,
        77,
    );
    run_cycles(&mut f.agent, 1, 0);

    let status = drain(&mut f.status);
    let states = keyed(&status, "State");
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].1, Value::Str("Stopped".to_string()));
    assert_eq!(states[0].3, 77);
}

#[test]
fn property_write_read_and_echo_via_control_stream() {
    let mut f = fixture(0);
    f.agent
        .define_property("Gain", Value::Float(1.0), Access::READ_WRITE)
        .unwrap();
    f.agent.on_start().unwrap();
    drain(&mut f.status);

    send(
        &mut f.transport,
        "mem:control",
        1,
        "Gain",
        Value::Float(2.5),
        0,
        11,
    );
    run_cycles(&mut f.agent, 1, 0);

    let key = f.agent.intern("Gain");
    assert_eq!(*f.agent.property(key).unwrap(), Value::Float(2.5));
    let echo = drain(&mut f.status);
    let gains = keyed(&echo, "Gain");
    assert_eq!(gains.len(), 1);
    assert_eq!(gains[0].1, Value::Float(2.5));
    assert_eq!(gains[0].3, 11);

    // read request: no value in the message
    send(
        &mut f.transport,
        "mem:control",
        1,
        "Gain",
        Value::Nothing,
        0,
        12,
    );
    run_cycles(&mut f.agent, 1, 0);
    let reads = drain(&mut f.status);
    let gains = keyed(&reads, "Gain");
    assert_eq!(gains.len(), 1);
    assert_eq!(gains[0].1, Value::Float(2.5));
    assert_eq!(gains[0].3, 12);
}

#[test]
fn rejected_write_becomes_an_error_response() {
    let mut f = fixture(0);
    f.agent
        .define_property("Gain", Value::Float(1.0), Access::READ_WRITE)
        .unwrap();
    f.agent.on_start().unwrap();
    drain(&mut f.status);

    // wrong type: Int into a Float slot
    send(
        &mut f.transport,
        "mem:control",
        1,
        "Gain",
        Value::Int(3),
        0,
        21,
    );
    run_cycles(&mut f.agent, 1, 0);

    let key = f.agent.intern("Gain");
    assert_eq!(*f.agent.property(key).unwrap(), Value::Float(1.0));

    let status = drain(&mut f.status);
    let errors = keyed(&status, "Error");
    assert_eq!(errors.len(), 1);
    match &errors[0].1 {
        Value::Str(text) => assert!(text.contains("Gain"), "{text}"),
        other => panic!("unexpected error payload: {other:?}"),
    }
}

#[test]
fn properties_request_publishes_every_readable_key() {
    let mut f = fixture(0);
    f.agent
        .define_property("Gain", Value::Float(1.0), Access::READ_WRITE)
        .unwrap();
    f.agent
        .define_property("Hidden", Value::Int(0), Access::WRITABLE)
        .unwrap();
    f.agent.on_start().unwrap();
    drain(&mut f.status);

    send(
        &mut f.transport,
        "mem:control",
        1,
        "Properties",
        Value::Nothing,
        0,
        31,
    );
    run_cycles(&mut f.agent, 1, 0);

    let status = drain(&mut f.status);
    assert_eq!(keyed(&status, "LogLevel").len(), 1);
    assert_eq!(keyed(&status, "Gain").len(), 1);
    assert!(keyed(&status, "Hidden").is_empty());
}

#[test]
fn stale_inbound_message_dispatches_as_late_message() {
    let mut f = fixture_with(|cfg| cfg.late_message_threshold_ns = Some(1_000));
    f.agent.on_start().unwrap();
    run_cycles(&mut f.agent, 1, 10_000); // clock at 10 µs
    drain(&mut f.status);

    // a Play command stamped at t=0 is long stale
    send(
        &mut f.transport,
        "mem:control",
        1,
        "Play",
        Value::Nothing,
        0,
        41,
    );
    run_cycles(&mut f.agent, 1, 0);

    assert_eq!(f.agent.state(), AgentState::Stopped);
    let status = drain(&mut f.status);
    let late = keyed(&status, "LateMessage");
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].1, Value::Nothing);
    assert_eq!(late[0].3, 41);
}

#[test]
fn control_filter_drops_mismatched_tags() {
    let mut f = fixture_with(|cfg| cfg.control_filter = Some("mine".to_string()));
    f.agent.on_start().unwrap();

    // the helper sends with an empty tag, which the filter rejects
    send(
        &mut f.transport,
        "mem:control",
        1,
        "Play",
        Value::Nothing,
        0,
        0,
    );
    run_cycles(&mut f.agent, 1, 0);
    assert_eq!(f.agent.state(), AgentState::Stopped);
    assert_eq!(f.agent.messages_processed(), 0);
}

#[test]
fn exit_event_terminates_and_close_cleans_up() {
    let mut f = fixture(0);
    f.agent.on_start().unwrap();
    assert!(f.agent.timer_count() > 0);

    f.agent.dispatch_named(sym::EXIT);
    assert_eq!(f.agent.state(), AgentState::Exit);
    assert!(f.agent.is_terminating());

    f.agent.on_close();
    assert_eq!(f.agent.timer_count(), 0);
    assert_eq!(f.agent.poller_count(), 0);
    assert!(f.agent.counter_dir().is_closed());
}

#[test]
fn cancel_by_event_name_spares_other_timers() {
    let mut f = fixture(0);
    f.agent.on_start().unwrap();

    let tick_a = f.agent.intern("TickA");
    let tick_b = f.agent.intern("TickB");
    f.agent.schedule(1_000, tick_a).unwrap();
    f.agent.schedule(2_000, tick_a).unwrap();
    f.agent.schedule(3_000, tick_b).unwrap();

    let before = f.agent.timer_count();
    assert_eq!(f.agent.cancel_timer_event(tick_a), 2);
    assert_eq!(f.agent.timer_count(), before - 2);
    assert_eq!(f.agent.cancel_timer_event(tick_a), 0);
}

#[test]
fn unknown_event_is_unhandled() {
    let mut f = fixture(0);
    f.agent.on_start().unwrap();
    let mystery = f.agent.intern("Mystery");
    assert!(!f.agent.dispatch_named(mystery));
    assert_eq!(f.agent.state(), AgentState::Stopped);
}
