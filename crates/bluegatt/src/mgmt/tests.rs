//! Unit tests for management framing and command correlation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::constants::*;
use super::testing::{Behavior, ScriptedChannel};
use super::*;
use crate::error::Error;

#[test]
fn test_frame_encode_layout() {
    let frame = ControlFrame::new(MGMT_OP_SET_POWERED, 0, vec![0x01]);
    let bytes = frame.encode();
    assert_eq!(bytes, vec![0x05, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]);
}

#[test]
fn test_frame_parse_round_trip() {
    let frame = ControlFrame::new(MGMT_EV_CMD_COMPLETE, 0xFFFF, vec![1, 2, 3, 4]);
    let parsed = ControlFrame::parse(&frame.encode()).unwrap();
    assert_eq!(parsed, frame);
}

#[test]
fn test_frame_parse_fails_closed() {
    // Short header
    assert!(matches!(
        ControlFrame::parse(&[0x01, 0x00, 0x00]),
        Err(Error::Protocol(_))
    ));
    // Length field disagrees with payload
    let mut bytes = ControlFrame::new(0x0001, 0, vec![9, 9]).encode();
    bytes.truncate(bytes.len() - 1);
    assert!(matches!(ControlFrame::parse(&bytes), Err(Error::Protocol(_))));
}

#[test]
fn test_set_local_name_layout() {
    let cmd = MgmtCommand::SetLocalName {
        name: "Dosell".into(),
        short_name: "Dosell".into(),
    };
    let frame = cmd.to_frame(0);
    assert_eq!(frame.opcode, MGMT_OP_SET_LOCAL_NAME);
    assert_eq!(
        frame.payload.len(),
        MGMT_MAX_NAME_LEN + MGMT_MAX_SHORT_NAME_LEN
    );
    assert_eq!(&frame.payload[..6], b"Dosell");
    assert_eq!(frame.payload[6], 0);
    assert_eq!(
        &frame.payload[MGMT_MAX_NAME_LEN..MGMT_MAX_NAME_LEN + 6],
        b"Dosell"
    );
}

#[test]
fn test_discoverable_payload() {
    let cmd = MgmtCommand::SetDiscoverable {
        mode: DiscoverableMode::General,
        timeout: 0x1234,
    };
    assert_eq!(cmd.to_frame(2).payload, vec![0x01, 0x34, 0x12]);
}

#[test]
fn test_event_parse_command_complete() {
    let mut payload = MGMT_OP_SET_POWERED.to_le_bytes().to_vec();
    payload.push(MGMT_STATUS_SUCCESS);
    payload.extend_from_slice(&[0xAA, 0xBB]);
    let frame = ControlFrame::new(MGMT_EV_CMD_COMPLETE, 0, payload);

    match MgmtEvent::parse(&frame).unwrap() {
        MgmtEvent::CommandComplete {
            opcode,
            status,
            params,
        } => {
            assert_eq!(opcode, MGMT_OP_SET_POWERED);
            assert!(status.is_success());
            assert_eq!(params, vec![0xAA, 0xBB]);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_event_parse_short_payload_fails_closed() {
    let frame = ControlFrame::new(MGMT_EV_CMD_COMPLETE, 0, vec![0x05]);
    assert!(matches!(MgmtEvent::parse(&frame), Err(Error::Protocol(_))));

    let frame = ControlFrame::new(MGMT_EV_DEVICE_CONNECTED, 0, vec![1, 2, 3]);
    assert!(matches!(MgmtEvent::parse(&frame), Err(Error::Protocol(_))));
}

#[test]
fn test_unknown_event_passes_through() {
    let frame = ControlFrame::new(0x7FFF, 0, vec![1]);
    assert!(matches!(
        MgmtEvent::parse(&frame).unwrap(),
        MgmtEvent::Unknown { event: 0x7FFF, .. }
    ));
}

#[test]
fn test_run_command_success() {
    let mut adapter = MgmtAdapter::new(ScriptedChannel::new());
    let params = adapter
        .run_command(
            &MgmtCommand::SetPowered { on: true },
            0,
            Duration::from_millis(100),
        )
        .unwrap();
    assert!(params.is_empty());
    assert_eq!(adapter.pending_count(), 0);
    assert_eq!(
        adapter.channel_mut().sent_opcodes(),
        vec![MGMT_OP_SET_POWERED]
    );
}

#[test]
fn test_run_command_failure_status() {
    let mut channel = ScriptedChannel::new();
    channel.set_behavior(MGMT_OP_SET_LE, Behavior::Fail(MGMT_STATUS_NOT_SUPPORTED));
    let mut adapter = MgmtAdapter::new(channel);

    let result = adapter.run_command(
        &MgmtCommand::SetLowEnergy { on: true },
        0,
        Duration::from_millis(100),
    );
    assert!(matches!(
        result,
        Err(Error::CommandFailed {
            opcode: MGMT_OP_SET_LE,
            status: MGMT_STATUS_NOT_SUPPORTED,
        })
    ));
}

#[test]
fn test_run_command_timeout() {
    let mut channel = ScriptedChannel::new();
    channel.set_behavior(MGMT_OP_SET_POWERED, Behavior::Silent);
    let mut adapter = MgmtAdapter::new(channel);

    let result = adapter.run_command(
        &MgmtCommand::SetPowered { on: true },
        0,
        Duration::from_millis(5),
    );
    assert!(matches!(
        result,
        Err(Error::Timeout {
            opcode: MGMT_OP_SET_POWERED,
            index: 0,
        })
    ));
    assert_eq!(adapter.pending_count(), 0);
}

#[test]
fn test_duplicate_pending_key_rejected() {
    let mut channel = ScriptedChannel::new();
    channel.set_behavior(MGMT_OP_SET_POWERED, Behavior::Silent);
    let mut adapter = MgmtAdapter::new(channel);

    adapter
        .issue_command(
            &MgmtCommand::SetPowered { on: false },
            0,
            Duration::from_secs(1),
            Box::new(|_| {}),
        )
        .unwrap();

    // Power-on before power-off completes on the same controller: refused,
    // first command untouched
    let second = adapter.issue_command(
        &MgmtCommand::SetPowered { on: true },
        0,
        Duration::from_secs(1),
        Box::new(|_| {}),
    );
    assert!(matches!(second, Err(Error::Protocol(_))));
    assert_eq!(adapter.pending_count(), 1);

    // A different controller index is a different key
    adapter
        .issue_command(
            &MgmtCommand::SetPowered { on: true },
            1,
            Duration::from_secs(1),
            Box::new(|_| {}),
        )
        .unwrap();
    assert_eq!(adapter.pending_count(), 2);
}

#[test]
fn test_unsolicited_events_reach_listeners() {
    let mut channel = ScriptedChannel::new();
    channel.push_frame(ControlFrame::new(
        MGMT_EV_DEVICE_CONNECTED,
        0,
        vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x01],
    ));
    let mut adapter = MgmtAdapter::new(channel);

    let seen = Arc::new(AtomicBool::new(false));
    let flag = seen.clone();
    adapter.add_event_listener(Box::new(move |index, event| {
        assert_eq!(index, 0);
        if let MgmtEvent::DeviceConnected { address, .. } = event {
            assert_eq!(address, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
            flag.store(true, Ordering::SeqCst);
        }
    }));

    adapter.pump(Duration::from_millis(1)).unwrap();
    assert!(seen.load(Ordering::SeqCst));
}

#[test]
fn test_completion_callback_receives_params() {
    let mut channel = ScriptedChannel::new();
    channel.set_behavior(MGMT_OP_SET_CONNECTABLE, Behavior::Silent);
    let mut adapter = MgmtAdapter::new(channel);

    let outcome: Arc<Mutex<Option<CommandOutcome>>> = Arc::new(Mutex::new(None));
    let slot = outcome.clone();
    adapter
        .issue_command(
            &MgmtCommand::SetConnectable { on: true },
            0,
            Duration::from_secs(1),
            Box::new(move |o| *slot.lock().unwrap() = Some(o)),
        )
        .unwrap();

    // Hand-deliver the completion with return parameters
    let mut payload = MGMT_OP_SET_CONNECTABLE.to_le_bytes().to_vec();
    payload.push(MGMT_STATUS_SUCCESS);
    payload.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
    adapter
        .channel_mut()
        .push_frame(ControlFrame::new(MGMT_EV_CMD_COMPLETE, 0, payload));
    adapter.pump(Duration::from_millis(1)).unwrap();

    let taken = outcome.lock().unwrap().take();
    match taken {
        Some(CommandOutcome::Complete { status, params }) => {
            assert!(status.is_success());
            assert_eq!(params, vec![0x02, 0x00, 0x00, 0x00]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_success_command_status_keeps_the_command_pending() {
    let mut channel = ScriptedChannel::new();
    channel.set_behavior(MGMT_OP_SET_POWERED, Behavior::Silent);
    let mut adapter = MgmtAdapter::new(channel);

    let outcome: Arc<Mutex<Option<CommandOutcome>>> = Arc::new(Mutex::new(None));
    let slot = outcome.clone();
    adapter
        .issue_command(
            &MgmtCommand::SetPowered { on: true },
            0,
            Duration::from_secs(1),
            Box::new(move |o| *slot.lock().unwrap() = Some(o)),
        )
        .unwrap();

    // A success command-status only acknowledges receipt; command-complete
    // is still on its way
    let mut payload = MGMT_OP_SET_POWERED.to_le_bytes().to_vec();
    payload.push(MGMT_STATUS_SUCCESS);
    adapter
        .channel_mut()
        .push_frame(ControlFrame::new(MGMT_EV_CMD_STATUS, 0, payload.clone()));
    adapter.pump(Duration::from_millis(1)).unwrap();
    assert_eq!(adapter.pending_count(), 1);
    assert!(outcome.lock().unwrap().is_none());

    // A failure command-status is terminal
    payload[2] = MGMT_STATUS_NOT_POWERED;
    adapter
        .channel_mut()
        .push_frame(ControlFrame::new(MGMT_EV_CMD_STATUS, 0, payload));
    adapter.pump(Duration::from_millis(1)).unwrap();
    assert_eq!(adapter.pending_count(), 0);

    let taken = outcome.lock().unwrap().take();
    match taken {
        Some(CommandOutcome::Complete { status, .. }) => assert!(!status.is_success()),
        other => panic!("unexpected outcome {:?}", other),
    }
}
