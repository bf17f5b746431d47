//! Join, rejoin and send behaviour of a full device against simulated radios.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{device_with, later, mdot_accepting, now, rn2903_accepting, settle};
use lora_enddevice::protocol::JoinOutcome;
use lora_enddevice::{Credentials, Message, NetworkError, NetworkState, RadioType, StateError};

fn credentials() -> Credentials {
    Credentials::new("70B3D57ED0000001", "2B7E151628AED2A6ABF7158809CF4F3C")
}

#[tokio::test(start_paused = true)]
async fn test_rn2903_join_accepted() {
    let (device, sim) = device_with(RadioType::Rn2903, rn2903_accepting("00000001"));

    let outcome = device.network_start(credentials()).await.unwrap();
    assert_eq!(outcome, JoinOutcome::Joined);
    assert_eq!(device.state(), NetworkState::Joined);
    assert_eq!(device.network().next_poll_delay(), Some(Duration::ZERO));

    assert_eq!(
        sim.writes(),
        vec![
            "sys get hweui",
            "mac set appeui 70B3D57ED0000001",
            "mac set appkey 2B7E151628AED2A6ABF7158809CF4F3C",
            "mac join otaa",
        ]
    );
    let identity = device.identity().unwrap();
    assert_eq!(identity.eui, "0004A30B001A2B3C");
    assert_eq!(identity.short, "2B3C");

    // The immediate poll finds the module joined and backs off.
    settle(2).await;
    assert_eq!(sim.count("mac get status"), 1);
    assert_eq!(device.network().next_poll_delay(), Some(Duration::from_secs(90)));
    assert!(device.network().is_joined());
}

#[tokio::test(start_paused = true)]
async fn test_mdot_join_accepted() {
    let (device, sim) = device_with(RadioType::Mdot, mdot_accepting("1"));

    let outcome = device.network_start(credentials()).await.unwrap();
    assert!(outcome.is_joined());
    assert_eq!(
        sim.writes(),
        vec![
            "AT+DI?",
            "AT+NI=1,70B3D57ED0000001",
            "AT+NK=1,2B7E151628AED2A6ABF7158809CF4F3C",
            "AT+JOIN",
        ]
    );
    assert_eq!(device.identity().unwrap().short, "12-34");
}

#[tokio::test(start_paused = true)]
async fn test_mdot_join_error() {
    let (device, _sim) = device_with(RadioType::Mdot, |line: &str| match line {
        "AT+JOIN" => vec![later(3, "Failed to join network"), now("ERROR")],
        _ => vec![now("OK")],
    });

    let outcome = device.network_start(credentials()).await.unwrap();
    assert_eq!(outcome.reason(), Some("Failed to join network"));
    assert_eq!(device.state(), NetworkState::Unjoined);
    assert_eq!(device.network().next_poll_delay(), Some(Duration::from_secs(60)));
}

#[tokio::test(start_paused = true)]
async fn test_rn2903_join_refusal_reason() {
    let (device, _sim) = device_with(RadioType::Rn2903, |line: &str| match line {
        l if l.starts_with("mac join") => vec![now("ok"), later(5, "denied")],
        _ => vec![now("ok")],
    });

    let outcome = device.network_start(credentials()).await.unwrap();
    assert_eq!(outcome.reason(), Some("denied"));
    assert!(!device.network().is_joined());
}

#[tokio::test(start_paused = true)]
async fn test_never_joined_retries_every_degraded_interval() {
    let (device, sim) = device_with(RadioType::Rn2903, |line: &str| match line {
        "mac get status" => vec![now("00000000")],
        l if l.starts_with("mac join") => vec![now("ok"), now("denied")],
        _ => vec![now("ok")],
    });

    device.network_start(credentials()).await.unwrap();
    settle(300).await;

    let joins = sim.times_of("mac join");
    assert!(joins.len() >= 4, "expected repeated joins, got {}", joins.len());
    for pair in joins.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(60));
    }

    // Every rejoin follows a status poll, and no two joins interleave.
    let writes = sim.writes();
    let significant: Vec<_> = writes
        .iter()
        .filter(|l| l.starts_with("mac join") || l.starts_with("mac get status"))
        .collect();
    for pair in significant.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    assert!(!device.network().is_joined());
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_after_drop_polls_immediately() {
    let joined = Arc::new(AtomicBool::new(true));
    let status = joined.clone();
    let (device, sim) = device_with(RadioType::Rn2903, move |line: &str| match line {
        "mac get status" if status.load(Ordering::SeqCst) => vec![now("00000001")],
        "mac get status" => vec![now("00000000")],
        l if l.starts_with("mac join") => {
            status.store(true, Ordering::SeqCst);
            vec![now("ok"), later(1, "accepted")]
        }
        _ => vec![now("ok")],
    });

    device.network_start(credentials()).await.unwrap();
    settle(2).await;
    assert_eq!(device.network().next_poll_delay(), Some(Duration::from_secs(90)));

    // Module drops off the network; the next poll rejoins.
    joined.store(false, Ordering::SeqCst);
    settle(95).await;
    assert_eq!(sim.count("mac join"), 2);
    assert!(device.network().is_joined());
    assert_eq!(device.network().next_poll_delay(), Some(Duration::from_secs(90)));
}

#[tokio::test(start_paused = true)]
async fn test_send_while_unjoined_touches_nothing() {
    let (device, sim) = device_with(RadioType::Rn2903, rn2903_accepting("00000001"));
    settle(1).await;
    let before = sim.writes().len();

    let err = device
        .network_send_message(&Message::new("hi"))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::State(StateError::NotJoined));
    settle(1).await;
    assert_eq!(sim.writes().len(), before);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_send_is_refused() {
    let (device, sim) = device_with(RadioType::Rn2903, rn2903_accepting("00000001"));
    let device = Arc::new(device);
    device.network_start(credentials()).await.unwrap();
    device.network().stop_polling();

    let first = {
        let device = device.clone();
        tokio::spawn(async move { device.network_send_message(&Message::new("one")).await })
    };
    settle(1).await;
    assert_eq!(device.state(), NetworkState::SendingMessage);

    let err = device
        .network_send_message(&Message::new("two"))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::State(StateError::SendInProgress));

    first.await.unwrap().unwrap();
    assert_eq!(sim.count("mac tx"), 1);
    assert_eq!(device.network().messages_sent(), 1);
    assert_eq!(device.state(), NetworkState::Joined);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_during_join_is_refused() {
    let (device, _sim) = device_with(RadioType::Rn2903, rn2903_accepting("00000001"));
    let device = Arc::new(device);

    let first = {
        let device = device.clone();
        tokio::spawn(async move { device.network_start(credentials()).await })
    };
    settle(1).await;
    assert_eq!(device.state(), NetworkState::Joining);

    let err = device.network_start(credentials()).await.unwrap_err();
    assert_eq!(err, NetworkError::State(StateError::JoinInProgress));
    assert!(first.await.unwrap().unwrap().is_joined());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_fails_pending_commands() {
    let (mut device, _sim) = device_with(RadioType::Mdot, |_: &str| vec![]);
    let queue = device.queue().clone();

    device.shutdown();
    let err = queue
        .enqueue("AT", "AT", lora_enddevice::protocol::mdot::ANY_RESPONSE)
        .await
        .unwrap_err();
    assert_eq!(err, lora_enddevice::DriverError::QueueClosed);
}
