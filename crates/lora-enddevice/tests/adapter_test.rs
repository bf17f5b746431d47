//! Uplink and downlink payload handling per radio dialect.

mod common;

use common::{device_with, later, mdot_accepting, now, rn2903_accepting};
use lora_enddevice::protocol::ProtocolError;
use lora_enddevice::{Credentials, DriverError, Message, NetworkError, RadioType};

fn credentials() -> Credentials {
    Credentials::new("70B3D57ED0000001", "2B7E151628AED2A6ABF7158809CF4F3C")
}

#[tokio::test(start_paused = true)]
async fn test_mdot_text_uplink_and_downlink() {
    let mut accept = mdot_accepting("1");
    let (device, sim) = device_with(RadioType::Mdot, move |line: &str| match line {
        "AT+SEND=hello" => vec![later(2, "world"), now("OK")],
        other => accept(other),
    });
    device.network_start(credentials()).await.unwrap();
    device.network().stop_polling();

    let downlinks = device
        .network_send_message(&Message::new("hello"))
        .await
        .unwrap();
    assert_eq!(downlinks, vec!["world"]);
    assert_eq!(device.network().decode_downlink(&downlinks[0]).unwrap(), b"world");
    assert_eq!(sim.count("AT+SEND=hello"), 1);
    assert_eq!(device.network().messages_sent(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mdot_send_error_is_rejection() {
    let mut accept = mdot_accepting("1");
    let (device, _sim) = device_with(RadioType::Mdot, move |line: &str| match line {
        l if l.starts_with("AT+SEND=") => vec![now("Send Error - No free channel"), now("ERROR")],
        other => accept(other),
    });
    device.network_start(credentials()).await.unwrap();
    device.network().stop_polling();

    let err = device
        .network_send_message(&Message::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        NetworkError::SendRejected("Send Error - No free channel".to_string())
    );
    assert_eq!(device.network().messages_sent(), 0);
    assert!(device.network().is_joined());
}

#[tokio::test(start_paused = true)]
async fn test_mdot_control_bytes_are_not_written() {
    let (device, sim) = device_with(RadioType::Mdot, mdot_accepting("1"));
    device.network_start(credentials()).await.unwrap();
    device.network().stop_polling();

    let err = device
        .network_send_message(&Message::new(&b"hi\r\nAT+FRESET"[..]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Driver(DriverError::Protocol(ProtocolError::UnencodablePayload(_)))
    ));
    assert_eq!(sim.count("AT+SEND="), 0);
    assert_eq!(sim.count("AT+FRESET"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rn2903_hex_uplink_and_downlink() {
    let mut accept = rn2903_accepting("00000001");
    let (device, sim) = device_with(RadioType::Rn2903, move |line: &str| match line {
        "mac tx cnf 7 68656c6c6f" => vec![now("ok"), later(2, "mac_rx 2 776f726c64")],
        other => accept(other),
    });
    device.network_start(credentials()).await.unwrap();
    device.network().stop_polling();

    let message = Message::new("hello").confirmed().on_port(7);
    let downlinks = device.network_send_message(&message).await.unwrap();
    assert_eq!(downlinks, vec!["776f726c64"]);
    assert_eq!(device.network().decode_downlink(&downlinks[0]).unwrap(), b"world");
    assert_eq!(sim.count("mac tx cnf 7 68656c6c6f"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rn2903_uplink_without_downlink() {
    let (device, _sim) = device_with(RadioType::Rn2903, rn2903_accepting("00000001"));
    device.network_start(credentials()).await.unwrap();
    device.network().stop_polling();

    let downlinks = device
        .network_send_message(&Message::new(vec![0x00, 0xff]))
        .await
        .unwrap();
    assert!(downlinks.is_empty());
    assert_eq!(device.network().messages_sent(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rn2903_tx_error_is_rejection() {
    let mut accept = rn2903_accepting("00000001");
    let (device, _sim) = device_with(RadioType::Rn2903, move |line: &str| match line {
        l if l.starts_with("mac tx ") => vec![now("ok"), later(1, "mac_err")],
        other => accept(other),
    });
    device.network_start(credentials()).await.unwrap();
    device.network().stop_polling();

    let err = device
        .network_send_message(&Message::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::SendRejected("mac_err".to_string()));
}
