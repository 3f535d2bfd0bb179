//! USSD sessions against a scripted modem

mod common;

use common::{connect, reply, responder};
use gsm_modem::GsmError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_response_arrives_as_notification() {
    let (modem, device) = connect(responder(|cmd| match cmd {
        r#"AT+CUSD=1,"*101#",15"# => Some(reply(&["OK"]) + &reply(&[r#"+CUSD: 1,"1. Balance 2. Data",15"#])),
        r#"AT+CUSD=1,"1",15"# => Some(reply(&["OK"]) + &reply(&[r#"+CUSD: 0,"Balance: R12.50",15"#])),
        _ => None,
    }))
    .await;

    let menu = modem.send_ussd("*101#", None).await.unwrap();
    assert!(menu.session_active);
    assert_eq!(menu.message, "1. Balance 2. Data");

    let balance = menu.reply("1").await.unwrap();
    assert!(!balance.session_active);
    assert_eq!(balance.message, "Balance: R12.50");
    assert!(device.received(r#"AT+CUSD=1,"1",15"#));

    let err = balance.reply("2").await.unwrap_err();
    assert!(matches!(err, GsmError::InvalidState(_)));
    assert_eq!(modem.metrics().counter_value("ussd_sessions"), Some(2));
}

#[tokio::test]
async fn test_response_inside_command_reply() {
    let (modem, _device) = connect(responder(|cmd| {
        cmd.starts_with("AT+CUSD=1")
            .then(|| reply(&[r#"+CUSD: 0,"Your number is 0820001234",15"#, "OK"]))
    }))
    .await;

    let ussd = modem.send_ussd("*120#", None).await.unwrap();
    assert!(!ussd.session_active);
    assert_eq!(ussd.message, "Your number is 0820001234");
}

#[tokio::test]
async fn test_multiline_response() {
    let (modem, _device) = connect(responder(|cmd| {
        cmd.starts_with("AT+CUSD=1")
            .then(|| reply(&["OK"]) + &reply(&[r#"+CUSD: 0,"Bal:$100.00 *"#, r#"Exp 01 Jan 2013",15"#]))
    }))
    .await;

    let ussd = modem.send_ussd("*100#", None).await.unwrap();
    assert_eq!(ussd.message, "Bal:$100.00 *\r\nExp 01 Jan 2013");
}

#[tokio::test]
async fn test_release_notification_is_skipped() {
    let (modem, _device) = connect(responder(|cmd| {
        cmd.starts_with("AT+CUSD=1").then(|| {
            reply(&["OK"])
                + &reply(&[
                    r#"+CUSD: 2,"Initiating Release",15"#,
                    r#"+CUSD: 0,"Airtime: R3.00",15"#,
                ])
        })
    }))
    .await;

    let ussd = modem.send_ussd("*141#", None).await.unwrap();
    assert_eq!(ussd.message, "Airtime: R3.00");
}

#[tokio::test]
async fn test_response_timeout() {
    let (modem, _device) = connect(responder(|_| None)).await;
    let before = modem.metrics().counter_value("timeouts").unwrap_or(0);

    let err = modem
        .send_ussd("*101#", Some(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(modem.metrics().counter_value("timeouts"), Some(before + 1));
}

#[tokio::test]
async fn test_command_error_propagates() {
    let (modem, _device) = connect(responder(|cmd| {
        cmd.starts_with("AT+CUSD=1").then(|| reply(&["+CME ERROR: 30"]))
    }))
    .await;

    let err = modem.send_ussd("*101#", None).await.unwrap_err();
    assert_eq!(err.as_command_error().and_then(|e| e.code()), Some(30));
}

#[tokio::test]
async fn test_cancel_session() {
    let (modem, device) = connect(responder(|cmd| {
        cmd.starts_with("AT+CUSD=1")
            .then(|| reply(&[r#"+CUSD: 1,"Enter PIN",15"#, "OK"]))
    }))
    .await;

    let mut ussd = modem.send_ussd("*130#", None).await.unwrap();
    assert!(ussd.session_active);

    ussd.cancel().await.unwrap();
    assert!(!ussd.session_active);
    assert!(device.received("AT+CUSD=2"));

    device.clear();
    ussd.cancel().await.unwrap();
    assert!(device.commands().is_empty());
}

#[tokio::test]
async fn test_huawei_retries_in_text_mode() {
    let text_mode = Arc::new(AtomicBool::new(false));
    let (modem, device) = connect(responder(move |cmd| match cmd {
        "AT+CLAC" => Some(reply(&["+CLAC:+CLIP,+CRC,^DTMF,+CUSD", "OK"])),
        "AT^USSDMODE=0" => {
            text_mode.store(true, Ordering::SeqCst);
            Some(reply(&["OK"]))
        }
        cmd if cmd.starts_with("AT+CUSD=1") => Some(if text_mode.load(Ordering::SeqCst) {
            reply(&[r#"+CUSD: 0,"Balance: R1.00",15"#, "OK"])
        } else {
            reply(&["+CME ERROR: 100"])
        }),
        _ => None,
    }))
    .await;

    let ussd = modem.send_ussd("*101#", None).await.unwrap();
    assert_eq!(ussd.message, "Balance: R1.00");
    let commands = device.commands();
    assert_eq!(
        commands,
        vec![r#"AT+CUSD=1,"*101#",15"#, "AT^USSDMODE=0", r#"AT+CUSD=1,"*101#",15"#]
    );
}
