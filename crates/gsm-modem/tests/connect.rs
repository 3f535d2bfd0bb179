//! Connect, device profile detection and basic queries against a scripted modem

mod common;

use common::{connect, connect_with, reply, responder, spawn_device, test_config};
use gsm_modem::{CallStatusStyle, CommandError, GsmError, GsmModem, NoopHandler};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_connect_generic_modem() {
    let (stream, device) = spawn_device(responder(|_| None));
    let modem = GsmModem::new(test_config());
    modem.connect_stream(stream).await.unwrap();

    assert!(modem.is_connected());
    assert_eq!(modem.call_status_style(), CallStatusStyle::Polling);
    assert!(!modem.dtmf_supported());
    assert!(modem.sms_read_supported());
    assert!(!modem.sms_text_mode());
    assert!(modem.calling_line_identification());
    assert!(modem.extended_incoming_call_indication());

    let commands = device.commands();
    let position = |cmd: &str| commands.iter().position(|c| c == cmd);
    assert_eq!(commands.first().map(String::as_str), Some("ATZ"));
    assert!(position("ATE0") < position("AT+CMEE=1"));
    assert!(position("AT+CPIN?") < position("AT+CLAC"));
    assert!(device.received("AT+CMGF=0"));
    assert!(device.received(r#"AT+CPMS="ME","ME","ME""#));
    assert!(device.received("AT+CNMI=2,1,0,2"));
    assert!(device.received("AT+CLIP=1"));
    assert!(device.received("AT+CRC=1"));
    assert_eq!(commands.last().map(String::as_str), Some("AT+CVHU=0"));

    modem.close().await;
    assert!(!modem.is_connected());
}

#[tokio::test]
async fn test_connect_enters_pin() {
    let unlocked = Arc::new(AtomicBool::new(false));
    let state = Arc::clone(&unlocked);
    let (stream, device) = spawn_device(responder(move |cmd| match cmd {
        "AT+CPIN?" if !state.load(Ordering::SeqCst) => Some(reply(&["+CPIN: SIM PIN", "OK"])),
        "AT+CPIN=\"1234\"" => {
            state.store(true, Ordering::SeqCst);
            Some(reply(&["OK"]))
        }
        _ => None,
    }));

    let mut config = test_config();
    config.pin = Some("1234".to_string());
    let modem = GsmModem::new(config);
    modem.connect_stream(stream).await.unwrap();

    assert!(unlocked.load(Ordering::SeqCst));
    assert!(device.received("AT+CPIN=\"1234\""));
}

#[tokio::test]
async fn test_connect_without_pin_fails() {
    let (stream, _device) = spawn_device(responder(|cmd| match cmd {
        "AT+CPIN?" => Some(reply(&["+CPIN: SIM PIN", "OK"])),
        _ => None,
    }));
    let modem = GsmModem::new(test_config());
    let err = modem.connect_stream(stream).await.unwrap_err();

    assert!(matches!(err, GsmError::Command(CommandError::PinRequired { .. })));
    assert!(!modem.is_connected());
}

#[tokio::test]
async fn test_connect_with_puk_locked_sim_fails() {
    let (stream, _device) = spawn_device(responder(|cmd| match cmd {
        "AT+CPIN?" => Some(reply(&["+CPIN: SIM PUK", "OK"])),
        _ => None,
    }));
    let modem = GsmModem::new(test_config());
    let err = modem.connect_stream(stream).await.unwrap_err();
    assert!(matches!(err, GsmError::Command(CommandError::PukRequired { .. })));
}

#[tokio::test]
async fn test_detects_huawei_profile() {
    let (stream, device) = spawn_device(responder(|cmd| match cmd {
        "AT+CLAC" => Some(reply(&["+CLAC:+CLIP,+CRC,^DTMF,^USSDMODE,+CUSD", "OK"])),
        _ => None,
    }));
    let modem = GsmModem::new(test_config());
    modem.connect_stream(stream).await.unwrap();

    assert_eq!(modem.call_status_style(), CallStatusStyle::Huawei);
    assert!(modem.dtmf_supported());
    assert!(device.received("AT^USSDMODE=0"));
}

#[tokio::test]
async fn test_detects_huawei_by_manufacturer() {
    let (stream, _device) = spawn_device(responder(|cmd| match cmd {
        "AT+CGMI" => Some(reply(&["huawei", "OK"])),
        _ => None,
    }));
    let modem = GsmModem::new(test_config());
    modem.connect_stream(stream).await.unwrap();

    assert_eq!(modem.call_status_style(), CallStatusStyle::Huawei);
    assert!(modem.dtmf_supported());
}

#[tokio::test]
async fn test_detects_wavecom_profile() {
    let (stream, device) = spawn_device(responder(|cmd| match cmd {
        "AT+WIND?" => Some(reply(&["+WIND: 0", "OK"])),
        "AT+WIND=50" => Some(reply(&["OK"])),
        _ => None,
    }));
    let modem = GsmModem::new(test_config());
    modem.connect_stream(stream).await.unwrap();

    assert_eq!(modem.call_status_style(), CallStatusStyle::Wavecom);
    // Wavecom modems that do not list their commands still do +VTS
    assert!(modem.dtmf_supported());
    assert!(device.received("AT+WIND=50"));
}

#[tokio::test]
async fn test_detects_zte_profile() {
    let (stream, _device) = spawn_device(responder(|cmd| match cmd {
        "AT+ZPAS?" => Some(reply(&["+ZPAS: \"NO SERVICE\",\"CS_ONLY\"", "OK"])),
        _ => None,
    }));
    let modem = GsmModem::new(test_config());
    modem.connect_stream(stream).await.unwrap();
    assert_eq!(modem.call_status_style(), CallStatusStyle::Zte);
}

#[tokio::test]
async fn test_cnmi_fallback_and_failure() {
    let (stream, device) = spawn_device(responder(|cmd| match cmd {
        "AT+CNMI=2,1,0,2" => Some(reply(&["ERROR"])),
        _ => None,
    }));
    let modem = GsmModem::new(test_config());
    modem.connect_stream(stream).await.unwrap();
    assert!(device.received("AT+CNMI=2,1,0,1,0"));
    assert!(modem.sms_read_supported());

    let (stream, _device) = spawn_device(responder(|cmd| {
        cmd.starts_with("AT+CNMI").then(|| reply(&["ERROR"]))
    }));
    let modem = GsmModem::new(test_config());
    modem.connect_stream(stream).await.unwrap();
    assert!(!modem.sms_read_supported());
}

#[tokio::test]
async fn test_identity_queries() {
    let (modem, _device) = connect(responder(|_| None)).await;

    assert_eq!(modem.manufacturer().await.unwrap(), "Generic");
    assert_eq!(modem.model().await.unwrap(), "GSM Modem 1.0");
    assert_eq!(modem.revision().await.unwrap(), Some("REV 42".to_string()));
    assert_eq!(modem.imei().await.unwrap(), "351234567890123");
    assert_eq!(modem.imsi().await.unwrap(), "655011234567890");
    assert_eq!(modem.network_name().await.unwrap(), Some("Test Network".to_string()));
    assert_eq!(modem.signal_strength().await.unwrap(), 18);
    assert_eq!(modem.supported_commands().await.unwrap(), None);
}

#[tokio::test]
async fn test_revision_is_optional() {
    let (modem, _device) = connect(responder(|cmd| (cmd == "AT+CGMR").then(|| reply(&["ERROR"])))).await;
    assert_eq!(modem.revision().await.unwrap(), None);
}

#[tokio::test]
async fn test_unknown_signal_strength() {
    let (modem, _device) = connect(responder(|cmd| (cmd == "AT+CSQ").then(|| reply(&["+CSQ: 99,99", "OK"])))).await;
    assert_eq!(modem.signal_strength().await.unwrap(), -1);
}

#[tokio::test]
async fn test_own_number() {
    let (modem, device) = connect(responder(|cmd| match cmd {
        "AT+CNUM" => Some(reply(&[r#"+CNUM: "","+27820001234",145"#, "OK"])),
        _ => None,
    }))
    .await;
    assert_eq!(modem.own_number().await.unwrap(), Some("+27820001234".to_string()));

    modem.set_own_number(Some("+27820009999")).await.unwrap();
    assert!(device.received(r#"AT+CPBS="ON""#));
    assert!(device.received(r#"AT+CPBW=1,"+27820009999",145"#));
}

#[tokio::test]
async fn test_own_number_from_phonebook() {
    let (modem, _device) = connect(responder(|cmd| match cmd {
        "AT+CNUM" => Some(reply(&["ERROR"])),
        "AT+CPBR=1" => Some(reply(&[r#"+CPBR: 1,"+27820001234",145,"Own number""#, "OK"])),
        _ => None,
    }))
    .await;
    assert_eq!(modem.own_number().await.unwrap(), Some("+27820001234".to_string()));
}

#[tokio::test]
async fn test_smsc_is_cached() {
    let (modem, device) = connect(responder(|_| None)).await;
    assert_eq!(modem.smsc().await.unwrap(), Some("+27829129".to_string()));
    device.clear();
    assert_eq!(modem.smsc().await.unwrap(), Some("+27829129".to_string()));
    assert!(!device.received("AT+CSCA?"));

    modem.set_smsc("+27829129").await.unwrap();
    assert!(device.commands().is_empty());
    modem.set_smsc("+27820000000").await.unwrap();
    assert!(device.received(r#"AT+CSCA="+27820000000""#));
}

#[tokio::test]
async fn test_sms_encodings() {
    let (modem, device) = connect(responder(|_| None)).await;
    assert_eq!(modem.sms_encoding().await.unwrap(), "GSM");
    assert_eq!(modem.sms_supported_encodings().await.unwrap(), vec!["GSM", "UCS2"]);

    assert!(modem.set_sms_encoding("UCS2").await.unwrap());
    assert!(device.received(r#"AT+CSCS="UCS2""#));
    assert!(!modem.set_sms_encoding("IRA").await.unwrap());
    assert_eq!(modem.sms_encoding().await.unwrap(), "UCS2");
}

#[tokio::test]
async fn test_wait_for_network_coverage() {
    let polls = Arc::new(AtomicU32::new(0));
    let count = Arc::clone(&polls);
    let (modem, _device) = connect(responder(move |cmd| match cmd {
        // Searching on the first poll, registered after
        "AT+CREG?" if count.fetch_add(1, Ordering::SeqCst) == 0 => Some(reply(&["+CREG: 0,2", "OK"])),
        _ => None,
    }))
    .await;

    let strength = modem
        .wait_for_network_coverage(Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(strength, 18);
    assert_eq!(polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_network_registration_denied() {
    let (modem, _device) = connect(responder(|cmd| {
        (cmd == "AT+CREG?").then(|| reply(&["+CREG: 0,3", "OK"]))
    }))
    .await;
    let err = modem.wait_for_network_coverage(None).await.unwrap_err();
    assert!(matches!(err, GsmError::InvalidState(_)));
}

#[tokio::test]
async fn test_network_coverage_times_out_without_signal() {
    let (modem, _device) = connect(responder(|cmd| (cmd == "AT+CSQ").then(|| reply(&["+CSQ: 0,99", "OK"])))).await;
    let err = modem
        .wait_for_network_coverage(Some(Duration::from_millis(500)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_command_errors() {
    let (modem, _device) = connect(responder(|cmd| match cmd {
        "AT+CGSN" => Some(reply(&["+CME ERROR: 10"])),
        "AT+CIMI" => Some(reply(&["+CMS ERROR: 310"])),
        "AT+CGMM" => Some(reply(&["ERROR"])),
        _ => None,
    }))
    .await;
    let errors_before = modem.metrics().counter_value("command_errors").unwrap_or(0);

    let err = modem.imei().await.unwrap_err();
    let cme = err.as_command_error().unwrap();
    assert!(cme.is_cme());
    assert_eq!(cme.code(), Some(10));

    let cms = modem.imsi().await.unwrap_err();
    assert!(cms.as_command_error().unwrap().is_cms());

    let generic = modem.model().await.unwrap_err();
    assert!(matches!(generic, GsmError::Command(CommandError::Generic { .. })));

    assert_eq!(modem.metrics().counter_value("command_errors"), Some(errors_before + 3));
}

#[tokio::test]
async fn test_busy_errors_are_retried() {
    let attempts = Arc::new(AtomicU32::new(0));
    let count = Arc::clone(&attempts);
    let (modem, _device) = connect(responder(move |cmd| match cmd {
        "AT+CSQ" if count.fetch_add(1, Ordering::SeqCst) < 2 => Some(reply(&["+CME ERROR: 515"])),
        _ => None,
    }))
    .await;

    assert_eq!(modem.signal_strength().await.unwrap(), 18);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_busy_retries_are_bounded() {
    let mut config = test_config();
    config.max_busy_retries = 2;
    let (modem, device) = connect_with(
        config,
        Arc::new(NoopHandler),
        responder(|cmd| (cmd == "AT+CSQ").then(|| reply(&["+CME ERROR: 515"]))),
    )
    .await;

    let err = modem.signal_strength().await.unwrap_err();
    assert_eq!(err.as_command_error().and_then(CommandError::code), Some(515));
    assert_eq!(device.commands().iter().filter(|c| *c == "AT+CSQ").count(), 3);
}

#[tokio::test]
async fn test_write_after_close_fails() {
    let (modem, _device) = connect(responder(|_| None)).await;
    modem.close().await;
    let err = modem.write("AT").await.unwrap_err();
    assert!(matches!(err, GsmError::InvalidState(_)));
}
