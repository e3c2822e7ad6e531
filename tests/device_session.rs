//! Discovery, session and sink against scripted devices

use std::time::Duration;
use wxt520_core::core::protocol::encode_frame;
use wxt520_core::{
    discover, DeviceLocation, Discovery, DiscoveryConfig, OutputFormat, ReadingSink,
    ScriptedOpener, ScriptedTransport, Session, SessionConfig, SessionError, WriterSink,
};

fn discovery_config() -> DiscoveryConfig {
    DiscoveryConfig {
        bauds: vec![9600, 19200],
        settle: Duration::ZERO,
        timeout: Duration::from_millis(10),
        ..DiscoveryConfig::default()
    }
}

fn session_config() -> SessionConfig {
    SessionConfig {
        settle: Duration::ZERO,
        ..SessionConfig::default()
    }
}

#[test]
fn discovers_device_and_streams_readings() {
    let device = ScriptedTransport::wxt520('2')
        .stream_line(&encode_frame(b"2r2,Ta=23.6C,Tp=23.9C,Ua=14.2P,Pa=1026.6H"))
        .stream_line(b"2r1,Dn=045D,corrupted\r\n")
        .stream_line(&encode_frame(b"2r1,Dn=045D,Dm=090D,Dx=180D,Sn=1.1M,Sm=2.2M,Sx=3.3M"));
    let opener = ScriptedOpener::new()
        .with_silent_port("/dev/ttyS0")
        .with_device("/dev/ttyUSB0", 19200, device.clone());

    let location = match discover(&opener, &discovery_config()).unwrap() {
        Discovery::Found(location) => location,
        Discovery::NotFound => panic!("device not found"),
    };
    assert_eq!(
        location,
        DeviceLocation {
            port: "/dev/ttyUSB0".to_string(),
            address: '2',
            baud: 19200,
        }
    );

    let mut session = Session::establish(&opener, &location, &session_config()).unwrap();
    let mut sink = WriterSink::new(Vec::new(), OutputFormat::Json);

    for _ in 0..4 {
        if let Some(reading) = session.next_reading().unwrap() {
            sink.deliver(&reading).unwrap();
        }
    }
    assert_eq!(session.stats().readings, 2);
    assert_eq!(session.stats().checksum_failures, 1);

    session.close();
    // one discovery handle and one session handle
    assert_eq!(device.closed_count(), 2);

    let out = String::from_utf8(sink.into_inner()).unwrap();
    let types: Vec<String> = out
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["Type"].to_string())
        .collect();
    assert_eq!(types, ["\"PTU\"", "\"Wind\""]);
}

#[test]
fn session_reopens_at_discovered_baud() {
    let device = ScriptedTransport::wxt520('0');
    let opener = ScriptedOpener::new().with_device("ttyUSB0", 19200, device.clone());
    let config = DiscoveryConfig {
        bauds: vec![19200],
        ..discovery_config()
    };

    let Discovery::Found(location) = discover(&opener, &config).unwrap() else {
        panic!("device not found");
    };
    let session = Session::establish(&opener, &location, &session_config()).unwrap();

    assert!(session.is_automatic());
    assert_eq!(
        opener.opened(),
        vec![("ttyUSB0".to_string(), 19200), ("ttyUSB0".to_string(), 19200)]
    );
    assert_eq!(device.written().last(), Some(&b"0XU,M=a\r\n".to_vec()));
}

#[test]
fn scan_order_and_not_found() {
    let opener = ScriptedOpener::new()
        .with_silent_port("COM1")
        .with_silent_port("COM2");

    assert_eq!(
        discover(&opener, &discovery_config()).unwrap(),
        Discovery::NotFound
    );
    assert_eq!(
        opener.opened(),
        vec![
            ("COM1".to_string(), 9600),
            ("COM1".to_string(), 19200),
            ("COM2".to_string(), 9600),
            ("COM2".to_string(), 19200),
        ]
    );
}

#[test]
fn other_device_model_is_not_accepted() {
    let device = ScriptedTransport::new()
        .reply(b"?\r\n", b"0\r\n")
        .reply(b"0XU\r\n", b"0XU,A=0,M=P,N=WXT510,V=2.14\r\n");
    let opener = ScriptedOpener::new().with_device("COM3", 9600, device.clone());

    assert_eq!(
        discover(&opener, &discovery_config()).unwrap(),
        Discovery::NotFound
    );
    assert_eq!(device.closed_count(), 1);
}

#[test]
fn refused_automatic_mode_closes_port() {
    let device = ScriptedTransport::wxt520('0').reply(b"0XU,M=a\r\n", b"");
    let opener = ScriptedOpener::new().with_device("COM4", 9600, device.clone());
    let location = DeviceLocation {
        port: "COM4".to_string(),
        address: '0',
        baud: 9600,
    };

    let result = Session::establish(&opener, &location, &session_config());
    assert!(matches!(
        result,
        Err(SessionError::ModeNotAcknowledged { ref port, .. }) if port == "scripted device"
    ));
    assert_eq!(device.closed_count(), 1);
    assert_eq!(device.written(), vec![b"0XU,M=a\r\n".to_vec()]);
}
