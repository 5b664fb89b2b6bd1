//! `SnmpClient` against a real UDP socket that never answers.

use snmp_monitor::snmp::{
    oids, AuthProtocol, ClientOptions, DeviceCredentials, SnmpClient, SnmpError, SnmpTransport,
    UsmCredentials,
};
use snmp_monitor::secret::SecretString;
use std::net::UdpSocket;
use std::time::{Duration, Instant};

fn silent_agent() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind");
    let port = socket.local_addr().expect("local addr").port();
    (socket, port)
}

fn client(retries: u32) -> SnmpClient {
    SnmpClient::new(ClientOptions {
        timeout: Duration::from_millis(200),
        retries,
    })
}

#[tokio::test]
async fn test_get_times_out() {
    let (_socket, port) = silent_agent();
    let device = DeviceCredentials::community("lab-1", "127.0.0.1", "public").with_port(port);

    let started = Instant::now();
    let result = client(1).get(&device, &oids::SYSTEM_INFO).await;

    assert_eq!(result, Err(SnmpError::Timeout));
    // one retry means two full waits
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_table_fetch_times_out() {
    let (_socket, port) = silent_agent();
    let device = DeviceCredentials::community("lab-1", "127.0.0.1", "public").with_port(port);

    let result = client(0).fetch_table(&device, &oids::INTERFACE_COLUMNS).await;
    assert_eq!(result, Err(SnmpError::Timeout));
}

#[tokio::test]
async fn test_v3_discovery_times_out() {
    let (_socket, port) = silent_agent();
    let device = DeviceCredentials::usm(
        "lab-1",
        "127.0.0.1",
        UsmCredentials {
            username: "monitor".to_string(),
            auth: Some((AuthProtocol::Sha1, SecretString::new("authpass1"))),
            privacy: None,
        },
    )
    .with_port(port);

    let result = client(0).get(&device, &oids::SYSTEM_INFO).await;
    assert_eq!(result, Err(SnmpError::Timeout));
}
