//! Drives a broker and one or more clients over a real loopback TCP
//! connection, without shelling out to the compiled binaries.

use qtools::address::Address;
use qtools::broker::Broker;
use qtools::client::receive::{self, ReceiveOptions};
use qtools::client::send::{self, Input, SendOptions};
use qtools::reactor::run_broker;
use std::time::Duration;
use tokio::time::sleep;

fn addr(port: u16, path: &str) -> Address {
    Address {
        host: "127.0.0.1".to_string(),
        port,
        path: path.to_string(),
    }
}

async fn spawn_broker(port: u16) {
    let domain = format!("127.0.0.1:{port}");
    let broker = Broker::new();

    tokio::spawn(async move {
        let _ = run_broker(&domain, "qtools-test-broker", broker).await;
    });

    // give the listener task a moment to bind before clients dial out.
    sleep(Duration::from_millis(150)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn send_then_receive_round_trip() {
    let port = 28_671;
    spawn_broker(port).await;

    let receive_addrs = vec![addr(port, "greetings")];
    let receive_task = tokio::spawn(async move {
        let options = ReceiveOptions {
            count: Some(1),
            json: false,
            no_prefix: true,
            verbose: false,
            id: None,
        };
        let mut output = Vec::new();
        receive::run(&receive_addrs, options, &mut output).await.unwrap();
        output
    });

    sleep(Duration::from_millis(100)).await;

    let send_addrs = vec![addr(port, "greetings")];
    let send_options = SendOptions {
        messages: vec!["hello there".to_string()],
        input: Input::File("/dev/null".into()),
        verbose: false,
        id: None,
    };
    send::run(&send_addrs, send_options).await.unwrap();

    let output = receive_task.await.unwrap();
    assert_eq!(String::from_utf8(output).unwrap().trim_end(), "hello there");
}

#[tokio::test(flavor = "multi_thread")]
async fn send_balances_across_multiple_targets() {
    let port = 28_672;
    spawn_broker(port).await;

    let receive_addrs = vec![addr(port, "queue-a"), addr(port, "queue-b")];
    let receive_task = tokio::spawn(async move {
        let options = ReceiveOptions {
            count: Some(2),
            json: false,
            no_prefix: true,
            verbose: false,
            id: None,
        };
        let mut output = Vec::new();
        receive::run(&receive_addrs, options, &mut output).await.unwrap();
        output
    });

    sleep(Duration::from_millis(100)).await;

    let send_addrs = vec![addr(port, "queue-a"), addr(port, "queue-b")];
    let send_options = SendOptions {
        messages: vec!["m0".to_string(), "m1".to_string()],
        input: Input::File("/dev/null".into()),
        verbose: false,
        id: None,
    };
    send::run(&send_addrs, send_options).await.unwrap();

    let output = receive_task.await.unwrap();
    let lines: Vec<&str> = std::str::from_utf8(&output).unwrap().lines().collect();
    let mut bodies: Vec<&str> = lines.to_vec();
    bodies.sort();
    assert_eq!(bodies, vec!["m0", "m1"]);
}
