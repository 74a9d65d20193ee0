//! Scenario 6 from spec.md §8: cross-worker receipt fan-out. Runs two
//! `Worker` instances in-process, each with its own client listener and
//! Receipt Bus publisher, each subscribed to every publisher in the
//! cluster (including its own), the same topology `main.rs` wires up
//! for real worker subprocesses, minus the Unix-socket/re-exec plumbing.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use smpp_gateway::pdu::codec::SmppCodec;
use smpp_gateway::pdu::{BindRequest, Command, Pdu, SubmitSm};
use smpp_gateway::provider::{Provider, ShortMessage};
use smpp_gateway::receipt::DeliveryStatus;
use smpp_gateway::worker::Worker;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;
use tokio_util::codec::Framed;

struct AcceptAllProvider;

#[async_trait]
impl Provider for AcceptAllProvider {
    async fn authenticate(&self, _system_id: &str, _password: &str) -> bool {
        true
    }

    async fn deliver(&self, _sm: &ShortMessage) -> DeliveryStatus {
        DeliveryStatus::Ok
    }
}

static NEXT_PORT: AtomicU16 = AtomicU16::new(28300);

fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

async fn spawn_cluster(worker_count: usize) -> Vec<u16> {
    let client_ports: Vec<u16> = (0..worker_count).map(|_| next_port()).collect();
    let bus_ports: Vec<u16> = (0..worker_count).map(|_| next_port()).collect();
    let bus_addrs: Vec<String> = bus_ports.iter().map(|p| format!("127.0.0.1:{p}")).collect();

    for i in 0..worker_count {
        let client_listener = TcpListener::bind(("127.0.0.1", client_ports[i])).await.unwrap();
        let bus_listener = TcpListener::bind(("127.0.0.1", bus_ports[i])).await.unwrap();
        let worker = Arc::new(Worker::new(Arc::new(AcceptAllProvider)));
        tokio::spawn(worker.run(client_listener, bus_listener, bus_addrs.clone()));
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    client_ports
}

async fn connect(port: u16) -> Framed<TcpStream, SmppCodec> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    Framed::new(stream, SmppCodec::new())
}

fn bind_transmitter(system_id: &str, password: &str, seq: u32) -> Command {
    Command::new(
        0,
        seq,
        Pdu::BindTransmitter(BindRequest {
            system_id: system_id.to_string(),
            password: password.to_string(),
            system_type: String::new(),
            interface_version: 0x34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        }),
    )
}

fn bind_receiver(system_id: &str, password: &str, seq: u32) -> Command {
    Command::new(
        0,
        seq,
        Pdu::BindReceiver(BindRequest {
            system_id: system_id.to_string(),
            password: password.to_string(),
            system_type: String::new(),
            interface_version: 0x34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        }),
    )
}

fn submit_sm(seq: u32) -> Command {
    Command::new(
        0,
        seq,
        Pdu::SubmitSm(SubmitSm {
            service_type: String::new(),
            source_addr_ton: 1,
            source_addr_npi: 1,
            source_addr: "12345".to_string(),
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: "67890".to_string(),
            esm_class: 0,
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 0x01,
            replace_if_present_flag: 0,
            data_coding: 0,
            sm_default_msg_id: 0,
            short_message: b"cross worker".to_vec(),
        }),
    )
}

#[tokio::test]
async fn receipt_fans_out_across_workers() {
    let ports = spawn_cluster(2).await;
    let (w1_port, w2_port) = (ports[0], ports[1]);

    let mut transmitter = connect(w1_port).await;
    transmitter.send(bind_transmitter("mtc", "pwd", 1)).await.unwrap();
    assert_eq!(transmitter.next().await.unwrap().unwrap().command_status, 0);

    let mut receiver = connect(w2_port).await;
    receiver.send(bind_receiver("mtc", "pwd", 1)).await.unwrap();
    assert_eq!(receiver.next().await.unwrap().unwrap().command_status, 0);

    transmitter.send(submit_sm(1)).await.unwrap();
    let submit_resp = transmitter.next().await.unwrap().unwrap();
    assert!(matches!(submit_resp.pdu, Pdu::SubmitSmResp(_)));

    let receipt = tokio::time::timeout(Duration::from_secs(2), receiver.next())
        .await
        .expect("receiver on the other worker never got a receipt")
        .unwrap()
        .unwrap();
    assert!(matches!(receipt.pdu, Pdu::DeliverSm(_)));

    // No second receipt should follow: exactly one receiver, one receipt.
    let extra = tokio::time::timeout(Duration::from_millis(300), receiver.next()).await;
    assert!(extra.is_err(), "receiver should not get a second receipt");
}
