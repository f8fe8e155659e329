//! The full admission path: a producer thread deposits inbound packets,
//! worker threads verify the sender's certificate and run the frame
//! through the deny filter.

use std::{sync::Arc, thread, time::Duration};

use gate::{
    headers, CertificateOfTrust, Decoder, DeferredPackets, Filter, Identity, MatchError,
    MemoryDirectory, TrustLevel, Verification, ROLE_UPSTREAM,
};

/// An inbound unit of work: the sender's credential plus the decapsulated
/// frame it wants to inject.
struct Inbound {
    label: &'static str,
    certificate: CertificateOfTrust,
    ether_type: u32,
    frame: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
enum AdmissionError {
    #[error("sender not trusted ({0:?})")]
    Untrusted(Verification),
    #[error("frame matches deny rule")]
    Denied,
    #[error(transparent)]
    Unclassifiable(#[from] MatchError),
}

struct AdmissionDecoder {
    directory: Arc<MemoryDirectory>,
    filter: Filter,
}

impl Decoder<Inbound> for AdmissionDecoder {
    type Error = AdmissionError;

    fn decode(&self, packet: Inbound) -> Result<(), Self::Error> {
        match packet.certificate.verify(&*self.directory) {
            Verification::Ok => {}
            other => return Err(AdmissionError::Untrusted(other)),
        }
        if self.filter.matches(packet.ether_type, &packet.frame)? {
            return Err(AdmissionError::Denied);
        }
        println!(
            "{}: admitted (issuer {}, upstream: {})",
            packet.label,
            packet.certificate.issuer(),
            packet.certificate.role_upstream(),
        );
        Ok(())
    }
}

fn ipv4_frame(protocol: u8, dst_port: u16) -> Vec<u8> {
    let mut frame = vec![0u8; 24];
    frame[0] = 0x45;
    frame[9] = protocol;
    frame[22..24].copy_from_slice(&dst_port.to_be_bytes());
    frame
}

fn main() {
    tracing_subscriber::fmt::init();

    let root = Identity::generate();
    let peer = Identity::generate();
    let stranger = Identity::generate();

    let directory = Arc::new(MemoryDirectory::new());
    directory.insert(root.public_view());

    let vouch = |issuer: &Identity| {
        CertificateOfTrust::create(1, ROLE_UPSTREAM, issuer, &peer, TrustLevel::High).unwrap()
    };

    let queue = Arc::new(DeferredPackets::new());
    let decoder = Arc::new(AdmissionDecoder {
        directory: Arc::clone(&directory),
        filter: "2048;6;443".parse().unwrap(),
    });

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let decoder = Arc::clone(&decoder);
            thread::spawn(move || while queue.process(&*decoder).is_ok() {})
        })
        .collect();

    let packets = [
        Inbound {
            label: "dns query from trusted peer",
            certificate: vouch(&root),
            ether_type: headers::ETHERTYPE_IPV4,
            frame: ipv4_frame(17, 53),
        },
        Inbound {
            label: "https from trusted peer",
            certificate: vouch(&root),
            ether_type: headers::ETHERTYPE_IPV4,
            frame: ipv4_frame(6, 443),
        },
        Inbound {
            label: "dns query vouched by a stranger",
            certificate: vouch(&stranger),
            ether_type: headers::ETHERTYPE_IPV4,
            frame: ipv4_frame(17, 53),
        },
    ];

    for packet in packets {
        if queue.enqueue(packet).is_err() {
            eprintln!("queue full, packet refused");
        }
    }

    thread::sleep(Duration::from_millis(200));
    queue.shutdown();
    for worker in workers {
        worker.join().unwrap();
    }

    // The stranger's certificate left a discovery request behind.
    for address in directory.discovery_requests() {
        println!("pending discovery: {address}");
    }
}
