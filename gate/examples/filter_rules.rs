use gate::{headers, Filter};

/// 20-byte IPv4 header (IHL=5) plus 4 transport bytes.
fn ipv4_frame(protocol: u8, dst_port: u16) -> Vec<u8> {
    let mut frame = vec![0u8; 24];
    frame[0] = 0x45;
    frame[9] = protocol;
    frame[22..24].copy_from_slice(&dst_port.to_be_bytes());
    frame
}

fn main() {
    // Deny HTTPS and SSH over TCP, and all ICMPv6.
    let filter: Filter = "2048;6;443,2048;6;22,34525;58;*".parse().unwrap();
    println!("deny list: {filter}");

    let frames = [
        ("tcp/443", ipv4_frame(6, 443)),
        ("tcp/80", ipv4_frame(6, 80)),
        ("udp/53", ipv4_frame(17, 53)),
        ("tcp/22", ipv4_frame(6, 22)),
    ];

    for (name, frame) in &frames {
        let verdict = match filter.matches(headers::ETHERTYPE_IPV4, frame) {
            Ok(true) => "drop",
            Ok(false) => "allow",
            Err(e) => {
                println!("{name}: unclassifiable ({e})");
                continue;
            }
        };
        println!("{name} ({}): {verdict}", headers::ip_protocol_name(u32::from(frame[9])));
    }
}
