use std::net::Ipv4Addr;

use l2tap::{Capability, Graph, InsertTaps, InsertTapsOptions, Qos};
use tracing_subscriber::EnvFilter;

const MASK24: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Taps the links of two web servers and prints what every vertex runs at start-up.
///
/// Usage: `cargo run --example insert_taps -- [collector network]`
fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let options: InsertTapsOptions = match std::env::args().nth(1) {
        Some(network) => network.parse().expect("invalid collector network"),
        None => InsertTapsOptions::default(),
    };

    let mut graph = Graph::new();
    let lan = graph.add_decorated("lan", Capability::Switch).unwrap();
    let ids = graph.add_decorated("ids", Capability::VmEndpoint).unwrap();
    graph.add_decorated("pcap", Capability::VmEndpoint).unwrap();

    for (i, name) in ["web1", "web2", "db"].into_iter().enumerate() {
        let host = graph.add_decorated(name, Capability::VmEndpoint).unwrap();
        let (_, edge) =
            graph.connect(host, lan, Ipv4Addr::new(10, 0, 0, 10 + i as u8), MASK24).unwrap();

        let edge = graph.edge_mut(edge).unwrap();
        edge.qos = Some(Qos::default().delay(2).bandwidth(1_000_000));
        match name {
            "web1" => edge.set_tap(ids),
            "web2" => edge.set_tap(["ids", "pcap"]),
            _ => {}
        }
    }

    let report = InsertTaps::with_options(options).run(&mut graph).unwrap();
    for tapped in report.iter() {
        println!(
            "tapped {} on {} (tap at {})",
            graph.vertex(tapped.endpoint).unwrap().name(),
            tapped.subnet,
            tapped.tap_address
        );
    }

    for (_, vertex) in graph.vertices() {
        let schedule = vertex.schedule();
        if schedule.is_empty() {
            continue;
        }

        println!("\n{}:", vertex.name());
        for entry in schedule {
            println!("  [{:>4}] {entry}", entry.time);
        }
    }
}
