use std::net::Ipv4Addr;

use l2tap_graph::{Capability, Graph, Qos};
use l2tap_insert::{insert_taps, InsertTaps};
use rand::{rngs::StdRng, SeedableRng};

const MASK24: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Switch `S`, endpoint `E` on `10.0.0.2/24`, and a link between them tapped by `Collector`.
fn scenario() -> Graph {
    let mut graph = Graph::new();
    let switch = graph.add_decorated("S", Capability::Switch).unwrap();
    let endpoint = graph.add_decorated("E", Capability::VmEndpoint).unwrap();
    graph.add_decorated("Collector", Capability::VmEndpoint).unwrap();

    let (interface, edge) =
        graph.connect(endpoint, switch, Ipv4Addr::new(10, 0, 0, 2), MASK24).unwrap();
    assert_eq!(interface, "eth0");

    let edge = graph.edge_mut(edge).unwrap();
    edge.set_tap(vec!["Collector"]);
    edge.qos = Some(Qos::default().delay(5).bandwidth(100_000));

    graph
}

#[test]
fn tap_single_link_end_to_end() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut graph = scenario();
    let report = insert_taps(&mut graph, "10.100.0.0/16").unwrap();

    assert_eq!(report.len(), 1);
    let tapped = &report.tapped[0];
    assert_eq!(tapped.subnet.to_string(), "10.100.0.0/24");
    assert_eq!(tapped.tap_address, Ipv4Addr::new(10, 100, 0, 1));

    let collector = graph.find_vertex("Collector").unwrap();
    assert_eq!(tapped.collectors.len(), 1);
    assert_eq!(tapped.collectors[0].collector, collector);
    assert_eq!(tapped.collectors[0].address, Ipv4Addr::new(10, 100, 0, 2));
    assert_eq!(tapped.collectors[0].key, 1000);

    // The tap and its switches.
    let tap = graph.find_vertex("tap-E").unwrap();
    let tap_switch = graph.find_vertex("tap-E.switch").unwrap();
    let collector_switch = graph.find_vertex("tap-E-collectors.switch").unwrap();
    assert_eq!(tap, tapped.tap);
    assert!(graph.is_decorated_by(tap, Capability::Tap));

    // E's eth0 now ends on the tap switch, with the same name and address.
    let endpoint = graph.find_vertex("E").unwrap();
    let eth0 = graph.vertex(endpoint).unwrap().interface("eth0").unwrap();
    assert_eq!(eth0.address, Some(Ipv4Addr::new(10, 0, 0, 2)));
    assert_eq!(eth0.netmask, Some(MASK24));
    let link = graph.edge(eth0.edge.unwrap()).unwrap();
    assert!(link.touches(tap_switch));
    assert!(link.synthetic);
    assert_eq!(link.qos, Some(Qos::default().delay(5).bandwidth(100_000)));

    // The switch only sees the tap now.
    let switch = graph.find_vertex("S").unwrap();
    let neighbours: Vec<_> = graph.edges_of(switch).map(|(_, e)| e.source).collect();
    assert_eq!(neighbours, [tap]);

    // Tap and collector share the collector subnet.
    let tap_vertex = graph.vertex(tap).unwrap();
    let tap_iface = tap_vertex.interface_by_address(Ipv4Addr::new(10, 100, 0, 1)).unwrap();
    assert!(graph.edge(tap_iface.edge.unwrap()).unwrap().touches(collector_switch));
    let collector_vertex = graph.vertex(collector).unwrap();
    let collector_iface =
        collector_vertex.interface_by_address(Ipv4Addr::new(10, 100, 0, 2)).unwrap();
    assert!(graph.edge(collector_iface.edge.unwrap()).unwrap().touches(collector_switch));

    // One GRE tunnel keyed 1000 on the collector.
    let commands: Vec<_> = collector_vertex.schedule().iter().map(ToString::to_string).collect();
    assert_eq!(
        commands,
        [
            "ip link add tap1000 type gretap key 1000 local 10.100.0.2 remote 10.100.0.1 ttl 255",
            "ip link set dev tap1000 up",
            "ip link set tap1000 promisc on",
        ]
    );

    // br0 on the tap mirrors everything out of that tunnel.
    let tap_schedule = tap_vertex.schedule();
    let macs: Vec<_> = tap_vertex
        .interfaces()
        .iter()
        .filter(|i| i.is_layer2())
        .map(|i| i.mac.clone().unwrap())
        .collect();
    assert_eq!(macs.len(), 2);
    assert_eq!(tap_schedule[0].to_string(), format!("bridge_layer2.sh br0 {} {}", macs[0], macs[1]));
    assert_eq!(
        tap_schedule[1].to_string(),
        "ovs-vsctl add-port br0 gre1000 -- \
         set interface gre1000 type=gre options:remote_ip=10.100.0.2 options:key=1000 -- \
         --id=@p1000 get port gre1000 -- \
         --id=@m1000 create mirror name=mirror1000 select-all=true output-port=@p1000 -- \
         set bridge br0 mirrors=@m1000"
    );
}

#[test]
fn runs_are_reproducible_with_a_seed() {
    let run = || {
        let mut graph = scenario();
        let report = InsertTaps::new()
            .run_with_rng(&mut graph, &mut StdRng::seed_from_u64(99))
            .unwrap();
        let tap = graph.vertex(report.tapped[0].tap).unwrap();
        tap.schedule().iter().map(ToString::to_string).collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}
