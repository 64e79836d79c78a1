use std::net::Ipv4Addr;

use l2tap_graph::{Capability, CollectorRef, Graph, VertexId};
use l2tap_insert::{Error, InsertTaps, InsertTapsOptions};

const MASK24: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Two switches with three hosts each. `host0` and `host1` are tapped by both collectors,
/// `host4` only by `splunk`.
fn campus() -> (Graph, VertexId, VertexId) {
    let mut graph = Graph::new();
    let switches = [
        graph.add_decorated("core", Capability::Switch).unwrap(),
        graph.add_decorated("edge", Capability::Switch).unwrap(),
    ];
    let bro = graph.add_decorated("bro", Capability::VmEndpoint).unwrap();
    let splunk = graph.add_decorated("splunk", Capability::VmEndpoint).unwrap();

    for i in 0..6u8 {
        let host = graph.add_decorated(format!("host{i}"), Capability::VmEndpoint).unwrap();
        let switch = switches[usize::from(i / 3)];
        // Alternate which end of the link is the switch.
        let (_, edge) = if i % 2 == 0 {
            graph.connect(host, switch, Ipv4Addr::new(10, 0, i / 3, 10 + i), MASK24).unwrap()
        } else {
            let (name, edge) =
                graph.connect(host, switch, Ipv4Addr::new(10, 0, i / 3, 10 + i), MASK24).unwrap();
            let e = graph.edge_mut(edge).unwrap();
            std::mem::swap(&mut e.source, &mut e.destination);
            (name, edge)
        };

        let edge = graph.edge_mut(edge).unwrap();
        match i {
            0 | 1 => edge.set_tap(vec![CollectorRef::from("bro"), CollectorRef::from(splunk)]),
            4 => edge.set_tap(splunk),
            _ => {}
        }
    }

    (graph, bro, splunk)
}

#[test]
fn gre_keys_are_unique_and_increasing() {
    let _ = tracing_subscriber::fmt::try_init();
    let (mut graph, _, _) = campus();

    let report = InsertTaps::new().run(&mut graph).unwrap();

    assert_eq!(report.len(), 3);
    let keys: Vec<_> = report.keys().collect();
    assert_eq!(keys, [1000, 1001, 1002, 1003, 1004]);
}

#[test]
fn addresses_follow_collector_order() {
    let (mut graph, bro, splunk) = campus();

    let report = InsertTaps::new().run(&mut graph).unwrap();

    let first = &report.tapped[0];
    assert_eq!(first.subnet.to_string(), "10.100.0.0/24");
    assert_eq!(first.tap_address, Ipv4Addr::new(10, 100, 0, 1));
    assert_eq!(
        first.collectors.iter().map(|c| (c.collector, c.address)).collect::<Vec<_>>(),
        [(bro, Ipv4Addr::new(10, 100, 0, 2)), (splunk, Ipv4Addr::new(10, 100, 0, 3))]
    );

    let last = &report.tapped[2];
    assert_eq!(last.subnet.to_string(), "10.100.2.0/24");
    assert_eq!(graph.vertex(last.endpoint).unwrap().name(), "host4");
    assert_eq!(last.collectors[0].address, Ipv4Addr::new(10, 100, 2, 2));

    // Splunk terminates one tunnel per tapped link it collects from.
    let splunk = graph.vertex(splunk).unwrap();
    let devices = splunk
        .schedule()
        .iter()
        .filter(|e| e.arguments.starts_with("link add"))
        .count();
    assert_eq!(devices, 3);
    assert_eq!(splunk.interfaces().len(), 3);
}

#[test]
fn graph_grows_by_three_vertices_per_tap() {
    let (mut graph, _, _) = campus();
    let (vertices, edges) = (graph.vertex_count(), graph.edge_count());

    InsertTaps::new().run(&mut graph).unwrap();

    assert_eq!(graph.vertex_count(), vertices + 3 * 3);
    // Per tap: the tapped edge goes, three reconstructed links and the tap's collector link
    // arrive, plus one link per collector.
    let added = |collectors: usize| 3 + 1 + collectors - 1;
    assert_eq!(graph.edge_count(), edges + added(2) + added(2) + added(1));
    assert_eq!(graph.edges().filter(|(_, e)| e.synthetic).count(), 9);

    for name in ["host0", "host1", "host4"] {
        let host = graph.find_vertex(name).unwrap();
        let (_, link) = graph.edges_of(host).next().unwrap();
        let tap_switch = graph.find_vertex(&format!("tap-{name}.switch")).unwrap();
        assert!(link.touches(tap_switch));
    }
}

#[test]
fn mirror_lists_every_tunnel() {
    let (mut graph, _, _) = campus();

    let report = InsertTaps::with_options(InsertTapsOptions::default().bridge_name("tapbr"))
        .run(&mut graph)
        .unwrap();

    let tap = graph.vertex(report.tapped[1].tap).unwrap();
    let mirror = tap.schedule().into_iter().find(|e| e.program == "ovs-vsctl").unwrap();
    assert_eq!(mirror.arguments.matches("add-port tapbr ").count(), 2);
    assert!(mirror.arguments.ends_with("set bridge tapbr mirrors=@m1002,@m1003"));
}

#[test]
fn bad_collector_aborts_run() {
    let (mut graph, _, _) = campus();
    let host5 = graph.find_vertex("host5").unwrap();
    let (edge, _) = graph.edges_of(host5).next().unwrap();
    graph.edge_mut(edge).unwrap().set_tap("nobody");

    let err = InsertTaps::new().run(&mut graph).unwrap_err();
    assert!(matches!(err, Error::InvalidCollector(ref name) if name == "nobody"), "{err}");

    // Edges processed before the failure stay tapped.
    assert!(graph.find_vertex("tap-host0").is_ok());
    assert!(graph.find_vertex("tap-host4").is_ok());
    assert!(graph.find_vertex("tap-host5").is_err());
}

#[test]
fn router_with_two_tapped_links() {
    let mut graph = Graph::new();
    let s1 = graph.add_decorated("s1", Capability::Switch).unwrap();
    let s2 = graph.add_decorated("s2", Capability::Switch).unwrap();
    let router = graph.add_decorated("router", Capability::VmEndpoint).unwrap();
    graph.add_decorated("bro", Capability::VmEndpoint).unwrap();

    for (switch, address) in [(s1, Ipv4Addr::new(10, 0, 0, 1)), (s2, Ipv4Addr::new(10, 0, 1, 1))] {
        let (_, edge) = graph.connect(router, switch, address, MASK24).unwrap();
        graph.edge_mut(edge).unwrap().set_tap("bro");
    }
    let vertices = graph.vertex_count();

    let report = InsertTaps::new().run(&mut graph).unwrap();

    assert_eq!(report.len(), 2);
    assert_eq!(graph.vertex_count(), vertices + 6);
    let taps: Vec<_> = report.iter().map(|t| graph.vertex(t.tap).unwrap().name()).collect();
    assert_eq!(taps, ["tap-router", "tap-router-1"]);
    assert_eq!(report.keys().collect::<Vec<_>>(), [1000, 1001]);

    // Each router interface ends on the tap switch of its own link.
    let vertex = graph.vertex(router).unwrap();
    for (name, tapped) in ["eth0", "eth1"].into_iter().zip(report.iter()) {
        let link = graph.edge(vertex.interface(name).unwrap().edge.unwrap()).unwrap();
        assert!(link.touches(tapped.tap_switch), "{name}");
    }
}
