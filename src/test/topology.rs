use crate::Error;
use crate::net::{ChannelId, Connection, ConnectionManager, LinkId, NetworkState, NodeId, NodeKind};
use crate::topo::{StarOpts, build_star};

fn star(num_channels: usize) -> crate::topo::StarTopology {
    build_star(&StarOpts {
        num_endpoints: 4,
        ep_link_capacity: 10.0,
        num_channels,
    })
}

#[test]
fn star_has_hub_after_endpoints() {
    let s = star(1);
    assert_eq!(s.hub, NodeId(4));
    assert_eq!(s.endpoints, (0..4).map(NodeId).collect::<Vec<_>>());
    assert_eq!(s.topology.num_nodes(), 5);
    assert_eq!(s.topology.num_links(), 4);
    assert_eq!(s.topology.kind(s.hub), Some(NodeKind::Switch));
    assert_eq!(s.topology.name(NodeId(2)), Some("e2"));
    assert_eq!(s.topology.endpoints(), s.endpoints);
    assert_eq!(s.path(NodeId(0), NodeId(3)), vec![NodeId(0), NodeId(4), NodeId(3)]);
}

#[test]
fn star_capacities_scale_with_channels() {
    let s = star(2);
    assert_eq!(s.topology.endpoint_capacity(NodeId(0)), 20.0);
    assert_eq!(s.ep_link_rate_capacity(), 20.0);
    assert_eq!(s.network_rate_capacity(), 80.0);
    assert_eq!(s.topology.channels().count(), 2);
}

#[test]
fn path_capacity_is_the_bottleneck_link() {
    let s = star(1);
    let path = s.path(NodeId(1), NodeId(2));
    assert_eq!(s.topology.path_capacity(&path).expect("path"), 10.0);
    assert_eq!(s.topology.path_links(&path).expect("links").len(), 2);

    let err = s
        .topology
        .path_capacity(&[NodeId(1), NodeId(2)])
        .expect_err("no direct link");
    assert!(matches!(
        err,
        Error::InvalidPath {
            from: NodeId(1),
            to: NodeId(2)
        }
    ));
}

#[test]
fn establish_and_teardown_restore_capacity() {
    let s = star(1);
    let mut state = NetworkState::new(&s.topology);
    let mut mgr = ConnectionManager::new();
    let path = s.path(NodeId(0), NodeId(1));
    let conn = Connection::new(&s.topology, 0, None, 3.0, &path, ChannelId(0)).expect("conn");

    mgr.establish(&mut state, conn);
    assert_eq!(state.remaining(LinkId(0), ChannelId(0)), 7.0);
    assert_eq!(state.remaining(LinkId(1), ChannelId(0)), 7.0);
    assert_eq!(state.remaining(LinkId(2), ChannelId(0)), 10.0);
    assert_eq!(state.capacity_used, 6.0);
    assert_eq!(state.active_connections, 1);

    let conn = mgr.teardown(&mut state, (0, None)).expect("connected");
    assert_eq!(conn.flow_id, 0);
    assert_eq!(state.channels(LinkId(0)), &[10.0]);
    assert_eq!(state.capacity_used, 0.0);
    assert_eq!(state.active_connections, 0);
    assert!(mgr.teardown(&mut state, (0, None)).is_none());
}

#[test]
fn sync_only_touches_the_difference() {
    let s = star(1);
    let mut state = NetworkState::new(&s.topology);
    let mut mgr = ConnectionManager::new();
    let conn = |id: u64, src: usize, dst: usize| {
        Connection::new(
            &s.topology,
            id,
            None,
            1.0,
            &s.path(NodeId(src), NodeId(dst)),
            ChannelId(0),
        )
        .expect("conn")
    };

    let delta = mgr.sync(&mut state, vec![conn(0, 0, 1), conn(1, 2, 3)]);
    assert_eq!(delta.established, vec![(0, None), (1, None)]);
    assert!(delta.torn_down.is_empty());

    let delta = mgr.sync(&mut state, vec![conn(1, 2, 3), conn(2, 0, 2)]);
    assert_eq!(delta.established, vec![(2, None)]);
    assert_eq!(delta.torn_down, vec![(0, None)]);
    assert_eq!(mgr.len(), 2);
    assert_eq!(state.active_connections, 2);
    assert_eq!(state.remaining(LinkId(1), ChannelId(0)), 10.0);

    mgr.clear(&mut state);
    assert!(mgr.is_empty());
    assert_eq!(state.capacity_used, 0.0);
}

#[test]
fn connection_on_missing_channel_is_rejected() {
    let s = star(2);
    let path = s.path(NodeId(0), NodeId(1));
    let err = Connection::new(&s.topology, 0, None, 1.0, &path, ChannelId(2)).expect_err("channel");
    assert!(matches!(
        err,
        Error::UnknownChannel {
            channel: ChannelId(2),
            num_channels: 2
        }
    ));
}
