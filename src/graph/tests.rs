//! Wire-shape tests with fragment fixtures as components emit them

use serde_json::{json, Value};

/// Fixture: a lookup feed fragment for one indicator
fn feed_fragment_fixture() -> Value {
    json!({
        "nodes": [
            {
                "uri": "class=attribute&key=domain&value=evil.test",
                "class": "attribute",
                "key": "domain",
                "value": "evil.test",
                "start_time": "2014-12-01T10:00:00Z"
            },
            {
                "uri": "class=attribute&key=malware&value=zeus",
                "class": "attribute",
                "key": "malware",
                "value": "zeus",
                "start_time": "2014-12-01T10:00:00Z",
                "finish_time": "2015-01-01T00:00:00Z",
                "family": "banker"
            }
        ],
        "edges": [
            {
                "source_uri": "class=attribute&key=domain&value=evil.test",
                "dest_uri": "class=attribute&key=malware&value=zeus",
                "relationship": "describedBy",
                "relationship_chain": ["nameserver"],
                "origin": "feed",
                "start_time": "2014-12-01T10:00:00Z",
                "uri": "stale"
            }
        ]
    })
}

/// Fixture: a query result node
fn query_node_fixture() -> Value {
    json!({
        "uri": "class=attribute&key=ip&value=10.0.0.1",
        "class": "attribute",
        "key": "ip",
        "value": "10.0.0.1",
        "start_time": "",
        "topic_distance": 2
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{canonical_node_key, Edge, Graph, Node, NodeUri, PropertyValue};

    #[test]
    fn node_uri_serializes_as_string() {
        let uri = canonical_node_key("attribute", "ip", "1.1.1.1");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"class=attribute&key=ip&value=1.1.1.1\"");

        let back: NodeUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
    }

    #[test]
    fn can_deserialize_feed_fragment_fixture() {
        let result: Result<Graph, _> = serde_json::from_value(feed_fragment_fixture());
        assert!(result.is_ok(), "Failed to deserialize fragment: {:?}", result.err());

        let graph = result.unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        let malware = graph
            .get_node(&canonical_node_key("attribute", "malware", "zeus"))
            .unwrap();
        assert!(malware.finish_time.is_some());
        assert_eq!(
            malware.properties.get("family"),
            Some(&PropertyValue::String("banker".into()))
        );

        let edge = graph.edges().next().unwrap();
        assert_eq!(edge.relationship_chain, vec!["nameserver".to_string()]);
        assert_eq!(edge.uri, edge.canonical_uri().unwrap());
    }

    #[test]
    fn empty_start_time_is_unknown() {
        let node: Node = serde_json::from_value(query_node_fixture()).unwrap();
        assert_eq!(node.start_time, None);
        assert_eq!(node.topic_distance(), Some(2));
    }

    #[test]
    fn serialized_node_has_wire_structure() {
        let mut node = Node::attribute("ip", "10.0.0.1");
        node.set_topic_distance(1);
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["uri"], "class=attribute&key=ip&value=10.0.0.1");
        assert_eq!(json["class"], "attribute");
        assert_eq!(json["key"], "ip");
        assert_eq!(json["value"], "10.0.0.1");
        assert_eq!(json["start_time"], "");
        assert!(json.get("finish_time").is_none());
        assert_eq!(json["topic_distance"], 1);
    }

    #[test]
    fn serialized_edge_has_wire_structure() {
        let a = Node::attribute("ip", "10.0.0.1");
        let b = Node::attribute("domain", "a.test");
        let edge = Edge::described_by(a.uri.clone(), b.uri.clone(), "feed");
        let json = serde_json::to_value(&edge).unwrap();

        assert_eq!(json["source_uri"], a.uri.as_str());
        assert_eq!(json["dest_uri"], b.uri.as_str());
        assert_eq!(json["relationship"], "describedBy");
        assert!(json.get("relationship_chain").is_none());
        assert_eq!(json["origin"], "feed");
        assert!(json["uri"].is_string());
    }

    #[test]
    fn serialized_graph_has_nodes_and_edges() {
        let graph: Graph = serde_json::from_value(feed_fragment_fixture()).unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(json["edges"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn cyclic_chain_in_fragment_is_rejected() {
        let mut fixture = feed_fragment_fixture();
        fixture["edges"][0]["relationship_chain"] = json!(["nameserver", "describedBy"]);
        let result: Result<Graph, _> = serde_json::from_value(fixture);
        assert!(result.is_err());
    }

    #[test]
    fn stale_node_uri_is_rederived() {
        let first = Node::attribute("ip", "1.1.1.1");
        let mut second = Node::attribute("ip", "2.2.2.2")
            .with_property("asn", PropertyValue::String("AS13335".into()));
        second.uri = first.uri.clone();

        let mut graph = Graph::new();
        assert!(graph.add_node(first));
        assert!(graph.add_node(second));

        let mut values: Vec<&str> = graph.nodes().map(|n| n.value.as_str()).collect();
        values.sort();
        assert_eq!(values, ["1.1.1.1", "2.2.2.2"]);
        let second = graph
            .get_node(&canonical_node_key("attribute", "ip", "2.2.2.2"))
            .unwrap();
        assert!(second.properties.contains_key("asn"));
    }

    #[test]
    fn fragment_node_with_stale_uri_is_rekeyed() {
        let mut fixture = feed_fragment_fixture();
        fixture["nodes"][1]["uri"] = json!("class=attribute&key=domain&value=evil.test");
        let graph: Graph = serde_json::from_value(fixture).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.contains_node(&canonical_node_key("attribute", "malware", "zeus")));
    }

    #[test]
    fn legacy_relationship_name_is_normalized() {
        let canonical: Graph = serde_json::from_value(feed_fragment_fixture()).unwrap();

        let mut fixture = feed_fragment_fixture();
        fixture["edges"][0]["relationship"] = json!("described_by");
        let legacy: Graph = serde_json::from_value(fixture).unwrap();

        let edge = legacy.edges().next().unwrap();
        assert_eq!(edge.relationship, "describedBy");
        assert_eq!(edge.categories().collect::<Vec<_>>(), ["describedBy", "nameserver"]);
        assert_eq!(edge.uri, canonical.edges().next().unwrap().uri);

        let out = serde_json::to_value(&legacy).unwrap();
        assert_eq!(out["edges"][0]["relationship"], json!("describedBy"));
    }
}
