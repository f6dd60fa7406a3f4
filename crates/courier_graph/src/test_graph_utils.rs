#[cfg(test)]
pub mod test_graph {
    use crate::{
        graph::{GraphModel, GraphModelBuilder},
        node::{NodeIdx, NodeKey},
    };

    /// Graph over string keys, nodes added in order of first appearance. Capacities
    /// equal weights.
    pub fn create_graph(
        undirected: &[(&str, &str, f64)],
        directed: &[(&str, &str, f64)],
    ) -> GraphModel {
        let mut builder = GraphModelBuilder::default();
        let mut keys: Vec<&str> = Vec::new();

        let edges = undirected
            .iter()
            .map(|edge| (edge, false))
            .chain(directed.iter().map(|edge| (edge, true)));

        for (&(from, to, weight), directed) in edges {
            for key in [from, to] {
                if !keys.contains(&key) {
                    keys.push(key);
                    builder.add_node(key, None).unwrap();
                }
            }

            builder.add_edge(from, to, weight, weight, directed).unwrap();
        }

        builder.build()
    }

    pub fn create_shortest_path_graph() -> GraphModel {
        create_graph(
            &[
                ("A", "B", 10.0),
                ("A", "C", 5.0),
                ("C", "D", 3.0),
                ("D", "B", 1.0),
                ("D", "E", 2.0),
            ],
            &[],
        )
    }

    /// Source S, sink T. `reversed` turns the A -> B arc into B -> A.
    pub fn create_flow_graph(reversed: bool) -> GraphModel {
        let cross = if reversed { ("B", "A", 2.0) } else { ("A", "B", 2.0) };

        create_graph(
            &[],
            &[
                ("S", "A", 10.0),
                ("S", "B", 5.0),
                ("A", "C", 8.0),
                cross,
                ("B", "C", 3.0),
                ("B", "D", 7.0),
                ("C", "T", 10.0),
                ("D", "T", 8.0),
            ],
        )
    }

    pub fn create_min_cut_graph() -> GraphModel {
        create_graph(
            &[
                ("A", "B", 10.0),
                ("A", "D", 15.0),
                ("B", "C", 5.0),
                ("B", "E", 20.0),
                ("C", "F", 10.0),
                ("D", "E", 8.0),
                ("E", "F", 12.0),
            ],
            &[],
        )
    }

    pub fn key_path(graph: &GraphModel, nodes: &[NodeIdx]) -> Vec<String> {
        nodes
            .iter()
            .map(|&node| match graph.node_key(node) {
                NodeKey::Name(name) => name.clone(),
                key => key.to_string(),
            })
            .collect()
    }
}
