//! Text fixtures

/// Small model: input, two dense layers and a summary
pub const SMALL_GRAPH: &str = r#"node {
  name: "input"
  op: "Placeholder"
  attr {
    key: "dtype"
    value {
      type: DT_FLOAT
    }
  }
}
node {
  name: "dense_1/kernel"
  op: "Const"
}
node {
  name: "dense_1/MatMul"
  op: "MatMul"
  input: "input"
  input: "dense_1/kernel"
  device: "/device:CPU:0"
  attr {
    key: "_output_shapes"
    value {
      list {
        shape {
          dim {
            size: -1
          }
          dim {
            size: 64
          }
        }
      }
    }
  }
}
node {
  name: "dense_2/MatMul"
  op: "MatMul"
  input: "dense_1/MatMul"
  input: "^input"
  device: "/device:GPU:0"
}
node {
  name: "loss"
  op: "ScalarSummary"
  input: "dense_2/MatMul"
}
versions {
  producer: 27
}
"#;

/// Run metadata for [`SMALL_GRAPH`]
pub const SMALL_STATS: &str = r#"step_stats {
  dev_stats {
    device: "/device:CPU:0"
    node_stats {
      node_name: "dense_1/MatMul"
      all_start_micros: 100
      all_end_rel_micros: 40
      memory {
        total_bytes: 1024
      }
    }
  }
  dev_stats {
    device: "/device:GPU:0"
    node_stats {
      node_name: "dense_2/MatMul"
      all_start_micros: 150
      all_end_rel_micros: 10
    }
  }
}
"#;
