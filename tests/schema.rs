use judge_pipeline::builder::SchemaBuilder;
use judge_pipeline::schema::{
    Dependency, EmptyDirectory, Execution, Graph, NodeKind, ResourceKind, RuntimeTextFile, Schema,
    Script, TextFile, SCRIPT_EDGE_LABEL,
};
use judge_pipeline::SchemaError;

fn text(name: &str) -> ResourceKind {
    ResourceKind::TextFile(TextFile {
        name: name.to_owned(),
        content: String::new(),
    })
}

fn script(name: &str) -> Script {
    Script {
        name: name.to_owned(),
        content: "#!/bin/sh\ntrue\n".to_owned(),
    }
}

fn execution(name: &str, script: &str, deps: &[(&str, &str)]) -> Execution {
    Execution {
        name: name.to_owned(),
        script_name: script.to_owned(),
        dependencies: deps
            .iter()
            .map(|(r, v)| Dependency {
                ref_to: (*r).to_owned(),
                envvar_name: (*v).to_owned(),
            })
            .collect(),
    }
}

/// Two testcases hanging off one build step, plus a summary node.
fn diamond() -> Schema {
    Schema {
        resources: vec![
            ResourceKind::RuntimeTextFile(RuntimeTextFile {
                name: "source".to_owned(),
            }),
            text("input_1"),
            text("input_2"),
            ResourceKind::EmptyDirectory(EmptyDirectory {
                name: "tmp".to_owned(),
            }),
        ],
        scripts: vec![script("build_sh"), script("run_sh"), script("sum_sh")],
        executions: vec![
            execution("build", "build_sh", &[("source", "SRC")]),
            execution("case_1", "run_sh", &[("build", "BUILD"), ("input_1", "IN")]),
            execution("case_2", "run_sh", &[("build", "BUILD"), ("input_2", "IN")]),
            execution(
                "summary",
                "sum_sh",
                &[("case_1", "R1"), ("case_2", "R2")],
            ),
        ],
    }
}

#[test]
fn parse_is_order_independent() {
    let mut permuted = diamond();
    permuted.executions.reverse();
    permuted.resources.reverse();
    permuted.scripts.reverse();

    // Forward references must resolve just the same.
    let a = Graph::from_schema(diamond()).unwrap();
    let b = Graph::from_schema(permuted).unwrap();
    for name in ["source", "build", "case_1", "summary", "run_sh"] {
        assert_eq!(a.node_kind(name), b.node_kind(name));
    }
    assert_eq!(
        a.predecessors("summary").unwrap(),
        b.predecessors("summary").unwrap()
    );
    assert_eq!(a.edges().len(), b.edges().len());
}

#[test]
fn topological_order_respects_dependencies() {
    let g = Graph::from_schema(diamond()).unwrap();
    let order = g.topological_order();
    let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
    assert!(pos("build") < pos("case_1"));
    assert!(pos("build") < pos("case_2"));
    assert!(pos("case_1") < pos("summary"));
    assert!(pos("case_2") < pos("summary"));
    assert_eq!(order.len(), 4);
}

#[test]
fn predecessors_keep_declaration_order() {
    let g = Graph::from_schema(diamond()).unwrap();
    assert_eq!(
        g.predecessors("case_1").unwrap(),
        vec!["build", "input_1", "run_sh"]
    );
    assert_eq!(g.predecessors("input_1"), None);
}

#[test]
fn edges_carry_envvar_labels() {
    let g = Graph::from_schema(diamond()).unwrap();
    let edges = g.edges();
    assert!(edges
        .iter()
        .any(|e| e.from == "build" && e.to == "case_1" && e.label == "BUILD"));
    assert!(edges
        .iter()
        .any(|e| e.from == "run_sh" && e.to == "case_1" && e.label == SCRIPT_EDGE_LABEL));
}

#[test]
fn duplicate_names_are_rejected() {
    let mut s = diamond();
    s.scripts.push(script("build_sh"));
    match Graph::from_schema(s) {
        Err(SchemaError::DuplicateName(n)) => assert_eq!(n, "build_sh"),
        other => panic!("expected duplicate name error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn undeclared_references_are_rejected() {
    let mut s = diamond();
    s.executions[1].dependencies.push(Dependency {
        ref_to: "nonexistent".to_owned(),
        envvar_name: "X".to_owned(),
    });
    match Graph::from_schema(s) {
        Err(SchemaError::UndeclaredReference { referrer, target }) => {
            assert_eq!(referrer, "case_1");
            assert_eq!(target, "nonexistent");
        }
        other => panic!("expected undeclared reference, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn execution_script_must_be_a_script() {
    let mut s = diamond();
    s.executions[0].script_name = "input_1".to_owned();
    assert!(matches!(
        Graph::from_schema(s),
        Err(SchemaError::NotAScript { .. })
    ));
}

#[test]
fn cycles_are_rejected_naming_a_cycle_node() {
    let mut s = diamond();
    // build -> case_1 -> summary -> build closes a cycle.
    s.executions[0].dependencies.push(Dependency {
        ref_to: "summary".to_owned(),
        envvar_name: "LOOP".to_owned(),
    });
    match Graph::from_schema(s) {
        Err(SchemaError::CyclicDependency(node)) => {
            assert!(
                ["build", "case_1", "summary"].contains(&node.as_str()),
                "`{}` is not on the cycle",
                node
            );
        }
        other => panic!("expected cycle error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn names_must_stay_single_path_components() {
    // A name doubling as a relative path must never reach the scheduler,
    // which materializes nodes under the work directory by name.
    for bad in ["../../escaped-marker.txt", "a/b", "a\\b", "..", ".", ""] {
        let mut s = diamond();
        s.resources.push(text(bad));
        match Graph::from_schema(s) {
            Err(SchemaError::InvalidName(n)) => assert_eq!(n, bad),
            other => panic!(
                "`{}` accepted as a name, got {:?}",
                bad,
                other.map(|_| ())
            ),
        }
    }
    let mut b = SchemaBuilder::new();
    assert!(matches!(
        b.add_script(script("../run_sh")),
        Err(SchemaError::InvalidName(_))
    ));
}

#[test]
fn json_document_roundtrip() {
    let s = diamond();
    let json = serde_json::to_string(&s).unwrap();
    let g = Graph::parse(&json).unwrap();
    assert_eq!(*g.schema(), s);
    assert_eq!(g.node_kind("source"), Some(NodeKind::RuntimeText));
    assert_eq!(g.node_kind("tmp"), Some(NodeKind::EmptyDirectory));
    assert_eq!(g.node_kind("run_sh"), Some(NodeKind::Script));
    assert_eq!(g.node_kind("build"), Some(NodeKind::Execution));
    assert_eq!(g.node_kind("missing"), None);
}

#[test]
fn builder_checks_incrementally() {
    let mut b = SchemaBuilder::new();
    let src = b.add_resource(text("input")).unwrap();
    let sh = b.add_script(script("run_sh")).unwrap();
    assert!(matches!(
        b.add_execution(execution("case", "run_sh", &[("later", "X")])),
        Err(SchemaError::UndeclaredReference { .. })
    ));
    b.add_execution(execution("case", &sh, &[(&src, "IN")]))
        .unwrap();
    assert!(matches!(
        b.add_script(script("run_sh")),
        Err(SchemaError::DuplicateName(_))
    ));
    let g = b.build().unwrap();
    assert_eq!(g.topological_order(), ["case".to_owned()]);
}
