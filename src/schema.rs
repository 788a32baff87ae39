//! The schema document and its validated graph form.
//!
//! A problem definition declares three collections: `resources`, `scripts`,
//! and `executions`.  Parsing is order-independent (forward references are
//! legal) and total: either every reference resolves and the execution
//! graph is acyclic, or parsing fails with a [SchemaError] and no partial
//! graph is exposed.

use crate::error::{Result, SchemaError};
use crate::verdict::{Outcome, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An immutable text artifact with content known at definition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFile {
    pub name: String,
    pub content: String,
}

/// A text artifact whose content is supplied when the pipeline starts
/// (e.g. the submitted source code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeTextFile {
    pub name: String,
}

/// Writable scratch space for whichever execution is given it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyDirectory {
    pub name: String,
}

/// A named artifact available to executions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    TextFile(TextFile),
    RuntimeTextFile(RuntimeTextFile),
    EmptyDirectory(EmptyDirectory),
}

impl ResourceKind {
    pub fn name(&self) -> &str {
        match self {
            Self::TextFile(r) => &r.name,
            Self::RuntimeTextFile(r) => &r.name,
            Self::EmptyDirectory(r) => &r.name,
        }
    }
}

/// A named unit of executable logic (build, run, or check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub content: String,
}

/// One labeled dependency edge: the path of `ref_to` is exported to the
/// script under the environment variable `envvar_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub ref_to: String,
    pub envvar_name: String,
}

/// A node that runs a script against its resolved dependencies.
///
/// The dependency list is an ordered sequence; its declaration order is
/// part of the schema, not an accident of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub name: String,
    pub script_name: String,
    pub dependencies: Vec<Dependency>,
}

/// The raw schema document as serialized on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub resources: Vec<ResourceKind>,
    pub scripts: Vec<Script>,
    pub executions: Vec<Execution>,
}

/// What a name denotes, for annotation consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    StaticText,
    RuntimeText,
    EmptyDirectory,
    Script,
    Execution,
}

#[derive(Debug, Clone, Copy)]
enum NodeRef {
    Resource(usize),
    Script(usize),
    Execution(usize),
}

/// One labeled edge of the graph, for an external renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub label: &'a str,
}

/// Label of the implicit script edge into every execution.
pub const SCRIPT_EDGE_LABEL: &str = "script";

/// A validated schema: every reference resolves, all names are unique,
/// and the execution graph is acyclic.
#[derive(Debug, Clone)]
pub struct Graph {
    schema: Schema,
    index: HashMap<String, NodeRef>,
    topo: Vec<String>,
}

/// Node names become path components under the work directory, so they
/// must never escape it.
pub(crate) fn check_name(name: &str) -> std::result::Result<(), SchemaError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.chars().any(|c| c == '/' || c == '\\' || c == '\0');
    if plain {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_owned()))
    }
}

impl Graph {
    /// Parse a JSON schema document and validate it.
    pub fn parse(json: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        Ok(Self::from_schema(schema)?)
    }

    /// Validate an already-deserialized schema document.
    pub fn from_schema(schema: Schema) -> std::result::Result<Self, SchemaError> {
        // First pass: collect every declared name, rejecting duplicates.
        let mut index = HashMap::new();
        let mut declare = |name: &str, node| {
            check_name(name)?;
            match index.insert(name.to_owned(), node) {
                None => Ok(()),
                Some(_) => Err(SchemaError::DuplicateName(name.to_owned())),
            }
        };
        for (i, r) in schema.resources.iter().enumerate() {
            declare(r.name(), NodeRef::Resource(i))?;
        }
        for (i, s) in schema.scripts.iter().enumerate() {
            declare(&s.name, NodeRef::Script(i))?;
        }
        for (i, e) in schema.executions.iter().enumerate() {
            declare(&e.name, NodeRef::Execution(i))?;
        }

        // Second pass: every reference must resolve, so declaration order
        // never matters to the caller.
        for e in &schema.executions {
            match index.get(&e.script_name) {
                Some(NodeRef::Script(_)) => {}
                Some(_) => {
                    return Err(SchemaError::NotAScript {
                        referrer: e.name.clone(),
                        target: e.script_name.clone(),
                    })
                }
                None => {
                    return Err(SchemaError::UndeclaredReference {
                        referrer: e.name.clone(),
                        target: e.script_name.clone(),
                    })
                }
            }
            for dep in &e.dependencies {
                if !index.contains_key(&dep.ref_to) {
                    return Err(SchemaError::UndeclaredReference {
                        referrer: e.name.clone(),
                        target: dep.ref_to.clone(),
                    });
                }
            }
        }

        let topo = topological_order(&schema, &index)?;
        Ok(Self {
            schema,
            index,
            topo,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn node_kind(&self, name: &str) -> Option<NodeKind> {
        Some(match self.index.get(name)? {
            NodeRef::Resource(i) => match self.schema.resources[*i] {
                ResourceKind::TextFile(_) => NodeKind::StaticText,
                ResourceKind::RuntimeTextFile(_) => NodeKind::RuntimeText,
                ResourceKind::EmptyDirectory(_) => NodeKind::EmptyDirectory,
            },
            NodeRef::Script(_) => NodeKind::Script,
            NodeRef::Execution(_) => NodeKind::Execution,
        })
    }

    pub fn execution(&self, name: &str) -> Option<&Execution> {
        match self.index.get(name)? {
            NodeRef::Execution(i) => Some(&self.schema.executions[*i]),
            _ => None,
        }
    }

    /// Direct predecessors of an execution, in dependency declaration
    /// order, with the script reference last.
    pub fn predecessors(&self, name: &str) -> Option<Vec<&str>> {
        let e = self.execution(name)?;
        let mut pred: Vec<&str> = e.dependencies.iter().map(|d| d.ref_to.as_str()).collect();
        pred.push(e.script_name.as_str());
        Some(pred)
    }

    /// Execution names in a deterministic scheduling order: every node
    /// appears after all executions it depends on.
    pub fn topological_order(&self) -> &[String] {
        &self.topo
    }

    /// All labeled edges, for an external renderer: one edge per declared
    /// dependency plus one `script` edge per execution.
    pub fn edges(&self) -> Vec<Edge<'_>> {
        let mut edges = Vec::new();
        for e in &self.schema.executions {
            for dep in &e.dependencies {
                edges.push(Edge {
                    from: &dep.ref_to,
                    to: &e.name,
                    label: &dep.envvar_name,
                });
            }
            edges.push(Edge {
                from: &e.script_name,
                to: &e.name,
                label: SCRIPT_EDGE_LABEL,
            });
        }
        edges
    }

    /// The verdict of an execution node under a computed outcome map, or
    /// `None` for non-execution nodes and nodes without an outcome yet.
    /// Styling from the verdict is the renderer's concern, not ours.
    pub fn verdict_of(&self, outcomes: &HashMap<String, Outcome>, name: &str) -> Option<Verdict> {
        self.execution(name)?;
        outcomes.get(name).map(Outcome::verdict)
    }
}

/// Deterministic topological order of the executions (declaration order
/// among simultaneously-ready nodes), or the name of a node on a cycle.
fn topological_order(
    schema: &Schema,
    index: &HashMap<String, NodeRef>,
) -> std::result::Result<Vec<String>, SchemaError> {
    // Only execution-to-execution edges constrain scheduling; resources
    // and scripts are materialized before anything runs.
    let exec_index = |name: &str| match index.get(name) {
        Some(NodeRef::Execution(i)) => Some(*i),
        _ => None,
    };
    let n = schema.executions.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, e) in schema.executions.iter().enumerate() {
        for dep in &e.dependencies {
            if let Some(j) = exec_index(&dep.ref_to) {
                indegree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    // Keep declaration order stable: take the lowest-index ready node.
    while let Some(&i) = ready.first() {
        ready.remove(0);
        order.push(schema.executions[i].name.clone());
        for &j in &dependents[i] {
            indegree[j] -= 1;
            if indegree[j] == 0 {
                let pos = ready.partition_point(|&k| k < j);
                ready.insert(pos, j);
            }
        }
    }
    if order.len() < n {
        // Some node kept a positive indegree.  Walk backwards through
        // stuck predecessors until one repeats: that node is on a cycle.
        let stuck = (0..n).find(|&i| indegree[i] > 0).unwrap_or(0);
        let mut seen = vec![false; n];
        let mut at = stuck;
        while !seen[at] {
            seen[at] = true;
            at = schema.executions[at]
                .dependencies
                .iter()
                .filter_map(|d| exec_index(&d.ref_to))
                .find(|&j| indegree[j] > 0)
                .unwrap_or(at);
        }
        return Err(SchemaError::CyclicDependency(
            schema.executions[at].name.clone(),
        ));
    }
    Ok(order)
}
