//! Build plan generation.
//!
//! A BuildPlan describes every step needed to build a cross-toolchain, in an
//! order where each step's dependencies come first. Steps are opaque shell
//! commands (via ninja rules) that touch a marker file on success, so an
//! executor can skip steps whose outputs already exist.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;
use crate::core::libc::LibC;
use crate::core::triple::TargetTriple;

/// Directory variable holding step marker files.
pub const TARGETS_DIR: &str = "$build_targets_dir";

/// Toolchain stage a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Fetch,
    Binutils,
    Sysroot,
    Stage1Compiler,
    KernelHeaders,
    LibcHeaders,
    LibcStartup,
    Libgcc,
    Libc,
    Stage2Compiler,
    Clean,
    Install,
}

impl Stage {
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Fetch => "download, extract and patch archives",
            Stage::Binutils => "build binutils",
            Stage::Sysroot => "create build sysroot dir",
            Stage::Stage1Compiler => "build stage-1 gcc (all-gcc)",
            Stage::KernelHeaders => "install linux headers",
            Stage::LibcHeaders => "install libc headers",
            Stage::LibcStartup => "build libc startup files",
            Stage::Libgcc => "build gcc (all-target-libgcc)",
            Stage::Libc => "build target libc",
            Stage::Stage2Compiler => "build stage-2 gcc",
            Stage::Clean => "clean targets",
            Stage::Install => "install targets",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A named command template shared by one or more steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub command: String,
    pub description: String,
}

/// A global variable binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

/// Variables written together, separated from the next group by a blank line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableGroup {
    /// Comment written above the group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub variables: Vec<Variable>,
}

impl VariableGroup {
    pub fn new() -> Self {
        VariableGroup::default()
    }

    pub fn with_comment(comment: impl Into<String>) -> Self {
        VariableGroup {
            comment: Some(comment.into()),
            variables: Vec::new(),
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push(Variable {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// A single step of the toolchain build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Unique step name
    pub name: String,

    /// Stage this step belongs to
    pub stage: Stage,

    /// Rule that runs the step
    pub rule: String,

    /// Names of steps that must complete first
    pub deps: Vec<String>,

    /// Explicit inputs (`$in`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,

    /// Output marker path (`$out`)
    pub output: String,

    /// Ninja pool, `console` for long-running steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,

    /// Per-step variable bindings
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, String>,
}

impl BuildStep {
    /// Create a step whose rule shares its name and whose output is the
    /// marker file `$build_targets_dir/<name>`.
    pub fn new(name: impl Into<String>, stage: Stage) -> Self {
        let name = name.into();
        BuildStep {
            rule: name.clone(),
            output: format!("{}/{}", TARGETS_DIR, name),
            name,
            stage,
            deps: Vec::new(),
            inputs: Vec::new(),
            pool: None,
            bindings: BTreeMap::new(),
        }
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    pub fn dep(mut self, dep: impl Into<String>) -> Self {
        self.deps.push(dep.into());
        self
    }

    pub fn deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Run in the `console` pool: serialized, with direct terminal output.
    pub fn console(mut self) -> Self {
        self.pool = Some("console".to_string());
        self
    }

    pub fn bind(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(key.into(), value.into());
        self
    }
}

/// A complete, ordered toolchain build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Target triple the plan builds a toolchain for
    pub target: TargetTriple,

    /// Target C library
    pub libc: LibC,

    /// Global variables
    pub variables: Vec<VariableGroup>,

    /// Rules in declaration order
    pub rules: Vec<Rule>,

    /// All build steps in a valid topological order
    pub steps: Vec<BuildStep>,

    /// Steps built when the executor runs without explicit targets
    pub defaults: Vec<String>,
}

impl BuildPlan {
    pub fn step(&self, name: &str) -> Option<&BuildStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Position of a step in execution order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether every step comes after all of its dependencies.
    pub fn is_topologically_ordered(&self) -> bool {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !step.deps.iter().all(|d| seen.contains(d.as_str())) {
                return false;
            }
            seen.insert(step.name.as_str());
        }
        true
    }
}

/// Collects rules, steps and variables in declaration order, then orders them.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    variables: Vec<VariableGroup>,
    rules: Vec<Rule>,
    steps: Vec<BuildStep>,
    defaults: Vec<String>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        PlanBuilder::default()
    }

    pub fn variables(&mut self, group: VariableGroup) {
        if !group.variables.is_empty() {
            self.variables.push(group);
        }
    }

    /// Declare a rule. Redeclaring a rule name keeps the first declaration.
    pub fn rule(
        &mut self,
        name: impl Into<String>,
        command: impl Into<String>,
        description: impl Into<String>,
    ) {
        let name = name.into();
        if self.rules.iter().any(|r| r.name == name) {
            return;
        }
        self.rules.push(Rule {
            name,
            command: command.into(),
            description: description.into(),
        });
    }

    pub fn step(&mut self, step: BuildStep) {
        self.steps.push(step);
    }

    pub fn add_default(&mut self, name: impl Into<String>) {
        self.defaults.push(name.into());
    }

    /// Validate the declared graph and order it.
    pub fn finish(self, target: TargetTriple, libc: LibC) -> Result<BuildPlan, ConfigError> {
        for step in &self.steps {
            if !self.rules.iter().any(|r| r.name == step.rule) {
                return Err(ConfigError::UnknownRule {
                    step: step.name.clone(),
                    rule: step.rule.clone(),
                });
            }
        }

        let order = topological_order(&self.steps)?;

        for name in &self.defaults {
            if !self.steps.iter().any(|s| &s.name == name) {
                return Err(ConfigError::UnknownDependency {
                    step: "default".to_string(),
                    dependency: name.clone(),
                });
            }
        }

        let mut slots: Vec<Option<BuildStep>> = self.steps.into_iter().map(Some).collect();
        let steps = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        Ok(BuildPlan {
            target,
            libc,
            variables: self.variables,
            rules: self.rules,
            steps,
            defaults: self.defaults,
        })
    }
}

/// Order steps so dependencies come first.
///
/// Kahn's algorithm where the ready step with the lowest declaration index
/// always goes next, so the same declarations always give the same order.
/// Returns declaration indices.
pub fn topological_order(steps: &[BuildStep]) -> Result<Vec<usize>, ConfigError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(steps.len(), steps.len() * 2);
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for (i, step) in steps.iter().enumerate() {
        let node = graph.add_node(i);
        if index.insert(step.name.as_str(), node).is_some() {
            return Err(ConfigError::DuplicateStep {
                step: step.name.clone(),
            });
        }
    }

    for step in steps {
        let to = index[step.name.as_str()];
        for dep in &step.deps {
            let from = index
                .get(dep.as_str())
                .ok_or_else(|| ConfigError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                })?;
            graph.update_edge(*from, to, ());
        }
    }

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .map(|n| Reverse(graph[n]))
        .collect();

    let mut order = Vec::with_capacity(steps.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for next in graph.neighbors_directed(NodeIndex::new(i), Direction::Outgoing) {
            let d = &mut in_degree[next.index()];
            *d -= 1;
            if *d == 0 {
                ready.push(Reverse(graph[next]));
            }
        }
    }

    if order.len() < steps.len() {
        return Err(ConfigError::DependencyCycle {
            steps: find_cycle(&graph, steps),
        });
    }

    Ok(order)
}

fn find_cycle(graph: &DiGraph<usize, ()>, steps: &[BuildStep]) -> Vec<String> {
    let component = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .unwrap_or_default();

    let mut members: Vec<usize> = component.iter().map(|n| graph[*n]).collect();
    members.sort_unstable();

    let mut names: Vec<String> = members.iter().map(|i| steps[*i].name.clone()).collect();
    if let Some(first) = names.first().cloned() {
        names.push(first);
    }
    names
}
