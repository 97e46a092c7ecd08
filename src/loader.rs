use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{error, info, warn};

use crate::condition::{CheckResult, ParamState};
use crate::config::ConfigNode;
use crate::error::{ExprError, LoadError};
use crate::evaluator::EvalContext;
use crate::factory::{requirements_met, Behaviour, FactoryRegistry, LoadContext, Parameter, ParameterFactory, RequirementNode};
use crate::registry::TypeRegistry;
use crate::sim::{CelestialBody, SimState};
use crate::value::Value;

/// A fully-loaded contract template: identity fields resolved at load
/// time, plus the validated requirement tree and parameter/behaviour
/// factories used to stamp out contract instances.
///
/// Identity fields (name, title, target body) are evaluated exactly once
/// here, so a non-deterministic expression cannot give the same contract
/// type two different identities. Description-style display text is
/// re-rendered on demand instead.
pub struct ContractType {
    pub name: String,
    pub group: Option<String>,
    pub title: String,
    pub description: String,
    pub target_body: Option<CelestialBody>,
    pub enabled: bool,
    context: EvalContext,
    requirements: Vec<RequirementNode>,
    parameter_factories: Vec<Box<dyn ParameterFactory>>,
    behaviours: Vec<Box<dyn Behaviour>>,
}

impl ContractType {
    /// Load and validate one CONTRACT_TYPE node. Any invalid field,
    /// unknown tag, or malformed expression fails the whole node.
    pub fn load(
        node: &ConfigNode,
        factories: &FactoryRegistry,
        registry: &TypeRegistry,
    ) -> Result<Self, LoadError> {
        let name = node.require_value("name")?.to_string();

        let mut ctx = EvalContext::new();
        ctx.set("contractType", Value::String(name.clone()));

        // targetBody resolves first; every later field sees it as
        // @targetBody.
        let target_body: Option<CelestialBody> = if node.has_value("targetBody") {
            Some(node.expression_field("targetBody", registry, &ctx)?)
        } else {
            None
        };
        if let Some(body) = &target_body {
            ctx.set("targetBody", Value::Object(Rc::new(body.clone())));
        }

        let title = node
            .template_field("title", registry, &ctx)?
            .unwrap_or_else(|| name.clone());
        let description = node
            .template_field("description", registry, &ctx)?
            .unwrap_or_default();

        let lctx = LoadContext {
            registry,
            ctx: &ctx,
        };

        let mut requirements = Vec::new();
        for child in node.children_named("REQUIREMENT") {
            requirements.push(factories.generate_requirement(child, &lctx)?);
        }

        let mut parameter_factories = Vec::new();
        for child in node.children_named("PARAMETER") {
            parameter_factories.push(factories.generate_parameter_factory(child, &lctx)?);
        }

        let mut behaviours = Vec::new();
        for child in node.children_named("BEHAVIOUR") {
            behaviours.push(factories.generate_behaviour(child, &lctx)?);
        }

        Ok(ContractType {
            name,
            group: node.get_value("group").map(str::to_string),
            title,
            description,
            target_body,
            enabled: node.parse_plain_or("enabled", true)?,
            context: ctx,
            requirements,
            parameter_factories,
            behaviours,
        })
    }

    /// Whether the contract may currently be offered.
    pub fn meets_requirements(&self, sim: &SimState) -> bool {
        self.enabled && requirements_met(&self.requirements, sim)
    }

    /// Stamp out a fresh contract instance.
    pub fn generate(&self) -> Contract {
        Contract {
            contract_type: self.name.clone(),
            title: self.title.clone(),
            parameters: self.parameter_factories.iter().map(|f| f.generate()).collect(),
        }
    }

    /// Fire accept-time behaviours, collecting any display text.
    pub fn fire_accepted(&self, registry: &TypeRegistry) -> Result<Vec<String>, ExprError> {
        let mut messages = Vec::new();
        for behaviour in &self.behaviours {
            if let Some(text) = behaviour.on_accepted(registry, &self.context)? {
                messages.push(text);
            }
        }
        Ok(messages)
    }
}

/// A live contract: generated parameters plus the identity of the type
/// that produced it.
pub struct Contract {
    pub contract_type: String,
    pub title: String,
    pub parameters: Vec<Box<dyn Parameter>>,
}

impl Contract {
    /// Check every parameter against the snapshot and fold the results:
    /// any failure fails the contract, full completion completes it.
    pub fn check(&mut self, sim: &SimState, check_only: bool) -> (ParamState, bool) {
        let mut changed = false;
        let mut all_met = true;
        for parameter in &mut self.parameters {
            let CheckResult { met, changed: c } = parameter.check(sim, check_only);
            changed |= c;
            all_met &= met;
        }

        let failed = self
            .parameters
            .iter()
            .any(|p| p.state() == ParamState::Failed);

        let state = if failed {
            ParamState::Failed
        } else if all_met && !self.parameters.is_empty() {
            ParamState::Complete
        } else {
            ParamState::Incomplete
        };
        (state, changed)
    }

    /// Persist the contract's parameter states for a later session.
    pub fn save(&self) -> ConfigNode {
        let mut node = ConfigNode::new("CONTRACT");
        node.add_value("type", &self.contract_type);
        for parameter in &self.parameters {
            let mut child = ConfigNode::new("PARAM");
            parameter.save(&mut child);
            node.add_child(child);
        }
        node
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractGroup {
    pub name: String,
    pub agent: Option<String>,
}

/// Everything the loader produced from one configuration pass.
#[derive(Default)]
pub struct ContractDatabase {
    groups: HashMap<String, ContractGroup>,
    contract_types: Vec<ContractType>,
}

impl ContractDatabase {
    pub fn group(&self, name: &str) -> Option<&ContractGroup> {
        self.groups.get(name)
    }

    pub fn contract_type(&self, name: &str) -> Option<&ContractType> {
        self.contract_types.iter().find(|t| t.name == name)
    }

    pub fn contract_types(&self) -> &[ContractType] {
        &self.contract_types
    }
}

/// The stages of a configuration (re)load, advanced one unit of work at
/// a time so a large database never stalls the caller's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStep {
    ClearConfig,
    LoadGroups,
    LoadContracts,
    AdjustTypes,
    Done,
}

impl fmt::Display for ReloadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReloadStep::ClearConfig => "clearing configuration",
            ReloadStep::LoadGroups => "loading contract groups",
            ReloadStep::LoadContracts => "loading contract types",
            ReloadStep::AdjustTypes => "adjusting contract types",
            ReloadStep::Done => "done",
        };
        write!(f, "{}", text)
    }
}

/// Incremental contract database loader.
///
/// Each `step` call performs one unit of work (one contract type in the
/// LoadContracts stage). A node that fails to load is logged and skipped;
/// one bad definition never takes down the rest of the database.
pub struct Loader<'a> {
    registry: &'a TypeRegistry,
    factories: &'a FactoryRegistry,
    group_nodes: Vec<ConfigNode>,
    contract_nodes: Vec<ConfigNode>,
    step: ReloadStep,
    cursor: usize,
    attempted: usize,
    success: usize,
    database: ContractDatabase,
}

impl<'a> Loader<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        factories: &'a FactoryRegistry,
        nodes: Vec<ConfigNode>,
    ) -> Self {
        let (group_nodes, other): (Vec<_>, Vec<_>) = nodes
            .into_iter()
            .partition(|n| n.name() == "CONTRACT_GROUP");
        let contract_nodes = other
            .into_iter()
            .filter(|n| {
                if n.name() == "CONTRACT_TYPE" {
                    true
                } else {
                    warn!(node = %n.name(), "ignoring unrecognized top-level node");
                    false
                }
            })
            .collect();

        Loader {
            registry,
            factories,
            group_nodes,
            contract_nodes,
            step: ReloadStep::ClearConfig,
            cursor: 0,
            attempted: 0,
            success: 0,
            database: ContractDatabase::default(),
        }
    }

    pub fn current_step(&self) -> ReloadStep {
        self.step
    }

    /// (successfully loaded, attempted, total) contract type counts.
    pub fn progress(&self) -> (usize, usize, usize) {
        (self.success, self.attempted, self.contract_nodes.len())
    }

    pub fn database(&self) -> &ContractDatabase {
        &self.database
    }

    pub fn into_database(self) -> ContractDatabase {
        self.database
    }

    /// Perform one unit of work and return the stage now in effect.
    pub fn step(&mut self) -> ReloadStep {
        match self.step {
            ReloadStep::ClearConfig => {
                info!("clearing contract configuration");
                self.database = ContractDatabase::default();
                self.cursor = 0;
                self.attempted = 0;
                self.success = 0;
                self.step = ReloadStep::LoadGroups;
            }
            ReloadStep::LoadGroups => {
                for node in &self.group_nodes {
                    match node.require_value("name") {
                        Ok(name) => {
                            if self.database.groups.contains_key(name) {
                                error!(group = name, "duplicate contract group; keeping first");
                                continue;
                            }
                            self.database.groups.insert(
                                name.to_string(),
                                ContractGroup {
                                    name: name.to_string(),
                                    agent: node.get_value("agent").map(str::to_string),
                                },
                            );
                        }
                        Err(e) => error!(error = %e, "failed to load CONTRACT_GROUP"),
                    }
                }
                self.step = ReloadStep::LoadContracts;
            }
            ReloadStep::LoadContracts => match self.contract_nodes.get(self.cursor) {
                Some(node) => {
                    self.cursor += 1;
                    self.attempted += 1;
                    match ContractType::load(node, self.factories, self.registry) {
                        Ok(contract_type) => {
                            if self
                                .database
                                .contract_type(&contract_type.name)
                                .is_some()
                            {
                                let e = LoadError::DuplicateName(contract_type.name.clone());
                                error!(error = %e, "skipping CONTRACT_TYPE");
                            } else {
                                self.success += 1;
                                self.database.contract_types.push(contract_type);
                            }
                        }
                        Err(e) => {
                            let name = node.get_value("name").unwrap_or("<unnamed>");
                            error!(contract_type = name, error = %e, "failed to load CONTRACT_TYPE");
                        }
                    }
                }
                None => self.step = ReloadStep::AdjustTypes,
            },
            ReloadStep::AdjustTypes => {
                for contract_type in &mut self.database.contract_types {
                    if let Some(group) = &contract_type.group {
                        if !self.database.groups.contains_key(group) {
                            warn!(
                                contract_type = %contract_type.name,
                                group = %group,
                                "unknown contract group; disabling"
                            );
                            contract_type.enabled = false;
                        }
                    }
                }
                info!(
                    success = self.success,
                    attempted = self.attempted,
                    "contract configuration loaded"
                );
                self.step = ReloadStep::Done;
            }
            ReloadStep::Done => {}
        }
        self.step
    }

    /// Drive the load to completion in one call.
    pub fn run_to_completion(&mut self) {
        while self.step() != ReloadStep::Done {}
    }
}
