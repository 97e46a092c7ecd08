use std::collections::HashMap;

use tracing::warn;

use crate::condition::{check_any, delegate_text, CheckResult, ConditionDelegate, ParamState};
use crate::config::ConfigNode;
use crate::error::{ExprError, LoadError};
use crate::evaluator::EvalContext;
use crate::registry::TypeRegistry;
use crate::sim::{CelestialBody, CrewMember, SimState};
use crate::template;

/// Everything a factory constructor needs at load time: the type registry
/// for expression fields and the contract-level evaluation context (which
/// carries `@targetBody` and friends).
pub struct LoadContext<'a> {
    pub registry: &'a TypeRegistry,
    pub ctx: &'a EvalContext,
}

/// A prerequisite gating whether a contract may be offered. Checked
/// against the progress snapshot; never mutates it.
pub trait Requirement {
    fn requirement_type(&self) -> &'static str;

    fn is_met(&self, sim: &SimState) -> bool;
}

/// A requirement plus its tree position: the inversion flag and any
/// nested child requirements, which are ANDed in with the node's own
/// check before inversion applies.
pub struct RequirementNode {
    req_type: String,
    invert: bool,
    check: Box<dyn Requirement>,
    children: Vec<RequirementNode>,
}

impl RequirementNode {
    pub fn requirement_type(&self) -> &str {
        &self.req_type
    }

    pub fn is_met(&self, sim: &SimState) -> bool {
        let met = self.check.is_met(sim) && self.children.iter().all(|c| c.is_met(sim));
        self.invert != met
    }
}

/// AND across top-level requirement nodes.
pub fn requirements_met(requirements: &[RequirementNode], sim: &SimState) -> bool {
    requirements.iter().all(|r| r.is_met(sim))
}

/// A live objective instance generated from a parameter factory. Holds
/// its own cached state; `check` recomputes it from the snapshot and
/// reports whether anything changed.
pub trait Parameter {
    fn title(&self) -> String;

    fn state(&self) -> ParamState;

    fn check(&mut self, sim: &SimState, check_only: bool) -> CheckResult;

    /// Persist round-trip state under the given node.
    fn save(&self, node: &mut ConfigNode);
}

/// Load-time validated template for a parameter. Parsed and checked once
/// per contract type; `generate` stamps out fresh instances per contract.
pub trait ParameterFactory {
    fn parameter_type(&self) -> &'static str;

    fn generate(&self) -> Box<dyn Parameter>;
}

/// A side effect attached to a contract's lifecycle.
pub trait Behaviour {
    fn behaviour_type(&self) -> &'static str;

    /// Fired when the contract is accepted. Returns display text to show
    /// the player, if any.
    fn on_accepted(
        &self,
        _registry: &TypeRegistry,
        _ctx: &EvalContext,
    ) -> Result<Option<String>, ExprError> {
        Ok(None)
    }
}

type RequirementCtor = Box<dyn Fn(&ConfigNode, &LoadContext) -> Result<Box<dyn Requirement>, LoadError>>;
type ParameterCtor =
    Box<dyn Fn(&ConfigNode, &LoadContext) -> Result<Box<dyn ParameterFactory>, LoadError>>;
type BehaviourCtor = Box<dyn Fn(&ConfigNode, &LoadContext) -> Result<Box<dyn Behaviour>, LoadError>>;

/// Tag-to-constructor tables for the three extensible node kinds. Each
/// config node names its constructor via a `type` value; an unknown tag
/// fails that node's load.
///
/// Duplicate tag registration logs an error and keeps the first
/// registrant, so a misbehaving extension cannot silently replace a
/// stock type.
#[derive(Default)]
pub struct FactoryRegistry {
    requirements: HashMap<String, RequirementCtor>,
    parameters: HashMap<String, ParameterCtor>,
    behaviours: HashMap<String, BehaviourCtor>,
}

impl FactoryRegistry {
    pub fn empty() -> Self {
        FactoryRegistry::default()
    }

    /// A registry with the stock requirement, parameter, and behaviour
    /// types installed.
    pub fn new() -> Self {
        let mut registry = FactoryRegistry::empty();

        registry.register_requirement("Funds", |node, lctx| {
            Ok(Box::new(FundsRequirement::load(node, lctx)?) as Box<dyn Requirement>)
        });
        registry.register_requirement("ReachedBody", |node, lctx| {
            Ok(Box::new(ReachedBodyRequirement::load(node, lctx)?) as Box<dyn Requirement>)
        });
        registry.register_requirement("Expression", |node, lctx| {
            Ok(Box::new(ExpressionRequirement::load(node, lctx)?) as Box<dyn Requirement>)
        });

        registry.register_parameter("HasCrew", |node, lctx| {
            Ok(Box::new(HasCrewFactory::load(node, lctx)?) as Box<dyn ParameterFactory>)
        });
        registry.register_parameter("ReachDestination", |node, lctx| {
            Ok(Box::new(ReachDestinationFactory::load(node, lctx)?) as Box<dyn ParameterFactory>)
        });

        registry.register_behaviour("Message", |node, lctx| {
            Ok(Box::new(MessageBehaviour::load(node, lctx)?) as Box<dyn Behaviour>)
        });

        registry
    }

    pub fn register_requirement<F>(&mut self, tag: &str, ctor: F)
    where
        F: Fn(&ConfigNode, &LoadContext) -> Result<Box<dyn Requirement>, LoadError> + 'static,
    {
        if self.requirements.contains_key(tag) {
            warn!(tag, "duplicate requirement type registration ignored");
            return;
        }
        self.requirements.insert(tag.to_string(), Box::new(ctor));
    }

    pub fn register_parameter<F>(&mut self, tag: &str, ctor: F)
    where
        F: Fn(&ConfigNode, &LoadContext) -> Result<Box<dyn ParameterFactory>, LoadError> + 'static,
    {
        if self.parameters.contains_key(tag) {
            warn!(tag, "duplicate parameter type registration ignored");
            return;
        }
        self.parameters.insert(tag.to_string(), Box::new(ctor));
    }

    pub fn register_behaviour<F>(&mut self, tag: &str, ctor: F)
    where
        F: Fn(&ConfigNode, &LoadContext) -> Result<Box<dyn Behaviour>, LoadError> + 'static,
    {
        if self.behaviours.contains_key(tag) {
            warn!(tag, "duplicate behaviour type registration ignored");
            return;
        }
        self.behaviours.insert(tag.to_string(), Box::new(ctor));
    }

    /// Build a requirement node (and its nested REQUIREMENT children)
    /// from config. Fails on an unknown `type` tag or a child failure,
    /// so a partially-valid requirement tree is never half-loaded.
    pub fn generate_requirement(
        &self,
        node: &ConfigNode,
        lctx: &LoadContext,
    ) -> Result<RequirementNode, LoadError> {
        let tag = node.require_value("type")?;
        let ctor = self
            .requirements
            .get(tag)
            .ok_or_else(|| LoadError::UnknownTag {
                kind: "requirement",
                tag: tag.to_string(),
            })?;

        let check = ctor(node, lctx)?;
        let invert = node.parse_plain_or("invertRequirement", false)?;

        let mut children = Vec::new();
        for child in node.children_named("REQUIREMENT") {
            children.push(self.generate_requirement(child, lctx)?);
        }

        Ok(RequirementNode {
            req_type: tag.to_string(),
            invert,
            check,
            children,
        })
    }

    pub fn generate_parameter_factory(
        &self,
        node: &ConfigNode,
        lctx: &LoadContext,
    ) -> Result<Box<dyn ParameterFactory>, LoadError> {
        let tag = node.require_value("type")?;
        let ctor = self
            .parameters
            .get(tag)
            .ok_or_else(|| LoadError::UnknownTag {
                kind: "parameter",
                tag: tag.to_string(),
            })?;
        ctor(node, lctx)
    }

    pub fn generate_behaviour(
        &self,
        node: &ConfigNode,
        lctx: &LoadContext,
    ) -> Result<Box<dyn Behaviour>, LoadError> {
        let tag = node.require_value("type")?;
        let ctor = self
            .behaviours
            .get(tag)
            .ok_or_else(|| LoadError::UnknownTag {
                kind: "behaviour",
                tag: tag.to_string(),
            })?;
        ctor(node, lctx)
    }
}

// ----- stock requirements -----------------------------------------------

struct FundsRequirement {
    min_funds: f64,
}

impl FundsRequirement {
    fn load(node: &ConfigNode, lctx: &LoadContext) -> Result<Self, LoadError> {
        Ok(FundsRequirement {
            min_funds: node.expression_field("minFunds", lctx.registry, lctx.ctx)?,
        })
    }
}

impl Requirement for FundsRequirement {
    fn requirement_type(&self) -> &'static str {
        "Funds"
    }

    fn is_met(&self, sim: &SimState) -> bool {
        sim.funds >= self.min_funds
    }
}

struct ReachedBodyRequirement {
    body: CelestialBody,
}

impl ReachedBodyRequirement {
    fn load(node: &ConfigNode, lctx: &LoadContext) -> Result<Self, LoadError> {
        Ok(ReachedBodyRequirement {
            body: target_body_field(node, lctx)?,
        })
    }
}

impl Requirement for ReachedBodyRequirement {
    fn requirement_type(&self) -> &'static str {
        "ReachedBody"
    }

    fn is_met(&self, sim: &SimState) -> bool {
        sim.has_reached(&self.body.name)
    }
}

/// A boolean expression evaluated once against the load-time context.
struct ExpressionRequirement {
    met: bool,
}

impl ExpressionRequirement {
    fn load(node: &ConfigNode, lctx: &LoadContext) -> Result<Self, LoadError> {
        Ok(ExpressionRequirement {
            met: node.expression_field("expression", lctx.registry, lctx.ctx)?,
        })
    }
}

impl Requirement for ExpressionRequirement {
    fn requirement_type(&self) -> &'static str {
        "Expression"
    }

    fn is_met(&self, _sim: &SimState) -> bool {
        self.met
    }
}

/// `targetBody` field with fallback to the contract-level `@targetBody`.
fn target_body_field(node: &ConfigNode, lctx: &LoadContext) -> Result<CelestialBody, LoadError> {
    if node.has_value("targetBody") {
        return node.expression_field("targetBody", lctx.registry, lctx.ctx);
    }
    match lctx.ctx.get("targetBody") {
        Some(value) => {
            value
                .as_object::<CelestialBody>()
                .cloned()
                .map_err(|e| LoadError::InvalidValue {
                    field: "targetBody".to_string(),
                    value: value.type_name().to_string(),
                    message: e.to_string(),
                })
        }
        None => Err(LoadError::MissingField {
            field: "targetBody".to_string(),
            node: node.name().to_string(),
        }),
    }
}

// ----- stock parameters --------------------------------------------------

struct HasCrewFactory {
    title: Option<String>,
    min_crew: usize,
    max_crew: usize,
    role: Option<String>,
}

impl HasCrewFactory {
    fn load(node: &ConfigNode, lctx: &LoadContext) -> Result<Self, LoadError> {
        let min_crew: usize = node.parse_plain_or("minCrew", 1)?;
        let max_crew: usize = node.parse_plain_or("maxCrew", usize::MAX)?;
        if min_crew > max_crew {
            return Err(LoadError::InvalidValue {
                field: "minCrew".to_string(),
                value: min_crew.to_string(),
                message: "minCrew is greater than maxCrew".to_string(),
            });
        }
        Ok(HasCrewFactory {
            title: node.template_field("title", lctx.registry, lctx.ctx)?,
            min_crew,
            max_crew,
            role: node.get_value("trait").map(str::to_string),
        })
    }
}

impl ParameterFactory for HasCrewFactory {
    fn parameter_type(&self) -> &'static str {
        "HasCrew"
    }

    fn generate(&self) -> Box<dyn Parameter> {
        let mut delegates = Vec::new();
        if let Some(role) = &self.role {
            let wanted = role.clone();
            delegates.push(ConditionDelegate::new(
                format!("Trait: {}", role),
                move |member: &CrewMember| member.role == wanted,
            ));
        }
        delegates.push(ConditionDelegate::count(self.min_crew, self.max_crew));

        Box::new(HasCrewParameter {
            title: self.title.clone().unwrap_or_else(|| "Crew".to_string()),
            delegates,
            state: ParamState::Incomplete,
        })
    }
}

struct HasCrewParameter {
    title: String,
    delegates: Vec<ConditionDelegate<CrewMember>>,
    state: ParamState,
}

impl Parameter for HasCrewParameter {
    fn title(&self) -> String {
        let details = delegate_text(&self.delegates);
        if details.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, details)
        }
    }

    fn state(&self) -> ParamState {
        self.state
    }

    fn check(&mut self, sim: &SimState, check_only: bool) -> CheckResult {
        let mut met = false;
        let mut changed = false;
        for vessel in &sim.vessels {
            let result = check_any(&mut self.delegates, &vessel.crew, check_only);
            changed |= result.changed;
            if result.met {
                met = true;
                break;
            }
        }

        if !check_only {
            let new_state = if met {
                ParamState::Complete
            } else {
                ParamState::Incomplete
            };
            if self.state != new_state {
                self.state = new_state;
                changed = true;
            }
        }

        CheckResult { met, changed }
    }

    fn save(&self, node: &mut ConfigNode) {
        node.add_value("title", &self.title);
        node.add_value("state", &self.state.to_string());
        for delegate in &self.delegates {
            let mut child = ConfigNode::new("CONDITION");
            delegate.save(&mut child);
            node.add_child(child);
        }
    }
}

struct ReachDestinationFactory {
    title: Option<String>,
    body: CelestialBody,
}

impl ReachDestinationFactory {
    fn load(node: &ConfigNode, lctx: &LoadContext) -> Result<Self, LoadError> {
        Ok(ReachDestinationFactory {
            title: node.template_field("title", lctx.registry, lctx.ctx)?,
            body: target_body_field(node, lctx)?,
        })
    }
}

impl ParameterFactory for ReachDestinationFactory {
    fn parameter_type(&self) -> &'static str {
        "ReachDestination"
    }

    fn generate(&self) -> Box<dyn Parameter> {
        Box::new(ReachDestinationParameter {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| format!("Reach {}", self.body.name)),
            body: self.body.name.clone(),
            state: ParamState::Incomplete,
        })
    }
}

struct ReachDestinationParameter {
    title: String,
    body: String,
    state: ParamState,
}

impl Parameter for ReachDestinationParameter {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn state(&self) -> ParamState {
        self.state
    }

    fn check(&mut self, sim: &SimState, check_only: bool) -> CheckResult {
        let met = sim.vessels.iter().any(|v| v.body == self.body);
        let mut changed = false;

        if !check_only {
            // Destination reached is sticky: once complete, stays complete.
            let new_state = if met || self.state == ParamState::Complete {
                ParamState::Complete
            } else {
                ParamState::Incomplete
            };
            if self.state != new_state {
                self.state = new_state;
                changed = true;
            }
        }

        CheckResult { met, changed }
    }

    fn save(&self, node: &mut ConfigNode) {
        node.add_value("title", &self.title);
        node.add_value("body", &self.body);
        node.add_value("state", &self.state.to_string());
    }
}

// ----- stock behaviours ---------------------------------------------------

/// Shows a message when the contract is accepted. The message is a
/// display template, rendered at fire time so random-name functions vary
/// per contract instance.
struct MessageBehaviour {
    title: String,
    message: String,
}

impl MessageBehaviour {
    fn load(node: &ConfigNode, lctx: &LoadContext) -> Result<Self, LoadError> {
        // Validate the template at load time; the stored text is rendered
        // again on fire.
        let message = node.require_value("message")?.to_string();
        template::render(&message, lctx.registry, lctx.ctx).map_err(|e| {
            LoadError::InvalidValue {
                field: "message".to_string(),
                value: message.clone(),
                message: e.to_string(),
            }
        })?;

        Ok(MessageBehaviour {
            title: node
                .template_field("title", lctx.registry, lctx.ctx)?
                .unwrap_or_default(),
            message,
        })
    }
}

impl Behaviour for MessageBehaviour {
    fn behaviour_type(&self) -> &'static str {
        "Message"
    }

    fn on_accepted(
        &self,
        registry: &TypeRegistry,
        ctx: &EvalContext,
    ) -> Result<Option<String>, ExprError> {
        let rendered = template::render(&self.message, registry, ctx)?;
        let text = if self.title.is_empty() {
            rendered
        } else {
            format!("{}: {}", self.title, rendered)
        };
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BodyCatalog, Situation, Vessel};
    use std::rc::Rc;

    fn test_setup() -> (TypeRegistry, EvalContext) {
        let mut registry = TypeRegistry::new();
        crate::sim::register_celestial_bodies(&mut registry, Rc::new(BodyCatalog::sample()))
            .unwrap();
        (registry, EvalContext::new())
    }

    #[test]
    fn test_unknown_tag_fails_load() {
        let (registry, ctx) = test_setup();
        let lctx = LoadContext {
            registry: &registry,
            ctx: &ctx,
        };

        let mut node = ConfigNode::new("REQUIREMENT");
        node.add_value("type", "Bogus");

        let result = FactoryRegistry::new().generate_requirement(&node, &lctx);
        assert!(matches!(result, Err(LoadError::UnknownTag { .. })));
    }

    #[test]
    fn test_inverted_requirement() {
        let (registry, ctx) = test_setup();
        let lctx = LoadContext {
            registry: &registry,
            ctx: &ctx,
        };

        let mut node = ConfigNode::new("REQUIREMENT");
        node.add_value("type", "Funds");
        node.add_value("minFunds", "1000.0");
        node.add_value("invertRequirement", "true");

        let req = FactoryRegistry::new()
            .generate_requirement(&node, &lctx)
            .unwrap();

        let mut sim = SimState::default();
        sim.funds = 500.0;
        assert!(req.is_met(&sim));
        sim.funds = 5000.0;
        assert!(!req.is_met(&sim));
    }

    #[test]
    fn test_reach_destination_sticky() {
        let (registry, ctx) = test_setup();
        let lctx = LoadContext {
            registry: &registry,
            ctx: &ctx,
        };

        let mut node = ConfigNode::new("PARAMETER");
        node.add_value("type", "ReachDestination");
        node.add_value("targetBody", "Mun");

        let factory = FactoryRegistry::new()
            .generate_parameter_factory(&node, &lctx)
            .unwrap();
        let mut param = factory.generate();

        let mut sim = SimState::default();
        sim.vessels
            .push(Vessel::new("Explorer", "Mun", Situation::Orbiting));
        let result = param.check(&sim, false);
        assert!(result.met);
        assert!(result.changed);
        assert_eq!(param.state(), ParamState::Complete);

        // Vessel leaves; completion sticks.
        sim.vessels.clear();
        param.check(&sim, false);
        assert_eq!(param.state(), ParamState::Complete);
    }
}
