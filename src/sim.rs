use std::any::Any;
use std::collections::HashSet;
use std::rc::Rc;
use std::str::FromStr;

use rand::Rng;

use crate::error::ExprError;
use crate::registry::{TypeEntry, TypeRegistry};
use crate::value::{DomainObject, FromValue, Value};

/// A celestial body as the expression layer sees it: identity plus the
/// handful of physical facts contracts condition on.
#[derive(Debug, Clone, PartialEq)]
pub struct CelestialBody {
    pub name: String,
    pub radius: f64,
    pub atmosphere: bool,
    pub ocean: bool,
    pub surface: bool,
    pub parent: Option<String>,
    pub children: Vec<String>,
}

impl CelestialBody {
    pub fn new(name: impl Into<String>, radius: f64) -> Self {
        CelestialBody {
            name: name.into(),
            radius,
            atmosphere: false,
            ocean: false,
            surface: true,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl DomainObject for CelestialBody {
    fn type_name(&self) -> &'static str {
        "CelestialBody"
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn object_eq(&self, other: &dyn DomainObject) -> bool {
        other
            .as_any()
            .downcast_ref::<CelestialBody>()
            .is_some_and(|b| b.name == self.name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FromValue for CelestialBody {
    const TYPE_NAME: &'static str = "CelestialBody";

    fn from_value(value: Value) -> Result<Self, ExprError> {
        Ok(value.as_object::<CelestialBody>()?.clone())
    }
}

/// The known set of celestial bodies, shared (via `Rc`) with the registry
/// closures that resolve body identifiers and navigate the hierarchy.
#[derive(Debug, Default)]
pub struct BodyCatalog {
    bodies: Vec<CelestialBody>,
    home: String,
}

impl BodyCatalog {
    pub fn new(bodies: Vec<CelestialBody>, home: impl Into<String>) -> Self {
        BodyCatalog {
            bodies,
            home: home.into(),
        }
    }

    /// A small stock system, enough for demos and tests.
    pub fn sample() -> Self {
        let mut kerbol = CelestialBody::new("Kerbol", 261_600_000.0);
        kerbol.surface = false;
        kerbol.children = vec!["Kerbin".into(), "Duna".into(), "Jool".into()];

        let mut kerbin = CelestialBody::new("Kerbin", 600_000.0);
        kerbin.atmosphere = true;
        kerbin.ocean = true;
        kerbin.parent = Some("Kerbol".into());
        kerbin.children = vec!["Mun".into(), "Minmus".into()];

        let mut mun = CelestialBody::new("Mun", 200_000.0);
        mun.parent = Some("Kerbin".into());

        let mut minmus = CelestialBody::new("Minmus", 60_000.0);
        minmus.parent = Some("Kerbin".into());

        let mut duna = CelestialBody::new("Duna", 320_000.0);
        duna.atmosphere = true;
        duna.parent = Some("Kerbol".into());

        let mut jool = CelestialBody::new("Jool", 6_000_000.0);
        jool.atmosphere = true;
        jool.surface = false;
        jool.parent = Some("Kerbol".into());
        jool.children = vec!["Laythe".into()];

        let mut laythe = CelestialBody::new("Laythe", 500_000.0);
        laythe.atmosphere = true;
        laythe.ocean = true;
        laythe.parent = Some("Jool".into());

        BodyCatalog::new(
            vec![kerbol, kerbin, mun, minmus, duna, jool, laythe],
            "Kerbin",
        )
    }

    pub fn lookup(&self, name: &str) -> Option<&CelestialBody> {
        self.bodies.iter().find(|b| b.name == name)
    }

    pub fn home_world(&self) -> Option<&CelestialBody> {
        self.lookup(&self.home)
    }

    pub fn all(&self) -> &[CelestialBody] {
        &self.bodies
    }
}

fn body_value(body: &CelestialBody) -> Value {
    Value::Object(Rc::new(body.clone()))
}

fn as_body(value: &Value) -> Result<&CelestialBody, ExprError> {
    value.as_object::<CelestialBody>()
}

/// Install the `CelestialBody` entry: identifier resolution against the
/// catalog, the body inspection methods, hierarchy navigation, and the
/// `HomeWorld()` / `AllBodies()` globals.
pub fn register_celestial_bodies(
    registry: &mut TypeRegistry,
    catalog: Rc<BodyCatalog>,
) -> Result<(), ExprError> {
    let ident_catalog = Rc::clone(&catalog);
    let parent_catalog = Rc::clone(&catalog);
    let children_catalog = Rc::clone(&catalog);
    let home_catalog = Rc::clone(&catalog);
    let all_catalog = Rc::clone(&catalog);

    registry.register(
        TypeEntry::new("CelestialBody")
            .with_identifier(move |name| ident_catalog.lookup(name).map(body_value))
            .with_method("HasAtmosphere", |v, _| {
                Ok(Value::Boolean(as_body(v)?.atmosphere))
            })
            .with_method("HasOcean", |v, _| Ok(Value::Boolean(as_body(v)?.ocean)))
            .with_method("HasSurface", |v, _| Ok(Value::Boolean(as_body(v)?.surface)))
            .with_method("Radius", |v, _| Ok(Value::Float(as_body(v)?.radius)))
            .with_method("Parent", move |v, _| {
                let body = as_body(v)?;
                Ok(match &body.parent {
                    Some(name) => parent_catalog
                        .lookup(name)
                        .map(body_value)
                        .unwrap_or(Value::Null),
                    None => Value::Null,
                })
            })
            .with_method("Children", move |v, _| {
                let body = as_body(v)?;
                let children = body
                    .children
                    .iter()
                    .filter_map(|name| children_catalog.lookup(name).map(body_value))
                    .collect();
                Ok(Value::List(children))
            })
            .with_global("HomeWorld", move |args| {
                if !args.is_empty() {
                    return Err(ExprError::Arity {
                        name: "HomeWorld".to_string(),
                        expected: 0,
                        got: args.len(),
                    });
                }
                Ok(home_catalog
                    .home_world()
                    .map(body_value)
                    .unwrap_or(Value::Null))
            })
            .with_global("AllBodies", move |args| {
                if !args.is_empty() {
                    return Err(ExprError::Arity {
                        name: "AllBodies".to_string(),
                        expected: 0,
                        got: args.len(),
                    });
                }
                Ok(Value::List(
                    all_catalog.all().iter().map(body_value).collect(),
                ))
            })
            .with_convert(|v, target| match (v, target) {
                (Value::Object(obj), "string") => Some(Value::String(obj.display_name())),
                _ => None,
            }),
    );

    Ok(())
}

const KERBAL_FIRST_NAMES: &[&str] = &[
    "Adlas", "Bartdon", "Billy-Bobfield", "Bobus", "Calbo", "Dudmon", "Gemzor", "Hanwig",
    "Jebediah", "Kirrim", "Lodock", "Lucan", "Macfred", "Nedwin", "Obery", "Patbro", "Phildos",
    "Richdrin", "Rodger", "Samler", "Tomsen", "Wehrzer",
];

const KERBAL_LAST_NAME: &str = "Kerman";

/// Install the `RandomKerbalName()` global on the string entry. The
/// result varies per call, so display templates re-render differently
/// each time; anything needing a stable name must evaluate once and
/// store the result.
pub fn register_kerbal_names(registry: &mut TypeRegistry) -> Result<(), ExprError> {
    registry.add_global("string", "RandomKerbalName", |args| {
        if !args.is_empty() {
            return Err(ExprError::Arity {
                name: "RandomKerbalName".to_string(),
                expected: 0,
                got: args.len(),
            });
        }
        let index = rand::thread_rng().gen_range(0..KERBAL_FIRST_NAMES.len());
        Ok(Value::String(format!(
            "{} {}",
            KERBAL_FIRST_NAMES[index], KERBAL_LAST_NAME
        )))
    })
}

/// Where a vessel currently is relative to its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Situation {
    Landed,
    Splashed,
    Flying,
    Orbiting,
}

impl FromStr for Situation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Landed" => Ok(Situation::Landed),
            "Splashed" => Ok(Situation::Splashed),
            "Flying" => Ok(Situation::Flying),
            "Orbiting" => Ok(Situation::Orbiting),
            other => Err(format!("unknown situation '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewMember {
    pub name: String,
    pub role: String,
}

impl CrewMember {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        CrewMember {
            name: name.into(),
            role: role.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vessel {
    pub name: String,
    pub body: String,
    pub situation: Situation,
    pub crew: Vec<CrewMember>,
}

impl Vessel {
    pub fn new(name: impl Into<String>, body: impl Into<String>, situation: Situation) -> Self {
        Vessel {
            name: name.into(),
            body: body.into(),
            situation,
            crew: Vec::new(),
        }
    }
}

/// The mutable player-progress snapshot that requirement and parameter
/// checks read. Purely observational; checks never mutate it.
#[derive(Debug, Default)]
pub struct SimState {
    pub funds: f64,
    pub reached: HashSet<String>,
    pub vessels: Vec<Vessel>,
}

impl SimState {
    pub fn has_reached(&self, body: &str) -> bool {
        self.reached.contains(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_identity() {
        let a = CelestialBody::new("Mun", 200_000.0);
        let mut b = CelestialBody::new("Mun", 999.0);
        b.atmosphere = true;
        // identity is by name, not field-for-field
        assert!(a.object_eq(&b));
    }

    #[test]
    fn test_catalog_navigation() {
        let catalog = BodyCatalog::sample();
        let kerbin = catalog.lookup("Kerbin").unwrap();
        assert_eq!(kerbin.parent.as_deref(), Some("Kerbol"));
        assert_eq!(catalog.home_world().unwrap().name, "Kerbin");
    }
}
