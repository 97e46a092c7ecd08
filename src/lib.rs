//! Charter - a declarative mission contract engine.
//!
//! Contract definitions are written in a block-structured configuration
//! format whose fields are typed expressions (`lexer`, `parser`,
//! `evaluator`) or display-text templates (`template`). Loaded contract
//! types generate live parameters whose completion is tracked by the
//! tri-state condition engine (`condition`). The `registry` module is the
//! extension seam: domain types register identifier resolution, methods,
//! and conversions without touching the evaluator.

pub mod ast;
pub mod condition;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod factory;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod sim;
pub mod template;
pub mod value;

pub use ast::{BinOp, Expr, Token, UnOp};
pub use condition::{CheckResult, ConditionDelegate, MatchType, ParamState};
pub use config::ConfigNode;
pub use error::{ConditionError, ExprError, LoadError};
pub use evaluator::{evaluate, EvalContext, Evaluator};
pub use factory::{FactoryRegistry, LoadContext, Parameter, Requirement};
pub use lexer::Lexer;
pub use loader::{Contract, ContractDatabase, ContractType, Loader, ReloadStep};
pub use parser::Parser;
pub use registry::{TypeEntry, TypeRegistry};
pub use value::{DomainObject, FromValue, Value};
