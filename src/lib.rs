//! # Chainlog
//!
//! A micro forward-chaining rule engine with truth maintenance.
//!
//! ## Features
//!
//! - Facts and rules are kept at their forward-chaining fixed point
//! - Every derived fact or rule records the (rule, fact) pairs that produced it
//! - Retraction removes exactly the knowledge left without justification
//! - Optional textual surface (`parsing` feature)
//!
//! ## Example
//!
//! ```rust
//! use chainlog::{Knowledge, KnowledgeBase, Statement, Term};
//!
//! let p = |arg: Term| Statement::new("p", vec![arg]);
//! let q = |arg: Term| Statement::new("q", vec![arg]);
//!
//! let mut kb = KnowledgeBase::new();
//! kb.assert(Knowledge::rule(vec![p(Term::var("x"))], q(Term::var("x"))));
//! kb.assert(p(Term::constant("a")));
//!
//! let answers = kb.ask(q(Term::var("y"))).unwrap();
//! assert_eq!(answers[0].substitution.get("y"), Some(&Term::constant("a")));
//!
//! kb.retract(p(Term::constant("a"))).unwrap();
//! assert!(kb.ask(q(Term::var("y"))).unwrap().is_empty());
//! ```

pub mod config;
/// Single-step forward chaining.
pub mod engine;
pub mod error;
/// The knowledge base and its truth maintenance.
pub mod kb;
/// Facts, rules and their provenance.
pub mod knowledge;
#[cfg(feature = "parsing")]
pub mod parse;
/// Statements, substitutions and unification.
pub mod term;

pub use config::{KbConfig, Trace, Verbosity};
pub use engine::{Derivation, InferenceEngine};
pub use error::{KbError, KbResult};
pub use kb::{Answer, KnowledgeBase};
pub use knowledge::{Fact, FactId, ItemId, Knowledge, Rule, RuleId, Support};
#[cfg(feature = "parsing")]
pub use parse::{parse_knowledge, parse_program, parse_statement};
pub use term::{Statement, Substitution, SyntacticUnifier, Term, Unifier};
