use crate::config::Trace;
use crate::knowledge::{Fact, FactId, Knowledge, Rule, RuleId, Support};
use crate::term::Unifier;
use indexmap::IndexSet;
use std::iter;

/// The outcome of a successful forward-chaining step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    /// The derived fact, or the rule specialized by the match
    pub knowledge: Knowledge,
    /// The (rule, fact) pair that produced it
    pub support: Support,
}

/// Stateless forward-chaining step over one fact and one rule
///
/// The engine never touches the store: it reports what follows from the pair
/// and the knowledge base decides how to record it.
#[derive(Debug, Clone)]
pub struct InferenceEngine<U> {
    unifier: U,
    trace: Trace,
}

impl<U: Unifier> InferenceEngine<U> {
    /// Create an engine matching through `unifier`
    pub fn new(unifier: U, trace: Trace) -> Self {
        Self { unifier, trace }
    }

    /// The unifier used for matching.
    pub fn unifier(&self) -> &U {
        &self.unifier
    }

    /// Attempts one derivation from `fact` and `rule`.
    ///
    /// The fact's variables are renamed apart from every variable of the
    /// rule, then the fact is matched against the rule's first antecedent only:
    /// - No antecedents, or no match: nothing follows.
    /// - One antecedent: the instantiated consequent is a new fact.
    /// - Several antecedents: the remaining antecedents and the consequent,
    ///   instantiated with the same substitution, form a new rule.
    pub fn step(
        &self,
        fact_id: FactId,
        fact: &Fact,
        rule_id: RuleId,
        rule: &Rule,
    ) -> Option<Derivation> {
        self.trace.inference(format_args!(
            "attempting to infer from {} and {rule}",
            fact.statement()
        ));

        let (first, rest) = rule.lhs().split_first()?;
        let taken: IndexSet<&str> = rule
            .lhs()
            .iter()
            .chain(iter::once(rule.rhs()))
            .flat_map(|statement| statement.variables())
            .collect();
        let statement = fact.statement().renamed_apart(&taken);
        let substitution = self.unifier.unify(&statement, first)?;
        let rhs = self.unifier.instantiate(rule.rhs(), &substitution);

        let knowledge = if rest.is_empty() {
            Knowledge::Fact(rhs)
        } else {
            let lhs = rest
                .iter()
                .map(|antecedent| self.unifier.instantiate(antecedent, &substitution))
                .collect();
            Knowledge::Rule { lhs, rhs }
        };
        self.trace
            .inference(format_args!("  {{{substitution}}} => {knowledge}"));

        Some(Derivation {
            knowledge,
            support: Support {
                rule: rule_id,
                fact: fact_id,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use crate::term::{Statement, SyntacticUnifier, Term};

    fn engine() -> InferenceEngine<SyntacticUnifier> {
        InferenceEngine::new(SyntacticUnifier, Trace::new(Verbosity::Inference))
    }

    fn unary(predicate: &str, arg: Term) -> Statement {
        Statement::new(predicate, vec![arg])
    }

    #[test]
    fn test_single_antecedent_derives_fact() {
        let fact = Fact::new(unary("p", Term::constant("a")), None);
        let rule = Rule::new(
            vec![unary("p", Term::var("x"))],
            unary("q", Term::var("x")),
            None,
        );

        let derivation = engine()
            .step(FactId(0), &fact, RuleId(1), &rule)
            .expect("p(a) matches p(?x)");

        assert_eq!(
            derivation.knowledge,
            Knowledge::Fact(unary("q", Term::constant("a")))
        );
        assert_eq!(
            derivation.support,
            Support {
                rule: RuleId(1),
                fact: FactId(0)
            }
        );
    }

    #[test]
    fn test_multiple_antecedents_derive_specialized_rule() {
        let fact = Fact::new(unary("p", Term::constant("a")), None);
        let rule = Rule::new(
            vec![unary("p", Term::var("x")), unary("s", Term::var("x"))],
            unary("t", Term::var("x")),
            None,
        );

        let derivation = engine()
            .step(FactId(0), &fact, RuleId(1), &rule)
            .expect("p(a) matches p(?x)");

        assert_eq!(
            derivation.knowledge,
            Knowledge::Rule {
                lhs: vec![unary("s", Term::constant("a"))],
                rhs: unary("t", Term::constant("a")),
            }
        );
    }

    #[test]
    fn test_only_first_antecedent_is_matched() {
        // s(a) would match the second antecedent, but only lhs[0] counts
        let fact = Fact::new(unary("s", Term::constant("a")), None);
        let rule = Rule::new(
            vec![unary("p", Term::var("x")), unary("s", Term::var("x"))],
            unary("t", Term::var("x")),
            None,
        );

        assert!(engine().step(FactId(0), &fact, RuleId(1), &rule).is_none());
    }

    #[test]
    fn test_rule_without_antecedents_infers_nothing() {
        let fact = Fact::new(unary("p", Term::constant("a")), None);
        let rule = Rule::new(Vec::new(), unary("q", Term::constant("a")), None);

        assert!(engine().step(FactId(0), &fact, RuleId(1), &rule).is_none());
    }

    #[test]
    fn test_unbound_consequent_variables_survive() {
        let fact = Fact::new(unary("p", Term::constant("a")), None);
        let rule = Rule::new(
            vec![unary("p", Term::var("x"))],
            Statement::new("r", vec![Term::var("x"), Term::var("y")]),
            None,
        );

        let derivation = engine().step(FactId(0), &fact, RuleId(1), &rule).unwrap();
        assert_eq!(
            derivation.knowledge,
            Knowledge::Fact(Statement::new(
                "r",
                vec![Term::constant("a"), Term::var("y")]
            ))
        );
    }

    #[test]
    fn test_fact_variables_do_not_capture_rule_variables() {
        // ?y only occurs in the consequent, the stored ?y must stay distinct
        let fact = Fact::new(
            Statement::new("r", vec![Term::constant("a"), Term::var("y")]),
            None,
        );
        let rule = Rule::new(
            vec![Statement::new("r", vec![Term::var("x"), Term::var("z")])],
            Statement::new("s", vec![Term::var("x"), Term::var("z"), Term::var("y")]),
            None,
        );

        let derivation = engine().step(FactId(0), &fact, RuleId(1), &rule).unwrap();
        assert_eq!(
            derivation.knowledge,
            Knowledge::Fact(Statement::new(
                "s",
                vec![Term::constant("a"), Term::var("y'"), Term::var("y")]
            ))
        );
    }
}
