use crate::term::Statement;
use indexmap::IndexSet;
use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle to a fact stored in a [`KnowledgeBase`](crate::KnowledgeBase).
///
/// Handles are never reused, so a handle to a retracted fact stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactId(pub(crate) u64);

/// Handle to a rule stored in a [`KnowledgeBase`](crate::KnowledgeBase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) u64);

/// Handle to either kind of stored item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemId {
    /// A stored fact
    Fact(FactId),
    /// A stored rule
    Rule(RuleId),
}

impl From<FactId> for ItemId {
    fn from(id: FactId) -> Self {
        Self::Fact(id)
    }
}

impl From<RuleId> for ItemId {
    fn from(id: RuleId) -> Self {
        Self::Rule(id)
    }
}

/// The (rule, fact) pair that jointly derived an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Support {
    /// The rule whose first antecedent matched
    pub rule: RuleId,
    /// The fact that matched it
    pub fact: FactId,
}

impl Support {
    /// True when `item` is one of the two members of this pair.
    #[must_use]
    pub fn involves(&self, item: ItemId) -> bool {
        match item {
            ItemId::Fact(id) => self.fact == id,
            ItemId::Rule(id) => self.rule == id,
        }
    }

    /// The member of the pair that is not `item`.
    #[must_use]
    pub fn partner_of(&self, item: ItemId) -> ItemId {
        match item {
            ItemId::Fact(_) => ItemId::Rule(self.rule),
            ItemId::Rule(_) => ItemId::Fact(self.fact),
        }
    }
}

pub(crate) type SupportList = SmallVec<[Support; 2]>;

/// Knowledge handed to the knowledge base by a caller, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Knowledge {
    /// An atomic statement believed true
    Fact(Statement),
    /// An implication `lhs[0] && lhs[1] && ... -> rhs`
    Rule {
        /// Conjunctive antecedents; the first one is matched against facts
        lhs: Vec<Statement>,
        /// The consequent
        rhs: Statement,
    },
}

impl Knowledge {
    /// Shorthand for [`Knowledge::Fact`].
    #[must_use]
    pub fn fact(statement: Statement) -> Self {
        Self::Fact(statement)
    }

    /// Shorthand for [`Knowledge::Rule`].
    #[must_use]
    pub fn rule(lhs: Vec<Statement>, rhs: Statement) -> Self {
        Self::Rule { lhs, rhs }
    }
}

impl From<Statement> for Knowledge {
    fn from(statement: Statement) -> Self {
        Self::Fact(statement)
    }
}

impl fmt::Display for Knowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact(statement) => write!(f, "fact: {statement}"),
            Self::Rule { lhs, rhs } => {
                f.write_str("rule: ")?;
                fmt_rule(f, lhs, rhs)
            }
        }
    }
}

fn fmt_rule(f: &mut fmt::Formatter<'_>, lhs: &[Statement], rhs: &Statement) -> fmt::Result {
    f.write_str("(")?;
    for (idx, statement) in lhs.iter().enumerate() {
        if idx > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{statement}")?;
    }
    write!(f, ") -> {rhs}")
}

/// Provenance shared by stored facts and rules
#[derive(Debug, Clone, Default)]
pub(crate) struct Provenance {
    pub(crate) asserted: bool,
    pub(crate) supported_by: SupportList,
    pub(crate) supports_facts: IndexSet<FactId>,
    pub(crate) supports_rules: IndexSet<RuleId>,
}

impl Provenance {
    fn new(support: Option<Support>) -> Self {
        Self {
            asserted: support.is_none(),
            supported_by: support.into_iter().collect(),
            ..Self::default()
        }
    }

    /// An item with neither asserted status nor support has no reason to exist.
    pub(crate) fn is_justified(&self) -> bool {
        self.asserted || !self.supported_by.is_empty()
    }

    /// Records that `item` was derived with the help of the owner.
    pub(crate) fn record_dependent(&mut self, item: ItemId) {
        match item {
            ItemId::Fact(id) => {
                self.supports_facts.insert(id);
            }
            ItemId::Rule(id) => {
                self.supports_rules.insert(id);
            }
        }
    }

    pub(crate) fn forget_dependent(&mut self, item: ItemId) {
        match item {
            ItemId::Fact(id) => {
                self.supports_facts.shift_remove(&id);
            }
            ItemId::Rule(id) => {
                self.supports_rules.shift_remove(&id);
            }
        }
    }

    pub(crate) fn dependents(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.supports_facts
            .iter()
            .copied()
            .map(ItemId::Fact)
            .chain(self.supports_rules.iter().copied().map(ItemId::Rule))
    }
}

/// A fact stored in the knowledge base, with its provenance
///
/// Two facts are equal when their statements are equal; provenance is ignored.
#[derive(Debug, Clone)]
pub struct Fact {
    pub(crate) statement: Statement,
    pub(crate) meta: Provenance,
}

impl Fact {
    pub(crate) fn new(statement: Statement, support: Option<Support>) -> Self {
        Self {
            statement,
            meta: Provenance::new(support),
        }
    }

    /// The statement this fact holds.
    #[must_use]
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// True if the fact was told to the knowledge base directly.
    #[must_use]
    pub fn is_asserted(&self) -> bool {
        self.meta.asserted
    }

    /// The (rule, fact) pairs that derived this fact.
    #[must_use]
    pub fn supported_by(&self) -> &[Support] {
        &self.meta.supported_by
    }

    /// Facts derived using this fact.
    pub fn supports_facts(&self) -> impl Iterator<Item = FactId> + '_ {
        self.meta.supports_facts.iter().copied()
    }

    /// Rules derived using this fact.
    pub fn supports_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.meta.supports_rules.iter().copied()
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.statement == other.statement
    }
}

impl Eq for Fact {}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.statement)?;
        if !self.meta.asserted {
            f.write_str(" [derived]")?;
        }
        Ok(())
    }
}

/// A rule stored in the knowledge base, with its provenance
///
/// Two rules are equal when their antecedents and consequent are equal.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) lhs: Vec<Statement>,
    pub(crate) rhs: Statement,
    pub(crate) meta: Provenance,
}

impl Rule {
    pub(crate) fn new(lhs: Vec<Statement>, rhs: Statement, support: Option<Support>) -> Self {
        Self {
            lhs,
            rhs,
            meta: Provenance::new(support),
        }
    }

    /// The antecedents, in matching order.
    #[must_use]
    pub fn lhs(&self) -> &[Statement] {
        &self.lhs
    }

    /// The consequent.
    #[must_use]
    pub fn rhs(&self) -> &Statement {
        &self.rhs
    }

    /// True if the rule was told to the knowledge base directly.
    #[must_use]
    pub fn is_asserted(&self) -> bool {
        self.meta.asserted
    }

    /// The (rule, fact) pairs that derived this rule.
    #[must_use]
    pub fn supported_by(&self) -> &[Support] {
        &self.meta.supported_by
    }

    /// Facts derived using this rule.
    pub fn supports_facts(&self) -> impl Iterator<Item = FactId> + '_ {
        self.meta.supports_facts.iter().copied()
    }

    /// Rules derived using this rule.
    pub fn supports_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.meta.supports_rules.iter().copied()
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.lhs == other.lhs && self.rhs == other.rhs
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_rule(f, &self.lhs, &self.rhs)?;
        if !self.meta.asserted {
            f.write_str(" [derived]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn p(arg: &str) -> Statement {
        Statement::new("p", vec![Term::constant(arg)])
    }

    #[test]
    fn test_fact_equality_ignores_provenance() {
        let told = Fact::new(p("a"), None);
        let derived = Fact::new(
            p("a"),
            Some(Support {
                rule: RuleId(1),
                fact: FactId(2),
            }),
        );

        assert!(told.is_asserted());
        assert!(!derived.is_asserted());
        assert_eq!(derived.supported_by().len(), 1);
        assert_eq!(told, derived);
        assert_ne!(told, Fact::new(p("b"), None));
    }

    #[test]
    fn test_rule_equality_respects_antecedent_order() {
        let a = Rule::new(vec![p("a"), p("b")], p("c"), None);
        let b = Rule::new(vec![p("b"), p("a")], p("c"), None);
        assert_ne!(a, b);
        assert_eq!(a, Rule::new(vec![p("a"), p("b")], p("c"), None));
    }

    #[test]
    fn test_support_involves() {
        let support = Support {
            rule: RuleId(3),
            fact: FactId(3),
        };
        assert!(support.involves(ItemId::Fact(FactId(3))));
        assert!(support.involves(ItemId::Rule(RuleId(3))));
        assert!(!support.involves(ItemId::Fact(FactId(4))));
        assert_eq!(
            support.partner_of(ItemId::Fact(FactId(3))),
            ItemId::Rule(RuleId(3))
        );
    }

    #[test]
    fn test_display() {
        let rule = Rule::new(
            vec![
                Statement::new("p", vec![Term::var("x")]),
                Statement::new("s", vec![Term::var("x")]),
            ],
            Statement::new("t", vec![Term::var("x")]),
            None,
        );
        assert_eq!(rule.to_string(), "((p ?x) (s ?x)) -> (t ?x)");
        assert_eq!(Knowledge::fact(p("a")).to_string(), "fact: (p a)");
    }
}
