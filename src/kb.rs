use crate::config::{KbConfig, Trace};
use crate::engine::{Derivation, InferenceEngine};
use crate::error::{KbError, KbResult};
use crate::knowledge::{
    Fact, FactId, ItemId, Knowledge, Provenance, Rule, RuleId, Support, SupportList,
};
use crate::term::{Statement, Substitution, SyntacticUnifier, Unifier};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;

/// Structural identity of a rule: its antecedents and consequent
type RuleShape = (Vec<Statement>, Statement);

/// (fact, rule) pairs still waiting for an inference attempt
type Pending = VecDeque<(FactId, RuleId)>;

/// One answer to [`KnowledgeBase::ask`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Bindings that make the query equal to the matched fact
    pub substitution: Substitution,
    /// The stored fact backing this answer
    pub fact: FactId,
}

/// A store of facts and rules kept at its forward-chaining fixed point
///
/// Every stored item remembers the (rule, fact) pairs that derived it, and
/// every item remembers what it helped derive. Retraction walks those links
/// and removes exactly the knowledge left without justification.
#[derive(Debug)]
pub struct KnowledgeBase<U = SyntacticUnifier> {
    facts: IndexMap<FactId, Fact>,
    rules: IndexMap<RuleId, Rule>,
    /// Structural lookup for facts
    fact_index: IndexMap<Statement, FactId>,
    /// Structural lookup for rules
    rule_index: IndexMap<RuleShape, RuleId>,
    next_id: u64,
    engine: InferenceEngine<U>,
    config: KbConfig,
    trace: Trace,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase {
    /// Create an empty knowledge base with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(KbConfig::default())
    }

    /// Create an empty knowledge base with `config`
    #[must_use]
    pub fn with_config(config: KbConfig) -> Self {
        Self::with_unifier(config, SyntacticUnifier)
    }
}

impl<U: Unifier> KnowledgeBase<U> {
    /// Create an empty knowledge base that matches through `unifier`
    pub fn with_unifier(config: KbConfig, unifier: U) -> Self {
        let trace = Trace::new(config.verbosity);
        Self {
            facts: IndexMap::new(),
            rules: IndexMap::new(),
            fact_index: IndexMap::new(),
            rule_index: IndexMap::new(),
            next_id: 0,
            engine: InferenceEngine::new(unifier, trace),
            config,
            trace,
        }
    }

    /// The configuration this knowledge base was built with.
    #[must_use]
    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    /// Tells the knowledge base a fact or rule and runs forward chaining to
    /// the new fixed point.
    ///
    /// Telling something already known (directly or by derivation) only marks
    /// it as asserted. Returns the handle of the stored item.
    pub fn assert(&mut self, knowledge: impl Into<Knowledge>) -> ItemId {
        let knowledge = knowledge.into();
        self.trace.operation(format_args!("asserting {knowledge}"));

        let mut pending = Pending::new();
        let id = self.add(knowledge, None, &mut pending);
        self.run_to_fixed_point(pending);
        self.check_invariants();
        id
    }

    /// Tells the knowledge base a fact. See [`KnowledgeBase::assert`].
    pub fn assert_fact(&mut self, statement: Statement) -> FactId {
        self.trace.operation(format_args!("asserting fact: {statement}"));

        let mut pending = Pending::new();
        let id = self.add_fact(statement, None, &mut pending);
        self.run_to_fixed_point(pending);
        self.check_invariants();
        id
    }

    /// Tells the knowledge base a rule. See [`KnowledgeBase::assert`].
    pub fn assert_rule(&mut self, lhs: Vec<Statement>, rhs: Statement) -> RuleId {
        let mut pending = Pending::new();
        let id = self.add_rule(lhs, rhs, None, &mut pending);
        if let Some(rule) = self.rules.get(&id) {
            self.trace.operation(format_args!("asserting rule: {rule}"));
        }
        self.run_to_fixed_point(pending);
        self.check_invariants();
        id
    }

    /// Stores `knowledge`, or merges it into its structural equal.
    fn add(
        &mut self,
        knowledge: Knowledge,
        support: Option<Support>,
        pending: &mut Pending,
    ) -> ItemId {
        match knowledge {
            Knowledge::Fact(statement) => self.add_fact(statement, support, pending).into(),
            Knowledge::Rule { lhs, rhs } => self.add_rule(lhs, rhs, support, pending).into(),
        }
    }

    fn add_fact(
        &mut self,
        statement: Statement,
        support: Option<Support>,
        pending: &mut Pending,
    ) -> FactId {
        if let Some(&id) = self.fact_index.get(&statement) {
            if let Some(fact) = self.facts.get_mut(&id) {
                Self::merge(&mut fact.meta, support);
                self.trace
                    .detail(format_args!("merged into existing fact {}", fact.statement));
            }
            return id;
        }

        let id = FactId(self.allocate_id());
        self.fact_index.insert(statement.clone(), id);
        self.facts.insert(id, Fact::new(statement, support));
        pending.extend(self.rules.keys().map(|&rule| (id, rule)));
        id
    }

    fn add_rule(
        &mut self,
        lhs: Vec<Statement>,
        rhs: Statement,
        support: Option<Support>,
        pending: &mut Pending,
    ) -> RuleId {
        let shape = (lhs, rhs);
        if let Some(&id) = self.rule_index.get(&shape) {
            if let Some(rule) = self.rules.get_mut(&id) {
                Self::merge(&mut rule.meta, support);
                self.trace.detail(format_args!("merged into existing rule {rule}"));
            }
            return id;
        }

        let id = RuleId(self.allocate_id());
        let (lhs, rhs) = shape.clone();
        self.rule_index.insert(shape, id);
        self.rules.insert(id, Rule::new(lhs, rhs, support));
        pending.extend(self.facts.keys().map(|&fact| (fact, id)));
        id
    }

    /// New support is appended; a fresh direct assertion sets the flag instead.
    fn merge(meta: &mut Provenance, support: Option<Support>) {
        match support {
            Some(support) => meta.supported_by.push(support),
            None => meta.asserted = true,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Drains the pending pairs, adding every derivation. New items enqueue
    /// their own pairs, so this stops once nothing new is derived.
    fn run_to_fixed_point(&mut self, mut pending: Pending) {
        while let Some((fact_id, rule_id)) = pending.pop_front() {
            let (Some(fact), Some(rule)) = (self.facts.get(&fact_id), self.rules.get(&rule_id))
            else {
                continue;
            };
            let Some(Derivation { knowledge, support }) =
                self.engine.step(fact_id, fact, rule_id, rule)
            else {
                continue;
            };

            // Cycle guard on the provenance graph: a fact is never recorded as
            // support for itself, so retracting it cannot be blocked by its own
            // derivation.
            if self.lookup(&knowledge) == Some(ItemId::Fact(fact_id)) {
                continue;
            }

            let derived = self.add(knowledge, Some(support), &mut pending);
            if let Some(fact) = self.facts.get_mut(&fact_id) {
                fact.meta.record_dependent(derived);
            }
            if let Some(rule) = self.rules.get_mut(&rule_id) {
                rule.meta.record_dependent(derived);
            }
        }
    }

    /// Finds every stored fact that unifies with `query`.
    ///
    /// The query may contain variables. Returns an empty list when nothing
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::InvalidQuery`] if `query` is a rule or has an empty
    /// predicate or term name.
    pub fn ask(&self, query: impl Into<Knowledge>) -> KbResult<Vec<Answer>> {
        let query = query.into();
        self.trace.operation(format_args!("asking {query}"));

        let statement = match query {
            Knowledge::Fact(statement) => statement,
            rule @ Knowledge::Rule { .. } => {
                return Err(KbError::InvalidQuery(format!(
                    "only facts can be asked, got {rule}"
                )))
            }
        };
        if !statement.is_well_formed() {
            return Err(KbError::InvalidQuery(format!(
                "malformed statement {statement}"
            )));
        }

        let unifier = self.engine.unifier();
        Ok(self
            .facts
            .iter()
            .filter_map(|(&id, fact)| {
                unifier
                    .unify(fact.statement(), &statement)
                    .map(|substitution| Answer {
                        substitution,
                        fact: id,
                    })
            })
            .collect())
    }

    /// Retracts a fact or rule previously told to the knowledge base.
    ///
    /// | asserted | supported | effect                               |
    /// |----------|-----------|--------------------------------------|
    /// | yes      | no        | removed, consequences cascade        |
    /// | yes      | yes       | only the asserted flag is cleared    |
    /// | no       | no        | removed, consequences cascade        |
    /// | no       | yes       | nothing; it is still derived         |
    ///
    /// # Errors
    ///
    /// Returns [`KbError::NotFound`] if nothing structurally equal is stored.
    pub fn retract(&mut self, knowledge: impl Into<Knowledge>) -> KbResult<()> {
        let knowledge = knowledge.into();
        self.trace.operation(format_args!("retracting {knowledge}"));

        let id = self.lookup(&knowledge).ok_or_else(|| KbError::NotFound {
            kind: match knowledge {
                Knowledge::Fact(_) => "fact",
                Knowledge::Rule { .. } => "rule",
            },
            item: knowledge.to_string(),
        })?;
        self.retract_item(id)
    }

    /// Retracts a stored item by handle. See [`KnowledgeBase::retract`].
    ///
    /// # Errors
    ///
    /// Returns [`KbError::NotFound`] if the handle is no longer stored.
    pub fn retract_item(&mut self, id: ItemId) -> KbResult<()> {
        let trace = self.trace;
        let Some(meta) = self.meta_mut(id) else {
            return Err(KbError::NotFound {
                kind: match id {
                    ItemId::Fact(_) => "fact",
                    ItemId::Rule(_) => "rule",
                },
                item: format!("{id:?}"),
            });
        };

        match (meta.asserted, meta.supported_by.is_empty()) {
            (true, false) => {
                meta.asserted = false;
                trace.detail(format_args!("still derived, clearing asserted flag"));
            }
            (false, false) => {
                trace.detail(format_args!("still derived, nothing to retract"));
            }
            (_, true) => self.remove_and_cascade(id),
        }

        self.check_invariants();
        Ok(())
    }

    /// Removes `root` and, transitively, every dependent left unjustified.
    fn remove_and_cascade(&mut self, root: ItemId) {
        let mut doomed = VecDeque::from([root]);
        while let Some(id) = doomed.pop_front() {
            let Some(meta) = self.remove(id) else {
                continue;
            };

            for dependent in meta.dependents() {
                if self.withdraw_support(dependent, id) {
                    doomed.push_back(dependent);
                }
            }
        }
    }

    /// Drops every support pair of `dependent` that involves `gone`.
    /// Returns true when `dependent` is left with no justification.
    fn withdraw_support(&mut self, dependent: ItemId, gone: ItemId) -> bool {
        let Some(meta) = self.meta_mut(dependent) else {
            return false;
        };

        let withdrawn: SupportList = meta
            .supported_by
            .iter()
            .filter(|support| support.involves(gone))
            .copied()
            .collect();
        meta.supported_by.retain(|support| !support.involves(gone));

        // The other member of a withdrawn pair no longer supports `dependent`
        // unless another pair still links them.
        let unlinked: SmallVec<[ItemId; 2]> = withdrawn
            .iter()
            .map(|support| support.partner_of(gone))
            .filter(|&partner| {
                !meta
                    .supported_by
                    .iter()
                    .any(|support| support.involves(partner))
            })
            .collect();
        let unjustified = !meta.is_justified();

        for partner in unlinked {
            if let Some(partner_meta) = self.meta_mut(partner) {
                partner_meta.forget_dependent(dependent);
            }
        }

        if !withdrawn.is_empty() {
            self.trace.detail(format_args!(
                "withdrew {} support(s) of {} from {}",
                withdrawn.len(),
                self.describe(gone),
                self.describe(dependent)
            ));
        }
        unjustified
    }

    fn remove(&mut self, id: ItemId) -> Option<Provenance> {
        match id {
            ItemId::Fact(id) => {
                let fact = self.facts.shift_remove(&id)?;
                self.fact_index.swap_remove(&fact.statement);
                self.trace.detail(format_args!("removed fact {fact}"));
                Some(fact.meta)
            }
            ItemId::Rule(id) => {
                let rule = self.rules.shift_remove(&id)?;
                self.trace.detail(format_args!("removed rule {rule}"));
                let Rule { lhs, rhs, meta } = rule;
                self.rule_index.swap_remove(&(lhs, rhs));
                Some(meta)
            }
        }
    }

    fn lookup(&self, knowledge: &Knowledge) -> Option<ItemId> {
        match knowledge {
            Knowledge::Fact(statement) => self.find_fact(statement).map(ItemId::Fact),
            Knowledge::Rule { lhs, rhs } => self.find_rule(lhs, rhs).map(ItemId::Rule),
        }
    }

    fn meta(&self, id: ItemId) -> Option<&Provenance> {
        match id {
            ItemId::Fact(id) => self.facts.get(&id).map(|fact| &fact.meta),
            ItemId::Rule(id) => self.rules.get(&id).map(|rule| &rule.meta),
        }
    }

    fn meta_mut(&mut self, id: ItemId) -> Option<&mut Provenance> {
        match id {
            ItemId::Fact(id) => self.facts.get_mut(&id).map(|fact| &mut fact.meta),
            ItemId::Rule(id) => self.rules.get_mut(&id).map(|rule| &mut rule.meta),
        }
    }

    fn describe(&self, id: ItemId) -> String {
        match id {
            ItemId::Fact(id) => self
                .facts
                .get(&id)
                .map_or_else(|| format!("{id:?}"), |fact| fact.statement.to_string()),
            ItemId::Rule(id) => self
                .rules
                .get(&id)
                .map_or_else(|| format!("{id:?}"), ToString::to_string),
        }
    }

    /// Handle of the stored fact structurally equal to `statement`.
    #[must_use]
    pub fn find_fact(&self, statement: &Statement) -> Option<FactId> {
        self.fact_index.get(statement).copied()
    }

    /// Handle of the stored rule structurally equal to `lhs -> rhs`.
    #[must_use]
    pub fn find_rule(&self, lhs: &[Statement], rhs: &Statement) -> Option<RuleId> {
        self.rule_index.get(&(lhs.to_vec(), rhs.clone())).copied()
    }

    /// The stored fact behind `id`, if it is still present.
    #[must_use]
    pub fn fact(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(&id)
    }

    /// The stored rule behind `id`, if it is still present.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(&id)
    }

    /// All stored facts in insertion order.
    pub fn facts(&self) -> impl Iterator<Item = (FactId, &Fact)> {
        self.facts.iter().map(|(&id, fact)| (id, fact))
    }

    /// All stored rules in insertion order.
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().map(|(&id, rule)| (id, rule))
    }

    /// Number of stored facts.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Number of stored rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// True when no fact or rule is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.rules.is_empty()
    }

    /// Checks the provenance bookkeeping:
    /// - every item is asserted or supported,
    /// - every support pair names live items that list the supported item,
    /// - every listed dependent carries a pair naming its supporter,
    /// - the structural indexes cover exactly the stored items.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::Invariant`] describing the first violation found.
    pub fn verify(&self) -> KbResult<()> {
        let items = self
            .facts
            .iter()
            .map(|(&id, fact)| (ItemId::Fact(id), &fact.meta))
            .chain(
                self.rules
                    .iter()
                    .map(|(&id, rule)| (ItemId::Rule(id), &rule.meta)),
            );

        for (id, meta) in items {
            if !meta.is_justified() {
                return Err(KbError::Invariant(format!(
                    "{} is neither asserted nor supported",
                    self.describe(id)
                )));
            }

            for support in &meta.supported_by {
                let linked = [ItemId::Rule(support.rule), ItemId::Fact(support.fact)]
                    .into_iter()
                    .all(|member| {
                        self.meta(member)
                            .is_some_and(|m| m.dependents().any(|dependent| dependent == id))
                    });
                if !linked {
                    return Err(KbError::Invariant(format!(
                        "support {support:?} of {} is dangling",
                        self.describe(id)
                    )));
                }
            }

            for dependent in meta.dependents() {
                let backed = self
                    .meta(dependent)
                    .is_some_and(|m| m.supported_by.iter().any(|s| s.involves(id)));
                if !backed {
                    return Err(KbError::Invariant(format!(
                        "{} lists {} as a dependent it does not support",
                        self.describe(id),
                        self.describe(dependent)
                    )));
                }
            }
        }

        if self.fact_index.len() != self.facts.len() || self.rule_index.len() != self.rules.len() {
            return Err(KbError::Invariant(
                "structural index out of sync with the store".to_string(),
            ));
        }
        Ok(())
    }

    fn check_invariants(&self) {
        if cfg!(debug_assertions) && self.config.check_invariants {
            let verdict = self.verify();
            debug_assert!(verdict.is_ok(), "{verdict:?}");
        }
    }
}

impl<U> fmt::Display for KnowledgeBase<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Knowledge Base:")?;
        for fact in self.facts.values() {
            writeln!(f, "{fact}")?;
        }
        for rule in self.rules.values() {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}
