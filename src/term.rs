use indexmap::{IndexMap, IndexSet};
use std::borrow::Cow;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A term inside a statement
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Term {
    /// A variable that can be unified with any term (written `?x`)
    Variable(String),
    /// A concrete constant (e.g., `cube`, `red`)
    Constant(String),
}

impl Term {
    /// Creates a variable term. The name is stored without the `?` prefix.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Creates a constant term.
    pub fn constant(name: impl Into<String>) -> Self {
        Self::Constant(name.into())
    }

    /// Returns true for [`Term::Variable`].
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// The bare name of the variable or constant.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Variable(name) | Self::Constant(name) => name,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "?{name}"),
            Self::Constant(name) => f.write_str(name),
        }
    }
}

/// A predicate applied to an ordered list of terms (e.g., `(on ?x table)`)
///
/// Statements compare structurally: same predicate, same terms in the same order.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Statement {
    /// The name of the predicate (e.g., `"isa"`, `"on"`)
    pub predicate: String,
    /// The arguments of the predicate
    pub terms: Vec<Term>,
}

impl Statement {
    /// Creates a statement from a predicate and its terms.
    pub fn new(predicate: impl Into<String>, terms: Vec<Term>) -> Self {
        Self {
            predicate: predicate.into(),
            terms,
        }
    }

    /// True when no term is a variable.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        !self.terms.iter().any(Term::is_variable)
    }

    /// Names of the variables in this statement, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|term| match term {
            Term::Variable(name) => Some(name.as_str()),
            Term::Constant(_) => None,
        })
    }

    /// Renames every variable that also appears in `taken`, appending `'`
    /// until the name is fresh. Borrows `self` when nothing collides.
    #[must_use]
    pub fn renamed_apart(&self, taken: &IndexSet<&str>) -> Cow<'_, Self> {
        if !self.variables().any(|var| taken.contains(var)) {
            return Cow::Borrowed(self);
        }

        let own: IndexSet<&str> = self.variables().collect();
        let mut renaming = Substitution::new();
        for var in own.iter().copied().filter(|var| taken.contains(var)) {
            let mut fresh = format!("{var}'");
            while taken.contains(fresh.as_str()) || own.contains(fresh.as_str()) {
                fresh.push('\'');
            }
            renaming.bind(var, Term::Variable(fresh));
        }
        Cow::Owned(Self {
            predicate: self.predicate.clone(),
            terms: self.terms.iter().map(|term| renaming.apply(term)).collect(),
        })
    }

    /// True when the predicate and every term have non-empty names.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.predicate.is_empty() && self.terms.iter().all(|term| !term.name().is_empty())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for term in &self.terms {
            write!(f, " {term}")?;
        }
        f.write_str(")")
    }
}

/// A mapping from variable names to the terms they are bound to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Substitution {
    bindings: IndexMap<String, Term>,
}

impl Substitution {
    /// Creates an empty substitution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The term bound to `variable`, if any.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.bindings.get(variable)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates over `(variable, term)` pairs in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(var, term)| (var.as_str(), term))
    }

    /// Binds `variable` to `term`, replacing any previous binding.
    pub fn bind(&mut self, variable: impl Into<String>, term: Term) {
        self.bindings.insert(variable.into(), term);
    }

    /// Follows variable bindings until reaching a constant or an unbound variable.
    fn walk<'a>(&'a self, mut term: &'a Term) -> &'a Term {
        while let Term::Variable(name) = term {
            match self.bindings.get(name) {
                Some(next) => term = next,
                None => break,
            }
        }
        term
    }

    /// Extends the substitution so that both terms resolve to the same value,
    /// binding the right-hand variable when both sides are variables.
    /// Returns false on a conflict between two different constants.
    fn unify_terms(&mut self, left: &Term, right: &Term) -> bool {
        let left = self.walk(left).clone();
        let right = self.walk(right).clone();

        if left == right {
            return true;
        }
        match (&left, &right) {
            (_, Term::Variable(var)) => {
                self.bindings.insert(var.clone(), left.clone());
                true
            }
            (Term::Variable(var), _) => {
                self.bindings.insert(var.clone(), right.clone());
                true
            }
            _ => false,
        }
    }

    /// Collapses binding chains so every variable maps to its final value.
    fn resolved(&self) -> Self {
        let bindings = self
            .bindings
            .iter()
            .map(|(var, term)| (var.clone(), self.walk(term).clone()))
            .collect();
        Self { bindings }
    }

    /// Applies the substitution to a single term.
    #[must_use]
    pub fn apply(&self, term: &Term) -> Term {
        self.walk(term).clone()
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (var, term)) in self.bindings.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "?{var} : {term}")?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Term)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (String, Term)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Matching and substitution primitives used by the knowledge base.
///
/// The knowledge base never inspects terms itself; every match during `ask`
/// and during forward chaining goes through this trait.
pub trait Unifier {
    /// Returns a substitution that makes both statements identical, or `None`
    /// when they cannot be unified. Identical ground statements unify with an
    /// empty substitution.
    ///
    /// `left` is the stored statement and `right` the pattern. Variables of
    /// `left` that share a name with a variable of `right` are renamed apart
    /// first, so the substitution may mention the renamed names.
    fn unify(&self, left: &Statement, right: &Statement) -> Option<Substitution>;

    /// Replaces every bound variable of `statement`; unbound ones are kept.
    fn instantiate(&self, statement: &Statement, substitution: &Substitution) -> Statement;
}

/// Plain syntactic unification over flat statements
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntacticUnifier;

impl Unifier for SyntacticUnifier {
    fn unify(&self, left: &Statement, right: &Statement) -> Option<Substitution> {
        if left.predicate != right.predicate || left.terms.len() != right.terms.len() {
            return None;
        }

        let taken: IndexSet<&str> = right.variables().collect();
        let left = left.renamed_apart(&taken);

        let mut substitution = Substitution::new();
        left.terms
            .iter()
            .zip(&right.terms)
            .all(|(l, r)| substitution.unify_terms(l, r))
            .then(|| substitution.resolved())
    }

    fn instantiate(&self, statement: &Statement, substitution: &Substitution) -> Statement {
        Statement {
            predicate: statement.predicate.clone(),
            terms: statement
                .terms
                .iter()
                .map(|term| substitution.apply(term))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(predicate: &str, terms: &[&str]) -> Statement {
        Statement::new(
            predicate,
            terms
                .iter()
                .map(|t| match t.strip_prefix('?') {
                    Some(var) => Term::var(var),
                    None => Term::constant(*t),
                })
                .collect(),
        )
    }

    #[test]
    fn test_ground_statement_matches_pattern() {
        let subst = SyntacticUnifier
            .unify(&stmt("on", &["a", "table"]), &stmt("on", &["?x", "?y"]))
            .expect("should unify");

        assert_eq!(subst.get("x"), Some(&Term::constant("a")));
        assert_eq!(subst.get("y"), Some(&Term::constant("table")));
    }

    #[test]
    fn test_identical_ground_statements_unify_with_empty_substitution() {
        let subst = SyntacticUnifier.unify(&stmt("isa", &["cube", "block"]), &stmt("isa", &["cube", "block"]));
        assert_eq!(subst, Some(Substitution::new()));
    }

    #[test]
    fn test_predicate_and_constant_mismatch() {
        assert!(SyntacticUnifier
            .unify(&stmt("on", &["a", "b"]), &stmt("above", &["a", "b"]))
            .is_none());
        assert!(SyntacticUnifier
            .unify(&stmt("on", &["a", "b"]), &stmt("on", &["a", "c"]))
            .is_none());
        assert!(SyntacticUnifier
            .unify(&stmt("on", &["a"]), &stmt("on", &["a", "b"]))
            .is_none());
    }

    #[test]
    fn test_conflicting_bindings_fail() {
        // (same ?x ?x) cannot match (same a b)
        assert!(SyntacticUnifier
            .unify(&stmt("same", &["a", "b"]), &stmt("same", &["?x", "?x"]))
            .is_none());

        let subst = SyntacticUnifier
            .unify(&stmt("same", &["c", "c"]), &stmt("same", &["?x", "?x"]))
            .expect("repeated variable with equal values");
        assert_eq!(subst.get("x"), Some(&Term::constant("c")));
    }

    #[test]
    fn test_variable_chains_are_resolved() {
        // ?x -> ?z, then ?z -> a; ?x must end up as a
        let subst = SyntacticUnifier
            .unify(&stmt("p", &["?z", "?z"]), &stmt("p", &["?x", "a"]))
            .expect("should unify");
        assert_eq!(subst.get("x"), Some(&Term::constant("a")));
        assert_eq!(subst.get("z"), Some(&Term::constant("a")));
    }

    #[test]
    fn test_pattern_variable_is_bound_to_stored_variable() {
        let subst = SyntacticUnifier
            .unify(&stmt("r", &["a", "?z"]), &stmt("r", &["?x", "?y"]))
            .expect("should unify");
        assert_eq!(subst.get("y"), Some(&Term::var("z")));
        assert_eq!(subst.get("z"), None);
    }

    #[test]
    fn test_shared_variable_names_are_renamed_apart() {
        // (r a ?y) and (r ?y b) only unify once the stored ?y is renamed
        let subst = SyntacticUnifier
            .unify(&stmt("r", &["a", "?y"]), &stmt("r", &["?y", "b"]))
            .expect("should unify after renaming");
        assert_eq!(subst.get("y"), Some(&Term::constant("a")));
        assert_eq!(subst.get("y'"), Some(&Term::constant("b")));

        let rule_side = stmt("r", &["?x", "?y"]);
        let subst = SyntacticUnifier
            .unify(&stmt("r", &["a", "?x"]), &rule_side)
            .expect("should unify");
        assert_eq!(
            SyntacticUnifier.instantiate(&rule_side, &subst),
            stmt("r", &["a", "?x'"])
        );
    }

    #[test]
    fn test_renamed_apart_picks_fresh_names() {
        let taken: IndexSet<&str> = ["x", "x'"].into_iter().collect();

        let ground = stmt("p", &["a"]);
        assert!(matches!(ground.renamed_apart(&taken), Cow::Borrowed(_)));

        let original = stmt("p", &["?x", "?y", "?x"]);
        let renamed = original.renamed_apart(&taken);
        assert_eq!(*renamed, stmt("p", &["?x''", "?y", "?x''"]));
    }

    #[test]
    fn test_instantiate_keeps_unbound_variables() {
        let mut subst = Substitution::new();
        subst.bind("x", Term::constant("a"));

        let result = SyntacticUnifier.instantiate(&stmt("on", &["?x", "?z"]), &subst);
        assert_eq!(result, stmt("on", &["a", "?z"]));
        assert!(!result.is_ground());
        assert_eq!(result.variables().collect::<Vec<_>>(), vec!["z"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(stmt("on", &["?x", "table"]).to_string(), "(on ?x table)");

        let subst: Substitution = [
            ("x".to_string(), Term::constant("a")),
            ("y".to_string(), Term::constant("b")),
        ]
        .into_iter()
        .collect();
        assert_eq!(subst.to_string(), "?x : a, ?y : b");
    }

    #[test]
    fn test_well_formed() {
        assert!(stmt("on", &["?x", "table"]).is_well_formed());
        assert!(!Statement::new("", vec![Term::constant("a")]).is_well_formed());
        assert!(!Statement::new("on", vec![Term::var("")]).is_well_formed());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_substitution_serializes_as_map() {
        let mut subst = Substitution::new();
        subst.bind("y", Term::constant("a"));

        let json = serde_json::to_value(&subst).unwrap();
        assert_eq!(json, serde_json::json!({ "y": { "Constant": "a" } }));
    }
}
