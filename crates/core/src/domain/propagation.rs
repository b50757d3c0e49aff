// Propagation Classifier - pure role decision, no I/O

use serde::{Deserialize, Serialize};

/// Declared policy for how a call relates to an existing transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Propagation {
    /// Join the current transaction; start a new one if none exists
    Required,
    /// Join the current transaction; run as plain logic if none exists
    Supports,
    /// Join the current transaction; fail if none exists
    Mandatory,
    /// Always start a new transaction, stacking on top of any current one
    RequiresNew,
}

/// How an intercepted call participates in a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRole {
    /// Originates a transaction: begin, run try, then commit or rollback
    Root,
    /// Joins an existing transaction carried by an incoming context
    Provider,
    /// Plain logic; any enlistment attaches to the already-active transaction
    Normal,
}

/// Legality precondition, checked before any state change: Mandatory
/// propagation needs either an active local transaction or an incoming
/// context. Violations are caller programming errors, never retried.
pub fn is_legal_context(
    propagation: Propagation,
    transaction_active: bool,
    has_context: bool,
) -> bool {
    !(propagation == Propagation::Mandatory && !transaction_active && !has_context)
}

/// Classify an intercepted call.
///
/// Root: Required with no local transaction and no incoming context, or
/// RequiresNew. Provider: Required/Mandatory with an incoming context and no
/// local transaction. Everything else is Normal, including nested compensable
/// calls inside an already-active transaction.
pub fn classify(
    propagation: Propagation,
    transaction_active: bool,
    has_context: bool,
) -> MethodRole {
    if (propagation == Propagation::Required && !transaction_active && !has_context)
        || propagation == Propagation::RequiresNew
    {
        MethodRole::Root
    } else if (propagation == Propagation::Required || propagation == Propagation::Mandatory)
        && !transaction_active
        && has_context
    {
        MethodRole::Provider
    } else {
        MethodRole::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Propagation::*;

    #[test]
    fn classification_truth_table() {
        // (propagation, transaction_active, has_context) -> role
        let table = [
            (Required, false, false, MethodRole::Root),
            (Required, false, true, MethodRole::Provider),
            (Required, true, false, MethodRole::Normal),
            (Required, true, true, MethodRole::Normal),
            (Supports, false, false, MethodRole::Normal),
            (Supports, false, true, MethodRole::Normal),
            (Supports, true, false, MethodRole::Normal),
            (Supports, true, true, MethodRole::Normal),
            (Mandatory, false, true, MethodRole::Provider),
            (Mandatory, true, false, MethodRole::Normal),
            (Mandatory, true, true, MethodRole::Normal),
            (RequiresNew, false, false, MethodRole::Root),
            (RequiresNew, false, true, MethodRole::Root),
            (RequiresNew, true, false, MethodRole::Root),
            (RequiresNew, true, true, MethodRole::Root),
        ];

        for (propagation, active, context, expected) in table {
            assert_eq!(
                classify(propagation, active, context),
                expected,
                "classify({:?}, {}, {})",
                propagation,
                active,
                context
            );
        }
    }

    #[test]
    fn mandatory_without_transaction_or_context_is_illegal() {
        assert!(!is_legal_context(Mandatory, false, false));

        // every other combination is legal
        assert!(is_legal_context(Mandatory, true, false));
        assert!(is_legal_context(Mandatory, false, true));
        for propagation in [Required, Supports, RequiresNew] {
            for active in [false, true] {
                for context in [false, true] {
                    assert!(is_legal_context(propagation, active, context));
                }
            }
        }
    }
}
