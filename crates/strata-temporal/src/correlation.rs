//! Event correlation: one id per top-level mutation and everything it cascades to.

use uuid::Uuid;

use crate::context::UnitOfWork;

/// The unit of work's correlation id. An explicit `correlation_id` override
/// wins; otherwise an id is generated on first use and reused until cleared.
pub fn ensure_correlation_id(uow: &mut UnitOfWork) -> Uuid {
    if let Some(explicit) = uow.current().correlation_id {
        return explicit;
    }
    *uow.generated_correlation.get_or_insert_with(Uuid::new_v4)
}

/// Forget the generated id. Does nothing while a transaction is open, so
/// every version written by one transaction shares the same id.
pub fn clear_correlation_id(uow: &mut UnitOfWork) {
    if !uow.in_transaction() {
        uow.generated_correlation = None;
    }
}

impl UnitOfWork {
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        ensure_correlation_id(self)
    }

    pub fn clear_correlation_id(&mut self) {
        clear_correlation_id(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::models::ContextOverrides;

    #[test]
    fn generated_id_is_stable_until_cleared() {
        let mut uow = UnitOfWork::new();
        let first = uow.ensure_correlation_id();
        assert_eq!(uow.ensure_correlation_id(), first);
        uow.clear_correlation_id();
        assert_ne!(uow.ensure_correlation_id(), first);
    }

    #[test]
    fn clearing_inside_a_transaction_is_deferred() {
        let mut uow = UnitOfWork::new();
        uow.enter_transaction();
        let id = uow.ensure_correlation_id();
        uow.clear_correlation_id();
        assert_eq!(uow.ensure_correlation_id(), id);
        uow.exit_transaction();
        uow.clear_correlation_id();
        assert_ne!(uow.ensure_correlation_id(), id);
    }

    #[test]
    fn explicit_override_wins() {
        let explicit = Uuid::new_v4();
        let mut uow = UnitOfWork::new();
        let generated = uow.ensure_correlation_id();
        uow.with_context(ContextOverrides::new().correlation_id(explicit), |uow| {
            assert_eq!(uow.ensure_correlation_id(), explicit);
        });
        assert_eq!(uow.ensure_correlation_id(), generated);
    }
}
