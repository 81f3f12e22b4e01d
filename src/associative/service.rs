use super::errors::AssociativeError;
use super::sql_builder::AssociativeSqlBuilder;
use crate::query_object::Scalar;
use crate::sql_generator::SqlPlan;
use async_trait::async_trait;
use std::sync::Arc;

/// Driver the statements run against.
#[async_trait]
pub trait DatabaseOperations: Send + Sync {
    /// Run a `SELECT COUNT(*)` style statement
    async fn count(&self, plan: SqlPlan) -> Result<u64, AssociativeError>;

    /// Run an insert/delete, returning affected rows
    async fn update(&self, plan: SqlPlan) -> Result<u64, AssociativeError>;

    /// Values of the single selected column
    async fn query_column(&self, plan: SqlPlan) -> Result<Vec<Scalar>, AssociativeError>;

    /// Run every statement in one transaction; nothing is applied when one fails.
    async fn update_atomically(&self, plans: Vec<SqlPlan>) -> Result<Vec<u64>, AssociativeError>;
}

/// Id of the user performing an allocation.
pub trait UserIdProvider: Send + Sync {
    fn user_id(&self) -> Option<Scalar>;
}

pub struct AssociativeService<D: DatabaseOperations> {
    builder: AssociativeSqlBuilder,
    database: D,
    user_ids: Option<Arc<dyn UserIdProvider>>,
}

impl<D: DatabaseOperations> AssociativeService<D> {
    pub fn new(builder: AssociativeSqlBuilder, database: D) -> Self {
        AssociativeService {
            builder,
            database,
            user_ids: None,
        }
    }

    pub fn with_user_id_provider(mut self, provider: Arc<dyn UserIdProvider>) -> Self {
        self.user_ids = Some(provider);
        self
    }

    pub fn builder(&self) -> &AssociativeSqlBuilder {
        &self.builder
    }

    /// Number of existing `(left, right)` pairs; 0 when either side is empty.
    pub async fn count(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> Result<u64, AssociativeError> {
        if left_ids.is_empty() || right_ids.is_empty() {
            log::debug!("count skipped: empty id set");
            return Ok(0);
        }
        self.database
            .count(self.builder.build_count(left_ids, right_ids))
            .await
    }

    pub async fn exists(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> Result<bool, AssociativeError> {
        Ok(self.count(left_ids, right_ids).await? > 0)
    }

    /// Insert every `(left, right)` pair.
    pub async fn allocate(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> Result<u64, AssociativeError> {
        match self.allocate_plan(left_ids, right_ids) {
            Some(plan) => self.database.update(plan).await,
            None => Ok(0),
        }
    }

    pub async fn deallocate(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> Result<u64, AssociativeError> {
        if left_ids.is_empty() || right_ids.is_empty() {
            log::debug!("deallocate skipped: empty id set");
            return Ok(0);
        }
        self.database
            .update(self.builder.build_deallocate(left_ids, right_ids))
            .await
    }

    /// Replace the right side linked to `left_id` with `right_ids`.
    ///
    /// Returns the number of inserted pairs.
    pub async fn reallocate_for_left(&self, left_id: &Scalar, right_ids: &[Scalar]) -> Result<u64, AssociativeError> {
        let delete = self.builder.build_delete_by_left(left_id);
        let insert = self.allocate_plan(std::slice::from_ref(left_id), right_ids);
        self.replace(delete, insert).await
    }

    /// Replace the left side linked to `right_id` with `left_ids`.
    pub async fn reallocate_for_right(&self, right_id: &Scalar, left_ids: &[Scalar]) -> Result<u64, AssociativeError> {
        let delete = self.builder.build_delete_by_right(right_id);
        let insert = self.allocate_plan(left_ids, std::slice::from_ref(right_id));
        self.replace(delete, insert).await
    }

    pub async fn get_by_left_id(&self, left_id: &Scalar) -> Result<Vec<Scalar>, AssociativeError> {
        self.database
            .query_column(self.builder.build_get_by_left(left_id))
            .await
    }

    pub async fn get_by_right_id(&self, right_id: &Scalar) -> Result<Vec<Scalar>, AssociativeError> {
        self.database
            .query_column(self.builder.build_get_by_right(right_id))
            .await
    }

    pub async fn delete_by_left_id(&self, left_id: &Scalar) -> Result<u64, AssociativeError> {
        self.database
            .update(self.builder.build_delete_by_left(left_id))
            .await
    }

    pub async fn delete_by_right_id(&self, right_id: &Scalar) -> Result<u64, AssociativeError> {
        self.database
            .update(self.builder.build_delete_by_right(right_id))
            .await
    }

    fn allocate_plan(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> Option<SqlPlan> {
        if left_ids.is_empty() || right_ids.is_empty() {
            log::debug!("allocate skipped: empty id set");
            return None;
        }
        let user_id = self.user_ids.as_ref().and_then(|p| p.user_id());
        Some(
            self.builder
                .build_allocate(left_ids, right_ids, user_id.as_ref()),
        )
    }

    async fn replace(&self, delete: SqlPlan, insert: Option<SqlPlan>) -> Result<u64, AssociativeError> {
        let mut plans = vec![delete];
        plans.extend(insert);
        let inserting = plans.len() > 1;

        let affected = self.database.update_atomically(plans).await?;
        log::info!("Reallocated {}: {:?} rows affected", self.builder.table(), affected);
        Ok(if inserting {
            affected.get(1).copied().unwrap_or(0)
        } else {
            0
        })
    }
}
