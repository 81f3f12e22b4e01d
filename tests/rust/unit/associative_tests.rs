use async_trait::async_trait;
use domainql::associative::{AssociativeError, AssociativeService, AssociativeSqlBuilder, DatabaseOperations};
use domainql::query_object::Scalar;
use domainql::relation_path::NamingTemplates;
use domainql::sql_generator::SqlPlan;
use std::sync::Mutex;

/// In-memory join table understanding the statements of one builder.
#[derive(Default)]
struct MemoryJoinTable {
    rows: Mutex<Vec<(Scalar, Scalar)>>,
}

impl MemoryJoinTable {
    /// Left and right id lists of a `l IN (..) AND r IN (..)` statement.
    fn membership(plan: &SqlPlan) -> (Vec<Scalar>, Vec<Scalar>) {
        let left_len = plan
            .sql
            .split(" AND ")
            .next()
            .map(|part| part.matches('?').count())
            .unwrap_or(0);
        let (left, right) = plan.args.split_at(left_len);
        (left.to_vec(), right.to_vec())
    }

    fn apply(&self, plan: &SqlPlan) -> u64 {
        let mut rows = self.rows.lock().unwrap();
        if plan.sql.starts_with("INSERT") {
            for pair in plan.args.chunks(2) {
                rows.push((pair[0].clone(), pair[1].clone()));
            }
            (plan.args.len() / 2) as u64
        } else if plan.sql.contains(" IN ") {
            let (left, right) = Self::membership(plan);
            let before = rows.len();
            rows.retain(|(l, r)| !(left.contains(l) && right.contains(r)));
            (before - rows.len()) as u64
        } else {
            let before = rows.len();
            let by_left = plan.sql.ends_with("user_id = ?");
            rows.retain(|(l, r)| if by_left { l != &plan.args[0] } else { r != &plan.args[0] });
            (before - rows.len()) as u64
        }
    }
}

#[async_trait]
impl DatabaseOperations for MemoryJoinTable {
    async fn count(&self, plan: SqlPlan) -> Result<u64, AssociativeError> {
        let (left, right) = Self::membership(&plan);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|(l, r)| left.contains(l) && right.contains(r))
            .count() as u64)
    }

    async fn update(&self, plan: SqlPlan) -> Result<u64, AssociativeError> {
        Ok(self.apply(&plan))
    }

    async fn query_column(&self, plan: SqlPlan) -> Result<Vec<Scalar>, AssociativeError> {
        let rows = self.rows.lock().unwrap();
        let by_left = plan.sql.ends_with("user_id = ?");
        Ok(rows
            .iter()
            .filter(|(l, r)| if by_left { l == &plan.args[0] } else { r == &plan.args[0] })
            .map(|(l, r)| if by_left { r.clone() } else { l.clone() })
            .collect())
    }

    async fn update_atomically(&self, plans: Vec<SqlPlan>) -> Result<Vec<u64>, AssociativeError> {
        Ok(plans.iter().map(|plan| self.apply(plan)).collect())
    }
}

fn ids(values: &[i64]) -> Vec<Scalar> {
    values.iter().map(|v| Scalar::Int(*v)).collect()
}

fn service() -> AssociativeService<MemoryJoinTable> {
    let builder = AssociativeSqlBuilder::for_domains(&NamingTemplates::default(), "user", "role").unwrap();
    AssociativeService::new(builder, MemoryJoinTable::default())
}

#[tokio::test]
async fn test_allocate_then_count_is_product() {
    let service = service();
    let (left, right) = (ids(&[1, 2, 3]), ids(&[10, 20]));

    assert_eq!(service.allocate(&left, &right).await.unwrap(), 6);
    assert_eq!(service.count(&left, &right).await.unwrap(), 6);
    assert!(service.exists(&ids(&[2]), &ids(&[20])).await.unwrap());
    assert!(!service.exists(&ids(&[4]), &ids(&[20])).await.unwrap());
}

#[tokio::test]
async fn test_empty_side_never_writes() {
    let service = service();
    assert_eq!(service.allocate(&[], &ids(&[1, 2])).await.unwrap(), 0);
    assert_eq!(service.deallocate(&ids(&[1]), &[]).await.unwrap(), 0);
    assert_eq!(service.count(&[], &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_reallocate_replaces_links() {
    let service = service();
    service.allocate(&ids(&[1]), &ids(&[10, 20])).await.unwrap();
    service.allocate(&ids(&[2]), &ids(&[10])).await.unwrap();

    assert_eq!(service.reallocate_for_left(&Scalar::Int(1), &ids(&[30])).await.unwrap(), 1);
    assert_eq!(service.get_by_left_id(&Scalar::Int(1)).await.unwrap(), ids(&[30]));
    assert_eq!(service.get_by_right_id(&Scalar::Int(10)).await.unwrap(), ids(&[2]));

    assert_eq!(service.reallocate_for_left(&Scalar::Int(2), &[]).await.unwrap(), 0);
    assert!(service.get_by_left_id(&Scalar::Int(2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deallocate_and_delete_by_side() {
    let service = service();
    service.allocate(&ids(&[1, 2]), &ids(&[10, 20])).await.unwrap();

    assert_eq!(service.deallocate(&ids(&[1]), &ids(&[10, 20])).await.unwrap(), 2);
    assert_eq!(service.delete_by_right_id(&Scalar::Int(20)).await.unwrap(), 1);
    assert_eq!(service.count(&ids(&[1, 2]), &ids(&[10, 20])).await.unwrap(), 1);
}
