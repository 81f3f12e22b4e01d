use super::errors::AssociativeError;
use crate::query_object::Scalar;
use crate::relation_path::NamingTemplates;
use crate::schema_catalog::entity_schema::is_bare_identifier;
use crate::sql_generator::common::placeholders;
use crate::sql_generator::SqlPlan;

/// Statements over one join table `(left, right[, create_user])`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociativeSqlBuilder {
    table: String,
    left: String,
    right: String,
    create_user_column: Option<String>,
}

fn check_identifier(name: &str) -> Result<(), AssociativeError> {
    if is_bare_identifier(name) {
        Ok(())
    } else {
        Err(AssociativeError::InvalidDefinition(format!(
            "`{}` is not a plain identifier",
            name
        )))
    }
}

impl AssociativeSqlBuilder {
    pub fn new(table: &str, left: &str, right: &str) -> Result<Self, AssociativeError> {
        for name in [table, left, right] {
            check_identifier(name)?;
        }
        Ok(AssociativeSqlBuilder {
            table: table.to_string(),
            left: left.to_string(),
            right: right.to_string(),
            create_user_column: None,
        })
    }

    /// Join table and keys of two adjacent domains, e.g. `j_user_and_role(user_id, role_id)`.
    pub fn for_domains(
        naming: &NamingTemplates,
        left_domain: &str,
        right_domain: &str,
    ) -> Result<Self, AssociativeError> {
        Self::new(
            &naming.join_table_name(left_domain, right_domain),
            &naming.join_id(left_domain),
            &naming.join_id(right_domain),
        )
    }

    /// Stamp inserted rows with the creating user's id
    pub fn with_create_user_column(mut self, column: &str) -> Result<Self, AssociativeError> {
        check_identifier(column)?;
        self.create_user_column = Some(column.to_string());
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn build_count(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> SqlPlan {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            self.table,
            self.membership(left_ids, right_ids)
        );
        SqlPlan::new(sql, concat(left_ids, right_ids))
    }

    /// One row per `(left, right)` pair of the Cartesian product.
    pub fn build_allocate(&self, left_ids: &[Scalar], right_ids: &[Scalar], user_id: Option<&Scalar>) -> SqlPlan {
        let stamp = self.create_user_column.as_ref().zip(user_id);

        let mut columns = vec![self.left.as_str(), self.right.as_str()];
        if let Some((column, _)) = stamp {
            columns.push(column.as_str());
        }
        let row = placeholders(columns.len());

        let mut rows = Vec::with_capacity(left_ids.len() * right_ids.len());
        let mut args = Vec::with_capacity(rows.capacity() * columns.len());
        for left in left_ids {
            for right in right_ids {
                rows.push(row.clone());
                args.push(left.clone());
                args.push(right.clone());
                if let Some((_, user)) = stamp {
                    args.push(user.clone());
                }
            }
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            columns.join(", "),
            rows.join(", ")
        );
        SqlPlan::new(sql, args)
    }

    pub fn build_deallocate(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> SqlPlan {
        let sql = format!(
            "DELETE FROM {}{}",
            self.table,
            self.membership(left_ids, right_ids)
        );
        SqlPlan::new(sql, concat(left_ids, right_ids))
    }

    pub fn build_get_by_left(&self, left_id: &Scalar) -> SqlPlan {
        self.select_column(&self.right, &self.left, left_id)
    }

    pub fn build_get_by_right(&self, right_id: &Scalar) -> SqlPlan {
        self.select_column(&self.left, &self.right, right_id)
    }

    pub fn build_delete_by_left(&self, left_id: &Scalar) -> SqlPlan {
        self.delete_by(&self.left, left_id)
    }

    pub fn build_delete_by_right(&self, right_id: &Scalar) -> SqlPlan {
        self.delete_by(&self.right, right_id)
    }

    fn membership(&self, left_ids: &[Scalar], right_ids: &[Scalar]) -> String {
        format!(
            " WHERE {} IN {} AND {} IN {}",
            self.left,
            placeholders(left_ids.len()),
            self.right,
            placeholders(right_ids.len())
        )
    }

    fn select_column(&self, column: &str, key: &str, id: &Scalar) -> SqlPlan {
        SqlPlan::new(
            format!("SELECT {} FROM {} WHERE {} = ?", column, self.table, key),
            vec![id.clone()],
        )
    }

    fn delete_by(&self, key: &str, id: &Scalar) -> SqlPlan {
        SqlPlan::new(
            format!("DELETE FROM {} WHERE {} = ?", self.table, key),
            vec![id.clone()],
        )
    }
}

fn concat(left: &[Scalar], right: &[Scalar]) -> Vec<Scalar> {
    left.iter().chain(right.iter()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[i64]) -> Vec<Scalar> {
        values.iter().map(|v| Scalar::Int(*v)).collect()
    }

    fn builder() -> AssociativeSqlBuilder {
        AssociativeSqlBuilder::for_domains(&NamingTemplates::default(), "user", "role").unwrap()
    }

    #[test]
    fn test_count_and_deallocate() {
        let plan = builder().build_count(&ids(&[1, 2]), &ids(&[3]));
        assert_eq!(
            plan.sql,
            "SELECT COUNT(*) FROM j_user_and_role WHERE user_id IN (?, ?) AND role_id IN (?)"
        );
        assert_eq!(plan.args, ids(&[1, 2, 3]));

        let plan = builder().build_deallocate(&ids(&[1]), &ids(&[2, 3]));
        assert_eq!(
            plan.sql,
            "DELETE FROM j_user_and_role WHERE user_id IN (?) AND role_id IN (?, ?)"
        );
    }

    #[test]
    fn test_allocate_cartesian_product() {
        let plan = builder().build_allocate(&ids(&[1, 2]), &ids(&[3, 4]), None);
        assert_eq!(
            plan.sql,
            "INSERT INTO j_user_and_role (user_id, role_id) VALUES (?, ?), (?, ?), (?, ?), (?, ?)"
        );
        assert_eq!(plan.args, ids(&[1, 3, 1, 4, 2, 3, 2, 4]));
    }

    #[test]
    fn test_allocate_with_create_user() {
        let builder = builder().with_create_user_column("create_user_id").unwrap();
        let plan = builder.build_allocate(&ids(&[1]), &ids(&[3, 4]), Some(&Scalar::Int(9)));
        assert_eq!(
            plan.sql,
            "INSERT INTO j_user_and_role (user_id, role_id, create_user_id) VALUES (?, ?, ?), (?, ?, ?)"
        );
        assert_eq!(plan.args, ids(&[1, 3, 9, 1, 4, 9]));

        // no user known: column left to its default
        let plan = builder.build_allocate(&ids(&[1]), &ids(&[3]), None);
        assert_eq!(plan.sql, "INSERT INTO j_user_and_role (user_id, role_id) VALUES (?, ?)");
    }

    #[test]
    fn test_single_column_statements() {
        let b = builder();
        assert_eq!(
            b.build_get_by_left(&Scalar::Int(1)).sql,
            "SELECT role_id FROM j_user_and_role WHERE user_id = ?"
        );
        assert_eq!(
            b.build_get_by_right(&Scalar::Int(1)).sql,
            "SELECT user_id FROM j_user_and_role WHERE role_id = ?"
        );
        assert_eq!(
            b.build_delete_by_left(&Scalar::Int(1)).sql,
            "DELETE FROM j_user_and_role WHERE user_id = ?"
        );
        assert_eq!(
            b.build_delete_by_right(&Scalar::Int(2)).args,
            vec![Scalar::Int(2)]
        );
    }

    #[test]
    fn test_rejects_non_identifiers() {
        assert!(matches!(
            AssociativeSqlBuilder::new("j_user_and_role; drop", "user_id", "role_id"),
            Err(AssociativeError::InvalidDefinition(_))
        ));
    }
}
