//! Centralized physical naming for relationship chains.
//!
//! All table, join-table and join-key names MUST be produced here so that the
//! SQL and pipeline backends agree on every synthesized identifier.
//!
//! ## Naming Convention
//! - table: `table_format % domain` (default `t_%s`)
//! - join table: `join_table_format % (left, right)` (default `j_%s_and_%s`)
//! - join key: `join_id_format % domain` (default `%s_id`)
//! - join alias: `j{hop}{left initial}{right initial}`, target alias: domain initial
//!
//! Examples:
//! - `user` → `t_user`
//! - `("user", "role")` → `j_user_and_role`, alias `j0ur`
//! - `role` → `role_id`

use serde::{Deserialize, Serialize};

/// Formatting templates for generated physical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplates {
    pub table_format: String,
    pub join_table_format: String,
    pub join_id_format: String,
}

impl Default for NamingTemplates {
    fn default() -> Self {
        Self {
            table_format: "t_%s".to_string(),
            join_table_format: "j_%s_and_%s".to_string(),
            join_id_format: "%s_id".to_string(),
        }
    }
}

impl NamingTemplates {
    /// Physical table (or collection) name of a domain.
    ///
    /// # Examples
    /// ```
    /// use domainql::relation_path::naming::NamingTemplates;
    /// assert_eq!(NamingTemplates::default().table_name("menu"), "t_menu");
    /// ```
    pub fn table_name(&self, domain: &str) -> String {
        format_template(&self.table_format, &[domain])
    }

    /// Associative table linking two adjacent domains.
    ///
    /// # Examples
    /// ```
    /// use domainql::relation_path::naming::NamingTemplates;
    /// assert_eq!(
    ///     NamingTemplates::default().join_table_name("role", "perm"),
    ///     "j_role_and_perm"
    /// );
    /// ```
    pub fn join_table_name(&self, left: &str, right: &str) -> String {
        format_template(&self.join_table_format, &[left, right])
    }

    /// Key column referencing a domain from an associative table.
    pub fn join_id(&self, domain: &str) -> String {
        format_template(&self.join_id_format, &[domain])
    }

    /// Alias of the associative table for hop `hop`.
    pub fn join_alias(&self, hop: usize, left: &str, right: &str) -> String {
        format!("j{}{}{}", hop, initial(left), initial(right))
    }

    /// Alias of a domain's own table.
    pub fn table_alias(&self, domain: &str) -> String {
        initial(domain).to_string()
    }
}

/// Substitute each `%s` in `template` with the next argument, left to right.
/// Surplus placeholders are left untouched.
pub fn format_template(template: &str, args: &[&str]) -> String {
    let mut result = String::with_capacity(template.len() + 16);
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("%s") {
        result.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => result.push_str(arg),
            None => result.push_str("%s"),
        }
        rest = &rest[pos + 2..];
    }
    result.push_str(rest);
    result
}

/// Number of `%s` placeholders in a template.
pub fn count_placeholders(template: &str) -> usize {
    template.matches("%s").count()
}

fn initial(domain: &str) -> char {
    domain.chars().next().unwrap_or('x')
}

/// `userName` → `user_name`
pub fn camel_to_underscore(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

/// `maxQty` with prefix `max` → `qty`
pub fn uncapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `roles` → `Roles`
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
