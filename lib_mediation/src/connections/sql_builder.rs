//! # Parameterized Query Builder
//!
//! Builds the stale-network delete, the one statement whose shape depends
//! on the request. `$1` is always the list id; kept names bind to `$2` and
//! up, in the set's order, so placeholders and arguments line up by
//! construction.

use std::collections::BTreeSet;

use tokio_postgres::types::ToSql;

use crate::priority::models::ListId;

const DELETE_LIST_NETWORKS: &str = "DELETE FROM priority_networks WHERE priority_list_id = $1";

/// `count` comma-separated placeholders numbered from `first`.
/// `numbered_placeholders(2, 3)` is `"$2, $3, $4"`.
pub fn numbered_placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `DELETE ... WHERE priority_list_id = $1 AND network_name NOT IN (...)` with
/// its bound arguments.
///
/// With no names to keep the `NOT IN` clause is left out, which deletes
/// every network of the list.
pub struct DeleteNotInQuery<'a> {
    sql: String,
    params: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> DeleteNotInQuery<'a> {
    pub fn new(list_id: &'a ListId, keep_names: &'a BTreeSet<String>) -> Self {
        let sql = if keep_names.is_empty() {
            DELETE_LIST_NETWORKS.to_string()
        } else {
            format!(
                "{} AND network_name NOT IN ({})",
                DELETE_LIST_NETWORKS,
                numbered_placeholders(2, keep_names.len())
            )
        };

        let mut params: Vec<&'a (dyn ToSql + Sync)> = Vec::with_capacity(keep_names.len() + 1);
        params.push(list_id);
        for name in keep_names {
            params.push(name);
        }

        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[&'a (dyn ToSql + Sync)] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn placeholder_count(sql: &str) -> usize {
        sql.matches('$').count()
    }

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(numbered_placeholders(2, 3), "$2, $3, $4");
        assert_eq!(numbered_placeholders(2, 1), "$2");
        assert_eq!(numbered_placeholders(2, 0), "");
    }

    #[test]
    fn test_no_names_drops_not_in_clause() {
        let list_id: ListId = 7;
        let names = keep(&[]);
        let query = DeleteNotInQuery::new(&list_id, &names);

        assert_eq!(
            query.sql(),
            "DELETE FROM priority_networks WHERE priority_list_id = $1"
        );
        assert!(!query.sql().contains("NOT IN ()"));
        assert_eq!(query.params().len(), 1);
    }

    #[test]
    fn test_single_name() {
        let list_id: ListId = 7;
        let names = keep(&["AdMob"]);
        let query = DeleteNotInQuery::new(&list_id, &names);

        assert_eq!(
            query.sql(),
            "DELETE FROM priority_networks WHERE priority_list_id = $1 AND network_name NOT IN ($2)"
        );
        assert_eq!(query.params().len(), 2);
    }

    #[test]
    fn test_placeholders_align_with_params() {
        let list_id: ListId = 7;
        for size in [1usize, 2, 9, 10, 25] {
            let names: BTreeSet<String> = (0..size).map(|i| format!("Network{}", i)).collect();
            let query = DeleteNotInQuery::new(&list_id, &names);

            assert_eq!(placeholder_count(query.sql()), query.params().len());
            assert!(query.sql().ends_with(&format!("${})", size + 1)));
        }
    }
}
