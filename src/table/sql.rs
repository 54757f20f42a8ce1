//! SQL text generated for a table.
//!
//! Column lists are comma separated without spaces, assignments use
//! `name = ?` joined by `", "`, and key predicates are joined by `" AND "`.

/// `A,B,C`
pub(crate) fn field_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns.into_iter().collect::<Vec<_>>().join(",")
}

fn assignments<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_predicate<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub(crate) fn select(fields: &str, table: &str, where_clause: &str, order_by: &str) -> String {
    let mut sql = format!("SELECT {} FROM {}", fields, table);
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

pub(crate) fn count(table: &str, where_clause: &str) -> String {
    select("COUNT(*)", table, where_clause, "")
}

pub(crate) fn insert<'a>(table: &str, columns: impl IntoIterator<Item = &'a str>) -> String {
    let columns: Vec<&str> = columns.into_iter().collect();
    let markers = vec!["?"; columns.len()].join(",");
    format!(
        "INSERT INTO {} ({}) VALUES({})",
        table,
        columns.join(","),
        markers
    )
}

pub(crate) fn update_pk<'a>(
    table: &str,
    set: impl IntoIterator<Item = &'a str>,
    keys: impl IntoIterator<Item = &'a str>,
) -> String {
    format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments(set),
        key_predicate(keys)
    )
}

pub(crate) fn update_where<'a>(
    table: &str,
    set: impl IntoIterator<Item = &'a str>,
    where_clause: &str,
) -> String {
    format!("UPDATE {} SET {} WHERE {}", table, assignments(set), where_clause)
}

pub(crate) fn delete_pk<'a>(table: &str, keys: impl IntoIterator<Item = &'a str>) -> String {
    format!("DELETE FROM {} WHERE {}", table, key_predicate(keys))
}

pub(crate) fn delete_where(table: &str, where_clause: &str) -> String {
    format!("DELETE FROM {} WHERE {}", table, where_clause)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        let fields = field_list(["ID", "NAME"]);
        assert_eq!(fields, "ID,NAME");
        assert_eq!(select(&fields, "t", "", ""), "SELECT ID,NAME FROM t");
        assert_eq!(
            select(&fields, "dbo.t", "ID > 5", "ID DESC"),
            "SELECT ID,NAME FROM dbo.t WHERE ID > 5 ORDER BY ID DESC"
        );
        assert_eq!(select(&fields, "t", "", "NAME"), "SELECT ID,NAME FROM t ORDER BY NAME");
    }

    #[test]
    fn test_count() {
        assert_eq!(count("t", ""), "SELECT COUNT(*) FROM t");
        assert_eq!(count("t", "ID > 5"), "SELECT COUNT(*) FROM t WHERE ID > 5");
    }

    #[test]
    fn test_insert() {
        assert_eq!(insert("t", ["ID", "NAME"]), "INSERT INTO t (ID,NAME) VALUES(?,?)");
        assert_eq!(insert("t", ["ID"]), "INSERT INTO t (ID) VALUES(?)");
    }

    #[test]
    fn test_update_and_delete_by_key() {
        assert_eq!(update_pk("t", ["NAME"], ["ID"]), "UPDATE t SET NAME = ? WHERE ID = ?");
        assert_eq!(
            update_pk("t", ["NAME", "QTY"], ["ID", "LINE"]),
            "UPDATE t SET NAME = ?, QTY = ? WHERE ID = ? AND LINE = ?"
        );
        assert_eq!(delete_pk("t", ["ID"]), "DELETE FROM t WHERE ID = ?");
        assert_eq!(
            delete_pk("t", ["ID", "LINE"]),
            "DELETE FROM t WHERE ID = ? AND LINE = ?"
        );
    }

    #[test]
    fn test_where_based() {
        assert_eq!(
            update_where("t", ["NAME"], "ID < 3"),
            "UPDATE t SET NAME = ? WHERE ID < 3"
        );
        assert_eq!(delete_where("t", "ID < 3"), "DELETE FROM t WHERE ID < 3");
    }
}
