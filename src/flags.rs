//! Capability flags for columns and tables.

bitflags::bitflags! {
    /// Per-column capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColumnFlags: u16 {
        /// Column is part of the select field list.
        const SELECT = 0b0000_0001;
        /// Column is part of the INSERT statement.
        const INSERT = 0b0000_0010;
        /// Column can be written by UPDATE statements.
        const UPDATE = 0b0000_0100;
        /// Column is (part of) the primary key.
        const PRIMARY_KEY = 0b0000_1000;
        /// Column accepts NULL.
        const NULLABLE = 0b0001_0000;
    }
}

bitflags::bitflags! {
    /// Requested table capabilities. Gate which statements a table allocates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TableAccessFlags: u16 {
        const SELECT = 0b0000_0001;
        const INSERT = 0b0000_0010;
        const UPDATE_PK = 0b0000_0100;
        const UPDATE_WHERE = 0b0000_1000;
        const DELETE_PK = 0b0001_0000;
        const DELETE_WHERE = 0b0010_0000;

        const READ = Self::SELECT.bits();
        const UPDATE = Self::UPDATE_PK.bits() | Self::UPDATE_WHERE.bits();
        const DELETE = Self::DELETE_PK.bits() | Self::DELETE_WHERE.bits();
        const WRITE = Self::INSERT.bits() | Self::UPDATE.bits() | Self::DELETE.bits();
        const ALL = Self::READ.bits() | Self::WRITE.bits();
    }
}

bitflags::bitflags! {
    /// Options applied while opening a table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TableOpenFlags: u16 {
        /// Query the catalog for the table even if its info is already known.
        const CHECK_EXISTANCE = 0b0000_0001;
        /// Fail the open if the user lacks privileges for the requested access.
        const CHECK_PRIVILEGES = 0b0000_0010;
        /// Skip columns whose SQL type has no buffer type instead of failing.
        const SKIP_UNSUPPORTED_COLUMNS = 0b0000_0100;
        /// Never ask the catalog for primary keys.
        const DO_NOT_QUERY_PRIMARY_KEYS = 0b0000_1000;
        /// Open the select statement with a forward-only cursor.
        const FORWARD_ONLY_CURSORS = 0b0001_0000;
        /// Do not validate manual column SQL types against the database type infos.
        const IGNORE_DB_TYPE_INFOS = 0b0010_0000;
        /// Trim leading spaces from character values read through the table.
        const CHAR_TRIM_LEFT = 0b0100_0000;
        /// Trim trailing spaces from character values read through the table.
        const CHAR_TRIM_RIGHT = 0b1000_0000;
    }
}

bitflags::bitflags! {
    /// Table privileges granted to the connected user.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TablePrivileges: u8 {
        const SELECT = 0b0001;
        const INSERT = 0b0010;
        const UPDATE = 0b0100;
        const DELETE = 0b1000;
    }
}

impl ColumnFlags {
    /// Default column flags for an auto-discovered column.
    pub fn from_access(access: TableAccessFlags) -> Self {
        let mut flags = ColumnFlags::empty();
        if access.contains(TableAccessFlags::SELECT) {
            flags |= ColumnFlags::SELECT;
        }
        if access.contains(TableAccessFlags::INSERT) {
            flags |= ColumnFlags::INSERT;
        }
        if access.intersects(TableAccessFlags::UPDATE) {
            flags |= ColumnFlags::UPDATE;
        }
        flags
    }

    /// Capability flags of `self` that `access` does not grant.
    ///
    /// `PRIMARY_KEY` and `NULLABLE` are descriptive and never rejected.
    pub fn ungranted(self, access: TableAccessFlags) -> ColumnFlags {
        let granted = ColumnFlags::from_access(access);
        let capabilities = ColumnFlags::SELECT | ColumnFlags::INSERT | ColumnFlags::UPDATE;
        (self & capabilities) - granted
    }
}

impl TableAccessFlags {
    /// Privileges the connected user needs to use these access flags.
    pub fn required_privileges(self) -> TablePrivileges {
        let mut privileges = TablePrivileges::empty();
        // Key and WHERE based writes read the rows they touch.
        if self.intersects(TableAccessFlags::SELECT | TableAccessFlags::UPDATE | TableAccessFlags::DELETE) {
            privileges |= TablePrivileges::SELECT;
        }
        if self.contains(TableAccessFlags::INSERT) {
            privileges |= TablePrivileges::INSERT;
        }
        if self.intersects(TableAccessFlags::UPDATE) {
            privileges |= TablePrivileges::UPDATE;
        }
        if self.intersects(TableAccessFlags::DELETE) {
            privileges |= TablePrivileges::DELETE;
        }
        privileges
    }
}

impl TablePrivileges {
    /// Parse a catalog privilege name such as `SELECT` or `UPDATE`.
    pub fn from_privilege_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SELECT" => Some(TablePrivileges::SELECT),
            "INSERT" => Some(TablePrivileges::INSERT),
            "UPDATE" => Some(TablePrivileges::UPDATE),
            "DELETE" => Some(TablePrivileges::DELETE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_flags_from_access() {
        assert_eq!(
            ColumnFlags::from_access(TableAccessFlags::SELECT),
            ColumnFlags::SELECT
        );
        assert_eq!(
            ColumnFlags::from_access(TableAccessFlags::ALL),
            ColumnFlags::SELECT | ColumnFlags::INSERT | ColumnFlags::UPDATE
        );
        assert_eq!(
            ColumnFlags::from_access(TableAccessFlags::UPDATE_WHERE),
            ColumnFlags::UPDATE
        );
        assert_eq!(
            ColumnFlags::from_access(TableAccessFlags::DELETE_PK),
            ColumnFlags::empty()
        );
    }

    #[test]
    fn test_ungranted() {
        let flags = ColumnFlags::SELECT | ColumnFlags::INSERT | ColumnFlags::PRIMARY_KEY;
        assert_eq!(flags.ungranted(TableAccessFlags::SELECT), ColumnFlags::INSERT);
        assert!(flags
            .ungranted(TableAccessFlags::SELECT | TableAccessFlags::INSERT)
            .is_empty());
        assert!((ColumnFlags::PRIMARY_KEY | ColumnFlags::NULLABLE)
            .ungranted(TableAccessFlags::empty())
            .is_empty());
    }

    #[test]
    fn test_required_privileges() {
        assert_eq!(
            TableAccessFlags::READ.required_privileges(),
            TablePrivileges::SELECT
        );
        assert_eq!(
            TableAccessFlags::DELETE_PK.required_privileges(),
            TablePrivileges::SELECT | TablePrivileges::DELETE
        );
        assert_eq!(
            TableAccessFlags::ALL.required_privileges(),
            TablePrivileges::all()
        );
    }

    #[test]
    fn test_privilege_names() {
        assert_eq!(TablePrivileges::from_privilege_name("select"), Some(TablePrivileges::SELECT));
        assert_eq!(TablePrivileges::from_privilege_name(" DELETE "), Some(TablePrivileges::DELETE));
        assert_eq!(TablePrivileges::from_privilege_name("REFERENCES"), None);
    }
}
