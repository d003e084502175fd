use std::future::Future;

use crate::core::cleaning::MessageRecord;
use crate::error::StoreError;

pub trait MessageRepository {
    /// Replaces the content of `table` with `rows`, creating it if needed.
    fn replace_messages(
        &self,
        table: &str,
        rows: &[MessageRecord],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
    fn get_messages(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, StoreError>> + Send;
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*` so the name can be spliced into SQL.
pub(super) fn checked_table_name(table: &str) -> Result<&str, StoreError> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid && !table.eq_ignore_ascii_case("detections") && !table.starts_with("_sqlx") {
        Ok(table)
    } else {
        Err(StoreError::InvalidTableName(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        assert!(checked_table_name("cleaned_messages").is_ok());
        assert!(checked_table_name("_tmp1").is_ok());
        assert!(checked_table_name("").is_err());
        assert!(checked_table_name("1abc").is_err());
        assert!(checked_table_name("x; DROP TABLE detections").is_err());
        assert!(checked_table_name("detections").is_err());
        assert!(checked_table_name("_sqlx_migrations").is_err());
    }
}
