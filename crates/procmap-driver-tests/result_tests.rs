#[cfg(test)]
mod result_tests {
    use crate::fixtures::{
        Contact, ContactIo, GetUser, ListContacts, Preferences, UserIo, test_db, test_db_with,
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use procmap::{ColumnLookup, Json, MappingOptions, ResultProcedure};
    use rstest::rstest;

    fn contact(id: i64, nickname: Option<&str>, newsletter: bool) -> Contact {
        Contact {
            id,
            nickname: nickname.map(str::to_string),
            preferences: Json(Preferences { newsletter }),
        }
    }

    /// A collection result returns every row in order. Nullable columns yield
    /// `None`, widened integers and JSON text are converted on the way.
    #[rstest]
    #[tokio::test]
    async fn test_collection_with_nulls_and_conversions(
        #[values(ColumnLookup::CachedOrdinal, ColumnLookup::ByName)] column_lookup: ColumnLookup,
    ) -> Result<()> {
        let db = test_db_with(
            MappingOptions {
                column_lookup,
                ..Default::default()
            },
            None,
        )?;
        let mut list = db.procedure::<ListContacts>()?;

        let contacts = list.query_async(&mut ContactIo { owner: 1 }).await?;

        assert!(contacts.is_collection());
        assert_eq!(
            contacts.into_vec(),
            vec![
                contact(1, Some("ada"), true),
                contact(2, None, false),
                contact(3, Some("bob"), false),
            ]
        );
        Ok(())
    }

    /// Each query materializes a fresh container; nothing is carried over
    /// from a previous call.
    #[tokio::test]
    async fn test_results_not_shared_between_calls() -> Result<()> {
        let db = test_db()?;
        let mut get_user = db.procedure::<GetUser>()?;

        let first = get_user.query_async(&mut UserIo::with_id(42)).await?;
        let second = get_user.query_async(&mut UserIo::with_id(1)).await?;

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        Ok(())
    }

    /// The compiled procedure exposes what was mapped for its result.
    #[tokio::test]
    async fn test_compiled_result_metadata() -> Result<()> {
        let db = test_db()?;
        let compiled = db.registry.resolve::<ListContacts>()?;

        assert!(compiled.has_result());
        assert!(compiled.is_collection());

        let result = compiled
            .result::<Contact>()
            .ok_or_else(|| anyhow::anyhow!("contact result should be compiled"))?;
        let columns: Vec<&str> = result.columns().iter().map(|c| c.column_name()).collect();
        assert_eq!(columns, vec!["id", "nickname", "preferences"]);
        Ok(())
    }
}
