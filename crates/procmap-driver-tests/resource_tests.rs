#[cfg(test)]
mod resource_tests {
    use crate::fixtures::{BlobIo, GetUser, ReadBlob, Transfer, TransferIo, UserIo, test_db};
    use anyhow::{Context, Result};
    use futures::future::try_join_all;
    use pretty_assertions::assert_eq;
    use procmap::procmap_core::DbTransaction;
    use procmap::{ResultProcedure, StoredProcedure};
    use procmap_driver_memory::MemoryTransaction;
    use std::sync::Arc;

    /// Parameter slots holding native resources are released after every
    /// call; plain slots are kept for reuse.
    #[tokio::test]
    async fn test_native_parameter_resources_released() -> Result<()> {
        let db = test_db()?;
        let mut read_blob = db.procedure::<ReadBlob>()?;

        let mut io = BlobIo {
            id: 1,
            blob: None,
        };
        for _ in 0..3 {
            read_blob.execute_async(&mut io).await?;
            assert_eq!(io.blob.as_deref(), Some(&b"procmap"[..]));
            assert_eq!(db.tracker.live(), 0);
        }
        assert_eq!(db.tracker.created(), 3);

        let context = read_blob.handle().context();
        assert!(context.slot("Blob").is_none());
        assert_eq!(context.slot("Id").map(|p| p.size), Some(None));
        Ok(())
    }

    /// The output slot is allocated with its declared size on every call.
    #[tokio::test]
    async fn test_output_slot_reallocated_with_size() -> Result<()> {
        let db = test_db()?;
        let mut read_blob = db.procedure::<ReadBlob>()?;

        read_blob.execute_async(&mut BlobIo::default()).await?;
        read_blob
            .handle_mut()
            .context_mut()
            .load_parameters(&BlobIo::default());

        let blob = read_blob
            .handle()
            .context()
            .slot("Blob")
            .context("slot materialized by load")?;
        assert_eq!(blob.size, Some(1024));
        assert!(!blob.owns_native_resource());

        read_blob.handle_mut().context_mut().release();
        Ok(())
    }

    /// Commands enlist in the facade's ambient transaction, when there is one.
    #[tokio::test]
    async fn test_ambient_transaction() -> Result<()> {
        let db = test_db()?;
        let mut transfer = db.procedure::<Transfer>()?;
        let transaction = Arc::new(MemoryTransaction::new());

        db.database.set_transaction(transaction.clone());
        transfer.execute_async(&mut TransferIo::default()).await?;
        db.database.clear_transaction();
        transfer.execute_async(&mut TransferIo::default()).await?;

        let calls = db.connection.calls();
        assert_eq!(calls[0].transaction, Some(transaction.id()));
        assert_eq!(calls[1].transaction, None);
        Ok(())
    }

    /// Independent instances of one command type run concurrently, each with
    /// its own context.
    #[tokio::test]
    async fn test_concurrent_instances() -> Result<()> {
        let db = test_db()?;

        let calls = (0..8).map(|i| {
            let db = &db;
            async move {
                let mut transfer = db.procedure::<Transfer>()?;
                let mut io = TransferIo {
                    from_account: i,
                    amount: f64::from(i),
                    ..Default::default()
                };
                transfer.execute_async(&mut io).await?;
                anyhow::Ok(io)
            }
        });
        let results = try_join_all(calls).await?;

        for (i, io) in results.iter().enumerate() {
            assert_eq!(io.balance, Some(100.0 - i as f64));
            assert_eq!(io.counter, 1);
        }
        assert_eq!(db.connection.calls().len(), 8);
        Ok(())
    }

    /// Instances of different command types spawned onto the runtime.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_instances_across_tasks() -> Result<()> {
        let db = Arc::new(test_db()?);

        let user_task = {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                let mut get_user = db.procedure::<GetUser>()?;
                let user = get_user.query_async(&mut UserIo::with_id(42)).await?;
                anyhow::Ok(user.len())
            })
        };
        let transfer_task = {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                let mut transfer = db.procedure::<Transfer>()?;
                let mut io = TransferIo::default();
                transfer.execute_async(&mut io).await?;
                anyhow::Ok(io.counter)
            })
        };

        assert_eq!(user_task.await??, 1);
        assert_eq!(transfer_task.await??, 1);
        Ok(())
    }
}
