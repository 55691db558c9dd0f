#[cfg(test)]
mod error_tests {
    use crate::fixtures::{
        GetUser, OrderIo, RejectOrder, Transfer, TransferIo, UserIo, slow_test_db, test_db,
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use procmap::{
        CancellationToken, DriverError, ExecutionState, ProcedureError, ResultProcedure,
        StoredProcedure,
    };
    use std::time::Duration;

    /// Driver errors reach the caller unchanged, and output properties keep
    /// their previous values.
    #[tokio::test]
    async fn test_driver_error_passes_through() -> Result<()> {
        let db = test_db()?;
        let mut reject = db.procedure::<RejectOrder>()?;

        let mut io = OrderIo {
            order_id: 3,
            accepted: Some(true),
        };
        let err = reject.execute_async(&mut io).await.unwrap_err();

        match &err {
            ProcedureError::Driver(DriverError::Constraint(message)) => {
                assert!(message.contains("FK_Order_Customer"));
            }
            other => panic!("expected a constraint violation, got {other:?}"),
        }
        assert!(err.to_string().starts_with("Constraint violation:"));
        assert_eq!(io.accepted, Some(true));
        assert_eq!(reject.handle().context().state(), ExecutionState::Idle);
        Ok(())
    }

    /// An instance stays usable after a failed call.
    #[tokio::test]
    async fn test_instance_usable_after_driver_error() -> Result<()> {
        let db = test_db()?;
        let mut transfer = db.procedure::<Transfer>()?;

        db.connection.fail_next_open(DriverError::Connection("login failed".into()));
        let err = transfer
            .execute_async(&mut TransferIo::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.as_driver(),
            Some(&DriverError::Connection("login failed".into()))
        );

        let mut io = TransferIo {
            amount: 50.0,
            ..Default::default()
        };
        transfer.execute_async(&mut io).await?;
        assert_eq!(io.balance, Some(50.0));
        Ok(())
    }

    /// Cancelling an in-flight call fails it with `Cancelled`; the driver
    /// never sees the command.
    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_call() -> Result<()> {
        let db = slow_test_db(Duration::from_secs(30))?;
        let mut get_user = db.procedure::<GetUser>()?;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = get_user
            .query_cancellable(&mut UserIo::with_id(42), &token)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Procedure call was cancelled");
        assert!(db.connection.calls().is_empty());

        let user = get_user
            .query_cancellable(&mut UserIo::with_id(42), &CancellationToken::new())
            .await?
            .into_single();
        assert_eq!(user.map(|u| u.id), Some(42));
        Ok(())
    }

    /// A token cancelled before the call prevents the connection from being
    /// opened at all.
    #[tokio::test]
    async fn test_pre_cancelled_token() -> Result<()> {
        let db = test_db()?;
        let mut transfer = db.procedure::<Transfer>()?;
        let token = CancellationToken::new();
        token.cancel();

        let err = transfer
            .execute_cancellable(&mut TransferIo::default(), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, ProcedureError::Cancelled));
        assert_eq!(db.connection.open_count(), 0);
        Ok(())
    }

    /// Mapping errors name the procedure they were found in.
    #[test]
    fn test_mapping_error_message() {
        use crate::fixtures::User;
        use procmap::{ParameterSpec, ProcedureSpec, ResultColumnSpec, ResultSpec, property};

        let err = ProcedureSpec::<GetUser>::new("dbo.GetUser")
            .parameter(ParameterSpec::return_value(property!(UserIo, status: i32)))
            .result(
                ResultSpec::single::<User>()
                    .column(ResultColumnSpec::new::<i32>("id"))
                    .column(ResultColumnSpec::new::<String>("name")),
            )
            .compile(&Default::default())
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "'Procedure cannot have both a ReturnValue parameter and a result set!' \
             (In procedure or function 'dbo.GetUser')"
        );
    }
}
